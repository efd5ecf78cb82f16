use std::sync::Mutex;
use std::time::Duration;
use tracing::error;

/// Statistics for the samples folded in since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl HistogramSnapshot {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Running min/max/mean over a window of samples.
#[derive(Debug, Default)]
pub struct Histogram {
    state: Mutex<HistogramSnapshot>,
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, sample: f64) {
        if !sample.is_finite() {
            error!("Rejected non-finite histogram sample: {}", sample);
            return;
        }

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.count += 1;

        if state.count == 1 {
            state.min = sample;
            state.max = sample;
            state.mean = sample;
            return;
        }

        state.min = state.min.min(sample);
        state.max = state.max.max(sample);
        state.mean += (sample - state.mean) / state.count as f64;
        // incremental mean can drift by an ulp past the bounds
        state.mean = state.mean.clamp(state.min, state.max);
    }

    /// Records a duration in milliseconds.
    pub fn update_duration(&self, elapsed: Duration) {
        self.update(elapsed.as_secs_f64() * 1000.0);
    }

    pub fn count(&self) -> u64 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).count
    }

    pub fn read_and_reset(&self) -> HistogramSnapshot {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *state)
    }
}
