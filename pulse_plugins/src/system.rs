use pulse_core::{Aggregator, Snapshot};
use std::sync::Mutex;
use sysinfo::{Pid, System};

/// Samples host and process resource usage on every flush.
pub struct SystemSampler {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl SystemSampler {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            pid: sysinfo::get_current_pid().ok(),
        }
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator for SystemSampler {
    fn collect(&self) -> Snapshot {
        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());
        system.refresh_memory();
        system.refresh_cpu();

        let mut snapshot = Snapshot::new();
        snapshot.insert("system.memory.total".to_string(), system.total_memory() as f64);
        snapshot.insert("system.memory.used".to_string(), system.used_memory() as f64);
        snapshot.insert(
            "system.cpu.usage".to_string(),
            system.global_cpu_info().cpu_usage() as f64,
        );

        let load = System::load_average();
        snapshot.insert("system.load.1m".to_string(), load.one);
        snapshot.insert("system.load.5m".to_string(), load.five);
        snapshot.insert("system.load.15m".to_string(), load.fifteen);

        if let Some(pid) = self.pid {
            if system.refresh_process(pid) {
                if let Some(process) = system.process(pid) {
                    snapshot.insert("process.memory.rss".to_string(), process.memory() as f64);
                    snapshot.insert("process.cpu.usage".to_string(), process.cpu_usage() as f64);
                }
            }
        }

        snapshot
    }

    fn name(&self) -> &str {
        "system"
    }
}
