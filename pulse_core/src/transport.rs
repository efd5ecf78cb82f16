use crate::{aggregator::Snapshot, error::Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Delivers one merged snapshot per flush cycle to a backend.
///
/// The engine does not wait for delivery; a slow transport never delays the
/// next flush.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn log(&self, snapshot: Snapshot) -> Result<()>;

    fn name(&self) -> &str;
}

pub type DynTransport = Arc<dyn Transport>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Snapshot>>,
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn log(&self, snapshot: Snapshot) -> Result<()> {
            self.seen.lock().unwrap().push(snapshot);
            Ok(())
        }

        fn name(&self) -> &str {
            "recorder"
        }
    }

    #[test]
    fn test_transport_as_trait_object() {
        let recorder = Arc::new(Recorder::default());
        let transport: DynTransport = recorder.clone();

        let snapshot = Snapshot::from([("flush.rate".to_string(), 2.0)]);
        tokio_test::block_on(transport.log(snapshot.clone())).unwrap();

        assert_eq!(transport.name(), "recorder");
        assert_eq!(recorder.seen.lock().unwrap().as_slice(), &[snapshot]);
    }
}
