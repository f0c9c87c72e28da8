use crate::snapshot::types::Snapshot;
use eyre::Result;
use std::path::PathBuf;
use tracing::debug;

/// Destination for published snapshots. Each publish replaces whatever the
/// sink held before; there is no incremental form.
pub trait SnapshotSink: Send + Sync {
    fn write(&self, payload: &str) -> Result<()>;
}

/// Overwrites one JSON file per protocol instance.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SnapshotSink for JsonFileSink {
    fn write(&self, payload: &str) -> Result<()> {
        std::fs::write(&self.path, payload)?;
        Ok(())
    }
}

/// Serializes the full snapshot and hands it to the sink.
pub struct SnapshotStore {
    sink: Box<dyn SnapshotSink>,
}

impl SnapshotStore {
    pub fn new(sink: Box<dyn SnapshotSink>) -> Self {
        Self { sink }
    }

    pub fn publish(&self, snapshot: &Snapshot) -> Result<()> {
        let payload = serde_json::to_string(snapshot)?;
        self.sink.write(&payload)?;
        debug!(
            "published snapshot: {} markets, {} users, cycle {}",
            snapshot.markets.len(),
            snapshot.users.len(),
            snapshot.state.cycle_counter
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::types::{Market, MarketBook, RiskParams, UserPosition};
    use alloy_primitives::{Address, U256};
    use std::sync::Mutex;

    pub struct MemorySink {
        pub payloads: Mutex<Vec<String>>,
    }

    impl SnapshotSink for MemorySink {
        fn write(&self, payload: &str) -> Result<()> {
            self.payloads.lock().unwrap().push(payload.to_string());
            Ok(())
        }
    }

    fn sample_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::default();
        snapshot.markets = MarketBook::new(vec![Market {
            address: Address::repeat_byte(0x01),
            symbol: "mETH".to_string(),
            decimals: 18,
            underlying: Address::repeat_byte(0x02),
            price: U256::from(2000u64),
            risk: RiskParams::default(),
        }]);
        snapshot.users.insert(Address::repeat_byte(0xaa), UserPosition::failed());
        snapshot.state.cycle_counter = 3;
        snapshot
    }

    #[test]
    fn test_publish_overwrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let store = SnapshotStore::new(Box::new(JsonFileSink::new(&path)));

        let mut snapshot = sample_snapshot();
        store.publish(&snapshot).unwrap();
        snapshot.state.cycle_counter = 4;
        store.publish(&snapshot).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: Snapshot = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed.state.cycle_counter, 4);
        assert_eq!(parsed.users.len(), 1);
    }

    #[test]
    fn test_snapshot_roundtrip_preserves_positions() {
        let snapshot = sample_snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: Snapshot = serde_json::from_str(&json).unwrap();

        let user = parsed.users.get(&Address::repeat_byte(0xaa)).unwrap();
        assert!(!user.succ);
        assert_eq!(parsed.markets.len(), 1);
    }
}
