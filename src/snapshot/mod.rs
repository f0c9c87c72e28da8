/// Snapshot layer: the reconstructed protocol state and its persistence.
pub mod store;
pub mod types;

pub use store::{JsonFileSink, SnapshotSink, SnapshotStore};
pub use types::{Market, MarketBook, RiskParams, Snapshot, SyncState, UserPosition, normalize_price};
