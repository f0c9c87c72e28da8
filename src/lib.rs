// Layered architecture
pub mod chain;    // Transport layer: JSON-RPC chain reader, multicall, log queries
pub mod protocol; // Adapter layer: protocol-specific events and position decoding
pub mod snapshot; // State layer: markets, user positions, persistence
pub mod sync;     // Engine layer: discovery, batched refresh, cycle scheduling

pub mod error;

// Re-export key components from each layer
pub use chain::{CallOutcome, CallRequest, ChainReader, HttpChainReader, LogFilter, RawLog};
pub use error::{DecodeError, SyncError, TransportError};
pub use protocol::{EventSpec, ProtocolAdapter};
pub use snapshot::{
    JsonFileSink, Market, MarketBook, RiskParams, Snapshot, SnapshotSink, SnapshotStore, SyncState,
    UserPosition, normalize_price,
};
pub use sync::{
    BatchReader, BlockRangeScanner, CycleKind, RefreshStrategy, RetryPolicy, Shutdown, ShutdownHandle,
    SyncConfig, SyncScheduler, UserRegistry, shutdown_channel,
};
