use crate::chain::types::{CallOutcome, CallRequest, LogFilter, RawLog};
use crate::error::TransportError;
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;

/// Read-only view of the chain consumed by the sync engine.
///
/// All methods are single RPC round trips; retrying is the caller's concern.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Current head height.
    async fn block_number(&self) -> Result<u64, TransportError>;

    /// Timestamp (seconds) of the block at `block`.
    async fn block_timestamp(&self, block: u64) -> Result<u64, TransportError>;

    /// Historical logs matching `filter`, ordered by block number.
    /// The filter range is half-open: `[from_block, to_block)`.
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, TransportError>;

    /// Aggregated read: all `calls` execute in one request at the current
    /// height, returning exactly one outcome per sub-call in order.
    /// Individual sub-calls may fail without failing the request.
    async fn aggregate(&self, calls: &[CallRequest]) -> Result<Vec<CallOutcome>, TransportError>;

    /// Single read call at the current height.
    async fn call(&self, target: Address, data: Bytes) -> Result<Bytes, TransportError>;
}
