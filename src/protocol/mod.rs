/// Protocol adapter layer.
///
/// Everything protocol-specific (which events mark user activity, how a
/// position read is encoded and decoded, how markets and prices are loaded)
/// sits behind [`ProtocolAdapter`]. The engine itself never touches an ABI.
pub mod mock;

pub use mock::MockAdapter;

use crate::chain::{CallOutcome, CallRequest, ChainReader, RawLog};
use crate::error::{DecodeError, SyncError};
use crate::snapshot::{MarketBook, UserPosition};
use alloy_primitives::{Address, B256};
use async_trait::async_trait;

/// One event kind the discovery scan listens for.
#[derive(Debug, Clone)]
pub struct EventSpec {
    pub name: &'static str,
    /// Event signature hash, matched against topics[0].
    pub topic: B256,
    /// Emitting contract to filter on; `None` scans all contracts.
    pub contract: Option<Address>,
}

#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    /// The canonical market-entry event used by full discovery.
    fn entry_event(&self) -> EventSpec;

    /// The full set of position-mutating events used by incremental
    /// discovery (deposit, withdraw, borrow, repay, liquidation, transfer).
    fn mutation_events(&self) -> Vec<EventSpec>;

    /// All user addresses named by one event record.
    fn extract_addresses(&self, spec: &EventSpec, log: &RawLog) -> Vec<Address>;

    /// Rebuild the market set with current prices and risk parameters.
    async fn load_markets(&self, reader: &dyn ChainReader) -> Result<MarketBook, SyncError>;

    /// The read calls needed to refresh one user's position.
    fn position_calls(&self, user: Address, markets: &MarketBook) -> Vec<CallRequest>;

    /// Decode the outcomes of [`Self::position_calls`], in the same order.
    fn decode_position(
        &self,
        user: Address,
        markets: &MarketBook,
        outcomes: &[CallOutcome],
    ) -> Result<UserPosition, DecodeError>;

    /// Refresh one user with individual read calls instead of an aggregated
    /// request. Used by the per-address batching strategy.
    async fn read_position(
        &self,
        reader: &dyn ChainReader,
        user: Address,
        markets: &MarketBook,
    ) -> Result<UserPosition, SyncError> {
        let calls = self.position_calls(user, markets);
        let mut outcomes = Vec::with_capacity(calls.len());
        for call in calls {
            let return_data = reader.call(call.target, call.call_data).await?;
            outcomes.push(CallOutcome { success: true, return_data });
        }
        Ok(self.decode_position(user, markets, &outcomes)?)
    }
}
