use crate::chain::{CallRequest, ChainReader};
use crate::error::{SyncError, TransportError};
use crate::protocol::ProtocolAdapter;
use crate::snapshot::{MarketBook, UserPosition};
use crate::sync::Shutdown;
use crate::sync::retry::RetryPolicy;
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// How a set of positions is refreshed against the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStrategy {
    /// Bounded-size batches, each issued as one aggregated multicall.
    Aggregated,
    /// One read call per address. For chains whose multicall deployment is
    /// unreliable or missing.
    PerAddress,
}

impl FromStr for RefreshStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aggregated" => Ok(Self::Aggregated),
            "per_address" | "per-address" => Ok(Self::PerAddress),
            other => Err(format!("unknown refresh strategy: {other}")),
        }
    }
}

/// Refreshes position data for a set of addresses.
///
/// Postcondition of [`BatchReader::refresh`]: exactly one stored
/// [`UserPosition`] per requested address, either decoded or explicitly
/// marked failed. An aggregated transport failure is retried as a whole batch
/// and, once exhausted, aborts before any write from that batch, so no
/// address is left partially updated. Per-address retry exhaustion is
/// confined to the address being read, stored as failed, so both strategies
/// surface a persistently failing user the same way.
#[derive(Debug, Clone)]
pub struct BatchReader {
    strategy: RefreshStrategy,
    batch_size: usize,
    retry: RetryPolicy,
}

impl BatchReader {
    pub fn new(strategy: RefreshStrategy, batch_size: usize, retry: RetryPolicy) -> Self {
        Self { strategy, batch_size: batch_size.max(1), retry }
    }

    pub async fn refresh(
        &self,
        reader: &dyn ChainReader,
        adapter: &dyn ProtocolAdapter,
        markets: &MarketBook,
        addresses: &[Address],
        users: &mut BTreeMap<Address, UserPosition>,
        shutdown: &Shutdown,
    ) -> Result<(), SyncError> {
        let deduped = dedup_preserving_order(addresses);
        if deduped.len() < addresses.len() {
            // caller contract violation, tolerated but called out
            warn!("refresh called with {} duplicate addresses", addresses.len() - deduped.len());
        }
        if deduped.is_empty() {
            debug!("refresh called with no addresses");
            return Ok(());
        }

        match self.strategy {
            RefreshStrategy::Aggregated => {
                self.refresh_aggregated(reader, adapter, markets, &deduped, users, shutdown).await
            }
            RefreshStrategy::PerAddress => {
                self.refresh_per_address(reader, adapter, markets, &deduped, users, shutdown).await
            }
        }
    }

    async fn refresh_aggregated(
        &self,
        reader: &dyn ChainReader,
        adapter: &dyn ProtocolAdapter,
        markets: &MarketBook,
        addresses: &[Address],
        users: &mut BTreeMap<Address, UserPosition>,
        shutdown: &Shutdown,
    ) -> Result<(), SyncError> {
        let total = addresses.len();

        for (batch_idx, batch) in addresses.chunks(self.batch_size).enumerate() {
            if shutdown.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            // flatten each user's calls, remembering which slice is whose
            let mut calls: Vec<CallRequest> = Vec::new();
            let mut layout = Vec::with_capacity(batch.len());
            for &user in batch {
                let user_calls = adapter.position_calls(user, markets);
                let start = calls.len();
                calls.extend(user_calls);
                layout.push((user, start..calls.len()));
            }

            info!("refreshing positions, batch {} ({}/{total} users)", batch_idx + 1, batch.len());

            let outcomes =
                self.retry.execute("position batch", shutdown, || reader.aggregate(&calls)).await?;

            if outcomes.len() != calls.len() {
                return Err(TransportError::MalformedResponse(format!(
                    "aggregate returned {} results for {} calls",
                    outcomes.len(),
                    calls.len()
                ))
                .into());
            }

            // the batch transport call succeeded, now every user in it gets
            // exactly one stored position
            for (user, range) in layout {
                let position = match adapter.decode_position(user, markets, &outcomes[range]) {
                    Ok(position) => position,
                    Err(e) => {
                        warn!("position decode failed: {e}");
                        UserPosition::failed()
                    }
                };
                users.insert(user, position);
            }
        }

        Ok(())
    }

    async fn refresh_per_address(
        &self,
        reader: &dyn ChainReader,
        adapter: &dyn ProtocolAdapter,
        markets: &MarketBook,
        addresses: &[Address],
        users: &mut BTreeMap<Address, UserPosition>,
        shutdown: &Shutdown,
    ) -> Result<(), SyncError> {
        for &user in addresses {
            if shutdown.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            // decode failures are final, only transport errors are retried
            let read = self
                .retry
                .execute("position read", shutdown, || async {
                    match adapter.read_position(reader, user, markets).await {
                        Ok(position) => Ok(Ok(position)),
                        Err(SyncError::Decode(e)) => Ok(Err(e)),
                        Err(e) => Err(e),
                    }
                })
                .await;

            // exhaustion stays local to this address, matching the
            // per-element failure contract of the aggregated strategy
            let decoded = match read {
                Ok(decoded) => decoded,
                Err(SyncError::RetriesExhausted { attempts, .. }) => {
                    warn!("position read for {user} still failing after {attempts} attempts");
                    users.insert(user, UserPosition::failed());
                    continue;
                }
                Err(e) => return Err(e),
            };

            let position = match decoded {
                Ok(position) => position,
                Err(e) => {
                    warn!("position decode failed: {e}");
                    UserPosition::failed()
                }
            };
            users.insert(user, position);
        }

        Ok(())
    }
}

fn dedup_preserving_order(addresses: &[Address]) -> Vec<Address> {
    let mut seen = HashSet::with_capacity(addresses.len());
    addresses.iter().copied().filter(|a| seen.insert(*a)).collect()
}
