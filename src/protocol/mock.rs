use crate::chain::{CallOutcome, CallRequest, ChainReader, RawLog};
use crate::error::{DecodeError, SyncError, TransportError};
use crate::protocol::{EventSpec, ProtocolAdapter};
use crate::snapshot::{Market, MarketBook, RiskParams, UserPosition};
use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

/// Single-asset test protocol speaking the mock wire convention of
/// [`crate::chain::MockChainReader`]: one position call per user whose call
/// data is the raw user address, returning collateral followed by debt as
/// two big-endian 32-byte words.
#[derive(Default)]
pub struct MockAdapter {
    // remaining injected market-load failures
    market_load_failures: AtomicU32,
}

impl MockAdapter {
    pub const ASSET: Address = Address::repeat_byte(0x01);
    pub const LENS: Address = Address::repeat_byte(0x02);

    pub const ENTRY_TOPIC: B256 = B256::repeat_byte(0xe1);
    pub const BORROW_TOPIC: B256 = B256::repeat_byte(0xb0);
    pub const REPAY_TOPIC: B256 = B256::repeat_byte(0xb1);
    pub const WITHDRAW_TOPIC: B256 = B256::repeat_byte(0xb2);
    pub const LIQUIDATE_TOPIC: B256 = B256::repeat_byte(0xb3);
    pub const TRANSFER_TOPIC: B256 = B256::repeat_byte(0xb4);

    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` market loads fail at the transport level.
    pub fn fail_market_loads(&self, count: u32) {
        self.market_load_failures.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProtocolAdapter for MockAdapter {
    fn entry_event(&self) -> EventSpec {
        EventSpec { name: "Deposit", topic: Self::ENTRY_TOPIC, contract: None }
    }

    fn mutation_events(&self) -> Vec<EventSpec> {
        vec![
            EventSpec { name: "Deposit", topic: Self::ENTRY_TOPIC, contract: None },
            EventSpec { name: "Withdraw", topic: Self::WITHDRAW_TOPIC, contract: None },
            EventSpec { name: "Borrow", topic: Self::BORROW_TOPIC, contract: None },
            EventSpec { name: "Repay", topic: Self::REPAY_TOPIC, contract: None },
            EventSpec { name: "Liquidate", topic: Self::LIQUIDATE_TOPIC, contract: None },
            EventSpec { name: "Transfer", topic: Self::TRANSFER_TOPIC, contract: None },
        ]
    }

    fn extract_addresses(&self, _spec: &EventSpec, log: &RawLog) -> Vec<Address> {
        (1..log.topics.len()).filter_map(|i| log.topic_address(i)).collect()
    }

    async fn load_markets(&self, _reader: &dyn ChainReader) -> Result<MarketBook, SyncError> {
        let failed = self
            .market_load_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(TransportError::Rpc("mock market load failure".to_string()).into());
        }

        Ok(MarketBook::new(vec![Market {
            address: Self::ASSET,
            symbol: "mASSET".to_string(),
            decimals: 18,
            underlying: Self::ASSET,
            price: U256::from(10u64).pow(U256::from(18)),
            risk: RiskParams {
                collateral_factor: 0.8,
                liquidation_incentive: 1.08,
                close_factor: 0.5,
                borrow_cap: U256::ZERO,
                collateral_cap: U256::ZERO,
            },
        }]))
    }

    fn position_calls(&self, user: Address, _markets: &MarketBook) -> Vec<CallRequest> {
        vec![CallRequest { target: Self::LENS, call_data: user.as_slice().to_vec().into() }]
    }

    fn decode_position(
        &self,
        user: Address,
        markets: &MarketBook,
        outcomes: &[CallOutcome],
    ) -> Result<UserPosition, DecodeError> {
        let outcome = match outcomes {
            [outcome] => outcome,
            _ => {
                return Err(DecodeError::ResultCountMismatch {
                    user,
                    expected: 1,
                    actual: outcomes.len(),
                });
            }
        };

        if !outcome.success {
            return Err(DecodeError::CallReverted { user });
        }
        if outcome.return_data.len() != 64 {
            return Err(DecodeError::MalformedReturnData {
                user,
                reason: format!("expected 64 bytes, got {}", outcome.return_data.len()),
            });
        }

        let collateral = U256::from_be_slice(&outcome.return_data[..32]);
        let debt = U256::from_be_slice(&outcome.return_data[32..]);

        UserPosition::try_new(
            user,
            vec![Self::ASSET],
            BTreeMap::from([(Self::ASSET, collateral)]),
            BTreeMap::from([(Self::ASSET, debt)]),
            markets,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Bytes;

    #[tokio::test]
    async fn test_decode_roundtrip() {
        let adapter = MockAdapter::new();
        let markets = adapter.load_markets(&crate::chain::MockChainReader::new(1)).await.unwrap();
        let user = Address::repeat_byte(0xaa);

        let mut data = Vec::new();
        data.extend_from_slice(&U256::from(500).to_be_bytes::<32>());
        data.extend_from_slice(&U256::from(120).to_be_bytes::<32>());
        let outcome = CallOutcome { success: true, return_data: data.into() };

        let position = adapter.decode_position(user, &markets, &[outcome]).unwrap();
        assert!(position.succ);
        assert_eq!(position.collateral[&MockAdapter::ASSET], U256::from(500));
        assert_eq!(position.debt[&MockAdapter::ASSET], U256::from(120));
    }

    #[tokio::test]
    async fn test_decode_rejects_reverted_and_garbage() {
        let adapter = MockAdapter::new();
        let markets = adapter.load_markets(&crate::chain::MockChainReader::new(1)).await.unwrap();
        let user = Address::repeat_byte(0xaa);

        let reverted = CallOutcome { success: false, return_data: Bytes::new() };
        assert!(matches!(
            adapter.decode_position(user, &markets, &[reverted]),
            Err(DecodeError::CallReverted { .. })
        ));

        let garbage = CallOutcome { success: true, return_data: Bytes::from(vec![1, 2, 3]) };
        assert!(matches!(
            adapter.decode_position(user, &markets, &[garbage]),
            Err(DecodeError::MalformedReturnData { .. })
        ));
    }

    #[test]
    fn test_extract_addresses_takes_every_topic_field() {
        let adapter = MockAdapter::new();
        let spec = EventSpec { name: "Liquidate", topic: MockAdapter::LIQUIDATE_TOPIC, contract: None };

        let borrower = Address::repeat_byte(0x0a);
        let liquidator = Address::repeat_byte(0x0b);
        let log = RawLog {
            address: Address::repeat_byte(0xee),
            topics: vec![
                MockAdapter::LIQUIDATE_TOPIC,
                {
                    let mut padded = [0u8; 32];
                    padded[12..].copy_from_slice(borrower.as_slice());
                    B256::from(padded)
                },
                {
                    let mut padded = [0u8; 32];
                    padded[12..].copy_from_slice(liquidator.as_slice());
                    B256::from(padded)
                },
            ],
            data: Bytes::new(),
            block_number: 5,
        };

        assert_eq!(adapter.extract_addresses(&spec, &log), vec![borrower, liquidator]);
    }
}
