use crate::chain::reader::ChainReader;
use crate::chain::types::{CallOutcome, CallRequest, LogFilter, RawLog};
use crate::error::TransportError;
use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Scripted account state served by [`MockChainReader`].
#[derive(Debug, Clone)]
pub enum MockAccount {
    /// Decodes into a single-asset position with these amounts.
    Active { collateral: U256, debt: U256 },
    /// Returns garbage bytes that no decoder can make sense of.
    Malformed,
    /// The sub-call itself reverts (`success=false`).
    Reverted,
}

/// In-memory [`ChainReader`] for tests.
///
/// Position sub-calls use the mock wire convention shared with the mock
/// protocol adapter: the call data is the raw 20-byte user address and the
/// return data is collateral followed by debt, two big-endian 32-byte words.
#[derive(Default)]
pub struct MockChainReader {
    height: AtomicU64,
    logs: Mutex<Vec<RawLog>>,
    accounts: Mutex<HashMap<Address, MockAccount>>,
    // remaining injected transport failures
    aggregate_failures: AtomicU32,
    log_failures: AtomicU32,
    // every user whose position sub-call was served
    refreshed: Mutex<Vec<Address>>,
    aggregate_calls: AtomicU32,
}

impl MockChainReader {
    pub fn new(height: u64) -> Self {
        let reader = Self::default();
        reader.set_height(height);
        reader
    }

    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }

    pub fn push_log(&self, block_number: u64, topic0: B256, users: &[Address]) {
        let mut topics = vec![topic0];
        for user in users {
            let mut padded = [0u8; 32];
            padded[12..].copy_from_slice(user.as_slice());
            topics.push(B256::from(padded));
        }
        self.logs.lock().unwrap().push(RawLog {
            address: Address::repeat_byte(0xee),
            topics,
            data: Bytes::new(),
            block_number,
        });
    }

    pub fn set_account(&self, user: Address, account: MockAccount) {
        self.accounts.lock().unwrap().insert(user, account);
    }

    /// The next `count` aggregated calls fail at the transport level.
    pub fn fail_aggregates(&self, count: u32) {
        self.aggregate_failures.store(count, Ordering::SeqCst);
    }

    /// The next `count` log queries fail at the transport level.
    pub fn fail_log_queries(&self, count: u32) {
        self.log_failures.store(count, Ordering::SeqCst);
    }

    /// Users whose position sub-calls were actually served, in call order.
    pub fn refreshed(&self) -> Vec<Address> {
        self.refreshed.lock().unwrap().clone()
    }

    pub fn aggregate_call_count(&self) -> u32 {
        self.aggregate_calls.load(Ordering::SeqCst)
    }

    fn consume_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn serve_account(&self, user: Address) -> CallOutcome {
        self.refreshed.lock().unwrap().push(user);

        match self.accounts.lock().unwrap().get(&user) {
            Some(MockAccount::Active { collateral, debt }) => {
                let mut data = Vec::with_capacity(64);
                data.extend_from_slice(&collateral.to_be_bytes::<32>());
                data.extend_from_slice(&debt.to_be_bytes::<32>());
                CallOutcome { success: true, return_data: data.into() }
            }
            Some(MockAccount::Malformed) => {
                CallOutcome { success: true, return_data: Bytes::from(vec![0xba, 0xad]) }
            }
            Some(MockAccount::Reverted) => CallOutcome { success: false, return_data: Bytes::new() },
            // unknown account reads as an empty position
            None => CallOutcome { success: true, return_data: Bytes::from(vec![0u8; 64]) },
        }
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    async fn block_number(&self) -> Result<u64, TransportError> {
        Ok(self.height.load(Ordering::SeqCst))
    }

    async fn block_timestamp(&self, block: u64) -> Result<u64, TransportError> {
        Ok(1_700_000_000 + block * 12)
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, TransportError> {
        if Self::consume_failure(&self.log_failures) {
            return Err(TransportError::Rpc("mock log query failure".to_string()));
        }

        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|log| {
                log.topics.first() == Some(&filter.topic0)
                    && log.block_number >= filter.from_block
                    && log.block_number < filter.to_block
                    && filter.address.is_none_or(|a| a == log.address)
            })
            .cloned()
            .collect())
    }

    async fn aggregate(&self, calls: &[CallRequest]) -> Result<Vec<CallOutcome>, TransportError> {
        self.aggregate_calls.fetch_add(1, Ordering::SeqCst);

        if Self::consume_failure(&self.aggregate_failures) {
            return Err(TransportError::Rpc("mock aggregate failure".to_string()));
        }

        Ok(calls
            .iter()
            .map(|call| self.serve_account(Address::from_slice(&call.call_data)))
            .collect())
    }

    async fn call(&self, _target: Address, data: Bytes) -> Result<Bytes, TransportError> {
        let outcome = self.serve_account(Address::from_slice(&data));
        if outcome.success {
            Ok(outcome.return_data)
        } else {
            Err(TransportError::Rpc("execution reverted".to_string()))
        }
    }
}
