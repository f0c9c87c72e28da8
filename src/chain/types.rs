use alloy_primitives::{Address, B256, Bytes};

/// Raw event record as returned by a historical log query.
#[derive(Debug, Clone)]
pub struct RawLog {
    /// Contract that emitted the event.
    pub address: Address,
    /// topics[0] is the event signature hash.
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: u64,
}

impl RawLog {
    /// Addresses carried in indexed topics are left-padded to 32 bytes;
    /// this recovers the address stored in `topics[index]`.
    pub fn topic_address(&self, index: usize) -> Option<Address> {
        self.topics.get(index).map(|t| Address::from_slice(&t.as_slice()[12..]))
    }
}

/// Historical log query over a half-open block range `[from_block, to_block)`.
#[derive(Debug, Clone)]
pub struct LogFilter {
    /// Restrict to one emitting contract; `None` queries all contracts.
    pub address: Option<Address>,
    /// Event signature hash to match against topics[0].
    pub topic0: B256,
    pub from_block: u64,
    pub to_block: u64,
}

/// One sub-call of an aggregated read.
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub target: Address,
    pub call_data: Bytes,
}

/// Per-sub-call result of an aggregated read. `success=false` means the
/// sub-call reverted; the aggregated request itself still succeeded.
#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub success: bool,
    pub return_data: Bytes,
}
