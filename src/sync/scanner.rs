use crate::chain::{ChainReader, LogFilter, RawLog};
use crate::error::SyncError;
use crate::protocol::EventSpec;
use crate::sync::Shutdown;
use crate::sync::retry::RetryPolicy;
use tracing::debug;

/// Fetches historical events over a block range in bounded chunks.
///
/// RPC providers cap log query ranges and result sizes, so the range is
/// walked in `chunk_size` steps and results are concatenated in block order.
/// Each chunk goes through the retry layer; a chunk that exhausts its retries
/// fails the whole scan with a typed error instead of rewinding forever.
#[derive(Debug, Clone)]
pub struct BlockRangeScanner {
    chunk_size: u64,
    retry: RetryPolicy,
}

impl BlockRangeScanner {
    pub fn new(chunk_size: u64, retry: RetryPolicy) -> Self {
        Self { chunk_size: chunk_size.max(1), retry }
    }

    /// Scan `[from, to)` for `spec`. An empty chunk is success; `from >= to`
    /// yields no events.
    pub async fn scan(
        &self,
        reader: &dyn ChainReader,
        spec: &EventSpec,
        from: u64,
        to: u64,
        shutdown: &Shutdown,
    ) -> Result<Vec<RawLog>, SyncError> {
        let mut logs = Vec::new();
        let mut start = from;

        while start < to {
            if shutdown.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let end = start.saturating_add(self.chunk_size).min(to);
            let filter =
                LogFilter { address: spec.contract, topic0: spec.topic, from_block: start, to_block: end };

            let operation = format!("{} log scan [{start}, {end})", spec.name);
            let chunk = self.retry.execute(&operation, shutdown, || reader.get_logs(&filter)).await?;

            debug!("{}: {} events in [{start}, {end})", spec.name, chunk.len());
            logs.extend(chunk);
            start = end;
        }

        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainReader;
    use crate::sync::shutdown_channel;
    use alloy_primitives::{Address, B256};
    use std::time::Duration;

    const TOPIC: B256 = B256::repeat_byte(0xe1);

    fn spec() -> EventSpec {
        EventSpec { name: "Deposit", topic: TOPIC, contract: None }
    }

    fn instant_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy { max_attempts, base_delay: Duration::ZERO, max_delay: Duration::ZERO }
    }

    fn seeded_reader() -> MockChainReader {
        let reader = MockChainReader::new(1000);
        reader.push_log(13, TOPIC, &[Address::repeat_byte(0x0a)]);
        reader.push_log(250, TOPIC, &[Address::repeat_byte(0x0b)]);
        reader.push_log(251, TOPIC, &[Address::repeat_byte(0x0c)]);
        reader.push_log(789, TOPIC, &[Address::repeat_byte(0x0d)]);
        reader
    }

    #[tokio::test]
    async fn test_chunked_scan_matches_single_scan() {
        let reader = seeded_reader();
        let shutdown = Shutdown::never();

        let whole = BlockRangeScanner::new(10_000, instant_retry(1))
            .scan(&reader, &spec(), 0, 800, &shutdown)
            .await
            .unwrap();

        for chunk_size in [1, 7, 100, 799, 800] {
            let chunked = BlockRangeScanner::new(chunk_size, instant_retry(1))
                .scan(&reader, &spec(), 0, 800, &shutdown)
                .await
                .unwrap();

            let whole_blocks: Vec<u64> = whole.iter().map(|l| l.block_number).collect();
            let chunked_blocks: Vec<u64> = chunked.iter().map(|l| l.block_number).collect();
            assert_eq!(whole_blocks, chunked_blocks, "chunk_size {chunk_size}");
        }
    }

    #[tokio::test]
    async fn test_empty_range_and_empty_chunks_are_success() {
        let reader = MockChainReader::new(1000);
        let scanner = BlockRangeScanner::new(100, instant_retry(1));
        let shutdown = Shutdown::never();

        let logs = scanner.scan(&reader, &spec(), 0, 500, &shutdown).await.unwrap();
        assert!(logs.is_empty());

        let logs = scanner.scan(&reader, &spec(), 500, 500, &shutdown).await.unwrap();
        assert!(logs.is_empty());
    }

    #[tokio::test]
    async fn test_chunk_retry_exhaustion_is_fatal() {
        let reader = seeded_reader();
        reader.fail_log_queries(u32::MAX);

        let scanner = BlockRangeScanner::new(100, instant_retry(3));
        let result = scanner.scan(&reader, &spec(), 0, 300, &Shutdown::never()).await;

        assert!(matches!(result, Err(SyncError::RetriesExhausted { attempts: 3, .. })));
    }

    #[tokio::test]
    async fn test_scan_stops_at_shutdown() {
        let reader = seeded_reader();
        let (handle, shutdown) = shutdown_channel();
        handle.shutdown();

        let scanner = BlockRangeScanner::new(100, instant_retry(1));
        let result = scanner.scan(&reader, &spec(), 0, 300, &shutdown).await;

        assert!(matches!(result, Err(SyncError::Cancelled)));
    }
}
