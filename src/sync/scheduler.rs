use crate::chain::ChainReader;
use crate::error::SyncError;
use crate::protocol::ProtocolAdapter;
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::sync::Shutdown;
use crate::sync::batch::BatchReader;
use crate::sync::config::SyncConfig;
use crate::sync::registry::UserRegistry;
use crate::sync::scanner::BlockRangeScanner;
use alloy_primitives::Address;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Which flavor of update a cycle runs after its INIT phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum CycleKind {
    /// Full resync: discover every user if the registry is empty, then
    /// refresh the entire known address set.
    Heavy,
    /// Incremental: scan position-mutating events since the last completed
    /// cycle and refresh only the addresses they touched.
    Light,
}

/// Drives one protocol instance: INIT → heavy/light → persist → sleep.
///
/// One scheduler owns all of its state, so several instances can run side by
/// side and be tested in isolation. Counters advance only when a cycle
/// completes without a propagated failure; a failed cycle is retried with the
/// same cycle kind on the next tick, and the snapshot is published either
/// way.
pub struct SyncScheduler {
    config: SyncConfig,
    reader: Arc<dyn ChainReader>,
    adapter: Arc<dyn ProtocolAdapter>,
    scanner: BlockRangeScanner,
    batch_reader: BatchReader,
    registry: UserRegistry,
    snapshot: Snapshot,
    store: SnapshotStore,
}

impl SyncScheduler {
    pub fn new(
        config: SyncConfig,
        reader: Arc<dyn ChainReader>,
        adapter: Arc<dyn ProtocolAdapter>,
        store: SnapshotStore,
    ) -> Self {
        let retry = config.retry_policy();
        let scanner = BlockRangeScanner::new(config.chunk_size, retry.clone());
        let batch_reader = BatchReader::new(config.refresh_strategy, config.multicall_size, retry);

        Self {
            config,
            reader,
            adapter,
            scanner,
            batch_reader,
            registry: UserRegistry::new(),
            snapshot: Snapshot::default(),
            store,
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn registry(&self) -> &UserRegistry {
        &self.registry
    }

    /// Perpetual loop: one cycle per tick, snapshot published after every
    /// cycle whether it succeeded or not. Only shutdown ends the loop.
    pub async fn run(mut self, shutdown: Shutdown) -> Snapshot {
        loop {
            if shutdown.is_cancelled() {
                return self.snapshot;
            }

            match self.run_cycle(&shutdown).await {
                Ok(kind) => {
                    info!(
                        "{kind} cycle complete, {} users known, block {}",
                        self.registry.len(),
                        self.snapshot.state.last_update_block
                    );
                }
                Err(e) if e.is_cancelled() => return self.snapshot,
                Err(e) => {
                    // counters stay frozen so the same cycle kind retries
                    warn!("cycle failed: {e}");
                }
            }

            if let Err(e) = self.store.publish(&self.snapshot) {
                error!("snapshot publish failed: {e}");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.cycle_interval()) => {}
                _ = shutdown.cancelled() => return self.snapshot,
            }
        }
    }

    /// One full update cycle. Counters advance only on `Ok`.
    pub async fn run_cycle(&mut self, shutdown: &Shutdown) -> Result<CycleKind, SyncError> {
        // INIT: markets, prices and risk parameters rebuilt wholesale
        let markets = self.adapter.load_markets(self.reader.as_ref()).await?;
        debug!("loaded {} markets", markets.len());
        self.snapshot.markets = markets;

        let head = self.reader.block_number().await?;
        let curr_block = head.saturating_sub(self.config.confirmation_lag);
        let curr_time = self.reader.block_timestamp(curr_block).await?;

        let kind = self.next_cycle_kind();
        info!("{kind} update start at block {curr_block}");

        match kind {
            CycleKind::Heavy => self.heavy_update(curr_block, shutdown).await?,
            CycleKind::Light => self.light_update(curr_block, shutdown).await?,
        }

        self.snapshot.state.last_update_block = curr_block;
        self.snapshot.state.last_update_time = curr_time;
        self.snapshot.state.cycle_counter += 1;

        Ok(kind)
    }

    fn next_cycle_kind(&self) -> CycleKind {
        let heavy_interval = self.config.heavy_interval.max(1);
        if self.registry.is_empty() || self.snapshot.state.cycle_counter % heavy_interval == 0 {
            CycleKind::Heavy
        } else {
            CycleKind::Light
        }
    }

    async fn heavy_update(&mut self, curr_block: u64, shutdown: &Shutdown) -> Result<(), SyncError> {
        if self.registry.is_empty() {
            let spec = self.adapter.entry_event();
            let logs = self
                .scanner
                .scan(self.reader.as_ref(), &spec, self.config.deploy_block, curr_block, shutdown)
                .await?;

            for log in &logs {
                for address in self.adapter.extract_addresses(&spec, log) {
                    self.registry.add(address);
                }
            }
            info!("full discovery found {} users over {} events", self.registry.len(), logs.len());
        }

        let users: Vec<Address> = self.registry.iter().copied().collect();
        if users.is_empty() {
            return Ok(());
        }

        self.batch_reader
            .refresh(
                self.reader.as_ref(),
                self.adapter.as_ref(),
                &self.snapshot.markets,
                &users,
                &mut self.snapshot.users,
                shutdown,
            )
            .await
    }

    async fn light_update(&mut self, curr_block: u64, shutdown: &Shutdown) -> Result<(), SyncError> {
        let from = self.snapshot.state.last_update_block;

        // an address named by several event kinds still refreshes once
        let mut touched: Vec<Address> = Vec::new();
        let mut seen: HashSet<Address> = HashSet::new();

        for spec in self.adapter.mutation_events() {
            let logs =
                self.scanner.scan(self.reader.as_ref(), &spec, from, curr_block, shutdown).await?;
            for log in &logs {
                for address in self.adapter.extract_addresses(&spec, log) {
                    if seen.insert(address) {
                        touched.push(address);
                    }
                }
            }
        }

        for &address in &touched {
            self.registry.add(address);
        }

        if touched.is_empty() {
            debug!("no position activity in [{from}, {curr_block})");
            return Ok(());
        }

        info!("incremental update touching {} users", touched.len());
        self.batch_reader
            .refresh(
                self.reader.as_ref(),
                self.adapter.as_ref(),
                &self.snapshot.markets,
                &touched,
                &mut self.snapshot.users,
                shutdown,
            )
            .await
    }
}
