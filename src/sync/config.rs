use crate::sync::batch::RefreshStrategy;
use crate::sync::retry::RetryPolicy;
use alloy_primitives::Address;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Configuration for one protocol sync instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// HTTP RPC URL for log queries and read calls.
    pub rpc_http_url: String,
    /// Multicall3 contract address.
    pub multicall_address: String,
    /// Block the protocol was deployed at; full discovery starts here.
    pub deploy_block: u64,
    /// Block span of a single historical log query (RPC providers cap range).
    pub chunk_size: u64,
    /// Maximum sub-calls per aggregated position refresh.
    pub multicall_size: usize,
    /// Every Nth cycle is a heavy (full-resync) cycle.
    pub heavy_interval: u64,
    /// Trailing blocks excluded from scans to sidestep reorgs.
    pub confirmation_lag: u64,
    /// Sleep between cycles, measured from cycle completion.
    pub cycle_interval_secs: u64,
    /// Timeout for a single HTTP request.
    pub http_timeout_secs: u64,
    /// Retry bound for one RPC operation.
    pub max_retry_attempts: u32,
    /// First backoff delay; doubles per attempt.
    pub retry_base_delay_secs: u64,
    /// Backoff cap.
    pub retry_max_delay_secs: u64,
    /// How positions are refreshed: aggregated multicall or one call per address.
    pub refresh_strategy: RefreshStrategy,
    /// Snapshot file path for the JSON sink.
    pub snapshot_path: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            rpc_http_url: "https://rpc.mantle.xyz".to_string(),
            // Standard Multicall3 address (deployed on most chains)
            multicall_address: "0xcA11bde05977b3631167028862bE2a173976CA11".to_string(),
            deploy_block: 0,
            chunk_size: 50_000,
            multicall_size: 200,
            heavy_interval: 24,
            confirmation_lag: 10,
            cycle_interval_secs: 3600,
            http_timeout_secs: 10,
            max_retry_attempts: 5,
            retry_base_delay_secs: 5,
            retry_max_delay_secs: 60,
            refresh_strategy: RefreshStrategy::Aggregated,
            snapshot_path: "data.json".to_string(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> eyre::Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> eyre::Result<Self> {
        let mut config = Self::default();

        if let Some(rpc_http_url) = get("RPC_HTTP_URL") {
            let _url = Url::parse(&rpc_http_url).map_err(|e| eyre::eyre!("Invalid RPC_HTTP_URL: {}", e))?;
            config.rpc_http_url = rpc_http_url;
        }

        if let Some(multicall_address) = get("MULTICALL_ADDRESS") {
            config.multicall_address = multicall_address;
        }

        if let Some(deploy_block) = get("DEPLOY_BLOCK") {
            config.deploy_block =
                deploy_block.parse().map_err(|e| eyre::eyre!("Invalid DEPLOY_BLOCK: {}", e))?;
        }

        if let Some(chunk_size) = get("BLOCK_CHUNK_SIZE") {
            config.chunk_size =
                chunk_size.parse().map_err(|e| eyre::eyre!("Invalid BLOCK_CHUNK_SIZE: {}", e))?;
        }

        if let Some(multicall_size) = get("MULTICALL_SIZE") {
            config.multicall_size =
                multicall_size.parse().map_err(|e| eyre::eyre!("Invalid MULTICALL_SIZE: {}", e))?;
        }

        if let Some(heavy_interval) = get("HEAVY_INTERVAL") {
            config.heavy_interval =
                heavy_interval.parse().map_err(|e| eyre::eyre!("Invalid HEAVY_INTERVAL: {}", e))?;
        }

        if let Some(confirmation_lag) = get("CONFIRMATION_LAG") {
            config.confirmation_lag =
                confirmation_lag.parse().map_err(|e| eyre::eyre!("Invalid CONFIRMATION_LAG: {}", e))?;
        }

        if let Some(cycle_interval) = get("CYCLE_INTERVAL_SECS") {
            config.cycle_interval_secs =
                cycle_interval.parse().map_err(|e| eyre::eyre!("Invalid CYCLE_INTERVAL_SECS: {}", e))?;
        }

        if let Some(timeout) = get("HTTP_TIMEOUT_SECS") {
            config.http_timeout_secs =
                timeout.parse().map_err(|e| eyre::eyre!("Invalid HTTP_TIMEOUT_SECS: {}", e))?;
        }

        if let Some(max_attempts) = get("MAX_RETRY_ATTEMPTS") {
            config.max_retry_attempts =
                max_attempts.parse().map_err(|e| eyre::eyre!("Invalid MAX_RETRY_ATTEMPTS: {}", e))?;
        }

        if let Some(base_delay) = get("RETRY_BASE_DELAY_SECS") {
            config.retry_base_delay_secs =
                base_delay.parse().map_err(|e| eyre::eyre!("Invalid RETRY_BASE_DELAY_SECS: {}", e))?;
        }

        if let Some(max_delay) = get("RETRY_MAX_DELAY_SECS") {
            config.retry_max_delay_secs =
                max_delay.parse().map_err(|e| eyre::eyre!("Invalid RETRY_MAX_DELAY_SECS: {}", e))?;
        }

        if let Some(strategy) = get("REFRESH_STRATEGY") {
            config.refresh_strategy =
                strategy.parse().map_err(|e| eyre::eyre!("Invalid REFRESH_STRATEGY: {}", e))?;
        }

        if let Some(snapshot_path) = get("SNAPSHOT_PATH") {
            config.snapshot_path = snapshot_path;
        }

        Ok(config)
    }

    pub fn multicall_address(&self) -> eyre::Result<Address> {
        self.multicall_address
            .parse::<Address>()
            .map_err(|e| eyre::eyre!("Invalid multicall address: {}", e))
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retry_attempts,
            base_delay: Duration::from_secs(self.retry_base_delay_secs),
            max_delay: Duration::from_secs(self.retry_max_delay_secs),
        }
    }
}
