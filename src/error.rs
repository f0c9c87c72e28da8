use alloy_primitives::Address;

/// Transport-level failures of a single RPC round trip.
///
/// These are the errors the retry layer is allowed to retry: the request
/// never produced a usable response, so re-issuing it is safe.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("missing result in RPC response")]
    MissingResult,
    #[error("malformed RPC response field: {0}")]
    MalformedResponse(String),
    #[error(transparent)]
    Hex(#[from] hex::FromHexError),
    #[error("ABI envelope decode failed: {0}")]
    Abi(#[from] alloy_sol_types::Error),
}

/// A single address produced an unusable result inside an otherwise
/// successful batch. Recorded on that user's position, never retried.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("call for {user} returned success=false")]
    CallReverted { user: Address },
    #[error("malformed return data for {user}: {reason}")]
    MalformedReturnData { user: Address, reason: String },
    #[error("position for {user} references unknown asset {asset}")]
    UnknownAsset { user: Address, asset: Address },
    #[error("expected {expected} call results for {user}, got {actual}")]
    ResultCountMismatch { user: Address, expected: usize, actual: usize },
}

/// Errors escaping a sync component. Any variant that reaches the scheduler
/// abandons the current cycle without advancing its counters.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("{operation} failed after {attempts} attempts")]
    RetriesExhausted { operation: String, attempts: u32 },
    #[error("shutdown requested")]
    Cancelled,
}

impl SyncError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }
}
