/// Chain transport layer.
///
/// Everything the sync engine knows about the chain goes through the
/// [`ChainReader`] trait: head height, block timestamps, historical log
/// queries and aggregated (Multicall3) read calls. The JSON-RPC
/// implementation lives in [`rpc`]; tests run against [`mock`].
pub mod mock;
pub mod reader;
pub mod rpc;
pub mod types;

pub use mock::{MockAccount, MockChainReader};
pub use reader::ChainReader;
pub use rpc::HttpChainReader;
pub use types::{CallOutcome, CallRequest, LogFilter, RawLog};
