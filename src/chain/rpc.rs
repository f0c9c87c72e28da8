use crate::chain::reader::ChainReader;
use crate::chain::types::{CallOutcome, CallRequest, LogFilter, RawLog};
use crate::error::TransportError;
use alloy_primitives::{Address, B256, Bytes};
use alloy_sol_types::{SolCall, sol};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

// Standard Multicall3 contract interface
sol! {
    contract Multicall3 {
        struct Call {
            address target;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function tryAggregate(bool requireSuccess, Call[] calldata calls) public returns (Result[] memory returnData);
    }
}

/// JSON-RPC implementation of [`ChainReader`].
///
/// Aggregated reads go through the Multicall3 contract with
/// `requireSuccess=false`, so sub-call reverts come back as per-element
/// failures instead of failing the whole request.
#[derive(Debug, Clone)]
pub struct HttpChainReader {
    multicall_address: Address,
    http_client: reqwest::Client,
    rpc_url: String,
}

impl HttpChainReader {
    pub fn new(rpc_url: String, multicall_address: Address, timeout: Duration) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { multicall_address, http_client, rpc_url })
    }

    async fn rpc_request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let request_body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let response = self
            .http_client
            .post(&self.rpc_url)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let response_json: Value = response.json().await?;

        if let Some(error) = response_json.get("error") {
            return Err(TransportError::Rpc(error.to_string()));
        }

        response_json.get("result").cloned().ok_or(TransportError::MissingResult)
    }

    fn parse_quantity(value: &Value, field: &str) -> Result<u64, TransportError> {
        let text = value.as_str().ok_or_else(|| TransportError::MalformedResponse(field.to_string()))?;
        u64::from_str_radix(text.trim_start_matches("0x"), 16)
            .map_err(|e| TransportError::MalformedResponse(format!("{field}: {e}")))
    }

    fn parse_bytes(value: &Value, field: &str) -> Result<Bytes, TransportError> {
        let text = value.as_str().ok_or_else(|| TransportError::MalformedResponse(field.to_string()))?;
        let bytes = hex::decode(text.trim_start_matches("0x"))?;
        Ok(bytes.into())
    }

    fn parse_log(value: &Value) -> Result<RawLog, TransportError> {
        let address = value
            .get("address")
            .and_then(|a| a.as_str())
            .and_then(|a| a.parse::<Address>().ok())
            .ok_or_else(|| TransportError::MalformedResponse("log address".to_string()))?;

        let topics = value
            .get("topics")
            .and_then(|t| t.as_array())
            .ok_or_else(|| TransportError::MalformedResponse("log topics".to_string()))?
            .iter()
            .map(|t| {
                t.as_str()
                    .and_then(|t| t.parse::<B256>().ok())
                    .ok_or_else(|| TransportError::MalformedResponse("log topic".to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let data = match value.get("data") {
            Some(data) => Self::parse_bytes(data, "log data")?,
            None => Bytes::new(),
        };

        let block_number = Self::parse_quantity(
            value.get("blockNumber").unwrap_or(&Value::Null),
            "log blockNumber",
        )?;

        Ok(RawLog { address, topics, data, block_number })
    }
}

#[async_trait]
impl ChainReader for HttpChainReader {
    async fn block_number(&self) -> Result<u64, TransportError> {
        let result = self.rpc_request("eth_blockNumber", json!([])).await?;
        Self::parse_quantity(&result, "blockNumber")
    }

    async fn block_timestamp(&self, block: u64) -> Result<u64, TransportError> {
        let result = self
            .rpc_request("eth_getBlockByNumber", json!([format!("0x{block:x}"), false]))
            .await?;
        Self::parse_quantity(result.get("timestamp").unwrap_or(&Value::Null), "timestamp")
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, TransportError> {
        // eth_getLogs is inclusive on both ends, the filter range is half-open
        let mut params = json!({
            "fromBlock": format!("0x{:x}", filter.from_block),
            "toBlock": format!("0x{:x}", filter.to_block.saturating_sub(1)),
            "topics": [format!("{:#x}", filter.topic0)],
        });
        if let Some(address) = filter.address {
            params["address"] = json!(format!("{address:#x}"));
        }

        debug!(
            "eth_getLogs topic {:#x} range [{}, {})",
            filter.topic0, filter.from_block, filter.to_block
        );

        let result = self.rpc_request("eth_getLogs", json!([params])).await?;
        let entries = result
            .as_array()
            .ok_or_else(|| TransportError::MalformedResponse("logs".to_string()))?;

        entries.iter().map(Self::parse_log).collect()
    }

    async fn aggregate(&self, calls: &[CallRequest]) -> Result<Vec<CallOutcome>, TransportError> {
        let multicall_calls: Vec<Multicall3::Call> = calls
            .iter()
            .map(|c| Multicall3::Call { target: c.target, callData: c.call_data.clone() })
            .collect();

        let call_data =
            Multicall3::tryAggregateCall { requireSuccess: false, calls: multicall_calls }.abi_encode();

        let response = self.call(self.multicall_address, call_data.into()).await?;
        let decoded = Multicall3::tryAggregateCall::abi_decode_returns(&response)?;

        Ok(decoded
            .into_iter()
            .map(|r| CallOutcome { success: r.success, return_data: r.returnData })
            .collect())
    }

    async fn call(&self, target: Address, data: Bytes) -> Result<Bytes, TransportError> {
        let params = json!([
            {
                "to": format!("{target:#x}"),
                "data": format!("{data:#x}")
            },
            "latest"
        ]);

        let result = self.rpc_request("eth_call", params).await?;
        Self::parse_bytes(&result, "call result")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_creation() {
        let reader = HttpChainReader::new(
            "https://rpc.mantle.xyz".to_string(),
            Address::repeat_byte(0x11),
            Duration::from_secs(10),
        )
        .unwrap();

        assert_eq!(reader.multicall_address, Address::repeat_byte(0x11));
    }

    #[test]
    fn test_try_aggregate_encoding() {
        let calls = vec![Multicall3::Call {
            target: Address::repeat_byte(0x42),
            callData: Bytes::from(vec![0xde, 0xad]),
        }];
        let encoded = Multicall3::tryAggregateCall { requireSuccess: false, calls }.abi_encode();

        assert_eq!(&encoded[0..4], Multicall3::tryAggregateCall::SELECTOR);
    }

    #[test]
    fn test_parse_log() {
        let value = json!({
            "address": "0x1111111111111111111111111111111111111111",
            "topics": ["0x2222222222222222222222222222222222222222222222222222222222222222"],
            "data": "0xdead",
            "blockNumber": "0x10"
        });

        let log = HttpChainReader::parse_log(&value).unwrap();
        assert_eq!(log.address, Address::repeat_byte(0x11));
        assert_eq!(log.topics.len(), 1);
        assert_eq!(log.data.as_ref(), &[0xde, 0xad]);
        assert_eq!(log.block_number, 16);
    }

    #[test]
    fn test_parse_quantity_rejects_garbage() {
        let err = HttpChainReader::parse_quantity(&json!("not-hex"), "blockNumber");
        assert!(matches!(err, Err(TransportError::MalformedResponse(_))));
    }
}
