use crate::felt::{
    Felt,
    selector,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use serde::{
    Deserialize,
    Serialize,
    de::DeserializeOwned,
};
use serde_json::{
    Value,
    json,
};
use std::{
    fmt,
    future::Future,
    sync::{
        Arc,
        atomic::{
            AtomicU64,
            Ordering,
        },
    },
};

/// Starknet JSON-RPC error codes the client reacts to.
pub const CONTRACT_ERROR_CODE: i64 = 40;
pub const TXN_HASH_NOT_FOUND_CODE: i64 = 29;

/// Failure of a single RPC exchange, kept typed so callers can tell a revert
/// from a transport problem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RpcError {
    Network(String),
    Contract { code: i64, message: String },
    Decode(String),
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::Network(msg) => write!(f, "rpc transport failed: {msg}"),
            RpcError::Contract { code, message } => {
                write!(f, "rpc error {code}: {message}")
            }
            RpcError::Decode(msg) => write!(f, "invalid rpc payload: {msg}"),
        }
    }
}

impl std::error::Error for RpcError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionCall {
    pub contract_address: Felt,
    pub entrypoint: &'static str,
    pub calldata: Vec<Felt>,
}

impl FunctionCall {
    pub fn new(
        contract_address: Felt,
        entrypoint: &'static str,
        calldata: Vec<Felt>,
    ) -> Self {
        Self {
            contract_address,
            entrypoint,
            calldata,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Succeeded,
    Reverted,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TxReceipt {
    pub transaction_hash: Felt,
    pub execution_status: ExecutionStatus,
    #[serde(default)]
    pub revert_reason: Option<String>,
}

/// Read access to the chain. Implementations must be cheap to clone and safe
/// to call concurrently.
pub trait ContractTransport: Clone + Send + Sync + 'static {
    /// Executes a view call and returns the raw JSON result.
    fn call(&self, call: &FunctionCall) -> impl Future<Output = Result<Value>> + Send;

    /// `None` while the transaction is not yet known to the node.
    fn transaction_receipt(
        &self,
        hash: Felt,
    ) -> impl Future<Output = Result<Option<TxReceipt>>> + Send;
}

#[derive(Clone)]
pub struct JsonRpcTransport {
    url: String,
    http: reqwest::Client,
    next_id: Arc<AtomicU64>,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorDto>,
}

#[derive(Deserialize)]
struct RpcErrorDto {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl RpcErrorDto {
    fn into_error(self) -> RpcError {
        let message = match self.data {
            Some(data) => format!("{}: {}", self.message, revert_text(&data)),
            None => self.message,
        };
        RpcError::Contract {
            code: self.code,
            message,
        }
    }
}

/// Pulls the human readable part out of an error `data` payload.
fn revert_text(data: &Value) -> String {
    match data {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("revert_error")
            .or_else(|| map.get("execution_error"))
            .map(revert_text)
            .unwrap_or_else(|| data.to_string()),
        other => other.to_string(),
    }
}

pub fn call_params(call: &FunctionCall) -> Value {
    json!({
        "request": {
            "contract_address": call.contract_address,
            "entry_point_selector": selector(call.entrypoint),
            "calldata": call.calldata,
        },
        "block_id": "latest",
    })
}

impl JsonRpcTransport {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .build()
            .wrap_err("failed to build HTTP client for rpc")?;
        Ok(Self {
            url,
            http,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub(crate) async fn request<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> std::result::Result<R, RpcError> {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        let res = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::Network(e.to_string()))?;
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .map_err(|e| RpcError::Network(e.to_string()))?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            return Err(RpcError::Network(format!(
                "rpc responded with {status} to {method}: {body}"
            )));
        }
        parse_response(&bytes)
    }
}

pub(crate) fn parse_response<R: DeserializeOwned>(
    bytes: &[u8],
) -> std::result::Result<R, RpcError> {
    let envelope: RpcResponse<R> =
        serde_json::from_slice(bytes).map_err(|e| RpcError::Decode(e.to_string()))?;
    if let Some(error) = envelope.error {
        return Err(error.into_error());
    }
    envelope
        .result
        .ok_or_else(|| RpcError::Decode("response has neither result nor error".into()))
}

impl ContractTransport for JsonRpcTransport {
    async fn call(&self, call: &FunctionCall) -> Result<Value> {
        let value = self
            .request::<Value>("starknet_call", call_params(call))
            .await
            .wrap_err_with(|| format!("starknet_call {} failed", call.entrypoint))?;
        Ok(value)
    }

    async fn transaction_receipt(&self, hash: Felt) -> Result<Option<TxReceipt>> {
        let params = json!({ "transaction_hash": hash });
        match self
            .request::<TxReceipt>("starknet_getTransactionReceipt", params)
            .await
        {
            Ok(receipt) => Ok(Some(receipt)),
            Err(RpcError::Contract { code, .. }) if code == TXN_HASH_NOT_FOUND_CODE => {
                Ok(None)
            }
            Err(err) => {
                Err(err).wrap_err_with(|| format!("receipt lookup for {hash} failed"))
            }
        }
    }
}

/// True when the report carries a contract revert rather than a transport or
/// decoding failure.
pub fn is_contract_revert(err: &color_eyre::Report) -> bool {
    matches!(
        err.downcast_ref::<RpcError>(),
        Some(RpcError::Contract { code, .. }) if *code == CONTRACT_ERROR_CODE
    )
}
