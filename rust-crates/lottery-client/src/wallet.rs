//! [`Account`] backed by an external wallet that speaks the Starknet wallet
//! JSON-RPC methods. Keys never enter this process.

use crate::{
    actions::{
        Account,
        Call,
    },
    felt::Felt,
    transport::{
        JsonRpcTransport,
        RpcError,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use serde::Deserialize;
use serde_json::{
    Value,
    json,
};
use tracing::{
    debug,
    info,
};

pub const USER_ABORTED_CODE: i64 = 113;

#[derive(Clone)]
pub struct WalletBridge {
    rpc: JsonRpcTransport,
    address: Felt,
}

#[derive(Deserialize)]
struct InvokeResult {
    transaction_hash: Felt,
}

impl WalletBridge {
    /// Asks the wallet for its accounts and binds to the first one.
    pub async fn connect(url: impl Into<String>) -> Result<Self> {
        let rpc = JsonRpcTransport::new(url)?;
        let accounts: Vec<Felt> = rpc
            .request("wallet_requestAccounts", json!({}))
            .await
            .map_err(wallet_error)
            .wrap_err_with(|| format!("wallet at {} refused to connect", rpc.url()))?;
        let address = accounts
            .first()
            .copied()
            .ok_or_else(|| eyre!("wallet returned no accounts"))?;
        info!(%address, "wallet connected");
        Ok(Self { rpc, address })
    }

    pub fn url(&self) -> &str {
        self.rpc.url()
    }
}

/// Wallet RPC params; the wallet API names the entrypoint rather than its
/// selector.
pub fn invoke_params(calls: &[Call]) -> Value {
    let calls: Vec<Value> = calls
        .iter()
        .map(|call| {
            json!({
                "contract_address": call.contract_address,
                "entry_point": call.entrypoint,
                "calldata": call.calldata,
            })
        })
        .collect();
    json!({ "calls": calls })
}

fn wallet_error(err: RpcError) -> color_eyre::Report {
    match err {
        RpcError::Contract { code, message } if code == USER_ABORTED_CODE => {
            eyre!("user abort: {message}")
        }
        other => other.into(),
    }
}

impl Account for WalletBridge {
    fn address(&self) -> Felt {
        self.address
    }

    async fn execute(&self, calls: Vec<Call>) -> Result<Felt> {
        let names: Vec<_> = calls.iter().map(|c| c.entrypoint).collect();
        debug!(?names, "sending invoke to wallet");
        let result: InvokeResult = self
            .rpc
            .request("wallet_addInvokeTransaction", invoke_params(&calls))
            .await
            .map_err(wallet_error)
            .wrap_err_with(|| format!("wallet invoke of {names:?} failed"))?;
        Ok(result.transaction_hash)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::error::{
        ErrorKind,
        classify,
    };

    #[test]
    fn invoke_params__names_entrypoints_and_hex_encodes_calldata() {
        // given
        let calls = vec![Call::new(
            Felt::from(0x10u64),
            "buy_ticket",
            vec![Felt::from(3u64), Felt::from(42u64)],
        )];

        // when
        let params = invoke_params(&calls);

        // then
        assert_eq!(
            params,
            json!({
                "calls": [{
                    "contract_address": "0x10",
                    "entry_point": "buy_ticket",
                    "calldata": ["0x3", "0x2a"],
                }]
            })
        );
    }

    #[test]
    fn wallet_error__user_abort_classifies_as_wallet() {
        let err = wallet_error(RpcError::Contract {
            code: USER_ABORTED_CODE,
            message: "An error occurred (USER_REFUSED_OP)".into(),
        });
        assert_eq!(classify("Failed to buy ticket", &err).kind, ErrorKind::Wallet);
    }

    #[test]
    fn wallet_error__other_codes_stay_typed() {
        let err = wallet_error(RpcError::Network("refused".into()));
        assert!(matches!(
            err.downcast_ref::<RpcError>(),
            Some(RpcError::Network(_))
        ));
    }
}
