//! Client for the Luck3 daily lottery contract on Starknet: typed reads,
//! round pagination and aggregation, polled view stores and wallet-signed
//! write actions.

pub mod abi;
pub mod actions;
pub mod aggregate;
pub mod config;
pub mod cursor;
pub mod error;
pub mod felt;
pub mod gateway;
pub mod poller;
pub mod store;
pub mod transport;
pub mod types;
pub mod wallet;

#[cfg(test)]
mod test_helpers;

pub use actions::{
    Account,
    ActionResult,
    Call,
    LotteryActions,
    TxAction,
    TxRecord,
    TxStatus,
};
pub use aggregate::{
    RoundSource,
    aggregate,
};
pub use config::{
    LotteryConfig,
    Network,
};
pub use cursor::RoundCursor;
pub use error::{
    ErrorKind,
    LotteryError,
    classify,
};
pub use felt::Felt;
pub use gateway::{
    Erc20Gateway,
    LotteryGateway,
};
pub use poller::PollingDriver;
pub use primitive_types::U256;
pub use transport::{
    ContractTransport,
    FunctionCall,
    JsonRpcTransport,
    RpcError,
};
pub use types::*;
pub use wallet::WalletBridge;
