//! Scripted transport and account used by the unit tests.

use crate::{
    actions::{
        Account,
        Call,
    },
    felt::Felt,
    transport::{
        CONTRACT_ERROR_CODE,
        ContractTransport,
        ExecutionStatus,
        FunctionCall,
        RpcError,
        TxReceipt,
    },
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use serde_json::Value;
use std::{
    collections::{
        HashMap,
        VecDeque,
    },
    sync::{
        Arc,
        Mutex,
    },
    time::Duration,
};

#[derive(Clone, Debug)]
enum Scripted {
    Value(Value),
    Network,
    Revert(String),
}

type CallKey = (&'static str, Vec<Felt>);

#[derive(Default)]
struct FakeState {
    exact: HashMap<CallKey, Scripted>,
    by_entrypoint: HashMap<&'static str, Scripted>,
    delays: HashMap<CallKey, Duration>,
    receipts: HashMap<Felt, VecDeque<Option<TxReceipt>>>,
    calls: Vec<FunctionCall>,
}

#[derive(Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, entrypoint: &'static str, calldata: Vec<Felt>, value: Value) {
        self.state
            .lock()
            .unwrap()
            .exact
            .insert((entrypoint, calldata), Scripted::Value(value));
    }

    pub fn respond_any(&self, entrypoint: &'static str, value: Value) {
        self.state
            .lock()
            .unwrap()
            .by_entrypoint
            .insert(entrypoint, Scripted::Value(value));
    }

    pub fn fail_network(&self, entrypoint: &'static str) {
        self.state
            .lock()
            .unwrap()
            .by_entrypoint
            .insert(entrypoint, Scripted::Network);
    }

    pub fn fail_network_for(&self, entrypoint: &'static str, calldata: Vec<Felt>) {
        self.state
            .lock()
            .unwrap()
            .exact
            .insert((entrypoint, calldata), Scripted::Network);
    }

    pub fn fail_revert(&self, entrypoint: &'static str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .by_entrypoint
            .insert(entrypoint, Scripted::Revert(message.to_string()));
    }

    pub fn delay(&self, entrypoint: &'static str, calldata: Vec<Felt>, delay: Duration) {
        self.state
            .lock()
            .unwrap()
            .delays
            .insert((entrypoint, calldata), delay);
    }

    pub fn push_receipt(&self, hash: Felt, receipt: Option<TxReceipt>) {
        self.state
            .lock()
            .unwrap()
            .receipts
            .entry(hash)
            .or_default()
            .push_back(receipt);
    }

    pub fn calls(&self) -> Vec<FunctionCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, entrypoint: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.entrypoint == entrypoint)
            .count()
    }
}

impl ContractTransport for FakeTransport {
    async fn call(&self, call: &FunctionCall) -> Result<Value> {
        let key = (call.entrypoint, call.calldata.clone());
        let (scripted, delay) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call.clone());
            let scripted = state
                .exact
                .get(&key)
                .or_else(|| state.by_entrypoint.get(call.entrypoint))
                .cloned();
            (scripted, state.delays.get(&key).copied())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match scripted {
            Some(Scripted::Value(value)) => Ok(value),
            Some(Scripted::Network) => {
                Err(RpcError::Network("connection refused".into()).into())
            }
            Some(Scripted::Revert(message)) => Err(RpcError::Contract {
                code: CONTRACT_ERROR_CODE,
                message,
            }
            .into()),
            None => Err(eyre!(
                "no scripted response for {} {:?}",
                call.entrypoint,
                call.calldata
            )),
        }
    }

    async fn transaction_receipt(&self, hash: Felt) -> Result<Option<TxReceipt>> {
        let mut state = self.state.lock().unwrap();
        let queue = state.receipts.entry(hash).or_default();
        // the last scripted receipt sticks once the queue drains to it
        if queue.len() > 1 {
            Ok(queue.pop_front().flatten())
        } else {
            Ok(queue.front().cloned().flatten())
        }
    }
}

pub fn succeeded(hash: Felt) -> TxReceipt {
    TxReceipt {
        transaction_hash: hash,
        execution_status: ExecutionStatus::Succeeded,
        revert_reason: None,
    }
}

#[derive(Clone)]
pub struct FakeAccount {
    address: Felt,
    next_hash: Felt,
    rejection: Option<String>,
    offline: bool,
    executed: Arc<Mutex<Vec<Vec<Call>>>>,
}

impl FakeAccount {
    pub fn new(address: Felt, next_hash: Felt) -> Self {
        Self {
            address,
            next_hash,
            rejection: None,
            offline: false,
            executed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn rejecting(mut self, message: &str) -> Self {
        self.rejection = Some(message.to_string());
        self
    }

    /// Every execution fails as if the wallet bridge were unreachable.
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    pub fn executed(&self) -> Vec<Vec<Call>> {
        self.executed.lock().unwrap().clone()
    }
}

impl Account for FakeAccount {
    fn address(&self) -> Felt {
        self.address
    }

    async fn execute(&self, calls: Vec<Call>) -> Result<Felt> {
        if self.offline {
            return Err(RpcError::Network("connection refused".into()).into());
        }
        if let Some(message) = &self.rejection {
            return Err(eyre!("{message}"));
        }
        self.executed.lock().unwrap().push(calls);
        Ok(self.next_hash)
    }
}
