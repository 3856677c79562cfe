//! State-changing calls. Signing is delegated to an [`Account`]; this module
//! builds the calls, tracks them in a [`TransactionLog`] and waits for the
//! receipt.

use crate::{
    abi::entrypoints,
    config::LotteryConfig,
    error::{
        ErrorKind,
        LotteryError,
        classify,
    },
    felt::{
        Felt,
        u256_to_felts,
    },
    gateway::{
        Erc20Gateway,
        LotteryGateway,
    },
    poller::lock,
    transport::{
        ContractTransport,
        ExecutionStatus,
        FunctionCall,
        TxReceipt,
    },
    types::RoundId,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use primitive_types::U256;
use std::{
    future::Future,
    sync::{
        Arc,
        Mutex,
    },
    time::Duration,
};
use tokio::time::{
    self,
    Instant,
};
use tracing::{
    error,
    info,
};

pub type Call = FunctionCall;

pub type ActionResult<T> = std::result::Result<T, LotteryError>;

pub const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

/// A connected account able to submit an invoke transaction.
pub trait Account: Clone + Send + Sync + 'static {
    fn address(&self) -> Felt;

    /// Submits `calls` as one multicall and returns the transaction hash.
    fn execute(&self, calls: Vec<Call>) -> impl Future<Output = Result<Felt>> + Send;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxAction {
    BuyTicket { round_id: RoundId, guess: u8 },
    ClaimReward { round_id: RoundId },
    CreateRound { duration_seconds: u64 },
    DrawWinner { round_id: RoundId },
    DrawRoundsUpTo { round_id: RoundId },
    TriggerDraw,
    Withdraw { amount: U256 },
}

impl TxAction {
    pub fn label(&self) -> String {
        match self {
            TxAction::BuyTicket { round_id, guess } => {
                format!("Buy ticket #{round_id} guess {guess}")
            }
            TxAction::ClaimReward { round_id } => format!("Claim reward #{round_id}"),
            TxAction::CreateRound { duration_seconds } => {
                format!("Create round ({duration_seconds}s)")
            }
            TxAction::DrawWinner { round_id } => format!("Draw winner #{round_id}"),
            TxAction::DrawRoundsUpTo { round_id } => format!("Draw rounds up to #{round_id}"),
            TxAction::TriggerDraw => "Trigger draw".to_string(),
            TxAction::Withdraw { .. } => "Withdraw prize pool".to_string(),
        }
    }

    fn failure_context(&self) -> &'static str {
        match self {
            TxAction::BuyTicket { .. } => "Failed to buy ticket",
            TxAction::ClaimReward { .. } => "Failed to claim reward",
            TxAction::CreateRound { .. } => "Failed to create round",
            TxAction::DrawWinner { .. } => "Failed to draw winner",
            TxAction::DrawRoundsUpTo { .. } => "Failed to draw rounds",
            TxAction::TriggerDraw => "Failed to trigger draw",
            TxAction::Withdraw { .. } => "Failed to withdraw prize pool",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxStatus {
    Pending,
    Success,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxRecord {
    pub id: u64,
    pub action: TxAction,
    /// `None` until the account hands back a hash.
    pub hash: Option<Felt>,
    pub status: TxStatus,
    pub error: Option<String>,
}

/// Session log of submitted transactions, newest last.
#[derive(Clone, Debug, Default)]
pub struct TransactionLog {
    next_id: u64,
    records: Vec<TxRecord>,
}

impl TransactionLog {
    /// Inserts a pending placeholder.
    pub fn begin(&mut self, action: TxAction) -> u64 {
        self.next_id += 1;
        self.records.push(TxRecord {
            id: self.next_id,
            action,
            hash: None,
            status: TxStatus::Pending,
            error: None,
        });
        self.next_id
    }

    pub fn submitted(&mut self, id: u64, hash: Felt) {
        if let Some(record) = self.get_mut(id) {
            record.hash = Some(hash);
        }
    }

    pub fn settle(&mut self, id: u64, status: TxStatus, error: Option<String>) {
        if let Some(record) = self.get_mut(id) {
            record.status = status;
            record.error = error;
        }
    }

    /// Drops a placeholder whose submission failed.
    pub fn abandon(&mut self, id: u64) {
        self.records.retain(|r| r.id != id);
    }

    pub fn records(&self) -> &[TxRecord] {
        &self.records
    }

    fn get_mut(&mut self, id: u64) -> Option<&mut TxRecord> {
        self.records.iter_mut().find(|r| r.id == id)
    }
}

#[derive(Clone)]
pub struct LotteryActions<T, A> {
    lottery: LotteryGateway<T>,
    token: Erc20Gateway<T>,
    account: A,
    config: LotteryConfig,
    log: Arc<Mutex<TransactionLog>>,
    receipt_poll_interval: Duration,
    receipt_timeout: Duration,
}

impl<T: ContractTransport, A: Account> LotteryActions<T, A> {
    pub fn new(transport: T, account: A, config: LotteryConfig) -> Self {
        Self {
            lottery: LotteryGateway::new(transport.clone(), config.contract_address),
            token: Erc20Gateway::new(transport, config.token_address),
            account,
            config,
            log: Arc::new(Mutex::new(TransactionLog::default())),
            receipt_poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
        }
    }

    pub fn with_receipt_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.receipt_poll_interval = interval;
        self.receipt_timeout = timeout;
        self
    }

    pub fn address(&self) -> Felt {
        self.account.address()
    }

    pub fn transactions(&self) -> Vec<TxRecord> {
        lock(&self.log).records().to_vec()
    }

    /// True when the connected account owns the lottery contract.
    pub async fn is_owner(&self) -> Result<bool> {
        let info = self.lottery.get_info().await?;
        Ok(info.owner == self.account.address())
    }

    /// Buys one ticket, approving the ticket cost first in the same
    /// multicall when the current allowance does not cover it.
    pub async fn buy_ticket(&self, round_id: RoundId, guess: u8) -> ActionResult<Felt> {
        let action = TxAction::BuyTicket { round_id, guess };
        if !self.config.guess_in_range(guess) {
            return Err(LotteryError::validation(format!(
                "Guess must be between {} and {}",
                self.config.min_guess, self.config.max_guess
            )));
        }

        let calls = self
            .ticket_calls(round_id, guess)
            .await
            .map_err(|err| self.fail(&action, &err))?;
        self.submit(action, calls).await
    }

    async fn ticket_calls(&self, round_id: RoundId, guess: u8) -> Result<Vec<Call>> {
        let owner = self.account.address();
        let lottery = self.lottery.contract_address();
        let cost = self.config.ticket_cost;

        let balance = self.token.balance_of(owner).await?;
        if balance < cost {
            return Err(LotteryError::insufficient_funds(
                "Insufficient STRK balance to purchase ticket",
            )
            .into());
        }

        let mut calls = Vec::with_capacity(2);
        let allowance = self.token.allowance(owner, lottery).await?;
        if allowance < cost {
            let [low, high] = u256_to_felts(cost);
            calls.push(Call::new(
                self.token.token_address(),
                entrypoints::APPROVE,
                vec![lottery, low, high],
            ));
        }
        calls.push(Call::new(
            lottery,
            entrypoints::BUY_TICKET,
            vec![Felt::from(round_id), Felt::from(guess)],
        ));
        Ok(calls)
    }

    pub async fn claim_reward(&self, round_id: RoundId) -> ActionResult<Felt> {
        require_round_id(round_id)?;
        self.submit_one(
            TxAction::ClaimReward { round_id },
            entrypoints::CLAIM_REWARD,
            vec![Felt::from(round_id)],
        )
        .await
    }

    pub async fn create_round(&self, duration_seconds: u64) -> ActionResult<Felt> {
        if duration_seconds == 0 {
            return Err(LotteryError::validation("Round duration must be positive"));
        }
        self.submit_one(
            TxAction::CreateRound { duration_seconds },
            entrypoints::CREATE_ROUND,
            vec![Felt::from(duration_seconds)],
        )
        .await
    }

    pub async fn draw_winner(&self, round_id: RoundId) -> ActionResult<Felt> {
        require_round_id(round_id)?;
        self.submit_one(
            TxAction::DrawWinner { round_id },
            entrypoints::DRAW_WINNER,
            vec![Felt::from(round_id)],
        )
        .await
    }

    pub async fn draw_rounds_up_to(&self, round_id: RoundId) -> ActionResult<Felt> {
        require_round_id(round_id)?;
        self.submit_one(
            TxAction::DrawRoundsUpTo { round_id },
            entrypoints::DRAW_ROUNDS_UP_TO,
            vec![Felt::from(round_id)],
        )
        .await
    }

    pub async fn withdraw_accumulated_prize_pool(&self, amount: U256) -> ActionResult<Felt> {
        if amount.is_zero() {
            return Err(LotteryError::validation("Withdraw amount must be positive"));
        }
        let [low, high] = u256_to_felts(amount);
        self.submit_one(
            TxAction::Withdraw { amount },
            entrypoints::WITHDRAW_ACCUMULATED_PRIZE_POOL,
            vec![low, high],
        )
        .await
    }

    /// `None` when there was nothing to draw. Only a wallet rejection is
    /// reported as an error.
    pub async fn trigger_draw_if_expired(&self) -> ActionResult<Option<Felt>> {
        match self
            .submit_one(
                TxAction::TriggerDraw,
                entrypoints::TRIGGER_DRAW_IF_EXPIRED,
                Vec::new(),
            )
            .await
        {
            Ok(hash) => Ok(Some(hash)),
            Err(err) if err.kind == ErrorKind::Contract => {
                info!(%err, "no expired round to draw");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn submit_one(
        &self,
        action: TxAction,
        entrypoint: &'static str,
        calldata: Vec<Felt>,
    ) -> ActionResult<Felt> {
        let call = Call::new(self.lottery.contract_address(), entrypoint, calldata);
        self.submit(action, vec![call]).await
    }

    async fn submit(&self, action: TxAction, calls: Vec<Call>) -> ActionResult<Felt> {
        let id = lock(&self.log).begin(action.clone());

        let hash = match self.account.execute(calls).await {
            Ok(hash) => hash,
            Err(err) => {
                lock(&self.log).abandon(id);
                return Err(self.fail(&action, &err));
            }
        };
        lock(&self.log).submitted(id, hash);
        info!(action = %action.label(), %hash, "transaction submitted");

        let outcome = self
            .wait_for_receipt(hash)
            .await
            .and_then(|receipt| match receipt.execution_status {
                ExecutionStatus::Succeeded => Ok(()),
                ExecutionStatus::Reverted => Err(eyre!(
                    "transaction {hash} reverted: {}",
                    receipt.revert_reason.unwrap_or_default()
                )),
            });
        match outcome {
            Ok(()) => {
                lock(&self.log).settle(id, TxStatus::Success, None);
                info!(action = %action.label(), %hash, "transaction confirmed");
                Ok(hash)
            }
            Err(err) => {
                let failure = self.fail(&action, &err);
                lock(&self.log).settle(id, TxStatus::Failed, Some(failure.message.clone()));
                Err(failure)
            }
        }
    }

    /// Polls for the receipt until the node knows the transaction.
    pub async fn wait_for_receipt(&self, hash: Felt) -> Result<TxReceipt> {
        let deadline = Instant::now() + self.receipt_timeout;
        loop {
            if let Some(receipt) = self.lottery.transport().transaction_receipt(hash).await? {
                return Ok(receipt);
            }
            if Instant::now() >= deadline {
                return Err(eyre!(
                    "transaction {hash} not confirmed after {:?}",
                    self.receipt_timeout
                ));
            }
            time::sleep(self.receipt_poll_interval).await;
        }
    }

    fn fail(&self, action: &TxAction, err: &color_eyre::Report) -> LotteryError {
        let failure = classify(action.failure_context(), err);
        error!(action = %action.label(), ?err, kind = failure.kind.as_str(), "action failed");
        failure
    }
}

fn require_round_id(round_id: RoundId) -> ActionResult<()> {
    if round_id == 0 {
        return Err(LotteryError::validation("Round id is required"));
    }
    Ok(())
}
