use crate::{
    format::{
        format_round_id,
        parse_amount,
    },
    ui::{
        self,
        AdminAction,
        UserEvent,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use luck3_client::{
    ActionResult,
    ErrorKind,
    Felt,
    JsonRpcTransport,
    LotteryActions,
    LotteryConfig,
    LotteryError,
    LotteryGateway,
    Network,
    RoundId,
    TxRecord,
    U256,
    WalletBridge,
    classify,
    store::{
        HistoryPage,
        HistorySnapshot,
        LotterySnapshot,
        LotteryView,
        OverviewPage,
        OverviewSnapshot,
    },
    unix_now,
};
use std::time::Duration;
use tokio::time;
use tracing::{
    error,
    info,
    warn,
};

const REDRAW_INTERVAL: Duration = Duration::from_secs(1);
const MAX_SHOWN_ERRORS: usize = 5;

type Actions = LotteryActions<JsonRpcTransport, WalletBridge>;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub lottery: LotteryConfig,
    pub wallet_url: Option<String>,
    /// Read-only viewer used when no wallet is connected.
    pub viewer: Option<Felt>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tab {
    #[default]
    Home,
    Lottery,
    History,
}

impl Tab {
    pub fn next(self) -> Tab {
        match self {
            Tab::Home => Tab::Lottery,
            Tab::Lottery => Tab::History,
            Tab::History => Tab::Home,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub tab: Tab,
    pub network: Network,
    pub viewer: Option<Felt>,
    pub wallet_connected: bool,
    pub is_owner: bool,
    pub overview: OverviewSnapshot,
    pub lottery: LotterySnapshot,
    pub history: HistorySnapshot,
    pub transactions: Vec<TxRecord>,
    pub status: String,
    pub errors: Vec<String>,
    pub now: u64,
    pub ticket_cost: U256,
    pub min_guess: u8,
    pub max_guess: u8,
}

pub struct AppController {
    config: LotteryConfig,
    tab: Tab,
    overview: OverviewPage<JsonRpcTransport>,
    lottery: LotteryView<JsonRpcTransport>,
    history: HistoryPage<LotteryGateway<JsonRpcTransport>>,
    gateway: LotteryGateway<JsonRpcTransport>,
    actions: Option<Actions>,
    viewer: Option<Felt>,
    is_owner: bool,
    status: String,
    errors: Vec<String>,
}

impl AppController {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let AppConfig {
            lottery: lottery_config,
            wallet_url,
            viewer,
        } = config;
        let transport = JsonRpcTransport::new(lottery_config.rpc_url.clone())?;
        let gateway = LotteryGateway::new(transport.clone(), lottery_config.contract_address);

        let actions = match wallet_url {
            Some(url) => {
                let wallet = WalletBridge::connect(url)
                    .await
                    .wrap_err("connecting to the wallet bridge failed")?;
                Some(LotteryActions::new(
                    transport.clone(),
                    wallet,
                    lottery_config.clone(),
                ))
            }
            None => None,
        };
        let viewer = actions.as_ref().map(|a| a.address()).or(viewer);

        let is_owner = match &actions {
            Some(actions) => actions.is_owner().await.unwrap_or_else(|err| {
                warn!(?err, "could not read contract owner");
                false
            }),
            None => false,
        };
        info!(?viewer, is_owner, network = %lottery_config.network, "client ready");

        Ok(Self {
            config: lottery_config,
            tab: Tab::Home,
            overview: OverviewPage::new(gateway.clone()),
            lottery: LotteryView::new(gateway.clone()),
            history: HistoryPage::new(gateway.clone()),
            gateway,
            actions,
            viewer,
            is_owner,
            status: String::from("Ready"),
            errors: Vec::new(),
        })
    }

    pub fn snapshot(&self) -> AppSnapshot {
        AppSnapshot {
            tab: self.tab,
            network: self.config.network,
            viewer: self.viewer,
            wallet_connected: self.actions.is_some(),
            is_owner: self.is_owner,
            overview: self.overview.snapshot(),
            lottery: self.lottery.snapshot(),
            history: self.history.snapshot(),
            transactions: self
                .actions
                .as_ref()
                .map(|a| a.transactions())
                .unwrap_or_default(),
            status: self.status.clone(),
            errors: self.errors.iter().rev().take(MAX_SHOWN_ERRORS).cloned().collect(),
            now: unix_now(),
            ticket_cost: self.config.ticket_cost,
            min_guess: self.config.min_guess,
            max_guess: self.config.max_guess,
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    fn push_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        if self.errors.len() > MAX_SHOWN_ERRORS * 4 {
            self.errors.drain(..self.errors.len() - MAX_SHOWN_ERRORS);
        }
    }

    fn clear_errors(&mut self) {
        self.errors.clear();
    }

    /// Unmounts the current view and mounts `tab`; only the visible view
    /// polls.
    pub async fn enter_tab(&mut self, tab: Tab) {
        match self.tab {
            Tab::Home => self.overview.unmount(),
            Tab::Lottery => self.lottery.unmount(),
            Tab::History => self.history.unmount(),
        }
        self.tab = tab;
        self.mount_current().await;
    }

    async fn mount_current(&mut self) {
        match self.tab {
            Tab::Home => self.overview.mount().await,
            Tab::Lottery => self.lottery.set_viewer(self.viewer).await,
            Tab::History => {
                if let Err(err) = self.history.mount(self.viewer).await {
                    self.push_error(format!("Failed to load history: {err:#}"));
                }
            }
        }
    }

    pub async fn refresh(&mut self) {
        match self.tab {
            Tab::Home => self.overview.refresh().await,
            Tab::Lottery => self.lottery.refresh().await,
            Tab::History => self.history.refresh().await,
        }
    }

    pub async fn load_more_history(&mut self) {
        match self.history.load_more().await {
            Ok(true) => {}
            Ok(false) => self.set_status("Nothing more to load"),
            Err(err) => self.push_error(format!("Failed to load history: {err:#}")),
        }
    }

    fn actions(&self) -> ActionResult<&Actions> {
        self.actions.as_ref().ok_or_else(|| {
            LotteryError::new(ErrorKind::Wallet, "Connect a wallet to send transactions")
        })
    }

    pub async fn buy_ticket(&mut self, guess: u8) -> ActionResult<Felt> {
        let actions = self.actions()?;
        let current = self
            .gateway
            .get_current_round_info()
            .await
            .map_err(|err| classify("Failed to buy ticket", &err))?;
        if current.round_id == 0 {
            return Err(LotteryError::validation("No active round to buy a ticket for"));
        }
        actions.buy_ticket(current.round_id, guess).await
    }

    pub async fn claim_reward(&mut self, round_id: RoundId) -> ActionResult<Felt> {
        self.actions()?.claim_reward(round_id).await
    }

    pub async fn run_admin(
        &mut self,
        action: AdminAction,
        input: &str,
    ) -> ActionResult<Option<Felt>> {
        if !self.is_owner {
            return Err(LotteryError::validation("Only the contract owner can do this"));
        }
        let actions = self.actions()?;
        match action {
            AdminAction::CreateRound => {
                actions.create_round(parse_number(input)?).await.map(Some)
            }
            AdminAction::DrawWinner => {
                actions.draw_winner(parse_number(input)?).await.map(Some)
            }
            AdminAction::DrawRoundsUpTo => actions
                .draw_rounds_up_to(parse_number(input)?)
                .await
                .map(Some),
            AdminAction::TriggerDraw => actions.trigger_draw_if_expired().await,
            AdminAction::Withdraw => {
                let amount =
                    parse_amount(input).map_err(|e| LotteryError::validation(e.to_string()))?;
                actions.withdraw_accumulated_prize_pool(amount).await.map(Some)
            }
        }
    }
}

fn parse_number(input: &str) -> ActionResult<u64> {
    input
        .trim()
        .parse()
        .map_err(|_| LotteryError::validation(format!("{input:?} is not a whole number")))
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let mut controller = AppController::new(config).await?;
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    ui::terminal_enter(&mut ui_state)?;
    info!("UI ready");
    controller.mount_current().await;
    let res = run_loop(&mut controller, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;
    res
}

fn show_processing_status(
    controller: &mut AppController,
    ui_state: &mut ui::UiState,
    message: &str,
) -> Result<()> {
    controller.clear_errors();
    controller.set_status(format!("{message}..."));
    ui::draw(ui_state, &controller.snapshot()).wrap_err("draw while submitting failed")
}

async fn report_outcome(
    controller: &mut AppController,
    message: &str,
    outcome: ActionResult<Option<Felt>>,
) {
    match outcome {
        Ok(Some(hash)) => {
            controller.set_status(format!("{message}: confirmed {hash}"));
            controller.refresh().await;
        }
        Ok(None) => controller.set_status(format!("{message}: nothing to do")),
        Err(e) => {
            error!(error = %e, "{message} failed");
            controller.set_status("Ready");
            controller.push_error(e.message);
        }
    }
}

async fn run_loop(
    controller: &mut AppController,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    let mut redraw = time::interval(REDRAW_INTERVAL);
    loop {
        tokio::select! {
            _ = redraw.tick() => {
                ui::draw(ui_state, &controller.snapshot()).wrap_err("periodic draw failed")?;
            }
            _ = tokio::signal::ctrl_c() => break,
            raw_ev = ui::next_raw_event(input_events) => {
                let Some(ev) = ui::interpret_event(ui_state, raw_ev?) else {
                    continue;
                };
                match ev {
                    UserEvent::Quit => break,
                    UserEvent::Redraw | UserEvent::OpenBuyModal | UserEvent::OpenAdminModal => {}
                    UserEvent::SwitchTab(tab) => controller.enter_tab(tab).await,
                    UserEvent::Refresh => {
                        controller.set_status("Refreshing...");
                        ui::draw(ui_state, &controller.snapshot())
                            .wrap_err("draw before refresh failed")?;
                        controller.refresh().await;
                        controller.set_status("Ready");
                    }
                    UserEvent::LoadMore => controller.load_more_history().await,
                    UserEvent::BuyTicket { guess } => {
                        let message = format!("Buying ticket with guess {guess}");
                        show_processing_status(controller, ui_state, &message)?;
                        let outcome = controller.buy_ticket(guess).await.map(Some);
                        report_outcome(controller, &message, outcome).await;
                    }
                    UserEvent::Claim { round_id } => {
                        let message =
                            format!("Claiming reward for round {}", format_round_id(round_id));
                        show_processing_status(controller, ui_state, &message)?;
                        let outcome = controller.claim_reward(round_id).await.map(Some);
                        report_outcome(controller, &message, outcome).await;
                    }
                    UserEvent::Admin { action, input } => {
                        let message = action.label();
                        show_processing_status(controller, ui_state, message)?;
                        let outcome = controller.run_admin(action, &input).await;
                        report_outcome(controller, message, outcome).await;
                    }
                }
                ui::draw(ui_state, &controller.snapshot()).wrap_err("draw after input failed")?;
            }
        }
    }
    info!("shutting down");
    Ok(())
}
