use crate::{
    gateway::LotteryGateway,
    poller::{
        PollingDriver,
        lock,
    },
    transport::ContractTransport,
    types::{
        LotteryInfo,
        RoundInfo,
        RoundStatus,
        Statistics,
        unix_now,
    },
};
use color_eyre::eyre::Result;
use std::{
    sync::{
        Arc,
        Mutex,
    },
    time::Duration,
};
use tracing::warn;

pub const OVERVIEW_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Everything the home view shows, read in one pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverviewData {
    pub info: LotteryInfo,
    pub current_round: Option<RoundInfo>,
    pub statistics: Statistics,
    /// Wall-clock second the data was read at.
    pub fetched_at: u64,
}

impl OverviewData {
    pub fn time_remaining(&self, now: u64) -> Option<u64> {
        self.current_round
            .as_ref()
            .map(|round| round.end_time.saturating_sub(now))
    }

    pub fn current_status(&self) -> Option<RoundStatus> {
        self.current_round
            .as_ref()
            .map(|round| round.status_at(self.fetched_at))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OverviewSnapshot {
    pub data: Option<OverviewData>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
struct OverviewState {
    data: Option<OverviewData>,
    loading: bool,
    error: Option<String>,
}

impl OverviewState {
    fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    fn set_data(&mut self, data: OverviewData) {
        self.data = Some(data);
        self.error = None;
    }

    /// Keeps the previous data on screen.
    fn set_error(&mut self, error: String) {
        self.error = Some(error);
    }

    fn snapshot(&self) -> OverviewSnapshot {
        OverviewSnapshot {
            data: self.data.clone(),
            loading: self.loading,
            error: self.error.clone(),
        }
    }
}

pub async fn fetch_overview<T: ContractTransport>(
    gateway: &LotteryGateway<T>,
) -> Result<OverviewData> {
    let (info, statistics) =
        futures::try_join!(gateway.get_info(), gateway.get_statistics())?;
    let current_round = match info.current_round_id {
        0 => None,
        id => gateway.get_round_info(id).await?,
    };
    Ok(OverviewData {
        info,
        current_round,
        statistics,
        fetched_at: unix_now(),
    })
}

/// The home view, refreshed every [`OVERVIEW_POLL_INTERVAL`] while mounted.
pub struct OverviewPage<T> {
    gateway: LotteryGateway<T>,
    state: Arc<Mutex<OverviewState>>,
    poller: PollingDriver,
}

impl<T: ContractTransport> OverviewPage<T> {
    pub fn new(gateway: LotteryGateway<T>) -> Self {
        Self {
            gateway,
            state: Arc::new(Mutex::new(OverviewState::default())),
            poller: PollingDriver::new("overview", OVERVIEW_POLL_INTERVAL),
        }
    }

    pub fn snapshot(&self) -> OverviewSnapshot {
        lock(&self.state).snapshot()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    pub async fn mount(&mut self) {
        self.refresh().await;
        let gateway = self.gateway.clone();
        let state = self.state.clone();
        self.poller.start(
            move || {
                let gateway = gateway.clone();
                async move { fetch_overview(&gateway).await }
            },
            move |data: OverviewData| lock(&state).set_data(data),
        );
    }

    pub fn unmount(&mut self) {
        self.poller.stop();
    }

    pub async fn refresh(&self) {
        lock(&self.state).set_loading(true);
        let result = fetch_overview(&self.gateway).await;
        let mut state = lock(&self.state);
        state.set_loading(false);
        match result {
            Ok(data) => state.set_data(data),
            Err(err) => {
                warn!(?err, "failed to load overview");
                state.set_error(format!("{err:#}"));
            }
        }
    }
}
