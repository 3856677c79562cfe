use crate::{
    aggregate::aggregate,
    felt::Felt,
    gateway::LotteryGateway,
    poller::{
        PollingDriver,
        lock,
    },
    transport::ContractTransport,
    types::{
        CurrentRoundInfo,
        HistoryRound,
        RoundId,
        TicketSummary,
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
use tracing::{
    info,
    warn,
};

pub const LOTTERY_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// How many rounds back the viewer's tickets are looked up.
pub const RECENT_ROUNDS: u64 = 10;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LotterySnapshot {
    pub current_round: Option<CurrentRoundInfo>,
    /// Recent rounds in which the viewer holds a ticket, newest first.
    pub tickets: Vec<HistoryRound>,
    pub summary: TicketSummary,
    pub viewer: Option<Felt>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LotteryData {
    pub current_round: CurrentRoundInfo,
    pub tickets: Vec<HistoryRound>,
}

#[derive(Debug, Default)]
struct LotteryState {
    current_round: Option<CurrentRoundInfo>,
    tickets: Vec<HistoryRound>,
    viewer: Option<Felt>,
    loading: bool,
    error: Option<String>,
}

impl LotteryState {
    fn set_viewer(&mut self, viewer: Option<Felt>) {
        if self.viewer != viewer {
            self.tickets.clear();
        }
        self.viewer = viewer;
    }

    fn set_data(&mut self, data: LotteryData) {
        self.current_round = Some(data.current_round);
        self.tickets = data.tickets;
        self.error = None;
    }

    fn snapshot(&self) -> LotterySnapshot {
        LotterySnapshot {
            current_round: self.current_round.clone(),
            tickets: self.tickets.clone(),
            summary: TicketSummary::from_rounds(&self.tickets),
            viewer: self.viewer,
            loading: self.loading,
            error: self.error.clone(),
        }
    }
}

/// Ids of the `count` most recent rounds up to `current`, newest first.
pub fn recent_round_ids(current: RoundId, count: u64) -> Vec<RoundId> {
    (current.saturating_sub(count.saturating_sub(1)).max(1)..=current)
        .rev()
        .collect()
}

pub async fn fetch_lottery<T: ContractTransport>(
    gateway: &LotteryGateway<T>,
    viewer: Option<Felt>,
) -> Result<LotteryData> {
    let current_round = gateway.get_current_round_info().await?;
    let tickets = match viewer {
        Some(user) => {
            let ids = recent_round_ids(current_round.round_id, RECENT_ROUNDS);
            aggregate(gateway, &ids, Some(user))
                .await
                .into_iter()
                .filter(|r| r.viewer_ticket.ticket().is_some())
                .collect()
        }
        None => Vec::new(),
    };
    Ok(LotteryData {
        current_round,
        tickets,
    })
}

/// The play view: the current round plus the viewer's recent tickets,
/// polled every [`LOTTERY_POLL_INTERVAL`] while a wallet is connected.
pub struct LotteryView<T> {
    gateway: LotteryGateway<T>,
    state: Arc<Mutex<LotteryState>>,
    poller: PollingDriver,
}

impl<T: ContractTransport> LotteryView<T> {
    pub fn new(gateway: LotteryGateway<T>) -> Self {
        Self {
            gateway,
            state: Arc::new(Mutex::new(LotteryState::default())),
            poller: PollingDriver::new("lottery", LOTTERY_POLL_INTERVAL),
        }
    }

    pub fn snapshot(&self) -> LotterySnapshot {
        lock(&self.state).snapshot()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    pub async fn refresh(&self) {
        let viewer = {
            let mut state = lock(&self.state);
            state.loading = true;
            state.viewer
        };
        let result = fetch_lottery(&self.gateway, viewer).await;
        let mut state = lock(&self.state);
        state.loading = false;
        match result {
            Ok(data) => state.set_data(data),
            Err(err) => {
                warn!(?err, "failed to load lottery view");
                state.error = Some(format!("{err:#}"));
            }
        }
    }

    /// Connecting starts polling, disconnecting stops it.
    pub async fn set_viewer(&mut self, viewer: Option<Felt>) {
        lock(&self.state).set_viewer(viewer);
        self.poller.stop();
        self.refresh().await;
        if let Some(viewer) = viewer {
            info!(%viewer, "lottery view connected");
            let gateway = self.gateway.clone();
            let state = self.state.clone();
            self.poller.start(
                move || {
                    let gateway = gateway.clone();
                    async move { fetch_lottery(&gateway, Some(viewer)).await }
                },
                move |data: LotteryData| lock(&state).set_data(data),
            );
        }
    }

    pub fn unmount(&mut self) {
        self.poller.stop();
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        abi::entrypoints,
        test_helpers::FakeTransport,
    };
    use primitive_types::U256;
    use serde_json::json;

    const VIEWER: u64 = 0xbeef;

    fn chain(current: u64) -> FakeTransport {
        let transport = FakeTransport::new();
        transport.respond_any(
            entrypoints::GET_CURRENT_ROUND_INFO,
            json!([current, u64::MAX, 0, 0, 3]),
        );
        for id in 1..=current {
            transport.respond(
                entrypoints::GET_ROUND_INFO,
                vec![Felt::from(id)],
                json!([id, 0, 0, 0, 1, 20, 1]),
            );
        }
        transport.respond_any(entrypoints::GET_USER_TICKET, json!([0, 0, 0, 0, 0]));
        transport
    }

    fn view(transport: &FakeTransport) -> LotteryView<FakeTransport> {
        LotteryView::new(LotteryGateway::new(transport.clone(), Felt::from(0x1u64)))
    }

    #[test]
    fn recent_round_ids__stops_at_round_one() {
        assert_eq!(recent_round_ids(12, 10), vec![12, 11, 10, 9, 8, 7, 6, 5, 4, 3]);
        assert_eq!(recent_round_ids(3, 10), vec![3, 2, 1]);
        assert!(recent_round_ids(0, 10).is_empty());
    }

    #[tokio::test]
    async fn set_viewer__collects_tickets_and_summary_from_recent_rounds() {
        // given
        let transport = chain(3);
        let viewer = Felt::from(VIEWER);
        transport.respond(
            entrypoints::GET_USER_TICKET,
            vec![viewer, Felt::from(2u64)],
            json!([20, 1, 40, 0, 0]),
        );
        transport.respond(
            entrypoints::GET_USER_TICKET,
            vec![viewer, Felt::from(1u64)],
            json!([11, 0, 0, 0, 0]),
        );
        let mut view = view(&transport);

        // when
        view.set_viewer(Some(viewer)).await;

        // then
        let snapshot = view.snapshot();
        let ids: Vec<_> = snapshot.tickets.iter().map(|r| r.round.id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(snapshot.summary.pending_rewards, U256::from(40u64));
        assert_eq!(snapshot.current_round.map(|c| c.total_tickets), Some(3));
        assert!(view.is_polling());
    }

    #[tokio::test]
    async fn refresh__without_viewer_only_reads_current_round() {
        let transport = chain(3);
        let view = view(&transport);
        view.refresh().await;
        assert!(view.snapshot().current_round.is_some());
        assert_eq!(transport.call_count(entrypoints::GET_USER_TICKET), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn polling__runs_only_while_connected() {
        // given
        let transport = chain(1);
        let mut view = view(&transport);
        view.set_viewer(Some(Felt::from(VIEWER))).await;
        tokio::time::sleep(LOTTERY_POLL_INTERVAL + Duration::from_secs(1)).await;

        // when
        view.set_viewer(None).await;
        tokio::time::sleep(LOTTERY_POLL_INTERVAL * 3).await;

        // then
        assert!(!view.is_polling());
        assert_eq!(transport.call_count(entrypoints::GET_CURRENT_ROUND_INFO), 3);
        assert!(view.snapshot().tickets.is_empty());
    }
}
