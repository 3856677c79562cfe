use crate::{
    aggregate::{
        RoundSource,
        aggregate,
    },
    cursor::RoundCursor,
    felt::Felt,
    poller::{
        PollingDriver,
        lock,
    },
    types::{
        HistoryRound,
        RoundId,
        TicketSummary,
        ViewerTicket,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use std::{
    collections::HashMap,
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

pub const HISTORY_PAGE_SIZE: usize = 10;
pub const HISTORY_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HistorySnapshot {
    pub rounds: Vec<HistoryRound>,
    /// Every id the cursor handed out, newest first, including rounds that
    /// could not be fetched.
    pub loaded_round_ids: Vec<RoundId>,
    pub loading: bool,
    pub has_more: bool,
    pub viewer: Option<Felt>,
    pub summary: TicketSummary,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
struct HistoryState {
    cursor: RoundCursor,
    loaded_round_ids: Vec<RoundId>,
    rounds: Vec<HistoryRound>,
    loading: bool,
    viewer: Option<Felt>,
    error: Option<String>,
}

impl HistoryState {
    /// Claims the loading flag. `false` when a load is already running or
    /// there is nothing left to load.
    fn begin_load(&mut self) -> bool {
        if self.loading || !self.cursor.has_more() {
            return false;
        }
        self.loading = true;
        true
    }

    fn finish_load(&mut self, error: Option<String>) {
        self.loading = false;
        self.error = error;
    }

    fn append_page(&mut self, ids: &[RoundId], rounds: Vec<HistoryRound>) {
        for id in ids {
            if !self.loaded_round_ids.contains(id) {
                self.loaded_round_ids.push(*id);
            }
        }
        for round in rounds {
            if !self.rounds.iter().any(|r| r.round.id == round.round.id) {
                self.rounds.push(round);
            }
        }
    }

    /// Replaces the refreshed rounds in place. Rounds missing from the
    /// refresh keep their previous value.
    fn apply_refresh(&mut self, rounds: Vec<HistoryRound>) {
        let mut fresh: HashMap<RoundId, HistoryRound> =
            rounds.into_iter().map(|r| (r.round.id, r)).collect();
        let mut previous: HashMap<RoundId, HistoryRound> = std::mem::take(&mut self.rounds)
            .into_iter()
            .map(|r| (r.round.id, r))
            .collect();
        self.rounds = self
            .loaded_round_ids
            .iter()
            .filter_map(|id| fresh.remove(id).or_else(|| previous.remove(id)))
            .collect();
    }

    /// Returns `true` when the viewer actually changed.
    fn set_viewer(&mut self, viewer: Option<Felt>) -> bool {
        if self.viewer == viewer {
            return false;
        }
        self.viewer = viewer;
        for round in &mut self.rounds {
            round.viewer_ticket = ViewerTicket::NotFetched;
        }
        true
    }

    fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            rounds: self.rounds.clone(),
            loaded_round_ids: self.loaded_round_ids.clone(),
            loading: self.loading,
            has_more: self.cursor.has_more(),
            viewer: self.viewer,
            summary: TicketSummary::from_rounds(&self.rounds),
            error: self.error.clone(),
        }
    }
}

/// The history view: pages backwards through rounds and keeps the loaded
/// ones fresh while a viewer is connected.
pub struct HistoryPage<S> {
    source: S,
    state: Arc<Mutex<HistoryState>>,
    poller: PollingDriver,
    page_size: usize,
}

impl<S: RoundSource> HistoryPage<S> {
    pub fn new(source: S) -> Self {
        Self::with_page_size(source, HISTORY_PAGE_SIZE)
    }

    /// A page size of 0 is raised to 1 so every load makes progress.
    pub fn with_page_size(source: S, page_size: usize) -> Self {
        Self {
            source,
            state: Arc::new(Mutex::new(HistoryState::default())),
            poller: PollingDriver::new("history", HISTORY_POLL_INTERVAL),
            page_size: page_size.max(1),
        }
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        lock(&self.state).snapshot()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    /// Loads the first page and starts polling when a viewer is known.
    pub async fn mount(&mut self, viewer: Option<Felt>) -> Result<()> {
        info!(?viewer, "history mounted");
        self.set_viewer(viewer).await;
        self.load_more().await.map(|_| ())
    }

    /// Drops all state; the next mount starts from the current round again.
    pub fn unmount(&mut self) {
        self.poller.stop();
        *lock(&self.state) = HistoryState::default();
        info!("history unmounted");
    }

    /// Appends the next page. Returns `false` without fetching when a load
    /// is already in flight or the oldest round has been reached.
    pub async fn load_more(&self) -> Result<bool> {
        if !lock(&self.state).begin_load() {
            return Ok(false);
        }
        match self.fetch_next_page().await {
            Ok(()) => {
                lock(&self.state).finish_load(None);
                Ok(true)
            }
            Err(err) => {
                warn!(?err, "failed to load history page");
                lock(&self.state).finish_load(Some(format!("{err:#}")));
                Err(err)
            }
        }
    }

    async fn fetch_next_page(&self) -> Result<()> {
        if !lock(&self.state).cursor.is_initialized() {
            let current = self
                .source
                .current_round_id()
                .await
                .wrap_err("failed to read current round id")?;
            lock(&self.state).cursor.initialize(current);
        }
        let (ids, viewer) = {
            let mut state = lock(&self.state);
            (state.cursor.next_page(self.page_size), state.viewer)
        };
        let rounds = aggregate(&self.source, &ids, viewer).await;
        lock(&self.state).append_page(&ids, rounds);
        Ok(())
    }

    /// Re-joins every loaded round without moving the cursor.
    pub async fn refresh(&self) {
        let (ids, viewer) = {
            let state = lock(&self.state);
            (state.loaded_round_ids.clone(), state.viewer)
        };
        let rounds = aggregate(&self.source, &ids, viewer).await;
        lock(&self.state).apply_refresh(rounds);
    }

    /// Switches the viewer and re-joins the loaded rounds for the new one.
    /// Polling runs only while a viewer is set.
    pub async fn set_viewer(&mut self, viewer: Option<Felt>) {
        let changed = lock(&self.state).set_viewer(viewer);
        self.poller.stop();
        if viewer.is_none() {
            return;
        }
        if changed {
            self.refresh().await;
        }
        self.start_polling();
    }

    fn start_polling(&mut self) {
        let source = self.source.clone();
        let read_state = self.state.clone();
        let write_state = self.state.clone();
        self.poller.start(
            move || {
                let source = source.clone();
                let (ids, viewer) = {
                    let state = lock(&read_state);
                    (state.loaded_round_ids.clone(), state.viewer)
                };
                async move { Ok(aggregate(&source, &ids, viewer).await) }
            },
            move |rounds: Vec<HistoryRound>| lock(&write_state).apply_refresh(rounds),
        );
    }
}
