use crate::{
    felt::Felt,
    gateway::LotteryGateway,
    transport::ContractTransport,
    types::{
        HistoryRound,
        RoundId,
        RoundInfo,
        UserTicket,
        ViewerTicket,
        unix_now,
    },
};
use color_eyre::eyre::Result;
use futures::future::join_all;
use std::future::Future;
use tracing::{
    debug,
    warn,
};

/// The reads the aggregation needs. The gateway is the production source;
/// tests plug in sources with scripted latency and failures.
pub trait RoundSource: Clone + Send + Sync + 'static {
    fn current_round_id(&self) -> impl Future<Output = Result<RoundId>> + Send;

    fn round_info(
        &self,
        round_id: RoundId,
    ) -> impl Future<Output = Result<Option<RoundInfo>>> + Send;

    fn user_ticket(
        &self,
        user: Felt,
        round_id: RoundId,
    ) -> impl Future<Output = Result<Option<UserTicket>>> + Send;
}

impl<T: ContractTransport> RoundSource for LotteryGateway<T> {
    async fn current_round_id(&self) -> Result<RoundId> {
        Ok(self.get_info().await?.current_round_id)
    }

    async fn round_info(&self, round_id: RoundId) -> Result<Option<RoundInfo>> {
        self.get_round_info(round_id).await
    }

    async fn user_ticket(&self, user: Felt, round_id: RoundId) -> Result<Option<UserTicket>> {
        self.get_user_ticket(user, round_id).await
    }
}

/// Joins round facts with the viewer's ticket for every id, classifying
/// each round against one clock reading.
pub async fn aggregate<S: RoundSource>(
    source: &S,
    round_ids: &[RoundId],
    viewer: Option<Felt>,
) -> Vec<HistoryRound> {
    aggregate_at(source, round_ids, viewer, unix_now()).await
}

/// Same as [`aggregate`] with an explicit clock reading.
///
/// Every fetch runs concurrently. Results are joined positionally, so the
/// output keeps the order of `round_ids`. A round whose round or ticket
/// fetch fails is logged and left out.
pub async fn aggregate_at<S: RoundSource>(
    source: &S,
    round_ids: &[RoundId],
    viewer: Option<Felt>,
    now: u64,
) -> Vec<HistoryRound> {
    let fetches = round_ids.iter().map(|&round_id| async move {
        let ticket = async {
            match viewer {
                Some(user) => source
                    .user_ticket(user, round_id)
                    .await
                    .map(|ticket| ticket.map_or(ViewerTicket::NoTicket, ViewerTicket::Ticket)),
                None => Ok(ViewerTicket::NotFetched),
            }
        };
        let (round, ticket) = futures::join!(source.round_info(round_id), ticket);
        (round_id, round, ticket)
    });

    join_all(fetches)
        .await
        .into_iter()
        .filter_map(|(round_id, round, ticket)| match (round, ticket) {
            (Ok(Some(round)), Ok(viewer_ticket)) => Some(HistoryRound {
                status: round.status_at(now),
                round,
                viewer_ticket,
            }),
            (Ok(None), _) => {
                debug!(round_id, "round not found, skipping");
                None
            }
            (Err(err), _) => {
                warn!(round_id, ?err, "failed to fetch round, skipping");
                None
            }
            (_, Err(err)) => {
                warn!(round_id, ?err, "failed to fetch ticket, skipping");
                None
            }
        })
        .collect()
}
