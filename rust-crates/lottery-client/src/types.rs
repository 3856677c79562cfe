use crate::felt::Felt;
use primitive_types::U256;
use std::time::{
    SystemTime,
    UNIX_EPOCH,
};

/// Wall-clock seconds since the unix epoch, the unit the contract uses.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Round ids are assigned by the contract starting at 1; 0 means no round yet.
pub type RoundId = u64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundInfo {
    pub id: RoundId,
    pub start_time: Option<u64>,
    pub end_time: u64,
    pub prize_pool: U256,
    pub total_tickets: u64,
    /// Only meaningful once `is_drawn` is set.
    pub winning_number: Option<u8>,
    pub is_drawn: bool,
}

impl RoundInfo {
    pub fn has_participation(&self) -> bool {
        self.total_tickets > 0 || !self.prize_pool.is_zero()
    }

    pub fn status_at(&self, now: u64) -> RoundStatus {
        RoundStatus::classify(self, now)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserTicket {
    pub round_id: RoundId,
    pub guess: u8,
    pub is_winner: bool,
    pub reward: U256,
    pub claimed: bool,
}

impl UserTicket {
    pub fn is_claimable(&self) -> bool {
        self.is_winner && !self.claimed
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RoundStatus {
    Active,
    Drawing,
    Expired,
    Completed,
}

impl RoundStatus {
    pub fn classify(round: &RoundInfo, now: u64) -> RoundStatus {
        if round.is_drawn {
            return RoundStatus::Completed;
        }
        if now > round.end_time {
            if round.has_participation() {
                RoundStatus::Drawing
            } else {
                RoundStatus::Expired
            }
        } else {
            RoundStatus::Active
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RoundStatus::Active => "Active",
            RoundStatus::Drawing => "Drawing",
            RoundStatus::Expired => "Expired",
            RoundStatus::Completed => "Completed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LotteryInfo {
    pub owner: Felt,
    pub current_round_id: RoundId,
    pub accumulated_prize_pool: U256,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrentRoundInfo {
    pub round_id: RoundId,
    pub end_time: u64,
    pub prize_pool: U256,
    pub total_tickets: u64,
    pub time_remaining: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Statistics {
    pub total_rounds: u64,
    pub total_tickets: u64,
    pub total_prize_pool: U256,
}

/// The viewer's side of a joined round.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum ViewerTicket {
    /// No viewer address was supplied, so nothing was looked up.
    #[default]
    NotFetched,
    NoTicket,
    Ticket(UserTicket),
}

impl ViewerTicket {
    pub fn ticket(&self) -> Option<&UserTicket> {
        match self {
            ViewerTicket::Ticket(ticket) => Some(ticket),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryRound {
    pub round: RoundInfo,
    pub status: RoundStatus,
    pub viewer_ticket: ViewerTicket,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TicketSummary {
    pub tickets: usize,
    pub wins: usize,
    pub pending_rewards: U256,
    pub total_winnings: U256,
}

impl TicketSummary {
    pub fn from_rounds<'a>(rounds: impl IntoIterator<Item = &'a HistoryRound>) -> Self {
        let mut summary = TicketSummary::default();
        for ticket in rounds.into_iter().filter_map(|r| r.viewer_ticket.ticket()) {
            summary.tickets += 1;
            if !ticket.is_winner {
                continue;
            }
            summary.wins += 1;
            summary.total_winnings = summary.total_winnings.saturating_add(ticket.reward);
            if !ticket.claimed {
                summary.pending_rewards =
                    summary.pending_rewards.saturating_add(ticket.reward);
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;

    fn round(end_time: u64, total_tickets: u64, pool: u64, is_drawn: bool) -> RoundInfo {
        RoundInfo {
            id: 1,
            start_time: None,
            end_time,
            prize_pool: U256::from(pool),
            total_tickets,
            winning_number: is_drawn.then_some(42),
            is_drawn,
        }
    }

    #[test]
    fn classify__drawn_round_is_completed_even_before_end_time() {
        assert_eq!(
            RoundStatus::classify(&round(100, 0, 0, true), 50),
            RoundStatus::Completed
        );
    }

    #[test]
    fn classify__ended_round_with_bettors_is_drawing() {
        assert_eq!(
            RoundStatus::classify(&round(100, 3, 0, false), 101),
            RoundStatus::Drawing
        );
    }

    #[test]
    fn classify__ended_round_without_bettors_is_expired() {
        assert_eq!(
            RoundStatus::classify(&round(100, 0, 0, false), 101),
            RoundStatus::Expired
        );
    }

    #[test]
    fn classify__end_time_itself_is_still_active() {
        assert_eq!(
            RoundStatus::classify(&round(100, 0, 0, false), 100),
            RoundStatus::Active
        );
    }

    #[test]
    fn classify__carried_prize_pool_counts_as_participation() {
        assert_eq!(
            RoundStatus::classify(&round(100, 0, 5, false), 200),
            RoundStatus::Drawing
        );
    }

    proptest! {
        #[test]
        fn classify__every_combination_maps_to_the_rule_table(
            is_drawn in any::<bool>(),
            end_time in 0u64..1_000,
            now in 0u64..1_000,
            tickets in 0u64..3,
        ) {
            let r = round(end_time, tickets, 0, is_drawn);
            let expected = match (is_drawn, now > end_time, tickets > 0) {
                (true, _, _) => RoundStatus::Completed,
                (false, true, true) => RoundStatus::Drawing,
                (false, true, false) => RoundStatus::Expired,
                (false, false, _) => RoundStatus::Active,
            };
            prop_assert_eq!(RoundStatus::classify(&r, now), expected);
        }
    }

    #[test]
    fn ticket_summary__separates_pending_from_total_winnings() {
        // given
        let mk = |id, is_winner, reward: u64, claimed| HistoryRound {
            round: round(10, 1, 0, true),
            status: RoundStatus::Completed,
            viewer_ticket: ViewerTicket::Ticket(UserTicket {
                round_id: id,
                guess: 11,
                is_winner,
                reward: U256::from(reward),
                claimed,
            }),
        };
        let rounds = vec![
            mk(1, true, 5, true),
            mk(2, true, 7, false),
            mk(3, false, 0, false),
            HistoryRound {
                round: round(10, 1, 0, true),
                status: RoundStatus::Completed,
                viewer_ticket: ViewerTicket::NoTicket,
            },
        ];

        // when
        let summary = TicketSummary::from_rounds(&rounds);

        // then
        assert_eq!(summary.tickets, 3);
        assert_eq!(summary.wins, 2);
        assert_eq!(summary.pending_rewards, U256::from(7u8));
        assert_eq!(summary.total_winnings, U256::from(12u8));
    }
}
