//! Calldata encoding and result normalisation for the lottery and ERC-20
//! contracts.
//!
//! Contract results reach the gateway as JSON. A tuple can show up as raw
//! felts (u256 split into two limbs), as a positional array with the u256
//! collapsed into one value, or as a keyed object. Everything past this
//! module sees only the canonical records from [`crate::types`].

use crate::{
    felt::{
        Felt,
        u256_from_felts,
    },
    types::{
        CurrentRoundInfo,
        LotteryInfo,
        RoundId,
        RoundInfo,
        Statistics,
        UserTicket,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use primitive_types::U256;
use serde::Deserialize;
use serde_json::Value;

pub mod entrypoints {
    pub const GET_INFO: &str = "get_info";
    pub const GET_CURRENT_ROUND_INFO: &str = "get_current_round_info";
    pub const GET_ROUND_INFO: &str = "get_round_info";
    pub const GET_ROUNDS_INFO: &str = "get_rounds_info";
    pub const GET_USER_TICKET: &str = "get_user_ticket";
    pub const GET_USER_REWARD: &str = "get_user_reward";
    pub const GET_ROUND_WINNING_NUMBER: &str = "get_round_winning_number";
    pub const GET_STATISTICS: &str = "get_statistics";

    pub const BUY_TICKET: &str = "buy_ticket";
    pub const CLAIM_REWARD: &str = "claim_reward";
    pub const CREATE_ROUND: &str = "create_round";
    pub const DRAW_WINNER: &str = "draw_winner";
    pub const DRAW_ROUNDS_UP_TO: &str = "draw_rounds_up_to";
    pub const TRIGGER_DRAW_IF_EXPIRED: &str = "trigger_draw_if_expired";
    pub const WITHDRAW_ACCUMULATED_PRIZE_POOL: &str = "withdraw_accumulated_prize_pool";

    pub const BALANCE_OF: &str = "balance_of";
    pub const ALLOWANCE: &str = "allowance";
    pub const APPROVE: &str = "approve";
}

/// Felts in a raw round tuple: id, end_time, prize_pool (2), total_tickets,
/// winning_number, is_drawn.
const RAW_ROUND_LEN: usize = 7;
const DECODED_ROUND_LEN: usize = 6;
const RAW_TICKET_LEN: usize = 5;
const DECODED_TICKET_LEN: usize = 4;

/// Sequential reader over a raw felt result.
pub struct FeltReader<'a> {
    felts: &'a [Felt],
    pos: usize,
}

impl<'a> FeltReader<'a> {
    pub fn new(felts: &'a [Felt]) -> Self {
        Self { felts, pos: 0 }
    }

    pub fn felt(&mut self) -> Result<Felt> {
        let felt = self.felts.get(self.pos).copied().ok_or_else(|| {
            eyre!(
                "contract output too short: wanted felt #{} of {}",
                self.pos,
                self.felts.len()
            )
        })?;
        self.pos += 1;
        Ok(felt)
    }

    pub fn u64(&mut self) -> Result<u64> {
        self.felt()?.to_u64()
    }

    pub fn u8(&mut self) -> Result<u8> {
        self.felt()?.to_u8()
    }

    pub fn bool(&mut self) -> Result<bool> {
        self.felt()?.to_bool()
    }

    pub fn u256(&mut self) -> Result<U256> {
        let low = self.felt()?;
        let high = self.felt()?;
        u256_from_felts(low, high)
    }

    pub fn remaining(&self) -> usize {
        self.felts.len() - self.pos
    }
}

/// A u256 as it may appear in a decoded result.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireU256 {
    Limbs { low: Felt, high: Felt },
    Whole(WireBig),
}

/// Integers wider than a felt cannot go through [`Felt`].
#[derive(Deserialize)]
#[serde(untagged)]
enum WireBig {
    Number(u64),
    Text(String),
}

impl WireU256 {
    fn into_u256(self) -> Result<U256> {
        match self {
            WireU256::Limbs { low, high } => u256_from_felts(low, high),
            WireU256::Whole(WireBig::Number(n)) => Ok(U256::from(n)),
            WireU256::Whole(WireBig::Text(s)) => parse_u256(&s),
        }
    }
}

pub fn parse_u256(raw: &str) -> Result<U256> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(digits) => U256::from_str_radix(digits, 16)
            .map_err(|e| eyre!("invalid hex amount {raw:?}: {e:?}")),
        None => U256::from_dec_str(raw)
            .map_err(|e| eyre!("invalid decimal amount {raw:?}: {e:?}")),
    }
}

#[derive(Deserialize)]
struct KeyedRound {
    #[serde(alias = "round_id", alias = "roundId")]
    id: Felt,
    #[serde(default, alias = "startTime")]
    start_time: Option<Felt>,
    #[serde(alias = "endTime")]
    end_time: Felt,
    #[serde(alias = "prizePool")]
    prize_pool: WireU256,
    #[serde(alias = "totalTickets")]
    total_tickets: Felt,
    #[serde(alias = "winningNumber")]
    winning_number: Felt,
    #[serde(alias = "isDrawn")]
    is_drawn: Felt,
}

#[derive(Deserialize)]
struct KeyedTicket {
    guess: Felt,
    #[serde(alias = "isWinner")]
    is_winner: Felt,
    reward: WireU256,
    claimed: Felt,
}

/// Field values shared by every shape of a round tuple.
struct RoundFields {
    id: u64,
    start_time: Option<u64>,
    end_time: u64,
    prize_pool: U256,
    total_tickets: u64,
    winning_number: u8,
    is_drawn: bool,
}

impl RoundFields {
    fn from_raw(reader: &mut FeltReader<'_>) -> Result<Self> {
        Ok(Self {
            id: reader.u64().wrap_err("round id")?,
            start_time: None,
            end_time: reader.u64().wrap_err("round end_time")?,
            prize_pool: reader.u256().wrap_err("round prize_pool")?,
            total_tickets: reader.u64().wrap_err("round total_tickets")?,
            winning_number: reader.u8().wrap_err("round winning_number")?,
            is_drawn: reader.bool().wrap_err("round is_drawn")?,
        })
    }

    fn from_decoded_array(items: Vec<Value>) -> Result<Self> {
        let [id, end_time, prize_pool, total_tickets, winning_number, is_drawn]: [Value;
            DECODED_ROUND_LEN] = items
            .try_into()
            .map_err(|_| eyre!("decoded round tuple must have {DECODED_ROUND_LEN} items"))?;
        Ok(Self {
            id: felt_value(id)?.to_u64()?,
            start_time: None,
            end_time: felt_value(end_time)?.to_u64()?,
            prize_pool: u256_value(prize_pool)?,
            total_tickets: felt_value(total_tickets)?.to_u64()?,
            winning_number: felt_value(winning_number)?.to_u8()?,
            is_drawn: felt_value(is_drawn)?.to_bool()?,
        })
    }

    fn from_keyed(keyed: KeyedRound) -> Result<Self> {
        Ok(Self {
            id: keyed.id.to_u64()?,
            start_time: keyed.start_time.map(|t| t.to_u64()).transpose()?,
            end_time: keyed.end_time.to_u64()?,
            prize_pool: keyed.prize_pool.into_u256()?,
            total_tickets: keyed.total_tickets.to_u64()?,
            winning_number: keyed.winning_number.to_u8()?,
            is_drawn: keyed.is_drawn.to_bool()?,
        })
    }

    fn normalize(self) -> Result<RoundInfo> {
        if let Some(start) = self.start_time
            && start > self.end_time
        {
            return Err(eyre!(
                "round {} starts at {start} after it ends at {}",
                self.id,
                self.end_time
            ));
        }
        Ok(RoundInfo {
            id: self.id,
            start_time: self.start_time,
            end_time: self.end_time,
            prize_pool: self.prize_pool,
            total_tickets: self.total_tickets,
            winning_number: self.is_drawn.then_some(self.winning_number),
            is_drawn: self.is_drawn,
        })
    }
}

fn felt_value(value: Value) -> Result<Felt> {
    serde_json::from_value(value).wrap_err("expected a felt")
}

fn u256_value(value: Value) -> Result<U256> {
    let wire: WireU256 = serde_json::from_value(value).wrap_err("expected a u256")?;
    wire.into_u256()
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// Reads a flat felt array out of a JSON result.
pub fn felts_from_value(value: Value) -> Result<Vec<Felt>> {
    serde_json::from_value(value).wrap_err("contract result is not a felt array")
}

/// Normalises one round tuple in any of its shapes.
pub fn decode_round(value: Value) -> Result<RoundInfo> {
    let fields = match value {
        Value::Object(_) => {
            let keyed: KeyedRound =
                serde_json::from_value(value).wrap_err("invalid keyed round tuple")?;
            RoundFields::from_keyed(keyed)?
        }
        Value::Array(items) if items.len() == RAW_ROUND_LEN && items.iter().all(is_scalar) => {
            let felts = felts_from_value(Value::Array(items))?;
            let mut reader = FeltReader::new(&felts);
            RoundFields::from_raw(&mut reader)?
        }
        Value::Array(items) => RoundFields::from_decoded_array(items)?,
        other => return Err(eyre!("unexpected round tuple shape: {other}")),
    };
    fields.normalize()
}

/// Normalises a `get_rounds_info` result: either a length-prefixed raw felt
/// array, or an array with one tuple per round.
pub fn decode_rounds(value: Value) -> Result<Vec<RoundInfo>> {
    let Value::Array(items) = value else {
        return Err(eyre!("get_rounds_info result is not an array"));
    };
    if items.is_empty() {
        return Ok(Vec::new());
    }
    if items.iter().all(is_scalar) {
        let felts = felts_from_value(Value::Array(items))?;
        let mut reader = FeltReader::new(&felts);
        let len = reader.u64().wrap_err("rounds array length")?;
        let expected = usize::try_from(len)
            .ok()
            .and_then(|len| len.checked_mul(RAW_ROUND_LEN));
        if expected != Some(reader.remaining()) {
            return Err(eyre!(
                "rounds array announces {len} rounds but carries {} felts",
                reader.remaining()
            ));
        }
        return (0..len)
            .map(|_| RoundFields::from_raw(&mut reader)?.normalize())
            .collect();
    }
    items.into_iter().map(decode_round).collect()
}

/// Normalises a ticket tuple. A guess of 0 is the contract's "no ticket"
/// sentinel and yields `None`.
pub fn decode_ticket(round_id: RoundId, value: Value) -> Result<Option<UserTicket>> {
    let (guess, is_winner, reward, claimed) = match value {
        Value::Object(_) => {
            let keyed: KeyedTicket =
                serde_json::from_value(value).wrap_err("invalid keyed ticket tuple")?;
            (
                keyed.guess.to_u8()?,
                keyed.is_winner.to_bool()?,
                keyed.reward.into_u256()?,
                keyed.claimed.to_bool()?,
            )
        }
        Value::Array(items) if items.len() == RAW_TICKET_LEN && items.iter().all(is_scalar) => {
            let felts = felts_from_value(Value::Array(items))?;
            let mut reader = FeltReader::new(&felts);
            (reader.u8()?, reader.bool()?, reader.u256()?, reader.bool()?)
        }
        Value::Array(items) => {
            let [guess, is_winner, reward, claimed]: [Value; DECODED_TICKET_LEN] = items
                .try_into()
                .map_err(|_| eyre!("decoded ticket tuple must have {DECODED_TICKET_LEN} items"))?;
            (
                felt_value(guess)?.to_u8()?,
                felt_value(is_winner)?.to_bool()?,
                u256_value(reward)?,
                felt_value(claimed)?.to_bool()?,
            )
        }
        other => return Err(eyre!("unexpected ticket tuple shape: {other}")),
    };
    if guess == 0 {
        return Ok(None);
    }
    if claimed && !is_winner {
        return Err(eyre!(
            "round {round_id}: ticket marked claimed but not a winner"
        ));
    }
    Ok(Some(UserTicket {
        round_id,
        guess,
        is_winner,
        reward,
        claimed,
    }))
}

pub fn decode_info(value: Value) -> Result<LotteryInfo> {
    let felts = felts_from_value(value)?;
    let mut reader = FeltReader::new(&felts);
    Ok(LotteryInfo {
        owner: reader.felt().wrap_err("owner")?,
        current_round_id: reader.u64().wrap_err("current_round_id")?,
        accumulated_prize_pool: reader.u256().wrap_err("accumulated_prize_pool")?,
    })
}

pub fn decode_current_round(value: Value, now: u64) -> Result<CurrentRoundInfo> {
    let felts = felts_from_value(value)?;
    let mut reader = FeltReader::new(&felts);
    let round_id = reader.u64().wrap_err("round_id")?;
    let end_time = reader.u64().wrap_err("end_time")?;
    Ok(CurrentRoundInfo {
        round_id,
        end_time,
        prize_pool: reader.u256().wrap_err("prize_pool")?,
        total_tickets: reader.u64().wrap_err("total_tickets")?,
        time_remaining: end_time.saturating_sub(now),
    })
}

pub fn decode_statistics(value: Value) -> Result<Statistics> {
    let felts = felts_from_value(value)?;
    let mut reader = FeltReader::new(&felts);
    Ok(Statistics {
        total_rounds: reader.u64().wrap_err("total_rounds")?,
        total_tickets: reader.u64().wrap_err("total_tickets")?,
        total_prize_pool: reader.u256().wrap_err("total_prize_pool")?,
    })
}

pub fn decode_u256(value: Value) -> Result<U256> {
    match value {
        Value::Array(items) if items.len() == 2 && items.iter().all(is_scalar) => {
            let felts = felts_from_value(Value::Array(items))?;
            FeltReader::new(&felts).u256()
        }
        Value::Array(mut items) if items.len() == 1 => u256_value(items.remove(0)),
        other => u256_value(other),
    }
}

pub fn decode_u8(value: Value) -> Result<u8> {
    let felts = felts_from_value(value)?;
    FeltReader::new(&felts).u8()
}

/// Calldata for `Array<u64>` arguments: length prefix, then items.
pub fn encode_round_ids(ids: &[RoundId]) -> Vec<Felt> {
    std::iter::once(Felt::from(ids.len() as u64))
        .chain(ids.iter().map(|id| Felt::from(*id)))
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use serde_json::json;

    fn expected_round() -> RoundInfo {
        RoundInfo {
            id: 7,
            start_time: None,
            end_time: 1_700_000_000,
            prize_pool: U256::exp10(18) * U256::from(3u8),
            total_tickets: 3,
            winning_number: Some(42),
            is_drawn: true,
        }
    }

    #[test]
    fn decode_round__positional_and_keyed_shapes_agree() {
        // given
        let raw = json!(["0x7", "1700000000", "0x29a2241af62c0000", "0x0", "3", "42", "1"]);
        let positional = json!([7, 1_700_000_000u64, "3000000000000000000", 3, 42, true]);
        let keyed = json!({
            "id": "0x7",
            "endTime": 1_700_000_000u64,
            "prizePool": "3000000000000000000",
            "totalTickets": 3,
            "winningNumber": 42,
            "isDrawn": true,
        });
        let snake = json!({
            "round_id": 7,
            "end_time": "1700000000",
            "prize_pool": { "low": "0x29a2241af62c0000", "high": "0x0" },
            "total_tickets": "0x3",
            "winning_number": "0x2a",
            "is_drawn": 1,
        });

        // when
        let decoded: Vec<RoundInfo> = [raw, positional, keyed, snake]
            .into_iter()
            .map(|v| decode_round(v).unwrap())
            .collect();

        // then
        for round in decoded {
            assert_eq!(round, expected_round());
        }
    }

    #[test]
    fn decode_round__undrawn_round_has_no_winning_number() {
        let raw = json!(["0x1", "100", "0x0", "0x0", "0", "0", "0"]);
        let round = decode_round(raw).unwrap();
        assert_eq!(round.winning_number, None);
        assert!(!round.is_drawn);
    }

    #[test]
    fn decode_round__rejects_start_after_end() {
        let keyed = json!({
            "id": 1, "startTime": 200, "endTime": 100, "prizePool": 0,
            "totalTickets": 0, "winningNumber": 0, "isDrawn": false,
        });
        assert!(decode_round(keyed).is_err());
    }

    #[test]
    fn decode_rounds__reads_length_prefixed_raw_felts() {
        // given
        let raw = json!([
            "0x2",
            "0x2", "500", "0x0", "0x0", "0", "0", "0",
            "0x1", "400", "0x5", "0x0", "1", "9", "1",
        ]);

        // when
        let rounds = decode_rounds(raw).unwrap();

        // then
        assert_eq!(rounds.len(), 2);
        assert_eq!(rounds[0].id, 2);
        assert_eq!(rounds[1].id, 1);
        assert_eq!(rounds[1].winning_number, Some(9));
        assert_eq!(rounds[1].prize_pool, U256::from(5u8));
    }

    #[test]
    fn decode_rounds__reads_mixed_tuple_shapes_per_element() {
        let value = json!([
            [2, 500, 0, 0, 0, false],
            { "id": 1, "endTime": 400, "prizePool": 5, "totalTickets": 1,
              "winningNumber": 9, "isDrawn": true },
        ]);
        let rounds = decode_rounds(value).unwrap();
        assert_eq!(
            rounds.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![2, 1]
        );
    }

    #[test]
    fn decode_rounds__rejects_length_mismatch() {
        let raw = json!(["0x2", "0x1", "400", "0x5", "0x0", "1", "9", "1"]);
        assert!(decode_rounds(raw).is_err());
    }

    #[test]
    fn decode_rounds__huge_length_prefix_is_an_error() {
        // given
        let raw = json!(["0x8000000000000001", "0x1", "1", "0x0", "0x0", "0", "0", "0"]);

        // when
        let result = decode_rounds(raw);

        // then
        assert!(result.is_err());
    }

    #[test]
    fn decode_ticket__zero_guess_is_no_ticket_for_every_shape() {
        for value in [
            json!(["0", "0", "0", "0", "0"]),
            json!([0, false, 0, false]),
            json!({ "guess": 0, "isWinner": false, "reward": 0, "claimed": false }),
        ] {
            assert_eq!(decode_ticket(3, value).unwrap(), None);
        }
    }

    #[test]
    fn decode_ticket__reads_winning_ticket() {
        let ticket = decode_ticket(3, json!(["0x2a", "1", "0x64", "0x0", "0"]))
            .unwrap()
            .unwrap();
        assert_eq!(ticket.round_id, 3);
        assert_eq!(ticket.guess, 42);
        assert!(ticket.is_claimable());
        assert_eq!(ticket.reward, U256::from(100u8));
    }

    #[test]
    fn decode_ticket__claimed_loser_is_rejected() {
        let value = json!({ "guess": 12, "is_winner": false, "reward": 0, "claimed": true });
        assert!(decode_ticket(3, value).is_err());
    }

    #[test]
    fn decode_info__reads_owner_round_and_pool() {
        let info = decode_info(json!(["0xabc", "0xc", "0x10", "0x0"])).unwrap();
        assert_eq!(info.owner, "0xabc".parse::<Felt>().unwrap());
        assert_eq!(info.current_round_id, 12);
        assert_eq!(info.accumulated_prize_pool, U256::from(16u8));
    }

    #[test]
    fn decode_current_round__clamps_time_remaining_at_zero() {
        let value = json!(["0x3", "100", "0x0", "0x0", "2"]);
        assert_eq!(decode_current_round(value.clone(), 40).unwrap().time_remaining, 60);
        assert_eq!(decode_current_round(value, 500).unwrap().time_remaining, 0);
    }

    #[test]
    fn encode_round_ids__prefixes_length() {
        assert_eq!(
            encode_round_ids(&[5, 3]),
            vec![Felt::from(2u64), Felt::from(5u64), Felt::from(3u64)]
        );
    }
}
