//! Display formatting for token amounts, ids, addresses and time.

use chrono::DateTime;
use color_eyre::eyre::{
    Result,
    eyre,
};
use luck3_client::{
    Felt,
    RoundId,
    U256,
};

pub const TOKEN_DECIMALS: usize = 18;
pub const TOKEN_SYMBOL: &str = "STRK";
const SHOWN_DECIMALS: usize = 2;

fn one_token() -> U256 {
    U256::exp10(TOKEN_DECIMALS)
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Token amount in whole units, grouped, with at most two decimals
/// (truncated).
pub fn format_amount(amount: U256) -> String {
    let whole = amount / one_token();
    let cents = (amount % one_token()) / U256::exp10(TOKEN_DECIMALS - SHOWN_DECIMALS);
    let whole = group_thousands(&whole.to_string());
    let cents = format!("{:0width$}", cents.low_u64(), width = SHOWN_DECIMALS);
    let cents = cents.trim_end_matches('0');
    if cents.is_empty() {
        whole
    } else {
        format!("{whole}.{cents}")
    }
}

pub fn format_strk(amount: U256) -> String {
    format!("{} {TOKEN_SYMBOL}", format_amount(amount))
}

/// Parses a user-entered token amount such as `12` or `0.5` into the
/// smallest unit.
pub fn parse_amount(raw: &str) -> Result<U256> {
    let raw = raw.trim().replace(',', "");
    let (whole, fraction) = raw.split_once('.').unwrap_or((raw.as_str(), ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(eyre!("amount is empty"));
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(eyre!("amount {raw:?} is not a number"));
    }
    if fraction.len() > TOKEN_DECIMALS {
        return Err(eyre!("amount {raw:?} has more than {TOKEN_DECIMALS} decimals"));
    }
    let whole = match whole {
        "" => U256::zero(),
        digits => U256::from_dec_str(digits).map_err(|e| eyre!("amount {raw:?}: {e:?}"))?,
    };
    let fraction = match fraction {
        "" => U256::zero(),
        digits => {
            let padded = format!("{digits:0<TOKEN_DECIMALS$}");
            U256::from_dec_str(&padded).map_err(|e| eyre!("amount {raw:?}: {e:?}"))?
        }
    };
    whole
        .checked_mul(one_token())
        .and_then(|units| units.checked_add(fraction))
        .ok_or_else(|| eyre!("amount {raw:?} is too large"))
}

pub fn format_round_id(id: RoundId) -> String {
    format!("#{id:04}")
}

pub fn format_duration(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = seconds % 86_400 / 3_600;
    let minutes = seconds % 3_600 / 60;
    let secs = seconds % 60;
    if days > 0 {
        format!("{days}d {hours:02}h {minutes:02}m")
    } else if hours > 0 {
        format!("{hours}h {minutes:02}m {secs:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs:02}s")
    } else {
        format!("{secs}s")
    }
}

pub fn format_timestamp(seconds: u64) -> String {
    i64::try_from(seconds)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| String::from("N/A"))
}

/// `0x1234...abcd` for long addresses, unchanged otherwise.
pub fn short_address(address: Felt) -> String {
    let hex = address.to_string();
    if hex.len() <= 12 {
        return hex;
    }
    format!("{}...{}", &hex[..6], &hex[hex.len() - 4..])
}
