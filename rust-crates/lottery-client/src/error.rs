use crate::transport::RpcError;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    InsufficientFunds,
    Wallet,
    Contract,
    Network,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::Wallet => "wallet",
            ErrorKind::Contract => "contract",
            ErrorKind::Network => "network",
        }
    }
}

/// Failure of a user action, ready to be shown as one notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LotteryError {
    pub kind: ErrorKind,
    pub message: String,
}

impl LotteryError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn insufficient_funds(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InsufficientFunds, message)
    }
}

impl fmt::Display for LotteryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for LotteryError {}

/// Known contract and wallet messages, matched case-insensitively.
const KNOWN_FAILURES: [(&str, ErrorKind, &str); 6] = [
    (
        "invalid guess range",
        ErrorKind::Validation,
        "Guess is outside the allowed range",
    ),
    (
        "already bought ticket",
        ErrorKind::Validation,
        "You have already bought a ticket for this round",
    ),
    (
        "insufficient balance",
        ErrorKind::InsufficientFunds,
        "Insufficient STRK balance to purchase ticket",
    ),
    (
        "insufficient allowance",
        ErrorKind::InsufficientFunds,
        "Insufficient STRK allowance to purchase ticket",
    ),
    (
        "user rejected",
        ErrorKind::Wallet,
        "Transaction was rejected by wallet",
    ),
    (
        "user abort",
        ErrorKind::Wallet,
        "Transaction was rejected by wallet",
    ),
];

/// Maps a failed action onto the user-facing taxonomy.
///
/// A [`LotteryError`] raised by the client is passed through. Otherwise the
/// report text is matched against [`KNOWN_FAILURES`]; a transport failure is
/// `network` and everything else is `contract`, prefixed with `context`.
pub fn classify(context: &str, err: &color_eyre::Report) -> LotteryError {
    if let Some(lottery) = err.downcast_ref::<LotteryError>() {
        return lottery.clone();
    }

    let message = format!("{err:#}");
    let lowered = message.to_lowercase();
    if let Some((_, kind, text)) = KNOWN_FAILURES
        .iter()
        .find(|(marker, _, _)| lowered.contains(marker))
    {
        return LotteryError::new(*kind, *text);
    }
    if let Some(RpcError::Network(_)) = err.downcast_ref::<RpcError>() {
        return LotteryError::new(ErrorKind::Network, format!("{context}: {message}"));
    }
    LotteryError::new(ErrorKind::Contract, format!("{context}: {message}"))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use color_eyre::eyre::{
        WrapErr,
        eyre,
    };

    fn revert(message: &str) -> color_eyre::Report {
        color_eyre::Report::new(RpcError::Contract {
            code: 40,
            message: message.into(),
        })
    }

    #[test]
    fn classify__contract_guard_messages_are_validation() {
        let err = revert("Contract error: Already bought ticket").wrap_err("buy_ticket failed");
        assert_eq!(classify("Failed to buy ticket", &err).kind, ErrorKind::Validation);
    }

    #[test]
    fn classify__token_messages_are_insufficient_funds() {
        let err = revert("u256_sub Overflow: Insufficient Balance");
        assert_eq!(
            classify("Failed to buy ticket", &err).kind,
            ErrorKind::InsufficientFunds
        );
    }

    #[test]
    fn classify__wallet_rejection_is_matched_case_insensitively() {
        let err = eyre!("USER REJECTED the request");
        assert_eq!(classify("Failed to claim", &err).kind, ErrorKind::Wallet);
    }

    #[test]
    fn classify__transport_failure_is_network_even_behind_context() {
        // given
        let err = color_eyre::Report::new(RpcError::Network("connection reset".into()))
            .wrap_err("starknet_call get_info failed");

        // when
        let classified = classify("Failed to load lottery", &err);

        // then
        assert_eq!(classified.kind, ErrorKind::Network);
        assert!(classified.message.starts_with("Failed to load lottery: "));
    }

    #[test]
    fn classify__anything_else_is_contract_with_context() {
        // given
        let err = revert("Round not ended");

        // when
        let classified = classify("Failed to draw winner", &err);

        // then
        assert_eq!(classified.kind, ErrorKind::Contract);
        assert_eq!(
            classified.message,
            "Failed to draw winner: rpc error 40: Round not ended"
        );
    }

    #[test]
    fn classify__passes_through_errors_raised_by_the_client() {
        let err = color_eyre::Report::new(LotteryError::validation("Guess must be 10-99"));
        assert_eq!(
            classify("Failed to buy ticket", &err),
            LotteryError::validation("Guess must be 10-99")
        );
    }
}
