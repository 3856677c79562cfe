use crate::felt::Felt;
use color_eyre::eyre::{
    Result,
    eyre,
};
use primitive_types::U256;
use std::{
    fmt,
    str::FromStr,
};

pub const DEFAULT_MAINNET_RPC_URL: &str = "https://free-rpc.nethermind.io/mainnet-juno";
pub const DEFAULT_SEPOLIA_RPC_URL: &str = "https://free-rpc.nethermind.io/sepolia-juno";

/// STRK, the default payment token on both networks.
pub const DEFAULT_TOKEN_ADDRESS: &str =
    "0x04718f5a0fc34cc1af16a1cdee98ffb20c31f5cd61d6ab07201858f4287c938d";

pub const DEFAULT_MIN_GUESS: u8 = 10;
pub const DEFAULT_MAX_GUESS: u8 = 99;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    #[default]
    Sepolia,
}

impl Network {
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Network::Mainnet => DEFAULT_MAINNET_RPC_URL,
            Network::Sepolia => DEFAULT_SEPOLIA_RPC_URL,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Network::Mainnet => "mainnet",
            Network::Sepolia => "sepolia",
        };
        f.write_str(label)
    }
}

impl FromStr for Network {
    type Err = color_eyre::Report;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "sepolia" | "testnet" => Ok(Network::Sepolia),
            other => Err(eyre!("unknown network {other:?}, expected mainnet or sepolia")),
        }
    }
}

/// One ticket costs one token with 18 decimals.
pub fn default_ticket_cost() -> U256 {
    U256::exp10(18)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LotteryConfig {
    pub contract_address: Felt,
    pub token_address: Felt,
    pub network: Network,
    pub rpc_url: String,
    pub min_guess: u8,
    pub max_guess: u8,
    /// In the token's smallest unit.
    pub ticket_cost: U256,
}

impl LotteryConfig {
    /// Defaults for everything but the lottery contract.
    pub fn new(contract_address: Felt, network: Network) -> Result<Self> {
        Ok(Self {
            contract_address,
            token_address: DEFAULT_TOKEN_ADDRESS.parse()?,
            network,
            rpc_url: network.default_rpc_url().to_string(),
            min_guess: DEFAULT_MIN_GUESS,
            max_guess: DEFAULT_MAX_GUESS,
            ticket_cost: default_ticket_cost(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_guess == 0 {
            return Err(eyre!("min guess must be at least 1, 0 marks a missing ticket"));
        }
        if self.min_guess > self.max_guess {
            return Err(eyre!(
                "min guess {} is above max guess {}",
                self.min_guess,
                self.max_guess
            ));
        }
        if self.ticket_cost.is_zero() {
            return Err(eyre!("ticket cost must be positive"));
        }
        if self.contract_address.is_zero() {
            return Err(eyre!("lottery contract address is not set"));
        }
        Ok(())
    }

    pub fn guess_in_range(&self, guess: u8) -> bool {
        (self.min_guess..=self.max_guess).contains(&guess)
    }
}
