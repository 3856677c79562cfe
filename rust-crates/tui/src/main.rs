use clap::Parser;
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use luck3_client::{
    Felt,
    LotteryConfig,
    Network,
    U256,
    config::{
        DEFAULT_MAX_GUESS,
        DEFAULT_MIN_GUESS,
    },
};
use std::path::{
    Path,
    PathBuf,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod app;
mod format;
mod ui;

const LOG_FILE_NAME: &str = "luck3.log";

#[derive(Parser, Debug)]
#[command(name = "luck3", about = "Terminal client for the Luck3 daily lottery on Starknet")]
struct Args {
    /// Lottery contract address
    #[arg(long, env = "LUCK3_CONTRACT_ADDRESS")]
    contract_address: String,

    /// ERC-20 token tickets are paid in (defaults to STRK)
    #[arg(long, env = "LUCK3_TOKEN_ADDRESS")]
    token_address: Option<String>,

    /// mainnet or sepolia
    #[arg(long, env = "LUCK3_NETWORK", default_value = "sepolia")]
    network: String,

    /// Override the network's default RPC URL
    #[arg(long, env = "LUCK3_RPC_URL")]
    rpc_url: Option<String>,

    #[arg(long, env = "LUCK3_MIN_GUESS", default_value_t = DEFAULT_MIN_GUESS)]
    min_guess: u8,

    #[arg(long, env = "LUCK3_MAX_GUESS", default_value_t = DEFAULT_MAX_GUESS)]
    max_guess: u8,

    /// Ticket price in the token's smallest unit
    #[arg(long, env = "LUCK3_TICKET_COST")]
    ticket_cost: Option<String>,

    /// Wallet bridge endpoint; without it the client is read-only
    #[arg(long, env = "LUCK3_WALLET_URL")]
    wallet_url: Option<String>,

    /// Address whose tickets are shown when no wallet is connected
    #[arg(long, env = "LUCK3_ACCOUNT")]
    account: Option<String>,

    #[arg(long, env = "LUCK3_LOG_DIR", default_value = ".")]
    log_dir: PathBuf,
}

impl Args {
    fn into_config(self) -> Result<app::AppConfig> {
        let contract: Felt = self
            .contract_address
            .parse()
            .wrap_err("invalid --contract-address")?;
        let network: Network = self.network.parse()?;
        let mut lottery = LotteryConfig::new(contract, network)?;
        if let Some(token) = self.token_address {
            lottery.token_address = token.parse().wrap_err("invalid --token-address")?;
        }
        if let Some(url) = self.rpc_url {
            lottery.rpc_url = url;
        }
        lottery.min_guess = self.min_guess;
        lottery.max_guess = self.max_guess;
        if let Some(cost) = self.ticket_cost {
            lottery.ticket_cost = U256::from_dec_str(cost.trim())
                .map_err(|e| color_eyre::eyre::eyre!("invalid --ticket-cost {cost:?}: {e:?}"))?;
        }
        lottery.validate()?;

        let viewer = self
            .account
            .map(|raw| raw.parse::<Felt>())
            .transpose()
            .wrap_err("invalid --account")?;

        Ok(app::AppConfig {
            lottery,
            wallet_url: self.wallet_url,
            viewer,
        })
    }
}

/// Logs go to a file; the terminal belongs to the UI.
fn init_tracing(log_dir: &Path) -> WorkerGuard {
    let appender = tracing_appender::rolling::never(log_dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let _guard = init_tracing(&args.log_dir);
    let config = args.into_config()?;
    tracing::info!(
        contract = %config.lottery.contract_address,
        rpc = %config.lottery.rpc_url,
        "starting luck3 client"
    );
    app::run_app(config).await
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use luck3_client::config::DEFAULT_MAINNET_RPC_URL;

    fn parse(extra: &[&str]) -> Result<app::AppConfig> {
        let mut argv = vec!["luck3", "--contract-address", "0x123"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv)?.into_config()
    }

    #[test]
    fn into_config__applies_network_defaults() {
        let config = parse(&["--network", "mainnet"]).unwrap();
        assert_eq!(config.lottery.network, Network::Mainnet);
        assert_eq!(config.lottery.rpc_url, DEFAULT_MAINNET_RPC_URL);
        assert_eq!(config.lottery.contract_address, Felt::from(0x123u64));
        assert_eq!(config.viewer, None);
    }

    #[test]
    fn into_config__overrides_take_precedence() {
        // when
        let config = parse(&[
            "--rpc-url",
            "http://localhost:5050",
            "--ticket-cost",
            "500",
            "--account",
            "0xbeef",
        ])
        .unwrap();

        // then
        assert_eq!(config.lottery.rpc_url, "http://localhost:5050");
        assert_eq!(config.lottery.ticket_cost, U256::from(500u64));
        assert_eq!(config.viewer, Some(Felt::from(0xbeefu64)));
    }

    #[test]
    fn into_config__rejects_inverted_guess_range() {
        assert!(parse(&["--min-guess", "50", "--max-guess", "20"]).is_err());
    }

    #[test]
    fn into_config__rejects_unknown_network() {
        assert!(parse(&["--network", "goerli"]).is_err());
    }
}
