use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use crypto_roulette::{
    correlator::DEFAULT_SPIN_TIMEOUT,
    deployment,
    scheduler::DEFAULT_POLL_INTERVAL,
    wallets,
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

mod client;
mod ui;

const DEFAULT_LOG_DIR: &str = "./logs";
const LOG_FILE_PREFIX: &str = "crypto-roulette.log";

fn print_usage_and_exit() -> ! {
    println!(
        "Usage: crypto-roulette [--devnet | --testnet | --local] [--rpc-url <url>]\n\
         --wallet <name> [--wallet-dir <path>]\n\
         [--roulette-contract <id>] [--lottery-contract <id>] [--from-block <height>]\n\
         [--spin-timeout-secs <n>] [--poll-interval-ms <n>] [--log-dir <path>]\n\
         \n\
         Flags:\n\
           --devnet                   Connect to Fuel devnet (default RPC {})\n\
           --testnet                  Connect to Fuel testnet (default RPC {})\n\
           --local                    Connect to a local Fuel node (default RPC {})\n\
           --rpc-url <url>            Override the RPC URL for the selected network\n\
           --wallet <name>            forc-wallet profile to play with\n\
           --wallet-dir <path>        Override forc-wallet directory (defaults to {})\n\
           --roulette-contract <id>   CryptoRoulette contract id (defaults to the deployment record)\n\
           --lottery-contract <id>    DailyLottery contract id (defaults to the deployment record)\n\
           --from-block <height>      First block to load events from\n\
           --spin-timeout-secs <n>    Give up waiting for a spin result after n seconds (default {})\n\
           --poll-interval-ms <n>     Refresh interval for reads and events (default {})\n\
           --log-dir <path>           Directory for the rolling log file (default {})",
        client::DEFAULT_DEVNET_RPC_URL,
        client::DEFAULT_TESTNET_RPC_URL,
        client::DEFAULT_LOCAL_RPC_URL,
        wallets::DEFAULT_WALLET_DIR,
        DEFAULT_SPIN_TIMEOUT.as_secs(),
        DEFAULT_POLL_INTERVAL.as_millis(),
        DEFAULT_LOG_DIR,
    );
    std::process::exit(0);
}

fn parse_number<T: std::str::FromStr>(flag: &str, raw: &str) -> Result<T> {
    raw.parse::<T>()
        .map_err(|_| eyre!("{flag} expects a number, got '{raw}'"))
}

fn parse_nonzero(flag: &str, raw: &str) -> Result<u64> {
    match parse_number::<u64>(flag, raw)? {
        0 => Err(eyre!("{flag} must be greater than zero")),
        n => Ok(n),
    }
}

fn next_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next()
        .ok_or_else(|| eyre!("{flag} requires an argument"))
}

fn set_once<T>(slot: &mut Option<T>, flag: &str, value: T) -> Result<()> {
    if slot.is_some() {
        return Err(eyre!("{flag} may only be specified once"));
    }
    *slot = Some(value);
    Ok(())
}

fn parse_cli_args(args: impl IntoIterator<Item = String>) -> Result<client::AppConfig> {
    #[derive(Clone, Copy)]
    enum NetworkFlag {
        Devnet,
        Testnet,
        Local,
    }

    let mut args = args.into_iter();
    let mut network_flag: Option<NetworkFlag> = None;
    let mut custom_url: Option<String> = None;
    let mut wallet_dir: Option<String> = None;
    let mut wallet_name: Option<String> = None;
    let mut roulette_contract: Option<String> = None;
    let mut lottery_contract: Option<String> = None;
    let mut from_block: Option<u32> = None;
    let mut spin_timeout_secs: Option<u64> = None;
    let mut poll_interval_ms: Option<u64> = None;
    let mut log_dir: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--devnet" | "--testnet" | "--local" => {
                let flag = match arg.as_str() {
                    "--devnet" => NetworkFlag::Devnet,
                    "--testnet" => NetworkFlag::Testnet,
                    _ => NetworkFlag::Local,
                };
                if network_flag.is_some() {
                    return Err(eyre!(
                        "Multiple network flags provided; choose one of --devnet/--testnet/--local"
                    ));
                }
                network_flag = Some(flag);
            }
            "--rpc-url" => {
                let url = next_value(&mut args, "--rpc-url")?;
                if network_flag.is_none() {
                    return Err(eyre!(
                        "--rpc-url must follow a network flag (--devnet/--testnet/--local)"
                    ));
                }
                set_once(&mut custom_url, "--rpc-url", url)?;
            }
            "--wallet-dir" => {
                let dir = next_value(&mut args, "--wallet-dir")?;
                set_once(&mut wallet_dir, "--wallet-dir", dir)?;
            }
            "--wallet" => {
                let name = next_value(&mut args, "--wallet")?;
                set_once(&mut wallet_name, "--wallet", name)?;
            }
            "--roulette-contract" => {
                let id = next_value(&mut args, "--roulette-contract")?;
                set_once(&mut roulette_contract, "--roulette-contract", id)?;
            }
            "--lottery-contract" => {
                let id = next_value(&mut args, "--lottery-contract")?;
                set_once(&mut lottery_contract, "--lottery-contract", id)?;
            }
            "--from-block" => {
                let raw = next_value(&mut args, "--from-block")?;
                set_once(
                    &mut from_block,
                    "--from-block",
                    parse_number("--from-block", &raw)?,
                )?;
            }
            "--spin-timeout-secs" => {
                let raw = next_value(&mut args, "--spin-timeout-secs")?;
                set_once(
                    &mut spin_timeout_secs,
                    "--spin-timeout-secs",
                    parse_nonzero("--spin-timeout-secs", &raw)?,
                )?;
            }
            "--poll-interval-ms" => {
                let raw = next_value(&mut args, "--poll-interval-ms")?;
                set_once(
                    &mut poll_interval_ms,
                    "--poll-interval-ms",
                    parse_nonzero("--poll-interval-ms", &raw)?,
                )?;
            }
            "--log-dir" => {
                let dir = next_value(&mut args, "--log-dir")?;
                set_once(&mut log_dir, "--log-dir", dir)?;
            }
            "--help" | "-h" => print_usage_and_exit(),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    let network = match network_flag {
        None => {
            return Err(eyre!(
                "Select a network with --devnet, --testnet, or --local"
            ));
        }
        Some(NetworkFlag::Devnet) => client::NetworkTarget::Devnet {
            url: custom_url.unwrap_or_else(|| client::DEFAULT_DEVNET_RPC_URL.to_string()),
        },
        Some(NetworkFlag::Testnet) => client::NetworkTarget::Testnet {
            url: custom_url
                .unwrap_or_else(|| client::DEFAULT_TESTNET_RPC_URL.to_string()),
        },
        Some(NetworkFlag::Local) => client::NetworkTarget::LocalNode {
            url: custom_url.unwrap_or_else(|| client::DEFAULT_LOCAL_RPC_URL.to_string()),
        },
    };

    let wallet = wallet_name.ok_or_else(|| {
        eyre!("Specify --wallet <name> to select a forc-wallet profile")
    })?;
    let dir = wallets::KeystoreDir::resolve(wallet_dir.as_deref())?;
    let log_dir = PathBuf::from(shellexpand::tilde(
        log_dir.as_deref().unwrap_or(DEFAULT_LOG_DIR),
    )
    .into_owned());

    Ok(client::AppConfig {
        network,
        wallet: client::WalletConfig::ForcKeystore { name: wallet, dir },
        roulette_contract,
        lottery_contract,
        from_block,
        spin_timeout: spin_timeout_secs
            .map_or(DEFAULT_SPIN_TIMEOUT, Duration::from_secs),
        poll_interval: poll_interval_ms
            .map_or(DEFAULT_POLL_INTERVAL, Duration::from_millis),
        log_dir,
    })
}

fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let (writer, guard) =
        tracing_appender::non_blocking(rolling::daily(log_dir, LOG_FILE_PREFIX));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| eyre!(e))?;
    Ok(guard)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let app_config = parse_cli_args(std::env::args().skip(1))?;
    let _log_guard = init_tracing(&app_config.log_dir)?;
    tracing::info!("starting crypto-roulette client");
    deployment::ensure_structure()?;
    client::run_app(app_config).await
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn parse_cli_args__rejects_a_zero_poll_interval() {
        // given
        let raw = args(&[
            "--local",
            "--wallet",
            "alice",
            "--wallet-dir",
            "/tmp/keys",
            "--poll-interval-ms",
            "0",
        ]);

        // when
        let err = parse_cli_args(raw).unwrap_err();

        // then
        assert!(err.to_string().contains("--poll-interval-ms must be greater than zero"));
    }

    #[test]
    fn parse_cli_args__rejects_a_zero_spin_timeout() {
        let raw = args(&[
            "--local",
            "--wallet",
            "alice",
            "--wallet-dir",
            "/tmp/keys",
            "--spin-timeout-secs",
            "0",
        ]);
        let err = parse_cli_args(raw).unwrap_err();
        assert!(err.to_string().contains("--spin-timeout-secs must be greater than zero"));
    }

    #[test]
    fn parse_cli_args__applies_explicit_intervals_and_defaults() {
        // given
        let raw = args(&[
            "--testnet",
            "--wallet",
            "alice",
            "--wallet-dir",
            "/tmp/keys",
            "--poll-interval-ms",
            "500",
            "--from-block",
            "42",
        ]);

        // when
        let config = parse_cli_args(raw).unwrap();

        // then
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.spin_timeout, DEFAULT_SPIN_TIMEOUT);
        assert_eq!(config.from_block, Some(42));
        assert_eq!(config.network.url(), client::DEFAULT_TESTNET_RPC_URL);
    }
}
