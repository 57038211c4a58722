//! substrate-txgen - command-line extrinsic generator
//!
//! Builds a transaction, prints its projected fee, submits it and follows it
//! to a terminal outcome. `watch` locates an already-broadcast extrinsic in
//! the finalized chain.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use substrate_txgen::chain::{
    parse_address, ChainClient, InclusionMonitor, SubstrateAccount, SubstrateClient,
};
use substrate_txgen::config::Settings;
use substrate_txgen::tx::{self, CallKind, CallParams, CostProjection, FeeEstimator, RequestBuilder};
use substrate_txgen::{metrics, prompt, units, CancelHandle, ClientError};

#[derive(Debug, Parser)]
#[command(name = "substrate-txgen", version, about)]
struct Cli {
    /// Config file (defaults to config/default.toml, then built-in networks)
    #[arg(long, env = "TXGEN_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Network key from the config
    #[arg(long, global = true)]
    network: Option<String>,

    /// Give up after this many seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Print Prometheus metrics before exiting
    #[arg(long, global = true)]
    print_metrics: bool,

    /// Signing secret: 0x-prefixed hex seed, mnemonic or dev URI such as //Alice
    #[arg(long, env = "TXGEN_SECRET", global = true, hide_env_values = true)]
    secret: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Transfer funds, keeping the sender alive
    Transfer {
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: String,
    },
    /// Bond funds for staking, paying rewards to `payee`
    Stake {
        #[arg(long)]
        payee: String,
        #[arg(long)]
        amount: String,
    },
    /// Cast a standard conviction vote on a referendum
    Vote {
        #[arg(long)]
        referendum: u32,
        /// Vote nay instead of aye
        #[arg(long)]
        nay: bool,
        #[arg(long, default_value_t = 0)]
        conviction: u8,
        #[arg(long)]
        balance: String,
    },
    /// Several transfers executed atomically, in order
    Batch {
        /// `address:amount`, repeatable
        #[arg(long = "to", required = true)]
        transfers: Vec<String>,
    },
    /// Reserve-transfer funds to an account on a parachain
    Xcm {
        #[arg(long)]
        para_id: u32,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: String,
    },
    /// Print the projected fee of a transfer without submitting it
    Estimate {
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: String,
    },
    /// Wait for an extrinsic hash to appear in a finalized block
    Watch {
        #[arg(long)]
        tx_hash: String,
    },
    /// Prompt for network, secret, recipient and amount, then transfer
    Interactive,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    init_logging();

    let cli = Cli::parse();
    let print_metrics = cli.print_metrics;

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            e.downcast_ref::<ClientError>()
                .map(ClientError::exit_code)
                .unwrap_or(1)
        }
    };

    if print_metrics {
        match metrics::render() {
            Ok(text) => print!("{}", text),
            Err(e) => warn!("Could not render metrics: {}", e),
        }
    }

    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    info!("Starting substrate-txgen v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };

    let mut network_key = cli.network.clone();
    let mut interactive = None;
    if let Command::Interactive = cli.command {
        let mut stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        let answers = prompt::collect(&mut stdin, &mut stdout, &settings).await?;
        match prompt::validate(&answers, &settings) {
            Ok(input) => {
                network_key = Some(input.network.clone());
                interactive = Some(input);
            }
            Err(errors) => {
                for e in &errors {
                    eprintln!("error: {}", e);
                }
                return Ok(2);
            }
        }
    }

    let network = settings.network(network_key.as_deref())?;

    let secret = interactive
        .as_ref()
        .map(|input| input.secret.clone())
        .or(cli.secret.clone());
    preflight(&cli.command, secret.as_deref(), interactive.as_ref())?;

    let cancel = CancelHandle::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            warn!("Shutdown signal received, cancelling");
            cancel.cancel();
        }
    });
    if let Some(secs) = cli.timeout_secs.or(settings.client.timeout_secs) {
        cancel.cancel_after(Duration::from_secs(secs));
    }

    let client = SubstrateClient::connect(network).await?;

    let result = dispatch(&client, cli.command, secret, interactive, &cancel).await;

    // Best-effort teardown, whatever the outcome
    client.disconnect();
    result.map(|()| 0)
}

async fn dispatch(
    client: &SubstrateClient,
    command: Command,
    secret: Option<String>,
    interactive: Option<prompt::ValidatedInput>,
    cancel: &CancelHandle,
) -> Result<()> {
    let token = client.network().token_symbol.clone();
    let builder = RequestBuilder::new(client);

    let request = match command {
        Command::Watch { tx_hash } => {
            let record = InclusionMonitor::new(client)
                .wait_for(&tx_hash, cancel)
                .await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            return Ok(());
        }
        Command::Estimate { to, amount } => {
            let account = signer(client, secret).await?;
            let request = builder.build(&account, &to, &amount, CallParams::Transfer)?;
            let cost = FeeEstimator::new(client).estimate_total(&request).await?;
            println!("{}", cost_summary(&cost, &token));
            return Ok(());
        }
        Command::Interactive => {
            let input = interactive.context("interactive input was not collected")?;
            let account = signer(client, secret).await?;
            let request = builder.build_planck(
                &account,
                &input.recipient,
                input.amount,
                CallParams::Transfer,
            )?;
            (account, request)
        }
        Command::Transfer { to, amount } => {
            let account = signer(client, secret).await?;
            let request = builder.build(&account, &to, &amount, CallParams::Transfer)?;
            (account, request)
        }
        Command::Stake { payee, amount } => {
            let account = signer(client, secret).await?;
            let request = builder.build(&account, &payee, &amount, CallParams::Stake)?;
            (account, request)
        }
        Command::Xcm { para_id, to, amount } => {
            let account = signer(client, secret).await?;
            let request = builder.build(
                &account,
                &to,
                &amount,
                CallParams::CrossChainTransfer { para_id },
            )?;
            (account, request)
        }
        Command::Vote {
            referendum,
            nay,
            conviction,
            balance,
        } => {
            let account = signer(client, secret).await?;
            let balance = units::to_smallest_unit(&balance)?;
            let request = builder.build_vote(&account, referendum, !nay, conviction, balance)?;
            (account, request)
        }
        Command::Batch { transfers } => {
            let calls = transfers
                .iter()
                .map(|entry| parse_batch_entry(entry))
                .collect::<Result<Vec<_>, _>>()?;
            let account = signer(client, secret).await?;
            let request = builder.build_batch(&account, calls)?;
            (account, request)
        }
    };
    let (account, request) = request;

    let (observer, mut transitions) = mpsc::unbounded_channel();
    let progress = tokio::spawn(async move {
        while let Some(outcome) = transitions.recv().await {
            info!("Status: {}", outcome);
        }
    });

    let result = tx::execute(client, &account, request, cancel, Some(observer)).await;
    // The observer sender is dropped with the tracker, so this drains and ends
    if let Err(e) = progress.await {
        warn!("Status logger task failed: {}", e);
    }

    let report = result?;
    println!(
        "Fee paid (estimated): {} {}",
        units::from_smallest_unit(report.fee.partial_fee),
        token
    );
    let outcome = report.outcome.into_result()?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn signer(client: &SubstrateClient, secret: Option<String>) -> Result<SubstrateAccount> {
    let secret = secret.ok_or_else(missing_secret)?;
    let account = client.derive_account(&secret).await?;
    info!("Signing as {}", account.account_id());
    Ok(account)
}

fn missing_secret() -> ClientError {
    ClientError::InvalidSecret("pass --secret or set TXGEN_SECRET".to_string())
}

/// Checks that need no connection: amounts, addresses, conviction, batch
/// entries and the signing secret
fn preflight(
    command: &Command,
    secret: Option<&str>,
    interactive: Option<&prompt::ValidatedInput>,
) -> Result<(), ClientError> {
    let kind = match command {
        Command::Watch { .. } => return Ok(()),
        Command::Interactive => match interactive {
            Some(input) => CallKind::Transfer {
                dest: input.recipient.clone(),
                value: input.amount,
            },
            None => return Ok(()),
        },
        Command::Transfer { to, amount } | Command::Estimate { to, amount } => {
            CallKind::Transfer {
                dest: to.clone(),
                value: units::to_smallest_unit(amount)?,
            }
        }
        Command::Stake { payee, amount } => CallKind::Stake {
            value: units::to_smallest_unit(amount)?,
            payee: payee.clone(),
        },
        Command::Xcm { para_id, to, amount } => CallKind::CrossChainTransfer {
            para_id: *para_id,
            beneficiary: to.clone(),
            amount: units::to_smallest_unit(amount)?,
        },
        Command::Vote {
            referendum,
            nay,
            conviction,
            balance,
        } => CallKind::Vote {
            referendum: *referendum,
            aye: !nay,
            conviction: *conviction,
            balance: units::to_smallest_unit(balance)?,
        },
        Command::Batch { transfers } => CallKind::Batch {
            calls: transfers
                .iter()
                .map(|entry| parse_batch_entry(entry))
                .collect::<Result<Vec<_>, _>>()?,
        },
    };
    tx::validate_kind(&kind, &|address| parse_address(address).is_ok())?;

    SubstrateAccount::from_secret(secret.ok_or_else(missing_secret)?)?;
    Ok(())
}

fn cost_summary(cost: &CostProjection, token: &str) -> String {
    format!(
        "Amount: {amount} {token}\nEstimated fee: {fee} {token} (ref_time {ref_time}, proof_size {proof_size})\nTotal: {total} {token}",
        amount = units::format_exact(cost.amount),
        fee = units::from_smallest_unit(cost.fee.partial_fee),
        ref_time = cost.fee.weight.ref_time,
        proof_size = cost.fee.weight.proof_size,
        total = units::format_exact(cost.total),
        token = token,
    )
}

/// Parse `address:amount` into a transfer call
fn parse_batch_entry(entry: &str) -> Result<CallKind, ClientError> {
    let (dest, amount) = entry.rsplit_once(':').ok_or_else(|| {
        ClientError::InvalidBatch(format!("expected address:amount, got {}", entry))
    })?;
    Ok(CallKind::Transfer {
        dest: dest.trim().to_string(),
        value: units::to_smallest_unit(amount)?,
    })
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,substrate_txgen=debug,jsonrpsee=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
