//! Ticketing CLI
//!
//! Operator tool around the ticketing core: hash credentials, encrypt and
//! decrypt envelopes by hand, and watch the realtime payment channel.
//!
//! ## Configuration
//!
//! Everything except `hash` reads the `APP_*` environment variables
//! (`APP_ENVIRONMENT`, `APP_ENCRYPTION_PASSWORD`, `APP_ENCRYPTION_SECRETKEY`,
//! `APP_AGENCY`, `APP_SECRET`, with `_DEV` variants in development).

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use ticketing_core::{
    hash_credentials,
    types::{events, ChannelEvent},
    AppConfig, PayloadCipher, TicketingCore, WatchOutcome,
};

#[derive(Debug, Parser)]
#[command(name = "ticketing-cli", version, about = "SmartDeals ticketing client tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Hash a username/password pair the way the login endpoint expects
    Hash { username: String, password: String },
    /// Encrypt a JSON payload into an envelope
    Encrypt {
        /// Use the payment API secret pair
        #[arg(long)]
        payment: bool,
        json: String,
    },
    /// Decrypt an envelope back into JSON
    Decrypt {
        /// Use the payment API secret pair
        #[arg(long)]
        payment: bool,
        ciphertext: String,
    },
    /// Connect to the realtime channel and log events until Ctrl-C
    Listen {
        /// Exit once this initiation reference is confirmed
        #[arg(long)]
        reference: Option<String>,
    },
}

fn cipher(payment: bool) -> ticketing_core::Result<PayloadCipher> {
    let config = AppConfig::from_env()?;
    if payment {
        PayloadCipher::new(&config.payment.secret_pair())
    } else {
        PayloadCipher::new(&config.api_secrets)
    }
}

fn log_event(event: &ChannelEvent) {
    match event {
        ChannelEvent::Connected { sid } => tracing::info!("connected (sid {:?})", sid),
        ChannelEvent::Disconnected { reason } => tracing::warn!("disconnected: {}", reason),
        ChannelEvent::ConnectError { message } => tracing::error!("connect error: {}", message),
        ChannelEvent::WalletBalance(data) => tracing::info!("wallet_balance: {}", data),
        ChannelEvent::PaymentStatus(records) => {
            tracing::info!("payment_status: {} record(s)", records.len())
        }
        ChannelEvent::PaymentConfirmed {
            initiation_tran_ref,
        } => tracing::info!("payment confirmed: {}", initiation_tran_ref),
    }
}

async fn listen(reference: Option<String>) -> ticketing_core::Result<()> {
    let core = TicketingCore::from_env()?;
    let handler: Arc<dyn Fn(&ChannelEvent) + Send + Sync> = Arc::new(log_event);
    for name in [
        events::CONNECT,
        events::DISCONNECT,
        events::CONNECT_ERROR,
        events::WALLET_BALANCE,
        events::PAYMENT_STATUS,
        events::PAYMENT_CONFIRMED,
    ] {
        let handler = handler.clone();
        core.realtime()
            .on_event(name, move |event| handler(event))
            .await;
    }
    core.start().await?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
        on_signal.cancel();
    });

    match reference {
        Some(reference) => match core.watcher().wait_for(&reference, cancel).await {
            WatchOutcome::Confirmed { elapsed } => {
                println!("{} confirmed after {}s", reference, elapsed.as_secs())
            }
            WatchOutcome::Expired => println!("{} not confirmed in time", reference),
            WatchOutcome::Cancelled => println!("stopped"),
        },
        None => cancel.cancelled().await,
    }

    core.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Hash { username, password } => {
            let token = hash_credentials(&username, &password);
            println!("primary:      {}", token.primary);
            println!("intermediate: {}", token.intermediate);
        }
        Command::Encrypt { payment, json } => {
            let payload: Value = serde_json::from_str(&json)?;
            println!("{}", cipher(payment)?.encrypt(&payload)?);
        }
        Command::Decrypt {
            payment,
            ciphertext,
        } => {
            let value = cipher(payment)?.decrypt(ciphertext.trim())?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Command::Listen { reference } => listen(reference).await?,
    }

    Ok(())
}
