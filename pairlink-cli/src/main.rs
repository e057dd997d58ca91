mod features;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;
use pairlink::core::{IceServerConfig, Role, SessionId};
use pairlink::peer::signaling::{HttpSignalingStore, InMemorySignalingStore};
use pairlink::peer::transport::TransportConfig;
use pairlink::peer::{
    BackoffPolicy, HealthConfig, SessionBuilder, SessionConfig, SessionHandle, SessionStatus,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::features::FeatureDispatcher;

#[derive(Parser)]
#[command(name = "pairlink", version, about = "Reconnecting peer-to-peer command sessions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP signaling relay.
    Relay {
        #[arg(long, env = "PAIRLINK_BIND", default_value = "127.0.0.1:8787")]
        bind: String,
    },

    /// Run the offering side, answering commands for the given features.
    Offer {
        #[command(flatten)]
        session: SessionArgs,

        /// Feature names served, e.g. `--feature CAMERA --feature MIC`.
        #[arg(long = "feature", env = "PAIRLINK_FEATURES", value_delimiter = ',')]
        features: Vec<String>,
    },

    /// Run the answering side; every stdin line is sent as a command.
    Answer {
        #[command(flatten)]
        session: SessionArgs,
    },
}

#[derive(Args)]
struct SessionArgs {
    /// Session id, with or without dashes.
    #[arg(long, env = "PAIRLINK_SESSION")]
    session: String,

    #[arg(long, env = "PAIRLINK_RELAY", default_value = "http://127.0.0.1:8787")]
    relay: String,

    #[arg(
        long = "stun",
        env = "PAIRLINK_STUN",
        value_delimiter = ',',
        default_value = "stun:stun.l.google.com:19302"
    )]
    stun: Vec<String>,

    #[arg(long, env = "PAIRLINK_DRAIN_MS", default_value_t = 500)]
    drain_ms: u64,

    #[arg(long, env = "PAIRLINK_BACKOFF_MS", default_value_t = 2000)]
    backoff_ms: u64,

    #[arg(long, env = "PAIRLINK_MAX_ATTEMPTS", default_value_t = 5)]
    max_attempts: u32,

    #[arg(long, env = "PAIRLINK_HEALTH_INTERVAL_SECS", default_value_t = 30)]
    health_interval_secs: u64,

    /// Silence after which the connection is rebuilt; 0 disables the check.
    #[arg(long, env = "PAIRLINK_PONG_TIMEOUT_SECS", default_value_t = 90)]
    pong_timeout_secs: u64,

    /// Offerer only: give up on an unanswered offer after this long.
    #[arg(long, env = "PAIRLINK_ANSWER_TIMEOUT_SECS")]
    answer_timeout_secs: Option<u64>,
}

impl SessionArgs {
    fn session_id(&self) -> Result<SessionId> {
        SessionId::parse(&self.session)
            .with_context(|| format!("Invalid session id '{}'", self.session))
    }

    fn config(&self) -> SessionConfig {
        let defaults = SessionConfig::default();
        SessionConfig::default()
            .with_drain_delay(Duration::from_millis(self.drain_ms))
            .with_backoff(BackoffPolicy::new(
                Duration::from_millis(self.backoff_ms),
                defaults.backoff.max_delay,
            ))
            .with_max_attempts(self.max_attempts)
            .with_answer_timeout(self.answer_timeout_secs.map(Duration::from_secs))
            .with_health(HealthConfig {
                interval: Duration::from_secs(self.health_interval_secs),
                pong_timeout: (self.pong_timeout_secs > 0)
                    .then(|| Duration::from_secs(self.pong_timeout_secs)),
                ..defaults.health
            })
            .with_transport(TransportConfig {
                ice_servers: self.stun.iter().map(IceServerConfig::stun).collect(),
                ..TransportConfig::default()
            })
    }

    fn store(&self) -> Arc<HttpSignalingStore> {
        Arc::new(HttpSignalingStore::new(self.relay.clone()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Relay { bind } => run_relay(&bind).await,
        Commands::Offer { session, features } => run_offerer(session, features).await,
        Commands::Answer { session } => run_answerer(session).await,
    }
}

async fn run_relay(bind: &str) -> Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    println!("{} {}", "Relay listening on".green().bold(), bind);

    tokio::select! {
        res = pairlink::relay::serve(listener, InMemorySignalingStore::new()) => {
            res.context("Relay stopped")?;
        }
        _ = tokio::signal::ctrl_c() => info!("Interrupted, stopping relay"),
    }
    Ok(())
}

async fn run_offerer(args: SessionArgs, features: Vec<String>) -> Result<()> {
    let session = args.session_id()?;
    let dispatcher = Arc::new(FeatureDispatcher::new(features));

    let handle = SessionBuilder::new(Role::Offerer, args.store())
        .with_config(args.config())
        .with_dispatcher(dispatcher.clone())
        .spawn();

    println!(
        "{} {} (features: {})",
        "Offering session".green().bold(),
        session,
        dispatcher.describe()
    );
    handle.start(session).await?;

    tokio::select! {
        _ = report_status(&handle) => {}
        _ = tokio::signal::ctrl_c() => {}
    }

    shutdown(&handle).await
}

async fn run_answerer(args: SessionArgs) -> Result<()> {
    let session = args.session_id()?;
    let handle = SessionBuilder::new(Role::Answerer, args.store())
        .with_config(args.config())
        .spawn();

    println!("{} {}", "Answering session".green().bold(), session);
    handle.start(session).await?;

    let mut inbound = handle.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(message) = inbound.recv().await {
            println!("{} {}", "<".cyan(), message);
        }
    });

    let status = report_status(&handle);
    tokio::pin!(status);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = &mut status => break,
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    if let Err(e) = handle.send_text(line.trim()).await {
                        println!("{} {}", "Not sent:".red(), e);
                    }
                }
                None => break,
            },
        }
    }

    printer.abort();
    shutdown(&handle).await
}

/// Prints status changes until the session fails or closes.
async fn report_status(handle: &SessionHandle) {
    let mut rx = handle.watch();
    loop {
        let snapshot = rx.borrow_and_update().clone();
        let label = match snapshot.status {
            SessionStatus::Connected => snapshot.status.as_str().green(),
            SessionStatus::Connecting => snapshot.status.as_str().yellow(),
            _ => snapshot.status.as_str().red(),
        };
        println!(
            "{} {} (attempts {}/{})",
            "status:".bold(),
            label,
            snapshot.reconnection.attempts,
            snapshot.reconnection.max_attempts
        );

        if matches!(snapshot.status, SessionStatus::Failed | SessionStatus::Closed) {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn shutdown(handle: &SessionHandle) -> Result<()> {
    handle.shutdown().await?;
    println!("{}", "Session closed".green());
    Ok(())
}
