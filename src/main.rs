#![forbid(unsafe_code)]

//! `task-harvester` service binary.
//!
//! Loads configuration, opens the task store, starts one poller per
//! configured channel, and serves the task board API until shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use task_harvester::api::{self, ApiState};
use task_harvester::channels::{GmailSource, SlackHistorySource};
use task_harvester::config::GlobalConfig;
use task_harvester::inference::{OpenAiClient, TaskInference};
use task_harvester::persistence::db;
use task_harvester::persistence::ledger_repo::LedgerRepo;
use task_harvester::persistence::task_repo::TaskRepo;
use task_harvester::poller::{spawn_poller, EmailPoller, SlackPoller, TaskPipeline};
use task_harvester::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "task-harvester", about = "Infer tasks from Slack and email", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Run the pollers without serving the HTTP API.
    #[arg(long)]
    no_api: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("task-harvester bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    config.load_credentials().await?;
    info!("configuration loaded");

    // ── Initialize database ─────────────────────────────
    let db = Arc::new(db::connect(&config.db_path).await?);
    info!(path = %config.db_path.display(), "database connected");

    // ── Build the inference pipeline ────────────────────
    let inference: Arc<dyn TaskInference> = Arc::new(OpenAiClient::new(&config.llm)?);
    let pipeline = Arc::new(TaskPipeline::new(
        TaskRepo::new(Arc::clone(&db)),
        LedgerRepo::new(Arc::clone(&db)),
        inference,
        config.requester_profile.clone(),
        config.llm.timeout(),
    ));

    // ── Start pollers ───────────────────────────────────
    let ct = CancellationToken::new();
    let mut handles: Vec<JoinHandle<()>> = Vec::new();

    if let Some(slack) = &config.slack {
        let source = Arc::new(SlackHistorySource::new(slack)?);
        let poller = SlackPoller::new(source, Arc::clone(&pipeline), slack.channel_id.clone());
        handles.push(spawn_poller(poller, slack.schedule(), ct.clone()));
    } else {
        info!("slack not configured; slack poller disabled");
    }

    if let Some(email) = &config.email {
        let source = Arc::new(GmailSource::new(email)?);
        let poller = EmailPoller::new(source, Arc::clone(&pipeline), email.sender_address.clone());
        handles.push(spawn_poller(poller, email.schedule(), ct.clone()));
    } else {
        info!("email not configured; email poller disabled");
    }

    // ── Start the task api ──────────────────────────────
    if !args.no_api {
        let api_ct = ct.clone();
        let state = ApiState::new(&db);
        let port = config.http_port;
        let origins = config.cors_allowed_origins.clone();
        handles.push(tokio::spawn(async move {
            if let Err(err) = api::serve_api(state, port, &origins, api_ct).await {
                error!(%err, "task api failed");
            }
        }));
    }

    info!(workers = handles.len(), "task-harvester ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    for handle in handles {
        if let Err(err) = handle.await {
            error!(%err, "worker task panicked");
        }
    }
    db.close().await;
    info!("task-harvester shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
