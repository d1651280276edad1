#![forbid(unsafe_code)]

//! `autoshell`: interactive shell automation binary.
//!
//! Loads configuration, installs logging on stderr and runs one session
//! that reads command lines from stdin and prints framed shell output on
//! stdout.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use autoshell::{AppError, JsonLinesSink, MessageListener, Result, Session, ShellConfig, StdoutSink};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    /// Payloads written verbatim.
    Text,
    /// One JSON object per message.
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "autoshell", about = "Interactive shell automation engine", version, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the shell program from the configuration.
    #[arg(long)]
    shell: Option<String>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Message output format (text or json).
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("autoshell bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ShellConfig::load_from_path(path)?,
        None => ShellConfig::default(),
    };

    if let Some(shell) = args.shell {
        config.shell = shell;
    }
    config.validate()?;
    info!(shell = %config.shell, "configuration loaded");

    let listener: Arc<dyn MessageListener> = match args.output {
        OutputFormat::Text => Arc::new(StdoutSink),
        OutputFormat::Json => Arc::new(JsonLinesSink),
    };

    let mut session = Session::new(config, Some(listener));
    session.run_stdin().await.map_err(|err| {
        error!(%err, "session failed");
        err
    })?;

    info!("autoshell shut down");
    Ok(())
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

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
