#![allow(missing_docs)]

//! wasend: send one WhatsApp message through the bridge sidecar.
//!
//! Exit code 0 means the message went out (acknowledged or not) or sending is
//! disabled; 1 means nothing was sent or authentication failed.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};

use wasend::config::{default_config_path, load_config};
use wasend::delivery::outcome::ExitStatus;
use wasend::delivery::{pipeline, Failure};
use wasend::logging;
use wasend::whatsapp::client::WhatsAppClient;

/// Send one WhatsApp message and report delivery through the exit code.
#[derive(Parser)]
#[command(name = "wasend", version, about)]
struct Cli {
    /// JSON config file (default: ./config.json, then ~/.wasend/config.json).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also write JSON logs to this directory, rotated daily.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Message text; words are joined with single spaces.
    message: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.log_dir.as_deref());

    run(cli).await.into()
}

async fn run(cli: Cli) -> ExitStatus {
    let path = cli.config.unwrap_or_else(default_config_path);
    let config = match load_config(&path) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %Failure::Config(format!("{e:#}")), "cannot start");
            return ExitStatus::Failed;
        }
    };

    let wa = &config.whatsapp;
    if !wa.enabled {
        info!(config = %path.display(), "WhatsApp sending disabled in config, nothing to do");
        return ExitStatus::Success;
    }

    let text = cli.message.join(" ");
    if text.trim().is_empty() {
        error!(error = %Failure::NoMessage, "usage: wasend [OPTIONS] <MESSAGE>...");
        return ExitStatus::Failed;
    }

    let client = WhatsAppClient::new(wa.bridge_url.clone());
    pipeline::run(
        &client,
        &wa.target_descriptor(),
        &text,
        &wa.delivery_settings(),
        shutdown_signal(),
    )
    .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("interrupt received");
}
