// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing_subscriber::EnvFilter;

use huddle::context::Context;

#[derive(Parser)]
#[command(name = "huddled", version, about = "Relay daemon for the huddle message bus.")]
struct Cli {
    /// State directory (default ~/.huddle).
    #[arg(long, env = "HUDDLE_DIR")]
    dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_env("HUDDLE_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let ctx = match Context::init(cli.dir.as_deref()) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("fatal: {e:#}");
            std::process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(_) => return,
        };
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
        signal_cancel.cancel();
    });

    if let Err(e) = huddled::run::run(ctx, cancel).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
