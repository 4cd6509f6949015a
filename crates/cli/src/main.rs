// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use huddle::command;
use huddle::context::Context;
use huddle::error::CliError;
use huddle::hooks::{self, HookKind};

#[derive(Parser)]
#[command(name = "huddle", version, about = "Shared message bus for AI coding agents.")]
struct Cli {
    /// State directory (default ~/.huddle).
    #[arg(long, env = "HUDDLE_DIR", global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new instance in the roster.
    Start(command::start::StartArgs),
    /// Stop an instance (writes its terminal snapshot).
    Stop(command::stop::StopArgs),
    /// Resume a stopped instance from its snapshot.
    Resume(command::start::ResumeArgs),
    /// Send a message; leading @targets select recipients.
    Send(command::send::SendArgs),
    /// Wait for messages with TCP wake and poll fallback.
    Listen(command::listen::ListenArgs),
    /// Show the roster.
    List(command::list::ListArgs),
    /// Query events; `events sub`/`unsub` manage subscriptions.
    Events(command::events::EventsArgs),
    /// Archive the store and start over.
    Reset(command::reset::ResetArgs),
    /// Cross-device sync: status, new, connect, off.
    Relay(command::relay::RelayArgs),
    /// Manage the huddled background process.
    Daemon(command::daemon::DaemonArgs),

    // Hook entries invoked by agent tools; stdin carries the JSON body.
    #[command(name = "pre", hide = true)]
    HookPre,
    #[command(name = "post", hide = true)]
    HookPost,
    #[command(name = "notify", hide = true)]
    HookNotify,
    #[command(name = "sessionstart", hide = true)]
    HookSessionStart,
    #[command(name = "userpromptsubmit", hide = true)]
    HookUserPromptSubmit,
    #[command(name = "stop-hook", hide = true)]
    HookStop,
    #[command(name = "sessionend", hide = true)]
    HookSessionEnd,
    #[command(name = "subagent-start", hide = true)]
    HookSubagentStart,
    #[command(name = "subagent-stop", hide = true)]
    HookSubagentStop,
}

fn hook_kind(cmd: &Commands) -> Option<HookKind> {
    match cmd {
        Commands::HookPre => Some(HookKind::Pre),
        Commands::HookPost => Some(HookKind::Post),
        Commands::HookNotify => Some(HookKind::Notify),
        Commands::HookSessionStart => Some(HookKind::SessionStart),
        Commands::HookUserPromptSubmit => Some(HookKind::UserPromptSubmit),
        Commands::HookStop => Some(HookKind::Stop),
        Commands::HookSessionEnd => Some(HookKind::SessionEnd),
        Commands::HookSubagentStart => Some(HookKind::SubagentStart),
        Commands::HookSubagentStop => Some(HookKind::SubagentStop),
        _ => None,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("HUDDLE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut ctx = match Context::init(cli.dir.as_deref()) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("fatal: {e:#}");
            std::process::exit(1);
        }
    };

    if let Some(kind) = hook_kind(&cli.cmd) {
        std::process::exit(hooks::run(&ctx, kind));
    }

    let outcome = match cli.cmd {
        Commands::Start(args) => command::start::run(&ctx, &args),
        Commands::Stop(args) => command::stop::run(&ctx, &args).await,
        Commands::Resume(args) => command::start::run_resume(&ctx, &args),
        Commands::Send(args) => command::send::run(&ctx, &args),
        Commands::Listen(args) => command::listen::run(&ctx, &args).await,
        Commands::List(args) => command::list::run(&ctx, &args),
        Commands::Events(args) => command::events::run(&ctx, &args).await,
        Commands::Reset(args) => command::reset::run(&ctx, &args),
        Commands::Relay(args) => command::relay::run(&mut ctx, &args).await,
        Commands::Daemon(args) => command::daemon::run(&ctx, &args),
        _ => Ok(0),
    };

    match outcome {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            if let Some(cli_err) = e.downcast_ref::<CliError>() {
                eprintln!("error: {cli_err}");
                if let Some(hint) = cli_err.hint() {
                    eprintln!("  {hint}");
                }
                std::process::exit(cli_err.exit_code());
            }
            eprintln!("fatal: {e:#}");
            std::process::exit(1);
        }
    }
}
