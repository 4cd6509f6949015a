// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `huddle daemon` — spawn, signal and probe the `huddled` process.

use std::fs;
use std::process::{Command, Stdio};

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use crate::context::Context;
use crate::relay::daemon_link::is_relay_handled_by_daemon;
use crate::relay::KV_DAEMON_PORT;

#[derive(Debug, Clone, Args)]
pub struct DaemonArgs {
    #[command(subcommand)]
    pub cmd: DaemonCmd,
}

#[derive(Debug, Clone, Subcommand)]
pub enum DaemonCmd {
    /// Spawn huddled in the background.
    Start,
    /// Signal huddled to shut down.
    Stop,
    /// Probe the daemon's trigger port.
    Ping,
    /// Show pid/port liveness.
    Status,
}

fn read_pid(ctx: &Context) -> Option<i32> {
    fs::read_to_string(ctx.dirs.daemon_pid_path())
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn pid_alive(pid: i32) -> bool {
    // Signal 0: existence check without delivering anything.
    kill(Pid::from_raw(pid), None::<Signal>).is_ok()
}

pub fn run(ctx: &Context, args: &DaemonArgs) -> Result<i32> {
    match args.cmd {
        DaemonCmd::Start => start(ctx),
        DaemonCmd::Stop => stop(ctx),
        DaemonCmd::Ping => ping(ctx),
        DaemonCmd::Status => status(ctx),
    }
}

fn start(ctx: &Context) -> Result<i32> {
    if let Some(pid) = read_pid(ctx) {
        if pid_alive(pid) {
            println!("Daemon already running (pid {pid})");
            return Ok(0);
        }
    }

    // Prefer the huddled next to this binary; fall back to PATH.
    let sibling = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("huddled")));
    let program = match sibling {
        Some(path) if path.exists() => path,
        _ => "huddled".into(),
    };

    let log = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(ctx.dirs.daemon_log_path())
        .context("open daemon log")?;
    let child = Command::new(&program)
        .arg("--dir")
        .arg(ctx.dirs.root())
        .stdin(Stdio::null())
        .stdout(Stdio::from(log.try_clone()?))
        .stderr(Stdio::from(log))
        .spawn()
        .with_context(|| format!("cannot spawn {}", program.display()))?;

    println!("Daemon started (pid {})", child.id());
    Ok(0)
}

fn stop(ctx: &Context) -> Result<i32> {
    let Some(pid) = read_pid(ctx) else {
        println!("Daemon not running (no pid file)");
        return Ok(0);
    };
    if !pid_alive(pid) {
        println!("Daemon not running (stale pid {pid})");
        let _ = fs::remove_file(ctx.dirs.daemon_pid_path());
        return Ok(0);
    }
    kill(Pid::from_raw(pid), Signal::SIGTERM).context("signal daemon")?;
    println!("Sent SIGTERM to daemon (pid {pid})");
    Ok(0)
}

fn ping(ctx: &Context) -> Result<i32> {
    let store = ctx.store()?;
    if is_relay_handled_by_daemon(&store)? {
        let port = store.kv_get_i64(KV_DAEMON_PORT)?;
        println!("Daemon: responding on port {port}");
        Ok(0)
    } else {
        println!("Daemon: not reachable");
        Ok(1)
    }
}

fn status(ctx: &Context) -> Result<i32> {
    let store = ctx.store()?;
    match read_pid(ctx) {
        Some(pid) if pid_alive(pid) => println!("Daemon: running (pid {pid})"),
        Some(pid) => println!("Daemon: dead (stale pid {pid})"),
        None => println!("Daemon: not running"),
    }
    let port = store.kv_get_i64(KV_DAEMON_PORT)?;
    if port > 0 {
        println!("Trigger port: {port}");
    }
    match store.kv_get(crate::relay::KV_STATUS)?.as_deref() {
        Some(status) => println!("Relay: {status}"),
        None => println!("Relay: idle"),
    }
    Ok(0)
}
