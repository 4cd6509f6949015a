// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `huddle relay` — cross-device sync management.
//!
//! `new` creates a group (generates the relay id, pins the fastest
//! reachable broker), `connect` joins one from a token, `off` disables
//! sync and clears this device's retained state so remotes forget it.

use anyhow::Result;
use clap::{Args, Subcommand};
use uuid::Uuid;

use crate::config::HuddleConfig;
use crate::context::Context;
use crate::error::CliError;
use crate::relay::brokers::{broker_url, is_public, ping_broker, probe_all};
use crate::relay::client::{parse_broker_url, publish_once};
use crate::relay::daemon_link::is_relay_handled_by_daemon;
use crate::relay::device::device_identity;
use crate::relay::token::{decode_join_token, encode_join_token, looks_like_token};
use crate::relay::{
    device_topic, get_remote_devices, KV_LAST_ERROR, KV_LAST_PUSH, KV_LAST_PUSH_ID, KV_STATUS,
};
use crate::store::EventQuery;

use super::list::format_age;

#[derive(Debug, Clone, Default, Args)]
pub struct RelayArgs {
    #[command(subcommand)]
    pub cmd: Option<RelayCmd>,
    /// A join token passed directly: `huddle relay <token>`.
    pub token: Option<String>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum RelayCmd {
    /// Show relay status and ping the broker.
    Status,
    /// Create a new relay group.
    New(BrokerFlags),
    /// Join a group with a token, or re-enable the existing config.
    Connect(ConnectArgs),
    /// Disable relay sync and clear remote-visible state.
    Off,
    /// Re-enable relay sync (alias for `connect` with no token).
    On,
}

#[derive(Debug, Clone, Default, Args)]
pub struct BrokerFlags {
    /// Private broker URL (`mqtts://host:port`).
    #[arg(long)]
    pub broker: Option<String>,
    /// Broker password for private brokers.
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ConnectArgs {
    /// Join token from `huddle relay new` on another device.
    pub token: Option<String>,
    #[command(flatten)]
    pub broker: BrokerFlags,
}

pub async fn run(ctx: &mut Context, args: &RelayArgs) -> Result<i32> {
    match (&args.cmd, &args.token) {
        (Some(RelayCmd::Status), _) | (None, None) => status(ctx),
        (Some(RelayCmd::New(flags)), _) => new_group(ctx, flags),
        (Some(RelayCmd::Connect(connect)), _) => connect_group(ctx, connect),
        (Some(RelayCmd::Off), _) => toggle(ctx, false).await,
        (Some(RelayCmd::On), _) => toggle(ctx, true).await,
        (None, Some(token)) if looks_like_token(token) => {
            let connect =
                ConnectArgs { token: Some(token.clone()), broker: BrokerFlags::default() };
            connect_group(ctx, &connect)
        }
        (None, Some(other)) => {
            Err(CliError::Input(format!("unknown relay subcommand: {other}")).into())
        }
    }
}

fn save_and_reload(ctx: &mut Context, config: HuddleConfig) -> Result<()> {
    config.save(&ctx.dirs.config_path())?;
    ctx.reload_config()
}

fn daemon_hint(ctx: &Context) -> Result<()> {
    let store = ctx.store()?;
    if is_relay_handled_by_daemon(&store)? {
        println!("\nConnected.");
    } else {
        println!("\nStart daemon to connect: huddle daemon start");
    }
    Ok(())
}

fn status(ctx: &Context) -> Result<i32> {
    let config = &ctx.config;
    let Some(ref relay_id) = config.relay_id else {
        println!("Relay: not configured");
        println!("Run: huddle relay new");
        return Ok(0);
    };
    if !config.relay_enabled {
        println!("Relay: disabled");
        println!("\nRun: huddle relay connect");
        return Ok(0);
    }

    let store = ctx.store()?;
    match store.kv_get(KV_STATUS)?.as_deref() {
        Some("ok") => println!("Status: connected"),
        Some("error") => {
            let detail = store.kv_get(KV_LAST_ERROR)?.unwrap_or_else(|| "unknown".into());
            println!("Status: error — {detail}");
            let auth_hint = detail.contains("password")
                || detail.contains("auth")
                || detail.contains("not authorized");
            if auth_hint
                && config.relay.as_deref().map(|u| !is_public(u)).unwrap_or(false)
                && config.relay_token.is_none()
            {
                println!("  Hint: use --password when connecting to private brokers");
            }
        }
        _ => println!("Status: waiting (daemon may not be running)"),
    }

    if let Some(ref url) = config.relay {
        match parse_broker_url(url).ok().and_then(|t| ping_broker(&t.host, t.port)) {
            Some(ms) => println!("Broker: {url} ({ms}ms)"),
            None => println!("Broker: {url} (unreachable)"),
        }
    }
    let identity = device_identity(&ctx.dirs)?;
    println!("Device ID: {}", identity.short);

    let last_push_id = store.kv_get_i64(KV_LAST_PUSH_ID)?;
    let queued = store
        .query_events(&EventQuery { after_id: last_push_id, local_only: true, ..Default::default() })?
        .len();
    if queued > 0 {
        println!("Queued: {queued} events pending");
    } else {
        println!("Queued: up to date");
    }

    let last_push = store.kv_get_i64(KV_LAST_PUSH)?;
    if last_push > 0 {
        println!("Last push: {} ago", format_age(crate::event::epoch_now() - last_push));
    } else {
        println!("Last push: never");
    }

    let remotes = get_remote_devices(&store)?;
    if remotes.is_empty() {
        println!("\nNo other devices");
    } else {
        let parts: Vec<String> = remotes
            .iter()
            .map(|d| {
                if d.sync_time > 0 {
                    format!(
                        "{} ({} ago)",
                        d.short,
                        format_age(crate::event::epoch_now() - d.sync_time)
                    )
                } else {
                    d.short.clone()
                }
            })
            .collect();
        println!("\nRemote devices: {}", parts.join(", "));
    }

    if let Some(ref url) = config.relay {
        if let Some(token) = encode_join_token(relay_id, url) {
            println!("\nAdd devices: huddle relay connect {token}");
        }
    }
    Ok(0)
}

fn new_group(ctx: &mut Context, flags: &BrokerFlags) -> Result<i32> {
    // Show the previous group first so it can be copied before overwrite.
    if let (Some(id), Some(url)) = (&ctx.config.relay_id, &ctx.config.relay) {
        if let Some(old) = encode_join_token(id, url) {
            println!("Current group: huddle relay connect {old}\n");
        }
    }

    let relay_id = Uuid::new_v4().to_string();

    let pinned = match &flags.broker {
        Some(url) => {
            let target = parse_broker_url(url)?;
            println!("Testing {}:{}...", target.host, target.port);
            match ping_broker(&target.host, target.port) {
                Some(ms) => println!("  {}:{} — {ms}ms", target.host, target.port),
                None => {
                    eprintln!("  {}:{} — failed", target.host, target.port);
                    eprintln!("\nBroker unreachable. Check host, port, and network.");
                    return Ok(1);
                }
            }
            url.clone()
        }
        None => {
            println!("Testing brokers...");
            let mut pinned = None;
            for (host, port, ping) in probe_all() {
                match ping {
                    Some(ms) => {
                        println!("  {host}:{port} — {ms}ms");
                        if pinned.is_none() {
                            pinned = Some(broker_url(host, port));
                        }
                    }
                    None => println!("  {host}:{port} — failed"),
                }
            }
            let Some(pinned) = pinned else {
                eprintln!("\nNo broker reachable. Check your network.");
                eprintln!("Or use a private broker: huddle relay new --broker mqtts://host:port");
                return Ok(1);
            };
            pinned
        }
    };

    let mut config = ctx.config.clone();
    config.relay_id = Some(relay_id.clone());
    config.relay = Some(pinned.clone());
    config.relay_enabled = true;
    if flags.password.is_some() {
        config.relay_token = flags.password.clone();
    }
    save_and_reload(ctx, config)?;

    println!("\nBroker: {pinned}");
    if flags.password.is_some() {
        println!("Password: set");
    }
    if let Some(token) = encode_join_token(&relay_id, &pinned) {
        println!("\nOn other devices: huddle relay connect {token}");
        if flags.password.is_some() {
            println!("  (they will also need: --password <secret>)");
        }
    }
    daemon_hint(ctx)?;
    Ok(0)
}

fn connect_group(ctx: &mut Context, args: &ConnectArgs) -> Result<i32> {
    let Some(ref token) = args.token else {
        // Re-enable mode.
        if ctx.config.relay_id.is_none() {
            eprintln!("No relay configured.");
            eprintln!("Run: huddle relay new");
            return Ok(1);
        }
        if ctx.config.relay_enabled {
            println!("Relay already enabled.\n");
            return status(ctx);
        }
        let mut config = ctx.config.clone();
        config.relay_enabled = true;
        save_and_reload(ctx, config)?;
        println!("Relay enabled\n");
        return status(ctx);
    };

    let Some((relay_id, token_broker)) = decode_join_token(token) else {
        eprintln!("Invalid token.");
        return Ok(1);
    };
    let effective = args.broker.broker.clone().unwrap_or(token_broker);

    // Show the previous group first when switching.
    if let (Some(id), Some(url)) = (&ctx.config.relay_id, &ctx.config.relay) {
        if id != &relay_id {
            if let Some(old) = encode_join_token(id, url) {
                println!("Current group: huddle relay connect {old}\n");
            }
        }
    }

    let ping = parse_broker_url(&effective)
        .ok()
        .and_then(|t| ping_broker(&t.host, t.port));

    let mut config = ctx.config.clone();
    config.relay_id = Some(relay_id);
    config.relay = Some(effective.clone());
    config.relay_enabled = true;
    if args.broker.password.is_some() {
        config.relay_token = args.broker.password.clone();
    }
    save_and_reload(ctx, config)?;

    match ping {
        Some(ms) => println!("Broker: {effective} ({ms}ms)"),
        None => {
            println!("Broker: {effective}");
            eprintln!("  Warning: broker unreachable — check network or token");
        }
    }
    if args.broker.password.is_some() {
        println!("Password: set");
    } else if !is_public(&effective) {
        println!("Password: not set (use --password if broker requires auth)");
    }
    daemon_hint(ctx)?;
    Ok(0)
}

/// Publish an empty retained payload so remote devices drop this device's
/// instances, then flip the enabled flag. A failed publish is reported
/// but the local disable still takes effect.
pub async fn clear_retained_state(ctx: &Context) -> Result<bool> {
    let Some(ref relay_id) = ctx.config.relay_id else {
        return Ok(false);
    };
    let identity = device_identity(&ctx.dirs)?;
    let topic = device_topic(relay_id, &identity.uuid);
    Ok(publish_once(&ctx.config, &topic, Vec::new(), true).await.is_ok())
}

async fn toggle(ctx: &mut Context, enable: bool) -> Result<i32> {
    if ctx.config.relay_id.is_none() {
        eprintln!("No relay configured.");
        eprintln!("Run: huddle relay new");
        return Ok(1);
    }

    if !enable && ctx.config.relay_enabled {
        if clear_retained_state(ctx).await? {
            println!("Cleared remote state");
        } else {
            eprintln!("Could not clear remote state (disabled locally anyway)");
        }
    }

    let mut config = ctx.config.clone();
    config.relay_enabled = enable;
    save_and_reload(ctx, config)?;

    if enable {
        println!("Relay enabled\n");
        return status(ctx);
    }
    println!("Relay: disabled");
    println!("\nRun 'huddle relay connect' to reconnect");
    Ok(0)
}
