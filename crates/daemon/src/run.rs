// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The daemon proper: owns the MQTT connection, imports inbound relay
//! messages, and pushes this device's state whenever the push cursor is
//! behind (triggered by TCP pings or the periodic poll).
//!
//! Subscriptions are re-established on every (re)connection — brokers
//! drop them for clean sessions, and a client that stays connected but
//! never re-subscribes silently receives nothing.

use std::time::Duration;

use anyhow::{Context as _, Result};
use rumqttc::{AsyncClient, Event, LastWill, Packet, QoS};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use huddle::context::Context;
use huddle::relay::client::mqtt_options;
use huddle::relay::device::{device_identity, DeviceIdentity};
use huddle::relay::payload::{build_push, mark_pushed};
use huddle::relay::{
    self, device_topic, import, record_error, record_ok, split_topic, subscription_topic,
};
use huddle::store::Store;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const PUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Run the daemon until `cancel` fires.
pub async fn run(ctx: Context, cancel: CancellationToken) -> Result<()> {
    let Some(relay_id) = ctx.config.relay_id.clone() else {
        anyhow::bail!("no relay configured (run: huddle relay new)");
    };
    if !ctx.config.relay_active() {
        anyhow::bail!("relay is disabled (run: huddle relay connect)");
    }

    let store = ctx.store()?;
    let identity = device_identity(&ctx.dirs)?;
    info!(device = %identity.short, relay = %relay_id, "huddled starting");

    // Pid file + trigger port so CLI processes can find us.
    std::fs::write(ctx.dirs.daemon_pid_path(), std::process::id().to_string())
        .context("write pid file")?;
    let trigger_listener = TcpListener::bind(("127.0.0.1", 0)).await?;
    let trigger_port = trigger_listener.local_addr()?.port();
    store.kv_set(relay::KV_DAEMON_PORT, Some(&trigger_port.to_string()))?;
    store.kv_set(relay::KV_DAEMON_FAILS, None)?;

    let (push_tx, push_rx) = mpsc::channel(1);
    let trigger_task =
        tokio::spawn(crate::trigger::serve(trigger_listener, push_tx.clone(), cancel.clone()));

    // MQTT client with the device-gone LWT on our retained topic.
    let own_topic = device_topic(&relay_id, &identity.uuid);
    let mut opts = mqtt_options(&ctx.config, "daemon")?;
    opts.set_last_will(LastWill::new(own_topic.clone(), Vec::new(), QoS::AtLeastOnce, true));
    let (client, eventloop) = AsyncClient::new(opts, 10);

    let loop_store = ctx.store()?;
    let loop_task = tokio::spawn(event_loop(
        eventloop,
        client.clone(),
        loop_store,
        identity.clone(),
        relay_id.clone(),
        push_tx,
        cancel.clone(),
    ));

    push_loop(&store, &identity, &client, &own_topic, push_rx, &cancel).await;

    // Shutdown: tell the group we are gone, then clean local markers.
    // The shared event loop is already cancelled, so the device-gone
    // payload goes out through a one-shot client that waits for its ack.
    info!("huddled shutting down");
    if let Err(e) =
        huddle::relay::client::publish_once(&ctx.config, &own_topic, Vec::new(), true).await
    {
        warn!("device-gone publish failed: {e:#}");
    }
    let _ = client.disconnect().await;

    store.kv_set(relay::KV_DAEMON_PORT, None)?;
    let _ = std::fs::remove_file(ctx.dirs.daemon_pid_path());

    let _ = trigger_task.await;
    let _ = loop_task.await;
    Ok(())
}

/// Drive the MQTT event loop: subscribe on ConnAck, import publishes,
/// back off on errors. Exits on cancellation.
async fn event_loop(
    mut eventloop: rumqttc::EventLoop,
    client: AsyncClient,
    store: Store,
    identity: DeviceIdentity,
    relay_id: String,
    push_tx: mpsc::Sender<()>,
    cancel: CancellationToken,
) {
    loop {
        let polled = tokio::select! {
            polled = eventloop.poll() => polled,
            () = cancel.cancelled() => break,
        };
        match polled {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("broker connected");
                record_ok(&store);
                if let Err(e) =
                    client.subscribe(subscription_topic(&relay_id), QoS::AtLeastOnce).await
                {
                    warn!("subscribe failed: {e}");
                }
                // Catch up anything queued while we were away.
                let _ = push_tx.try_send(());
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let Some((prefix, suffix)) = split_topic(&publish.topic) else {
                    continue;
                };
                if prefix != relay_id {
                    continue;
                }
                match import::handle_message(&store, &identity, suffix, &publish.payload) {
                    Ok(outcome) => {
                        if outcome.events_imported > 0 || outcome.instances_upserted > 0 {
                            debug!(
                                suffix,
                                events = outcome.events_imported,
                                instances = outcome.instances_upserted,
                                "imported remote state"
                            );
                        }
                        record_ok(&store);
                    }
                    Err(e) => {
                        warn!("import failed for {suffix}: {e:#}");
                        record_error(&store, &format!("import: {e:#}"));
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!("mqtt error: {e} (reconnecting in {}s)", RECONNECT_DELAY.as_secs());
                record_error(&store, &e.to_string());
                tokio::select! {
                    () = tokio::time::sleep(RECONNECT_DELAY) => {}
                    () = cancel.cancelled() => break,
                }
            }
        }
    }
    debug!("mqtt event loop shutting down");
}

/// Publish state whenever triggered or on the periodic poll; drain
/// `has_more` with immediate re-pushes.
async fn push_loop(
    store: &Store,
    identity: &DeviceIdentity,
    client: &AsyncClient,
    own_topic: &str,
    mut push_rx: mpsc::Receiver<()>,
    cancel: &CancellationToken,
) {
    let mut interval = tokio::time::interval(PUSH_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = push_rx.recv() => {}
            _ = interval.tick() => {}
            () = cancel.cancelled() => break,
        }

        loop {
            let batch = match build_push(store, identity, false) {
                Ok(Some(batch)) => batch,
                Ok(None) => break,
                Err(e) => {
                    warn!("push build failed: {e:#}");
                    record_error(store, &format!("push: {e:#}"));
                    break;
                }
            };
            let payload = match serde_json::to_vec(&batch.payload) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("push encode failed: {e}");
                    break;
                }
            };
            if let Err(e) = client.publish(own_topic, QoS::AtLeastOnce, true, payload).await {
                warn!("push publish failed: {e}");
                record_error(store, &format!("publish: {e}"));
                break;
            }
            if let Err(e) = mark_pushed(store, &batch) {
                warn!("push bookkeeping failed: {e:#}");
                break;
            }
            debug!(max_id = batch.max_id, has_more = batch.has_more, "pushed state");
            if !batch.has_more {
                break;
            }
        }
    }
}
