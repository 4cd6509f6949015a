// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wake-mesh properties: the wake is a liveness hint only, and stale
//! endpoints are pruned by the first sender that hits them.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use huddle::command::send::{send_message, SendArgs};
use huddle::deliver::deliver;
use huddle::wake::{notify_instance, NotifyServer, WakeReason};
use huddle_specs::{seed_instance, Workspace};

#[test]
fn delivery_works_without_any_pings() -> anyhow::Result<()> {
    let ws = Workspace::new()?;
    let store = ws.store()?;
    seed_instance(&store, "alpha")?;
    seed_instance(&store, "bravo")?;

    // No notify endpoint registered at all: the sender pings nobody.
    send_message(&store, "alpha", &SendArgs { text: "@bravo poll me".into(), ..Default::default() })?;

    // A plain poll still sees the message: wake is not a delivery path.
    let delivery = deliver(&store, "bravo", true)?;
    assert_eq!(delivery.messages.len(), 1);
    Ok(())
}

#[tokio::test]
async fn send_wakes_a_listening_recipient() -> anyhow::Result<()> {
    let ws = Workspace::new()?;
    let store = ws.store()?;
    seed_instance(&store, "alpha")?;
    seed_instance(&store, "bravo")?;

    let server = NotifyServer::bind().await?;
    store.register_notify_port("bravo", server.port())?;

    let waiter =
        tokio::spawn(
            async move { server.wait(Duration::from_secs(5), &CancellationToken::new()).await },
        );
    tokio::time::sleep(Duration::from_millis(20)).await;

    send_message(&store, "alpha", &SendArgs { text: "@bravo wake up".into(), ..Default::default() })?;

    assert_eq!(waiter.await?, WakeReason::Woken);
    assert_eq!(deliver(&store, "bravo", true)?.messages.len(), 1);
    Ok(())
}

#[tokio::test]
async fn stale_endpoint_is_pruned_by_next_sender() -> anyhow::Result<()> {
    let ws = Workspace::new()?;
    let store = ws.store()?;
    seed_instance(&store, "bravo")?;

    let dead_port = {
        let server = NotifyServer::bind().await?;
        server.port()
        // Listener dropped here without unregistering.
    };
    store.register_notify_port("bravo", dead_port)?;
    assert_eq!(store.list_notify_ports("bravo")?.len(), 1);

    notify_instance(&store, "bravo");
    assert!(store.list_notify_ports("bravo")?.is_empty());
    Ok(())
}
