// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::serve;

#[tokio::test]
async fn connections_become_push_triggers() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let (push_tx, mut push_rx) = mpsc::channel(1);
    let cancel = CancellationToken::new();

    let server = tokio::spawn(serve(listener, push_tx, cancel.clone()));

    let stream = TcpStream::connect(("127.0.0.1", port)).await?;
    drop(stream);

    tokio::time::timeout(Duration::from_secs(2), push_rx.recv())
        .await
        .map_err(|_| anyhow::anyhow!("no trigger arrived"))?;

    cancel.cancel();
    server.await?;
    Ok(())
}

#[tokio::test]
async fn burst_of_pings_coalesces() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let (push_tx, mut push_rx) = mpsc::channel(1);
    let cancel = CancellationToken::new();
    let server = tokio::spawn(serve(listener, push_tx, cancel.clone()));

    for _ in 0..5 {
        let stream = TcpStream::connect(("127.0.0.1", port)).await?;
        drop(stream);
    }
    // Give the accept loop time to drain the burst.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut triggers = 0;
    while push_rx.try_recv().is_ok() {
        triggers += 1;
    }
    assert!(triggers >= 1, "at least one trigger");
    assert!(triggers <= 5, "bounded by the burst");

    cancel.cancel();
    server.await?;
    Ok(())
}
