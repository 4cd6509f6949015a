// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The daemon's TCP trigger listener.
//!
//! CLI processes ping this loopback port after logging events so the
//! daemon pushes immediately instead of waiting for its periodic poll.
//! Any connection is a trigger; payload is ignored.

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Accept loop. Each connection becomes one (coalesced) push trigger.
pub async fn serve(
    listener: TcpListener,
    push_tx: mpsc::Sender<()>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        drop(stream);
                        // Full channel means a push is already pending.
                        let _ = push_tx.try_send(());
                    }
                    Err(e) => {
                        debug!("trigger accept failed: {e}");
                    }
                }
            }
            () = cancel.cancelled() => break,
        }
    }
    debug!("trigger listener shutting down");
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
