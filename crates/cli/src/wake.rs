// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP wake mesh: loopback pings that break blocking waits.
//!
//! The wake carries no payload and no ordering — it is a liveness hint.
//! Listeners must re-run delivery against their cursor after waking; a
//! bounded poll timeout guarantees eventual delivery when pings are lost.
//! Senders prune endpoint rows whose port refuses the connection.

use std::io::Write as _;
use std::net::TcpStream;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::store::Store;

/// Connect timeout for one ping.
pub const PING_TIMEOUT: Duration = Duration::from_millis(50);

/// Why a [`NotifyServer::wait`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// A connection arrived — new events are likely.
    Woken,
    /// The per-call timeout lapsed — poll anyway.
    Timeout,
    /// The cancel token fired.
    Cancelled,
}

/// Loopback listener registered as a wake endpoint.
pub struct NotifyServer {
    listener: TcpListener,
    port: u16,
}

impl NotifyServer {
    /// Bind an ephemeral loopback port.
    pub async fn bind() -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        Ok(Self { listener, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Block until a wake, the timeout, or cancellation.
    ///
    /// Any accepted connection counts as a wake; its bytes are ignored
    /// and the socket is dropped immediately.
    pub async fn wait(&self, timeout: Duration, cancel: &CancellationToken) -> WakeReason {
        tokio::select! {
            accepted = self.listener.accept() => {
                if let Ok((stream, _)) = accepted {
                    drop(stream);
                }
                WakeReason::Woken
            }
            () = tokio::time::sleep(timeout) => WakeReason::Timeout,
            () = cancel.cancelled() => WakeReason::Cancelled,
        }
    }
}

/// RAII registration of `(instance, port)` in the store.
///
/// Dropping removes the endpoint row on every exit path; a listener that
/// dies without dropping is pruned lazily by the next sender.
pub struct NotifyRegistration<'a> {
    store: &'a Store,
    instance: String,
    port: u16,
}

impl<'a> NotifyRegistration<'a> {
    pub fn register(store: &'a Store, instance: &str, port: u16) -> Result<Self> {
        store.register_notify_port(instance, port)?;
        Ok(Self { store, instance: instance.to_owned(), port })
    }
}

impl Drop for NotifyRegistration<'_> {
    fn drop(&mut self) {
        let _ = self.store.delete_notify_endpoint(&self.instance, Some(self.port));
    }
}

fn ping(port: u16) -> bool {
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    match TcpStream::connect_timeout(&addr, PING_TIMEOUT) {
        Ok(mut stream) => {
            let _ = stream.write_all(b"\n");
            true
        }
        Err(_) => false,
    }
}

fn dedup_ports(ports: Vec<u16>) -> Vec<u16> {
    let mut seen = std::collections::HashSet::new();
    ports.into_iter().filter(|p| *p > 0 && seen.insert(*p)).collect()
}

/// Wake every listener of one instance. Dead ports are pruned.
pub fn notify_instance(store: &Store, instance: &str) {
    let Ok(ports) = store.list_notify_ports(instance) else {
        return;
    };
    for port in dedup_ports(ports) {
        if !ping(port) {
            debug!(instance, port, "pruning dead notify endpoint");
            let _ = store.delete_notify_endpoint(instance, Some(port));
        }
    }
}

/// Wake every registered listener. Best effort; dead ports are pruned.
pub fn notify_all(store: &Store) {
    let Ok(endpoints) = store.all_notify_endpoints() else {
        return;
    };
    let mut seen = std::collections::HashSet::new();
    for (instance, port) in endpoints {
        if port == 0 || !seen.insert((instance.clone(), port)) {
            continue;
        }
        if !ping(port) {
            let _ = store.delete_notify_endpoint(&instance, Some(port));
        }
    }
}

/// Wake specific ports with no store lookup and no pruning. Used after an
/// endpoint row was already deleted (stop path).
pub fn notify_ports(ports: &[u16]) {
    for port in dedup_ports(ports.to_vec()) {
        let _ = ping(port);
    }
}

#[cfg(test)]
#[path = "wake_tests.rs"]
mod tests;
