// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MQTT client construction shared by the daemon loop and one-shot CLI
//! publishes (control actions, clearing retained state on opt-out).
//!
//! For `mqtts://` brokers the TLS layer skips certificate verification:
//! the public-broker fleet rotates certs freely and the trust anchor of
//! the relay is the secrecy of the relay id, not the broker identity.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, Transport};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};

use crate::config::HuddleConfig;
use crate::error::CliError;

pub const KEEPALIVE: Duration = Duration::from_secs(30);
/// One-shot publishes wait at most this long for their ack.
pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);
const QUEUE_CAPACITY: usize = 10;

/// Parsed broker URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerTarget {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

/// Parse `mqtt://host:port` / `mqtts://host:port` (port optional).
pub fn parse_broker_url(url: &str) -> Result<BrokerTarget, CliError> {
    let (tls, rest) = if let Some(rest) = url.strip_prefix("mqtts://") {
        (true, rest)
    } else if let Some(rest) = url.strip_prefix("mqtt://") {
        (false, rest)
    } else {
        return Err(CliError::Input(format!(
            "broker URL must be mqtt:// or mqtts://: {url}"
        )));
    };

    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .map_err(|_| CliError::Input(format!("bad broker port in {url}")))?;
            (host, port)
        }
        None => (rest, if tls { 8883 } else { 1883 }),
    };
    if host.is_empty() {
        return Err(CliError::Input(format!("empty broker host in {url}")));
    }
    Ok(BrokerTarget { host: host.to_owned(), port, tls })
}

/// Accept-any certificate verifier (see module docs).
#[derive(Debug)]
struct NoVerifier;

impl ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}

/// Build `MqttOptions` for this config's broker. `client_id_suffix`
/// distinguishes the daemon from one-shot CLI clients.
pub fn mqtt_options(config: &HuddleConfig, client_id_suffix: &str) -> Result<MqttOptions> {
    let Some(ref url) = config.relay else {
        bail!(CliError::Input("no relay broker configured".into()));
    };
    let target = parse_broker_url(url).map_err(anyhow::Error::from)?;

    let client_id = format!("huddle-{}-{}", client_id_suffix, std::process::id());
    let mut opts = MqttOptions::new(client_id, target.host, target.port);
    opts.set_keep_alive(KEEPALIVE);
    if let Some(ref token) = config.relay_token {
        opts.set_credentials("huddle", token.clone());
    }
    if target.tls {
        // Pin the ring provider; dependency features may enable more than
        // one and an ambiguous process default makes the builder unusable.
        let _ = rustls::crypto::ring::default_provider().install_default();
        let tls = ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerifier))
            .with_no_client_auth();
        opts.set_transport(Transport::tls_with_config(rumqttc::TlsConfiguration::Rustls(
            Arc::new(tls),
        )));
    }
    Ok(opts)
}

/// One-shot publish: connect, publish QoS 1, wait for the ack, disconnect.
pub async fn publish_once(
    config: &HuddleConfig,
    topic: &str,
    payload: Vec<u8>,
    retain: bool,
) -> Result<()> {
    let opts = mqtt_options(config, "oneshot")?;
    let (client, mut eventloop) = AsyncClient::new(opts, QUEUE_CAPACITY);

    client
        .publish(topic, QoS::AtLeastOnce, retain, payload)
        .await
        .context("queue publish")?;

    let acked = tokio::time::timeout(PUBLISH_TIMEOUT, async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::PubAck(_))) => return Ok(()),
                Ok(_) => continue,
                Err(e) => return Err(anyhow::Error::from(e)),
            }
        }
    })
    .await;

    // Always try to part cleanly, even after a timeout.
    let _ = client.disconnect().await;

    match acked {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.context("publish failed")),
        Err(_) => bail!("publish not acknowledged within {}s", PUBLISH_TIMEOUT.as_secs()),
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
