// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event model: the append-only log's row types and their JSON payloads.
//!
//! Payloads are free-form JSON on the wire (cross-device compatibility)
//! but decode into tagged variants keyed on the event type. Unknown fields
//! are preserved in a flatten map so a newer device's payloads survive a
//! round trip through an older one.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CliError;

/// Reserved pseudo-instance prefix for events not owned by a participant.
pub const SYSTEM_PREFIX: char = '_';

/// Event type tag, stored as a TEXT column next to the JSON payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Message,
    Life,
    Tool,
    Bundle,
    Control,
    Status,
    File,
    Subscription,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Life => "life",
            Self::Tool => "tool",
            Self::Bundle => "bundle",
            Self::Control => "control",
            Self::Status => "status",
            Self::File => "file",
            Self::Subscription => "subscription",
        }
    }
}

impl FromStr for EventType {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message" => Ok(Self::Message),
            "life" => Ok(Self::Life),
            "tool" => Ok(Self::Tool),
            "bundle" => Ok(Self::Bundle),
            "control" => Ok(Self::Control),
            "status" => Ok(Self::Status),
            "file" => Ok(Self::File),
            "subscription" => Ok(Self::Subscription),
            other => Err(CliError::Input(format!("unknown event type: {other}"))),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message envelope intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Request,
    Inform,
    Ack,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Inform => "inform",
            Self::Ack => "ack",
        }
    }
}

impl FromStr for Intent {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "request" => Ok(Self::Request),
            "inform" => Ok(Self::Inform),
            "ack" => Ok(Self::Ack),
            other => Err(CliError::Input(format!(
                "invalid intent '{other}' (request|inform|ack)"
            ))),
        }
    }
}

/// One row of the event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub ts: String,
    #[serde(rename = "type")]
    pub kind: EventType,
    pub instance: String,
    pub data: Value,
}

impl Event {
    /// Decode the payload into its typed variant.
    pub fn decode(&self) -> anyhow::Result<EventData> {
        EventData::from_value(self.kind, &self.data)
    }

    /// Decode only if this is a message event.
    pub fn message(&self) -> Option<MessageData> {
        if self.kind != EventType::Message {
            return None;
        }
        serde_json::from_value(self.data.clone()).ok()
    }

    /// Epoch seconds parsed from the ISO timestamp, or 0 when unparseable.
    pub fn epoch_secs(&self) -> i64 {
        parse_iso(&self.ts).unwrap_or(0)
    }
}

/// Provenance annotation added to relay-imported events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayMark {
    pub device: String,
    pub short: String,
    pub id: i64,
}

/// Inline attachment carried with a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub base64: String,
}

/// Payload of a `message` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageData {
    pub text: String,
    pub from: String,
    #[serde(default)]
    pub mentions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_local: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delivered_to: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    #[serde(rename = "_relay", default, skip_serializing_if = "Option::is_none")]
    pub relay: Option<RelayMark>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Payload of a `life` event (`started`, `stopped`, `reset`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifeData {
    pub action: String,
    /// Full instance row captured at stop time; resume source of truth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Payload of a `tool` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolData {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Payload of a `control` event (cross-device actions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlData {
    pub action: String,
    pub target: String,
    pub target_device: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub from_device: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Payload of a `status` event (observable transitions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusData {
    pub from: String,
    pub to: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Payload of a `file` event (path touched by a tool).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileData {
    pub path: String,
    pub op: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Payload of a `subscription` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionData {
    pub filter: crate::subs::SubFilter,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Typed view over an event payload, keyed on the row's type tag.
#[derive(Debug, Clone)]
pub enum EventData {
    Message(MessageData),
    Life(LifeData),
    Tool(ToolData),
    Bundle(Value),
    Control(ControlData),
    Status(StatusData),
    File(FileData),
    Subscription(SubscriptionData),
}

impl EventData {
    pub fn from_value(kind: EventType, data: &Value) -> anyhow::Result<Self> {
        Ok(match kind {
            EventType::Message => Self::Message(serde_json::from_value(data.clone())?),
            EventType::Life => Self::Life(serde_json::from_value(data.clone())?),
            EventType::Tool => Self::Tool(serde_json::from_value(data.clone())?),
            EventType::Bundle => Self::Bundle(data.clone()),
            EventType::Control => Self::Control(serde_json::from_value(data.clone())?),
            EventType::Status => Self::Status(serde_json::from_value(data.clone())?),
            EventType::File => Self::File(serde_json::from_value(data.clone())?),
            EventType::Subscription => Self::Subscription(serde_json::from_value(data.clone())?),
        })
    }
}

/// Current UTC time as ISO-8601 with millisecond precision.
pub fn iso_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an ISO-8601 timestamp to epoch seconds.
pub fn parse_iso(ts: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.timestamp())
}

/// Current epoch seconds.
pub fn epoch_now() -> i64 {
    Utc::now().timestamp()
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
