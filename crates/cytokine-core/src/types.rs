//! Shared types used across the coordination runtime.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of a message exchanged between cells.
///
/// The two lifecycle kinds the coordinator emits are closed variants so
/// the compiler checks them; everything else is an open, consumer-defined
/// tag. `From<String>` normalizes the lifecycle tags, so `Custom` never
/// holds `"system_start"` or `"system_stop"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageKind {
    /// Broadcast by the coordinator once the system is up.
    SystemStart,
    /// Broadcast by the coordinator before shutdown.
    SystemStop,
    /// Consumer-defined message kind (e.g. `"scan_result"`).
    Custom(String),
}

impl MessageKind {
    /// The string tag this kind serializes to.
    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::SystemStart => "system_start",
            MessageKind::SystemStop => "system_stop",
            MessageKind::Custom(tag) => tag,
        }
    }

    /// Whether this kind names an alert (`alert_` prefix).
    pub fn is_alert(&self) -> bool {
        self.as_str().starts_with("alert_")
    }
}

impl From<String> for MessageKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "system_start" => MessageKind::SystemStart,
            "system_stop" => MessageKind::SystemStop,
            _ => MessageKind::Custom(tag),
        }
    }
}

impl From<&str> for MessageKind {
    fn from(tag: &str) -> Self {
        Self::from(tag.to_string())
    }
}

impl From<MessageKind> for String {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Custom(tag) => tag,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Addressing mode of a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Target {
    /// Every registered cell except the sender.
    Broadcast,
    /// Every cell of the given type, except the sender.
    Type(String),
    /// A single cell, by name.
    Cell(String),
}

impl From<String> for Target {
    fn from(raw: String) -> Self {
        if raw == "broadcast" {
            Target::Broadcast
        } else if let Some(cell_type) = raw.strip_prefix("type:") {
            Target::Type(cell_type.to_string())
        } else {
            Target::Cell(raw)
        }
    }
}

impl From<&str> for Target {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

impl From<Target> for String {
    fn from(target: Target) -> Self {
        match target {
            Target::Broadcast => "broadcast".to_string(),
            Target::Type(cell_type) => format!("type:{}", cell_type),
            Target::Cell(name) => name,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Broadcast => f.write_str("broadcast"),
            Target::Type(cell_type) => write!(f, "type:{}", cell_type),
            Target::Cell(name) => f.write_str(name),
        }
    }
}

/// Lifecycle state of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellStatus {
    Initialized,
    Active,
    Stopping,
    Stopped,
}

/// Point-in-time copy of a cell's activity counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellStats {
    pub messages_received: u64,
    pub messages_sent: u64,
    pub actions_performed: u64,
    pub last_activity: DateTime<Utc>,
}

/// A serializable snapshot of a cell's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub name: String,
    #[serde(rename = "type")]
    pub cell_type: String,
    pub status: CellStatus,
    pub active: bool,
    pub stats: CellStats,
    pub last_update: DateTime<Utc>,
}
