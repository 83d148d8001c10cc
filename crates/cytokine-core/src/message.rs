//! Message — the unit of inter-cell communication.
//!
//! Modeled on intercellular signaling: a cell emits a message onto the
//! coordinator's bus, and the dispatcher delivers it to every recipient
//! the target resolves to. Messages are values; once constructed, the
//! bus and dispatcher never mutate them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{MessageKind, Target};

/// Lowest accepted message priority.
pub const PRIORITY_MIN: u8 = 1;
/// Highest accepted message priority (most urgent).
pub const PRIORITY_MAX: u8 = 5;

/// Source name stamped on coordinator-generated lifecycle messages.
pub const CORE_SOURCE: &str = "core";

/// One immutable unit of inter-cell communication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Derived from the source name and the creation timestamp. Two
    /// messages created by the same source within the same microsecond
    /// can collide; the runtime never relies on id uniqueness.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub source: String,
    pub target: Target,
    /// Clamped to `[PRIORITY_MIN, PRIORITY_MAX]` at construction.
    pub priority: u8,
    pub timestamp: DateTime<Utc>,
    /// Opaque structured data, consumer-defined.
    pub payload: Value,
}

impl Message {
    /// Build a message stamped with the current time.
    ///
    /// Construction always succeeds: a priority outside `[1, 5]` is
    /// silently clamped, not rejected.
    pub fn new(
        kind: impl Into<MessageKind>,
        source: impl Into<String>,
        target: Target,
        payload: Value,
        priority: i32,
    ) -> Self {
        Self::with_timestamp(kind, source, target, payload, priority, Utc::now())
    }

    /// Build a message with an explicit creation timestamp.
    pub fn with_timestamp(
        kind: impl Into<MessageKind>,
        source: impl Into<String>,
        target: Target,
        payload: Value,
        priority: i32,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let source = source.into();
        let priority = priority.clamp(PRIORITY_MIN as i32, PRIORITY_MAX as i32) as u8;
        let id = format!("{}_{}", source, timestamp.format("%Y%m%d%H%M%S%6f"));
        Self {
            id,
            kind: kind.into(),
            source,
            target,
            priority,
            timestamp,
            payload,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Message[{}] {} -> {} (priority {})",
            self.kind, self.source, self.target, self.priority
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn priority_above_range_clamps_to_max() {
        let msg = Message::new("ping", "m1", Target::Broadcast, Value::Null, 9);
        assert_eq!(msg.priority, 5);
    }

    #[test]
    fn priority_below_range_clamps_to_min() {
        let msg = Message::new("ping", "m1", Target::Broadcast, Value::Null, -4);
        assert_eq!(msg.priority, 1);
    }

    #[test]
    fn in_range_priority_is_kept() {
        for p in 1..=5 {
            let msg = Message::new("ping", "m1", Target::Broadcast, Value::Null, p);
            assert_eq!(msg.priority as i32, p);
        }
    }

    #[test]
    fn id_derives_from_source_and_timestamp() {
        let msg = Message::new("ping", "m1", Target::Broadcast, Value::Null, 3);
        assert!(msg.id.starts_with("m1_"));
        // source prefix + `_` + 14-digit datetime + 6-digit fraction
        assert_eq!(msg.id.len(), "m1_".len() + 20);
    }

    #[test]
    fn serde_round_trip_preserves_all_fields() {
        let msg = Message::new(
            "alert_threat_detected",
            "nk_1",
            Target::Type("macrophage".to_string()),
            json!({"hash": "ab12", "severity": 4}),
            5,
        );

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], json!("alert_threat_detected"));
        assert_eq!(value["source"], json!("nk_1"));
        assert_eq!(value["target"], json!("type:macrophage"));
        assert_eq!(value["priority"], json!(5));
        // chrono serializes as ISO-8601 / RFC 3339
        let raw_ts = value["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(raw_ts).is_ok());

        let back: Message = serde_json::from_value(value).unwrap();
        assert_eq!(back.id, msg.id);
        assert_eq!(back.kind, msg.kind);
        assert_eq!(back.source, msg.source);
        assert_eq!(back.target, msg.target);
        assert_eq!(back.priority, msg.priority);
        assert_eq!(back.timestamp, msg.timestamp);
        assert_eq!(back.payload, msg.payload);
    }

    #[test]
    fn display_is_human_readable() {
        let msg = Message::new("ping", "m1", Target::Cell("b1".to_string()), Value::Null, 2);
        assert_eq!(msg.to_string(), "Message[ping] m1 -> b1 (priority 2)");
    }
}
