//! Wire Protocol
//!
//! Frame types exchanged with the war-room backend over a single WebSocket.
//! Every frame is one JSON text message; the channel multiplexes unrelated
//! frame kinds, discriminated by two different keys depending on the family:
//!
//! # Inbound Frames
//!
//! ```text
//! +----------------------+---------------------------------------------------+
//! | Discriminator        | Frame                                             |
//! +----------------------+---------------------------------------------------+
//! | type = status_update | GPU telemetry snapshot (requires a gpu object)    |
//! | type = system_log    | Server-side log line                              |
//! | type = pong          | Heartbeat reply                                   |
//! | sender = agent       | Streamed response token, or completion marker     |
//! | sender = system      | Informational notice                              |
//! +----------------------+---------------------------------------------------+
//! ```
//!
//! Classification is by priority: the `type` family is checked before the
//! `sender` family, so a frame carrying both discriminators resolves to its
//! `type` meaning. Frames matching neither family are dropped by the caller
//! after logging; an unknown frame is never a protocol fault.
//!
//! # Outbound Frames
//!
//! ```text
//! {"type":"ping"}                                          heartbeat
//! {"text":"...","profile":"..."}                           user message
//! {"type":"mobile_activity","event":"...","timestamp":..}  activity report
//! ```
//!
//! The user message intentionally carries no `type` tag; the backend treats
//! any frame with a `text` field and no `type` as user input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Inbound Frames
// =============================================================================

/// GPU telemetry carried by a `status_update` frame
///
/// All fields default to zero when the backend omits them; unknown fields
/// are ignored so backend telemetry can grow without breaking clients.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuStatus {
    /// VRAM currently in use, in gigabytes
    pub vram_used_gb: f64,
    /// Total VRAM, in gigabytes
    pub vram_total_gb: f64,
    /// VRAM usage as a percentage
    pub vram_percent: f64,
    /// GPU core temperature in Celsius
    pub temperature_c: f64,
}

/// A classified inbound frame
///
/// Produced by [`classify`] from a parsed JSON value. Variants map one-to-one
/// onto the wire families documented at module level.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundFrame {
    /// GPU telemetry snapshot
    StatusUpdate {
        /// The telemetry payload
        gpu: GpuStatus,
    },
    /// Server-side log line forwarded for visibility
    SystemLog {
        /// The log text (empty when the frame omitted it)
        message: String,
    },
    /// Heartbeat reply to a ping
    Pong,
    /// One streamed fragment of an agent response
    ///
    /// An empty `text` is valid on the wire and carries no content; handlers
    /// treat it as inert.
    AgentToken {
        /// Fragment text to append to the in-flight response
        text: String,
    },
    /// Completion marker for the current agent response
    AgentFinished {
        /// Optional final text; carries the error message when `error` is set
        text: Option<String>,
        /// Whether the exchange failed server-side
        error: bool,
        /// Generation statistics, passed through opaquely
        stats: Option<Value>,
    },
    /// Informational notice from the server itself
    SystemNotice {
        /// Optional notice text
        text: Option<String>,
    },
}

/// Classify a parsed JSON frame into its wire meaning
///
/// Checks run in priority order and fall through on a failed guard, so a
/// `status_update` without a usable `gpu` object continues down the chain
/// exactly like any other unmatched shape. Returns `None` for frames that
/// match no family; callers log and drop those.
#[must_use]
pub fn classify(value: &Value) -> Option<InboundFrame> {
    let frame_type = value.get("type").and_then(Value::as_str);
    let sender = value.get("sender").and_then(Value::as_str);

    if frame_type == Some("status_update") {
        if let Some(gpu) = value
            .get("gpu")
            .and_then(|g| serde_json::from_value::<GpuStatus>(g.clone()).ok())
        {
            return Some(InboundFrame::StatusUpdate { gpu });
        }
    }

    if frame_type == Some("system_log") {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Some(InboundFrame::SystemLog { message });
    }

    if frame_type == Some("pong") {
        return Some(InboundFrame::Pong);
    }

    if sender == Some("agent") {
        let text = value.get("text").and_then(Value::as_str).map(str::to_string);
        let finished = value
            .get("is_finished")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if finished {
            return Some(InboundFrame::AgentFinished {
                text,
                error: value.get("error").and_then(Value::as_bool).unwrap_or(false),
                stats: value.get("stats").cloned(),
            });
        }

        return Some(InboundFrame::AgentToken {
            text: text.unwrap_or_default(),
        });
    }

    if sender == Some("system") {
        let text = value.get("text").and_then(Value::as_str).map(str::to_string);
        return Some(InboundFrame::SystemNotice { text });
    }

    None
}

// =============================================================================
// Outbound Frames
// =============================================================================

/// A user message bound for the agent
///
/// Carries no `type` tag on the wire.
#[derive(Clone, Debug, Serialize)]
pub struct UserMessage {
    /// The message text
    pub text: String,
    /// Persona profile the backend should answer as
    pub profile: String,
}

/// Client lifecycle events reported to the backend dashboard
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityEvent {
    /// The link opened a transport
    MobileConnected,
    /// The link was torn down by the consumer
    MobileDisconnected,
    /// A user message was handed to the transport
    MobileRequestStart,
    /// A streamed response completed
    MobileResponse,
}

/// An activity report frame
///
/// Fire-and-forget telemetry about client lifecycle events. `message` and
/// `stats` appear on the wire only when set.
#[derive(Clone, Debug, Serialize)]
pub struct ActivityReport {
    /// Which lifecycle event occurred
    pub event: ActivityEvent,
    /// When it occurred (ISO-8601 UTC)
    pub timestamp: DateTime<Utc>,
    /// Event payload text, when the event carries one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Generation statistics, passed through from the finished frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<Value>,
}

impl ActivityReport {
    /// Create a report for an event happening now
    #[must_use]
    pub fn now(event: ActivityEvent) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
            message: None,
            stats: None,
        }
    }

    /// Attach a payload message
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach passthrough statistics
    #[must_use]
    pub fn with_stats(mut self, stats: Value) -> Self {
        self.stats = Some(stats);
        self
    }
}

/// Control frames tagged with a `type` discriminator
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    /// Heartbeat ping
    Ping,
    /// Activity telemetry
    MobileActivity(ActivityReport),
}

/// Any frame the client sends
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum OutboundFrame {
    /// Tagged control traffic (ping, activity)
    Control(ControlFrame),
    /// Untagged user input
    User(UserMessage),
}

impl OutboundFrame {
    /// Serialize the frame to its JSON text form
    ///
    /// # Errors
    ///
    /// Returns any `serde_json` serialization error. These shapes do not
    /// produce one in practice; callers log and drop the frame if one appears.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// The heartbeat ping frame
    #[must_use]
    pub fn ping() -> Self {
        Self::Control(ControlFrame::Ping)
    }

    /// An activity report frame
    #[must_use]
    pub fn activity(report: ActivityReport) -> Self {
        Self::Control(ControlFrame::MobileActivity(report))
    }

    /// A user message frame
    #[must_use]
    pub fn user(text: impl Into<String>, profile: impl Into<String>) -> Self {
        Self::User(UserMessage {
            text: text.into(),
            profile: profile.into(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn classify_json(value: Value) -> Option<InboundFrame> {
        classify(&value)
    }

    // =========================================================================
    // Inbound Classification
    // =========================================================================

    #[test]
    fn test_classify_status_update() {
        let frame = classify_json(json!({
            "type": "status_update",
            "gpu": {
                "vram_used_gb": 7.5,
                "vram_total_gb": 24.0,
                "vram_percent": 31.25,
                "temperature_c": 61.0
            }
        }));

        let Some(InboundFrame::StatusUpdate { gpu }) = frame else {
            panic!("expected StatusUpdate, got {frame:?}");
        };
        assert_eq!(gpu.vram_used_gb, 7.5);
        assert_eq!(gpu.vram_total_gb, 24.0);
        assert_eq!(gpu.temperature_c, 61.0);
    }

    #[test]
    fn test_status_update_gpu_fields_default() {
        let frame = classify_json(json!({
            "type": "status_update",
            "gpu": { "vram_percent": 50.0, "fan_rpm": 2200 }
        }));

        let Some(InboundFrame::StatusUpdate { gpu }) = frame else {
            panic!("expected StatusUpdate, got {frame:?}");
        };
        // Missing fields zero, unknown fields ignored
        assert_eq!(gpu.vram_percent, 50.0);
        assert_eq!(gpu.vram_used_gb, 0.0);
    }

    #[test]
    fn test_status_update_without_gpu_is_unclassified() {
        assert_eq!(classify_json(json!({ "type": "status_update" })), None);
        assert_eq!(
            classify_json(json!({ "type": "status_update", "gpu": null })),
            None
        );
        assert_eq!(
            classify_json(json!({ "type": "status_update", "gpu": 42 })),
            None
        );
    }

    #[test]
    fn test_status_update_without_gpu_falls_through_to_sender() {
        // A malformed telemetry frame that also carries the agent
        // discriminator continues down the chain and lands there.
        let frame = classify_json(json!({
            "type": "status_update",
            "sender": "agent",
            "text": "hi"
        }));
        assert_eq!(frame, Some(InboundFrame::AgentToken { text: "hi".to_string() }));
    }

    #[test]
    fn test_classify_system_log() {
        let frame = classify_json(json!({ "type": "system_log", "message": "model loaded" }));
        assert_eq!(
            frame,
            Some(InboundFrame::SystemLog {
                message: "model loaded".to_string()
            })
        );

        // Missing message degrades to empty
        let frame = classify_json(json!({ "type": "system_log" }));
        assert_eq!(
            frame,
            Some(InboundFrame::SystemLog {
                message: String::new()
            })
        );
    }

    #[test]
    fn test_classify_pong() {
        assert_eq!(classify_json(json!({ "type": "pong" })), Some(InboundFrame::Pong));
    }

    #[test]
    fn test_type_family_wins_over_sender_family() {
        // Both discriminators present: priority order resolves to the type family
        let frame = classify_json(json!({
            "type": "system_log",
            "sender": "agent",
            "message": "noisy",
            "text": "should not be a token"
        }));
        assert_eq!(
            frame,
            Some(InboundFrame::SystemLog {
                message: "noisy".to_string()
            })
        );
    }

    #[test]
    fn test_classify_agent_token() {
        let frame = classify_json(json!({ "sender": "agent", "text": "Hel" }));
        assert_eq!(frame, Some(InboundFrame::AgentToken { text: "Hel".to_string() }));
    }

    #[test]
    fn test_agent_without_text_is_an_empty_token() {
        let frame = classify_json(json!({ "sender": "agent" }));
        assert_eq!(frame, Some(InboundFrame::AgentToken { text: String::new() }));
    }

    #[test]
    fn test_classify_agent_finished() {
        let frame = classify_json(json!({
            "sender": "agent",
            "is_finished": true,
            "stats": { "tokens": 42, "tokens_per_second": 18.3 }
        }));

        let Some(InboundFrame::AgentFinished { text, error, stats }) = frame else {
            panic!("expected AgentFinished, got {frame:?}");
        };
        assert_eq!(text, None);
        assert!(!error);
        assert_eq!(stats, Some(json!({ "tokens": 42, "tokens_per_second": 18.3 })));
    }

    #[test]
    fn test_classify_agent_finished_error() {
        let frame = classify_json(json!({
            "sender": "agent",
            "is_finished": true,
            "error": true,
            "text": "model crashed"
        }));

        assert_eq!(
            frame,
            Some(InboundFrame::AgentFinished {
                text: Some("model crashed".to_string()),
                error: true,
                stats: None,
            })
        );
    }

    #[test]
    fn test_is_finished_false_is_a_token() {
        let frame = classify_json(json!({
            "sender": "agent",
            "is_finished": false,
            "text": "lo"
        }));
        assert_eq!(frame, Some(InboundFrame::AgentToken { text: "lo".to_string() }));
    }

    #[test]
    fn test_classify_system_notice() {
        let frame = classify_json(json!({ "sender": "system", "text": "session resumed" }));
        assert_eq!(
            frame,
            Some(InboundFrame::SystemNotice {
                text: Some("session resumed".to_string())
            })
        );
    }

    #[test]
    fn test_unknown_frames_are_unclassified() {
        assert_eq!(classify_json(json!({})), None);
        assert_eq!(classify_json(json!({ "type": "telemetry_v2" })), None);
        assert_eq!(classify_json(json!({ "sender": "scheduler" })), None);
        assert_eq!(classify_json(json!({ "text": "no discriminator" })), None);
    }

    // =========================================================================
    // Outbound Serialization
    // =========================================================================

    #[test]
    fn test_ping_wire_shape() {
        let encoded = OutboundFrame::ping().encode().unwrap();
        let value: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value, json!({ "type": "ping" }));
    }

    #[test]
    fn test_user_message_wire_shape() {
        let encoded = OutboundFrame::user("deploy the thing", "qwen").encode().unwrap();
        let value: Value = serde_json::from_str(&encoded).unwrap();
        // No type tag on user input
        assert_eq!(value, json!({ "text": "deploy the thing", "profile": "qwen" }));
    }

    #[test]
    fn test_activity_report_wire_shape() {
        let report = ActivityReport::now(ActivityEvent::MobileRequestStart)
            .with_message("status report");
        let encoded = OutboundFrame::activity(report).encode().unwrap();
        let value: Value = serde_json::from_str(&encoded).unwrap();

        assert_eq!(value["type"], "mobile_activity");
        assert_eq!(value["event"], "mobile_request_start");
        assert_eq!(value["message"], "status report");
        // Timestamp is ISO-8601 with a timezone designator
        let ts = value["timestamp"].as_str().unwrap();
        assert!(ts.contains('T'));
        // Unset fields stay off the wire
        assert!(value.get("stats").is_none());
    }

    #[test]
    fn test_activity_response_carries_stats() {
        let report = ActivityReport::now(ActivityEvent::MobileResponse)
            .with_message("All systems nominal")
            .with_stats(json!({ "tokens": 128 }));
        let encoded = OutboundFrame::activity(report).encode().unwrap();
        let value: Value = serde_json::from_str(&encoded).unwrap();

        assert_eq!(value["event"], "mobile_response");
        assert_eq!(value["stats"], json!({ "tokens": 128 }));
    }

    #[test]
    fn test_activity_event_wire_names() {
        for (event, name) in [
            (ActivityEvent::MobileConnected, "mobile_connected"),
            (ActivityEvent::MobileDisconnected, "mobile_disconnected"),
            (ActivityEvent::MobileRequestStart, "mobile_request_start"),
            (ActivityEvent::MobileResponse, "mobile_response"),
        ] {
            let value = serde_json::to_value(event).unwrap();
            assert_eq!(value, json!(name));
        }
    }
}
