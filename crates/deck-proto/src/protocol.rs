//! mpv JSON IPC wire format.
//!
//! Every message is one JSON value terminated by `\n`.  Outbound commands are
//! `{"command": [verb, args...]}`.  Inbound lines are either unsolicited
//! events (`{"event": ...}`) or replies to a command (`{"error": ...}`).
//!
//! Transport concerns (sockets, tasks) live in the TUI crate; this module only
//! knows how to turn commands into bytes and bytes into messages.

use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;

// ── observed properties ───────────────────────────────────────────────────────

/// Fixed observe_property IDs, one per tracked property.
pub const OBS_PAUSE: u64 = 1;
pub const OBS_TIME_POS: u64 = 2;
pub const OBS_DURATION: u64 = 3;
pub const OBS_VOLUME: u64 = 4;

/// Engine properties the player tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Pause,
    TimePos,
    Duration,
    Volume,
}

impl Property {
    /// Properties subscribed to on every fresh connection, in send order.
    pub const OBSERVED: [Property; 4] = [
        Property::Pause,
        Property::TimePos,
        Property::Duration,
        Property::Volume,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Property::Pause => "pause",
            Property::TimePos => "time-pos",
            Property::Duration => "duration",
            Property::Volume => "volume",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pause" => Some(Property::Pause),
            "time-pos" => Some(Property::TimePos),
            "duration" => Some(Property::Duration),
            "volume" => Some(Property::Volume),
            _ => None,
        }
    }

    pub fn observe_id(self) -> u64 {
        match self {
            Property::Pause => OBS_PAUSE,
            Property::TimePos => OBS_TIME_POS,
            Property::Duration => OBS_DURATION,
            Property::Volume => OBS_VOLUME,
        }
    }
}

// ── outbound ──────────────────────────────────────────────────────────────────

/// Every command the player sends to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ObserveProperty(Property),
    GetProperty(Property),
    SetVolume(f64),
    CyclePause,
    Quit,
}

impl Command {
    pub fn verb(&self) -> &'static str {
        match self {
            Command::ObserveProperty(_) => "observe_property",
            Command::GetProperty(_) => "get_property",
            Command::SetVolume(_) => "set_property",
            Command::CyclePause => "cycle",
            Command::Quit => "quit",
        }
    }

    pub fn args(&self) -> Vec<Value> {
        match self {
            Command::ObserveProperty(p) => vec![json!(p.observe_id()), json!(p.name())],
            Command::GetProperty(p) => vec![json!(p.name())],
            Command::SetVolume(v) => vec![json!(Property::Volume.name()), number(*v)],
            Command::CyclePause => vec![json!(Property::Pause.name())],
            Command::Quit => Vec::new(),
        }
    }

    pub fn to_json(&self) -> Value {
        let mut parts = Vec::with_capacity(4);
        parts.push(json!(self.verb()));
        parts.extend(self.args());
        json!({ "command": parts })
    }

    /// Serialise as a single wire line, newline included.
    pub fn encode(&self) -> String {
        let mut line = self.to_json().to_string();
        line.push('\n');
        line
    }
}

/// Whole numbers go out as JSON integers (`72`, not `72.0`).
fn number(v: f64) -> Value {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        json!(v as i64)
    } else {
        json!(v)
    }
}

// ── inbound ───────────────────────────────────────────────────────────────────

/// Scalar payload of a property-change event or reply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyValue {
    Number(f64),
    Bool(bool),
    Null,
}

impl PropertyValue {
    /// `None` for strings, arrays and objects, which no tracked property uses.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(PropertyValue::Null),
            Value::Bool(b) => Some(PropertyValue::Bool(*b)),
            Value::Number(n) => n.as_f64().map(PropertyValue::Number),
            _ => None,
        }
    }

    pub fn as_f64(self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(n),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// `value` is `None` when `data` was absent or not a scalar.
    PropertyChange {
        name: String,
        value: Option<PropertyValue>,
    },
    /// mpv calls this `end-file`; `end-of-file` is accepted too.
    EndOfFile { reason: Option<String> },
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Event(EngineEvent),
    Reply {
        error: String,
        data: Option<PropertyValue>,
    },
}

impl Inbound {
    pub fn is_success_reply(&self) -> bool {
        matches!(self, Inbound::Reply { error, .. } if error == "success")
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message is neither an event nor a reply")]
    UnknownShape,
}

/// Parse one complete line (without its terminator).
pub fn decode(line: &str) -> Result<Inbound, DecodeError> {
    let root: Value = serde_json::from_str(line)?;

    if let Some(event) = root.get("event") {
        let name = event.as_str().ok_or(DecodeError::UnknownShape)?;
        let event = match name {
            "property-change" => EngineEvent::PropertyChange {
                name: root
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                value: root.get("data").and_then(PropertyValue::from_json),
            },
            "end-file" | "end-of-file" => EngineEvent::EndOfFile {
                reason: root
                    .get("reason")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            other => EngineEvent::Other(other.to_string()),
        };
        return Ok(Inbound::Event(event));
    }

    if let Some(error) = root.get("error").and_then(Value::as_str) {
        return Ok(Inbound::Reply {
            error: error.to_string(),
            data: root.get("data").and_then(PropertyValue::from_json),
        });
    }

    Err(DecodeError::UnknownShape)
}

// ── framing ───────────────────────────────────────────────────────────────────

/// A line that never terminates is dropped once it grows past this.
const MAX_PENDING: usize = 1 << 20;

/// Accumulates raw reads and yields complete newline-terminated lines.
///
/// Bytes are kept undecoded until a full line is present, so a multi-byte
/// UTF-8 sequence split across two reads is reassembled intact.  The
/// trailing fragment after the last `\n` is retained for the next read.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
        if self.pending.len() > MAX_PENDING && !self.pending.contains(&b'\n') {
            warn!(
                "ipc: dropping {} bytes without a line terminator",
                self.pending.len()
            );
            self.pending.clear();
        }
    }

    /// Next complete, non-blank line with surrounding whitespace trimmed.
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let end = self.pending.iter().position(|&b| b == b'\n')?;
            let raw: Vec<u8> = self.pending.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw);
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }

    /// Bytes held back waiting for a terminator.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
