//! Core types for Playbridge

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Opaque session identifier.
///
/// Assigned by the render-target allocator; the same number addresses the
/// session in commands and names its event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SessionId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    /// Engine prepared, waiting for the first ready signal
    Preparing,
    /// Engine signaled first-ready
    Ready,
    /// Caller asked for playback
    Playing,
    /// Caller paused playback
    Paused,
    /// Engine reached the end of a non-looping stream
    Completed,
    /// Engine reported a failure
    Error,
    /// Resources released
    Disposed,
}

impl PlayerState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: PlayerState) -> bool {
        use PlayerState::*;
        if target == Disposed {
            return *self != Disposed;
        }
        matches!(
            (self, target),
            // From Preparing
            (Preparing, Ready) | (Preparing, Error) |
            // From Ready
            (Ready, Playing) | (Ready, Paused) | (Ready, Completed) | (Ready, Error) |
            // From Playing
            (Playing, Paused) | (Playing, Completed) | (Playing, Error) |
            // From Paused
            (Paused, Playing) | (Paused, Completed) | (Paused, Error) |
            // From Completed
            (Completed, Playing) | (Completed, Paused)
        )
    }

    /// True once the engine has signaled ready and no failure occurred
    pub fn accepts_transport(&self) -> bool {
        matches!(
            self,
            PlayerState::Ready | PlayerState::Playing | PlayerState::Paused | PlayerState::Completed
        )
    }

    /// No further events are produced in these states
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlayerState::Error | PlayerState::Disposed)
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerState::Preparing => write!(f, "preparing"),
            PlayerState::Ready => write!(f, "ready"),
            PlayerState::Playing => write!(f, "playing"),
            PlayerState::Paused => write!(f, "paused"),
            PlayerState::Completed => write!(f, "completed"),
            PlayerState::Error => write!(f, "error"),
            PlayerState::Disposed => write!(f, "disposed"),
        }
    }
}

/// A buffered span, in percent of the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferedRange {
    pub start: u32,
    pub end: u32,
}

impl BufferedRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

/// Video track format as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    /// Clockwise rotation the track must be displayed with
    pub rotation_degrees: u32,
}

impl VideoFormat {
    pub fn new(width: u32, height: u32, rotation_degrees: u32) -> Self {
        Self {
            width,
            height,
            rotation_degrees,
        }
    }

    /// Dimensions in display orientation.
    /// Portrait recordings (90/270 degrees) have width and height swapped.
    pub fn display_size(&self) -> (u32, u32) {
        match self.rotation_degrees % 360 {
            90 | 270 => (self.height, self.width),
            _ => (self.width, self.height),
        }
    }
}

/// Event delivered on a session's event stream
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Buffered ranges, currently always a single `[0, percent]` range
    BufferingUpdate { ranges: Vec<BufferedRange> },
    /// First ready signal, emitted at most once per session
    Initialized {
        duration_ms: u64,
        width: Option<u32>,
        height: Option<u32>,
    },
    /// End of a non-looping stream
    Completed,
    /// Engine failure
    Error {
        code: String,
        message: String,
        details: Option<Value>,
    },
}

impl Event {
    /// Buffering update covering `[0, percent]`
    pub fn buffering(percent: u32) -> Self {
        Event::BufferingUpdate {
            ranges: vec![BufferedRange::new(0, percent.min(100))],
        }
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Event::BufferingUpdate { .. } => "bufferingUpdate",
            Event::Initialized { .. } => "initialized",
            Event::Completed => "completed",
            Event::Error { .. } => "error",
        }
    }

    /// Wire representation sent to the host listener
    pub fn to_wire(&self) -> Value {
        match self {
            Event::BufferingUpdate { ranges } => {
                let values: Vec<[u32; 2]> = ranges.iter().map(|r| [r.start, r.end]).collect();
                json!({ "event": "bufferingUpdate", "values": values })
            }
            Event::Initialized {
                duration_ms,
                width,
                height,
            } => {
                let mut event = json!({ "event": "initialized", "duration": duration_ms });
                if let (Some(width), Some(height)) = (width, height) {
                    event["width"] = json!(width);
                    event["height"] = json!(height);
                }
                event
            }
            Event::Completed => json!({ "event": "completed" }),
            Event::Error {
                code,
                message,
                details,
            } => json!({ "error": code, "message": message, "details": details }),
        }
    }
}

/// Item travelling through an event relay
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Event(Event),
    /// Terminal marker; nothing follows it
    EndOfStream,
}

impl StreamItem {
    pub fn to_wire(&self) -> Value {
        match self {
            StreamItem::Event(event) => event.to_wire(),
            StreamItem::EndOfStream => json!({ "endOfStream": true }),
        }
    }
}

impl From<Event> for StreamItem {
    fn from(event: Event) -> Self {
        StreamItem::Event(event)
    }
}
