//! Playback engine seam
//!
//! The decode/render pipeline lives behind [`PlaybackEngine`]. Sessions
//! only issue direct calls on it; everything the engine reports back goes
//! through an [`EngineEvents`] inbox that the owning session drains.

#[cfg(feature = "simulated-engine")]
pub mod simulated;

#[cfg(feature = "simulated-engine")]
pub use simulated::{SimulatedEngine, SimulatedEngineFactory, SimulatedMedia};

use crate::{
    source::SourceAdapter,
    types::{SessionId, VideoFormat},
    Result,
};
use tokio::sync::mpsc;

/// Callback raised by an engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Engine is buffering; `percent` of the stream is available
    Buffering { percent: u32 },
    /// Engine can play. May be raised many times.
    Ready {
        duration_ms: u64,
        video: Option<VideoFormat>,
    },
    /// Stream end reached
    Ended,
    /// Playback failure
    Failed { message: String },
}

/// Sending half of a session's engine inbox
#[derive(Debug, Clone)]
pub struct EngineEvents {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EngineEvents {
    /// Create an inbox
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Post an event. Events posted after the session is gone are dropped.
    pub fn send(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }

    pub fn buffering(&self, percent: u32) {
        self.send(EngineEvent::Buffering { percent });
    }

    pub fn ready(&self, duration_ms: u64, video: Option<VideoFormat>) {
        self.send(EngineEvent::Ready { duration_ms, video });
    }

    pub fn ended(&self) {
        self.send(EngineEvent::Ended);
    }

    pub fn failed(&self, message: impl Into<String>) {
        self.send(EngineEvent::Failed {
            message: message.into(),
        });
    }

    /// True once the receiving session has stopped listening
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Playback engine instance, exclusively owned by one session
pub trait PlaybackEngine: Send {
    /// Engine name for logs
    fn name(&self) -> &'static str;

    /// Route video output to the session's render target
    fn attach_render_target(&mut self, target: SessionId) -> Result<()>;

    /// Start loading `source`; progress arrives through the inbox
    fn prepare(&mut self, source: &SourceAdapter) -> Result<()>;

    /// Playback intent: play once ready, or hold
    fn set_play_when_ready(&mut self, play: bool) -> Result<()>;

    /// Repeat the stream when it ends
    fn set_looping(&mut self, looping: bool) -> Result<()>;

    /// Output volume in `[0, 1]`
    fn set_volume(&mut self, volume: f32) -> Result<()>;

    fn seek_to(&mut self, position_ms: u64) -> Result<()>;

    fn position_ms(&self) -> Result<u64>;

    fn stop(&mut self) -> Result<()>;

    /// Free the engine; no calls follow
    fn release(&mut self) -> Result<()>;
}

/// Builds engines for new sessions
pub trait EngineFactory: Send + Sync {
    fn create(&self, events: EngineEvents) -> Result<Box<dyn PlaybackEngine>>;
}
