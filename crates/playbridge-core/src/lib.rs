//! Playbridge Core - session and event core of a media playback bridge
//!
//! This crate sits between a host caller and a playback engine:
//! - Buffered, reattachable per-session event delivery
//! - Per-session lifecycle state machine over engine callbacks
//! - Locator classification and source adapter selection
//! - Session registry with bulk teardown
//! - Host command decoding and dispatch
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Playbridge Core                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   host command ──► ┌──────────────┐                             │
//! │                    │   Command    │                             │
//! │                    │   Dispatch   │                             │
//! │                    └──────┬───────┘                             │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴───────┐  ┌──────────────┐           │
//! │  │    Source    │◄─┤   Session    ├─►│ Render Target│           │
//! │  │   Resolver   │  │   Registry   │  │  Allocator   │           │
//! │  └──────────────┘  └──────┬───────┘  └──────────────┘           │
//! │                           │                                     │
//! │                    ┌──────┴───────┐  engine  ┌──────────────┐   │
//! │                    │    Player    │◄─inbox───┤   Playback   │   │
//! │                    │   Session    ├─────────►│    Engine    │   │
//! │                    └──────┬───────┘  calls   └──────────────┘   │
//! │                           │                                     │
//! │                    ┌──────┴───────┐                             │
//! │                    │    Event     ├──► host listener            │
//! │                    │    Relay     │                             │
//! │                    └──────────────┘                             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod relay;
pub mod session;
pub mod source;
pub mod surface;
pub mod types;

pub use command::{dispatch, MethodCall};
pub use config::BridgeConfig;
pub use engine::{EngineEvent, EngineEvents, EngineFactory, PlaybackEngine};
pub use error::{CommandError, Error, Result};
pub use registry::{CreateOptions, MediaSource, SessionRegistry};
pub use relay::{ChannelSink, EventRelay, EventSink};
pub use session::{PlayerSession, SessionOptions};
pub use source::{ContentType, DataAccess, Locator, SourceAdapter, SourceResolver};
pub use surface::{
    AssetResolver, BundledAssets, HeadlessTarget, RenderTarget, RenderTargetAllocator,
    SequentialAllocator,
};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the bridge library
pub fn init() {
    tracing::info!(version = VERSION, "Playbridge Core initialized");
}
