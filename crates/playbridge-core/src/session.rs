//! Player Session - one playback instance
//!
//! Owns:
//! - the engine handle (exclusively)
//! - the render target borrowed from the host
//! - the event relay feeding the host listener
//!
//! Commands and engine callbacks meet under one exclusive section per
//! session. Engine callbacks arrive through an inbox drained by a pump task,
//! and are folded into a small set of ordered, at-most-once lifecycle
//! events.

use crate::{
    config::BridgeConfig,
    engine::{EngineEvent, EngineEvents, EngineFactory, PlaybackEngine},
    relay::{EventRelay, EventSink},
    source::SourceAdapter,
    surface::RenderTarget,
    types::*,
    Error, Result,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Error code carried by engine failure events
pub const ENGINE_ERROR_CODE: &str = "VideoError";

/// Options for a new session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub looping: bool,
    pub volume: f64,
}

impl SessionOptions {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            looping: config.default_looping,
            volume: config.default_volume,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            looping: false,
            volume: 1.0,
        }
    }
}

struct SessionInner {
    state: PlayerState,
    engine: Option<Box<dyn PlaybackEngine>>,
    render_target: Option<Box<dyn RenderTarget>>,
    looping: bool,
    volume: f64,
}

/// Player session managing a single playback
pub struct PlayerSession {
    id: SessionId,
    source: SourceAdapter,
    relay: EventRelay,
    inner: Mutex<SessionInner>,
    initialized: AtomicBool,
    disposed: AtomicBool,
}

impl PlayerSession {
    /// Build the engine, prepare `source` and start draining engine callbacks.
    ///
    /// The session starts in `Preparing`. On failure the engine is released
    /// and the render target is handed back; nothing is left half-built.
    /// Must run inside a tokio runtime.
    pub fn create(
        mut render_target: Box<dyn RenderTarget>,
        source: SourceAdapter,
        options: SessionOptions,
        engines: &dyn EngineFactory,
    ) -> Result<Arc<Self>> {
        let id = render_target.id();
        let volume = clamp_volume(options.volume)?;
        let (events, inbox) = EngineEvents::channel();

        let mut engine = match engines.create(events) {
            Ok(engine) => engine,
            Err(e) => {
                release_target(id, &mut render_target);
                return Err(e);
            }
        };

        let setup = engine
            .attach_render_target(id)
            .and_then(|_| engine.set_looping(options.looping))
            .and_then(|_| engine.set_volume(volume as f32))
            .and_then(|_| engine.prepare(&source));
        if let Err(e) = setup {
            warn!(session_id = %id, error = %e, "Engine setup failed");
            if let Err(release_err) = engine.release() {
                warn!(session_id = %id, error = %release_err, "Engine release failed");
            }
            release_target(id, &mut render_target);
            return Err(e);
        }

        info!(
            session_id = %id,
            engine = engine.name(),
            content_type = %source.content_type(),
            locator = %source.locator(),
            "Session created"
        );

        let session = Arc::new(Self {
            id,
            source,
            relay: EventRelay::new(),
            inner: Mutex::new(SessionInner {
                state: PlayerState::Preparing,
                engine: Some(engine),
                render_target: Some(render_target),
                looping: options.looping,
                volume,
            }),
            initialized: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        });

        spawn_event_pump(Arc::downgrade(&session), inbox);
        Ok(session)
    }

    /// Get session ID
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Source this session was created with
    pub fn source(&self) -> &SourceAdapter {
        &self.source
    }

    /// Get current state
    pub fn state(&self) -> PlayerState {
        self.inner.lock().state
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn looping(&self) -> bool {
        self.inner.lock().looping
    }

    /// Last volume forwarded to the engine
    pub fn volume(&self) -> f64 {
        self.inner.lock().volume
    }

    /// Subscribe the host listener; pending events are flushed to it
    pub fn listen(&self, sink: Arc<dyn EventSink>) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::Disposed(self.id));
        }
        debug!(session_id = %self.id, "Listener attached");
        self.relay.attach(sink);
        Ok(())
    }

    /// Unsubscribe the host listener; events accumulate until the next listen
    pub fn cancel(&self) {
        debug!(session_id = %self.id, "Listener detached");
        self.relay.detach();
    }

    /// Start playback
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn play(&self) -> Result<()> {
        self.transport(PlayerState::Playing, |engine| engine.set_play_when_ready(true))
    }

    /// Pause playback
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn pause(&self) -> Result<()> {
        self.transport(PlayerState::Paused, |engine| engine.set_play_when_ready(false))
    }

    /// Seek to position
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn seek_to(&self, position_ms: u64) -> Result<()> {
        let mut inner = self.inner.lock();
        self.ensure_transport(&inner, "seekTo")?;
        engine_mut(&mut inner, self.id)?.seek_to(position_ms)?;
        // Leaving Completed re-arms completion
        if inner.state == PlayerState::Completed {
            self.transition(&mut inner, PlayerState::Paused);
        }
        Ok(())
    }

    /// Current playback position
    pub fn position_ms(&self) -> Result<u64> {
        let inner = self.inner.lock();
        self.ensure_transport(&inner, "position")?;
        inner
            .engine
            .as_ref()
            .ok_or(Error::Disposed(self.id))?
            .position_ms()
    }

    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn set_looping(&self, looping: bool) -> Result<()> {
        let mut inner = self.inner.lock();
        engine_mut(&mut inner, self.id)?.set_looping(looping)?;
        inner.looping = looping;
        Ok(())
    }

    /// Set volume, clamped into `[0, 1]`
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn set_volume(&self, volume: f64) -> Result<()> {
        let volume = clamp_volume(volume)?;
        let mut inner = self.inner.lock();
        engine_mut(&mut inner, self.id)?.set_volume(volume as f32)?;
        inner.volume = volume;
        Ok(())
    }

    /// Release every owned resource exactly once.
    ///
    /// Stops the engine if it became ready, releases the render target,
    /// closes the event stream and releases the engine. Failures along the
    /// way are logged and skipped. Later calls do nothing.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            debug!("Session already disposed");
            return;
        }

        let mut inner = self.inner.lock();
        let mut engine = inner.engine.take();
        let mut render_target = inner.render_target.take();
        let from = std::mem::replace(&mut inner.state, PlayerState::Disposed);

        if self.initialized.load(Ordering::SeqCst) {
            if let Some(engine) = engine.as_mut() {
                if let Err(e) = engine.stop() {
                    warn!(error = %e, "Engine stop failed during dispose");
                }
            }
        }
        if let Some(target) = render_target.as_mut() {
            release_target(self.id, target);
        }
        self.relay.close();
        if let Some(engine) = engine.as_mut() {
            if let Err(e) = engine.release() {
                warn!(error = %e, "Engine release failed during dispose");
            }
        }

        info!(from = %from, "Session disposed");
    }

    /// Fold one engine callback into the lifecycle
    fn on_engine_event(&self, event: EngineEvent) {
        let mut inner = self.inner.lock();
        if self.is_disposed() || inner.state.is_terminal() {
            debug!(session_id = %self.id, state = %inner.state, ?event, "Ignoring engine event");
            return;
        }

        match event {
            EngineEvent::Buffering { percent } => {
                self.relay.enqueue(Event::buffering(percent));
            }
            EngineEvent::Ready { duration_ms, video } => {
                if self
                    .initialized
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
                {
                    return;
                }
                let (width, height) = match video.map(|v| v.display_size()) {
                    Some((w, h)) => (Some(w), Some(h)),
                    None => (None, None),
                };
                self.transition(&mut inner, PlayerState::Ready);
                self.relay.enqueue(Event::Initialized {
                    duration_ms,
                    width,
                    height,
                });
            }
            EngineEvent::Ended => {
                if inner.looping {
                    debug!(session_id = %self.id, "Loop restart, completion suppressed");
                    return;
                }
                if !self.transition(&mut inner, PlayerState::Completed) {
                    return;
                }
                self.relay.enqueue(Event::Completed);
            }
            EngineEvent::Failed { message } => {
                if !self.transition(&mut inner, PlayerState::Error) {
                    return;
                }
                self.relay.enqueue(Event::Error {
                    code: ENGINE_ERROR_CODE.to_string(),
                    message: format!("Video player had error: {message}"),
                    details: None,
                });
            }
        }
    }

    /// Move to `to`. Returns false when the move is not allowed from the
    /// current state; staying in the same state is not a move.
    fn transition(&self, inner: &mut SessionInner, to: PlayerState) -> bool {
        let from = inner.state;
        if from.can_transition_to(to) {
            inner.state = to;
            info!(session_id = %self.id, from = %from, to = %to, "State transition");
            true
        } else {
            debug!(session_id = %self.id, from = %from, to = %to, "Rejected state transition");
            false
        }
    }

    fn ensure_transport(&self, inner: &SessionInner, operation: &'static str) -> Result<()> {
        match inner.state {
            state if state.accepts_transport() => Ok(()),
            PlayerState::Preparing => Err(Error::NotReady {
                id: self.id,
                state: PlayerState::Preparing,
            }),
            PlayerState::Disposed => Err(Error::Disposed(self.id)),
            state => Err(Error::InvalidOperation { operation, state }),
        }
    }

    fn transport<F>(&self, target: PlayerState, call: F) -> Result<()>
    where
        F: FnOnce(&mut dyn PlaybackEngine) -> Result<()>,
    {
        let mut inner = self.inner.lock();
        match inner.state {
            PlayerState::Preparing => {
                return Err(Error::NotReady {
                    id: self.id,
                    state: inner.state,
                })
            }
            PlayerState::Disposed => return Err(Error::Disposed(self.id)),
            state if state != target && !state.can_transition_to(target) => {
                return Err(Error::InvalidStateTransition { from: state, to: target })
            }
            _ => {}
        }
        call(engine_mut(&mut inner, self.id)?.as_mut())?;
        if inner.state != target {
            self.transition(&mut inner, target);
        }
        Ok(())
    }
}

impl std::fmt::Debug for PlayerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerSession")
            .field("id", &self.id)
            .field("content_type", &self.source.content_type())
            .field("state", &self.state())
            .field("initialized", &self.is_initialized())
            .field("relay", &self.relay)
            .finish()
    }
}

fn engine_mut(inner: &mut SessionInner, id: SessionId) -> Result<&mut Box<dyn PlaybackEngine>> {
    inner.engine.as_mut().ok_or(Error::Disposed(id))
}

fn clamp_volume(volume: f64) -> Result<f64> {
    if volume.is_nan() {
        return Err(Error::invalid_argument("volume", "not a number"));
    }
    Ok(volume.clamp(0.0, 1.0))
}

fn release_target(id: SessionId, target: &mut Box<dyn RenderTarget>) {
    if let Err(e) = target.release() {
        warn!(session_id = %id, error = %e, "Render target release failed");
    }
}

/// Drain the engine inbox into the session until either side goes away
fn spawn_event_pump(session: Weak<PlayerSession>, mut inbox: mpsc::UnboundedReceiver<EngineEvent>) {
    tokio::spawn(async move {
        while let Some(event) = inbox.recv().await {
            let Some(session) = session.upgrade() else {
                break;
            };
            session.on_engine_event(event);
            if session.is_disposed() {
                break;
            }
        }
    });
}
