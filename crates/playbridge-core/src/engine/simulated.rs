//! Timer-driven engine for headless hosts and demos
//!
//! Reports a scripted buffering ramp, becomes ready, then advances a
//! wall-clock position while playing. Looping restarts silently; without
//! looping the end of the stream is reported once.

use super::{EngineEvents, EngineFactory, PlaybackEngine};
use crate::{
    source::SourceAdapter,
    types::{SessionId, VideoFormat},
    Error, Result,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

const TICK: Duration = Duration::from_millis(20);

/// Media the simulated engine pretends to play
#[derive(Debug, Clone)]
pub struct SimulatedMedia {
    pub duration_ms: u64,
    pub video: Option<VideoFormat>,
    /// Buffered percentages reported before ready
    pub buffering_steps: Vec<u32>,
    pub step_interval: Duration,
    /// Report a failure this long after becoming ready
    pub fail_after: Option<Duration>,
}

impl Default for SimulatedMedia {
    fn default() -> Self {
        Self {
            duration_ms: 10_000,
            video: Some(VideoFormat::new(1280, 720, 0)),
            buffering_steps: vec![25, 50, 75, 100],
            step_interval: Duration::from_millis(50),
            fail_after: None,
        }
    }
}

#[derive(Debug, Default)]
struct Clock {
    base_ms: u64,
    started: Option<Instant>,
    looping: bool,
    volume: f32,
    ended: bool,
}

impl Clock {
    fn position(&self, duration_ms: u64) -> u64 {
        let elapsed = self
            .started
            .map(|s| s.elapsed().as_millis() as u64)
            .unwrap_or(0);
        (self.base_ms + elapsed).min(duration_ms)
    }

    fn is_playing(&self) -> bool {
        self.started.is_some()
    }
}

/// Simulated playback engine
pub struct SimulatedEngine {
    media: SimulatedMedia,
    events: EngineEvents,
    clock: Arc<Mutex<Clock>>,
    task: Option<JoinHandle<()>>,
    target: Option<SessionId>,
    released: bool,
}

impl SimulatedEngine {
    pub fn new(media: SimulatedMedia, events: EngineEvents) -> Self {
        Self {
            media,
            events,
            clock: Arc::new(Mutex::new(Clock {
                volume: 1.0,
                ..Default::default()
            })),
            task: None,
            target: None,
            released: false,
        }
    }

    pub fn volume(&self) -> f32 {
        self.clock.lock().volume
    }

    fn ensure_live(&self) -> Result<()> {
        if self.released {
            return Err(Error::engine("simulated engine already released"));
        }
        Ok(())
    }

    fn abort_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl PlaybackEngine for SimulatedEngine {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn attach_render_target(&mut self, target: SessionId) -> Result<()> {
        self.ensure_live()?;
        self.target = Some(target);
        Ok(())
    }

    fn prepare(&mut self, source: &SourceAdapter) -> Result<()> {
        self.ensure_live()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| Error::engine("simulated engine needs a tokio runtime"))?;

        info!(
            locator = %source.locator(),
            content_type = %source.content_type(),
            "Simulated engine preparing"
        );

        self.abort_task();
        let media = self.media.clone();
        let events = self.events.clone();
        let clock = self.clock.clone();

        self.task = Some(runtime.spawn(async move {
            for percent in &media.buffering_steps {
                tokio::time::sleep(media.step_interval).await;
                events.buffering(*percent);
            }
            events.ready(media.duration_ms, media.video);

            let ready_at = Instant::now();
            loop {
                tokio::time::sleep(TICK).await;

                if media.fail_after.is_some_and(|after| ready_at.elapsed() >= after) {
                    events.failed("simulated decoder failure");
                    return;
                }

                let mut clock = clock.lock();
                if !clock.is_playing() || clock.position(media.duration_ms) < media.duration_ms {
                    continue;
                }
                if clock.looping {
                    debug!("Simulated engine looping");
                    clock.base_ms = 0;
                    clock.started = Some(Instant::now());
                } else if !clock.ended {
                    clock.ended = true;
                    clock.base_ms = media.duration_ms;
                    clock.started = None;
                    events.ended();
                }
            }
        }));
        Ok(())
    }

    fn set_play_when_ready(&mut self, play: bool) -> Result<()> {
        self.ensure_live()?;
        let mut clock = self.clock.lock();
        if play && !clock.is_playing() {
            if clock.ended {
                clock.ended = false;
                clock.base_ms = 0;
            }
            clock.started = Some(Instant::now());
        } else if !play && clock.is_playing() {
            clock.base_ms = clock.position(self.media.duration_ms);
            clock.started = None;
        }
        Ok(())
    }

    fn set_looping(&mut self, looping: bool) -> Result<()> {
        self.ensure_live()?;
        self.clock.lock().looping = looping;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<()> {
        self.ensure_live()?;
        self.clock.lock().volume = volume;
        Ok(())
    }

    fn seek_to(&mut self, position_ms: u64) -> Result<()> {
        self.ensure_live()?;
        let mut clock = self.clock.lock();
        clock.base_ms = position_ms.min(self.media.duration_ms);
        clock.ended = false;
        if clock.is_playing() {
            clock.started = Some(Instant::now());
        }
        Ok(())
    }

    fn position_ms(&self) -> Result<u64> {
        self.ensure_live()?;
        Ok(self.clock.lock().position(self.media.duration_ms))
    }

    fn stop(&mut self) -> Result<()> {
        self.ensure_live()?;
        self.abort_task();
        let mut clock = self.clock.lock();
        clock.base_ms = clock.position(self.media.duration_ms);
        clock.started = None;
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.ensure_live()?;
        self.abort_task();
        self.released = true;
        debug!(target_id = ?self.target, "Simulated engine released");
        Ok(())
    }
}

impl Drop for SimulatedEngine {
    fn drop(&mut self) {
        self.abort_task();
    }
}

/// Factory producing [`SimulatedEngine`]s for one kind of media
#[derive(Debug, Clone, Default)]
pub struct SimulatedEngineFactory {
    media: SimulatedMedia,
}

impl SimulatedEngineFactory {
    pub fn new(media: SimulatedMedia) -> Self {
        Self { media }
    }
}

impl EngineFactory for SimulatedEngineFactory {
    fn create(&self, events: EngineEvents) -> Result<Box<dyn PlaybackEngine>> {
        Ok(Box::new(SimulatedEngine::new(self.media.clone(), events)))
    }
}
