//! Integration tests for Playbridge Core

use async_trait::async_trait;
use parking_lot::Mutex;
use playbridge_core::{
    dispatch, BridgeConfig, ChannelSink, ContentType, CreateOptions, DataAccess, EngineEvents,
    EngineFactory, Error, Event, EventRelay, EventSink, MethodCall, PlaybackEngine, PlayerState,
    RenderTarget, RenderTargetAllocator, Result, SessionId, SessionRegistry, SourceAdapter,
    SourceResolver, StreamItem, VideoFormat,
};
use serde_json::json;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

// =============================================================================
// Test Doubles
// =============================================================================

/// Engine that records every call and never produces callbacks on its own
struct RecordingEngine {
    calls: Arc<Mutex<Vec<String>>>,
    panic_on_release: bool,
}

impl RecordingEngine {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }
}

impl PlaybackEngine for RecordingEngine {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn attach_render_target(&mut self, target: SessionId) -> Result<()> {
        self.record(format!("attach({target})"));
        Ok(())
    }

    fn prepare(&mut self, source: &SourceAdapter) -> Result<()> {
        self.record(format!("prepare({})", source.content_type()));
        Ok(())
    }

    fn set_play_when_ready(&mut self, play: bool) -> Result<()> {
        self.record(format!("play_when_ready({play})"));
        Ok(())
    }

    fn set_looping(&mut self, looping: bool) -> Result<()> {
        self.record(format!("looping({looping})"));
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<()> {
        self.record(format!("volume({volume:.2})"));
        Ok(())
    }

    fn seek_to(&mut self, position_ms: u64) -> Result<()> {
        self.record(format!("seek({position_ms})"));
        Ok(())
    }

    fn position_ms(&self) -> Result<u64> {
        Ok(4_200)
    }

    fn stop(&mut self) -> Result<()> {
        self.record("stop");
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.record("release");
        if self.panic_on_release {
            panic!("engine exploded during release");
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingFactory {
    engines: Mutex<Vec<(EngineEvents, Arc<Mutex<Vec<String>>>)>>,
    panic_on_release: Mutex<Vec<bool>>,
}

impl RecordingFactory {
    /// Make the next engine panic when released
    fn arm_release_panic(&self) {
        self.panic_on_release.lock().push(true);
    }

    fn created(&self) -> usize {
        self.engines.lock().len()
    }

    fn events(&self, index: usize) -> EngineEvents {
        self.engines.lock()[index].0.clone()
    }

    fn calls(&self, index: usize) -> Vec<String> {
        self.engines.lock()[index].1.lock().clone()
    }
}

impl EngineFactory for RecordingFactory {
    fn create(&self, events: EngineEvents) -> Result<Box<dyn PlaybackEngine>> {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let panic_on_release = self.panic_on_release.lock().pop().unwrap_or(false);
        self.engines.lock().push((events, calls.clone()));
        Ok(Box::new(RecordingEngine {
            calls,
            panic_on_release,
        }))
    }
}

struct CountingTarget {
    id: SessionId,
    releases: Arc<AtomicUsize>,
}

impl RenderTarget for CountingTarget {
    fn id(&self) -> SessionId {
        self.id
    }

    fn release(&mut self) -> Result<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct CountingAllocator {
    next: AtomicI64,
    releases: Arc<AtomicUsize>,
}

impl CountingAllocator {
    fn released(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RenderTargetAllocator for CountingAllocator {
    async fn allocate(&self) -> Result<Box<dyn RenderTarget>> {
        let id = SessionId(self.next.fetch_add(1, Ordering::SeqCst) + 1);
        Ok(Box::new(CountingTarget {
            id,
            releases: self.releases.clone(),
        }))
    }
}

struct Harness {
    registry: SessionRegistry,
    engines: Arc<RecordingFactory>,
    targets: Arc<CountingAllocator>,
}

fn harness() -> Harness {
    let engines = Arc::new(RecordingFactory::default());
    let targets = Arc::new(CountingAllocator::default());
    let registry = SessionRegistry::new(BridgeConfig::default(), targets.clone(), engines.clone());
    Harness {
        registry,
        engines,
        targets,
    }
}

async fn listen(registry: &SessionRegistry, id: SessionId) -> UnboundedReceiver<StreamItem> {
    let (sink, rx) = ChannelSink::new();
    registry.listen(id, Arc::new(sink)).await.unwrap();
    rx
}

async fn next_item(rx: &mut UnboundedReceiver<StreamItem>) -> StreamItem {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event stream closed")
}

async fn next_event(rx: &mut UnboundedReceiver<StreamItem>) -> Event {
    match next_item(rx).await {
        StreamItem::Event(event) => event,
        StreamItem::EndOfStream => panic!("unexpected end of stream"),
    }
}

fn collector() -> (Arc<Mutex<Vec<StreamItem>>>, Arc<dyn EventSink>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = seen.clone();
    let sink: Arc<dyn EventSink> = Arc::new(move |item: StreamItem| sink_seen.lock().push(item));
    (seen, sink)
}

// =============================================================================
// Event Relay Tests
// =============================================================================

#[test]
fn test_relay_flushes_in_order_on_attach() {
    let relay = EventRelay::new();
    relay.enqueue(Event::buffering(10));
    relay.enqueue(Event::buffering(20));
    relay.enqueue(Event::Completed);
    assert_eq!(relay.pending_len(), 3);

    let (seen, sink) = collector();
    relay.attach(sink);

    assert_eq!(
        *seen.lock(),
        vec![
            StreamItem::Event(Event::buffering(10)),
            StreamItem::Event(Event::buffering(20)),
            StreamItem::Event(Event::Completed),
        ]
    );
    assert_eq!(relay.pending_len(), 0);
}

#[test]
fn test_relay_reattach_never_redelivers() {
    let relay = EventRelay::new();
    let (first, sink) = collector();
    relay.attach(sink);
    relay.enqueue(Event::buffering(5));
    relay.detach();
    relay.enqueue(Event::buffering(6));

    let (second, sink) = collector();
    relay.attach(sink);

    assert_eq!(*first.lock(), vec![StreamItem::Event(Event::buffering(5))]);
    assert_eq!(*second.lock(), vec![StreamItem::Event(Event::buffering(6))]);
}

#[test]
fn test_relay_end_of_stream_blocks_later_events() {
    let relay = EventRelay::new();
    relay.signal_end_of_stream();
    relay.enqueue(Event::Completed);

    let (seen, sink) = collector();
    relay.attach(sink);

    // Only the marker enqueued before the flag was set reaches a late consumer
    assert_eq!(*seen.lock(), vec![StreamItem::EndOfStream]);
    relay.enqueue(Event::buffering(1));
    assert_eq!(seen.lock().len(), 1);
    assert_eq!(relay.pending_len(), 0);
}

// =============================================================================
// Source Resolver Tests
// =============================================================================

#[test]
fn test_classification_by_path_segment() {
    let resolver = SourceResolver::default();

    let hls = resolver.resolve("clip.m3u8", None).unwrap();
    assert_eq!(hls.content_type(), ContentType::Hls);

    let dash = resolver.resolve("clip.mpd", None).unwrap();
    assert_eq!(dash.content_type(), ContentType::Dash);

    let local = resolver.resolve("asset:///clip.mp4", None).unwrap();
    assert_eq!(local.content_type(), ContentType::Progressive);
    assert!(matches!(local.data_access(), DataAccess::Local));

    let unknown = resolver.resolve("https://host/clip.unknownext", None);
    assert!(matches!(unknown, Err(Error::UnsupportedSourceType(_))));
}

#[test]
fn test_networked_sources_use_configured_timeouts() {
    let resolver = SourceResolver::default();
    let source = resolver
        .resolve("https://cdn.example.com/live/master.m3u8?token=abc", None)
        .unwrap();

    match source.data_access() {
        DataAccess::Network(access) => {
            assert_eq!(access.connect_timeout, Duration::from_millis(8_000));
            assert_eq!(access.read_timeout, Duration::from_millis(8_000));
            assert!(access.allow_cross_protocol_redirects);
        }
        DataAccess::Local => panic!("expected networked data access"),
    }
}

// =============================================================================
// Session Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_create_configures_engine() {
    let h = harness();
    let id = h
        .registry
        .create(CreateOptions::uri("https://cdn.example.com/v.mpd").with_looping(true).with_volume(0.4))
        .await
        .unwrap();

    assert_eq!(id, SessionId(1));
    assert_eq!(h.registry.lookup(id).await.unwrap().state(), PlayerState::Preparing);
    assert_eq!(
        h.engines.calls(0),
        vec!["attach(1)", "looping(true)", "volume(0.40)", "prepare(dash)"]
    );
}

#[tokio::test]
async fn test_buffering_ready_error_scenario() {
    let h = harness();
    let id = h.registry.create(CreateOptions::uri("clip.m3u8")).await.unwrap();
    let mut rx = listen(&h.registry, id).await;
    let engine = h.engines.events(0);

    engine.buffering(30);
    engine.buffering(60);
    engine.ready(12_000, Some(VideoFormat::new(1920, 1080, 0)));
    engine.failed("decoder crashed");
    engine.buffering(90);
    engine.ended();

    assert_eq!(next_event(&mut rx).await, Event::buffering(30));
    assert_eq!(next_event(&mut rx).await, Event::buffering(60));
    assert_eq!(
        next_event(&mut rx).await,
        Event::Initialized {
            duration_ms: 12_000,
            width: Some(1920),
            height: Some(1080)
        }
    );
    match next_event(&mut rx).await {
        Event::Error { code, message, .. } => {
            assert_eq!(code, "VideoError");
            assert_eq!(message, "Video player had error: decoder crashed");
        }
        other => panic!("expected error event, got {other:?}"),
    }

    let session = h.registry.lookup(id).await.unwrap();
    assert_eq!(session.state(), PlayerState::Error);

    // Session stays resident until disposed; the stream ends with nothing after the error
    h.registry.dispose(id).await.unwrap();
    assert_eq!(next_item(&mut rx).await, StreamItem::EndOfStream);
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_initialized_emitted_once() {
    let h = harness();
    let id = h.registry.create(CreateOptions::uri("clip.mp4")).await.unwrap();
    let mut rx = listen(&h.registry, id).await;
    let engine = h.engines.events(0);

    engine.ready(1_000, None);
    engine.ready(1_000, None);
    engine.ready(2_000, None);
    engine.buffering(100);

    assert_eq!(
        next_event(&mut rx).await,
        Event::Initialized {
            duration_ms: 1_000,
            width: None,
            height: None
        }
    );
    assert_eq!(next_event(&mut rx).await, Event::buffering(100));
    assert!(h.registry.lookup(id).await.unwrap().is_initialized());
}

#[tokio::test]
async fn test_rotated_video_reports_display_size() {
    let h = harness();
    let id = h.registry.create(CreateOptions::uri("portrait.mp4")).await.unwrap();
    let mut rx = listen(&h.registry, id).await;

    h.engines.events(0).ready(3_000, Some(VideoFormat::new(1920, 1080, 270)));

    assert_eq!(
        next_event(&mut rx).await,
        Event::Initialized {
            duration_ms: 3_000,
            width: Some(1080),
            height: Some(1920)
        }
    );
}

#[tokio::test]
async fn test_events_buffer_until_listener_attaches() {
    let h = harness();
    let id = h.registry.create(CreateOptions::uri("clip.mp4")).await.unwrap();
    let engine = h.engines.events(0);
    engine.buffering(40);
    engine.ready(500, None);

    // Wait for the pump to fold both callbacks before subscribing
    let session = h.registry.lookup(id).await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), async {
        while session.state() != PlayerState::Ready {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    let mut rx = listen(&h.registry, id).await;
    assert_eq!(next_event(&mut rx).await, Event::buffering(40));
    assert!(matches!(next_event(&mut rx).await, Event::Initialized { .. }));
}

#[tokio::test]
async fn test_transport_rejected_while_preparing() {
    let h = harness();
    let id = h.registry.create(CreateOptions::uri("clip.mp4")).await.unwrap();
    let session = h.registry.lookup(id).await.unwrap();

    assert!(matches!(session.play(), Err(Error::NotReady { .. })));
    assert!(matches!(session.pause(), Err(Error::NotReady { .. })));
    assert!(matches!(session.seek_to(100), Err(Error::NotReady { .. })));
    assert!(matches!(session.position_ms(), Err(Error::NotReady { .. })));
    // Looping and volume are always accepted
    session.set_looping(true).unwrap();
    session.set_volume(0.5).unwrap();

    let mut rx = listen(&h.registry, id).await;
    h.engines.events(0).ready(9_000, None);
    next_event(&mut rx).await;

    session.play().unwrap();
    assert_eq!(session.state(), PlayerState::Playing);
    session.pause().unwrap();
    assert_eq!(session.state(), PlayerState::Paused);
    session.seek_to(1_234).unwrap();
    assert_eq!(session.position_ms().unwrap(), 4_200);

    let calls = h.engines.calls(0);
    assert!(calls.ends_with(&[
        "play_when_ready(true)".to_string(),
        "play_when_ready(false)".to_string(),
        "seek(1234)".to_string(),
    ]));
}

#[tokio::test]
async fn test_transport_rejected_after_error() {
    let h = harness();
    let id = h.registry.create(CreateOptions::uri("clip.mp4")).await.unwrap();
    let mut rx = listen(&h.registry, id).await;
    h.engines.events(0).failed("no codec");
    next_event(&mut rx).await;

    let session = h.registry.lookup(id).await.unwrap();
    assert!(matches!(
        session.play(),
        Err(Error::InvalidStateTransition {
            from: PlayerState::Error,
            ..
        })
    ));
    assert!(matches!(
        session.seek_to(500),
        Err(Error::InvalidOperation {
            operation: "seekTo",
            state: PlayerState::Error
        })
    ));
    let err = session.position_ms().unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidOperation {
            operation: "position",
            state: PlayerState::Error
        }
    ));
    assert_eq!(err.error_code(), "INVALID_STATE");
    session.set_volume(0.1).unwrap();
}

#[tokio::test]
async fn test_volume_is_clamped() {
    let h = harness();
    let id = h.registry.create(CreateOptions::uri("clip.mp4")).await.unwrap();
    let session = h.registry.lookup(id).await.unwrap();

    session.set_volume(-0.5).unwrap();
    assert_eq!(session.volume(), 0.0);
    session.set_volume(1.7).unwrap();
    assert_eq!(session.volume(), 1.0);

    let calls = h.engines.calls(0);
    assert!(calls.ends_with(&["volume(0.00)".to_string(), "volume(1.00)".to_string()]));
}

#[tokio::test]
async fn test_looping_suppresses_completion() {
    let h = harness();
    let id = h
        .registry
        .create(CreateOptions::uri("clip.mp4").with_looping(true))
        .await
        .unwrap();
    let mut rx = listen(&h.registry, id).await;
    let engine = h.engines.events(0);
    let session = h.registry.lookup(id).await.unwrap();

    engine.ready(800, None);
    next_event(&mut rx).await;
    session.play().unwrap();

    engine.ended();
    engine.buffering(100);
    assert_eq!(next_event(&mut rx).await, Event::buffering(100));
    assert_eq!(session.state(), PlayerState::Playing);
}

#[tokio::test]
async fn test_completion_without_looping() {
    let h = harness();
    let id = h.registry.create(CreateOptions::uri("clip.mp4")).await.unwrap();
    let mut rx = listen(&h.registry, id).await;
    let engine = h.engines.events(0);
    let session = h.registry.lookup(id).await.unwrap();

    engine.ready(800, None);
    next_event(&mut rx).await;
    session.play().unwrap();
    engine.ended();

    assert_eq!(next_event(&mut rx).await, Event::Completed);
    assert_eq!(session.state(), PlayerState::Completed);

    // Replay from the start
    session.seek_to(0).unwrap();
    assert_eq!(session.state(), PlayerState::Paused);
    session.play().unwrap();
    assert_eq!(session.state(), PlayerState::Playing);
    engine.ended();
    assert_eq!(next_event(&mut rx).await, Event::Completed);
}

#[tokio::test]
async fn test_completed_is_the_only_terminal_event() {
    let h = harness();
    let id = h.registry.create(CreateOptions::uri("clip.mp4")).await.unwrap();
    let mut rx = listen(&h.registry, id).await;
    let engine = h.engines.events(0);
    let session = h.registry.lookup(id).await.unwrap();

    engine.ready(800, None);
    next_event(&mut rx).await;
    session.play().unwrap();

    engine.ended();
    engine.ended();
    engine.failed("late");
    engine.buffering(100);

    assert_eq!(next_event(&mut rx).await, Event::Completed);
    // Buffering still flows; the repeated end and the late failure do not
    assert_eq!(next_event(&mut rx).await, Event::buffering(100));
    assert_eq!(session.state(), PlayerState::Completed);

    h.registry.dispose(id).await.unwrap();
    assert_eq!(next_item(&mut rx).await, StreamItem::EndOfStream);
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_end_before_ready_is_ignored() {
    let h = harness();
    let id = h.registry.create(CreateOptions::uri("clip.mp4")).await.unwrap();
    let mut rx = listen(&h.registry, id).await;
    let engine = h.engines.events(0);

    engine.ended();
    engine.ready(800, None);

    assert!(matches!(next_event(&mut rx).await, Event::Initialized { .. }));
    assert_eq!(h.registry.lookup(id).await.unwrap().state(), PlayerState::Ready);
}

// =============================================================================
// Disposal Tests
// =============================================================================

#[tokio::test]
async fn test_dispose_twice_releases_once() {
    let h = harness();
    let id = h.registry.create(CreateOptions::uri("clip.mp4")).await.unwrap();
    let mut rx = listen(&h.registry, id).await;
    h.engines.events(0).ready(800, None);
    next_event(&mut rx).await;

    let session = h.registry.lookup(id).await.unwrap();
    session.dispose();
    session.dispose();

    assert!(session.is_disposed());
    assert_eq!(session.state(), PlayerState::Disposed);
    assert_eq!(h.targets.released(), 1);
    let calls = h.engines.calls(0);
    assert_eq!(calls.iter().filter(|c| *c == "stop").count(), 1);
    assert_eq!(calls.iter().filter(|c| *c == "release").count(), 1);
    assert_eq!(next_item(&mut rx).await, StreamItem::EndOfStream);

    assert!(matches!(session.play(), Err(Error::Disposed(_))));
    assert!(matches!(session.set_volume(0.5), Err(Error::Disposed(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ready_racing_dispose() {
    for _ in 0..200 {
        let h = harness();
        let id = h.registry.create(CreateOptions::uri("clip.mp4")).await.unwrap();
        let mut rx = listen(&h.registry, id).await;
        let session = h.registry.lookup(id).await.unwrap();
        let engine = h.engines.events(0);

        let readies = tokio::spawn(async move {
            for _ in 0..16 {
                engine.ready(1_000, None);
                tokio::task::yield_now().await;
            }
        });
        let disposers: Vec<_> = (0..2)
            .map(|_| {
                let session = session.clone();
                tokio::spawn(async move { session.dispose() })
            })
            .collect();
        readies.await.unwrap();
        for disposer in disposers {
            disposer.await.unwrap();
        }

        let mut items = Vec::new();
        while let Some(item) = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for stream end")
        {
            items.push(item);
        }

        let initialized = items
            .iter()
            .filter(|item| matches!(item, StreamItem::Event(Event::Initialized { .. })))
            .count();
        assert!(initialized <= 1, "initialized sent {initialized} times");
        assert_eq!(items.last(), Some(&StreamItem::EndOfStream));
        assert_eq!(items.iter().filter(|item| **item == StreamItem::EndOfStream).count(), 1);

        let calls = h.engines.calls(0);
        assert_eq!(calls.iter().filter(|c| *c == "release").count(), 1);
        assert!(calls.iter().filter(|c| *c == "stop").count() <= 1);
        assert_eq!(h.targets.released(), 1);
        assert_eq!(session.state(), PlayerState::Disposed);
    }
}

#[tokio::test]
async fn test_dispose_before_ready_skips_stop() {
    let h = harness();
    let id = h.registry.create(CreateOptions::uri("clip.mp4")).await.unwrap();
    h.registry.dispose(id).await.unwrap();

    let calls = h.engines.calls(0);
    assert!(!calls.contains(&"stop".to_string()));
    assert_eq!(calls.last().map(String::as_str), Some("release"));
    assert!(matches!(
        h.registry.dispose(id).await,
        Err(Error::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn test_teardown_continues_past_panicking_session() {
    let h = harness();
    h.registry.create(CreateOptions::uri("a.mp4")).await.unwrap();
    h.engines.arm_release_panic();
    let exploding = h.registry.create(CreateOptions::uri("b.mp4")).await.unwrap();
    let exploding = h.registry.lookup(exploding).await.unwrap();
    h.registry.create(CreateOptions::uri("c.mp4")).await.unwrap();

    assert_eq!(h.registry.teardown_all().await, 3);
    assert!(h.registry.is_empty().await);
    assert_eq!(h.targets.released(), 3);
    for index in 0..3 {
        assert!(h.engines.calls(index).contains(&"release".to_string()));
    }
    // The panic in release still leaves the session marked disposed
    assert_eq!(exploding.state(), PlayerState::Disposed);
    assert!(matches!(exploding.play(), Err(Error::Disposed(_))));
}

#[tokio::test]
async fn test_unsupported_source_registers_nothing() {
    let h = harness();
    let result = h
        .registry
        .create(CreateOptions::uri("https://host/clip.unknownext"))
        .await;

    assert!(matches!(result, Err(Error::UnsupportedSourceType(_))));
    assert!(h.registry.is_empty().await);
    assert_eq!(h.engines.created(), 0);
    assert_eq!(h.targets.released(), 1);
}

#[tokio::test]
async fn test_format_hint_overrides_extension() {
    let h = harness();
    h.registry
        .create(CreateOptions::uri("https://host/live/stream").with_hint(ContentType::Hls))
        .await
        .unwrap();
    assert_eq!(h.engines.calls(0).last().map(String::as_str), Some("prepare(hls)"));
}

// =============================================================================
// Command Surface Tests
// =============================================================================

#[tokio::test]
async fn test_command_round_trip() {
    let h = harness();
    let created = dispatch(
        &h.registry,
        MethodCall::new("create", json!({"asset": "videos/intro.mp4", "looping": false})),
    )
    .await
    .unwrap();
    assert_eq!(created, json!({"textureId": 1, "eventChannel": "playbridge/videoEvents1"}));

    let mut rx = listen(&h.registry, SessionId(1)).await;
    h.engines.events(0).ready(5_000, None);
    next_event(&mut rx).await;

    for (method, args) in [
        ("play", json!({"textureId": 1})),
        ("setVolume", json!({"textureId": 1, "volume": 0.25})),
        ("setLooping", json!({"textureId": 1, "looping": true})),
        ("seekTo", json!({"textureId": 1, "location": 2500})),
        ("pause", json!({"textureId": 1})),
    ] {
        let result = dispatch(&h.registry, MethodCall::new(method, args)).await;
        assert_eq!(result, Ok(serde_json::Value::Null), "{method}");
    }

    let position = dispatch(&h.registry, MethodCall::new("position", json!({"textureId": 1})))
        .await
        .unwrap();
    assert_eq!(position, json!(4_200));

    dispatch(&h.registry, MethodCall::new("dispose", json!({"textureId": 1})))
        .await
        .unwrap();
    assert!(h.registry.is_empty().await);
}

#[tokio::test]
async fn test_command_errors() {
    let h = harness();

    let err = dispatch(&h.registry, MethodCall::new("play", json!({"textureId": 42})))
        .await
        .unwrap_err();
    assert_eq!(err.code, "SESSION_NOT_FOUND");
    assert_eq!(err.message, "No video player associated with texture id 42");

    let err = dispatch(&h.registry, MethodCall::new("play", json!({})))
        .await
        .unwrap_err();
    assert_eq!(err.code, "CONFIGURATION_ERROR");

    let err = dispatch(&h.registry, MethodCall::new("create", json!({"looping": true})))
        .await
        .unwrap_err();
    assert_eq!(err.code, "CONFIGURATION_ERROR");
    assert_eq!(h.targets.released(), 0);

    let err = dispatch(&h.registry, MethodCall::new("create", json!({"uri": "movie.xyz"})))
        .await
        .unwrap_err();
    assert_eq!(err.code, "UNSUPPORTED_SOURCE_TYPE");

    let err = dispatch(&h.registry, MethodCall::new("rewind", json!({"textureId": 1})))
        .await
        .unwrap_err();
    assert_eq!(err.code, "NOT_IMPLEMENTED");

    dispatch(&h.registry, MethodCall::new("create", json!({"uri": "clip.mp4"})))
        .await
        .unwrap();
    let err = dispatch(&h.registry, MethodCall::new("play", json!({"textureId": 2})))
        .await
        .unwrap_err();
    assert_eq!(err.code, "NOT_READY");
}

#[tokio::test]
async fn test_init_disposes_everything() {
    let h = harness();
    for uri in ["a.mp4", "b.m3u8"] {
        dispatch(&h.registry, MethodCall::new("create", json!({ "uri": uri })))
            .await
            .unwrap();
    }
    assert_eq!(h.registry.ids().await, vec![SessionId(1), SessionId(2)]);

    dispatch(&h.registry, MethodCall::new("init", serde_json::Value::Null))
        .await
        .unwrap();
    assert!(h.registry.is_empty().await);
    assert_eq!(h.targets.released(), 2);
}

// =============================================================================
// Simulated Engine Tests
// =============================================================================

#[tokio::test]
async fn test_simulated_engine_end_to_end() {
    use playbridge_core::engine::{SimulatedEngineFactory, SimulatedMedia};
    use playbridge_core::SequentialAllocator;

    let media = SimulatedMedia {
        duration_ms: 40,
        video: Some(VideoFormat::new(1280, 720, 90)),
        buffering_steps: vec![50, 100],
        step_interval: Duration::from_millis(1),
        fail_after: None,
    };
    let registry = SessionRegistry::new(
        BridgeConfig::default(),
        Arc::new(SequentialAllocator::new()),
        Arc::new(SimulatedEngineFactory::new(media)),
    );

    let id = registry
        .create(CreateOptions::asset("intro.mp4", Some("demo".into())))
        .await
        .unwrap();
    let session = registry.lookup(id).await.unwrap();
    assert!(matches!(session.source().data_access(), DataAccess::Local));
    assert_eq!(
        session.source().locator().as_str(),
        "asset:///assets/packages/demo/intro.mp4"
    );

    let mut rx = listen(&registry, id).await;
    assert_eq!(next_event(&mut rx).await, Event::buffering(50));
    assert_eq!(next_event(&mut rx).await, Event::buffering(100));
    assert_eq!(
        next_event(&mut rx).await,
        Event::Initialized {
            duration_ms: 40,
            width: Some(720),
            height: Some(1280)
        }
    );

    session.play().unwrap();
    assert_eq!(next_event(&mut rx).await, Event::Completed);

    registry.dispose(id).await.unwrap();
    assert_eq!(next_item(&mut rx).await, StreamItem::EndOfStream);
}
