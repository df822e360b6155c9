//! Buffered, reattachable event relay
//!
//! Engine callbacks can fire before the host has subscribed to a session's
//! event stream. The relay keeps those events in arrival order and hands
//! them to whichever consumer attaches next. Every mutation and every flush
//! runs under one lock per relay instance, so a flush never interleaves with
//! a concurrent enqueue.

use crate::{
    types::{Event, StreamItem},
    Error, Result,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Consumer of a session's event stream.
///
/// `deliver` runs while the relay lock is held and must not call back into
/// the same relay.
pub trait EventSink: Send + Sync {
    fn deliver(&self, item: StreamItem) -> Result<()>;
}

impl<F> EventSink for F
where
    F: Fn(StreamItem) + Send + Sync,
{
    fn deliver(&self, item: StreamItem) -> Result<()> {
        self(item);
        Ok(())
    }
}

/// Sink forwarding into an unbounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<StreamItem>,
}

impl ChannelSink {
    /// Create a sink together with the receiving half
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StreamItem>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn deliver(&self, item: StreamItem) -> Result<()> {
        self.tx
            .send(item)
            .map_err(|_| Error::Delivery("event receiver dropped".to_string()))
    }
}

#[derive(Default)]
struct RelayInner {
    pending: Vec<StreamItem>,
    consumer: Option<Arc<dyn EventSink>>,
    done: bool,
}

impl RelayInner {
    fn flush(&mut self) {
        let Some(consumer) = self.consumer.clone() else {
            return;
        };
        for item in self.pending.drain(..) {
            // One attempt per item; failures are not retried
            if let Err(e) = consumer.deliver(item) {
                warn!(error = %e, "Dropping undeliverable event");
            }
        }
    }
}

/// Per-session buffered event sink
#[derive(Default)]
pub struct EventRelay {
    inner: Mutex<RelayInner>,
}

impl EventRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and deliver it if a consumer is attached.
    /// Dropped silently once the stream has ended.
    pub fn enqueue(&self, event: Event) {
        let mut inner = self.inner.lock();
        if inner.done {
            debug!(event = event.name(), "Relay closed, dropping event");
            return;
        }
        inner.pending.push(StreamItem::Event(event));
        inner.flush();
    }

    /// Install a consumer and hand it everything pending, in arrival order
    pub fn attach(&self, consumer: Arc<dyn EventSink>) {
        let mut inner = self.inner.lock();
        inner.consumer = Some(consumer);
        inner.flush();
    }

    /// Remove the consumer; later events accumulate until the next attach
    pub fn detach(&self) {
        self.inner.lock().consumer = None;
    }

    /// Enqueue the terminal marker, flush, then stop accepting events.
    ///
    /// A consumer attached before the call receives the marker; nothing
    /// enqueued afterwards is ever delivered.
    pub fn signal_end_of_stream(&self) {
        let mut inner = self.inner.lock();
        if inner.done {
            return;
        }
        inner.pending.push(StreamItem::EndOfStream);
        inner.flush();
        inner.done = true;
    }

    /// End the stream and drop the consumer along with anything still pending
    pub fn close(&self) {
        self.signal_end_of_stream();
        let mut inner = self.inner.lock();
        inner.consumer = None;
        inner.pending.clear();
    }

    pub fn is_attached(&self) -> bool {
        self.inner.lock().consumer.is_some()
    }

    pub fn is_done(&self) -> bool {
        self.inner.lock().done
    }

    /// Number of items waiting for a consumer
    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }
}

impl std::fmt::Debug for EventRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("EventRelay")
            .field("pending", &inner.pending.len())
            .field("attached", &inner.consumer.is_some())
            .field("done", &inner.done)
            .finish()
    }
}
