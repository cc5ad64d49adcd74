//! Notification bus for session status events.
//!
//! Owned by the coordinator. Listeners either take every event or watch a
//! single session key.

use futures::{Stream, StreamExt};
use poolproto::{SessionEvent, SessionKey};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{trace, warn};

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Having no listeners is not an error.
    pub fn publish(&self, event: SessionEvent) {
        trace!(
            session.key = %event.session_key,
            session.state = %event.state,
            "publishing session event"
        );
        let _ = self.tx.send(event);
    }

    /// Every event from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Events for one session key from now on.
    ///
    /// A listener that falls behind skips the lost events rather than ending
    /// the stream.
    pub fn watch(&self, key: SessionKey) -> impl Stream<Item = SessionEvent> + Send + 'static {
        BroadcastStream::new(self.tx.subscribe()).filter_map(move |item| {
            let event = match item {
                Ok(event) if event.session_key == key => Some(event),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(n)) => {
                    warn!(session.key = %key, skipped = n, "session watcher lagged");
                    None
                }
            };
            futures::future::ready(event)
        })
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
