//! Event stream primitives
//!
//! Agents return an [`EventStream`]: a lazy, single-consumer stream of
//! events. Producers that run on their own task (parallel branches) feed a
//! bounded channel through an [`EventSender`]; every receive point uses
//! [`next_event`] so cancellation unwinds it promptly.

use crate::context::InvocationContext;
use crate::event::Event;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

/// Lazy stream of events produced by one agent run
pub type EventStream = BoxStream<'static, Event>;

/// Relay queue depth; one event in flight per producer
pub const EVENT_CHANNEL_CAPACITY: usize = 1;

/// An empty stream
pub fn empty_stream() -> EventStream {
    futures::stream::empty().boxed()
}

/// Producing half of an event relay
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
    cancellation: CancellationToken,
}

impl EventSender {
    /// Send one event, waiting for queue space
    ///
    /// Returns `false` when the consumer is gone or the invocation was
    /// cancelled; the producer should stop.
    pub async fn send(&self, event: Event) -> bool {
        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => false,
            sent = self.tx.send(event) => sent.is_ok(),
        }
    }

    /// Whether the consuming half has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Create a bounded relay bound to the context's cancellation token
pub fn event_channel(ctx: &InvocationContext) -> (EventSender, EventStream) {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let sender = EventSender {
        tx,
        cancellation: ctx.cancellation_token().clone(),
    };
    (sender, ReceiverStream::new(rx).boxed())
}

/// Receive the next event unless the invocation is cancelled first
///
/// Returns `None` when the stream is exhausted or on cancellation.
pub async fn next_event(stream: &mut EventStream, ctx: &InvocationContext) -> Option<Event> {
    tokio::select! {
        biased;
        () = ctx.cancelled() => None,
        event = stream.next() => event,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Session, SessionKey};
    use std::sync::Arc;

    fn ctx() -> InvocationContext {
        InvocationContext::new(Arc::new(Session::new(SessionKey::new("app", "u", "s"))))
    }

    #[tokio::test]
    async fn test_channel_relays_in_order() {
        let ctx = ctx();
        let (tx, mut rx) = event_channel(&ctx);

        let producer = tokio::spawn(async move {
            for i in 0..3 {
                assert!(tx.send(Event::with_id(format!("e{i}"), "agent")).await);
            }
        });

        let mut ids = Vec::new();
        while let Some(event) = next_event(&mut rx, &ctx).await {
            ids.push(event.id);
        }
        producer.await.unwrap();
        assert_eq!(ids, vec!["e0", "e1", "e2"]);
    }

    #[tokio::test]
    async fn test_send_fails_after_consumer_dropped() {
        let ctx = ctx();
        let (tx, rx) = event_channel(&ctx);
        drop(rx);
        assert!(tx.is_closed());
        assert!(!tx.send(Event::new("agent")).await);
    }

    #[tokio::test]
    async fn test_cancellation_unblocks_receive_and_send() {
        let ctx = ctx();
        let (tx, mut rx) = event_channel(&ctx);

        // Fill the single slot so the next send has to wait
        assert!(tx.send(Event::new("agent")).await);
        ctx.cancel();

        assert!(!tx.send(Event::new("agent")).await);
        assert!(next_event(&mut rx, &ctx).await.is_none());
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let ctx = ctx();
        let mut stream = empty_stream();
        assert!(next_event(&mut stream, &ctx).await.is_none());
    }
}
