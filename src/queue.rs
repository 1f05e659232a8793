//! # Bounded Message Queue
//!
//! Fixed-capacity FIFO shared by many producers and many consumers. Built on
//! `tokio::sync::mpsc`: senders are cloned per producer and the single receiver is
//! shared behind an async mutex, so each message is handed to exactly one consumer.
//!
//! The queue closes when the last [`QueueSender`] is dropped. A receiver then drains
//! what is left and `recv` returns `None`, which is the consumers' termination signal.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use crate::message::Message;

/// Constructor for a connected sender/receiver pair
pub struct MessageQueue;

impl MessageQueue {
    /// Create a queue holding at most `capacity` messages.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; `PipelineConfig::validate` rejects that value.
    pub fn bounded(capacity: usize) -> (QueueSender, QueueReceiver) {
        let (sender, receiver) = mpsc::channel(capacity);
        let depth = Arc::new(AtomicUsize::new(0));

        (
            QueueSender {
                inner: sender,
                depth: Arc::clone(&depth),
            },
            QueueReceiver {
                inner: Arc::new(Mutex::new(receiver)),
                depth,
                capacity,
            },
        )
    }
}

/// Producer side of the queue. Cloneable; the queue stays open while any clone lives.
#[derive(Debug, Clone)]
pub struct QueueSender {
    inner: mpsc::Sender<Message>,
    depth: Arc<AtomicUsize>,
}

impl QueueSender {
    /// Wait for a free slot. Returns `None` once every receiver has been dropped.
    ///
    /// The wait is cancel-safe: dropping the future gives up the place in line
    /// without consuming capacity.
    pub async fn reserve(&self) -> Option<SendSlot<'_>> {
        let permit = self.inner.reserve().await.ok()?;
        Some(SendSlot {
            permit,
            depth: &self.depth,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// A reserved place in the queue; sending through it cannot fail or block
pub struct SendSlot<'a> {
    permit: mpsc::Permit<'a, Message>,
    depth: &'a AtomicUsize,
}

impl SendSlot<'_> {
    pub fn send(self, message: Message) {
        self.depth.fetch_add(1, Ordering::AcqRel);
        self.permit.send(message);
    }
}

/// Consumer side of the queue. Cloneable; clones compete for the same messages.
#[derive(Debug, Clone)]
pub struct QueueReceiver {
    inner: Arc<Mutex<mpsc::Receiver<Message>>>,
    depth: Arc<AtomicUsize>,
    capacity: usize,
}

impl QueueReceiver {
    /// Take the next message, waiting if the queue is empty.
    ///
    /// Returns `None` only when all senders are gone and the queue is drained.
    /// Cancel-safe: a dropped call never loses a message.
    pub async fn recv(&self) -> Option<Message> {
        let mut receiver = self.inner.lock().await;
        let message = receiver.recv().await?;
        self.depth.fetch_sub(1, Ordering::AcqRel);
        Some(message)
    }

    /// Messages currently buffered
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready};

    #[tokio::test]
    async fn test_fifo_and_depth_tracking() {
        let (sender, receiver) = MessageQueue::bounded(4);
        let first = Message::with_id("first");
        let second = Message::with_id("second");

        sender.reserve().await.unwrap().send(first.clone());
        sender.reserve().await.unwrap().send(second.clone());
        assert_eq!(receiver.len(), 2);
        assert_eq!(receiver.capacity(), 4);

        assert_eq!(receiver.recv().await.unwrap().id, "first");
        assert_eq!(receiver.recv().await.unwrap().id, "second");
        assert!(receiver.is_empty());
    }

    #[tokio::test]
    async fn test_closes_after_last_sender_dropped_and_drained() {
        let (sender, receiver) = MessageQueue::bounded(2);
        let other = sender.clone();

        sender.reserve().await.unwrap().send(Message::with_id("a"));
        drop(sender);
        other.reserve().await.unwrap().send(Message::with_id("b"));
        drop(other);

        assert!(receiver.recv().await.is_some());
        assert!(receiver.recv().await.is_some());
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_full_queue_applies_backpressure() {
        let (sender, receiver) = MessageQueue::bounded(1);
        sender.reserve().await.unwrap().send(Message::with_id("a"));

        let blocked = tokio::time::timeout(Duration::from_millis(50), sender.reserve()).await;
        assert!(blocked.is_err(), "reserve should wait while the queue is full");

        receiver.recv().await.unwrap();
        let slot = tokio::time::timeout(Duration::from_millis(50), sender.reserve()).await;
        assert!(matches!(slot, Ok(Some(_))));
    }

    #[tokio::test]
    async fn test_reserve_fails_when_receivers_dropped() {
        let (sender, receiver) = MessageQueue::bounded(1);
        drop(receiver);
        assert!(sender.is_closed());
        assert!(sender.reserve().await.is_none());
    }

    #[tokio::test]
    async fn test_cloned_receivers_share_messages() {
        let (sender, receiver) = MessageQueue::bounded(8);
        let other = receiver.clone();
        for i in 0..4 {
            sender.reserve().await.unwrap().send(Message::with_id(format!("m{i}")));
        }
        drop(sender);

        let mut seen = Vec::new();
        while let Some(message) = receiver.recv().await {
            seen.push(message.id);
            if let Some(message) = other.recv().await {
                seen.push(message.id);
            }
        }
        seen.sort();
        assert_eq!(seen, vec!["m0", "m1", "m2", "m3"]);
    }

    #[test]
    fn test_waiting_receiver_is_woken_by_send() {
        let (sender, receiver) = MessageQueue::bounded(1);
        let mut recv = tokio_test::task::spawn(receiver.recv());
        assert_pending!(recv.poll());

        tokio_test::block_on(sender.reserve())
            .unwrap()
            .send(Message::with_id("wake"));

        assert!(recv.is_woken());
        let message = assert_ready!(recv.poll());
        assert_eq!(message.map(|m| m.id), Some("wake".to_string()));
    }
}
