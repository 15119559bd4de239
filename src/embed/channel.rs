//! Cross-context message channel.
//!
//! Stands in for the page's `message` event target: listeners register,
//! get an unbounded receiver, and every posted message is fanned out to
//! all of them in posting order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use super::message::InboundMessage;

/// Identifies a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Fan-out channel for inbound messages.
#[derive(Debug, Default)]
pub struct MessageBus {
    listeners: Mutex<HashMap<ListenerId, mpsc::UnboundedSender<InboundMessage>>>,
    next_id: AtomicU64,
}

impl MessageBus {
    /// Create a bus with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    ///
    /// The receiver yields every message posted after registration and
    /// ends once the listener is removed.
    pub fn add_listener(&self) -> (ListenerId, mpsc::UnboundedReceiver<InboundMessage>) {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, tx);
        (id, rx)
    }

    /// Deregister a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)
            .is_some()
    }

    /// Deliver `message` to every listener, returning how many received it.
    ///
    /// Listeners whose receiver has been dropped are pruned.
    pub fn post(&self, message: InboundMessage) -> usize {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners.retain(|_, tx| tx.send(message.clone()).is_ok());
        trace!(origin = %message.origin, delivered = listeners.len(), "Posted message");
        listeners.len()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::EmbedAction;

    const HOST: &str = "https://labs.heygen.com";

    #[tokio::test]
    async fn test_post_reaches_every_listener() {
        let bus = MessageBus::new();
        let (_a, mut rx_a) = bus.add_listener();
        let (_b, mut rx_b) = bus.add_listener();

        let delivered = bus.post(InboundMessage::embed(HOST, EmbedAction::Show));
        assert_eq!(delivered, 2);
        assert_eq!(
            rx_a.recv().await.unwrap().embed_action(),
            Some(EmbedAction::Show)
        );
        assert_eq!(
            rx_b.recv().await.unwrap().embed_action(),
            Some(EmbedAction::Show)
        );
    }

    #[tokio::test]
    async fn test_removed_listener_stream_ends() {
        let bus = MessageBus::new();
        let (id, mut rx) = bus.add_listener();
        assert!(bus.remove_listener(id));
        assert!(!bus.remove_listener(id));
        assert_eq!(bus.post(InboundMessage::embed(HOST, EmbedAction::Hide)), 0);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let bus = MessageBus::new();
        let (_id, rx) = bus.add_listener();
        drop(rx);
        assert_eq!(bus.post(InboundMessage::embed(HOST, EmbedAction::Init)), 0);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_listener_registers_after_poisoned_lock() {
        let bus = std::sync::Arc::new(MessageBus::new());
        let poisoner = bus.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.listeners.lock().unwrap();
            panic!("listener panicked");
        })
        .join();
        assert!(bus.listeners.is_poisoned());

        let (id, mut rx) = bus.add_listener();
        assert_eq!(bus.listener_count(), 1);
        assert_eq!(bus.post(InboundMessage::embed(HOST, EmbedAction::Show)), 1);
        assert!(rx.try_recv().is_ok());
        assert!(bus.remove_listener(id));
    }
}
