//! Transport handles
//!
//! A [`ClientHandle`] is the relay's reference to one live connection. The
//! connection task owns the socket; the registry and rooms only hold
//! `Arc<ClientHandle>` clones and push serialized frames into its bounded
//! outbound queue.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Notify};

/// Serialized outbound frame, shared between all recipients of a fan-out
pub type OutboundFrame = Arc<str>;

/// Unique ID of a connection for the lifetime of the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub u64);

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of pushing a frame into a handle's queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Frame queued for the writer
    Queued,
    /// Queue full; the frame was dropped
    Dropped,
    /// Connection already closed
    Closed,
}

/// Reference to one live bidirectional connection
///
/// Equality and hashing use the [`HandleId`] only.
#[derive(Debug)]
pub struct ClientHandle {
    id: HandleId,
    tx: mpsc::Sender<OutboundFrame>,
    closed: AtomicBool,
    close_requested: Notify,
    drops: AtomicU64,
}

impl ClientHandle {
    /// Create a handle that writes into `tx`
    pub fn new(id: HandleId, tx: mpsc::Sender<OutboundFrame>) -> Self {
        Self {
            id,
            tx,
            closed: AtomicBool::new(false),
            close_requested: Notify::new(),
            drops: AtomicU64::new(0),
        }
    }

    /// Create a handle together with the receiving end of its queue
    pub fn channel(id: u64, capacity: usize) -> (Arc<Self>, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Arc::new(Self::new(HandleId(id), tx)), rx)
    }

    /// Connection ID
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Queue a frame without waiting
    ///
    /// A full queue drops the new frame; the sender is never blocked by a
    /// slow reader.
    pub fn send(&self, frame: OutboundFrame) -> SendOutcome {
        if self.is_closed() {
            return SendOutcome::Closed;
        }

        match self.tx.try_send(frame) {
            Ok(()) => SendOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.drops.fetch_add(1, Ordering::Relaxed);
                SendOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }

    /// Number of frames dropped because the queue was full
    pub fn drop_count(&self) -> u64 {
        self.drops.load(Ordering::Relaxed)
    }

    /// Mark the handle closed
    ///
    /// Returns `true` only for the call that performed the transition, so
    /// cleanup driven by it runs once.
    pub fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    /// Whether the connection has closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.tx.is_closed()
    }

    /// Ask the owning connection task to shut the connection down
    pub fn request_close(&self) {
        self.close_requested.notify_one();
    }

    /// Resolves once [`request_close`](Self::request_close) has been called
    pub async fn close_requested(&self) {
        self.close_requested.notified().await;
    }
}

impl PartialEq for ClientHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ClientHandle {}

impl Hash for ClientHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_and_receive() {
        let (handle, mut rx) = ClientHandle::channel(1, 4);

        assert_eq!(handle.send(Arc::from("hello")), SendOutcome::Queued);
        assert_eq!(&*rx.recv().await.unwrap(), "hello");
    }

    #[test]
    fn test_full_queue_drops_new_frames() {
        let (handle, mut rx) = ClientHandle::channel(1, 2);

        assert_eq!(handle.send(Arc::from("a")), SendOutcome::Queued);
        assert_eq!(handle.send(Arc::from("b")), SendOutcome::Queued);
        assert_eq!(handle.send(Arc::from("c")), SendOutcome::Dropped);
        assert_eq!(handle.drop_count(), 1);

        // Oldest frames survive
        assert_eq!(&*rx.try_recv().unwrap(), "a");
        assert_eq!(&*rx.try_recv().unwrap(), "b");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_handle_rejects_frames() {
        let (handle, rx) = ClientHandle::channel(1, 2);
        drop(rx);

        assert!(handle.is_closed());
        assert_eq!(handle.send(Arc::from("a")), SendOutcome::Closed);
    }

    #[test]
    fn test_mark_closed_once() {
        let (handle, _rx) = ClientHandle::channel(7, 2);

        assert!(handle.mark_closed());
        assert!(!handle.mark_closed());
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn test_close_request_is_remembered() {
        let (handle, _rx) = ClientHandle::channel(1, 2);

        handle.request_close();
        // Permit stored even though nobody was waiting yet
        handle.close_requested().await;
    }

    #[test]
    fn test_equality_by_id() {
        let (a, _rx_a) = ClientHandle::channel(3, 1);
        let (b, _rx_b) = ClientHandle::channel(3, 1);
        let (c, _rx_c) = ClientHandle::channel(4, 1);

        assert_eq!(*a, *b);
        assert_ne!(*a, *c);
    }
}
