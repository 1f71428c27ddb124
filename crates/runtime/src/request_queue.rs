use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

/// Rejection reason delivered to every waiter when a cycle is cancelled.
pub const CANCEL_REASON: &str = "Cancel local viewport get features";

/// A waiter was rejected because its cycle was invalidated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct Cancelled {
    pub reason: &'static str,
}

impl Cancelled {
    pub fn new() -> Self {
        Self {
            reason: CANCEL_REASON,
        }
    }
}

impl Default for Cancelled {
    fn default() -> Self {
        Self::new()
    }
}

type Entry<T> = oneshot::Sender<Result<T, Cancelled>>;

/// Coalesces concurrent requests for the same computation.
///
/// Entries are settled in FIFO order, exactly once, by either `resolve_queue`
/// or `clear_queue`; both leave the queue empty so later `enqueue` calls start
/// a new cycle. Deciding who runs the computation is up to the owner, which
/// checks `is_queue_empty` before enqueueing.
#[derive(Debug)]
pub struct RequestQueue<T> {
    entries: Vec<Entry<T>>,
}

impl<T> Default for RequestQueue<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: Clone> RequestQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self) -> Pending<T> {
        let (tx, rx) = oneshot::channel();
        self.entries.push(tx);
        Pending { rx }
    }

    /// Delivers `value` to every waiter and empties the queue.
    ///
    /// Returns how many waiters were still listening.
    pub fn resolve_queue(&mut self, value: T) -> usize {
        let mut delivered = 0;
        for tx in self.entries.drain(..) {
            if tx.send(Ok(value.clone())).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Rejects every waiter with [`CANCEL_REASON`] and empties the queue.
    pub fn clear_queue(&mut self) -> usize {
        let mut rejected = 0;
        for tx in self.entries.drain(..) {
            if tx.send(Err(Cancelled::new())).is_ok() {
                rejected += 1;
            }
        }
        rejected
    }

    pub fn is_queue_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Future side of a queue entry.
///
/// Resolves to the broadcast value, or to `Cancelled` if the cycle was
/// cleared or the queue was dropped before settling.
#[derive(Debug)]
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<T, Cancelled>>,
}

impl<T> Future for Pending<T> {
    type Output = Result<T, Cancelled>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Cancelled::new())),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Cancelled, RequestQueue, CANCEL_REASON};

    #[tokio::test]
    async fn resolve_broadcasts_same_payload() {
        let mut q = RequestQueue::new();
        assert!(q.is_queue_empty());
        let waiters: Vec<_> = (0..4).map(|_| q.enqueue()).collect();
        assert_eq!(q.len(), 4);

        assert_eq!(q.resolve_queue(vec![1, 2, 3]), 4);
        assert!(q.is_queue_empty());

        for w in waiters {
            assert_eq!(w.await, Ok(vec![1, 2, 3]));
        }
    }

    #[tokio::test]
    async fn clear_rejects_everyone_with_reason() {
        let mut q: RequestQueue<u8> = RequestQueue::new();
        let a = q.enqueue();
        let b = q.enqueue();
        assert_eq!(q.clear_queue(), 2);
        assert!(q.is_queue_empty());

        let err = a.await.unwrap_err();
        assert_eq!(err.reason, CANCEL_REASON);
        assert_eq!(err.to_string(), "Cancel local viewport get features");
        assert_eq!(b.await, Err(Cancelled::new()));
    }

    #[tokio::test]
    async fn entries_after_settle_start_new_cycle() {
        let mut q = RequestQueue::new();
        let first = q.enqueue();
        q.clear_queue();
        let second = q.enqueue();
        assert_eq!(q.resolve_queue("fresh"), 1);

        assert!(first.await.is_err());
        assert_eq!(second.await, Ok("fresh"));
    }

    #[tokio::test]
    async fn dropped_waiter_is_skipped() {
        let mut q = RequestQueue::new();
        drop(q.enqueue());
        let kept = q.enqueue();
        assert_eq!(q.resolve_queue(5), 1);
        assert_eq!(kept.await, Ok(5));
    }

    #[tokio::test]
    async fn dropping_queue_cancels_waiters() {
        let mut q: RequestQueue<u8> = RequestQueue::new();
        let w = q.enqueue();
        drop(q);
        assert!(w.await.is_err());
    }
}
