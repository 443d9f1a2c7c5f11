//! Lazy Sequence Module
//!
//! Single-pass iterators fed by a producer thread through a rendezvous
//! channel. The producer only runs ahead of the consumer by one item and is
//! stopped and joined as soon as the consumer cancels or drops the sequence.

use std::fmt;
use std::iter::FusedIterator;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, error, warn};

const PRODUCER_THREAD_NAME: &str = "expiring-map-seq";

/// Live `(key, value)` pairs of a map.
pub type Iter<K, V> = Sequence<(K, V)>;

/// Live keys of a map.
pub type Keys<K> = Sequence<K>;

/// Live values of a map.
pub type Values<V> = Sequence<V>;

// == Emitter ==
/// Producer half handed to the traversal running on the producer thread.
pub(crate) struct Emitter<T> {
    sender: Sender<T>,
    cancelled: Arc<AtomicBool>,
}

impl<T> Emitter<T> {
    /// Blocks until the consumer takes `item`.
    ///
    /// Returns false once the consumer has cancelled; the traversal must stop.
    pub(crate) fn emit(&self, item: T) -> bool {
        !self.cancelled.load(Ordering::Acquire) && self.sender.send(item).is_ok()
    }
}

// == Sequence ==
/// Lazy, finite, single-pass sequence produced by a background traversal.
///
/// Each `next` hands over exactly one item from the producer. Dropping the
/// sequence (or calling [`cancel`](Self::cancel)) before it is exhausted
/// signals the producer, which stops its traversal; the producer thread is
/// joined before `cancel`/`drop` returns.
pub struct Sequence<T> {
    receiver: Option<Receiver<T>>,
    cancelled: Arc<AtomicBool>,
    producer: Option<JoinHandle<()>>,
}

impl<T> Sequence<T>
where
    T: Send + 'static,
{
    /// Runs `produce` on a new thread and exposes what it emits.
    pub(crate) fn spawn<F>(produce: F) -> Self
    where
        F: FnOnce(Emitter<T>) + Send + 'static,
    {
        let (sender, receiver) = channel::bounded(0);
        let cancelled = Arc::new(AtomicBool::new(false));
        let emitter = Emitter {
            sender,
            cancelled: Arc::clone(&cancelled),
        };

        let producer = thread::Builder::new()
            .name(PRODUCER_THREAD_NAME.to_string())
            .spawn(move || produce(emitter));

        match producer {
            Ok(handle) => Self {
                receiver: Some(receiver),
                cancelled,
                producer: Some(handle),
            },
            Err(e) => {
                // The emitter was dropped with the closure, so the sequence is
                // simply empty.
                error!(error = %e, "Failed to spawn sequence producer thread");
                Self {
                    receiver: None,
                    cancelled,
                    producer: None,
                }
            }
        }
    }
}

impl<T> Sequence<T> {
    // == Cancel ==
    /// Stops the producer and releases it. Further calls to `next` return None.
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        if self.receiver.take().is_some() {
            debug!("Sequence cancelled before exhaustion");
        }
        self.join_producer();
    }

    /// Returns true once the sequence was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn join_producer(&mut self) {
        if let Some(handle) = self.producer.take() {
            if handle.join().is_err() {
                warn!("Sequence producer panicked");
            }
        }
    }
}

impl<T> Iterator for Sequence<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let received = self.receiver.as_ref()?.recv();
        match received {
            Ok(item) => Some(item),
            Err(_) => {
                // Producer finished its traversal and dropped the sender
                self.receiver = None;
                self.join_producer();
                None
            }
        }
    }
}

impl<T> FusedIterator for Sequence<T> {}

impl<T> Drop for Sequence<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl<T> fmt::Debug for Sequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("exhausted", &self.receiver.is_none())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
