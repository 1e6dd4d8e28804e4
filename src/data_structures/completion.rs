//! Counting barrier for independently finishing sub-tasks.
//!
//! A [`CompletionTracker`] is created with the number of sub-tasks that will
//! report back. Each sub-task calls [`CompletionTracker::complete`] once, in any
//! order and from any thread. The completion callback runs exactly once, on the
//! call that brings the counter to zero.
//!
//! A tracker created for zero sub-tasks fires immediately inside
//! [`CompletionTracker::new`], so an empty archive never leaves the pipeline
//! waiting for a callback that cannot come.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

use futures_intrusive::channel::shared::{OneshotReceiver, oneshot_channel};

type Callback = Box<dyn FnOnce() + Send>;

struct Inner {
    expected: usize,
    remaining: AtomicUsize,
    on_complete: Mutex<Option<Callback>>,
}

#[derive(Clone)]
pub struct CompletionTracker {
    inner: Arc<Inner>,
}

impl CompletionTracker {
    pub fn new(count: usize, on_complete: impl FnOnce() + Send + 'static) -> Self {
        let tracker = Self {
            inner: Arc::new(Inner {
                expected: count,
                remaining: AtomicUsize::new(count),
                on_complete: Mutex::new(Some(Box::new(on_complete))),
            }),
        };
        if count == 0 {
            tracker.fire();
        }
        tracker
    }

    /// Tracker whose completion resolves the returned receiver with the output of `value`.
    ///
    /// `value` runs on the completing call, which makes it the place to take
    /// ownership of whatever the sub-tasks filled in.
    pub fn with_signal<T: Send + 'static>(
        count: usize,
        value: impl FnOnce() -> T + Send + 'static,
    ) -> (Self, OneshotReceiver<T>) {
        let (tx, rx) = oneshot_channel();
        let tracker = Self::new(count, move || {
            if tx.send(value()).is_err() {
                log::warn!("completion signal dropped before the tracker fired");
            }
        });
        (tracker, rx)
    }

    /// Report one finished sub-task. Returns `true` for the call that fired the callback.
    pub fn complete(&self) -> bool {
        let previous = self
            .inner
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        match previous {
            Ok(1) => {
                self.fire();
                true
            }
            Ok(_) => false,
            Err(_) => {
                log::warn!(
                    "completion reported after all {} sub-tasks had finished",
                    self.inner.expected
                );
                false
            }
        }
    }

    pub fn remaining(&self) -> usize {
        self.inner.remaining.load(Ordering::Acquire)
    }

    pub fn is_done(&self) -> bool {
        self.remaining() == 0
    }

    fn fire(&self) {
        let callback = self
            .inner
            .on_complete
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(callback) = callback {
            callback();
        }
    }
}

impl std::fmt::Debug for CompletionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionTracker")
            .field("expected", &self.inner.expected)
            .field("remaining", &self.remaining())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn counting(count: usize) -> (CompletionTracker, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let hits = fired.clone();
        let tracker = CompletionTracker::new(count, move || {
            hits.fetch_add(1, Ordering::SeqCst);
        });
        (tracker, fired)
    }

    #[test]
    fn zero_count_fires_on_construction() {
        let (tracker, fired) = counting(0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(tracker.is_done());
        assert!(!tracker.complete());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fires_only_on_the_last_completion() {
        let (tracker, fired) = counting(3);
        assert!(!tracker.complete());
        assert!(!tracker.complete());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(tracker.complete());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        // surplus completions are ignored
        assert!(!tracker.complete());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_completions_fire_once() {
        let (tracker, fired) = counting(64);
        let handles: Vec<_> = (0..64)
            .map(|_| {
                let tracker = tracker.clone();
                std::thread::spawn(move || tracker.complete())
            })
            .collect();
        let firing_calls = handles
            .into_iter()
            .map(|h| h.join().expect("thread panicked"))
            .filter(|fired| *fired)
            .count();
        assert_eq!(firing_calls, 1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn signal_resolves_with_value() {
        let (tracker, rx) = CompletionTracker::with_signal(2, || "bundle");
        tracker.complete();
        tracker.complete();
        let value = futures::executor::block_on(rx.receive());
        assert_eq!(value, Some("bundle"));
    }
}
