//! Edit-driven cancellation. Every tokenizer update hands consumers a fresh
//! [CancellationToken]; the next update cancels it.

use std::future;
use std::pin;
use std::sync;
use std::sync::atomic;
use std::task;

use crate::util;

struct Shared {
    generation: atomic::AtomicU64,
    notifier: util::Notifier,
}

pub struct Cancellation {
    shared: sync::Arc<Shared>,
}

#[derive(Clone)]
pub struct CancellationToken {
    shared: sync::Arc<Shared>,
    generation: u64,
}

impl Cancellation {
    pub fn new() -> Cancellation {
        Cancellation {
            shared: sync::Arc::new(Shared {
                generation: atomic::AtomicU64::new(0),
                notifier: util::Notifier::new(),
            }),
        }
    }

    /// Cancels every token handed out so far and returns a new one.
    pub fn supersede(&self) -> CancellationToken {
        let generation = self.shared.generation.fetch_add(1, atomic::Ordering::AcqRel) + 1;
        self.shared.notifier.notify();

        CancellationToken {
            shared: self.shared.clone(),
            generation,
        }
    }

    /// A token for the current generation, without cancelling anything.
    pub fn current(&self) -> CancellationToken {
        CancellationToken {
            shared: self.shared.clone(),
            generation: self.shared.generation.load(atomic::Ordering::Acquire),
        }
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.generation.load(atomic::Ordering::Acquire) != self.generation
    }

    /// Resolves once this token has been superseded.
    pub fn cancelled(&self) -> Cancelled<'_> {
        Cancelled { token: self }
    }
}

pub struct Cancelled<'a> {
    token: &'a CancellationToken,
}

impl<'a> future::Future for Cancelled<'a> {
    type Output = ();

    fn poll(self: pin::Pin<&mut Self>, cx: &mut task::Context<'_>) -> task::Poll<()> {
        if self.token.is_cancelled() {
            return task::Poll::Ready(());
        }

        self.token.shared.notifier.enroll(cx);

        /* might have been superseded while we were enrolling */
        if self.token.is_cancelled() {
            task::Poll::Ready(())
        } else {
            task::Poll::Pending
        }
    }
}

impl std::fmt::Debug for Cancellation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cancellation")
            .field("generation", &self.shared.generation.load(atomic::Ordering::Relaxed))
            .finish()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("generation", &self.generation)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
