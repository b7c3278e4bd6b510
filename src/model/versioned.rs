use std::future;
use std::pin;
use std::sync;
use std::task;

use crate::util;

pub trait Change<Object>: Clone {
    type ApplyError;
    type ApplyRecord: Clone;

    fn apply(self, object: &mut Object) -> Result<(Self, Self::ApplyRecord), Self::ApplyError>;
}

/// Identifies one object lineage (`uid`) and a position in its history
/// (`generation`). Generations increase by exactly one per applied change.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    uid: u64,
    generation: u64,
}

impl std::fmt::Debug for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Version")
            .field("uid", &self.uid)
            .field("generation", &self.generation)
            .finish()
    }
}

impl Default for Version {
    fn default() -> Self {
        Version {
            uid: next_uid(),
            generation: 0,
        }
    }
}

impl Version {
    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The version that follows this one in the same lineage.
    pub fn successor(&self) -> Version {
        Version {
            uid: self.uid,
            generation: self.generation + 1,
        }
    }

    fn is_outdated(&self, other: &Self) -> bool {
        self.uid != other.uid ||
            self.generation != other.generation
    }
}

pub trait Versioned {
    fn version(&self) -> &Version;

    fn generation(&self) -> u64 {
        self.version().generation
    }

    fn is_outdated(&self, other: &Self) -> bool {
        self.version().is_outdated(other.version())
    }
}

/// A versioned object that evolves by applying changes to a copy of itself.
pub trait Editable: Versioned + Sized + Clone {
    type Change: Change<Self>;

    fn version_mut(&mut self) -> &mut Version;
}

static NEXT_UID: sync::atomic::AtomicU64 = sync::atomic::AtomicU64::new(1);

fn next_uid() -> u64 {
    NEXT_UID.fetch_add(1, sync::atomic::Ordering::Relaxed)
}

/// What a successful [Host::change] hands back: both snapshots and the
/// record of how one became the other.
pub struct Transition<Object: Editable> {
    pub before: sync::Arc<Object>,
    pub after: sync::Arc<Object>,
    pub record: <Object::Change as Change<Object>>::ApplyRecord,
}

impl<Object: Editable> Clone for Transition<Object> {
    fn clone(&self) -> Self {
        Transition {
            before: self.before.clone(),
            after: self.after.clone(),
            record: self.record.clone(),
        }
    }
}

impl<Object: Editable + std::fmt::Debug> std::fmt::Debug for Transition<Object>
where <Object::Change as Change<Object>>::ApplyRecord: std::fmt::Debug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transition")
            .field("before", &self.before)
            .field("after", &self.after)
            .field("record", &self.record)
            .finish()
    }
}

pub type ApplyError<Object> = <<Object as Editable>::Change as Change<Object>>::ApplyError;

pub struct Host<Object: Versioned> {
    notifier: util::Notifier,
    current: arc_swap::ArcSwap<Object>,
}

impl<Object: Versioned> Host<Object> {
    pub fn new(initial: Object) -> Self {
        Self::from_arc(sync::Arc::new(initial))
    }

    pub fn from_arc(initial: sync::Arc<Object>) -> Self {
        Host {
            notifier: util::Notifier::new(),
            current: arc_swap::ArcSwap::from(initial),
        }
    }

    pub fn enroll(&self, cx: &task::Context) {
        self.notifier.enroll(cx);
    }

    pub fn wait_for_update<'a>(&'a self, current: &'_ Object) -> ObjectUpdateFuture<'a, Object> {
        ObjectUpdateFuture {
            host: self,
            version: *current.version(),
        }
    }

    pub fn borrow(&self) -> arc_swap::Guard<sync::Arc<Object>> {
        self.current.load()
    }

    pub fn get(&self) -> sync::Arc<Object> {
        self.current.load_full()
    }

    /// Replaces the current object wholesale and wakes anyone waiting for an update.
    pub fn publish(&self, object: sync::Arc<Object>) {
        self.current.store(object);
        self.notifier.notify();
    }
}

impl<Object: Editable> Host<Object> {
    pub fn change(&self, change: Object::Change) -> Result<Transition<Object>, ApplyError<Object>> {
        let old = self.current.load_full();
        let mut object = (*old).clone();
        let (change, record) = change.apply(&mut object)?;

        let version = object.version_mut();
        *version = version.successor();

        let new = sync::Arc::new(object);
        let swapped = self.current.compare_and_swap(&old, new.clone());

        if !sync::Arc::ptr_eq(&old, &swapped) {
            /* another thread updated the object. the change was made against the old
             * generation, so retrying lets apply() decide whether it still fits. */
            return self.change(change);
        }

        self.notifier.notify();
        Ok(Transition {
            before: old,
            after: new,
            record,
        })
    }
}

pub struct ObjectUpdateFuture<'a, Object: Versioned> {
    host: &'a Host<Object>,
    version: Version,
}

impl<'a, Object: Versioned> future::Future for ObjectUpdateFuture<'a, Object> {
    type Output = sync::Arc<Object>;

    fn poll(self: pin::Pin<&mut Self>, cx: &mut task::Context<'_>) -> task::Poll<Self::Output> {
        let guard = self.host.current.load();
        if guard.version().is_outdated(&self.version) {
            /* fast path */
            task::Poll::Ready(arc_swap::Guard::into_inner(guard))
        } else {
            /* slow path. need to enroll for change notifications... */
            std::mem::drop(guard);
            self.host.enroll(cx);

            /* check whether the object was updated while we were enrolling */
            let guard = self.host.current.load();
            if guard.version().is_outdated(&self.version) {
                task::Poll::Ready(arc_swap::Guard::into_inner(guard))
            } else {
                /* still no change... we'll pick it up when our task gets woken again. */
                task::Poll::Pending
            }
        }
    }
}

impl<Object: Versioned> std::fmt::Debug for Host<Object> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(std::any::type_name::<Host<Object>>())
            .field("version", self.borrow().version())
            .finish_non_exhaustive()
    }
}
