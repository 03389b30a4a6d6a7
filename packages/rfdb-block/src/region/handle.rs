//! Reference-counted ownership of backing storage.
//!
//! Every region points into bytes kept alive by exactly one
//! `OwnershipHandle`. The handle wraps whatever owns the storage (an aligned
//! heap block, a memory map plus its file descriptor, a `Vec`) or an explicit
//! release closure. Clones share one atomic count; the owner is dropped, and
//! the storage released, when the last clone goes away.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Shared capability keeping a region's backing bytes alive.
#[derive(Clone)]
pub struct OwnershipHandle {
    owner: Arc<dyn Any + Send + Sync>,
}

impl OwnershipHandle {
    /// Wrap an owner value. Its `Drop` is the release action.
    pub fn new<T: Send + Sync + 'static>(owner: T) -> Self {
        Self {
            owner: Arc::new(owner),
        }
    }

    /// Build a handle whose release action is `release`, run exactly once.
    pub fn from_release<F>(release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::new(ReleaseOnDrop {
            action: Mutex::new(Some(Box::new(release))),
        })
    }

    /// Number of live clones of this handle (regions, ranges, streams).
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.owner)
    }

    /// Whether two handles keep the same storage alive.
    pub fn ptr_eq(&self, other: &OwnershipHandle) -> bool {
        Arc::ptr_eq(&self.owner, &other.owner)
    }

    /// Borrow the owner value, if it has type `T`.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.owner.downcast_ref::<T>()
    }
}

impl fmt::Debug for OwnershipHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnershipHandle")
            .field("strong_count", &self.strong_count())
            .finish()
    }
}

type ReleaseAction = Box<dyn FnOnce() + Send>;

/// Owner whose only job is to run a closure when dropped.
struct ReleaseOnDrop {
    action: Mutex<Option<ReleaseAction>>,
}

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        let slot = match self.action.get_mut() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(release) = slot.take() {
            release();
        }
    }
}
