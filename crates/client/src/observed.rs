use std::ops::{Deref, DerefMut};

use parking_lot::{Mutex, MutexGuard};
use tokio::sync::watch;

/// Mutex-guarded state that publishes a new revision after every edit.
///
/// Front ends subscribe to the revision to know when to redraw; the state itself
/// is still read through short synchronous locks.
pub struct Observed<T> {
    state: Mutex<T>,
    revision: watch::Sender<u64>,
}

impl<T> Observed<T> {
    pub fn new(state: T) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            state: Mutex::new(state),
            revision,
        }
    }

    pub fn read(&self) -> MutexGuard<'_, T> {
        self.state.lock()
    }

    /// Locks for writing; the revision advances when the guard drops.
    pub fn edit(&self) -> Edit<'_, T> {
        Edit {
            guard: self.state.lock(),
            revision: &self.revision,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

pub struct Edit<'a, T> {
    guard: MutexGuard<'a, T>,
    revision: &'a watch::Sender<u64>,
}

impl<T> Deref for Edit<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for Edit<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for Edit<'_, T> {
    fn drop(&mut self) {
        self.revision
            .send_modify(|revision| *revision = revision.wrapping_add(1));
    }
}
