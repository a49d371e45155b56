//! # Shared Resource
//!
//! Pairs a value with the kernel mutex that guards it. The value is only
//! reachable through [`SharedResource::lock`], whose guard unlocks the
//! mutex when dropped.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};

use super::{MutexHandle, Timeout};
use crate::error::KernelError;
use crate::services::TaskServices;

pub struct SharedResource<T> {
    mutex: MutexHandle,
    value: UnsafeCell<T>,
}

// Safety: access to `value` is serialized by the kernel mutex.
unsafe impl<T: Send> Sync for SharedResource<T> {}

impl<T> SharedResource<T> {
    pub const fn new(mutex: MutexHandle, value: T) -> Self {
        Self {
            mutex,
            value: UnsafeCell::new(value),
        }
    }

    pub fn mutex(&self) -> MutexHandle {
        self.mutex
    }

    /// Lock the guarding mutex, blocking for at most `timeout`.
    pub fn lock<'a, K: TaskServices>(
        &'a self,
        kernel: &'a K,
        timeout: Timeout,
    ) -> Result<ResourceGuard<'a, T, K>, KernelError> {
        kernel.mutex_lock(self.mutex, timeout)?;
        Ok(ResourceGuard {
            resource: self,
            kernel,
        })
    }
}

/// Exclusive access to a [`SharedResource`]; unlocks on drop.
pub struct ResourceGuard<'a, T, K: TaskServices> {
    resource: &'a SharedResource<T>,
    kernel: &'a K,
}

impl<T, K: TaskServices> Deref for ResourceGuard<'_, T, K> {
    type Target = T;

    fn deref(&self) -> &T {
        // Safety: the guard exists only while the mutex is held.
        unsafe { &*self.resource.value.get() }
    }
}

impl<T, K: TaskServices> DerefMut for ResourceGuard<'_, T, K> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: the guard exists only while the mutex is held.
        unsafe { &mut *self.resource.value.get() }
    }
}

impl<T, K: TaskServices> Drop for ResourceGuard<'_, T, K> {
    fn drop(&mut self) {
        if let Err(e) = self.kernel.mutex_unlock(self.resource.mutex) {
            warn!("unlock of guarded resource failed: {}", e);
        }
    }
}
