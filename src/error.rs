//! # Kernel Errors
//!
//! A single error type shared by the scheduler, the synchronization
//! primitives and the kernel API.

/// Failure reported by a kernel operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KernelError {
    /// The task table is full (`MAX_TASKS` reached).
    TaskLimit,
    /// A semaphore or mutex table is full.
    ObjectLimit,
    /// The handle does not name a live kernel object.
    InvalidHandle,
    /// The wait ended before the object became available, or a
    /// non-blocking attempt found it unavailable.
    Timeout,
    /// A mutex was released by a task that does not hold it.
    NotOwner,
    /// The calling task already holds the mutex.
    AlreadyOwned,
    /// A task-context operation was attempted from an interrupt handler.
    IsrContext,
    /// The scheduler was started with no runnable task.
    NoTasks,
}

impl core::fmt::Display for KernelError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            KernelError::TaskLimit => "task table full",
            KernelError::ObjectLimit => "kernel object table full",
            KernelError::InvalidHandle => "invalid kernel object handle",
            KernelError::Timeout => "wait timed out",
            KernelError::NotOwner => "mutex not held by caller",
            KernelError::AlreadyOwned => "mutex already held by caller",
            KernelError::IsrContext => "operation not allowed in interrupt context",
            KernelError::NoTasks => "no tasks to schedule",
        };
        f.write_str(msg)
    }
}
