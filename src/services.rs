//! # Kernel Services
//!
//! The kernel operations application code is written against. On target
//! they are implemented by `kernel::Kernel`; host tests substitute
//! simulated kernels. Task-context and interrupt-context operations are
//! separate traits so an interrupt handler cannot reach a blocking call.

use crate::error::KernelError;
use crate::sync::{MutexHandle, SemaphoreHandle, Timeout};

/// Where a kernel call is being made from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CallContext {
    /// A task, in thread mode.
    #[default]
    Thread,
    /// An exception or interrupt handler.
    Handler,
}

impl CallContext {
    /// Reject task-only services outside thread mode. A handler that
    /// blocked or deleted "the current task" would act on whichever task
    /// it interrupted.
    pub fn require_task(self) -> Result<(), KernelError> {
        match self {
            CallContext::Thread => Ok(()),
            CallContext::Handler => Err(KernelError::IsrContext),
        }
    }
}

/// Operations available to tasks. Any of them except `busy_wait` may
/// suspend the caller.
///
/// # Safety
/// `SharedResource` hands out `&mut` access on the strength of
/// `mutex_lock`. Implementors must guarantee that a successful
/// `mutex_lock` is exclusive until the matching `mutex_unlock`.
pub unsafe trait TaskServices {
    /// Take a binary semaphore, blocking for at most `timeout`.
    fn semaphore_take(&self, semaphore: SemaphoreHandle, timeout: Timeout) -> Result<(), KernelError>;

    /// Lock a mutex, blocking for at most `timeout`.
    fn mutex_lock(&self, mutex: MutexHandle, timeout: Timeout) -> Result<(), KernelError>;

    fn mutex_unlock(&self, mutex: MutexHandle) -> Result<(), KernelError>;

    /// Suspend the caller for `ticks` scheduler ticks. Does nothing when
    /// called from a handler.
    fn delay(&self, ticks: u32);

    /// Spin for roughly `cycles` CPU cycles without yielding.
    fn busy_wait(&self, cycles: u32);

    /// Terminate the calling task and release its slot. From a handler no
    /// task is terminated and the system halts.
    fn delete_current(&self) -> !;
}

/// Operations available to interrupt handlers. None of them block.
pub trait IsrServices {
    /// Give a binary semaphore. Returns whether a task that outranks the
    /// interrupted one was woken.
    fn semaphore_give_from_isr(&self, semaphore: SemaphoreHandle) -> Result<bool, KernelError>;

    /// Request a context switch on interrupt exit if `higher_priority_woken`.
    fn yield_from_isr(&self, higher_priority_woken: bool);
}

unsafe impl<T: TaskServices + ?Sized> TaskServices for &T {
    fn semaphore_take(&self, semaphore: SemaphoreHandle, timeout: Timeout) -> Result<(), KernelError> {
        (**self).semaphore_take(semaphore, timeout)
    }

    fn mutex_lock(&self, mutex: MutexHandle, timeout: Timeout) -> Result<(), KernelError> {
        (**self).mutex_lock(mutex, timeout)
    }

    fn mutex_unlock(&self, mutex: MutexHandle) -> Result<(), KernelError> {
        (**self).mutex_unlock(mutex)
    }

    fn delay(&self, ticks: u32) {
        (**self).delay(ticks)
    }

    fn busy_wait(&self, cycles: u32) {
        (**self).busy_wait(cycles)
    }

    fn delete_current(&self) -> ! {
        (**self).delete_current()
    }
}

impl<T: IsrServices + ?Sized> IsrServices for &T {
    fn semaphore_give_from_isr(&self, semaphore: SemaphoreHandle) -> Result<bool, KernelError> {
        (**self).semaphore_give_from_isr(semaphore)
    }

    fn yield_from_isr(&self, higher_priority_woken: bool) {
        (**self).yield_from_isr(higher_priority_woken)
    }
}
