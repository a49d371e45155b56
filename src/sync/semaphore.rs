//! # Binary Semaphore
//!
//! A notification primitive holding at most one pending credit. Interrupt
//! handlers give it with [`Scheduler::semaphore_give_from_isr`]; tasks
//! take it with [`Scheduler::semaphore_take`]. The two entry points are
//! deliberately separate: only the task side may block.
//!
//! Credits never queue. Any number of gives before the next take leave a
//! single credit, so back-to-back events collapse into one wake.

use crate::error::KernelError;
use crate::scheduler::{Acquire, Scheduler};
use crate::task::WaitTarget;

/// Handle to a binary semaphore in the kernel object table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SemaphoreHandle(pub(crate) u8);

impl SemaphoreHandle {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Semaphore slot state.
#[derive(Debug, Clone, Copy)]
pub struct BinarySemaphore {
    created: bool,
    available: bool,
}

impl BinarySemaphore {
    pub const fn new() -> Self {
        Self {
            created: false,
            available: false,
        }
    }
}

impl Default for BinarySemaphore {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Allocate a binary semaphore. It starts empty: the first successful
    /// take needs a give.
    pub fn create_binary_semaphore(&mut self) -> Result<SemaphoreHandle, KernelError> {
        let index = self
            .semaphores
            .iter()
            .position(|s| !s.created)
            .ok_or(KernelError::ObjectLimit)?;
        self.semaphores[index] = BinarySemaphore {
            created: true,
            available: false,
        };
        Ok(SemaphoreHandle(index as u8))
    }

    fn semaphore(&mut self, handle: SemaphoreHandle) -> Result<&mut BinarySemaphore, KernelError> {
        self.semaphores
            .get_mut(handle.index())
            .filter(|s| s.created)
            .ok_or(KernelError::InvalidHandle)
    }

    pub fn semaphore_is_available(&self, handle: SemaphoreHandle) -> Result<bool, KernelError> {
        self.semaphores
            .get(handle.index())
            .filter(|s| s.created)
            .map(|s| s.available)
            .ok_or(KernelError::InvalidHandle)
    }

    /// Take the semaphore for the running task.
    ///
    /// Consumes the credit if present. Otherwise fails with `Timeout` if
    /// the deadline is already due, or blocks the running task on the
    /// semaphore until given or until the deadline passes.
    ///
    /// A task woken by a give has not consumed the credit yet: it calls
    /// this again when it resumes.
    pub fn semaphore_take(
        &mut self,
        handle: SemaphoreHandle,
        deadline: Option<u64>,
    ) -> Result<Acquire, KernelError> {
        let current = self.running()?;
        let expired = self.is_expired(deadline);
        let sem = self.semaphore(handle)?;

        if sem.available {
            sem.available = false;
            return Ok(Acquire::Acquired);
        }
        if expired {
            return Err(KernelError::Timeout);
        }

        trace!("task {} waits on semaphore {}", current, handle.index());
        self.block(current, WaitTarget::Semaphore(handle), deadline);
        Ok(Acquire::Blocked)
    }

    /// Give the semaphore from interrupt context. Never blocks.
    ///
    /// Leaves the credit available and readies the highest-priority
    /// waiter, if any. Giving an already-available semaphore changes
    /// nothing.
    ///
    /// # Returns
    /// `true` if a task was woken that outranks the running task, in which
    /// case the caller should request a context switch on ISR exit.
    pub fn semaphore_give_from_isr(&mut self, handle: SemaphoreHandle) -> Result<bool, KernelError> {
        self.semaphore(handle)?.available = true;

        match self.highest_waiter(WaitTarget::Semaphore(handle)) {
            Some(waiter) => {
                let preempt = self.outranks_current(waiter);
                self.wake(waiter, crate::task::WakeReason::Signaled);
                Ok(preempt)
            }
            None => Ok(false),
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
