//! # Priority-Inheriting Mutex
//!
//! Exclusive lock for task context. When a task blocks on a mutex held by
//! a lower-priority task, the holder runs at the waiter's priority until
//! it releases the lock. The boost follows chains of blocked holders, so
//! a high-priority task is never stuck behind a medium one indirectly.
//!
//! ```text
//!   prio 2  toggler ──lock()──► blocked ····················► owns, Running
//!   prio 1  counter  holds ──── runs at prio 2 ──── unlock() ─► prio 1
//! ```
//!
//! Release hands ownership straight to the highest-priority waiter, so a
//! woken waiter never has to compete for the lock again.

use crate::config::MAX_TASKS;
use crate::error::KernelError;
use crate::scheduler::{Acquire, Scheduler};
use crate::task::{TaskState, WaitTarget, WakeReason};

/// Handle to a mutex in the kernel object table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MutexHandle(pub(crate) u8);

impl MutexHandle {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Mutex slot state.
#[derive(Debug, Clone, Copy)]
pub struct PiMutex {
    created: bool,
    /// Task index of the holder.
    pub(crate) owner: Option<usize>,
}

impl PiMutex {
    pub const fn new() -> Self {
        Self {
            created: false,
            owner: None,
        }
    }
}

impl Default for PiMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Allocate a mutex. It starts unlocked.
    pub fn create_mutex(&mut self) -> Result<MutexHandle, KernelError> {
        let index = self
            .mutexes
            .iter()
            .position(|m| !m.created)
            .ok_or(KernelError::ObjectLimit)?;
        self.mutexes[index] = PiMutex {
            created: true,
            owner: None,
        };
        Ok(MutexHandle(index as u8))
    }

    fn mutex(&mut self, handle: MutexHandle) -> Result<&mut PiMutex, KernelError> {
        self.mutexes
            .get_mut(handle.index())
            .filter(|m| m.created)
            .ok_or(KernelError::InvalidHandle)
    }

    /// Current holder of the mutex.
    pub fn mutex_owner(&self, handle: MutexHandle) -> Result<Option<usize>, KernelError> {
        self.mutexes
            .get(handle.index())
            .filter(|m| m.created)
            .map(|m| m.owner)
            .ok_or(KernelError::InvalidHandle)
    }

    /// Lock the mutex for the running task.
    ///
    /// If another task holds it, the running task blocks (unless the
    /// deadline is already due, which fails with `Timeout`) and the holder
    /// inherits its priority. When the caller is woken with
    /// `WakeReason::Signaled` it already owns the mutex.
    pub fn mutex_lock(
        &mut self,
        handle: MutexHandle,
        deadline: Option<u64>,
    ) -> Result<Acquire, KernelError> {
        let current = self.running()?;
        let expired = self.is_expired(deadline);
        let mutex = self.mutex(handle)?;

        let owner = match mutex.owner {
            None => {
                mutex.owner = Some(current);
                return Ok(Acquire::Acquired);
            }
            Some(owner) if owner == current => return Err(KernelError::AlreadyOwned),
            Some(owner) => owner,
        };
        if expired {
            return Err(KernelError::Timeout);
        }

        self.block(current, WaitTarget::Mutex(handle), deadline);
        self.propagate_inheritance(owner);
        trace!(
            "task {} waits on mutex {} held by {} (now prio {})",
            current,
            handle.index(),
            owner,
            self.tasks[owner].effective_priority
        );
        Ok(Acquire::Blocked)
    }

    /// Release the mutex held by the running task.
    ///
    /// Restores the caller's priority, then hands ownership to the
    /// highest-priority waiter and makes it ready.
    pub fn mutex_unlock(&mut self, handle: MutexHandle) -> Result<(), KernelError> {
        let current = self.running()?;
        let mutex = self.mutex(handle)?;
        if mutex.owner != Some(current) {
            return Err(KernelError::NotOwner);
        }
        mutex.owner = None;
        self.refresh_priority(current);

        if let Some(waiter) = self.highest_waiter(WaitTarget::Mutex(handle)) {
            self.mutexes[handle.index()].owner = Some(waiter);
            self.wake(waiter, WakeReason::Signaled);
            // The new holder inherits from whoever is still queued.
            self.refresh_priority(waiter);
        }
        Ok(())
    }

    /// Recompute a task's effective priority: its base priority raised to
    /// that of the most urgent task waiting on any mutex it holds.
    pub(crate) fn refresh_priority(&mut self, task: usize) {
        let mut priority = self.tasks[task].base_priority;
        for (index, mutex) in self.mutexes.iter().enumerate() {
            if !mutex.created || mutex.owner != Some(task) {
                continue;
            }
            let target = WaitTarget::Mutex(MutexHandle(index as u8));
            for waiter in self.tasks.iter().filter(|t| t.is_waiting_on(target)) {
                priority = priority.max(waiter.effective_priority);
            }
        }

        if priority != self.tasks[task].effective_priority {
            self.tasks[task].effective_priority = priority;
            // A raised ready task may now beat the running one, and a
            // lowered running task may now lose to a ready one.
            if self.tasks[task].is_runnable() {
                self.needs_reschedule = true;
            }
        }
    }

    /// Refresh `task`'s priority and follow the chain of holders it is
    /// itself blocked behind.
    pub(crate) fn propagate_inheritance(&mut self, task: usize) {
        let mut next = Some(task);
        // Bounded: a chain cannot be longer than the number of tasks.
        for _ in 0..MAX_TASKS {
            let Some(holder) = next else { break };
            self.refresh_priority(holder);
            next = match self.tasks[holder].wait {
                Some(w) if self.tasks[holder].state == TaskState::Blocked => match w.target {
                    WaitTarget::Mutex(m) => self.mutexes[m.index()].owner,
                    _ => None,
                },
                _ => None,
            };
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::Timeout;
    use crate::testutil::{spawn, spawn_running};

    #[test]
    fn test_lock_unlock_uncontended() {
        let mut s = Scheduler::new();
        let m = s.create_mutex().unwrap();
        let t = spawn_running(&mut s, "t", 1);

        assert_eq!(s.mutex_owner(m), Ok(None));
        assert_eq!(s.mutex_lock(m, None), Ok(Acquire::Acquired));
        assert_eq!(s.mutex_owner(m), Ok(Some(t)));
        assert_eq!(s.mutex_unlock(m), Ok(()));
        assert_eq!(s.mutex_owner(m), Ok(None));
    }

    #[test]
    fn test_relock_by_owner_rejected() {
        let mut s = Scheduler::new();
        let m = s.create_mutex().unwrap();
        spawn_running(&mut s, "t", 1);
        s.mutex_lock(m, None).unwrap();
        assert_eq!(s.mutex_lock(m, None), Err(KernelError::AlreadyOwned));
    }

    #[test]
    fn test_unlock_by_non_owner_rejected() {
        let mut s = Scheduler::new();
        let m = s.create_mutex().unwrap();
        spawn_running(&mut s, "t", 1);
        assert_eq!(s.mutex_unlock(m), Err(KernelError::NotOwner));
    }

    #[test]
    fn test_invalid_handle() {
        let mut s = Scheduler::new();
        spawn_running(&mut s, "t", 1);
        assert_eq!(s.mutex_lock(MutexHandle(0), None), Err(KernelError::InvalidHandle));
        assert_eq!(s.mutex_owner(MutexHandle(9)), Err(KernelError::InvalidHandle));
    }

    #[test]
    fn test_nowait_lock_on_held_mutex_fails() {
        let mut s = Scheduler::new();
        let m = s.create_mutex().unwrap();
        let low = spawn_running(&mut s, "low", 1);
        s.mutex_lock(m, None).unwrap();

        let high = spawn(&mut s, "high", 2);
        assert_eq!(s.schedule(), Some(high));
        let now = s.deadline(Timeout::NoWait);
        assert_eq!(s.mutex_lock(m, now), Err(KernelError::Timeout));
        assert_eq!(s.tasks[low].effective_priority, 1);
    }

    #[test]
    fn test_priority_inheritance_raise_and_restore() {
        let mut s = Scheduler::new();
        let m = s.create_mutex().unwrap();
        let counter = spawn_running(&mut s, "counter", 1);
        assert_eq!(s.mutex_lock(m, None), Ok(Acquire::Acquired));

        // The toggler becomes ready and preempts the holder.
        let toggler = spawn(&mut s, "toggler", 2);
        assert_eq!(s.schedule(), Some(toggler));
        assert_eq!(s.mutex_lock(m, None), Ok(Acquire::Blocked));

        assert_eq!(s.tasks[counter].effective_priority, 2);
        assert_eq!(s.tasks[counter].base_priority, 1);
        assert_eq!(s.schedule(), Some(counter));

        // Restored exactly at release, ownership handed over.
        assert_eq!(s.mutex_unlock(m), Ok(()));
        assert_eq!(s.tasks[counter].effective_priority, 1);
        assert_eq!(s.mutex_owner(m), Ok(Some(toggler)));
        assert_eq!(s.tasks[toggler].state, TaskState::Ready);
        assert!(s.needs_reschedule);

        assert_eq!(s.schedule(), Some(toggler));
        assert_eq!(s.take_wake_reason(), Some(WakeReason::Signaled));
    }

    #[test]
    fn test_inherited_priority_beats_middle_task() {
        let mut s = Scheduler::new();
        let m = s.create_mutex().unwrap();
        let low = spawn_running(&mut s, "low", 1);
        s.mutex_lock(m, None).unwrap();

        let mid = spawn(&mut s, "mid", 2);
        let high = spawn(&mut s, "high", 3);
        assert_eq!(s.schedule(), Some(high));
        s.mutex_lock(m, None).unwrap();

        // The boosted holder runs ahead of the middle task.
        assert_eq!(s.schedule(), Some(low));
        assert_eq!(s.tasks[mid].state, TaskState::Ready);

        s.mutex_unlock(m).unwrap();
        assert_eq!(s.schedule(), Some(high));
    }

    #[test]
    fn test_chained_inheritance() {
        let mut s = Scheduler::new();
        let a = s.create_mutex().unwrap();
        let b = s.create_mutex().unwrap();

        let low = spawn_running(&mut s, "low", 1);
        s.mutex_lock(a, None).unwrap();

        let mid = spawn(&mut s, "mid", 2);
        assert_eq!(s.schedule(), Some(mid));
        s.mutex_lock(b, None).unwrap();
        assert_eq!(s.mutex_lock(a, None), Ok(Acquire::Blocked));
        assert_eq!(s.tasks[low].effective_priority, 2);

        let high = spawn(&mut s, "high", 5);
        assert_eq!(s.schedule(), Some(high));
        assert_eq!(s.mutex_lock(b, None), Ok(Acquire::Blocked));

        assert_eq!(s.tasks[mid].effective_priority, 5);
        assert_eq!(s.tasks[low].effective_priority, 5);
        assert_eq!(s.schedule(), Some(low));
    }

    #[test]
    fn test_waiter_timeout_drops_inherited_priority() {
        let mut s = Scheduler::new();
        let m = s.create_mutex().unwrap();
        let low = spawn_running(&mut s, "low", 1);
        s.mutex_lock(m, None).unwrap();

        let high = spawn(&mut s, "high", 3);
        assert_eq!(s.schedule(), Some(high));
        let deadline = s.deadline(Timeout::Ticks(1));
        assert_eq!(s.mutex_lock(m, deadline), Ok(Acquire::Blocked));
        assert_eq!(s.tasks[low].effective_priority, 3);
        assert_eq!(s.schedule(), Some(low));

        s.tick();
        assert_eq!(s.tasks[low].effective_priority, 1);
        assert_eq!(s.mutex_owner(m), Ok(Some(low)));
        assert_eq!(s.schedule(), Some(high));
        assert_eq!(s.take_wake_reason(), Some(WakeReason::TimedOut));
    }

    #[test]
    fn test_handoff_goes_to_highest_waiter() {
        let mut s = Scheduler::new();
        let m = s.create_mutex().unwrap();
        let owner = spawn_running(&mut s, "owner", 1);
        s.mutex_lock(m, None).unwrap();

        let w2 = spawn(&mut s, "w2", 2);
        assert_eq!(s.schedule(), Some(w2));
        s.mutex_lock(m, None).unwrap();
        let w3 = spawn(&mut s, "w3", 3);
        assert_eq!(s.schedule(), Some(w3));
        s.mutex_lock(m, None).unwrap();

        assert_eq!(s.schedule(), Some(owner));
        s.mutex_unlock(m).unwrap();
        assert_eq!(s.mutex_owner(m), Ok(Some(w3)));
        assert_eq!(s.tasks[w2].state, TaskState::Blocked);
        // w3 now carries w2's claim, which is lower than its own.
        assert_eq!(s.tasks[w3].effective_priority, 3);
    }

    #[test]
    fn test_mutual_exclusion() {
        let mut s = Scheduler::new();
        let m = s.create_mutex().unwrap();
        let _idle = spawn(&mut s, "idle", 0);
        let counter = spawn(&mut s, "counter", 1);
        let toggler = spawn(&mut s, "toggler", 2);

        // Toggler holds the mutex across a delay.
        assert_eq!(s.schedule(), Some(toggler));
        s.mutex_lock(m, None).unwrap();
        s.delay_current(100).unwrap();

        // Counter cannot get in while the toggler sleeps.
        assert_eq!(s.schedule(), Some(counter));
        assert_eq!(s.mutex_lock(m, None), Ok(Acquire::Blocked));
        for _ in 0..100 {
            assert_eq!(s.mutex_owner(m), Ok(Some(toggler)));
            s.tick();
        }

        assert_eq!(s.schedule(), Some(toggler));
        s.mutex_unlock(m).unwrap();
        assert_eq!(s.mutex_owner(m), Ok(Some(counter)));
    }
}
