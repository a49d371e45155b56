//! # Scheduler
//!
//! Core scheduling logic for Trio: a fixed-priority preemptive scheduler
//! for a single core.
//!
//! ## Scheduling Algorithm
//!
//! - The highest effective-priority runnable task runs.
//! - On a tie the running task keeps the CPU; otherwise the lowest slot
//!   index wins. Equal priorities are never time-sliced.
//! - A task leaves the CPU only when it blocks (semaphore, mutex, delay),
//!   deletes itself, or a higher-priority task becomes ready.
//!
//! ## Tick Processing
//!
//! At each SysTick interrupt:
//! 1. Increment the tick counter
//! 2. Wake every blocked task whose deadline has passed
//! 3. Request a reschedule if a woken task outranks the running one
//!
//! The semaphore and mutex operations live in `sync::semaphore` and
//! `sync::mutex` as further `impl Scheduler` blocks; they share the
//! blocking helpers defined here.

use crate::config::{MAX_MUTEXES, MAX_SEMAPHORES, MAX_TASKS};
use crate::error::KernelError;
use crate::sync::{BinarySemaphore, PiMutex, Timeout};
use crate::task::{TaskConfig, TaskControlBlock, TaskEntry, TaskState, Wait, WaitTarget, WakeReason};

/// Result of a potentially blocking request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Acquire {
    /// Granted immediately; the caller keeps running.
    Acquired,
    /// The caller is now Blocked; a context switch must follow.
    Blocked,
}

// ---------------------------------------------------------------------------
// Scheduler struct
// ---------------------------------------------------------------------------

/// The central kernel state. Holds all task control blocks, the kernel
/// object tables and the tick counter. Stored as a `static` in
/// `kernel.rs` on target, and as a plain value in host tests.
pub struct Scheduler {
    /// Fixed-size array of TCBs.
    pub tasks: [TaskControlBlock; MAX_TASKS],

    /// Index of the task on the CPU, `None` before start.
    pub current_task: Option<usize>,

    /// Number of allocated task slots.
    pub task_count: usize,

    pub(crate) semaphores: [BinarySemaphore; MAX_SEMAPHORES],

    pub(crate) mutexes: [PiMutex; MAX_MUTEXES],

    /// Monotonic tick counter.
    pub tick_count: u64,

    /// Set whenever the running task may no longer be the right one.
    pub needs_reschedule: bool,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            tasks: [const { TaskControlBlock::empty() }; MAX_TASKS],
            current_task: None,
            task_count: 0,
            semaphores: [const { BinarySemaphore::new() }; MAX_SEMAPHORES],
            mutexes: [const { PiMutex::new() }; MAX_MUTEXES],
            tick_count: 0,
            needs_reschedule: false,
        }
    }

    /// Register a new task in the first free slot.
    ///
    /// # Returns
    /// - `Ok(task_id)`: the slot index of the new task
    /// - `Err(KernelError::TaskLimit)`: every slot is in use
    pub fn create_task(
        &mut self,
        entry: TaskEntry,
        arg: *mut (),
        config: TaskConfig,
    ) -> Result<usize, KernelError> {
        let id = self
            .tasks
            .iter()
            .position(|t| !t.active)
            .ok_or(KernelError::TaskLimit)?;

        self.tasks[id].init(id, config, entry, arg);

        #[cfg(target_arch = "arm")]
        crate::arch::cortex_m4::init_task_stack(&mut self.tasks[id]);

        self.task_count += 1;
        if self.outranks_current(id) {
            self.needs_reschedule = true;
        }
        debug!("task {} created: {=str} prio {}", id, config.name, config.priority);
        Ok(id)
    }

    /// Called from the SysTick handler every tick.
    pub fn tick(&mut self) {
        self.tick_count += 1;

        for i in 0..MAX_TASKS {
            let expired = self.tasks[i].active
                && self.tasks[i].state == TaskState::Blocked
                && matches!(
                    self.tasks[i].wait,
                    Some(Wait { deadline: Some(d), .. }) if d <= self.tick_count
                );
            if expired {
                self.expire_wait(i);
            }
        }
    }

    /// End task `id`'s wait because its deadline passed.
    fn expire_wait(&mut self, id: usize) {
        let target = self.tasks[id].wait.map(|w| w.target);
        self.wake(id, WakeReason::TimedOut);

        // A departed mutex waiter may have been the source of the
        // holder's inherited priority.
        if let Some(WaitTarget::Mutex(handle)) = target {
            if let Some(owner) = self.mutexes[handle.index()].owner {
                self.propagate_inheritance(owner);
            }
        }
    }

    /// Select the next task to run and update Ready/Running states.
    ///
    /// # Returns
    /// Index of the next task to run, or `None` if nothing is runnable.
    pub fn schedule(&mut self) -> Option<usize> {
        let mut best = self
            .current_task
            .filter(|&c| self.tasks[c].is_runnable());

        for i in 0..MAX_TASKS {
            if !self.tasks[i].is_runnable() {
                continue;
            }
            match best {
                None => best = Some(i),
                Some(b) if self.tasks[i].effective_priority > self.tasks[b].effective_priority => {
                    best = Some(i)
                }
                _ => {}
            }
        }

        // Mark previous task as Ready (if it was Running)
        if let Some(prev) = self.current_task {
            if Some(prev) != best && self.tasks[prev].state == TaskState::Running {
                self.tasks[prev].state = TaskState::Ready;
            }
        }

        if let Some(next) = best {
            self.tasks[next].state = TaskState::Running;
        }

        self.current_task = best;
        self.needs_reschedule = false;
        best
    }

    /// Block the running task until `ticks` have elapsed. Zero ticks only
    /// requests a reschedule.
    pub fn delay_current(&mut self, ticks: u32) -> Result<(), KernelError> {
        let current = self.running()?;
        if ticks == 0 {
            self.needs_reschedule = true;
            return Ok(());
        }
        let deadline = self.tick_count + u64::from(ticks);
        self.block(current, WaitTarget::Delay, Some(deadline));
        Ok(())
    }

    /// Terminate the running task and free its slot.
    pub fn delete_current(&mut self) -> Result<(), KernelError> {
        let current = self.running()?;
        debug!("task {} deleted: {=str}", current, self.tasks[current].name);
        self.tasks[current].terminate();
        self.task_count -= 1;
        self.needs_reschedule = true;
        Ok(())
    }

    /// Consume the outcome of the running task's last wait.
    pub fn take_wake_reason(&mut self) -> Option<WakeReason> {
        let current = self.current_task?;
        self.tasks[current].wake_reason.take()
    }

    /// Absolute deadline for a wait that starts now.
    pub fn deadline(&self, timeout: Timeout) -> Option<u64> {
        match timeout {
            Timeout::NoWait => Some(self.tick_count),
            Timeout::Ticks(n) => Some(self.tick_count + u64::from(n)),
            Timeout::Forever => None,
        }
    }

    // -----------------------------------------------------------------------
    // Helpers shared with the synchronization primitives
    // -----------------------------------------------------------------------

    /// The running task, or `NoTasks` if the scheduler has not picked one.
    pub(crate) fn running(&self) -> Result<usize, KernelError> {
        match self.current_task {
            Some(c) if self.tasks[c].state == TaskState::Running => Ok(c),
            _ => Err(KernelError::NoTasks),
        }
    }

    /// Whether a wait with this deadline would already be over.
    pub(crate) fn is_expired(&self, deadline: Option<u64>) -> bool {
        matches!(deadline, Some(d) if d <= self.tick_count)
    }

    pub(crate) fn block(&mut self, id: usize, target: WaitTarget, deadline: Option<u64>) {
        self.tasks[id].block(Wait { target, deadline });
        self.needs_reschedule = true;
    }

    /// Make a blocked task ready. Requests a reschedule if it outranks the
    /// running task.
    pub(crate) fn wake(&mut self, id: usize, reason: WakeReason) {
        self.tasks[id].wake(reason);
        if self.outranks_current(id) {
            self.needs_reschedule = true;
        }
    }

    /// Whether task `id` should preempt whatever is on the CPU.
    pub(crate) fn outranks_current(&self, id: usize) -> bool {
        match self.current_task {
            Some(c) if c != id && self.tasks[c].is_runnable() => {
                self.tasks[id].effective_priority > self.tasks[c].effective_priority
            }
            Some(c) if c == id => false,
            _ => true,
        }
    }

    /// Highest effective-priority task blocked on `target`; ties go to the
    /// lowest slot index.
    pub(crate) fn highest_waiter(&self, target: WaitTarget) -> Option<usize> {
        let mut best: Option<usize> = None;
        for i in 0..MAX_TASKS {
            if !self.tasks[i].is_waiting_on(target) {
                continue;
            }
            match best {
                Some(b) if self.tasks[i].effective_priority <= self.tasks[b].effective_priority => {}
                _ => best = Some(i),
            }
        }
        best
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
