//! # Task Control Block
//!
//! Defines the task model for Trio. Each task has a fixed base priority,
//! an effective priority that may be raised by mutex priority inheritance,
//! and a record of what it is blocked on.

use crate::config::STACK_SIZE;
use crate::sync::{MutexHandle, SemaphoreHandle};

/// Task entry point. Receives the context pointer given at creation and
/// never returns.
pub type TaskEntry = extern "C" fn(arg: *mut ()) -> !;

// ---------------------------------------------------------------------------
// Task state machine
// ---------------------------------------------------------------------------

/// Execution state of a task in the scheduler's state machine.
///
/// ```text
///   ┌──────────┐     schedule()      ┌─────────┐
///   │  Ready   │ ──────────────────► │ Running │
///   └──────────┘                     └─────────┘
///        ▲          preempted             │
///        ├────────────────────────────────┤
///        │                                │ take() / lock() / delay()
///        │          wake()                ▼
///        │                          ┌──────────┐
///        └───────────────────────── │ Blocked  │
///                                   └──────────┘
///   Running ── delete_current() ──► Terminated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TaskState {
    /// Task is ready to run and waiting for the CPU.
    Ready,
    /// Task is currently executing on the CPU.
    Running,
    /// Task is blocked on a semaphore, a mutex or a delay.
    Blocked,
    /// Task deleted itself or the slot was never allocated.
    Terminated,
}

/// What a blocked task is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaitTarget {
    Semaphore(SemaphoreHandle),
    Mutex(MutexHandle),
    Delay,
}

/// An in-progress wait: the target plus an absolute tick deadline
/// (`None` waits forever).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Wait {
    pub target: WaitTarget,
    pub deadline: Option<u64>,
}

/// Why a blocked task was made ready again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeReason {
    /// The semaphore was given, or mutex ownership was handed over.
    Signaled,
    /// The deadline passed first. Also ends every delay.
    TimedOut,
}

// ---------------------------------------------------------------------------
// Task configuration (immutable after creation)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct TaskConfig {
    /// Name shown in logs.
    pub name: &'static str,
    /// Base priority (higher = more important). Each task should use a
    /// distinct level; equal priorities are not time-sliced.
    pub priority: u8,
}

// ---------------------------------------------------------------------------
// Task Control Block
// ---------------------------------------------------------------------------

/// Per-task stack. Aligned to 8 bytes as required by ARM AAPCS.
#[repr(C, align(8))]
pub struct Stack(pub [u8; STACK_SIZE]);

/// Task Control Block (TCB).
///
/// TCBs are stored in a fixed array in the scheduler. The
/// `stack_pointer` field points into `stack` and is updated on every
/// context switch.
pub struct TaskControlBlock {
    /// Index in the scheduler's task array.
    pub id: usize,

    pub name: &'static str,

    pub state: TaskState,

    /// Priority given at creation.
    pub base_priority: u8,

    /// Priority the scheduler actually uses. Equal to `base_priority`
    /// unless raised by a higher-priority task waiting on a mutex this
    /// task holds.
    pub effective_priority: u8,

    /// Set while `state == Blocked`.
    pub wait: Option<Wait>,

    /// Outcome of the last wait, consumed by the kernel API on resume.
    pub wake_reason: Option<WakeReason>,

    pub entry: Option<TaskEntry>,

    /// Context pointer passed to `entry` in R0.
    pub arg: *mut (),

    /// Saved stack pointer (PSP). Updated on context switch.
    pub stack_pointer: *mut u32,

    pub stack: Stack,

    /// Whether this slot is allocated (true) or free (false).
    pub active: bool,
}

// Safety: the raw pointers in a TCB only ever point into the task's own
// stack or at its 'static context object, and TCBs are only touched
// inside critical sections.
unsafe impl Send for TaskControlBlock {}
unsafe impl Sync for TaskControlBlock {}

impl TaskControlBlock {
    /// Create an empty (unallocated) TCB. Used to initialize the static array.
    pub const fn empty() -> Self {
        Self {
            id: 0,
            name: "",
            state: TaskState::Terminated,
            base_priority: 0,
            effective_priority: 0,
            wait: None,
            wake_reason: None,
            entry: None,
            arg: core::ptr::null_mut(),
            stack_pointer: core::ptr::null_mut(),
            stack: Stack([0u8; STACK_SIZE]),
            active: false,
        }
    }

    /// Allocate this slot for a new task. The task starts Ready; its stack
    /// frame is built separately by the arch layer.
    pub fn init(&mut self, id: usize, config: TaskConfig, entry: TaskEntry, arg: *mut ()) {
        self.id = id;
        self.name = config.name;
        self.state = TaskState::Ready;
        self.base_priority = config.priority;
        self.effective_priority = config.priority;
        self.wait = None;
        self.wake_reason = None;
        self.entry = Some(entry);
        self.arg = arg;
        self.stack_pointer = core::ptr::null_mut();
        self.active = true;
    }

    /// Ready or Running, and allocated.
    #[inline]
    pub fn is_runnable(&self) -> bool {
        self.active && matches!(self.state, TaskState::Ready | TaskState::Running)
    }

    /// Whether this task is blocked on `target`.
    #[inline]
    pub fn is_waiting_on(&self, target: WaitTarget) -> bool {
        self.active
            && self.state == TaskState::Blocked
            && matches!(self.wait, Some(w) if w.target == target)
    }

    pub fn block(&mut self, wait: Wait) {
        self.state = TaskState::Blocked;
        self.wait = Some(wait);
        self.wake_reason = None;
    }

    pub fn wake(&mut self, reason: WakeReason) {
        self.state = TaskState::Ready;
        self.wait = None;
        self.wake_reason = Some(reason);
    }

    /// Free the slot for reuse.
    pub fn terminate(&mut self) {
        self.state = TaskState::Terminated;
        self.wait = None;
        self.wake_reason = None;
        self.entry = None;
        self.arg = core::ptr::null_mut();
        self.active = false;
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
