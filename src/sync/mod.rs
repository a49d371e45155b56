//! # Synchronization Primitives
//!
//! Kernel objects used by tasks and interrupt handlers:
//!
//! - [`semaphore`]: binary semaphore, given from ISRs, taken by tasks
//! - [`mutex`]: priority-inheriting mutex, task context only
//! - [`shared`]: a value guarded by a kernel mutex, with an RAII guard
//!
//! Plus the interrupt-safe critical section used by the kernel API on
//! target. All shared scheduler state must be accessed within a critical
//! section to prevent data races between tasks and interrupt handlers.

pub mod mutex;
pub mod semaphore;
pub mod shared;

pub use mutex::{MutexHandle, PiMutex};
pub use semaphore::{BinarySemaphore, SemaphoreHandle};
pub use shared::{ResourceGuard, SharedResource};

/// How long a blocking call may wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Timeout {
    /// Fail with `KernelError::Timeout` instead of blocking.
    NoWait,
    /// Give up after this many ticks.
    Ticks(u32),
    /// Block until the object becomes available.
    Forever,
}

/// Execute a closure within a critical section (interrupts disabled).
///
/// Interrupts are disabled on entry and restored on exit, ensuring
/// atomicity of the enclosed operation. Keep critical sections as short
/// as possible to minimize interrupt latency.
///
/// # Usage
/// ```ignore
/// sync::critical_section(|_cs| {
///     // Access shared state safely
/// });
/// ```
#[cfg(target_arch = "arm")]
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(&cortex_m::interrupt::CriticalSection) -> R,
{
    cortex_m::interrupt::free(f)
}
