//! # Kernel
//!
//! Owns the global scheduler and exposes it to firmware: object creation
//! before start, the scheduler launch, and [`Kernel`], the handle tasks
//! and interrupt handlers use to reach kernel services at run time.
//!
//! ## Startup Sequence
//!
//! ```text
//! reset_handler (cortex-m-rt)
//!   └─► main()
//!         ├─► kernel::init()                  ← Idle task
//!         ├─► kernel::create_binary_semaphore()
//!         ├─► kernel::create_mutex()
//!         ├─► kernel::create_task()           ← Register tasks (×N)
//!         └─► kernel::start()                 ← Launch scheduler
//!               ├─► Set PendSV/SysTick priorities
//!               ├─► Configure SysTick
//!               └─► Start first task via arch::start_first_task()
//! ```

use core::convert::Infallible;
use core::ptr::addr_of_mut;

use cortex_m::peripheral::scb::VectActive;
use cortex_m::peripheral::SCB;

use crate::arch::cortex_m4;
use crate::config::IDLE_PRIORITY;
use crate::error::KernelError;
use crate::scheduler::{Acquire, Scheduler};
use crate::services::{CallContext, IsrServices, TaskServices};
use crate::sync::{self, MutexHandle, SemaphoreHandle, Timeout};
use crate::task::{TaskConfig, TaskEntry, WakeReason};

// ---------------------------------------------------------------------------
// Global scheduler instance
// ---------------------------------------------------------------------------

static mut SCHEDULER: Scheduler = Scheduler::new();

/// Direct access to the global scheduler.
///
/// # Safety
/// The caller must hold exclusive access: inside a critical section, or
/// in PendSV/SysTick which share the lowest priority and cannot nest.
pub(crate) unsafe fn scheduler() -> &'static mut Scheduler {
    &mut *addr_of_mut!(SCHEDULER)
}

fn with_scheduler<R>(f: impl FnOnce(&mut Scheduler) -> R) -> R {
    sync::critical_section(|_cs| {
        // Safety: interrupts are disabled for the duration of `f`.
        f(unsafe { scheduler() })
    })
}

extern "C" fn idle_task(_arg: *mut ()) -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

// ---------------------------------------------------------------------------
// Kernel API (before start)
// ---------------------------------------------------------------------------

/// Create the idle task. Call once, before any other kernel function.
pub fn init() -> Result<(), KernelError> {
    let config = TaskConfig {
        name: "idle",
        priority: IDLE_PRIORITY,
    };
    with_scheduler(|s| s.create_task(idle_task, core::ptr::null_mut(), config))?;
    Ok(())
}

/// Create a new task and register it with the scheduler.
///
/// `arg` is handed to `entry` in R0 and must stay valid for the life of
/// the task.
///
/// # Returns
/// - `Ok(task_id)`: The task's index in the scheduler array.
/// - `Err(KernelError::TaskLimit)`: The task array is full.
pub fn create_task(entry: TaskEntry, arg: *mut (), config: TaskConfig) -> Result<usize, KernelError> {
    with_scheduler(|s| s.create_task(entry, arg, config))
}

pub fn create_binary_semaphore() -> Result<SemaphoreHandle, KernelError> {
    with_scheduler(|s| s.create_binary_semaphore())
}

pub fn create_mutex() -> Result<MutexHandle, KernelError> {
    with_scheduler(|s| s.create_mutex())
}

/// Start the scheduler.
///
/// Configures SysTick, sets the kernel handler priorities, and launches
/// the most urgent task. Only returns if there is nothing to run.
pub fn start(mut core_peripherals: cortex_m::Peripherals) -> Result<Infallible, KernelError> {
    let first_sp = with_scheduler(|s| s.schedule().map(|first| s.tasks[first].stack_pointer))
        .ok_or(KernelError::NoTasks)?;

    cortex_m4::set_interrupt_priorities(&mut core_peripherals.SCB);

    // Re-enabled by start_first_task once the first task owns the CPU.
    cortex_m::interrupt::disable();
    cortex_m4::configure_systick(&mut core_peripherals.SYST);

    info!("scheduler started");
    // Safety: called once, the frame was built by create_task.
    unsafe { cortex_m4::start_first_task(first_sp) }
}

// ---------------------------------------------------------------------------
// Kernel services (after start)
// ---------------------------------------------------------------------------

/// Handle to the running kernel. Zero-sized; copy it into every task and
/// interrupt handler that needs kernel services.
#[derive(Debug, Clone, Copy, Default)]
pub struct Kernel;

fn context() -> CallContext {
    match SCB::vect_active() {
        VectActive::ThreadMode => CallContext::Thread,
        _ => CallContext::Handler,
    }
}

/// Switch away if the last kernel call left a better task ready.
fn reschedule_if_needed() {
    if with_scheduler(|s| s.needs_reschedule) {
        cortex_m4::trigger_pendsv();
    }
}

/// Whether the wait that just ended timed out.
fn timed_out() -> bool {
    with_scheduler(|s| s.take_wake_reason()) == Some(WakeReason::TimedOut)
}

// Safety: `Scheduler::mutex_lock` grants each mutex to one task at a time
// and a blocked caller only returns once ownership was handed to it.
unsafe impl TaskServices for Kernel {
    fn semaphore_take(&self, semaphore: SemaphoreHandle, timeout: Timeout) -> Result<(), KernelError> {
        context().require_task()?;
        let deadline = with_scheduler(|s| s.deadline(timeout));
        loop {
            match with_scheduler(|s| s.semaphore_take(semaphore, deadline))? {
                Acquire::Acquired => return Ok(()),
                Acquire::Blocked => {
                    cortex_m4::trigger_pendsv();
                    if timed_out() {
                        return Err(KernelError::Timeout);
                    }
                }
            }
        }
    }

    fn mutex_lock(&self, mutex: MutexHandle, timeout: Timeout) -> Result<(), KernelError> {
        context().require_task()?;
        let outcome = with_scheduler(|s| {
            let deadline = s.deadline(timeout);
            s.mutex_lock(mutex, deadline)
        })?;
        if outcome == Acquire::Blocked {
            cortex_m4::trigger_pendsv();
            if timed_out() {
                return Err(KernelError::Timeout);
            }
        }
        Ok(())
    }

    fn mutex_unlock(&self, mutex: MutexHandle) -> Result<(), KernelError> {
        context().require_task()?;
        with_scheduler(|s| s.mutex_unlock(mutex))?;
        reschedule_if_needed();
        Ok(())
    }

    fn delay(&self, ticks: u32) {
        if let Err(e) = context().require_task() {
            error!("delay: {}", e);
            return;
        }
        if let Err(e) = with_scheduler(|s| s.delay_current(ticks)) {
            warn!("delay: {}", e);
            return;
        }
        cortex_m4::trigger_pendsv();
    }

    fn busy_wait(&self, cycles: u32) {
        cortex_m::asm::delay(cycles);
    }

    fn delete_current(&self) -> ! {
        if let Err(e) = context().require_task() {
            // PendSV cannot run below an active handler, so no switch
            // would ever happen. Leave the interrupted task alone.
            error!("delete_current: {}, halting", e);
            cortex_m::interrupt::disable();
            loop {
                cortex_m::asm::wfi();
            }
        }
        if let Err(e) = with_scheduler(|s| s.delete_current()) {
            error!("delete_current: {}", e);
        }
        cortex_m4::trigger_pendsv();
        loop {
            cortex_m::asm::wfi();
        }
    }
}

impl IsrServices for Kernel {
    fn semaphore_give_from_isr(&self, semaphore: SemaphoreHandle) -> Result<bool, KernelError> {
        with_scheduler(|s| s.semaphore_give_from_isr(semaphore))
    }

    fn yield_from_isr(&self, higher_priority_woken: bool) {
        if higher_priority_woken {
            cortex_m4::trigger_pendsv();
        }
    }
}
