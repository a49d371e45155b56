//! # Cortex-M4 Port Layer
//!
//! Hardware-specific code for the ARM Cortex-M4 (Thumb-2) processor.
//! Implements context switching via PendSV, SysTick timer configuration,
//! and the initial stack frame of a new task.
//!
//! ## Context Switch Mechanism
//!
//! The Cortex-M4 uses a split-stack model:
//! - **MSP** (Main Stack Pointer): used by the kernel and interrupt handlers
//! - **PSP** (Process Stack Pointer): used by tasks in Thread mode
//!
//! On exception entry, the hardware automatically stacks R0–R3, R12, LR, PC,
//! and xPSR onto the process stack. The PendSV handler manually saves and
//! restores R4–R11, which completes the full context save/restore.
//!
//! ## Interrupt Priorities
//!
//! - SysTick: 0xFF (lowest)
//! - PendSV: 0xFF (lowest), so a switch never preempts another handler
//! - Device interrupts (the button) keep their reset priority and run
//!   above both
//!
//! Targets without an enabled FPU only; the switch does not stack S16–S31.

use core::arch::{asm, naked_asm};

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{SCB, SYST};

use crate::config::{STACK_SIZE, SYSTEM_CLOCK_HZ, TICK_HZ};
use crate::kernel;
use crate::sync;
use crate::task::TaskControlBlock;

/// Thumb bit in xPSR; must be set for every task.
const XPSR_THUMB: u32 = 1 << 24;

/// Words in a fresh frame: R4–R11 (software) then R0–R3, R12, LR, PC, xPSR.
const FRAME_WORDS: usize = 16;

// ---------------------------------------------------------------------------
// Stack frame construction
// ---------------------------------------------------------------------------

/// Build the initial frame of a new task so the first switch to it looks
/// like a return from an exception.
///
/// ```text
///   high ┌──────────┐ ← top of stack (8-byte aligned)
///        │  xPSR    │  Thumb bit
///        │  PC      │  entry
///        │  LR      │  task_exit
///        │  R12     │
///        │  R3–R1   │
///        │  R0      │  arg
///        │  R11–R4  │  zero
///   low  └──────────┘ ← stack_pointer
/// ```
pub fn init_task_stack(tcb: &mut TaskControlBlock) {
    let Some(entry) = tcb.entry else {
        return;
    };
    let base = tcb.stack.0.as_mut_ptr() as *mut u32;
    let words = STACK_SIZE / core::mem::size_of::<u32>();

    // Safety: the frame occupies the top FRAME_WORDS words of this task's
    // own stack, which nothing else references while the task is not
    // running.
    unsafe {
        let sp = base.add(words - FRAME_WORDS);
        for i in 0..8 {
            sp.add(i).write(0);
        }
        sp.add(8).write(tcb.arg as usize as u32);
        for i in 9..13 {
            sp.add(i).write(0);
        }
        sp.add(13).write(task_exit as usize as u32);
        // Stacked PC must have the Thumb bit clear.
        sp.add(14).write(entry as usize as u32 & !1);
        sp.add(15).write(XPSR_THUMB);
        tcb.stack_pointer = sp;
    }
}

/// Landing pad should a task entry ever return.
extern "C" fn task_exit() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

// ---------------------------------------------------------------------------
// SysTick configuration
// ---------------------------------------------------------------------------

/// Configure the SysTick timer for the scheduler tick at `TICK_HZ`.
pub fn configure_systick(syst: &mut SYST) {
    let reload = SYSTEM_CLOCK_HZ / TICK_HZ - 1;
    syst.set_reload(reload);
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_counter();
    syst.enable_interrupt();
}

// ---------------------------------------------------------------------------
// PendSV trigger
// ---------------------------------------------------------------------------

/// Request a context switch. Taken once no other handler is active; from
/// thread mode that is immediately.
#[inline]
pub fn trigger_pendsv() {
    SCB::set_pendsv();
    cortex_m::asm::dsb();
    cortex_m::asm::isb();
}

// ---------------------------------------------------------------------------
// Interrupt priority configuration
// ---------------------------------------------------------------------------

/// Set PendSV and SysTick to the lowest interrupt priority.
pub fn set_interrupt_priorities(scb: &mut SCB) {
    // Safety: lowering the priority of the kernel's own handlers cannot
    // break a priority-based critical section.
    unsafe {
        scb.set_priority(SystemHandler::PendSV, 0xFF);
        scb.set_priority(SystemHandler::SysTick, 0xFF);
    }
}

// ---------------------------------------------------------------------------
// First task launch
// ---------------------------------------------------------------------------

/// Start the first task by switching Thread mode to PSP and branching to
/// its entry. Interrupts must be disabled on entry; they are enabled just
/// before the branch.
///
/// # Safety
/// Must only be called once, with a frame built by `init_task_stack`.
pub unsafe fn start_first_task(psp: *const u32) -> ! {
    asm!(
        // Skip the software-saved R4-R11
        "adds r0, #32",
        "msr psp, r0",

        // Thread mode uses PSP from here on (CONTROL.SPSEL = 1)
        "movs r0, #2",
        "msr control, r0",
        "isb",

        // Unwind the hardware frame by hand
        "pop {{r0-r3, r12}}",  // R0 = task argument
        "pop {{r4}}",          // LR, unused
        "pop {{r5}}",          // PC
        "pop {{r6}}",          // xPSR, unused
        "orr r5, r5, #1",      // back to a Thumb address

        "cpsie i",
        "bx r5",

        in("r0") psp,
        options(noreturn)
    );
}

// ---------------------------------------------------------------------------
// PendSV handler (context switch)
// ---------------------------------------------------------------------------

/// PendSV exception handler. Performs the actual context switch.
///
/// ## Sequence
/// 1. Save R4–R11 onto the current task's stack (PSP)
/// 2. Store the updated PSP into the current task's TCB
/// 3. Call the scheduler to select the next task
/// 4. Load the next task's PSP from its TCB
/// 5. Restore R4–R11 from the new task's stack
/// 6. Return from exception (hardware restores R0–R3, R12, LR, PC, xPSR)
///
/// # Safety
/// Naked; entered by the hardware only.
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "mrs r0, psp",
        "stmdb r0!, {{r4-r11}}",
        "bl {save_context}",

        "bl {do_schedule}",

        "ldmia r0!, {{r4-r11}}",
        "msr psp, r0",

        // EXC_RETURN: thread mode, process stack
        "mvn lr, #2",
        "bx lr",

        save_context = sym save_current_context,
        do_schedule = sym do_context_switch,
    );
}

/// Save the outgoing task's stack pointer. Called from PendSV.
extern "C" fn save_current_context(psp: *mut u32) {
    sync::critical_section(|_cs| {
        // Safety: interrupts are off and PendSV cannot nest.
        let s = unsafe { kernel::scheduler() };
        if let Some(current) = s.current_task {
            s.tasks[current].stack_pointer = psp;
        }
    });
}

/// Pick the next task and return its saved PSP. Called from PendSV.
extern "C" fn do_context_switch() -> *mut u32 {
    sync::critical_section(|_cs| {
        // Safety: interrupts are off and PendSV cannot nest.
        let s = unsafe { kernel::scheduler() };
        let prev = s.current_task;
        match s.schedule() {
            Some(next) => s.tasks[next].stack_pointer,
            // The idle task makes this unreachable; resume the old task.
            None => {
                s.current_task = prev;
                prev.map_or(core::ptr::null_mut(), |p| s.tasks[p].stack_pointer)
            }
        }
    })
}

// ---------------------------------------------------------------------------
// SysTick handler
// ---------------------------------------------------------------------------

/// SysTick exception handler, the scheduler tick entry point. Triggers
/// PendSV when a woken task should preempt the running one.
#[no_mangle]
pub extern "C" fn SysTick() {
    let reschedule = sync::critical_section(|_cs| {
        // Safety: inside a critical section.
        let s = unsafe { kernel::scheduler() };
        s.tick();
        s.needs_reschedule
    });

    if reschedule {
        trigger_pendsv();
    }
}
