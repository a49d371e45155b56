//! # Trio
//!
//! A small fixed-priority preemptive RTOS for ARM Cortex-M4
//! microcontrollers, and the three-task demo that runs on it.
//!
//! ## Overview
//!
//! A button interrupt signals a binary semaphore. The LED toggler task
//! waits on that semaphore and the counter task runs continuously. Both
//! write to one shared output channel guarded by a priority-inheriting
//! mutex. A one-shot init task brings up the drivers and then deletes
//! itself.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │        Application (app/): init · toggler · counter     │
//! │                 button ISR · Outputs                    │
//! ├────────────────────────────────────────────────────────┤
//! │   Kernel Services (services.rs)   Drivers (drivers.rs)  │
//! │   TaskServices · IsrServices      OutputChannel · Led   │
//! ├────────────────────────────────────────────────────────┤
//! │                 Kernel API (kernel.rs)                  │
//! │       init() · create_task() · start() · Kernel         │
//! ├──────────────┬─────────────────────────────────────────┤
//! │  Scheduler   │   Sync Primitives (sync/)               │
//! │  scheduler.rs│   ─ semaphore: take / give_from_isr     │
//! │  ─ tick()    │   ─ mutex: lock / unlock, inheritance   │
//! │  ─ schedule()│   ─ shared: SharedResource + guard      │
//! ├──────────────┴─────────────────────────────────────────┤
//! │              Task Model (task.rs)                       │
//! │       TCB · TaskState · Wait · WakeReason               │
//! ├────────────────────────────────────────────────────────┤
//! │            Arch Port (arch/cortex_m4.rs)                │
//! │    PendSV · SysTick · Context Switch · Stack Init      │
//! ├────────────────────────────────────────────────────────┤
//! │         ARM Cortex-M4 Hardware (Thumb-2)                │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Scheduling Model
//!
//! - Unique fixed priorities, higher number runs first. No time slicing.
//! - A task gives up the CPU only by blocking (semaphore, mutex, delay),
//!   by deleting itself, or when a higher-priority task becomes ready.
//! - A mutex holder blocking a higher-priority task inherits its priority
//!   until it unlocks.
//! - An idle task at priority 0 runs `wfi` when nothing else can run.
//!
//! ## Memory Model
//!
//! - **No heap**: all state is statically allocated
//! - **Fixed-size tables**: `MAX_TASKS` TCBs, `MAX_SEMAPHORES` semaphores,
//!   `MAX_MUTEXES` mutexes, all inside the `Scheduler`
//! - **Per-task stack**: `[u8; STACK_SIZE]` inline in the TCB
//! - **Critical sections**: `cortex_m::interrupt::free()` for kernel state
//!
//! Everything above the arch port is plain Rust and is unit tested on
//! the host.

#![cfg_attr(not(test), no_std)]

// This must go first so the logging macros are visible to every module.
mod fmt;

pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod scheduler;
pub mod services;
pub mod sync;
pub mod task;

#[cfg(target_arch = "arm")]
pub mod arch;
#[cfg(target_arch = "arm")]
pub mod kernel;

#[cfg(test)]
mod testutil;

pub use error::KernelError;
