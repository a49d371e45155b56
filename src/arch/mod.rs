//! # Architecture Abstraction Layer
//!
//! Provides a hardware abstraction boundary for the scheduler.
//! Currently implements the Cortex-M4 port: stack frame construction,
//! first-task launch, PendSV context switch and the SysTick tick. Only
//! compiled for ARM targets; everything it calls into is host-testable.

pub mod cortex_m4;
