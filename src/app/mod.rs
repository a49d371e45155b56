//! # Application
//!
//! The three-task demo, written against the kernel service traits so the
//! same code runs on target and under the host test kernels.
//!
//! | Task        | Priority | Behavior                                        |
//! |-------------|----------|-------------------------------------------------|
//! | init        | 3        | Configures the drivers once, then deletes itself |
//! | LED toggler | 2        | One line plus one LED toggle per button event    |
//! | counter     | 1        | Header and `0..=10` under the mutex, forever      |
//!
//! The serial port and the LED are one [`Outputs`] value behind a kernel
//! mutex. The button interrupt only ever touches the event semaphore.

pub mod button;
pub mod counter;
pub mod init;
pub mod led_toggler;

pub use button::ButtonIsr;
pub use counter::{CounterTask, COUNTER_HEADER};
pub use init::InitTask;
pub use led_toggler::{LedToggler, TogglerState, LED_TOGGLER_LINE};

use crate::sync::SharedResource;

/// Everything the tasks write to. Only reachable through the output mutex.
pub struct Outputs<S, L> {
    pub serial: S,
    pub led: L,
}

impl<S, L> Outputs<S, L> {
    pub const fn new(serial: S, led: L) -> Self {
        Self { serial, led }
    }
}

pub type SharedOutputs<S, L> = SharedResource<Outputs<S, L>>;

// ---------------------------------------------------------------------------
// Scenario tests: application code on top of the real scheduler
// ---------------------------------------------------------------------------
