//! Event-driven task: reacts to button presses signaled by the button ISR.

use super::SharedOutputs;
use crate::config::{AppConfig, TOGGLE_LED};
use crate::drivers::{Led, OutputChannel};
use crate::error::KernelError;
use crate::services::TaskServices;
use crate::sync::{SemaphoreHandle, Timeout};

/// Line emitted once per consumed button event.
pub const LED_TOGGLER_LINE: &str = "This is LedToggler Task";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TogglerState {
    /// Created, the startup drain has not run yet.
    DrainingInitialSignal,
    /// Blocked on (or about to block on) the event semaphore.
    Waiting,
    /// Woken by a button press, working inside the critical section.
    Signaled,
}

pub struct LedToggler<'a, K, S, L> {
    kernel: K,
    event: SemaphoreHandle,
    outputs: &'a SharedOutputs<S, L>,
    config: AppConfig,
    state: TogglerState,
}

impl<'a, K, S, L> LedToggler<'a, K, S, L>
where
    K: TaskServices,
    S: OutputChannel,
    L: Led,
{
    pub fn new(kernel: K, event: SemaphoreHandle, outputs: &'a SharedOutputs<S, L>, config: AppConfig) -> Self {
        Self {
            kernel,
            event,
            outputs,
            config,
            state: TogglerState::DrainingInitialSignal,
        }
    }

    pub fn state(&self) -> TogglerState {
        self.state
    }

    /// Discard any credit left over from before the scheduler started, so
    /// only presses after startup produce output.
    pub fn drain(&mut self) {
        match self.kernel.semaphore_take(self.event, Timeout::NoWait) {
            Ok(()) => debug!("discarded stale button event"),
            Err(KernelError::Timeout) => {}
            Err(e) => warn!("startup drain failed: {}", e),
        }
        self.state = TogglerState::Waiting;
    }

    /// Block until the next button event, then run one critical section.
    pub fn step(&mut self) -> Result<(), KernelError> {
        self.state = TogglerState::Waiting;
        self.kernel.semaphore_take(self.event, Timeout::Forever)?;
        self.state = TogglerState::Signaled;
        let result = self.critical_section();
        self.state = TogglerState::Waiting;
        result
    }

    /// Emit the line, toggle the LED, and keep the mutex for the hold time.
    fn critical_section(&mut self) -> Result<(), KernelError> {
        let mut out = self.outputs.lock(&self.kernel, Timeout::Forever)?;
        out.serial.send_line(LED_TOGGLER_LINE);
        out.led.toggle(TOGGLE_LED);
        self.kernel.delay(self.config.hold_ticks);
        Ok(())
    }

    pub fn run(mut self) -> ! {
        self.drain();
        loop {
            if let Err(e) = self.step() {
                warn!("led toggler: {}", e);
            }
        }
    }
}
