//! Continuous task: prints a counter burst under the output mutex, forever.
//!
//! The per-value work is a non-yielding busy wait, so while this task
//! holds the mutex every lower-priority task is starved and the LED
//! toggler waits (with this task boosted to its priority) for the whole
//! burst. That hold time is what the demo is about; its length is set by
//! `AppConfig::busy_wait_cycles`.

use super::SharedOutputs;
use crate::config::AppConfig;
use crate::drivers::{Led, OutputChannel};
use crate::error::KernelError;
use crate::services::TaskServices;
use crate::sync::Timeout;

/// Header line emitted at the start of every burst.
pub const COUNTER_HEADER: &str = "This is the Counter Task";

pub struct CounterTask<'a, K, S, L> {
    kernel: K,
    outputs: &'a SharedOutputs<S, L>,
    config: AppConfig,
}

impl<'a, K, S, L> CounterTask<'a, K, S, L>
where
    K: TaskServices,
    S: OutputChannel,
    L: Led,
{
    pub fn new(kernel: K, outputs: &'a SharedOutputs<S, L>, config: AppConfig) -> Self {
        Self {
            kernel,
            outputs,
            config,
        }
    }

    /// One pass: header plus `0..=counter_max`, each value followed by the
    /// simulated work, all inside a single critical section.
    pub fn burst(&self) -> Result<(), KernelError> {
        let mut out = self.outputs.lock(&self.kernel, Timeout::Forever)?;
        out.serial.send_line(COUNTER_HEADER);
        for counter in 0..=self.config.counter_max {
            out.serial.send_integer(u32::from(counter));
            out.serial.send_str("\r\n");
            self.kernel.busy_wait(self.config.busy_wait_cycles);
        }
        Ok(())
    }

    pub fn run(self) -> ! {
        loop {
            if let Err(e) = self.burst() {
                warn!("counter: {}", e);
            }
        }
    }
}
