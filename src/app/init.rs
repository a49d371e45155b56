//! One-shot setup task. Runs first at the highest priority, brings up the
//! drivers, then deletes itself so its slot and priority level are freed.

use super::SharedOutputs;
use crate::config::{BUTTON_DIRECTION, UART_CONFIG};
use crate::drivers::{DigitalIo, EdgeHandler, InterruptSource, Led, OutputChannel, Pin, Port};
use crate::error::KernelError;
use crate::services::TaskServices;
use crate::sync::Timeout;

pub struct InitTask<'a, K, S, L, D, I> {
    kernel: K,
    outputs: &'a SharedOutputs<S, L>,
    dio: D,
    intc: I,
    button: &'static dyn EdgeHandler,
    port: Port,
    pin: Pin,
}

impl<'a, K, S, L, D, I> InitTask<'a, K, S, L, D, I>
where
    K: TaskServices,
    S: OutputChannel,
    L: Led,
    D: DigitalIo,
    I: InterruptSource,
{
    pub fn new(
        kernel: K,
        outputs: &'a SharedOutputs<S, L>,
        dio: D,
        intc: I,
        button: &'static dyn EdgeHandler,
        port: Port,
        pin: Pin,
    ) -> Self {
        Self {
            kernel,
            outputs,
            dio,
            intc,
            button,
            port,
            pin,
        }
    }

    /// Configure the output channel, the button pin and its interrupt, then
    /// the LED. Driver calls are assumed to succeed.
    pub fn setup(&mut self) -> Result<(), KernelError> {
        let mut out = self.outputs.lock(&self.kernel, Timeout::Forever)?;
        out.serial.configure(UART_CONFIG);
        self.dio.configure_pin(self.port, self.pin, BUTTON_DIRECTION);
        self.intc.configure(self.port, self.pin);
        self.intc.register_callback(self.port, self.pin, self.button);
        out.led.initialize();
        Ok(())
    }

    pub fn run(mut self) -> ! {
        match self.setup() {
            Ok(()) => info!("init complete"),
            Err(e) => error!("init failed: {}", e),
        }
        self.kernel.delete_current()
    }
}
