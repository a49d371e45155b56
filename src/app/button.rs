//! Button interrupt handler. Runs in interrupt context: gives the event
//! semaphore, clears the edge, and asks for a context switch when the
//! woken task should run next. It never blocks and never touches the
//! output mutex.

use crate::drivers::{EdgeHandler, InterruptAck, Pin, Port};
use crate::services::IsrServices;
use crate::sync::SemaphoreHandle;

pub struct ButtonIsr<K> {
    kernel: K,
    event: SemaphoreHandle,
    port: Port,
    pin: Pin,
}

impl<K: IsrServices> ButtonIsr<K> {
    pub const fn new(kernel: K, event: SemaphoreHandle, port: Port, pin: Pin) -> Self {
        Self {
            kernel,
            event,
            port,
            pin,
        }
    }

    pub fn handle(&self, ack: &mut dyn InterruptAck) {
        let woken = match self.kernel.semaphore_give_from_isr(self.event) {
            Ok(woken) => woken,
            Err(e) => {
                error!("button event lost: {}", e);
                false
            }
        };
        ack.acknowledge(self.port, self.pin);
        self.kernel.yield_from_isr(woken);
    }
}

impl<K: IsrServices + Sync> EdgeHandler for ButtonIsr<K> {
    fn on_edge(&self, ack: &mut dyn InterruptAck) {
        self.handle(ack);
    }
}
