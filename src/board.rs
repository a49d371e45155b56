//! Board support for the reference Cortex-M4 board.
//!
//! No vendor register access: serial text goes out over RTT through
//! `defmt`, LED state is tracked in memory and logged, and the button
//! interrupt is unmasked, acknowledged and dispatched through the core
//! NVIC only.

use core::cell::Cell;
use core::sync::atomic::{AtomicU8, Ordering};

use cortex_m::interrupt::{InterruptNumber, Mutex};
use cortex_m::peripheral::NVIC;
use cortex_m_rt::exception;

use trio::drivers::{
    DigitalIo, Direction, EdgeHandler, InterruptAck, InterruptSource, Led, LedColor, OutputChannel, Pin, Port,
    UartConfig,
};

/// A device interrupt line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Irq(pub u16);

// Safety: every `Irq` built here is a GPIO line that exists on the chip.
unsafe impl InterruptNumber for Irq {
    fn number(self) -> u16 {
        self.0
    }
}

/// GPIO port interrupt lines.
fn port_irq(port: Port) -> Irq {
    match port {
        Port::A => Irq(0),
        Port::B => Irq(1),
        Port::C => Irq(2),
        Port::D => Irq(3),
        Port::E => Irq(4),
        Port::F => Irq(30),
    }
}

#[derive(Clone, Copy)]
struct Registration {
    irq: Irq,
    handler: &'static dyn EdgeHandler,
}

static BUTTON: Mutex<Cell<Option<Registration>>> = Mutex::new(Cell::new(None));

// ---------------------------------------------------------------------------
// Serial
// ---------------------------------------------------------------------------

const LINE_CAPACITY: usize = 64;

/// Line-buffered serial port over RTT. One `defmt` frame per line.
pub struct RttSerial {
    line: [u8; LINE_CAPACITY],
    len: usize,
}

impl RttSerial {
    pub const fn new() -> Self {
        Self {
            line: [0; LINE_CAPACITY],
            len: 0,
        }
    }

    fn flush(&mut self) {
        let text = core::str::from_utf8(&self.line[..self.len]).unwrap_or("<invalid utf-8>");
        defmt::println!("{=str}", text.trim_end_matches(['\r', '\n']));
        self.len = 0;
    }
}

impl OutputChannel for RttSerial {
    fn configure(&mut self, config: UartConfig) {
        defmt::info!("serial configured: {}", config);
    }

    fn send_str(&mut self, text: &str) {
        for &byte in text.as_bytes() {
            if self.len == LINE_CAPACITY {
                self.flush();
            }
            self.line[self.len] = byte;
            self.len += 1;
            if byte == b'\n' {
                self.flush();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// LED
// ---------------------------------------------------------------------------

pub struct BoardLed {
    /// One bit per color, set while lit.
    lit: AtomicU8,
}

impl BoardLed {
    pub const fn new() -> Self {
        Self { lit: AtomicU8::new(0) }
    }
}

fn color_bit(color: LedColor) -> u8 {
    match color {
        LedColor::Red => 1 << 0,
        LedColor::Blue => 1 << 1,
        LedColor::Green => 1 << 2,
    }
}

impl Led for BoardLed {
    fn initialize(&mut self) {
        self.lit.store(0, Ordering::Relaxed);
        defmt::info!("LEDs off");
    }

    fn toggle(&mut self, color: LedColor) {
        let bit = color_bit(color);
        let before = self.lit.fetch_xor(bit, Ordering::Relaxed);
        defmt::info!("LED {} {}", color, if before & bit == 0 { "on" } else { "off" });
    }
}

// ---------------------------------------------------------------------------
// GPIO and pin interrupts
// ---------------------------------------------------------------------------

pub struct BoardDio;

impl DigitalIo for BoardDio {
    fn configure_pin(&mut self, port: Port, pin: Pin, direction: Direction) {
        defmt::debug!("pin {}{} as {}", port, pin, direction);
    }
}

pub struct BoardIntc;

impl InterruptAck for BoardIntc {
    /// Clears the pending NVIC line only. The GPIO port's own interrupt
    /// flag is not cleared here; without a vendor HAL doing that the line
    /// pends again as soon as the handler returns.
    fn acknowledge(&mut self, port: Port, pin: Pin) {
        defmt::trace!("ack {}{}", port, pin);
        NVIC::unpend(port_irq(port));
    }
}

impl InterruptSource for BoardIntc {
    fn configure(&mut self, port: Port, pin: Pin) {
        let irq = port_irq(port);
        NVIC::unpend(irq);
        defmt::debug!("edge interrupt on {}{} (irq {})", port, pin, irq.0);
    }

    fn register_callback(&mut self, port: Port, pin: Pin, handler: &'static dyn EdgeHandler) {
        let irq = port_irq(port);
        cortex_m::interrupt::free(|cs| {
            BUTTON.borrow(cs).set(Some(Registration { irq, handler }));
        });
        defmt::debug!("button handler on {}{}", port, pin);
        // Safety: the handler is registered before the line is unmasked.
        unsafe { NVIC::unmask(irq) };
    }
}

#[exception]
unsafe fn DefaultHandler(irqn: i16) {
    let registered = cortex_m::interrupt::free(|cs| BUTTON.borrow(cs).get());
    match registered {
        // One registered pin per port line.
        Some(r) if i32::from(irqn) == i32::from(r.irq.0) => r.handler.on_edge(&mut BoardIntc),
        _ => defmt::warn!("unexpected interrupt {}", irqn),
    }
}
