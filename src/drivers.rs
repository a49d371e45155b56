//! # Driver Contracts
//!
//! The peripherals the application talks to, reduced to the operations it
//! needs. The board layer of the firmware implements these; tests use
//! recording mocks.

/// GPIO port identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    A,
    B,
    C,
    D,
    E,
    F,
}

/// Pin number within a port (0–7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pin(pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedColor {
    Red,
    Blue,
    Green,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    Disabled,
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    One,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WordSize {
    Five,
    Six,
    Seven,
    Eight,
}

/// Serial line settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartConfig {
    pub baud_rate: u32,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub word_size: WordSize,
}

/// Text output channel (a UART on the reference board).
///
/// Calls are synchronous and must return quickly enough that holding the
/// output mutex across them does not distort task timing.
pub trait OutputChannel {
    fn configure(&mut self, config: UartConfig);

    fn send_str(&mut self, text: &str);

    /// Send `text` followed by a CRLF terminator.
    fn send_line(&mut self, text: &str) {
        self.send_str(text);
        self.send_str("\r\n");
    }

    /// Send `value` in decimal with no terminator.
    fn send_integer(&mut self, value: u32) {
        let mut buf = [0u8; 10];
        let mut i = buf.len();
        let mut v = value;
        loop {
            i -= 1;
            buf[i] = b'0' + (v % 10) as u8;
            v /= 10;
            if v == 0 {
                break;
            }
        }
        // Only ASCII digits were written.
        if let Ok(digits) = core::str::from_utf8(&buf[i..]) {
            self.send_str(digits);
        }
    }
}

pub trait Led {
    fn initialize(&mut self);
    fn toggle(&mut self, color: LedColor);
}

pub trait DigitalIo {
    fn configure_pin(&mut self, port: Port, pin: Pin, direction: Direction);
}

/// Clears a pending edge so it does not fire again.
pub trait InterruptAck {
    fn acknowledge(&mut self, port: Port, pin: Pin);
}

/// Callback run by the board when a registered pin edge fires.
///
/// Runs in interrupt context: must not block.
pub trait EdgeHandler: Sync {
    fn on_edge(&self, ack: &mut dyn InterruptAck);
}

/// Pin-edge interrupt controller.
pub trait InterruptSource: InterruptAck {
    fn configure(&mut self, port: Port, pin: Pin);
    fn register_callback(&mut self, port: Port, pin: Pin, handler: &'static dyn EdgeHandler);
}
