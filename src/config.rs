//! # Trio Configuration
//!
//! Compile-time constants governing the kernel and the demo application.
//! All limits are fixed at compile time, no dynamic allocation.

use crate::drivers::{Direction, LedColor, Parity, Pin, Port, StopBits, UartConfig, WordSize};

// ---------------------------------------------------------------------------
// Kernel limits
// ---------------------------------------------------------------------------

/// Maximum number of tasks the system can manage simultaneously,
/// including the idle task. Each slot carries its own `STACK_SIZE` stack.
pub const MAX_TASKS: usize = 6;

/// Number of binary semaphore slots in the kernel object table.
pub const MAX_SEMAPHORES: usize = 4;

/// Number of mutex slots in the kernel object table.
pub const MAX_MUTEXES: usize = 4;

/// Per-task stack size in bytes. Must be large enough for the
/// deepest call chain plus the hardware exception frame (32 bytes)
/// and the software-saved context (32 bytes for R4–R11).
pub const STACK_SIZE: usize = 1024;

/// SysTick frequency in Hz. One tick is one millisecond.
pub const TICK_HZ: u32 = 1000;

/// System clock frequency in Hz (16 MHz precision internal oscillator).
pub const SYSTEM_CLOCK_HZ: u32 = 16_000_000;

/// Convert milliseconds to scheduler ticks, rounding up.
pub const fn ms_to_ticks(ms: u32) -> u32 {
    (ms * TICK_HZ + 999) / 1000
}

// ---------------------------------------------------------------------------
// Task priorities (higher = more urgent)
// ---------------------------------------------------------------------------

/// The kernel idle task. Always ready, never does work.
pub const IDLE_PRIORITY: u8 = 0;

/// Continuous counter task.
pub const COUNTER_PRIORITY: u8 = 1;

/// Button-driven LED toggler task.
pub const LED_TOGGLER_PRIORITY: u8 = 2;

/// One-shot hardware setup task. Must outrank every other task so it
/// runs to completion before they do any work.
pub const INIT_PRIORITY: u8 = 3;

// ---------------------------------------------------------------------------
// Board wiring
// ---------------------------------------------------------------------------

/// Push button SW1 on PF0.
pub const BUTTON_PORT: Port = Port::F;
pub const BUTTON_PIN: Pin = Pin(0);
pub const BUTTON_DIRECTION: Direction = Direction::Input;

/// LED toggled on each button press.
pub const TOGGLE_LED: LedColor = LedColor::Blue;

/// UART0 line settings.
pub const UART_CONFIG: UartConfig = UartConfig {
    baud_rate: 9600,
    parity: Parity::Disabled,
    stop_bits: StopBits::One,
    word_size: WordSize::Eight,
};

// ---------------------------------------------------------------------------
// Application timing
// ---------------------------------------------------------------------------

/// How long the LED toggler keeps the output mutex after printing.
pub const LED_HOLD_MS: u32 = 100;

/// Simulated per-item work in the counter task, in CPU cycles.
pub const COUNTER_BUSY_WAIT_CYCLES: u32 = 1_000_000;

/// Highest value the counter task prints each pass (inclusive).
pub const COUNTER_MAX: u8 = 10;

/// Runtime knobs for the application tasks. Defaults come from the
/// constants above; tests shrink them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppConfig {
    /// Ticks the LED toggler holds the mutex after emitting its line.
    pub hold_ticks: u32,
    /// Cycles of non-yielding simulated work after each counter value.
    pub busy_wait_cycles: u32,
    /// Inclusive upper bound of the counter burst.
    pub counter_max: u8,
}

impl AppConfig {
    pub const fn new() -> Self {
        Self {
            hold_ticks: ms_to_ticks(LED_HOLD_MS),
            busy_wait_cycles: COUNTER_BUSY_WAIT_CYCLES,
            counter_max: COUNTER_MAX,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ms_to_ticks() {
        assert_eq!(ms_to_ticks(0), 0);
        assert_eq!(ms_to_ticks(1), 1);
        assert_eq!(ms_to_ticks(100), 100);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(INIT_PRIORITY > LED_TOGGLER_PRIORITY);
        assert!(LED_TOGGLER_PRIORITY > COUNTER_PRIORITY);
        assert!(COUNTER_PRIORITY > IDLE_PRIORITY);
    }

    #[test]
    fn test_default_app_config() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.hold_ticks, 100);
        assert_eq!(cfg.counter_max, 10);
        assert_eq!(cfg.busy_wait_cycles, COUNTER_BUSY_WAIT_CYCLES);
    }
}
