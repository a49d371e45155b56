//! # Trio Firmware
//!
//! Three tasks sharing one output channel, plus a button interrupt:
//!
//! | Task          | Priority | Behavior                                      |
//! |---------------|----------|-----------------------------------------------|
//! | `init`        | 3        | Configures serial, button pin/IRQ, LED; exits |
//! | `led_toggler` | 2        | Per button press: one line, one blue toggle   |
//! | `counter`     | 1        | Header and 0..=10 under the mutex, forever    |
//! | `idle`        | 0        | `wfi` (created by the kernel)                 |
//!
//! ## Expected Output
//!
//! With no button presses the counter burst repeats forever. A press
//! wakes the LED toggler, which waits for the current burst to finish
//! (the counter runs at priority 2 meanwhile), prints its line, toggles
//! the blue LED and holds the channel for 100 ms. Presses that arrive
//! before the toggler consumes the previous one are merged.
//!
//! Any startup failure halts before the scheduler starts, leaving the
//! output channel silent; the reason is logged over `defmt`.

#![no_std]
#![no_main]

mod board;

use cortex_m_rt::entry;
use defmt_rtt as _;
use panic_halt as _;
use static_cell::StaticCell;

use trio::app::{ButtonIsr, CounterTask, InitTask, LedToggler, Outputs, SharedOutputs};
use trio::config::{AppConfig, BUTTON_PIN, BUTTON_PORT, COUNTER_PRIORITY, INIT_PRIORITY, LED_TOGGLER_PRIORITY};
use trio::kernel::{self, Kernel};
use trio::sync::SharedResource;
use trio::task::{TaskConfig, TaskEntry};
use trio::KernelError;

use board::{BoardDio, BoardIntc, BoardLed, RttSerial};

type BoardOutputs = SharedOutputs<RttSerial, BoardLed>;
type BoardInit = InitTask<'static, Kernel, RttSerial, BoardLed, BoardDio, BoardIntc>;
type BoardToggler = LedToggler<'static, Kernel, RttSerial, BoardLed>;
type BoardCounter = CounterTask<'static, Kernel, RttSerial, BoardLed>;

static OUTPUTS: StaticCell<BoardOutputs> = StaticCell::new();
static BUTTON: StaticCell<ButtonIsr<Kernel>> = StaticCell::new();

// Task contexts. Each entry shim takes its context out exactly once.
static INIT: StaticCell<Option<BoardInit>> = StaticCell::new();
static TOGGLER: StaticCell<Option<BoardToggler>> = StaticCell::new();
static COUNTER: StaticCell<Option<BoardCounter>> = StaticCell::new();

// ---------------------------------------------------------------------------
// Task entry points
// ---------------------------------------------------------------------------

/// Move a task context out of its static slot.
///
/// # Safety
/// `arg` must be the `Option<T>` registered with this task, which no one
/// else touches.
unsafe fn claim<T>(arg: *mut ()) -> Option<T> {
    (*arg.cast::<Option<T>>()).take()
}

extern "C" fn init_entry(arg: *mut ()) -> ! {
    // Safety: `arg` is INIT's slot.
    match unsafe { claim::<BoardInit>(arg) } {
        Some(task) => task.run(),
        None => halt(),
    }
}

extern "C" fn toggler_entry(arg: *mut ()) -> ! {
    // Safety: `arg` is TOGGLER's slot.
    match unsafe { claim::<BoardToggler>(arg) } {
        Some(task) => task.run(),
        None => halt(),
    }
}

extern "C" fn counter_entry(arg: *mut ()) -> ! {
    // Safety: `arg` is COUNTER's slot.
    match unsafe { claim::<BoardCounter>(arg) } {
        Some(task) => task.run(),
        None => halt(),
    }
}

fn spawn<T>(
    entry: TaskEntry,
    context: &'static mut Option<T>,
    name: &'static str,
    priority: u8,
) -> Result<usize, KernelError> {
    let arg = core::ptr::from_mut(context).cast::<()>();
    kernel::create_task(entry, arg, TaskConfig { name, priority })
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

fn setup() -> Result<(), KernelError> {
    kernel::init()?;

    let button_event = kernel::create_binary_semaphore()?;
    let output_lock = kernel::create_mutex()?;

    let outputs: &'static BoardOutputs = OUTPUTS.init(SharedResource::new(
        output_lock,
        Outputs::new(RttSerial::new(), BoardLed::new()),
    ));
    let button: &'static ButtonIsr<Kernel> =
        BUTTON.init(ButtonIsr::new(Kernel, button_event, BUTTON_PORT, BUTTON_PIN));
    let config = AppConfig::default();

    spawn(
        init_entry,
        INIT.init(Some(InitTask::new(
            Kernel,
            outputs,
            BoardDio,
            BoardIntc,
            button,
            BUTTON_PORT,
            BUTTON_PIN,
        ))),
        "init",
        INIT_PRIORITY,
    )?;
    spawn(
        toggler_entry,
        TOGGLER.init(Some(LedToggler::new(Kernel, button_event, outputs, config))),
        "led_toggler",
        LED_TOGGLER_PRIORITY,
    )?;
    spawn(
        counter_entry,
        COUNTER.init(Some(CounterTask::new(Kernel, outputs, config))),
        "counter",
        COUNTER_PRIORITY,
    )?;
    Ok(())
}

fn halt() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

/// Firmware entry point. Creates the kernel objects and tasks, then
/// starts the scheduler. Does not return.
#[entry]
fn main() -> ! {
    let Some(cp) = cortex_m::Peripherals::take() else {
        halt()
    };

    if let Err(e) = setup() {
        defmt::error!("startup failed: {}", e);
        halt()
    }

    match kernel::start(cp) {
        Ok(never) => match never {},
        Err(e) => {
            defmt::error!("scheduler did not start: {}", e);
            halt()
        }
    }
}
