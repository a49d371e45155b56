//! Host-side test support: task spawning helpers, recording driver mocks,
//! a scripted kernel, and a kernel simulated on top of the real scheduler.

use std::cell::{Cell, RefCell};
use std::boxed::Box;
use std::rc::Rc;
use std::string::String;
use std::vec::Vec;

use crate::drivers::{
    Direction, EdgeHandler, InterruptAck, InterruptSource, Led, LedColor, OutputChannel, Pin,
    Port, UartConfig, DigitalIo,
};
use crate::error::KernelError;
use crate::scheduler::{Acquire, Scheduler};
use crate::services::{CallContext, IsrServices, TaskServices};
use crate::sync::{MutexHandle, SemaphoreHandle, Timeout};
use crate::task::{TaskConfig, TaskState, WakeReason};

// ---------------------------------------------------------------------------
// Scheduler helpers
// ---------------------------------------------------------------------------

/// Entry point for tasks that are never actually started on the host.
pub extern "C" fn parked_task(_arg: *mut ()) -> ! {
    loop {
        core::hint::spin_loop();
    }
}

pub fn spawn(s: &mut Scheduler, name: &'static str, priority: u8) -> usize {
    s.create_task(parked_task, core::ptr::null_mut(), TaskConfig { name, priority })
        .unwrap()
}

/// Spawn a task and put it on the CPU. Only valid when it is the most
/// urgent runnable task.
pub fn spawn_running(s: &mut Scheduler, name: &'static str, priority: u8) -> usize {
    let id = spawn(s, name, priority);
    assert_eq!(s.schedule(), Some(id));
    id
}

// ---------------------------------------------------------------------------
// Event log shared by the mocks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Configure(UartConfig),
    Text(String),
    LedInit,
    Toggle(LedColor),
    PinConfig(Port, Pin, Direction),
    IntConfig(Port, Pin),
    Register(Port, Pin),
    Ack(Port, Pin),
    Take(SemaphoreHandle),
    Lock(MutexHandle),
    Unlock(MutexHandle),
    Delay(u32),
    BusyWait(u32),
    Give(SemaphoreHandle),
    YieldFromIsr(bool),
}

pub type Log = Rc<RefCell<Vec<Event>>>;

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// Everything written to the serial mock, concatenated.
pub fn serial_text(log: &Log) -> String {
    log.borrow()
        .iter()
        .filter_map(|e| match e {
            Event::Text(t) => Some(t.as_str()),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Driver mocks
// ---------------------------------------------------------------------------

/// Serial port that records text. Standalone (`new`) or logging into a
/// shared event log (`with_log`).
pub struct MockSerial {
    pub output: String,
    pub config: Option<UartConfig>,
    log: Option<Log>,
}

impl MockSerial {
    pub fn new() -> Self {
        Self {
            output: String::new(),
            config: None,
            log: None,
        }
    }

    pub fn with_log(log: &Log) -> Self {
        Self {
            log: Some(log.clone()),
            ..Self::new()
        }
    }
}

impl OutputChannel for MockSerial {
    fn configure(&mut self, config: UartConfig) {
        self.config = Some(config);
        if let Some(log) = &self.log {
            log.borrow_mut().push(Event::Configure(config));
        }
    }

    fn send_str(&mut self, text: &str) {
        self.output.push_str(text);
        if let Some(log) = &self.log {
            log.borrow_mut().push(Event::Text(text.into()));
        }
    }
}

pub struct MockLed {
    log: Log,
}

impl MockLed {
    pub fn new(log: &Log) -> Self {
        Self { log: log.clone() }
    }
}

impl Led for MockLed {
    fn initialize(&mut self) {
        self.log.borrow_mut().push(Event::LedInit);
    }

    fn toggle(&mut self, color: LedColor) {
        self.log.borrow_mut().push(Event::Toggle(color));
    }
}

pub struct MockDio {
    log: Log,
}

impl MockDio {
    pub fn new(log: &Log) -> Self {
        Self { log: log.clone() }
    }
}

impl DigitalIo for MockDio {
    fn configure_pin(&mut self, port: Port, pin: Pin, direction: Direction) {
        self.log.borrow_mut().push(Event::PinConfig(port, pin, direction));
    }
}

pub struct MockIntc {
    log: Log,
    pub handler: Option<&'static dyn EdgeHandler>,
}

impl MockIntc {
    pub fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            handler: None,
        }
    }
}

impl InterruptAck for MockIntc {
    fn acknowledge(&mut self, port: Port, pin: Pin) {
        self.log.borrow_mut().push(Event::Ack(port, pin));
    }
}

impl InterruptSource for MockIntc {
    fn configure(&mut self, port: Port, pin: Pin) {
        self.log.borrow_mut().push(Event::IntConfig(port, pin));
    }

    fn register_callback(&mut self, port: Port, pin: Pin, handler: &'static dyn EdgeHandler) {
        self.handler = Some(handler);
        self.log.borrow_mut().push(Event::Register(port, pin));
    }
}

/// Edge handler that does nothing, for registration tests.
pub struct NoopHandler;

impl EdgeHandler for NoopHandler {
    fn on_edge(&self, _ack: &mut dyn InterruptAck) {}
}

// ---------------------------------------------------------------------------
// Scripted kernel
// ---------------------------------------------------------------------------

/// Kernel stand-in for a single task. Never blocks: a take without a
/// credit or a lock of a held mutex fails instead.
pub struct MockKernel {
    log: Log,
    locked: RefCell<Vec<MutexHandle>>,
    credits: RefCell<Vec<SemaphoreHandle>>,
    next_handle: Cell<u8>,
    /// Value `semaphore_give_from_isr` reports.
    pub waiter_outranks: Cell<bool>,
}

impl MockKernel {
    pub fn new() -> Self {
        Self::with_log(&new_log())
    }

    pub fn with_log(log: &Log) -> Self {
        Self {
            log: log.clone(),
            locked: RefCell::new(Vec::new()),
            credits: RefCell::new(Vec::new()),
            next_handle: Cell::new(0),
            waiter_outranks: Cell::new(false),
        }
    }

    fn next(&self) -> u8 {
        let n = self.next_handle.get();
        self.next_handle.set(n + 1);
        n
    }

    pub fn mutex(&self) -> MutexHandle {
        MutexHandle(self.next())
    }

    pub fn semaphore(&self) -> SemaphoreHandle {
        SemaphoreHandle(self.next())
    }

    /// Leave a credit on `semaphore` without logging a give.
    pub fn preload(&self, semaphore: SemaphoreHandle) {
        let mut credits = self.credits.borrow_mut();
        if !credits.contains(&semaphore) {
            credits.push(semaphore);
        }
    }

    pub fn is_locked(&self, mutex: MutexHandle) -> bool {
        self.locked.borrow().contains(&mutex)
    }

    pub fn has_credit(&self, semaphore: SemaphoreHandle) -> bool {
        self.credits.borrow().contains(&semaphore)
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.borrow().clone()
    }
}

unsafe impl TaskServices for MockKernel {
    fn semaphore_take(&self, semaphore: SemaphoreHandle, _timeout: Timeout) -> Result<(), KernelError> {
        let mut credits = self.credits.borrow_mut();
        match credits.iter().position(|&s| s == semaphore) {
            Some(i) => {
                credits.remove(i);
                self.log.borrow_mut().push(Event::Take(semaphore));
                Ok(())
            }
            None => Err(KernelError::Timeout),
        }
    }

    fn mutex_lock(&self, mutex: MutexHandle, _timeout: Timeout) -> Result<(), KernelError> {
        let mut locked = self.locked.borrow_mut();
        if locked.contains(&mutex) {
            return Err(KernelError::AlreadyOwned);
        }
        locked.push(mutex);
        self.log.borrow_mut().push(Event::Lock(mutex));
        Ok(())
    }

    fn mutex_unlock(&self, mutex: MutexHandle) -> Result<(), KernelError> {
        let mut locked = self.locked.borrow_mut();
        let i = locked.iter().position(|&m| m == mutex).ok_or(KernelError::NotOwner)?;
        locked.remove(i);
        self.log.borrow_mut().push(Event::Unlock(mutex));
        Ok(())
    }

    fn delay(&self, ticks: u32) {
        self.log.borrow_mut().push(Event::Delay(ticks));
    }

    fn busy_wait(&self, cycles: u32) {
        self.log.borrow_mut().push(Event::BusyWait(cycles));
    }

    fn delete_current(&self) -> ! {
        panic!("delete_current called on MockKernel");
    }
}

impl IsrServices for MockKernel {
    fn semaphore_give_from_isr(&self, semaphore: SemaphoreHandle) -> Result<bool, KernelError> {
        let mut credits = self.credits.borrow_mut();
        if !credits.contains(&semaphore) {
            credits.push(semaphore);
        }
        self.log.borrow_mut().push(Event::Give(semaphore));
        Ok(self.waiter_outranks.get())
    }

    fn yield_from_isr(&self, higher_priority_woken: bool) {
        self.log.borrow_mut().push(Event::YieldFromIsr(higher_priority_woken));
    }
}

// ---------------------------------------------------------------------------
// Simulated kernel
// ---------------------------------------------------------------------------

type BusyHook = Box<dyn FnMut(&SimKernel)>;

/// Kernel services backed by a real `Scheduler`. Drives whichever task
/// is current; when it blocks, ticks advance until it is woken again.
pub struct SimKernel {
    pub sched: RefCell<Scheduler>,
    /// Context the calls are made from, as `Kernel` would detect it.
    pub context: Cell<CallContext>,
    log: Log,
    busy_hook: RefCell<Option<BusyHook>>,
}

impl SimKernel {
    pub fn new(sched: Scheduler, log: &Log) -> Self {
        Self {
            sched: RefCell::new(sched),
            context: Cell::new(CallContext::Thread),
            log: log.clone(),
            busy_hook: RefCell::new(None),
        }
    }

    /// Run `hook` after every `busy_wait`, i.e. while the caller is in
    /// the middle of its work, to inject interrupts.
    pub fn on_busy_wait(&self, hook: impl FnMut(&SimKernel) + 'static) {
        *self.busy_hook.borrow_mut() = Some(Box::new(hook));
    }

    /// Run the clock until `task` is ready, then put it back on the CPU.
    fn resume(s: &mut Scheduler, task: usize) -> Option<WakeReason> {
        while s.tasks[task].state == TaskState::Blocked {
            let forever = s.tasks[task].wait.is_some_and(|w| w.deadline.is_none());
            assert!(!forever, "task {} would block forever", task);
            s.tick();
        }
        assert_eq!(s.schedule(), Some(task), "another task took the CPU");
        s.take_wake_reason()
    }

    fn running(s: &Scheduler) -> usize {
        s.current_task.expect("no running task")
    }
}

unsafe impl TaskServices for SimKernel {
    fn semaphore_take(&self, semaphore: SemaphoreHandle, timeout: Timeout) -> Result<(), KernelError> {
        self.context.get().require_task()?;
        let mut s = self.sched.borrow_mut();
        let me = Self::running(&s);
        let deadline = s.deadline(timeout);
        loop {
            match s.semaphore_take(semaphore, deadline)? {
                Acquire::Acquired => {
                    self.log.borrow_mut().push(Event::Take(semaphore));
                    return Ok(());
                }
                Acquire::Blocked => {
                    if Self::resume(&mut s, me) == Some(WakeReason::TimedOut) {
                        return Err(KernelError::Timeout);
                    }
                }
            }
        }
    }

    fn mutex_lock(&self, mutex: MutexHandle, timeout: Timeout) -> Result<(), KernelError> {
        self.context.get().require_task()?;
        let mut s = self.sched.borrow_mut();
        let me = Self::running(&s);
        let deadline = s.deadline(timeout);
        if s.mutex_lock(mutex, deadline)? == Acquire::Blocked
            && Self::resume(&mut s, me) == Some(WakeReason::TimedOut)
        {
            return Err(KernelError::Timeout);
        }
        self.log.borrow_mut().push(Event::Lock(mutex));
        Ok(())
    }

    fn mutex_unlock(&self, mutex: MutexHandle) -> Result<(), KernelError> {
        self.context.get().require_task()?;
        self.sched.borrow_mut().mutex_unlock(mutex)?;
        self.log.borrow_mut().push(Event::Unlock(mutex));
        Ok(())
    }

    fn delay(&self, ticks: u32) {
        if self.context.get().require_task().is_err() {
            return;
        }
        let mut s = self.sched.borrow_mut();
        let me = Self::running(&s);
        s.delay_current(ticks).expect("delay outside a task");
        Self::resume(&mut s, me);
        self.log.borrow_mut().push(Event::Delay(ticks));
    }

    fn busy_wait(&self, cycles: u32) {
        self.log.borrow_mut().push(Event::BusyWait(cycles));
        if let Some(hook) = self.busy_hook.borrow_mut().as_mut() {
            hook(self);
        }
    }

    /// Frees the slot like `Kernel`, then unwinds since there is no
    /// other task to switch to.
    fn delete_current(&self) -> ! {
        if let Err(e) = self.context.get().require_task() {
            panic!("delete_current: {}, halted", e);
        }
        self.sched.borrow_mut().delete_current().expect("delete outside a task");
        panic!("task deleted");
    }
}

impl IsrServices for SimKernel {
    fn semaphore_give_from_isr(&self, semaphore: SemaphoreHandle) -> Result<bool, KernelError> {
        let woken = self.sched.borrow_mut().semaphore_give_from_isr(semaphore)?;
        self.log.borrow_mut().push(Event::Give(semaphore));
        Ok(woken)
    }

    fn yield_from_isr(&self, higher_priority_woken: bool) {
        self.log.borrow_mut().push(Event::YieldFromIsr(higher_priority_woken));
    }
}
