//! Test support utilities - only compiled in test builds.
#![allow(unsafe_code)]

use core::cell::{Cell, RefCell, UnsafeCell};
use core::ptr::NonNull;

use critical_section::Mutex;

use crate::fieldio::{
    bus::{MappedWindow, RegisterBus, SpaceResolver},
    loader::{ConfigPort, InterruptLine, MODE_CONFIG, MODE_PROGRAMMED},
    regs::Reg,
    subscribers::Notify,
    time::Delay,
    types::{InterruptEvent, Location, Region, WordAddress},
};

const SIM_WORDS: usize = 256;

pub fn io_base(word: u32) -> WordAddress {
    WordAddress::new(Region::Io, word)
}

pub fn event(bits: u16, edge_mask: u16) -> InterruptEvent {
    InterruptEvent { bits, edge_mask }
}

fn region_index(region: Region) -> usize {
    match region {
        Region::Io => 0,
        Region::Mem => 1,
        Region::Id => 2,
    }
}

/// Array-backed bus with an optional field I/O block whose status registers
/// are write-1-to-clear and latch edges when the inputs are driven.
pub struct SimBus {
    words: Mutex<RefCell<[[u16; SIM_WORDS]; 3]>>,
    field_io: Option<WordAddress>,
}

impl SimBus {
    pub fn new() -> Self {
        Self {
            words: Mutex::new(RefCell::new([[0; SIM_WORDS]; 3])),
            field_io: None,
        }
    }

    pub fn with_field_io(base: WordAddress) -> Self {
        Self {
            field_io: Some(base),
            ..Self::new()
        }
    }

    /// Reads without side effects or counting.
    pub fn peek(&self, at: WordAddress) -> u16 {
        critical_section::with(|cs| {
            self.words.borrow_ref(cs)[region_index(at.region)][at.word as usize]
        })
    }

    /// Writes without write-1-to-clear semantics.
    pub fn poke(&self, at: WordAddress, value: u16) {
        critical_section::with(|cs| {
            self.words.borrow_ref_mut(cs)[region_index(at.region)][at.word as usize] = value;
        })
    }

    pub fn field_reg(&self, reg: Reg) -> u16 {
        self.peek(self.base().offset(reg.word()))
    }

    /// Drives the input pins, latching status bits for every changed input.
    pub fn drive(&self, bits: u16) {
        let base = self.base();
        let old = self.peek(base.offset(Reg::ReadData.word()));
        let rising = !old & bits;
        let falling = old & !bits;
        self.poke(base.offset(Reg::ReadData.word()), bits);
        self.latch(rising, falling);
    }

    /// Latches status bits without changing the inputs.
    pub fn latch(&self, rising: u16, falling: u16) {
        let base = self.base();
        let rs = base.offset(Reg::RisingStatus.word());
        let fs = base.offset(Reg::FallingStatus.word());
        self.poke(rs, self.peek(rs) | rising);
        self.poke(fs, self.peek(fs) | falling);
    }

    fn base(&self) -> WordAddress {
        self.field_io.unwrap_or(io_base(0))
    }

    fn is_status(&self, at: WordAddress) -> bool {
        self.field_io.is_some_and(|base| {
            at == base.offset(Reg::RisingStatus.word())
                || at == base.offset(Reg::FallingStatus.word())
        })
    }
}

impl RegisterBus for SimBus {
    fn read(&self, at: WordAddress) -> u16 {
        self.peek(at)
    }

    fn write(&self, at: WordAddress, value: u16) {
        if self.is_status(at) {
            self.poke(at, self.peek(at) & !value);
        } else {
            self.poke(at, value);
        }
    }

    fn contains(&self, at: WordAddress) -> bool {
        (at.word as usize) < SIM_WORDS
    }
}

/// Delay that only counts simulated milliseconds.
#[derive(Debug, Default)]
pub struct ManualDelay {
    elapsed_ms: u64,
}

impl ManualDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }
}

impl Delay for ManualDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.elapsed_ms += ms as u64;
    }
}

/// Subscriber that records every notified value.
#[derive(Debug, Default)]
pub struct Recorder {
    values: std::sync::Mutex<std::vec::Vec<u16>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn values(&self) -> std::vec::Vec<u16> {
        self.values.lock().unwrap().clone()
    }
}

impl Notify for Recorder {
    fn notify(&self, value: u16) {
        self.values.lock().unwrap().push(value);
    }
}

/// Carrier service with one module at carrier 0, slot 1.
pub struct ArrayResolver {
    io: UnsafeCell<[u16; 64]>,
    mem: UnsafeCell<[u16; 128]>,
}

impl ArrayResolver {
    pub const HERE: Location = Location::new(0, 1);

    pub fn new() -> Self {
        Self {
            io: UnsafeCell::new([0; 64]),
            mem: UnsafeCell::new([0; 128]),
        }
    }

    pub fn io_word_ptr(&self, word: usize) -> NonNull<u16> {
        self.window_for(Region::Io).word_ptr(word as u32).unwrap()
    }

    pub fn mem_word_ptr(&self, word: usize) -> NonNull<u16> {
        self.window_for(Region::Mem).word_ptr(word as u32).unwrap()
    }

    fn window_for(&self, region: Region) -> MappedWindow {
        match region {
            Region::Io => unsafe {
                MappedWindow::new(NonNull::new_unchecked(self.io.get().cast::<u16>()), 64)
            },
            _ => unsafe {
                MappedWindow::new(NonNull::new_unchecked(self.mem.get().cast::<u16>()), 128)
            },
        }
    }
}

impl SpaceResolver for ArrayResolver {
    fn window(&self, location: Location, region: Region) -> Option<MappedWindow> {
        if location != Self::HERE || region == Region::Id {
            return None;
        }
        Some(self.window_for(region))
    }
}

/// Configuration port that plays back a well-behaved or stalling device.
pub struct ScriptedPort {
    pub mode: Cell<u8>,
    /// Status polls after start before the acknowledge bit shows.
    pub ack_after: u32,
    /// Payload byte index (across the image) at which ready stops appearing.
    pub stall_at: Option<usize>,
    /// Report the done bit once streaming is finished.
    pub done_bit: bool,
    /// Switch the mode register to "programmed" once streaming is finished.
    pub programmed_mode: bool,
    /// Expected payload length; done/mode only show after this many bytes.
    pub expect_bytes: usize,
    started: Cell<bool>,
    polls: Cell<u32>,
    resets: Cell<u32>,
    data: RefCell<std::vec::Vec<u8>>,
}

impl ScriptedPort {
    pub fn new(expect_bytes: usize) -> Self {
        Self {
            mode: Cell::new(MODE_CONFIG),
            ack_after: 3,
            stall_at: None,
            done_bit: true,
            programmed_mode: false,
            expect_bytes,
            started: Cell::new(false),
            polls: Cell::new(0),
            resets: Cell::new(0),
            data: RefCell::new(std::vec::Vec::new()),
        }
    }

    pub fn data(&self) -> std::vec::Vec<u8> {
        self.data.borrow().clone()
    }

    pub fn resets(&self) -> u32 {
        self.resets.get()
    }

    fn finished(&self) -> bool {
        self.data.borrow().len() >= self.expect_bytes
    }
}

impl ConfigPort for ScriptedPort {
    fn mode(&self) -> u8 {
        if self.programmed_mode && self.finished() {
            MODE_PROGRAMMED
        } else {
            self.mode.get()
        }
    }

    fn status(&self) -> u16 {
        if !self.started.get() {
            return 0;
        }
        self.polls.set(self.polls.get() + 1);
        if self.polls.get() <= self.ack_after {
            return 0;
        }
        let sent = self.data.borrow().len();
        let mut status = 0x01;
        if !self.stall_at.is_some_and(|at| sent >= at) {
            status |= 0x02;
        }
        if self.done_bit && self.finished() {
            status |= 0x04;
        }
        status
    }

    fn set_status(&self, value: u16) {
        if value & 0x01 != 0 {
            self.started.set(true);
        }
        if value & 0x80 != 0 {
            self.resets.set(self.resets.get() + 1);
        }
    }

    fn write_data(&self, byte: u8) {
        self.data.borrow_mut().push(byte);
    }
}

/// Interrupt line that counts suspensions and restorations.
#[derive(Debug, Default)]
pub struct CountingLine {
    pub disabled: u32,
    pub enabled: u32,
    pub suspended: bool,
}

impl InterruptLine for CountingLine {
    fn disable(&mut self) {
        self.disabled += 1;
        self.suspended = true;
    }

    fn enable(&mut self) {
        self.enabled += 1;
        self.suspended = false;
    }
}
