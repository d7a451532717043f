//! Pipeline example: edge interrupts to subscriber callbacks
//!
//! This example demonstrates:
//! - Building and arming a field I/O module on a simulated bus
//! - Registering data and storm-acknowledge subscribers
//! - Running the interrupt handler and the reconciler on separate threads
//! - Reading the counters afterwards

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use fieldio_bridge::fieldio::{Reg, Region, WordAddress, address::translate};
use fieldio_bridge::prelude::*;

// ============ Simulated module ============
// A single I/O window. Status registers latch edges and are write-1-to-clear.

struct Board {
    words: Mutex<[u16; 64]>,
    base: WordAddress,
}

impl Board {
    fn new(base: WordAddress) -> Self {
        Self {
            words: Mutex::new([0; 64]),
            base,
        }
    }

    fn index(&self, reg: Reg) -> usize {
        self.base.offset(reg.word()).word as usize
    }

    /// Toggles the input pins and latches the edges.
    fn drive(&self, bits: u16) {
        let mut words = self.words.lock().unwrap();
        let old = words[self.index(Reg::ReadData)];
        words[self.index(Reg::ReadData)] = bits;
        words[self.index(Reg::RisingStatus)] |= !old & bits;
        words[self.index(Reg::FallingStatus)] |= old & !bits;
    }
}

impl RegisterBus for Board {
    fn read(&self, at: WordAddress) -> u16 {
        self.words.lock().unwrap()[at.word as usize]
    }

    fn write(&self, at: WordAddress, value: u16) {
        let mut words = self.words.lock().unwrap();
        let w = at.word as usize;
        if w == self.index(Reg::RisingStatus) || w == self.index(Reg::FallingStatus) {
            words[w] &= !value;
        } else {
            words[w] = value;
        }
    }

    fn contains(&self, at: WordAddress) -> bool {
        at.region == Region::Io && (at.word as usize) < 64
    }
}

fn main() {
    let address = ComponentAddress::new(0x000010).unwrap();
    let board = Board::new(translate(address));

    let on_data = |value: u16| println!("bit 4 now {}", value >> 4 & 1);
    let on_storm = |mask: u16| println!("storm protection disabled {mask:#06x}");

    let module = FieldIoBuilder::new(&board)
        .address(address)
        .rising_mask(0x0010)
        .falling_mask(0x0010)
        .poll_period_ms(50)
        .build()
        .unwrap();
    module.arm();
    module
        .subscribers()
        .register(0x0010, Selector::Data, &on_data)
        .unwrap();
    module
        .subscribers()
        .register(0x0010, Selector::DisabledAck, &on_storm)
        .unwrap();

    let done = AtomicBool::new(false);
    std::thread::scope(|s| {
        // Stand-in for the interrupt controller.
        s.spawn(|| {
            for i in 0..20u16 {
                board.drive(if i % 2 == 0 { 0x0010 } else { 0 });
                module.on_interrupt();
                std::thread::sleep(std::time::Duration::from_millis(5));
            }
            done.store(true, Ordering::Release);
        });

        s.spawn(|| {
            while !done.load(Ordering::Acquire) || !module.queue().is_empty() {
                module.reconcile_blocking();
            }
        });
    });

    println!("{}", module.stats());
}
