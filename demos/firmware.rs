//! Firmware example: streaming a bitstream image
//!
//! This example demonstrates:
//! - Implementing `ConfigPort` for a device model
//! - Suspending the slot's interrupt line for the load
//! - Handling a failed load and retrying with another image

use std::cell::{Cell, RefCell};

use fieldio_bridge::fieldio::{LoaderConfig, LoadState, StdDelay, loader::MODE_CONFIG};
use fieldio_bridge::prelude::*;

/// Device that accepts bytes until `capacity`, then stops reporting ready.
struct Device {
    started: Cell<bool>,
    received: RefCell<Vec<u8>>,
    capacity: usize,
    expected: usize,
}

impl ConfigPort for Device {
    fn mode(&self) -> u8 {
        MODE_CONFIG
    }

    fn status(&self) -> u16 {
        if !self.started.get() {
            return 0;
        }
        let received = self.received.borrow().len();
        let mut status = 0x0001;
        if received < self.capacity {
            status |= 0x0002;
        }
        if received >= self.expected {
            status |= 0x0004;
        }
        status
    }

    fn set_status(&self, value: u16) {
        if value & 0x0001 != 0 {
            self.started.set(true);
        }
        if value & 0x0080 != 0 {
            println!("device reset after {} bytes", self.received.borrow().len());
        }
    }

    fn write_data(&self, byte: u8) {
        self.received.borrow_mut().push(byte);
    }
}

struct Slot {
    enabled: bool,
}

impl InterruptLine for Slot {
    fn disable(&mut self) {
        self.enabled = false;
    }

    fn enable(&mut self) {
        self.enabled = true;
    }
}

const TOO_BIG: &str = ":10000000000102030405060708090A0B0C0D0E0F\n:00000001FF\n";
const FITS: &str = ":080000000001020304050607\n:00000001FF\n";

fn main() {
    let mut slot = Slot { enabled: true };
    let device = Device {
        started: Cell::new(false),
        received: RefCell::new(Vec::new()),
        capacity: 8,
        expected: 8,
    };
    let config = LoaderConfig {
        poll_delay_us: 10,
        ..LoaderConfig::default()
    };
    let mut loader = FirmwareLoader::with_config(&device, StdDelay, config);

    match loader.load_image(&mut slot, TOO_BIG.as_bytes()) {
        Ok(report) => println!("loaded {} bytes", report.bytes),
        Err(err) => println!("first image rejected: {err} ({:?})", err.stage()),
    }
    assert!(slot.enabled);
    assert_eq!(loader.state(), LoadState::Failed);

    device.received.borrow_mut().clear();
    let report = loader
        .load_image(&mut slot, FITS.as_bytes())
        .expect("second image loads");
    println!(
        "loaded {} bytes from {} lines, worst ready wait {} polls",
        report.bytes, report.lines, report.max_wait
    );
}
