//! Interrupt-context side of the pipeline.
//!
//! [`FieldIoModule::on_interrupt`] is the service routine. It never blocks,
//! allocates or logs, and every degraded condition ends up in counters or the
//! disabled mask rather than an error.

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::Vec;

use crate::fieldio::{
    DriverError,
    bus::RegisterBus,
    module::{FieldIoModule, STORM_THRESHOLD},
    regs::Reg,
    types::{ComponentAddress, InterruptEvent, Location},
};

/// Capacity of a [`FastPathTable`].
pub const MAX_FAST_PATHS: usize = 10;

/// Handler run synchronously from interrupt context.
///
/// Must complete in short, bounded time.
pub trait FastHandler: Sync {
    fn service(&self, bits: u16, edge_mask: u16);
}

impl<F> FastHandler for F
where
    F: Fn(u16, u16) + Sync,
{
    fn service(&self, bits: u16, edge_mask: u16) {
        self(bits, edge_mask)
    }
}

/// Identifies the register block a fast path serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FastPathKey {
    pub location: Location,
    pub address: ComponentAddress,
}

#[derive(Clone, Copy)]
struct FastPath<'a> {
    key: FastPathKey,
    mask: u16,
    handler: &'a dyn FastHandler,
}

/// Externally registered handlers that bypass the event queue.
///
/// One table may be shared by several modules; entries are matched by key.
pub struct FastPathTable<'a> {
    entries: Mutex<RefCell<Vec<FastPath<'a>, MAX_FAST_PATHS>>>,
}

impl<'a> core::fmt::Debug for FastPathTable<'a> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FastPathTable")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl<'a> FastPathTable<'a> {
    pub const fn new() -> Self {
        Self {
            entries: Mutex::new(RefCell::new(Vec::new())),
        }
    }

    pub fn register(
        &self,
        key: FastPathKey,
        mask: u16,
        handler: &'a dyn FastHandler,
    ) -> Result<(), DriverError> {
        critical_section::with(|cs| {
            self.entries
                .borrow_ref_mut(cs)
                .push(FastPath { key, mask, handler })
                .map_err(|_| DriverError::RegistryFull)
        })
    }

    /// Removes the first entry registered with `key` and `mask`.
    pub fn unregister(&self, key: FastPathKey, mask: u16) -> Result<(), DriverError> {
        critical_section::with(|cs| {
            let mut entries = self.entries.borrow_ref_mut(cs);
            let pos = entries
                .iter()
                .position(|e| e.key == key && e.mask == mask)
                .ok_or(DriverError::UnknownSubscriber)?;
            entries.remove(pos);
            Ok(())
        })
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.entries.borrow_ref(cs).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

}

/// Interrupt-side view of a fast-path table.
///
/// Lets a module hold `&'a FastPathTable<'h>` for any `'h: 'a`.
pub(crate) trait FastPathService: Sync {
    /// Runs every handler for `key` whose mask meets `edge_mask`.
    ///
    /// Handlers run on a copy of the matching entries, outside the critical
    /// section. Returns true if any ran.
    fn service(&self, key: FastPathKey, bits: u16, edge_mask: u16) -> bool;
}

impl<'h> FastPathService for FastPathTable<'h> {
    fn service(&self, key: FastPathKey, bits: u16, edge_mask: u16) -> bool {
        let matching: Vec<&'h dyn FastHandler, MAX_FAST_PATHS> = critical_section::with(|cs| {
            self.entries
                .borrow_ref(cs)
                .iter()
                .filter(|e| e.key == key && e.mask & edge_mask != 0)
                .map(|e| e.handler)
                .collect()
        });
        for handler in matching.iter() {
            handler.service(bits, edge_mask);
        }
        !matching.is_empty()
    }
}

impl<'a> Default for FastPathTable<'a> {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a captured event went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Consumed by a fast-path handler.
    FastPath,
    /// Pushed onto the event queue.
    Queued,
    /// Queue was full. The reconciler's poll will pick the change up.
    Dropped,
}

/// Result of one interrupt service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqOutcome {
    /// Both status registers read zero; the line was asserted by someone else.
    NotOurs,
    Handled {
        event: InterruptEvent,
        delivery: Delivery,
        /// Storm protection disabled these status bits on this call.
        disabled: u16,
    },
}

impl<'a, B: RegisterBus> FieldIoModule<'a, B> {
    /// Interrupt service routine for this block.
    pub fn on_interrupt(&self) -> IrqOutcome {
        let regs = &self.regs;
        let rising = regs.read_rising_status();
        let falling = regs.read_falling_status();
        if rising == 0 && falling == 0 {
            return IrqOutcome::NotOurs;
        }

        let edge_mask =
            (falling & regs.read_falling_enable()) | (rising & regs.read_rising_enable());
        let event = InterruptEvent {
            bits: regs.read_input(),
            edge_mask,
        };

        let fast = self
            .fast_path
            .is_some_and(|(table, key)| table.service(key, event.bits, event.edge_mask));

        let (delivery, disabled) = if fast {
            (Delivery::FastPath, 0)
        } else {
            let (queued, storm) = self.update(|s| {
                let queued = self.queue.push(event).is_ok();
                if queued {
                    s.messages_sent = s.messages_sent.wrapping_add(1);
                    s.pending += 1;
                } else {
                    s.messages_failed = s.messages_failed.wrapping_add(1);
                }
                let storm = s.pending > STORM_THRESHOLD;
                if storm {
                    s.disabled |= rising | falling;
                }
                (queued, storm)
            });
            if queued {
                self.queue.wake();
            }
            let disabled = if storm {
                regs.with_view(|view| {
                    view.clear_bits(Reg::RisingEnable, rising);
                    view.clear_bits(Reg::FallingEnable, falling);
                });
                rising | falling
            } else {
                0
            };
            let delivery = if queued {
                Delivery::Queued
            } else {
                Delivery::Dropped
            };
            (delivery, disabled)
        };

        regs.write_rising_status(rising);
        regs.write_falling_status(falling);
        // Flush the posted writes before the line is released.
        let _ = regs.read_rising_status();

        IrqOutcome::Handled {
            event,
            delivery,
            disabled,
        }
    }
}
