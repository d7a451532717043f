use core::cell::{Cell, RefCell};

use critical_section::Mutex;
use heapless::Vec;

use crate::fieldio::{DriverError, types::Selector};

/// Default capacity of a [`SubscriberRegistry`].
pub const MAX_SUBSCRIBERS: usize = 32;

/// Receives notification values from the reconciler.
///
/// Runs inside a critical section and must return quickly. It may register
/// or unregister subscribers.
pub trait Notify: Sync {
    fn notify(&self, value: u16);
}

impl<F> Notify for F
where
    F: Fn(u16) + Sync,
{
    fn notify(&self, value: u16) {
        self(value)
    }
}

/// Identifies one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberHandle(u32);

#[derive(Clone, Copy)]
struct Slot<'a> {
    handle: SubscriberHandle,
    mask: u16,
    selector: Selector,
    callback: &'a dyn Notify,
}

/// Set of `(mask, selector, callback)` registrations.
///
/// Callbacks are borrowed, never owned. Dispatch iterates over a snapshot
/// taken when it starts, so a subscriber added meanwhile is not called for
/// that cycle. Every entry is re-checked and called under one critical
/// section, so once `unregister` returns the callback is never called again.
pub struct SubscriberRegistry<'a, const N: usize = MAX_SUBSCRIBERS> {
    slots: Mutex<RefCell<Vec<Slot<'a>, N>>>,
    next: Mutex<Cell<u32>>,
}

impl<'a, const N: usize> core::fmt::Debug for SubscriberRegistry<'a, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl<'a, const N: usize> SubscriberRegistry<'a, N> {
    pub const fn new() -> Self {
        Self {
            slots: Mutex::new(RefCell::new(Vec::new())),
            next: Mutex::new(Cell::new(1)),
        }
    }

    /// Adds a subscriber for the channels in `mask`.
    pub fn register(
        &self,
        mask: u16,
        selector: Selector,
        callback: &'a dyn Notify,
    ) -> Result<SubscriberHandle, DriverError> {
        critical_section::with(|cs| {
            let mut slots = self.slots.borrow_ref_mut(cs);
            let next = self.next.borrow(cs);
            let handle = SubscriberHandle(next.get());
            slots
                .push(Slot {
                    handle,
                    mask,
                    selector,
                    callback,
                })
                .map_err(|_| DriverError::RegistryFull)?;
            next.set(next.get().wrapping_add(1));
            Ok(handle)
        })
    }

    pub fn unregister(&self, handle: SubscriberHandle) -> Result<(), DriverError> {
        critical_section::with(|cs| {
            let mut slots = self.slots.borrow_ref_mut(cs);
            let pos = slots
                .iter()
                .position(|s| s.handle == handle)
                .ok_or(DriverError::UnknownSubscriber)?;
            slots.swap_remove(pos);
            Ok(())
        })
    }

    pub fn is_registered(&self, handle: SubscriberHandle) -> bool {
        critical_section::with(|cs| {
            self.slots
                .borrow_ref(cs)
                .iter()
                .any(|s| s.handle == handle)
        })
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.slots.borrow_ref(cs).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls every live subscriber for which `value_for` yields a value.
    ///
    /// `value_for` runs outside the critical section. Returns how many
    /// callbacks were called.
    pub fn dispatch(&self, mut value_for: impl FnMut(u16, Selector) -> Option<u16>) -> usize {
        let snapshot = critical_section::with(|cs| self.slots.borrow_ref(cs).clone());
        let mut called = 0;
        for slot in snapshot.iter() {
            let Some(value) = value_for(slot.mask, slot.selector) else {
                continue;
            };
            let delivered = critical_section::with(|cs| {
                let live = self
                    .slots
                    .borrow_ref(cs)
                    .iter()
                    .any(|s| s.handle == slot.handle);
                // No borrow is held here, so the callback may re-enter the registry.
                if live {
                    slot.callback.notify(value);
                }
                live
            });
            called += usize::from(delivered);
        }
        called
    }
}

impl<'a, const N: usize> Default for SubscriberRegistry<'a, N> {
    fn default() -> Self {
        Self::new()
    }
}
