use core::cell::RefCell;

use critical_section::Mutex;
use heapless::spsc::Queue;

use crate::fieldio::{time::Delay, types::InterruptEvent};

/// Number of events the queue holds before `try_enqueue` fails.
pub const QUEUE_DEPTH: usize = 1000;

// heapless::spsc keeps one slot free to tell full from empty.
const QUEUE_SLOTS: usize = QUEUE_DEPTH + 1;

/// Granularity of the timed wait in [`EventQueue::receive_with_timeout`].
pub const WAIT_SLICE_MS: u32 = 1;

/// Outcome of a timed receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    Event(InterruptEvent),
    TimedOut,
}

/// Bounded FIFO between the interrupt handler and the reconciler.
///
/// Elements are fixed-size `Copy` values stored inline, so enqueueing from
/// interrupt context never allocates. Each operation holds the critical
/// section only for the push or pop itself.
pub struct EventQueue {
    inner: Mutex<RefCell<Queue<InterruptEvent, QUEUE_SLOTS>>>,
    #[cfg(feature = "std")]
    wake: (std::sync::Mutex<()>, std::sync::Condvar),
}

impl core::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventQueue")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Queue::new())),
            #[cfg(feature = "std")]
            wake: (std::sync::Mutex::new(()), std::sync::Condvar::new()),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        QUEUE_DEPTH
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.inner.borrow_ref(cs).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends `event` without blocking. Hands the event back when full.
    pub fn try_enqueue(&self, event: InterruptEvent) -> Result<(), InterruptEvent> {
        self.push(event)?;
        self.wake();
        Ok(())
    }

    /// Appends without waking a blocked receiver. Safe inside a critical
    /// section; the caller must call [`wake`](Self::wake) once it has left it.
    pub(crate) fn push(&self, event: InterruptEvent) -> Result<(), InterruptEvent> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).enqueue(event))
    }

    /// Wakes a receiver blocked in `receive_blocking`.
    #[cfg(feature = "std")]
    pub(crate) fn wake(&self) {
        let (lock, ready) = &self.wake;
        let _guard = lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        ready.notify_one();
    }

    #[cfg(not(feature = "std"))]
    #[inline]
    pub(crate) fn wake(&self) {}

    /// Pops the oldest event, if any.
    pub fn try_receive(&self) -> Option<InterruptEvent> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).dequeue())
    }

    /// Waits up to `timeout_ms` for an event.
    ///
    /// Portable fallback for targets without a blocking primitive: the queue
    /// is checked before every [`WAIT_SLICE_MS`] slice, so an event that
    /// arrives while waiting is returned at the next slice boundary. With the
    /// `std` feature, [`receive_blocking`](Self::receive_blocking) wakes on
    /// the enqueue itself.
    pub fn receive_with_timeout(&self, timeout_ms: u32, mut delay: impl Delay) -> Received {
        let mut waited = 0u32;
        loop {
            if let Some(event) = self.try_receive() {
                return Received::Event(event);
            }
            if waited >= timeout_ms {
                return Received::TimedOut;
            }
            let step = WAIT_SLICE_MS.min(timeout_ms - waited);
            delay.delay_ms(step);
            waited += step;
        }
    }
}

#[cfg(feature = "std")]
impl EventQueue {
    /// Blocks until an event is available or `timeout` has passed.
    pub fn receive_blocking(&self, timeout: std::time::Duration) -> Received {
        let deadline = std::time::Instant::now() + timeout;
        let (lock, ready) = &self.wake;
        let mut guard = lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        loop {
            // Checked with the lock held, so an enqueue cannot slip in
            // between the check and the wait.
            if let Some(event) = self.try_receive() {
                return Received::Event(event);
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                return Received::TimedOut;
            }
            guard = match ready.wait_timeout(guard, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
