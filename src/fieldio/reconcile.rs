//! Background reconciliation between hardware state and subscribers.

use crate::fieldio::{
    bus::RegisterBus,
    helpers::for_each_channel,
    module::{FieldIoModule, saturate_u16},
    queue::Received,
    regs::Reg,
    time::Delay,
    types::{Channel, Selector},
};

/// What a reconciler cycle acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Event captured by the interrupt handler.
    Interrupt,
    /// Direct read after the poll period elapsed.
    Poll,
}

/// Summary of one reconciler cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cycle {
    pub source: Source,
    pub bits: u16,
    pub edge_mask: u16,
    /// Storm-disabled channels acknowledged this cycle.
    pub disabled: u16,
    /// Subscriber callbacks invoked.
    pub notified: usize,
}

struct Pending {
    disabled: u16,
    edge_changes: u16,
    poll_changed: bool,
    newly_failed: u32,
}

impl<'a, B: RegisterBus> FieldIoModule<'a, B> {
    /// Runs one reconciler iteration.
    ///
    /// Waits for an event up to the current poll period, falls back to a
    /// direct read on timeout, then dispatches to subscribers.
    pub fn reconcile_once(&self, delay: impl Delay) -> Cycle {
        let received = self.queue.receive_with_timeout(self.poll_period_ms(), delay);
        self.reconcile(received)
    }

    /// Like [`reconcile_once`](Self::reconcile_once), but sleeps on the
    /// queue's condition variable instead of polling it.
    #[cfg(feature = "std")]
    pub fn reconcile_blocking(&self) -> Cycle {
        let period = std::time::Duration::from_millis(u64::from(self.poll_period_ms()));
        self.reconcile(self.queue.receive_blocking(period))
    }

    fn reconcile(&self, received: Received) -> Cycle {
        let (source, bits, edge_mask) = match received {
            Received::Event(event) => {
                self.update(|s| s.pending = s.pending.saturating_sub(1));
                (Source::Interrupt, event.bits, event.edge_mask)
            }
            Received::TimedOut => {
                let (bits, configured) = self.regs.with_view(|view| {
                    (
                        view.read(Reg::ReadData),
                        view.read(Reg::RisingEnable) | view.read(Reg::FallingEnable),
                    )
                });
                let changed = bits ^ self.last_bits();
                (Source::Poll, bits, changed & configured)
            }
        };

        let pending = self.update(|s| {
            s.last_bits = bits;
            let out = Pending {
                disabled: s.disabled,
                edge_changes: s.edge_changes | s.disabled,
                poll_changed: s.poll_changed,
                newly_failed: s.messages_failed.wrapping_sub(s.failed_reported),
            };
            s.disabled = 0;
            s.edge_changes = 0;
            s.poll_changed = false;
            s.failed_reported = s.messages_failed;
            out
        });

        if pending.newly_failed != 0 {
            log::warn!(
                "event queue full: {} interrupt events dropped",
                pending.newly_failed
            );
        }

        let mut notified = 0;
        if edge_mask != 0 {
            notified += self.subscribers.dispatch(|mask, selector| {
                (selector == Selector::Data && mask & edge_mask != 0).then_some(mask & bits)
            });
        }

        if pending.disabled != 0 {
            for_each_channel(pending.disabled, |ch| {
                log::warn!("interrupt storm: edge enables cleared on channel {}", ch.index());
            });
            notified += self.subscribers.dispatch(|mask, selector| {
                (selector == Selector::DisabledAck && mask & pending.disabled != 0).then_some(mask)
            });
        }

        if pending.edge_changes != 0 {
            notified += self.subscribers.dispatch(|mask, selector| {
                if selector != Selector::EdgeConfig || mask & pending.edge_changes == 0 {
                    return None;
                }
                Channel::lowest_in(mask).map(|ch| self.edge_config(ch).bits())
            });
        }

        if pending.poll_changed {
            let ms = saturate_u16(self.poll_period_ms());
            notified += self
                .subscribers
                .dispatch(|_, selector| (selector == Selector::PollPeriod).then_some(ms));
        }

        log::trace!(
            "cycle {:?}: bits {:#06x} edges {:#06x} notified {}",
            source,
            bits,
            edge_mask,
            notified
        );

        Cycle {
            source,
            bits,
            edge_mask,
            disabled: pending.disabled,
            notified,
        }
    }

    /// Reconciles forever.
    pub fn run(&self, mut delay: impl Delay) -> ! {
        log::info!(
            "reconciler started for {:#08x}, poll period {} ms",
            self.address().raw(),
            self.poll_period_ms()
        );
        loop {
            self.reconcile_once(&mut delay);
        }
    }
}
