use core::cell::Cell;
use core::fmt;

use critical_section::Mutex;

use crate::fieldio::{
    DriverError,
    bus::RegisterBus,
    irq::{FastPathKey, FastPathService},
    queue::EventQueue,
    regs::{Reg, RegisterSet},
    subscribers::SubscriberRegistry,
    types::{Channel, ComponentAddress, EdgeConfig, Selector},
};

/// Poll period used when none is configured.
pub const DEFAULT_POLL_MS: u32 = 100;
/// Shortest accepted poll period.
pub const MIN_POLL_MS: u32 = 50;
/// Pending hardware events tolerated before storm protection kicks in.
pub const STORM_THRESHOLD: u32 = 5;

/// Applies the poll period floor.
#[inline]
pub fn clamp_poll_ms(ms: u32) -> u32 {
    ms.max(MIN_POLL_MS)
}

/// State shared by the interrupt handler, the reconciler and callers.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PipelineState {
    pub(crate) pending: u32,
    pub(crate) disabled: u16,
    pub(crate) messages_sent: u32,
    pub(crate) messages_failed: u32,
    pub(crate) failed_reported: u32,
    pub(crate) poll_ms: u32,
    pub(crate) last_bits: u16,
    pub(crate) edge_changes: u16,
    pub(crate) poll_changed: bool,
}

/// Register values written by [`FieldIoModule::arm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArmConfig {
    pub control: u16,
    pub rising: u16,
    pub falling: u16,
}

/// Counters and register state for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    pub messages_sent: u32,
    pub messages_failed: u32,
    pub pending: u32,
    pub disabled: u16,
    pub rising_enable: u16,
    pub falling_enable: u16,
    pub subscribers: usize,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "messages sent:    {}", self.messages_sent)?;
        writeln!(f, "messages failed:  {}", self.messages_failed)?;
        writeln!(f, "pending events:   {}", self.pending)?;
        writeln!(f, "disabled mask:    {:#06x}", self.disabled)?;
        writeln!(f, "rising enable:    {:#06x}", self.rising_enable)?;
        writeln!(f, "falling enable:   {:#06x}", self.falling_enable)?;
        write!(f, "subscribers:      {}", self.subscribers)
    }
}

/// One field I/O block and its interrupt-to-subscriber pipeline.
///
/// Built by [`FieldIoBuilder`](crate::fieldio::FieldIoBuilder). The
/// interrupt handler ([`on_interrupt`](Self::on_interrupt)), the reconciler
/// ([`reconcile_once`](Self::reconcile_once)) and caller threads all work on
/// a shared reference.
///
/// Subscriber callbacks are borrowed for `'a`, so they must be declared
/// before the module that refers to them.
pub struct FieldIoModule<'a, B: RegisterBus> {
    pub(crate) regs: RegisterSet<B>,
    pub(crate) queue: EventQueue,
    pub(crate) state: Mutex<Cell<PipelineState>>,
    pub(crate) subscribers: SubscriberRegistry<'a>,
    pub(crate) fast_path: Option<(&'a dyn FastPathService, FastPathKey)>,
    address: ComponentAddress,
    arm_config: ArmConfig,
}

impl<'a, B: RegisterBus> fmt::Debug for FieldIoModule<'a, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldIoModule")
            .field("address", &self.address)
            .field("base", &self.regs.base())
            .field("queue", &self.queue)
            .field("subscribers", &self.subscribers)
            .finish_non_exhaustive()
    }
}

impl<'a, B: RegisterBus> FieldIoModule<'a, B> {
    pub(crate) fn new(
        regs: RegisterSet<B>,
        address: ComponentAddress,
        arm_config: ArmConfig,
        poll_ms: u32,
        fast_path: Option<(&'a dyn FastPathService, FastPathKey)>,
    ) -> Self {
        Self {
            regs,
            queue: EventQueue::new(),
            state: Mutex::new(Cell::new(PipelineState {
                poll_ms: clamp_poll_ms(poll_ms),
                ..PipelineState::default()
            })),
            subscribers: SubscriberRegistry::new(),
            fast_path,
            address,
            arm_config,
        }
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut PipelineState) -> R) -> R {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut state = cell.get();
            let out = f(&mut state);
            cell.set(state);
            out
        })
    }

    fn snapshot(&self) -> PipelineState {
        critical_section::with(|cs| self.state.borrow(cs).get())
    }

    #[inline]
    pub fn address(&self) -> ComponentAddress {
        self.address
    }

    #[inline]
    pub fn registers(&self) -> &RegisterSet<B> {
        &self.regs
    }

    #[inline]
    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    #[inline]
    pub fn subscribers(&self) -> &SubscriberRegistry<'a> {
        &self.subscribers
    }

    /// Programs direction and edge enables and clears stale status.
    ///
    /// Must run before the interrupt line is enabled.
    pub fn arm(&self) {
        let cfg = self.arm_config;
        self.regs.with_view(|view| {
            view.write(Reg::Control, cfg.control);
            view.write(Reg::RisingStatus, 0xFFFF);
            view.write(Reg::FallingStatus, 0xFFFF);
            view.write(Reg::RisingEnable, cfg.rising);
            view.write(Reg::FallingEnable, cfg.falling);
        });
        let bits = self.regs.read_input();
        self.update(|s| s.last_bits = bits);
        log::info!(
            "armed field I/O at {:#08x}: control {:#06x}, rising {:#06x}, falling {:#06x}",
            self.address.raw(),
            cfg.control,
            cfg.rising,
            cfg.falling
        );
    }

    /// Input bits under `mask`.
    pub fn read_data(&self, mask: u16) -> u16 {
        self.regs.read_input() & mask
    }

    /// Updates the output bits under `mask`. Returns the word written.
    pub fn write_data(&self, value: u16, mask: u16) -> u16 {
        self.regs.modify(Reg::WriteData, value, mask)
    }

    pub fn read_word(&self) -> u16 {
        self.regs.read_input()
    }

    pub fn write_word(&self, value: u16) {
        self.regs.write_output(value)
    }

    pub fn read_control(&self) -> u16 {
        self.regs.read_control()
    }

    /// Edge enables of `channel`, decoded from both enable registers.
    pub fn edge_config(&self, channel: Channel) -> EdgeConfig {
        let (rising, falling) = self
            .regs
            .with_view(|view| (view.read(Reg::RisingEnable), view.read(Reg::FallingEnable)));
        let bit = channel.mask();
        EdgeConfig::from_enables(rising & bit != 0, falling & bit != 0)
    }

    /// Rewrites the edge enables of `channel`.
    ///
    /// `EdgeConfig` subscribers hear about it on the next reconciler cycle.
    pub fn set_edge_config(&self, channel: Channel, config: EdgeConfig) {
        let bit = channel.mask();
        self.regs.with_view(|view| {
            view.modify(Reg::RisingEnable, if config.rising() { bit } else { 0 }, bit);
            view.modify(Reg::FallingEnable, if config.falling() { bit } else { 0 }, bit);
        });
        self.update(|s| s.edge_changes |= bit);
        log::debug!("channel {} edge config {:?}", channel.index(), config);
    }

    /// Same as [`set_edge_config`](Self::set_edge_config) for a raw channel
    /// index and encoded value.
    pub fn set_edge_config_raw(&self, channel: u8, value: u16) -> Result<(), DriverError> {
        let channel = Channel::new(channel)?;
        let config = EdgeConfig::try_from(value)?;
        self.set_edge_config(channel, config);
        Ok(())
    }

    pub fn poll_period_ms(&self) -> u32 {
        self.snapshot().poll_ms
    }

    /// Sets the reconciler's poll period, raised to [`MIN_POLL_MS`] if lower.
    ///
    /// Takes effect from the next cycle. Returns the period in force.
    pub fn set_poll_period_ms(&self, ms: u32) -> u32 {
        let ms = clamp_poll_ms(ms);
        self.update(|s| {
            s.poll_ms = ms;
            s.poll_changed = true;
        });
        ms
    }

    /// Channels silenced by storm protection and not yet acknowledged.
    pub fn disabled_mask(&self) -> u16 {
        self.snapshot().disabled
    }

    /// Input bits as of the last reconciler cycle.
    pub fn last_bits(&self) -> u16 {
        self.snapshot().last_bits
    }

    /// Selector-dispatched read.
    ///
    /// `channel` only matters for [`Selector::EdgeConfig`].
    pub fn read(&self, selector: Selector, channel: Channel) -> u16 {
        match selector {
            Selector::Data => self.read_word(),
            Selector::EdgeConfig => self.edge_config(channel).bits(),
            Selector::PollPeriod => saturate_u16(self.poll_period_ms()),
            Selector::DisabledAck => self.disabled_mask(),
        }
    }

    pub fn stats(&self) -> Stats {
        let state = self.snapshot();
        let (rising_enable, falling_enable) = self
            .regs
            .with_view(|view| (view.read(Reg::RisingEnable), view.read(Reg::FallingEnable)));
        Stats {
            messages_sent: state.messages_sent,
            messages_failed: state.messages_failed,
            pending: state.pending,
            disabled: state.disabled,
            rising_enable,
            falling_enable,
            subscribers: self.subscribers.len(),
        }
    }

    /// Disables both edge-enable registers in one exclusive section.
    pub fn silence(&self) {
        self.regs.with_view(|view| {
            view.write(Reg::RisingEnable, 0);
            view.write(Reg::FallingEnable, 0);
        });
    }
}

impl<'a, B: RegisterBus> Drop for FieldIoModule<'a, B> {
    fn drop(&mut self) {
        self.silence();
    }
}

#[inline]
pub(crate) fn saturate_u16(value: u32) -> u16 {
    value.min(u16::MAX as u32) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fieldio::{
        builder::FieldIoBuilder,
        test_support::{SimBus, io_base},
    };

    const ADDR: u32 = 0x000010;

    fn sim() -> SimBus {
        SimBus::with_field_io(io_base(0x08))
    }

    fn channel(n: u8) -> Channel {
        Channel::new(n).unwrap()
    }

    #[test]
    fn arm_programs_registers_and_clears_status() {
        let bus = sim();
        bus.latch(0x00FF, 0x0F00);
        let module = FieldIoBuilder::new(&bus)
            .address(ComponentAddress::new(ADDR).unwrap())
            .control(0x00F0)
            .rising_mask(0x0010)
            .falling_mask(0x0020)
            .build()
            .unwrap();

        module.arm();

        assert_eq!(bus.field_reg(Reg::Control), 0x00F0);
        assert_eq!(bus.field_reg(Reg::RisingStatus), 0);
        assert_eq!(bus.field_reg(Reg::FallingStatus), 0);
        assert_eq!(bus.field_reg(Reg::RisingEnable), 0x0010);
        assert_eq!(bus.field_reg(Reg::FallingEnable), 0x0020);
    }

    #[test]
    fn masked_data_access() {
        let bus = sim();
        let module = FieldIoBuilder::new(&bus)
            .address(ComponentAddress::new(ADDR).unwrap())
            .build()
            .unwrap();

        bus.drive(0x1234);
        assert_eq!(module.read_data(0x00FF), 0x0034);
        assert_eq!(module.read_word(), 0x1234);

        module.write_word(0xFF00);
        assert_eq!(module.write_data(0x00AA, 0x0F0F), 0xF00A);
        assert_eq!(bus.field_reg(Reg::WriteData), 0xF00A);
    }

    #[test]
    fn edge_config_round_trips_for_every_value() {
        let bus = sim();
        let module = FieldIoBuilder::new(&bus)
            .address(ComponentAddress::new(ADDR).unwrap())
            .build()
            .unwrap();

        for v in 0..4u16 {
            module.set_edge_config_raw(7, v).unwrap();
            assert_eq!(module.read(Selector::EdgeConfig, channel(7)), v);
        }
        // Neighbouring channels are untouched.
        assert_eq!(module.edge_config(channel(6)), EdgeConfig::Disabled);
        assert_eq!(module.edge_config(channel(8)), EdgeConfig::Disabled);
    }

    #[test]
    fn invalid_parameters_have_no_side_effect() {
        let bus = sim();
        let module = FieldIoBuilder::new(&bus)
            .address(ComponentAddress::new(ADDR).unwrap())
            .build()
            .unwrap();

        assert_eq!(
            module.set_edge_config_raw(16, 1),
            Err(DriverError::InvalidChannel)
        );
        assert_eq!(
            module.set_edge_config_raw(2, 4),
            Err(DriverError::InvalidEdgeConfig)
        );
        assert_eq!(bus.field_reg(Reg::RisingEnable), 0);
        assert_eq!(bus.field_reg(Reg::FallingEnable), 0);
    }

    #[test]
    fn poll_period_has_a_floor() {
        let bus = sim();
        let module = FieldIoBuilder::new(&bus)
            .address(ComponentAddress::new(ADDR).unwrap())
            .build()
            .unwrap();

        assert_eq!(module.poll_period_ms(), DEFAULT_POLL_MS);
        assert_eq!(module.set_poll_period_ms(10), MIN_POLL_MS);
        assert_eq!(module.set_poll_period_ms(250), 250);
        assert_eq!(module.read(Selector::PollPeriod, channel(0)), 250);

        module.set_poll_period_ms(100_000);
        assert_eq!(module.read(Selector::PollPeriod, channel(0)), u16::MAX);
    }

    #[test]
    fn drop_silences_edge_enables() {
        let bus = sim();
        {
            let module = FieldIoBuilder::new(&bus)
                .address(ComponentAddress::new(ADDR).unwrap())
                .rising_mask(0xFFFF)
                .falling_mask(0x00FF)
                .build()
                .unwrap();
            module.arm();
            assert_eq!(bus.field_reg(Reg::RisingEnable), 0xFFFF);
        }
        assert_eq!(bus.field_reg(Reg::RisingEnable), 0);
        assert_eq!(bus.field_reg(Reg::FallingEnable), 0);
    }

    #[test]
    fn stats_report() {
        let bus = sim();
        let module = FieldIoBuilder::new(&bus)
            .address(ComponentAddress::new(ADDR).unwrap())
            .rising_mask(0x0003)
            .build()
            .unwrap();
        module.arm();

        let stats = module.stats();
        assert_eq!(stats.rising_enable, 0x0003);
        assert_eq!(stats.messages_sent, 0);

        let text = std::format!("{stats}");
        assert!(text.contains("rising enable:    0x0003"));
        assert!(text.contains("subscribers:      0"));
    }
}
