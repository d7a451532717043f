use crate::fieldio::{
    DriverError,
    address::translate,
    bus::RegisterBus,
    irq::{FastPathKey, FastPathService, FastPathTable},
    module::{ArmConfig, DEFAULT_POLL_MS, FieldIoModule},
    regs::{Reg, RegisterSet},
    types::{ComponentAddress, Location},
};

// Builder states
pub struct NeedAddress;

/// Configures a [`FieldIoModule`].
///
/// The component address is required before `build` becomes available.
/// Everything else has a default: all channels inputs, no edge enables, a
/// 100 ms poll period and no fast paths.
pub struct FieldIoBuilder<'a, B, A> {
    bus: B,
    address: A,
    arm_config: ArmConfig,
    poll_ms: u32,
    fast_paths: Option<(&'a dyn FastPathService, Location)>,
}

// Start the builder
impl<'a, B: RegisterBus> FieldIoBuilder<'a, B, NeedAddress> {
    pub fn new(bus: B) -> Self {
        FieldIoBuilder {
            bus,
            address: NeedAddress,
            arm_config: ArmConfig::default(),
            poll_ms: DEFAULT_POLL_MS,
            fast_paths: None,
        }
    }

    /// Set the component address of the field I/O block.
    pub fn address(self, address: ComponentAddress) -> FieldIoBuilder<'a, B, ComponentAddress> {
        FieldIoBuilder {
            bus: self.bus,
            address,
            arm_config: self.arm_config,
            poll_ms: self.poll_ms,
            fast_paths: self.fast_paths,
        }
    }
}

// Optional settings, in any state
impl<'a, B: RegisterBus, A> FieldIoBuilder<'a, B, A> {
    /// Control word written on arm (pin direction).
    pub fn control(mut self, control: u16) -> Self {
        self.arm_config.control = control;
        self
    }

    pub fn rising_mask(mut self, mask: u16) -> Self {
        self.arm_config.rising = mask;
        self
    }

    pub fn falling_mask(mut self, mask: u16) -> Self {
        self.arm_config.falling = mask;
        self
    }

    /// Reconciler poll period. Zero selects the default; values under the
    /// floor are raised to it.
    pub fn poll_period_ms(mut self, ms: u32) -> Self {
        self.poll_ms = if ms == 0 { DEFAULT_POLL_MS } else { ms };
        self
    }

    /// Consult `table` from the interrupt handler, keyed by `location`.
    ///
    /// The handlers may outlive the module by any margin.
    pub fn fast_paths<'h: 'a>(
        mut self,
        table: &'a FastPathTable<'h>,
        location: Location,
    ) -> Self {
        self.fast_paths = Some((table, location));
        self
    }
}

// Build the module
impl<'a, B: RegisterBus> FieldIoBuilder<'a, B, ComponentAddress> {
    /// Fails with [`DriverError::OutsideWindow`] unless all seven registers
    /// of the block lie inside the bus window.
    pub fn build(self) -> Result<FieldIoModule<'a, B>, DriverError> {
        let address = self.address;
        let base = translate(address);
        let last = base.offset(Reg::FallingEnable.word());
        if !self.bus.contains(base) || !self.bus.contains(last) {
            return Err(DriverError::OutsideWindow);
        }
        let fast_path = self.fast_paths.map(|(table, location)| {
            (
                table,
                FastPathKey {
                    location,
                    address,
                },
            )
        });
        Ok(FieldIoModule::new(
            RegisterSet::new(self.bus, base),
            address,
            self.arm_config,
            self.poll_ms,
            fast_path,
        ))
    }
}
