use critical_section::CriticalSection;

use super::macros::{impl_field_io_accessors, impl_register_read, impl_register_rw};
use crate::fieldio::{bus::RegisterBus, helpers::merge_masked, types::WordAddress};

/// The seven 16-bit registers of a field I/O block, in bus order.
///
/// Status registers are write-1-to-clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    Control = 0,
    WriteData = 1,
    ReadData = 2,
    RisingStatus = 3,
    RisingEnable = 4,
    FallingStatus = 5,
    FallingEnable = 6,
}

impl Reg {
    #[inline]
    pub fn word(self) -> u32 {
        self as u32
    }
}

/// Typed view over one field I/O block.
///
/// Single reads and writes are atomic 16-bit bus operations. Read-modify-write
/// sequences run inside [`RegisterSet::with_view`], the one exclusion domain
/// per block, so two writers never interleave on a register.
#[derive(Debug)]
pub struct RegisterSet<B: RegisterBus> {
    bus: B,
    base: WordAddress,
}

impl<B: RegisterBus> RegisterSet<B> {
    pub fn new(bus: B, base: WordAddress) -> Self {
        Self { bus, base }
    }

    #[inline]
    pub fn base(&self) -> WordAddress {
        self.base
    }

    #[inline]
    pub fn bus(&self) -> &B {
        &self.bus
    }

    #[inline]
    pub fn read(&self, reg: Reg) -> u16 {
        self.bus.read(self.base.offset(reg.word()))
    }

    #[inline]
    pub fn write(&self, reg: Reg, value: u16) {
        self.bus.write(self.base.offset(reg.word()), value)
    }

    impl_field_io_accessors!();

    /// Runs `f` with exclusive access to the block.
    pub fn with_view<R>(&self, f: impl FnOnce(&RegisterView<'_, B>) -> R) -> R {
        critical_section::with(|cs| f(&RegisterView { regs: self, _cs: cs }))
    }

    /// Masked read-modify-write. Returns the value written.
    pub fn modify(&self, reg: Reg, value: u16, mask: u16) -> u16 {
        self.with_view(|view| view.modify(reg, value, mask))
    }
}

/// Register access while the block's exclusion is held.
pub struct RegisterView<'a, B: RegisterBus> {
    regs: &'a RegisterSet<B>,
    _cs: CriticalSection<'a>,
}

impl<'a, B: RegisterBus> RegisterView<'a, B> {
    #[inline]
    pub fn read(&self, reg: Reg) -> u16 {
        self.regs.read(reg)
    }

    #[inline]
    pub fn write(&self, reg: Reg, value: u16) {
        self.regs.write(reg, value)
    }

    /// Writes `(old & !mask) | (value & mask)` and returns it.
    pub fn modify(&self, reg: Reg, value: u16, mask: u16) -> u16 {
        let merged = merge_masked(self.read(reg), value, mask);
        self.write(reg, merged);
        merged
    }

    /// Clears `bits` in `reg`. Not for write-1-to-clear status registers.
    pub fn clear_bits(&self, reg: Reg, bits: u16) -> u16 {
        self.modify(reg, 0, bits)
    }

    /// Sets `bits` in `reg`.
    pub fn set_bits(&self, reg: Reg, bits: u16) -> u16 {
        self.modify(reg, bits, bits)
    }
}
