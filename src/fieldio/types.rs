use crate::fieldio::DriverError;

/// Largest representable component address (24 bits).
pub const COMPONENT_ADDRESS_MAX: u32 = 0x00FF_FFFF;
/// Bit 23 selects memory space.
pub const MEM_SPACE_FLAG: u32 = 0x0080_0000;
/// Highest byte offset of the I/O-space window.
pub const IO_SPACE_LAST: u32 = 0x7F;

/// Number of field I/O channels.
pub const CHANNELS: u8 = 16;

/// Bus window a word lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// Module I/O space.
    Io,
    /// Module memory space.
    Mem,
    /// Module ID PROM space. Never produced by address translation.
    Id,
}

/// A 16-bit word inside one of the module's bus windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WordAddress {
    pub region: Region,
    pub word: u32,
}

impl WordAddress {
    pub const fn new(region: Region, word: u32) -> Self {
        Self { region, word }
    }

    /// Returns the address `n` words further into the same region.
    pub const fn offset(self, n: u32) -> Self {
        Self {
            region: self.region,
            word: self.word + n,
        }
    }
}

/// A validated 24-bit component address.
///
/// Bit 23 set selects memory space, anything else must fall inside the
/// 128-byte I/O window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentAddress(u32);

impl ComponentAddress {
    pub fn new(raw: u32) -> Result<Self, DriverError> {
        if raw > COMPONENT_ADDRESS_MAX {
            return Err(DriverError::AddressOutOfRange);
        }
        if raw & MEM_SPACE_FLAG == 0 && raw > IO_SPACE_LAST {
            return Err(DriverError::AddressOutOfRange);
        }
        Ok(Self(raw))
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for ComponentAddress {
    type Error = DriverError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

/// Carrier board and slot a module is plugged into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    pub carrier: u16,
    pub slot: u16,
}

impl Location {
    pub const fn new(carrier: u16, slot: u16) -> Self {
        Self { carrier, slot }
    }
}

/// One of the sixteen field I/O bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Channel(u8);

impl Channel {
    pub fn new(index: u8) -> Result<Self, DriverError> {
        if index >= CHANNELS {
            return Err(DriverError::InvalidChannel);
        }
        Ok(Self(index))
    }

    /// Lowest channel set in `mask`, if any.
    pub fn lowest_in(mask: u16) -> Option<Self> {
        if mask == 0 {
            None
        } else {
            Some(Self(mask.trailing_zeros() as u8))
        }
    }

    #[inline]
    pub fn index(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn mask(self) -> u16 {
        1 << self.0
    }
}

/// Which edges of a channel raise an interrupt.
///
/// Encoded as two bits: bit 0 rising, bit 1 falling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeConfig {
    #[default]
    Disabled = 0,
    Rising = 1,
    Falling = 2,
    Both = 3,
}

impl EdgeConfig {
    pub fn from_enables(rising: bool, falling: bool) -> Self {
        match (rising, falling) {
            (false, false) => EdgeConfig::Disabled,
            (true, false) => EdgeConfig::Rising,
            (false, true) => EdgeConfig::Falling,
            (true, true) => EdgeConfig::Both,
        }
    }

    #[inline]
    pub fn rising(self) -> bool {
        matches!(self, EdgeConfig::Rising | EdgeConfig::Both)
    }

    #[inline]
    pub fn falling(self) -> bool {
        matches!(self, EdgeConfig::Falling | EdgeConfig::Both)
    }

    #[inline]
    pub fn bits(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for EdgeConfig {
    type Error = DriverError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(EdgeConfig::Disabled),
            1 => Ok(EdgeConfig::Rising),
            2 => Ok(EdgeConfig::Falling),
            3 => Ok(EdgeConfig::Both),
            _ => Err(DriverError::InvalidEdgeConfig),
        }
    }
}

/// What a subscriber or a selector-dispatched read refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// Input data bits.
    Data,
    /// Per-channel edge-enable configuration.
    EdgeConfig,
    /// Reconciler poll period in milliseconds.
    PollPeriod,
    /// Channels whose edge enables were cleared by storm protection.
    DisabledAck,
}

impl Selector {
    /// Parses the textual parameter names used by record configuration.
    ///
    /// An empty name selects the data bits.
    pub fn from_name(name: &str) -> Result<Self, DriverError> {
        match name {
            "" | "DATA" => Ok(Selector::Data),
            "INTEDGE" => Ok(Selector::EdgeConfig),
            "POLLTIME" => Ok(Selector::PollPeriod),
            "INT_EDGE_RESET" => Ok(Selector::DisabledAck),
            _ => Err(DriverError::InvalidSelector),
        }
    }
}

impl TryFrom<u8> for Selector {
    type Error = DriverError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Selector::Data),
            1 => Ok(Selector::EdgeConfig),
            2 => Ok(Selector::PollPeriod),
            3 => Ok(Selector::DisabledAck),
            _ => Err(DriverError::InvalidSelector),
        }
    }
}

/// Snapshot captured by the interrupt handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterruptEvent {
    /// Read-data register at interrupt time.
    pub bits: u16,
    /// Bits whose configured edge fired.
    pub edge_mask: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_address_bounds() {
        assert!(ComponentAddress::new(0x000000).is_ok());
        assert!(ComponentAddress::new(0x00007F).is_ok());
        assert!(ComponentAddress::new(0x800000).is_ok());
        assert!(ComponentAddress::new(0xFFFFFF).is_ok());

        assert_eq!(
            ComponentAddress::new(0x000080),
            Err(DriverError::AddressOutOfRange)
        );
        assert_eq!(
            ComponentAddress::new(0x7FFFFF),
            Err(DriverError::AddressOutOfRange)
        );
        assert_eq!(
            ComponentAddress::try_from(0x0100_0000),
            Err(DriverError::AddressOutOfRange)
        );
    }

    #[test]
    fn channel_bounds_and_mask() {
        assert_eq!(Channel::new(4).unwrap().mask(), 0x0010);
        assert_eq!(Channel::new(15).unwrap().mask(), 0x8000);
        assert_eq!(Channel::new(16), Err(DriverError::InvalidChannel));
        assert_eq!(Channel::lowest_in(0x0030), Some(Channel::new(4).unwrap()));
        assert_eq!(Channel::lowest_in(0), None);
    }

    #[test]
    fn edge_config_encoding_round_trips() {
        for v in 0..4u16 {
            let cfg = EdgeConfig::try_from(v).unwrap();
            assert_eq!(cfg.bits(), v);
            assert_eq!(EdgeConfig::from_enables(cfg.rising(), cfg.falling()), cfg);
        }
        assert_eq!(EdgeConfig::try_from(4), Err(DriverError::InvalidEdgeConfig));
    }

    #[test]
    fn selector_rejects_unknown_values() {
        assert_eq!(Selector::try_from(2), Ok(Selector::PollPeriod));
        assert_eq!(Selector::try_from(4), Err(DriverError::InvalidSelector));
        assert_eq!(Selector::from_name("INTEDGE"), Ok(Selector::EdgeConfig));
        assert_eq!(Selector::from_name(""), Ok(Selector::Data));
        assert_eq!(
            Selector::from_name("BOGUS"),
            Err(DriverError::InvalidSelector)
        );
    }
}
