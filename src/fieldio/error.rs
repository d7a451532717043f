/// Caller errors rejected synchronously, with no side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// Component address is wider than 24 bits or outside the I/O window.
    AddressOutOfRange,
    /// Address translates to a word the bus window does not contain.
    OutsideWindow,
    /// Channel index is not in `0..16`.
    InvalidChannel,
    /// Edge configuration value is not in `0..=3`.
    InvalidEdgeConfig,
    /// Selector code or name is unknown.
    InvalidSelector,
    /// Fixed-capacity table is full.
    RegistryFull,
    /// Handle does not name a registered entry.
    UnknownSubscriber,
    /// Another instance is already registered at this location.
    DuplicateLocation,
}

impl core::fmt::Display for DriverError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DriverError::AddressOutOfRange => write!(f, "component address out of range"),
            DriverError::OutsideWindow => write!(f, "address outside the mapped bus window"),
            DriverError::InvalidChannel => write!(f, "channel index out of range"),
            DriverError::InvalidEdgeConfig => write!(f, "invalid edge configuration value"),
            DriverError::InvalidSelector => write!(f, "unknown selector"),
            DriverError::RegistryFull => write!(f, "table capacity exceeded"),
            DriverError::UnknownSubscriber => write!(f, "no such registration"),
            DriverError::DuplicateLocation => write!(f, "location already registered"),
        }
    }
}

/// Phase of the bitstream load in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    /// Checking that the module reports configuration mode.
    ConfigMode,
    /// Waiting for the start-configuration acknowledge.
    Acknowledge,
    /// Parsing the image or streaming payload bytes.
    Streaming,
    /// Waiting for the done bit or the programmed mode code.
    Done,
}

/// Protocol failures surfaced by the firmware loader.
///
/// Each variant carries the last observed hardware state so the caller can
/// decide whether to retry with another image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadError {
    /// Module is not in configuration mode (already programmed or absent).
    NotInConfigMode { mode: u8 },
    /// Start-configuration acknowledge never arrived.
    AckTimeout { status: u16 },
    /// Line does not start with `:` or its header/payload is not hex.
    BadRecord { line: usize },
    /// Ready pattern not seen before a payload byte.
    ReadyTimeout {
        line: usize,
        byte_index: usize,
        total_bytes: usize,
        status: u16,
    },
    /// Neither the done bit nor the programmed mode was reported.
    DoneTimeout { status: u16, mode: u8 },
}

impl LoadError {
    /// Returns the phase in which this error was raised.
    pub fn stage(&self) -> LoadStage {
        match self {
            LoadError::NotInConfigMode { .. } => LoadStage::ConfigMode,
            LoadError::AckTimeout { .. } => LoadStage::Acknowledge,
            LoadError::BadRecord { .. } | LoadError::ReadyTimeout { .. } => LoadStage::Streaming,
            LoadError::DoneTimeout { .. } => LoadStage::Done,
        }
    }
}

impl core::fmt::Display for LoadError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LoadError::NotInConfigMode { mode } => {
                write!(f, "not in configuration mode (mode {mode:#04x})")
            }
            LoadError::AckTimeout { status } => {
                write!(f, "timeout entering data-transfer mode (status {status:#06x})")
            }
            LoadError::BadRecord { line } => write!(f, "bad image content at line {line}"),
            LoadError::ReadyTimeout {
                line,
                byte_index,
                total_bytes,
                status,
            } => write!(
                f,
                "ready timeout at byte {byte_index} of line {line} \
                 ({total_bytes} bytes sent, status {status:#06x})"
            ),
            LoadError::DoneTimeout { status, mode } => write!(
                f,
                "configuration not done (status {status:#06x}, mode {mode:#04x})"
            ),
        }
    }
}
