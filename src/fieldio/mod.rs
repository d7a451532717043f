pub mod address;
pub mod bare;
pub mod builder;
pub mod bus;
pub mod error;
pub mod helpers;
pub mod hexfile;
pub mod instances;
pub mod irq;
pub mod loader;
mod macros;
pub mod module;
pub mod queue;
pub mod reconcile;
pub mod regs;
pub mod subscribers;
pub mod time;
pub mod types;

#[cfg(test)]
mod test_support;

pub use bare::BareRegisterPort;
pub use builder::{FieldIoBuilder, NeedAddress};
pub use bus::{MappedBus, MappedWindow, RegisterBus, SpaceResolver};
pub use error::{DriverError, LoadError, LoadStage};
pub use hexfile::{BitstreamRecord, RecordError};
pub use instances::InstanceTable;
pub use irq::{Delivery, FastHandler, FastPathKey, FastPathTable, IrqOutcome};
pub use loader::{
    BusConfigPort, ConfigPort, ConfigStatus, FirmwareLoader, InterruptLine, LoadReport, LoadState,
    LoaderConfig,
};
pub use module::{ArmConfig, FieldIoModule, Stats};
pub use queue::{EventQueue, Received};
pub use reconcile::{Cycle, Source};
pub use regs::{Reg, RegisterSet};
pub use subscribers::{Notify, SubscriberHandle, SubscriberRegistry};
#[cfg(feature = "std")]
pub use time::StdDelay;
pub use time::{Delay, NoDelay};
pub use types::{
    Channel, ComponentAddress, EdgeConfig, InterruptEvent, Location, Region, Selector, WordAddress,
};

pub mod prelude {
    pub use super::{
        BareRegisterPort, Channel, ComponentAddress, ConfigPort, Delay, DriverError, EdgeConfig,
        FastHandler, FastPathTable, FieldIoBuilder, FieldIoModule, FirmwareLoader, InterruptLine,
        LoadError, Location, NoDelay, Notify, RegisterBus, Selector,
    };
}
