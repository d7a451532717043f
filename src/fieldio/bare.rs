use crate::fieldio::{
    DriverError,
    address::translate,
    bus::RegisterBus,
    helpers::merge_masked,
    types::{ComponentAddress, WordAddress},
};

/// Access to single 16-bit register components, addressed per call.
///
/// One port serves every such component on a module. Masked writes are
/// read-modify-write sequences inside a critical section.
#[derive(Debug)]
pub struct BareRegisterPort<B: RegisterBus> {
    bus: B,
}

impl<B: RegisterBus> BareRegisterPort<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    fn locate(&self, address: ComponentAddress) -> Result<WordAddress, DriverError> {
        let at = translate(address);
        if !self.bus.contains(at) {
            return Err(DriverError::OutsideWindow);
        }
        Ok(at)
    }

    /// Reads the register at `address`, keeping the bits in `mask`.
    pub fn read(&self, address: ComponentAddress, mask: u16) -> Result<u16, DriverError> {
        let at = self.locate(address)?;
        Ok(self.bus.read(at) & mask)
    }

    /// Replaces the bits in `mask`. Returns the word written.
    pub fn write(
        &self,
        address: ComponentAddress,
        value: u16,
        mask: u16,
    ) -> Result<u16, DriverError> {
        let at = self.locate(address)?;
        Ok(critical_section::with(|_| {
            let merged = merge_masked(self.bus.read(at), value, mask);
            self.bus.write(at, merged);
            merged
        }))
    }

    pub fn read_word(&self, address: ComponentAddress) -> Result<u16, DriverError> {
        self.read(address, 0xFFFF)
    }

    pub fn write_word(&self, address: ComponentAddress, value: u16) -> Result<(), DriverError> {
        let at = self.locate(address)?;
        self.bus.write(at, value);
        Ok(())
    }
}
