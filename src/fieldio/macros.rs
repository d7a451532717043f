/// Generates a read accessor for one field I/O register.
macro_rules! impl_register_read {
    ($name:ident, $reg:expr) => {
        paste::paste! {
            #[doc = "Reads the `" $name "` register."]
            #[inline]
            pub fn [<read_ $name>](&self) -> u16 {
                self.read($reg)
            }
        }
    };
}

/// Generates read and write accessors for one field I/O register.
macro_rules! impl_register_rw {
    ($name:ident, $reg:expr) => {
        impl_register_read!($name, $reg);

        paste::paste! {
            #[doc = "Writes the `" $name "` register."]
            #[inline]
            pub fn [<write_ $name>](&self, value: u16) {
                self.write($reg, value)
            }
        }
    };
}

/// Generates accessors for all seven registers of a field I/O block.
macro_rules! impl_field_io_accessors {
    () => {
        impl_register_rw!(control, Reg::Control);
        impl_register_rw!(output, Reg::WriteData);
        impl_register_read!(input, Reg::ReadData);
        impl_register_rw!(rising_status, Reg::RisingStatus);
        impl_register_rw!(rising_enable, Reg::RisingEnable);
        impl_register_rw!(falling_status, Reg::FallingStatus);
        impl_register_rw!(falling_enable, Reg::FallingEnable);
    };
}

pub(super) use impl_field_io_accessors;
pub(super) use impl_register_read;
pub(super) use impl_register_rw;
