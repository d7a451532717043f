//! Component-address translation.
//!
//! The bridge maps component addresses `0x000000..=0x00007F` onto I/O space
//! and `0x800000..=0xFFFFFF` onto memory space (bit 23 masked off). Registers
//! are 16 bits wide, so byte offsets are halved into word offsets.

use core::ptr::NonNull;

use crate::fieldio::{
    bus::SpaceResolver,
    types::{ComponentAddress, Location, MEM_SPACE_FLAG, Region, WordAddress},
};

/// Splits a component address into its region and in-region byte offset.
#[inline]
pub fn byte_offset(address: ComponentAddress) -> (Region, u32) {
    let raw = address.raw();
    if raw & MEM_SPACE_FLAG != 0 {
        (Region::Mem, raw & !MEM_SPACE_FLAG)
    } else {
        (Region::Io, raw)
    }
}

/// Maps a component address to the word that backs it.
///
/// Odd byte offsets are truncated to the containing word.
///
/// # Example
/// ```
/// use fieldio_bridge::fieldio::{address::translate, ComponentAddress, Region};
///
/// let io = translate(ComponentAddress::new(0x000010).unwrap());
/// assert_eq!((io.region, io.word), (Region::Io, 0x08));
///
/// let mem = translate(ComponentAddress::new(0x800003).unwrap());
/// assert_eq!((mem.region, mem.word), (Region::Mem, 0x01));
/// ```
#[inline]
pub fn translate(address: ComponentAddress) -> WordAddress {
    let (region, offset) = byte_offset(address);
    WordAddress::new(region, offset >> 1)
}

/// Re-resolves the window bases for `location` and returns the word pointer.
///
/// Does not allocate, so it may be used from service routines that only know
/// carrier, slot and address. Returns `None` if the carrier service has no
/// window for the region or the word lies outside it.
pub fn resolve<S: SpaceResolver + ?Sized>(
    resolver: &S,
    location: Location,
    address: ComponentAddress,
) -> Option<NonNull<u16>> {
    let at = translate(address);
    resolver.window(location, at.region)?.word_ptr(at.word)
}
