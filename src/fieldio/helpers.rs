//! Bit helpers shared by the register set, the handler and the reconciler.

use bitmaps::Bitmap;

use crate::fieldio::types::Channel;

/// Merges `value` into `old` under `mask`: `(old & !mask) | (value & mask)`.
///
/// # Example
/// ```
/// use fieldio_bridge::fieldio::helpers::merge_masked;
///
/// assert_eq!(merge_masked(0xFF00, 0x00AA, 0x0F0F), 0xF00A);
/// ```
#[inline]
pub fn merge_masked(old: u16, value: u16, mask: u16) -> u16 {
    (old & !mask) | (value & mask)
}

/// Calls `f` for every channel set in `mask`, lowest first.
pub fn for_each_channel(mask: u16, mut f: impl FnMut(Channel)) {
    let bits: Bitmap<16> = Bitmap::from_value(mask);
    let mut idx = bits.first_index();
    while let Some(i) = idx {
        // Bitmap<16> only yields indices below 16.
        if let Ok(channel) = Channel::new(i as u8) {
            f(channel);
        }
        idx = bits.next_index(i);
    }
}

#[test]
fn merge_masked_leaves_unmasked_bits() {
    assert_eq!(merge_masked(0x0000, 0xFFFF, 0x0000), 0x0000);
    assert_eq!(merge_masked(0xFFFF, 0x0000, 0x00F0), 0xFF0F);
    assert_eq!(merge_masked(0x1234, 0xABCD, 0xFFFF), 0xABCD);
}

#[test]
fn for_each_channel_visits_set_bits_in_order() {
    let mut seen = heapless::Vec::<u8, 16>::new();
    for_each_channel(0x8011, |ch| seen.push(ch.index()).unwrap());
    assert_eq!(seen.as_slice(), &[0, 4, 15]);

    let mut none = 0;
    for_each_channel(0, |_| none += 1);
    assert_eq!(none, 0);
}
