#![allow(unsafe_code)]

use core::ptr::NonNull;

use crate::fieldio::types::{Location, Region, WordAddress};

/// Word-granular access to the module's bus windows.
///
/// Every access is a single 16-bit operation. Implementations use interior
/// mutability because hardware registers change underneath the driver anyway.
pub trait RegisterBus {
    /// Reads the word at `at`.
    fn read(&self, at: WordAddress) -> u16;

    /// Writes `value` to the word at `at`.
    fn write(&self, at: WordAddress, value: u16);

    /// Returns true if `at` falls strictly inside a mapped window.
    fn contains(&self, _at: WordAddress) -> bool {
        true
    }
}

impl<T: RegisterBus + ?Sized> RegisterBus for &T {
    #[inline]
    fn read(&self, at: WordAddress) -> u16 {
        (**self).read(at)
    }

    #[inline]
    fn write(&self, at: WordAddress, value: u16) {
        (**self).write(at, value)
    }

    #[inline]
    fn contains(&self, at: WordAddress) -> bool {
        (**self).contains(at)
    }
}

/// A run of memory-mapped 16-bit device registers.
#[derive(Debug, Clone, Copy)]
pub struct MappedWindow {
    base: NonNull<u16>,
    words: usize,
}

// Device registers are reached only through single volatile 16-bit accesses.
unsafe impl Send for MappedWindow {}
unsafe impl Sync for MappedWindow {}

impl MappedWindow {
    /// # Safety
    /// `base` must point to `words` consecutive 16-bit locations that stay
    /// valid for volatile reads and writes for as long as the window is used.
    pub const unsafe fn new(base: NonNull<u16>, words: usize) -> Self {
        Self { base, words }
    }

    #[inline]
    pub fn words(&self) -> usize {
        self.words
    }

    #[inline]
    pub fn contains(&self, word: u32) -> bool {
        (word as usize) < self.words
    }

    /// Pointer to `word`, or `None` when it lies outside the window.
    pub fn word_ptr(&self, word: u32) -> Option<NonNull<u16>> {
        if !self.contains(word) {
            return None;
        }
        // In bounds: checked against the extent given to `new`.
        Some(unsafe { self.base.add(word as usize) })
    }

    pub fn read(&self, word: u32) -> Option<u16> {
        self.word_ptr(word)
            .map(|ptr| unsafe { ptr.as_ptr().read_volatile() })
    }

    pub fn write(&self, word: u32, value: u16) -> bool {
        match self.word_ptr(word) {
            Some(ptr) => {
                unsafe { ptr.as_ptr().write_volatile(value) };
                true
            }
            None => false,
        }
    }
}

/// External carrier service that maps a module location to its windows.
pub trait SpaceResolver {
    fn window(&self, location: Location, region: Region) -> Option<MappedWindow>;
}

/// Volatile bus over the I/O, memory and (optionally) ID windows of one module.
///
/// Accesses outside a window read as `0xFFFF` and writes are dropped.
#[derive(Debug, Clone, Copy)]
pub struct MappedBus {
    io: MappedWindow,
    mem: MappedWindow,
    id: Option<MappedWindow>,
}

impl MappedBus {
    pub fn new(io: MappedWindow, mem: MappedWindow, id: Option<MappedWindow>) -> Self {
        Self { io, mem, id }
    }

    /// Resolves the window bases once, at setup.
    pub fn from_resolver<S: SpaceResolver + ?Sized>(
        resolver: &S,
        location: Location,
    ) -> Option<Self> {
        let io = resolver.window(location, Region::Io)?;
        let mem = resolver.window(location, Region::Mem)?;
        let id = resolver.window(location, Region::Id);
        log::debug!(
            "resolved carrier {} slot {}: io {} words, mem {} words",
            location.carrier,
            location.slot,
            io.words(),
            mem.words()
        );
        Some(Self::new(io, mem, id))
    }

    fn window(&self, region: Region) -> Option<&MappedWindow> {
        match region {
            Region::Io => Some(&self.io),
            Region::Mem => Some(&self.mem),
            Region::Id => self.id.as_ref(),
        }
    }
}

impl RegisterBus for MappedBus {
    fn read(&self, at: WordAddress) -> u16 {
        self.window(at.region)
            .and_then(|w| w.read(at.word))
            .unwrap_or(0xFFFF)
    }

    fn write(&self, at: WordAddress, value: u16) {
        if let Some(w) = self.window(at.region) {
            w.write(at.word, value);
        }
    }

    fn contains(&self, at: WordAddress) -> bool {
        self.window(at.region).is_some_and(|w| w.contains(at.word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_over(backing: &mut [u16]) -> MappedWindow {
        let len = backing.len();
        unsafe { MappedWindow::new(NonNull::from(backing).cast::<u16>(), len) }
    }

    #[test]
    fn window_rejects_words_past_extent() {
        let mut backing = [0u16; 4];
        let window = window_over(&mut backing);

        assert!(window.contains(3));
        assert!(!window.contains(4));
        assert!(window.word_ptr(4).is_none());
        assert_eq!(window.read(4), None);
        assert!(!window.write(4, 1));
    }

    #[test]
    fn mapped_bus_routes_by_region() {
        let mut io = [0u16; 8];
        let mut mem = [0u16; 16];
        let bus = MappedBus::new(window_over(&mut io), window_over(&mut mem), None);

        bus.write(WordAddress::new(Region::Io, 2), 0x1234);
        bus.write(WordAddress::new(Region::Mem, 2), 0xABCD);

        assert_eq!(bus.read(WordAddress::new(Region::Io, 2)), 0x1234);
        assert_eq!(bus.read(WordAddress::new(Region::Mem, 2)), 0xABCD);
        assert!(!bus.contains(WordAddress::new(Region::Io, 8)));
        assert!(bus.contains(WordAddress::new(Region::Mem, 15)));
    }

    #[test]
    fn mapped_bus_out_of_window_reads_open_bus() {
        let mut io = [0u16; 2];
        let mut mem = [0u16; 2];
        let bus = MappedBus::new(window_over(&mut io), window_over(&mut mem), None);

        bus.write(WordAddress::new(Region::Io, 5), 0x55);
        assert_eq!(bus.read(WordAddress::new(Region::Io, 5)), 0xFFFF);
        assert_eq!(bus.read(WordAddress::new(Region::Id, 0)), 0xFFFF);
        assert!(!bus.contains(WordAddress::new(Region::Id, 0)));
    }
}
