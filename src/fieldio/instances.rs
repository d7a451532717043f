use core::cell::RefCell;

use critical_section::Mutex;
use heapless::FnvIndexMap;

use crate::fieldio::{DriverError, types::Location};

/// Default capacity of an [`InstanceTable`]. Must be a power of two.
pub const MAX_INSTANCES: usize = 16;

/// Lookup of driver instances by carrier and slot.
///
/// Collaborators that only know a module's location (service routines,
/// shell commands) find the instance here. Tables are passed by reference;
/// there is no global one.
pub struct InstanceTable<'a, T, const N: usize = MAX_INSTANCES> {
    map: Mutex<RefCell<FnvIndexMap<Location, &'a T, N>>>,
}

impl<'a, T, const N: usize> InstanceTable<'a, T, N> {
    pub fn new() -> Self {
        Self {
            map: Mutex::new(RefCell::new(FnvIndexMap::new())),
        }
    }

    pub fn insert(&self, location: Location, instance: &'a T) -> Result<(), DriverError> {
        critical_section::with(|cs| {
            let mut map = self.map.borrow_ref_mut(cs);
            if map.contains_key(&location) {
                return Err(DriverError::DuplicateLocation);
            }
            map.insert(location, instance)
                .map(|_| ())
                .map_err(|_| DriverError::RegistryFull)
        })
    }

    pub fn find(&self, location: Location) -> Option<&'a T> {
        critical_section::with(|cs| self.map.borrow_ref(cs).get(&location).copied())
    }

    pub fn remove(&self, location: Location) -> Option<&'a T> {
        critical_section::with(|cs| self.map.borrow_ref_mut(cs).remove(&location))
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.map.borrow_ref(cs).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a, T, const N: usize> Default for InstanceTable<'a, T, N> {
    fn default() -> Self {
        Self::new()
    }
}
