//! Live devices owned by one driver, keyed by the driver's device key.
use std::{
    collections::hash_map::Entry,
    ptr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use ahash::AHashMap;

use crate::device::Device;

pub struct DeviceMap<T: ?Sized> {
    devices: Mutex<AHashMap<String, Arc<T>>>,
}

impl<T: Device + ?Sized> DeviceMap<T> {
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(AHashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AHashMap<String, Arc<T>>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the device under `key` if it is still open. A closed device is
    /// evicted so the next caller connects afresh.
    pub fn get_open(&self, key: &str) -> Option<Arc<T>> {
        let mut devices = self.lock();
        let device = devices.get(key).cloned()?;
        if device.is_closed() {
            devices.remove(key);
            return None;
        }
        Some(device)
    }

    /// Inserts `device`, returning whatever it replaced.
    pub fn insert(&self, key: impl Into<String>, device: Arc<T>) -> Option<Arc<T>> {
        self.lock().insert(key.into(), device)
    }

    /// Keeps an open device already stored under `key`, otherwise stores
    /// `device`. Returns the device now in the map and whether it is `device`.
    pub fn get_or_insert(&self, key: impl Into<String>, device: Arc<T>) -> (Arc<T>, bool) {
        let mut devices = self.lock();
        match devices.entry(key.into()) {
            Entry::Occupied(entry) if !entry.get().is_closed() => (Arc::clone(entry.get()), false),
            Entry::Occupied(mut entry) => {
                entry.insert(Arc::clone(&device));
                (device, true)
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&device));
                (device, true)
            }
        }
    }

    /// Removes the entry under `key` only when it still holds `device`; a
    /// replacement stored since is left alone.
    pub fn remove_if_same<U: ?Sized>(&self, key: &str, device: &Arc<U>) -> bool {
        let mut devices = self.lock();
        let same = devices
            .get(key)
            .is_some_and(|current| ptr::addr_eq(Arc::as_ptr(current), Arc::as_ptr(device)));
        if same {
            devices.remove(key);
        }
        same
    }

    /// Open devices, sorted by key. Closed entries are evicted on the way.
    pub fn snapshot(&self) -> Vec<(String, Arc<T>)> {
        let mut devices = self.lock();
        devices.retain(|_, device| !device.is_closed());
        let mut open: Vec<_> = devices
            .iter()
            .map(|(key, device)| (key.clone(), Arc::clone(device)))
            .collect();
        open.sort_by(|a, b| a.0.cmp(&b.0));
        open
    }

    /// Empties the map and hands every device to the caller for closing.
    pub fn drain(&self) -> Vec<Arc<T>> {
        self.lock().drain().map(|(_, device)| device).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Device + ?Sized> Default for DeviceMap<T> {
    fn default() -> Self {
        Self::new()
    }
}
