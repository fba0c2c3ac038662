//! Drivers enumerate and open devices for one transport kind. Each driver
//! owns its devices; [`DriverRegistry`] routes URIs to drivers.
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    device::{Device, DeviceCapabilities, DeviceResult},
    snes::address::AddressSpace,
};

pub mod descriptor;
pub mod device_map;
pub mod discovery;
pub mod registry;
pub mod uri;

pub use descriptor::DeviceDescriptor;
pub use device_map::DeviceMap;
pub use discovery::probe_all;
pub use registry::DriverRegistry;
pub use uri::DeviceUri;

#[async_trait]
pub trait Driver: Send + Sync {
    /// URI scheme this driver answers to.
    fn kind(&self) -> &str;

    fn display_name(&self) -> &str;

    fn capabilities(&self) -> DeviceCapabilities;

    fn has_capabilities(&self, required: DeviceCapabilities) -> bool {
        self.capabilities().has_all(required)
    }

    /// Space the driver's devices natively address.
    fn default_address_space(&self) -> AddressSpace;

    /// Enumerates the devices reachable right now.
    async fn detect(&self) -> DeviceResult<Vec<DeviceDescriptor>>;

    fn device_key(&self, uri: &DeviceUri) -> String {
        uri.address().to_string()
    }

    /// The open device for `uri`, if one exists.
    fn device(&self, uri: &DeviceUri) -> Option<Arc<dyn Device>>;

    /// Establishes a new device. Drivers that only accept connections fail
    /// with [`DeviceError::NoDeviceFound`](crate::device::DeviceError::NoDeviceFound).
    async fn open_device(&self, key: &str, uri: &DeviceUri) -> DeviceResult<Arc<dyn Device>>;

    /// Closes `device` and forgets it, provided it is still the device
    /// stored under `key`.
    async fn disconnect(&self, key: &str, device: &Arc<dyn Device>);

    /// Closes every device and stops any background work.
    async fn shutdown(&self);
}
