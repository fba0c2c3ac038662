use crate::{device::DeviceCapabilities, snes::address::AddressSpace};

use super::uri::DeviceUri;

/// Snapshot of a detected device. Produced fresh by every detection pass and
/// never tied to a live connection.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeviceDescriptor {
    pub uri: DeviceUri,
    pub display_name: String,
    pub kind: String,
    pub capabilities: DeviceCapabilities,
    pub default_address_space: AddressSpace,
}
