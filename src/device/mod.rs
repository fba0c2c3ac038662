pub mod capability;
pub mod context;
#[path = "device.rs"]
mod device_trait;
pub mod error;
pub mod grouping;
pub mod keepalive;
pub mod request;

pub use capability::DeviceCapabilities;
pub use context::AccessContext;
pub use device_trait::{Device, DeviceMemory};
pub use error::{DeviceError, DeviceResult, ErrorKind};
pub use grouping::{GroupMember, RequestGroup, group_by_memory_type, split_payload};
pub use keepalive::{Heartbeat, KeepAliveSettings, spawn_keepalive};
pub use request::{
    MemoryReadRequest, MemoryReadResponse, MemoryRequest, MemoryWriteRequest, MemoryWriteResponse,
};
