//! Uniform access to the memory of a running SNES, whichever bridge it is
//! attached through and whichever cartridge mapping the loaded ROM uses.
pub mod config;
pub mod device;
pub mod driver;
pub mod drivers;
pub mod snes;

pub use config::Config;
pub use device::{AccessContext, Device, DeviceCapabilities, DeviceError, DeviceResult, ErrorKind};
pub use driver::{DeviceDescriptor, DeviceUri, Driver, DriverRegistry};
pub use snes::{AddressSpace, AddressTuple, MemoryMapping, MemoryType};
