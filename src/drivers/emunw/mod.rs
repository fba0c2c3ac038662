//! Client for emulators exposing the line-based network access protocol
//! (`CORE_READ`, `EMU_STATUS`, ...). Devices read and write in pak space by
//! memory region.
pub mod device;
pub mod driver;
pub mod protocol;

pub use device::{EmuNwDevice, EmulatorStatus};
pub use driver::{EmuNwDriver, EmuNwSettings, KIND, default_hosts};
