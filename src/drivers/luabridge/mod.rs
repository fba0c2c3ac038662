//! Server side of the Lua bridge. Emulator scripts connect in, answer a
//! `Version` handshake and then take commands addressed on the SNES A-bus.
pub mod device;
pub mod driver;
pub mod protocol;

pub use device::LuaBridgeDevice;
pub use driver::{DEFAULT_LISTEN, KIND, LuaBridgeDriver, LuaBridgeSettings};
