use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Optional operations a driver's devices support.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
    pub struct DeviceCapabilities: u32 {
        const READ_MEMORY              = 0b1;
        const WRITE_MEMORY             = 0b10;
        const RESET_SYSTEM             = 0b100;
        const PAUSE_UNPAUSE_EMULATION  = 0b1000;
        const PAUSE_TOGGLE_EMULATION   = 0b1_0000;
    }
}

impl DeviceCapabilities {
    pub fn has_all(self, required: DeviceCapabilities) -> bool {
        self.contains(required)
    }

    pub fn names(self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }
}

impl fmt::Display for DeviceCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join("|"))
    }
}
