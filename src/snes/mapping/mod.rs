//! Bit-exact conversions between the 24-bit console bus and the linear pak
//! space. Each cartridge mapping lives in its own module; the WRAM window and
//! its mirrors behave identically under all of them.
pub mod error;
pub mod exhirom;
pub mod hirom;
pub mod lorom;
mod shared;

pub use error::{MappingError, MappingResult};
pub use shared::{
    ADDRESS_MASK, PAK_SRAM_BASE, PAK_WRAM_BASE, PAK_WRAM_END, WRAM_SIZE, bank_to_linear,
    linear_to_bank,
};

use super::address::MemoryMapping;

pub fn bus_to_pak(address: u32, mapping: MemoryMapping) -> MappingResult<u32> {
    match mapping {
        MemoryMapping::LoRom => lorom::bus_to_pak(address),
        MemoryMapping::HiRom => hirom::bus_to_pak(address),
        MemoryMapping::ExHiRom => exhirom::bus_to_pak(address),
        MemoryMapping::Unknown => Err(MappingError::UnknownMapping { address }),
    }
}

pub fn pak_to_bus(address: u32, mapping: MemoryMapping) -> MappingResult<u32> {
    match mapping {
        MemoryMapping::LoRom => lorom::pak_to_bus(address),
        MemoryMapping::HiRom => hirom::pak_to_bus(address),
        MemoryMapping::ExHiRom => exhirom::pak_to_bus(address),
        MemoryMapping::Unknown => Err(MappingError::UnknownMapping { address }),
    }
}
