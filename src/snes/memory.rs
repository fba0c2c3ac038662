//! Classification of pak addresses into memory regions. Every transport that
//! addresses memory by region (rather than by linear address) goes through
//! [`resolve_address`] to find the region and the offset within it.
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::{
    address::{AddressSpace, AddressTuple},
    mapping::{self, MappingError, MappingResult, PAK_SRAM_BASE, PAK_WRAM_BASE, PAK_WRAM_END},
};

const PAK_RESERVED_BASE: u32 = 0xF0_0000;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum MemoryType {
    #[default]
    Unknown,
    #[serde(rename = "CARTROM")]
    CartRom,
    #[serde(rename = "SRAM")]
    Sram,
    #[serde(rename = "WRAM")]
    Wram,
}

impl MemoryType {
    pub fn as_str(self) -> &'static str {
        match self {
            MemoryType::Unknown => "Unknown",
            MemoryType::CartRom => "CARTROM",
            MemoryType::Sram => "SRAM",
            MemoryType::Wram => "WRAM",
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Unknown" => Ok(MemoryType::Unknown),
            "CARTROM" => Ok(MemoryType::CartRom),
            "SRAM" => Ok(MemoryType::Sram),
            "WRAM" => Ok(MemoryType::Wram),
            _ => Err(()),
        }
    }
}

/// A pak address placed in its region.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ResolvedAddress {
    pub memory_type: MemoryType,
    pub pak_address: u32,
    pub offset: u32,
}

/// Returns the region and the region-relative offset of `pak`.
///
/// `$F00000-$F4FFFF` and everything from `$F70000` up are left unclassified;
/// those banks hold video and register state that no region covers.
pub fn classify_pak_address(pak: u32) -> (MemoryType, u32) {
    match pak {
        0..PAK_SRAM_BASE => (MemoryType::CartRom, pak),
        PAK_SRAM_BASE..PAK_RESERVED_BASE => (MemoryType::Sram, pak - PAK_SRAM_BASE),
        PAK_RESERVED_BASE..PAK_WRAM_BASE => (MemoryType::Unknown, pak),
        PAK_WRAM_BASE..PAK_WRAM_END => (MemoryType::Wram, pak - PAK_WRAM_BASE),
        _ => (MemoryType::Unknown, pak),
    }
}

pub fn resolve_address(tuple: AddressTuple) -> MappingResult<ResolvedAddress> {
    let pak_address = match tuple.space {
        AddressSpace::FxPakPro => tuple.address,
        AddressSpace::SnesABus => mapping::bus_to_pak(tuple.address, tuple.mapping)?,
        AddressSpace::Raw => {
            return Err(MappingError::UnsupportedSpace {
                space: AddressSpace::Raw,
            });
        }
    };
    let (memory_type, offset) = classify_pak_address(pak_address);
    Ok(ResolvedAddress {
        memory_type,
        pak_address,
        offset,
    })
}
