//! Address tuples identify one byte location on the console. A tuple pairs a
//! raw 24-bit value with the space it is expressed in and, for bus-relative
//! addresses, the cartridge mapping that governs translation.
use std::fmt;

use super::mapping::{self, MappingError, MappingResult};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum AddressSpace {
    /// Transport specific; never translated.
    Raw,
    /// Linear "pak" space with ROM, SRAM and WRAM packed without bank gaps.
    #[default]
    FxPakPro,
    /// The 24-bit A-bus as the running program sees it.
    SnesABus,
}

impl AddressSpace {
    pub fn as_str(self) -> &'static str {
        match self {
            AddressSpace::Raw => "Raw",
            AddressSpace::FxPakPro => "FxPakPro",
            AddressSpace::SnesABus => "SnesABus",
        }
    }
}

impl fmt::Display for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum MemoryMapping {
    #[default]
    Unknown,
    LoRom,
    HiRom,
    ExHiRom,
}

impl MemoryMapping {
    /// Mappings a ROM can actually use, in probing order.
    pub const KNOWN: [MemoryMapping; 3] =
        [MemoryMapping::LoRom, MemoryMapping::HiRom, MemoryMapping::ExHiRom];

    pub fn as_str(self) -> &'static str {
        match self {
            MemoryMapping::Unknown => "Unknown",
            MemoryMapping::LoRom => "LoROM",
            MemoryMapping::HiRom => "HiROM",
            MemoryMapping::ExHiRom => "ExHiROM",
        }
    }
}

impl fmt::Display for MemoryMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct AddressTuple {
    pub address: u32,
    pub space: AddressSpace,
    pub mapping: MemoryMapping,
}

impl AddressTuple {
    pub const fn new(address: u32, space: AddressSpace, mapping: MemoryMapping) -> Self {
        Self {
            address,
            space,
            mapping,
        }
    }

    pub const fn pak(address: u32) -> Self {
        Self::new(address, AddressSpace::FxPakPro, MemoryMapping::Unknown)
    }

    pub const fn bus(address: u32, mapping: MemoryMapping) -> Self {
        Self::new(address, AddressSpace::SnesABus, mapping)
    }

    /// Same location, tagged with a different mapping.
    pub const fn with_mapping(self, mapping: MemoryMapping) -> Self {
        Self::new(self.address, self.space, mapping)
    }

    /// Expresses this location in `target` space, keeping the mapping tag.
    pub fn translate(self, target: AddressSpace) -> MappingResult<AddressTuple> {
        translate(self, target).map(|address| Self::new(address, target, self.mapping))
    }
}

impl fmt::Display for AddressTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "${:06X} ({}, {})",
            self.address, self.space, self.mapping
        )
    }
}

/// Converts `tuple` into an address in `target` space. Raw addresses only
/// translate to Raw; bus/pak conversions need a known mapping.
pub fn translate(tuple: AddressTuple, target: AddressSpace) -> MappingResult<u32> {
    match (tuple.space, target) {
        (from, to) if from == to => Ok(tuple.address),
        (AddressSpace::FxPakPro, AddressSpace::SnesABus) => {
            mapping::pak_to_bus(tuple.address, tuple.mapping)
        }
        (AddressSpace::SnesABus, AddressSpace::FxPakPro) => {
            mapping::bus_to_pak(tuple.address, tuple.mapping)
        }
        (AddressSpace::Raw, _) => Err(MappingError::UnsupportedSpace {
            space: AddressSpace::Raw,
        }),
        (_, space) => Err(MappingError::UnsupportedSpace { space }),
    }
}
