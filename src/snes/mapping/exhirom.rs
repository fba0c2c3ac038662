//! ExHiROM: up to 8MiB of ROM spread over four bus areas.
//!
//! | area | bus                  | pak                 |
//! |------|----------------------|---------------------|
//! | 0    | `$C0-$FF:0000-FFFF`  | `$000000-$3FFFFF`   |
//! | 1    | `$40-$7D:0000-FFFF`  | `$400000-$7DFFFF`   |
//! | 2    | `$80-$BF:8000-FFFF`  | mirror of area 0    |
//! | 3    | `$00-$3F:8000-FFFF`  | `$400000-$7FFFFF`   |
//!
//! Pak banks that would land on WRAM (`$7E/$7F`) are only reachable through
//! the upper halves of area 3.
use crate::snes::address::MemoryMapping;

use super::{
    MappingError, MappingResult,
    hirom::{SRAM_END, is_sram_window, sram_bus_to_pak, sram_pak_to_bus},
    shared::{PAK_SRAM_BASE, wram_bus_to_pak, wram_pak_to_bus},
};

const AREA_MASK: u32 = 0x3F_FFFF;
const UPPER_ROM_BASE: u32 = 0x40_0000;
const ROM_END: u32 = 0x80_0000;

fn unmapped(address: u32) -> MappingError {
    MappingError::Unmapped {
        address,
        mapping: MemoryMapping::ExHiRom,
    }
}

pub fn bus_to_pak(bus: u32) -> MappingResult<u32> {
    if bus > super::ADDRESS_MASK {
        return Err(unmapped(bus));
    }
    if let Some(pak) = wram_bus_to_pak(bus) {
        return Ok(pak);
    }
    let bank = bus >> 16;
    let offset = bus & 0xFFFF;
    match bank {
        0xC0..=0xFF => Ok(bus & AREA_MASK),
        0x40..=0x7D => Ok(UPPER_ROM_BASE + (bus & AREA_MASK)),
        0x80..=0xBF if offset >= 0x8000 => Ok(bus & AREA_MASK),
        0x00..=0x3F if offset >= 0x8000 => Ok(UPPER_ROM_BASE + (bus & AREA_MASK)),
        0xA0..=0xBF if is_sram_window(offset) => Ok(sram_bus_to_pak(bank, offset)),
        _ => Err(unmapped(bus)),
    }
}

pub fn pak_to_bus(pak: u32) -> MappingResult<u32> {
    if let Some(bus) = wram_pak_to_bus(pak) {
        return Ok(bus);
    }
    match pak {
        0..UPPER_ROM_BASE => Ok(0xC0_0000 | pak),
        UPPER_ROM_BASE..ROM_END => {
            let bank = 0x40 + ((pak - UPPER_ROM_BASE) >> 16);
            let offset = pak & 0xFFFF;
            if bank < 0x7E {
                Ok((bank << 16) | offset)
            } else if offset >= 0x8000 {
                Ok(((bank - 0x40) << 16) | offset)
            } else {
                Err(unmapped(pak))
            }
        }
        PAK_SRAM_BASE..SRAM_END => Ok(sram_pak_to_bus(pak)),
        _ => Err(unmapped(pak)),
    }
}
