//! LoROM: bit 15 of the bank offset selects ROM. The upper half of each bus
//! bank holds 32KiB of ROM, banks `$70-$7D`/`$F0-$FF` carry SRAM in their low
//! half, and `$7E-$7F` are WRAM.
use crate::snes::address::MemoryMapping;

use super::{
    MappingError, MappingResult,
    shared::{PAK_SRAM_BASE, bank_to_linear, linear_to_bank, wram_bus_to_pak, wram_pak_to_bus},
};

const ROM_END: u32 = 0x40_0000;
const SRAM_BANK_SIZE: u32 = 0x8000;
const SRAM_END: u32 = PAK_SRAM_BASE + 0x10 * SRAM_BANK_SIZE;

fn unmapped(address: u32) -> MappingError {
    MappingError::Unmapped {
        address,
        mapping: MemoryMapping::LoRom,
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
    if offset & 0x8000 != 0 {
        // $80-$FF mirror $00-$7F
        return Ok(bank_to_linear(bus & 0x7F_FFFF));
    }
    match bank {
        0x70..=0x7D | 0xF0..=0xFF => Ok(PAK_SRAM_BASE + (((bank & 0x0F) << 15) | offset)),
        _ => Err(unmapped(bus)),
    }
}

pub fn pak_to_bus(pak: u32) -> MappingResult<u32> {
    if let Some(bus) = wram_pak_to_bus(pak) {
        return Ok(bus);
    }
    match pak {
        0..ROM_END => Ok(0x80_0000 | linear_to_bank(pak) | 0x8000),
        PAK_SRAM_BASE..SRAM_END => {
            let offset = pak - PAK_SRAM_BASE;
            Ok(0xF0_0000 | ((offset / SRAM_BANK_SIZE) << 16) | (offset & (SRAM_BANK_SIZE - 1)))
        }
        _ => Err(unmapped(pak)),
    }
}
