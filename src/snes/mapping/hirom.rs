//! HiROM: ROM is linear across whole 64KiB banks, visible in `$C0-$FF` and
//! `$40-$7D` and through the upper halves of the system banks. SRAM sits in
//! an 8KiB window at `$20-$3F/$A0-$BF:$6000-$7FFF`.
use crate::snes::address::MemoryMapping;

use super::{
    MappingError, MappingResult,
    shared::{PAK_SRAM_BASE, is_system_bank, wram_bus_to_pak, wram_pak_to_bus},
};

const ROM_MASK: u32 = 0x3F_FFFF;
const ROM_END: u32 = 0x40_0000;
pub(super) const SRAM_BANK_SIZE: u32 = 0x2000;
pub(super) const SRAM_WINDOW_START: u32 = 0x6000;
pub(super) const SRAM_END: u32 = PAK_SRAM_BASE + 0x20 * SRAM_BANK_SIZE;

fn unmapped(address: u32) -> MappingError {
    MappingError::Unmapped {
        address,
        mapping: MemoryMapping::HiRom,
    }
}

#[inline(always)]
pub(super) fn is_sram_window(offset: u32) -> bool {
    (SRAM_WINDOW_START..SRAM_WINDOW_START + SRAM_BANK_SIZE).contains(&offset)
}

/// Folds an 8KiB SRAM window into pak space. Callers check the bank range.
#[inline(always)]
pub(super) fn sram_bus_to_pak(bank: u32, offset: u32) -> u32 {
    PAK_SRAM_BASE + ((bank & 0x1F) * SRAM_BANK_SIZE) + (offset - SRAM_WINDOW_START)
}

pub(super) fn sram_pak_to_bus(pak: u32) -> u32 {
    let offset = pak - PAK_SRAM_BASE;
    let bank = 0xA0 + offset / SRAM_BANK_SIZE;
    (bank << 16) | (SRAM_WINDOW_START + (offset & (SRAM_BANK_SIZE - 1)))
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
        0x40..=0x7D | 0xC0..=0xFF => Ok(bus & ROM_MASK),
        _ if is_system_bank(bank) && offset >= 0x8000 => Ok(bus & ROM_MASK),
        0x20..=0x3F | 0xA0..=0xBF if is_sram_window(offset) => Ok(sram_bus_to_pak(bank, offset)),
        _ => Err(unmapped(bus)),
    }
}

pub fn pak_to_bus(pak: u32) -> MappingResult<u32> {
    if let Some(bus) = wram_pak_to_bus(pak) {
        return Ok(bus);
    }
    match pak {
        0..ROM_END => Ok(0xC0_0000 | pak),
        PAK_SRAM_BASE..SRAM_END => Ok(sram_pak_to_bus(pak)),
        _ => Err(unmapped(pak)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wram_and_its_mirror_translate_back_to_bank_7e() {
        assert_eq!(pak_to_bus(0xF5_0000).unwrap(), 0x7E_0000);
        assert_eq!(
            pak_to_bus(0xF7_0000).unwrap(),
            0x7E_0000,
            "pak $F70000 mirrors the start of WRAM"
        );
    }

    #[test]
    fn rom_is_linear_across_banks() {
        assert_eq!(bus_to_pak(0xC0_0000).unwrap(), 0x00_0000);
        assert_eq!(bus_to_pak(0x40_FFC0).unwrap(), 0x00_FFC0);
        assert_eq!(bus_to_pak(0x00_FFC0).unwrap(), 0x00_FFC0, "system bank upper half");
        assert_eq!(bus_to_pak(0xBF_8000).unwrap(), 0x3F_8000);
        assert_eq!(bus_to_pak(0xFF_FFFF).unwrap(), 0x3F_FFFF);
        assert_eq!(pak_to_bus(0x00_FFB0).unwrap(), 0xC0_FFB0);
    }

    #[test]
    fn rom_window_round_trips() {
        for pak in (0..ROM_END).step_by(0x1F3).chain([ROM_END - 1]) {
            let bus = pak_to_bus(pak).unwrap();
            assert_eq!(bus_to_pak(bus).unwrap(), pak, "pak ${pak:06X} via ${bus:06X}");
        }
    }

    #[test]
    fn sram_window_uses_8k_banks() {
        assert_eq!(bus_to_pak(0x20_6000).unwrap(), 0xE0_0000);
        assert_eq!(bus_to_pak(0xA0_6000).unwrap(), 0xE0_0000, "$A0 mirrors $20");
        assert_eq!(bus_to_pak(0x21_6000).unwrap(), 0xE0_2000);
        assert_eq!(bus_to_pak(0xBF_7FFF).unwrap(), 0xE3_FFFF);
        assert_eq!(pak_to_bus(0xE0_1FFF).unwrap(), 0xA0_7FFF);
        assert_eq!(pak_to_bus(0xE0_2000).unwrap(), 0xA1_6000);
        assert_eq!(pak_to_bus(SRAM_END), Err(unmapped(SRAM_END)));
    }

    #[test]
    fn sram_window_outside_sram_banks_is_unmapped() {
        assert_eq!(bus_to_pak(0x10_6000), Err(unmapped(0x10_6000)));
        assert_eq!(bus_to_pak(0x20_5FFF), Err(unmapped(0x20_5FFF)));
    }
}
