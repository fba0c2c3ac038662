//! Regions common to every cartridge mapping: the WRAM window, its low-RAM
//! mirror in the system banks, and the bank folding helpers.

pub const ADDRESS_MASK: u32 = 0xFF_FFFF;

pub const PAK_SRAM_BASE: u32 = 0xE0_0000;
pub const PAK_WRAM_BASE: u32 = 0xF5_0000;
pub const PAK_WRAM_END: u32 = 0xF7_0000;
pub const WRAM_SIZE: u32 = 0x2_0000;

const BUS_WRAM_BASE: u32 = 0x7E_0000;
const LOW_RAM_SIZE: u32 = 0x2000;

/// Packs the upper 32KiB of every 64KiB bank into a contiguous image.
#[inline(always)]
pub const fn bank_to_linear(address: u32) -> u32 {
    ((address & 0xFF_0000) >> 1) | (address & 0x7FFF)
}

/// Inverse of [`bank_to_linear`] without the `$8000` offset selector.
#[inline(always)]
pub const fn linear_to_bank(linear: u32) -> u32 {
    ((linear & 0x7F_8000) << 1) | (linear & 0x7FFF)
}

#[inline(always)]
pub(super) const fn is_system_bank(bank: u32) -> bool {
    matches!(bank, 0x00..=0x3F | 0x80..=0xBF)
}

pub(super) fn wram_bus_to_pak(bus: u32) -> Option<u32> {
    let bank = bus >> 16;
    let offset = bus & 0xFFFF;
    match bank {
        0x7E | 0x7F => Some(bus - BUS_WRAM_BASE + PAK_WRAM_BASE),
        _ if is_system_bank(bank) && offset < LOW_RAM_SIZE => Some(PAK_WRAM_BASE + offset),
        _ => None,
    }
}

/// WRAM and every pak bank above it. The upper banks expose internal state
/// with no bus equivalent, so they fold back onto the WRAM window.
pub(super) fn wram_pak_to_bus(pak: u32) -> Option<u32> {
    if (PAK_WRAM_BASE..=ADDRESS_MASK).contains(&pak) {
        Some(BUS_WRAM_BASE + ((pak - PAK_WRAM_BASE) & (WRAM_SIZE - 1)))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_folding_is_reversible() {
        for linear in [0x00_0000, 0x00_7FFF, 0x00_8000, 0x1F_FFC0, 0x3F_FFFF] {
            assert_eq!(
                bank_to_linear(linear_to_bank(linear) | 0x8000),
                linear,
                "linear ${linear:06X} survives unfold and refold"
            );
        }
    }

    #[test]
    fn bank_to_linear_drops_bit_15() {
        assert_eq!(bank_to_linear(0x01_8000), 0x00_8000);
        assert_eq!(bank_to_linear(0x01_0000), 0x00_8000, "low half aliases the high half");
    }
}
