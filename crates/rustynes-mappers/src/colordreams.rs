//! Color Dreams Mapper (Mapper 11).
//!
//! Used by Color Dreams' unlicensed catalog (Crystal Mines, Metal Fighter,
//! Baby Boomer, and others). Simpler than GxROM: a single write-anywhere
//! register in $8000-$FFFF selects both the 32KB PRG bank and the 8KB CHR
//! bank, with no mirroring control (fixed by the board/header) and no
//! PRG-RAM.
//!
//! Bank selection: write to $8000-$FFFF
//! - Bits 0-1: 32KB PRG bank
//! - Bits 4-7: 8KB CHR bank

use crate::mapper::{Mapper, Mirroring};
use crate::rom::CartridgeImage;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Color Dreams mapper implementation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ColorDreams {
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    chr_is_ram: bool,
    prg_banks: usize,
    chr_banks: usize,
    prg_bank: u8,
    chr_bank: u8,
    mirroring: Mirroring,
}

impl ColorDreams {
    #[must_use]
    pub fn new(cart: &CartridgeImage) -> Self {
        let prg_banks = cart.prg.len() / 32768;
        let chr_is_ram = cart.chr.is_empty();
        let chr = if chr_is_ram { vec![0u8; 8192] } else { cart.chr.clone() };
        let chr_banks = if chr_is_ram { 1 } else { chr.len() / 8192 };

        Self {
            prg_rom: cart.prg.clone(),
            chr,
            chr_is_ram,
            prg_banks: prg_banks.max(1),
            chr_banks: chr_banks.max(1),
            prg_bank: 0,
            chr_bank: 0,
            mirroring: cart.mirroring,
        }
    }
}

impl Mapper for ColorDreams {
    fn read_prg(&self, addr: u16) -> u8 {
        match addr {
            0x8000..=0xFFFF => {
                let bank = (self.prg_bank as usize) % self.prg_banks;
                let offset = (addr - 0x8000) as usize;
                self.prg_rom.get(bank * 32768 + offset).copied().unwrap_or(0)
            }
            _ => 0,
        }
    }

    fn write_prg(&mut self, addr: u16, val: u8) {
        if (0x8000..=0xFFFF).contains(&addr) {
            self.prg_bank = val & 0x03;
            self.chr_bank = (val >> 4) & 0x0F;
        }
    }

    fn read_chr(&self, addr: u16) -> u8 {
        let bank = (self.chr_bank as usize) % self.chr_banks;
        let offset = (addr & 0x1FFF) as usize;
        self.chr.get(bank * 8192 + offset).copied().unwrap_or(0)
    }

    fn write_chr(&mut self, addr: u16, val: u8) {
        if self.chr_is_ram {
            let offset = (addr & 0x1FFF) as usize;
            if let Some(byte) = self.chr.get_mut(offset) {
                *byte = val;
            }
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn mapper_number(&self) -> u16 {
        11
    }

    fn mapper_name(&self) -> &'static str {
        "Color Dreams"
    }

    fn reset(&mut self) {
        self.prg_bank = 0;
        self.chr_bank = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rom::Region;

    fn create_test_rom(prg_banks: u8, chr_banks: u8) -> CartridgeImage {
        let mut prg = vec![0u8; prg_banks as usize * 32768];
        for bank in 0..prg_banks as usize {
            for i in 0..32768 {
                prg[bank * 32768 + i] = bank as u8;
            }
        }
        let mut chr = vec![0u8; chr_banks as usize * 8192];
        for bank in 0..chr_banks as usize {
            for i in 0..8192 {
                chr[bank * 8192 + i] = (bank + 0x80) as u8;
            }
        }
        CartridgeImage {
            prg,
            chr,
            mapper: 11,
            submapper: 0,
            mirroring: Mirroring::Horizontal,
            has_battery: false,
            prg_ram_size: 0,
            prg_nvram_size: 0,
            chr_ram_size: 0,
            chr_nvram_size: 0,
            region: Region::Ntsc,
        }
    }

    #[test]
    fn combined_bank_select() {
        let mut mapper = ColorDreams::new(&create_test_rom(4, 16));
        mapper.write_prg(0x8000, 0x32); // PRG bank 2, CHR bank 3
        assert_eq!(mapper.read_prg(0x8000), 2);
        assert_eq!(mapper.read_chr(0x0000), 0x83);
    }

    #[test]
    fn no_prg_ram_window() {
        let mapper = ColorDreams::new(&create_test_rom(2, 2));
        assert_eq!(mapper.read_prg(0x6000), 0);
    }
}
