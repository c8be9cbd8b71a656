//! MMC6 Mapper (Mapper 4, submapper 1).
//!
//! MMC6 is Nintendo's variant of the MMC3 ASIC used on a handful of
//! boards (notably Startropics and Startropics II). It shares MMC3's
//! bank-select/IRQ-counter logic exactly, but replaces the external 8KB
//! PRG-RAM chip with a 1KB RAM block *inside* the mapper IC, mirrored
//! across $7000-$7FFF, split into two 512-byte halves that are enabled
//! and write-protected independently via $A001:
//!
//! - Bit 5: lower half ($7000-$71FF) write-protect
//! - Bit 4: lower half read/write enable
//! - Bit 7: upper half ($7100-$71FF... in practice mirrored) write-protect
//! - Bit 6: upper half read/write enable
//!
//! $6000-$6FFF and $7000-$7FFF outside the enabled halves read open bus.

use crate::mapper::{Mapper, Mirroring};
use crate::rom::CartridgeImage;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// MMC6 mapper implementation (MMC3 core + on-chip 1KB split WRAM).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Mmc6 {
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    chr_is_ram: bool,
    prg_banks: usize,
    chr_banks: usize,

    bank_select: u8,
    prg_mode: bool,
    chr_inversion: bool,

    chr_bank_2k_0: u8,
    chr_bank_2k_1: u8,
    chr_bank_1k_0: u8,
    chr_bank_1k_1: u8,
    chr_bank_1k_2: u8,
    chr_bank_1k_3: u8,
    prg_bank_0: u8,
    prg_bank_1: u8,

    mirroring: Mirroring,

    /// On-chip 1KB WRAM, split into two 512-byte halves.
    wram: [u8; 1024],
    wram_lower_enabled: bool,
    wram_lower_protect: bool,
    wram_upper_enabled: bool,
    wram_upper_protect: bool,

    irq_latch: u8,
    irq_counter: u8,
    irq_reload: bool,
    irq_enabled: bool,
    irq_pending: bool,

    has_battery: bool,
}

impl Mmc6 {
    #[must_use]
    pub fn new(cart: &CartridgeImage) -> Self {
        let prg_banks = cart.prg.len() / 8192;
        let chr_is_ram = cart.chr.is_empty();
        let chr = if chr_is_ram { vec![0u8; 8192] } else { cart.chr.clone() };
        let chr_banks = (chr.len() / 1024).max(1);

        Self {
            prg_rom: cart.prg.clone(),
            chr,
            chr_is_ram,
            prg_banks,
            chr_banks,
            bank_select: 0,
            prg_mode: false,
            chr_inversion: false,
            chr_bank_2k_0: 0,
            chr_bank_2k_1: 2,
            chr_bank_1k_0: 4,
            chr_bank_1k_1: 5,
            chr_bank_1k_2: 6,
            chr_bank_1k_3: 7,
            prg_bank_0: 0,
            prg_bank_1: 1,
            mirroring: cart.mirroring,
            wram: [0u8; 1024],
            wram_lower_enabled: false,
            wram_lower_protect: false,
            wram_upper_enabled: false,
            wram_upper_protect: false,
            irq_latch: 0,
            irq_counter: 0,
            irq_reload: false,
            irq_enabled: false,
            irq_pending: false,
            has_battery: cart.has_battery,
        }
    }

    fn prg_addr(&self, addr: u16) -> usize {
        let bank = match addr {
            0x8000..=0x9FFF => {
                if self.prg_mode {
                    self.prg_banks.saturating_sub(2)
                } else {
                    self.prg_bank_0 as usize
                }
            }
            0xA000..=0xBFFF => self.prg_bank_1 as usize,
            0xC000..=0xDFFF => {
                if self.prg_mode {
                    self.prg_bank_0 as usize
                } else {
                    self.prg_banks.saturating_sub(2)
                }
            }
            0xE000..=0xFFFF => self.prg_banks.saturating_sub(1),
            _ => 0,
        };
        let bank = bank % self.prg_banks.max(1);
        let offset = (addr & 0x1FFF) as usize;
        bank * 8192 + offset
    }

    fn chr_addr(&self, addr: u16) -> usize {
        let addr = addr & 0x1FFF;
        let bank = if self.chr_inversion {
            match addr {
                0x0000..=0x03FF => self.chr_bank_1k_0,
                0x0400..=0x07FF => self.chr_bank_1k_1,
                0x0800..=0x0BFF => self.chr_bank_1k_2,
                0x0C00..=0x0FFF => self.chr_bank_1k_3,
                0x1000..=0x17FF => self.chr_bank_2k_0 & 0xFE,
                0x1800..=0x1FFF => self.chr_bank_2k_1 & 0xFE,
                _ => 0,
            }
        } else {
            match addr {
                0x0000..=0x07FF => self.chr_bank_2k_0 & 0xFE,
                0x0800..=0x0FFF => self.chr_bank_2k_1 & 0xFE,
                0x1000..=0x13FF => self.chr_bank_1k_0,
                0x1400..=0x17FF => self.chr_bank_1k_1,
                0x1800..=0x1BFF => self.chr_bank_1k_2,
                0x1C00..=0x1FFF => self.chr_bank_1k_3,
                _ => 0,
            }
        };

        let (bank_size, offset_mask) = if self.chr_inversion {
            match addr {
                0x0000..=0x0FFF => (1024, 0x03FF),
                _ => (2048, 0x07FF),
            }
        } else {
            match addr {
                0x0000..=0x0FFF => (2048, 0x07FF),
                _ => (1024, 0x03FF),
            }
        };

        let bank = (bank as usize) % self.chr_banks;
        let offset = (addr & offset_mask) as usize;

        if bank_size == 2048 {
            (bank / 2 * 2) * 1024 + offset
        } else {
            bank * 1024 + offset
        }
    }

    /// Map a PRG-RAM CPU address to a (half-is-upper, offset) pair within
    /// the 1KB on-chip WRAM. The 4KB $6000-$6FFF window is entirely
    /// unmapped on MMC6; only $7000-$7FFF carries the 1KB RAM, mirrored
    /// four times.
    fn wram_half(&self, addr: u16) -> Option<(bool, usize)> {
        if !(0x7000..=0x7FFF).contains(&addr) {
            return None;
        }
        let offset = (addr - 0x7000) as usize % 1024;
        Some((offset >= 512, offset))
    }

    fn clock_irq(&mut self, suppress_assert: bool) {
        if self.irq_reload || self.irq_counter == 0 {
            self.irq_counter = self.irq_latch;
            self.irq_reload = false;
        } else {
            self.irq_counter -= 1;
            if self.irq_counter == 0 && self.irq_enabled && !suppress_assert {
                self.irq_pending = true;
            }
        }
    }
}

impl Mapper for Mmc6 {
    fn read_prg(&self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => match self.wram_half(addr) {
                Some((false, off)) if self.wram_lower_enabled => self.wram[off],
                Some((true, off)) if self.wram_upper_enabled => self.wram[off],
                _ => 0,
            },
            0x8000..=0xFFFF => {
                let offset = self.prg_addr(addr);
                self.prg_rom.get(offset).copied().unwrap_or(0)
            }
            _ => 0,
        }
    }

    fn write_prg(&mut self, addr: u16, val: u8) {
        match addr {
            0x6000..=0x7FFF => {
                if let Some((upper, off)) = self.wram_half(addr) {
                    if upper {
                        if self.wram_upper_enabled && !self.wram_upper_protect {
                            self.wram[off] = val;
                        }
                    } else if self.wram_lower_enabled && !self.wram_lower_protect {
                        self.wram[off] = val;
                    }
                }
            }
            0x8000..=0x9FFF => {
                if addr & 1 == 0 {
                    self.bank_select = val & 0x07;
                    self.prg_mode = val & 0x40 != 0;
                    self.chr_inversion = val & 0x80 != 0;
                } else {
                    match self.bank_select {
                        0 => self.chr_bank_2k_0 = val,
                        1 => self.chr_bank_2k_1 = val,
                        2 => self.chr_bank_1k_0 = val,
                        3 => self.chr_bank_1k_1 = val,
                        4 => self.chr_bank_1k_2 = val,
                        5 => self.chr_bank_1k_3 = val,
                        6 => self.prg_bank_0 = val & 0x3F,
                        7 => self.prg_bank_1 = val & 0x3F,
                        _ => {}
                    }
                }
            }
            0xA000..=0xBFFF => {
                if addr & 1 == 0 {
                    self.mirroring = if val & 1 != 0 { Mirroring::Horizontal } else { Mirroring::Vertical };
                } else {
                    self.wram_lower_protect = val & 0x20 != 0;
                    self.wram_lower_enabled = val & 0x10 != 0;
                    self.wram_upper_protect = val & 0x80 != 0;
                    self.wram_upper_enabled = val & 0x40 != 0;
                }
            }
            0xC000..=0xDFFF => {
                if addr & 1 == 0 {
                    self.irq_latch = val;
                } else {
                    self.irq_counter = 0;
                    self.irq_reload = true;
                }
            }
            0xE000..=0xFFFF => {
                if addr & 1 == 0 {
                    self.irq_enabled = false;
                    self.irq_pending = false;
                } else {
                    self.irq_enabled = true;
                }
            }
            _ => {}
        }
    }

    fn read_chr(&self, addr: u16) -> u8 {
        let offset = self.chr_addr(addr);
        self.chr.get(offset).copied().unwrap_or(0)
    }

    fn write_chr(&mut self, addr: u16, val: u8) {
        if self.chr_is_ram {
            let offset = self.chr_addr(addr);
            if let Some(byte) = self.chr.get_mut(offset) {
                *byte = val;
            }
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn irq_pending(&self) -> bool {
        self.irq_pending
    }

    fn irq_acknowledge(&mut self) {
        self.irq_pending = false;
    }

    fn scanline(&mut self) {
        self.clock_irq(false);
    }

    fn ppu_a12_rising(&mut self) {
        self.notify_a12_rise(false);
    }

    fn notify_a12_rise(&mut self, pre_render: bool) {
        // `probe_a12` only calls this on a genuine 0->1 transition, at most
        // once per visible scanline. Clock on every edge.
        self.clock_irq(pre_render);
    }

    fn mapper_number(&self) -> u16 {
        4
    }

    fn mapper_name(&self) -> &'static str {
        "MMC6"
    }

    fn has_battery(&self) -> bool {
        self.has_battery
    }

    fn battery_ram(&self) -> Option<&[u8]> {
        if self.has_battery {
            Some(&self.wram)
        } else {
            None
        }
    }

    fn set_battery_ram(&mut self, data: &[u8]) {
        let len = data.len().min(self.wram.len());
        self.wram[..len].copy_from_slice(&data[..len]);
    }

    fn reset(&mut self) {
        self.bank_select = 0;
        self.prg_mode = false;
        self.chr_inversion = false;
        self.chr_bank_2k_0 = 0;
        self.chr_bank_2k_1 = 2;
        self.chr_bank_1k_0 = 4;
        self.chr_bank_1k_1 = 5;
        self.chr_bank_1k_2 = 6;
        self.chr_bank_1k_3 = 7;
        self.prg_bank_0 = 0;
        self.prg_bank_1 = 1;
        self.irq_latch = 0;
        self.irq_counter = 0;
        self.irq_reload = false;
        self.irq_enabled = false;
        self.irq_pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rom::Region;

    fn create_test_cart(prg_banks: u8, chr_banks: u8) -> CartridgeImage {
        let prg_size = prg_banks as usize * 8192;
        let chr_size = chr_banks as usize * 1024;
        let mut prg = vec![0u8; prg_size];
        for bank in 0..prg_banks as usize {
            for i in 0..8192 {
                prg[bank * 8192 + i] = bank as u8;
            }
        }
        let chr = vec![0u8; chr_size];
        CartridgeImage {
            prg,
            chr,
            mapper: 4,
            submapper: 1,
            mirroring: Mirroring::Vertical,
            has_battery: true,
            prg_ram_size: 0,
            prg_nvram_size: 1024,
            chr_ram_size: 0,
            chr_nvram_size: 0,
            region: Region::Ntsc,
        }
    }

    #[test]
    fn wram_halves_gate_independently() {
        let mut mapper = Mmc6::new(&create_test_cart(8, 8));
        mapper.write_prg(0xA001, 0x10); // lower enabled, not protected
        mapper.write_prg(0x7000, 0x42);
        assert_eq!(mapper.read_prg(0x7000), 0x42);
        // Upper half not enabled: writes are dropped, reads are 0.
        mapper.write_prg(0x7200, 0x55);
        assert_eq!(mapper.read_prg(0x7200), 0);
    }

    #[test]
    fn wram_protect_blocks_writes_but_not_reads() {
        let mut mapper = Mmc6::new(&create_test_cart(8, 8));
        mapper.write_prg(0xA001, 0x10);
        mapper.write_prg(0x7000, 0x42);
        mapper.write_prg(0xA001, 0x30); // enabled + protected
        mapper.write_prg(0x7000, 0xFF);
        assert_eq!(mapper.read_prg(0x7000), 0x42);
    }

    #[test]
    fn irq_counter_matches_mmc3_semantics() {
        let mut mapper = Mmc6::new(&create_test_cart(8, 8));
        mapper.write_prg(0xC000, 2);
        mapper.write_prg(0xC001, 0);
        mapper.write_prg(0xE001, 0);
        mapper.scanline();
        assert!(!mapper.irq_pending());
        mapper.scanline();
        assert!(!mapper.irq_pending());
        mapper.scanline();
        assert!(mapper.irq_pending());
    }
}
