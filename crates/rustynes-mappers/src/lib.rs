//! NES Cartridge Mapper Implementations.
//!
//! This crate provides mapper implementations for NES cartridge emulation.
//! Mappers handle memory banking for PRG-ROM, CHR-ROM/RAM, and provide
//! various hardware features like IRQ generation.
//!
//! # Supported Mappers
//!
//! | Mapper | Name | Description |
//! |--------|------|-------------|
//! | 0 | NROM | No banking, simplest mapper |
//! | 1 | MMC1 | Nintendo's first bank-switching mapper |
//! | 2 | UxROM | PRG-ROM banking only |
//! | 3 | CNROM | CHR-ROM banking only |
//! | 4 | MMC3/MMC6 | Fine-grained banking + scanline IRQ |
//! | 7 | AxROM | 32KB PRG banking, single-screen mirroring |
//! | 9 | MMC2 | Latch-driven CHR banking (Punch-Out!!) |
//! | 11 | Color Dreams | Combined PRG/CHR bank register |
//! | 21,23,25 | VRC2/VRC4 | Konami banking + cycle IRQ |
//! | 34 | BNROM | 32KB PRG banking, CHR-RAM |
//! | 66 | GxROM | Combined PRG/CHR bank register |
//! | 69 | FME-7 | Sunsoft banking + cycle IRQ |
//! | 71 | Camerica | 16KB PRG banking + mirroring control |
//!
//! Every mapper implements the shared [`Mapper`] trait; [`CartridgeMapper`]
//! is a tagged-variant enum wrapping every implementation so the rest of
//! the emulator can hold one concrete, non-allocating type instead of a
//! `Box<dyn Mapper>`.
//!
//! # Example
//!
//! ```no_run
//! use rustynes_mappers::{Rom, CartridgeMapper};
//!
//! let rom_data = std::fs::read("game.nes").expect("Failed to read ROM");
//! let rom = Rom::load(&rom_data).expect("Failed to parse ROM");
//! let mut mapper = CartridgeMapper::new(&(&rom).into()).expect("Unsupported mapper");
//!
//! let opcode = mapper.read_prg(0x8000);
//! let tile = mapper.read_chr(0x0000);
//! ```
//!
//! # no_std Support
//!
//! This crate supports `no_std` environments with the `alloc` feature.
//! Disable the default `std` feature for embedded use.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod mapper;
pub mod rom;

mod axrom;
mod bnrom;
mod camerica;
mod cnrom;
mod colordreams;
mod fme7;
mod gxrom;
mod mmc1;
mod mmc2;
mod mmc3;
mod mmc6;
mod nrom;
mod uxrom;
mod vrc2_4;

pub use axrom::Axrom;
pub use bnrom::Bnrom;
pub use camerica::Camerica;
pub use cnrom::Cnrom;
pub use colordreams::ColorDreams;
pub use fme7::Fme7;
pub use gxrom::Gxrom;
pub use mapper::{Mapper, Mirroring};
pub use mmc1::Mmc1;
pub use mmc2::Mmc2;
pub use mmc3::Mmc3;
pub use mmc6::Mmc6;
pub use nrom::Nrom;
pub use rom::{CartridgeImage, Region, Rom, RomError, RomFormat, RomHeader};
pub use uxrom::Uxrom;
pub use vrc2_4::{Variant as Vrc2_4Variant, Vrc2_4};

/// Every cartridge mapper the emulator core knows how to build, gathered
/// into one tagged-variant type.
///
/// [`CartridgeMapper::new`] is the single cartridge construction entry
/// point: it reads [`CartridgeImage`]'s `mapper`/`submapper` fields and
/// dispatches to the matching variant, or returns
/// `RomError::UnsupportedMapper`. Method calls are dispatched with a
/// `match` rather than a vtable, so the bus can hold this type inline
/// with no heap allocation and no dynamic dispatch overhead.
#[derive(Debug, Clone)]
pub enum CartridgeMapper {
    Nrom(Nrom),
    Mmc1(Mmc1),
    Uxrom(Uxrom),
    Cnrom(Cnrom),
    Mmc3(Mmc3),
    Mmc6(Mmc6),
    Axrom(Axrom),
    Mmc2(Mmc2),
    Gxrom(Gxrom),
    Bnrom(Bnrom),
    ColorDreams(ColorDreams),
    Camerica(Camerica),
    Fme7(Fme7),
    Vrc2_4(Vrc2_4),
}

impl CartridgeMapper {
    /// Build the mapper matching `cart.mapper` (and, where more than one
    /// mapper shares a number, `cart.submapper`).
    ///
    /// # Errors
    ///
    /// Returns `RomError::UnsupportedMapper` if the mapper number is not
    /// implemented in this crate.
    pub fn new(cart: &CartridgeImage) -> Result<Self, RomError> {
        Ok(match cart.mapper {
            0 => CartridgeMapper::Nrom(Nrom::new(cart)),
            1 => CartridgeMapper::Mmc1(Mmc1::new(cart)),
            2 => CartridgeMapper::Uxrom(Uxrom::new(cart)),
            3 => CartridgeMapper::Cnrom(Cnrom::new(cart)),
            4 if cart.submapper == 1 => CartridgeMapper::Mmc6(Mmc6::new(cart)),
            4 => CartridgeMapper::Mmc3(Mmc3::new(cart)),
            7 => CartridgeMapper::Axrom(Axrom::new(cart)),
            9 => CartridgeMapper::Mmc2(Mmc2::new(cart)),
            11 => CartridgeMapper::ColorDreams(ColorDreams::new(cart)),
            21 | 25 => CartridgeMapper::Vrc2_4(Vrc2_4::new(cart, Vrc2_4Variant::Vrc4)),
            22 | 23 => CartridgeMapper::Vrc2_4(Vrc2_4::new(cart, Vrc2_4Variant::Vrc2)),
            34 => CartridgeMapper::Bnrom(Bnrom::new(cart)),
            66 => CartridgeMapper::Gxrom(Gxrom::new(cart)),
            69 => CartridgeMapper::Fme7(Fme7::new(cart)),
            71 => CartridgeMapper::Camerica(Camerica::new(cart)),
            n => return Err(RomError::UnsupportedMapper(n)),
        })
    }

    /// Call `observe_chr_read` on mappers that need to see every CHR
    /// fetch (currently only MMC2's $FD/$FE latch); a no-op elsewhere.
    pub fn observe_chr_read(&mut self, addr: u16) {
        if let CartridgeMapper::Mmc2(m) = self {
            m.observe_chr_read(addr);
        }
    }
}

macro_rules! dispatch {
    ($self:expr, $method:ident $(, $arg:expr)*) => {
        match $self {
            CartridgeMapper::Nrom(m) => m.$method($($arg),*),
            CartridgeMapper::Mmc1(m) => m.$method($($arg),*),
            CartridgeMapper::Uxrom(m) => m.$method($($arg),*),
            CartridgeMapper::Cnrom(m) => m.$method($($arg),*),
            CartridgeMapper::Mmc3(m) => m.$method($($arg),*),
            CartridgeMapper::Mmc6(m) => m.$method($($arg),*),
            CartridgeMapper::Axrom(m) => m.$method($($arg),*),
            CartridgeMapper::Mmc2(m) => m.$method($($arg),*),
            CartridgeMapper::Gxrom(m) => m.$method($($arg),*),
            CartridgeMapper::Bnrom(m) => m.$method($($arg),*),
            CartridgeMapper::ColorDreams(m) => m.$method($($arg),*),
            CartridgeMapper::Camerica(m) => m.$method($($arg),*),
            CartridgeMapper::Fme7(m) => m.$method($($arg),*),
            CartridgeMapper::Vrc2_4(m) => m.$method($($arg),*),
        }
    };
}

impl Mapper for CartridgeMapper {
    fn read_prg(&self, addr: u16) -> u8 {
        dispatch!(self, read_prg, addr)
    }

    fn write_prg(&mut self, addr: u16, val: u8) {
        dispatch!(self, write_prg, addr, val)
    }

    fn read_chr(&self, addr: u16) -> u8 {
        dispatch!(self, read_chr, addr)
    }

    fn write_chr(&mut self, addr: u16, val: u8) {
        dispatch!(self, write_chr, addr, val)
    }

    fn mirroring(&self) -> Mirroring {
        dispatch!(self, mirroring)
    }

    fn irq_pending(&self) -> bool {
        dispatch!(self, irq_pending)
    }

    fn irq_acknowledge(&mut self) {
        dispatch!(self, irq_acknowledge);
    }

    fn clock(&mut self, cycles: u8) {
        dispatch!(self, clock, cycles);
    }

    fn scanline(&mut self) {
        dispatch!(self, scanline);
    }

    fn ppu_a12_rising(&mut self) {
        dispatch!(self, ppu_a12_rising);
    }

    fn notify_a12_rise(&mut self, pre_render: bool) {
        dispatch!(self, notify_a12_rise, pre_render);
    }

    fn mapper_number(&self) -> u16 {
        dispatch!(self, mapper_number)
    }

    fn mapper_name(&self) -> &'static str {
        dispatch!(self, mapper_name)
    }

    fn has_battery(&self) -> bool {
        dispatch!(self, has_battery)
    }

    fn battery_ram(&self) -> Option<&[u8]> {
        dispatch!(self, battery_ram)
    }

    fn set_battery_ram(&mut self, data: &[u8]) {
        dispatch!(self, set_battery_ram, data);
    }

    fn reset(&mut self) {
        dispatch!(self, reset);
    }
}

/// Build the `CartridgeMapper` matching a loaded ROM's header fields.
///
/// Convenience wrapper around [`CartridgeMapper::new`] for callers that
/// have a parsed [`Rom`] rather than a [`CartridgeImage`] already.
///
/// # Errors
///
/// Returns `RomError::UnsupportedMapper` if the mapper number is not
/// implemented in this crate.
pub fn create_mapper(rom: &Rom) -> Result<CartridgeMapper, RomError> {
    CartridgeMapper::new(&rom.into())
}

/// Get a list of supported mapper numbers.
#[must_use]
pub fn supported_mappers() -> &'static [u16] {
    &[0, 1, 2, 3, 4, 7, 9, 11, 21, 22, 23, 25, 34, 66, 69, 71]
}

/// Check if a mapper number is supported.
#[must_use]
pub fn is_mapper_supported(mapper: u16) -> bool {
    supported_mappers().contains(&mapper)
}

/// Get the name of a mapper by number.
#[must_use]
pub fn mapper_name(mapper: u16) -> Option<&'static str> {
    match mapper {
        0 => Some("NROM"),
        1 => Some("MMC1"),
        2 => Some("UxROM"),
        3 => Some("CNROM"),
        4 => Some("MMC3"),
        7 => Some("AxROM"),
        9 => Some("MMC2"),
        11 => Some("Color Dreams"),
        21 | 25 => Some("VRC4"),
        22 | 23 => Some("VRC2"),
        34 => Some("BNROM"),
        66 => Some("GxROM"),
        69 => Some("FME-7"),
        71 => Some("Camerica"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rom::Region;

    fn create_test_cart(mapper: u16) -> CartridgeImage {
        CartridgeImage {
            prg: vec![0u8; 16 * 16384],
            chr: (0..8192).map(|i| (i & 0xFF) as u8).collect(),
            mapper,
            submapper: 0,
            mirroring: Mirroring::Vertical,
            has_battery: false,
            prg_ram_size: 8192,
            prg_nvram_size: 0,
            chr_ram_size: 0,
            chr_nvram_size: 0,
            region: Region::Ntsc,
        }
    }

    #[test]
    fn builds_nrom() {
        let mapper = CartridgeMapper::new(&create_test_cart(0)).unwrap();
        assert_eq!(mapper.mapper_number(), 0);
        assert_eq!(mapper.mapper_name(), "NROM");
    }

    #[test]
    fn builds_mmc3_and_mmc6_by_submapper() {
        let mmc3_cart = create_test_cart(4);
        let mapper = CartridgeMapper::new(&mmc3_cart).unwrap();
        assert_eq!(mapper.mapper_name(), "MMC3");

        let mut mmc6_cart = mmc3_cart;
        mmc6_cart.submapper = 1;
        let mapper = CartridgeMapper::new(&mmc6_cart).unwrap();
        assert_eq!(mapper.mapper_name(), "MMC6");
    }

    #[test]
    fn builds_every_supported_mapper_number() {
        for &n in supported_mappers() {
            let cart = create_test_cart(n);
            assert!(CartridgeMapper::new(&cart).is_ok(), "mapper {n} failed to build");
        }
    }

    #[test]
    fn rejects_unknown_mapper() {
        let result = CartridgeMapper::new(&create_test_cart(255));
        assert!(matches!(result, Err(RomError::UnsupportedMapper(255))));
    }

    #[test]
    fn mapper_trait_read_write() {
        let mut mapper = CartridgeMapper::new(&create_test_cart(0)).unwrap();
        let val = mapper.read_prg(0x8000);
        assert_eq!(val, 0);
        mapper.write_prg(0x8000, 0xFF);
        assert_eq!(mapper.read_prg(0x8000), 0);
    }
}
