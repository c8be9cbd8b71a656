//! Cartridge description consumed by mapper construction.
//!
//! [`Rom`] is a pre-normalized cartridge image: PRG/CHR payload plus every
//! header flag already resolved to a concrete value. Turning a raw iNES or
//! NES 2.0 byte stream into one is a host/frontend concern, not a core one.
//! `RomHeader::parse`/`Rom::load` below are kept only as a convenience for
//! building fixtures from real `.nes` files in host code; no mapper and no
//! `Console` path call them.

use crate::Mirroring;

/// Console timing region. Selects the APU's NTSC/PAL noise and DMC period
/// tables and the frame sequencer's edge cycle numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    #[default]
    Ntsc,
    Pal,
}

/// Which on-disk container a [`Rom`] was (conceptually) described by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RomFormat {
    #[default]
    INes,
    Nes2,
}

/// Errors that can occur when turning a cartridge description into a mapper,
/// or (for hosts that use the convenience parser) when decoding an iNES
/// header.
#[derive(Debug, thiserror::Error)]
pub enum RomError {
    /// ROM file is too small to contain a valid header.
    #[error("ROM file too small: expected at least 16 bytes, got {0}")]
    FileTooSmall(usize),

    /// Invalid iNES magic number in header.
    #[error("Invalid iNES magic number: expected [4E 45 53 1A], got {0:02X?}")]
    InvalidMagic([u8; 4]),

    /// Invalid PRG-ROM size.
    #[error("Invalid PRG-ROM size: {0}")]
    InvalidPrgSize(String),

    /// Invalid CHR-ROM size.
    #[error("Invalid CHR-ROM size: {0}")]
    InvalidChrSize(String),

    /// ROM file size doesn't match header specifications.
    #[error("ROM file size mismatch: expected {expected} bytes, got {actual} bytes")]
    SizeMismatch {
        /// Expected file size in bytes.
        expected: usize,
        /// Actual file size in bytes.
        actual: usize,
    },

    /// No mapper implementation is registered for this mapper number.
    #[error("Unsupported mapper number: {0}")]
    UnsupportedMapper(u16),
}

/// A fully decoded cartridge header: every iNES/NES 2.0 flag already
/// resolved to a concrete value, ready to hand to a mapper constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomHeader {
    /// Which container this was described by (informational only).
    pub format: RomFormat,

    /// Mapper number (0-4095 for NES 2.0, 0-255 for iNES 1.0).
    pub mapper: u16,

    /// Submapper number (0-15, NES 2.0 only).
    pub submapper: u8,

    /// PRG-ROM size in 16KB units.
    pub prg_rom_size: u16,

    /// CHR-ROM size in 8KB units (0 indicates CHR-RAM).
    pub chr_rom_size: u16,

    /// Nametable mirroring mode.
    pub mirroring: Mirroring,

    /// Battery-backed PRG-RAM present.
    pub has_battery: bool,

    /// 512-byte trainer present before PRG-ROM.
    pub has_trainer: bool,

    /// PRG-RAM size in bytes.
    pub prg_ram_size: usize,

    /// PRG-NVRAM size in bytes (NES 2.0 only).
    pub prg_nvram_size: usize,

    /// CHR-RAM size in bytes (when `chr_rom_size` is 0).
    pub chr_ram_size: usize,

    /// CHR-NVRAM size in bytes (NES 2.0 only).
    pub chr_nvram_size: usize,

    /// TV system / timing region flag as carried by the iNES byte 9/10.
    pub tv_system: u8,

    /// Console timing region.
    pub region: Region,
}

impl RomHeader {
    const MAGIC: [u8; 4] = [0x4E, 0x45, 0x53, 0x1A];

    /// Decode a 16-byte (or longer) iNES/NES 2.0 header.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is too short or the magic number does
    /// not match.
    pub fn parse(data: &[u8]) -> Result<Self, RomError> {
        if data.len() < 16 {
            return Err(RomError::FileTooSmall(data.len()));
        }

        let magic = [data[0], data[1], data[2], data[3]];
        if magic != Self::MAGIC {
            return Err(RomError::InvalidMagic(magic));
        }

        let nes2_format = (data[7] & 0x0C) == 0x08;
        let format = if nes2_format { RomFormat::Nes2 } else { RomFormat::INes };

        let mapper_low = (data[6] & 0xF0) >> 4;
        let mapper_mid = data[7] & 0xF0;
        let (mapper, submapper) = if nes2_format {
            let mapper_high = data[8] & 0x0F;
            let mapper = u16::from(mapper_high) << 8 | u16::from(mapper_mid | mapper_low);
            (mapper, (data[8] & 0xF0) >> 4)
        } else {
            (u16::from(mapper_mid | mapper_low), 0)
        };

        let prg_rom_size = u16::from(data[4]);
        let chr_rom_size = u16::from(data[5]);
        let mirroring = if data[6] & 0x08 != 0 {
            Mirroring::FourScreen
        } else if data[6] & 0x01 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };
        let has_battery = data[6] & 0x02 != 0;
        let has_trainer = data[6] & 0x04 != 0;

        let prg_ram_size = if data[8] == 0 { 8192 } else { data[8] as usize * 8192 };
        let chr_ram_size = if chr_rom_size == 0 { 8192 } else { 0 };

        Ok(Self {
            format,
            mapper,
            submapper,
            prg_rom_size,
            chr_rom_size,
            mirroring,
            has_battery,
            has_trainer,
            prg_ram_size,
            prg_nvram_size: 0,
            chr_ram_size,
            chr_nvram_size: 0,
            tv_system: data[9],
            region: Region::Ntsc,
        })
    }
}

/// A pre-normalized cartridge image: PRG/CHR payload plus a decoded header.
#[derive(Debug, Clone)]
pub struct Rom {
    pub header: RomHeader,
    pub trainer: Option<Vec<u8>>,
    pub prg_rom: Vec<u8>,
    pub chr_rom: Vec<u8>,
}

/// The cartridge data a mapper is constructed from.
///
/// Carries no parsing logic of its own: turning raw iNES/NES 2.0 bytes into
/// one is a host concern. [`Rom::load`] remains available as a convenience
/// for building one from a real `.nes` file.
#[derive(Debug, Clone)]
pub struct CartridgeImage {
    /// Raw PRG-ROM bytes.
    pub prg: Vec<u8>,
    /// Raw CHR-ROM bytes (empty when the cartridge uses CHR-RAM).
    pub chr: Vec<u8>,
    /// Mapper number (0-4095 for NES 2.0, 0-255 for iNES 1.0).
    pub mapper: u16,
    /// Submapper number (0-15, NES 2.0 only).
    pub submapper: u8,
    /// Nametable mirroring mode hardwired by the cartridge.
    pub mirroring: Mirroring,
    /// Battery-backed PRG-RAM/NVRAM present.
    pub has_battery: bool,
    /// PRG-RAM size in bytes.
    pub prg_ram_size: usize,
    /// PRG-NVRAM size in bytes.
    pub prg_nvram_size: usize,
    /// CHR-RAM size in bytes (when `chr` is empty).
    pub chr_ram_size: usize,
    /// CHR-NVRAM size in bytes.
    pub chr_nvram_size: usize,
    /// Console timing region.
    pub region: Region,
}

impl From<Rom> for CartridgeImage {
    fn from(rom: Rom) -> Self {
        Self {
            prg: rom.prg_rom,
            chr: rom.chr_rom,
            mapper: rom.header.mapper,
            submapper: rom.header.submapper,
            mirroring: rom.header.mirroring,
            has_battery: rom.header.has_battery,
            prg_ram_size: rom.header.prg_ram_size,
            prg_nvram_size: rom.header.prg_nvram_size,
            chr_ram_size: rom.header.chr_ram_size,
            chr_nvram_size: rom.header.chr_nvram_size,
            region: rom.header.region,
        }
    }
}

impl From<&Rom> for CartridgeImage {
    fn from(rom: &Rom) -> Self {
        Self {
            prg: rom.prg_rom.clone(),
            chr: rom.chr_rom.clone(),
            mapper: rom.header.mapper,
            submapper: rom.header.submapper,
            mirroring: rom.header.mirroring,
            has_battery: rom.header.has_battery,
            prg_ram_size: rom.header.prg_ram_size,
            prg_nvram_size: rom.header.prg_nvram_size,
            chr_ram_size: rom.header.chr_ram_size,
            chr_nvram_size: rom.header.chr_nvram_size,
            region: rom.header.region,
        }
    }
}

impl Rom {
    /// Load a ROM from raw iNES/NES 2.0 file bytes.
    ///
    /// Provided as a convenience for hosts and tests; not part of the
    /// mapper-construction contract.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is invalid or the file is truncated
    /// relative to the sizes the header declares.
    pub fn load(data: &[u8]) -> Result<Self, RomError> {
        let header = RomHeader::parse(data)?;
        let mut offset = 16;

        let trainer = if header.has_trainer {
            if data.len() < offset + 512 {
                return Err(RomError::FileTooSmall(data.len()));
            }
            let t = data[offset..offset + 512].to_vec();
            offset += 512;
            Some(t)
        } else {
            None
        };

        let prg_bytes = header.prg_rom_size as usize * 16384;
        if data.len() < offset + prg_bytes {
            return Err(RomError::SizeMismatch {
                expected: offset + prg_bytes,
                actual: data.len(),
            });
        }
        let prg_rom = data[offset..offset + prg_bytes].to_vec();
        offset += prg_bytes;

        let chr_bytes = header.chr_rom_size as usize * 8192;
        let chr_rom = if chr_bytes > 0 {
            if data.len() < offset + chr_bytes {
                return Err(RomError::SizeMismatch {
                    expected: offset + chr_bytes,
                    actual: data.len(),
                });
            }
            data[offset..offset + chr_bytes].to_vec()
        } else {
            Vec::new()
        };

        Ok(Self { header, trainer, prg_rom, chr_rom })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_header(prg_banks: u8, chr_banks: u8, mapper: u8, mirror_bits: u8, battery: bool) -> Vec<u8> {
        let mut header = vec![0x4E, 0x45, 0x53, 0x1A];
        header.push(prg_banks);
        header.push(chr_banks);
        header.push(((mapper & 0x0F) << 4) | mirror_bits | if battery { 0x02 } else { 0x00 });
        header.push(mapper & 0xF0);
        header.extend_from_slice(&[0; 8]);
        header
    }

    #[test]
    fn parses_valid_ines_header() {
        let header = make_header(2, 1, 0, 0, false);
        let parsed = RomHeader::parse(&header).unwrap();
        assert_eq!(parsed.prg_rom_size, 2);
        assert_eq!(parsed.chr_rom_size, 1);
        assert_eq!(parsed.mapper, 0);
        assert_eq!(parsed.mirroring, Mirroring::Horizontal);
        assert!(!parsed.has_battery);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut header = make_header(1, 1, 0, 0, false);
        header[0] = 0x00;
        assert!(matches!(RomHeader::parse(&header), Err(RomError::InvalidMagic(_))));
    }

    #[test]
    fn rejects_truncated_header() {
        assert!(matches!(RomHeader::parse(&[0x4E, 0x45, 0x53]), Err(RomError::FileTooSmall(3))));
    }

    #[test]
    fn mirroring_modes_decode() {
        assert_eq!(RomHeader::parse(&make_header(1, 1, 0, 0x01, false)).unwrap().mirroring, Mirroring::Vertical);
        assert_eq!(RomHeader::parse(&make_header(1, 1, 0, 0x08, false)).unwrap().mirroring, Mirroring::FourScreen);
    }

    #[test]
    fn loads_full_rom_image() {
        let mut data = make_header(1, 1, 0, 0, false);
        data.extend_from_slice(&[0x42; 16384]);
        data.extend_from_slice(&[0x55; 8192]);

        let rom = Rom::load(&data).unwrap();
        assert_eq!(rom.prg_rom.len(), 16384);
        assert_eq!(rom.chr_rom.len(), 8192);
        assert_eq!(rom.prg_rom[0], 0x42);
        assert_eq!(rom.chr_rom[0], 0x55);
    }

    #[test]
    fn detects_size_mismatch() {
        let mut data = make_header(2, 1, 0, 0, false);
        data.extend_from_slice(&[0x42; 1024]);
        assert!(matches!(Rom::load(&data), Err(RomError::SizeMismatch { .. })));
    }

    #[test]
    fn converts_loaded_rom_into_cartridge_image() {
        let mut data = make_header(1, 1, 1, 0x01, true);
        data.extend_from_slice(&[0x42; 16384]);
        data.extend_from_slice(&[0x55; 8192]);

        let rom = Rom::load(&data).unwrap();
        let image: CartridgeImage = rom.into();

        assert_eq!(image.prg.len(), 16384);
        assert_eq!(image.chr.len(), 8192);
        assert_eq!(image.mapper, 1);
        assert_eq!(image.mirroring, Mirroring::Vertical);
        assert!(image.has_battery);
    }
}
