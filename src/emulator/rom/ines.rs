//! The .NES file format (file name suffix .nes) is the de facto standard for distribution of NES binary programs.
//!
//! See http://fms.komkon.org/EMUL8/NES.html#LABM and https://wiki.nesdev.com/w/index.php/INES#iNES_file_format

use std::error::Error;

/// String "NES^Z" used to recognize .NES files.
pub const INES_MAGIC_BYTES: &[u8; 4] = b"NES\x1a";
pub const INES_HEADER_BYTES: usize = 16;
pub const TRAINER_BYTES: usize = 512;

const FLAGS6_VERTICAL_MIRRORING: u8 = 1;
const FLAGS6_TRAINER_PRESENT: u8 = 1 << 2;

/// iNES file header
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InesHeader {
    /// String "NES^Z" used to recognize .NES files
    pub name: [u8; 4],
    /// Number of 16kiB PRG ROM banks
    pub prg_rom_chunks: u8,
    /// Number of 8kiB CHR ROM banks. Value 0 means the board uses 8kiB of CHR RAM
    pub chr_rom_chunks: u8,
    /// Flags 6: mapper low nibble, mirroring, battery, trainer
    pub mapper1: u8,
    /// Flags 7: mapper high nibble, VS/Playchoice
    pub mapper2: u8,
    /// Number of 8kiB RAM banks. Value 0 infers 8 KB for compatibility
    pub prg_ram_size: u8,
    pub tv_system1: u8,
    pub tv_system2: u8,
    pub unused: [u8; 5],
}

impl InesHeader {
    pub fn parse(bytes: &[u8]) -> Result<InesHeader, Box<dyn Error>> {
        if bytes.len() < INES_HEADER_BYTES {
            return Err(format!("Couldn't parse iNES header: expected {} bytes, got {}.", INES_HEADER_BYTES, bytes.len()).into());
        }
        let mut header = InesHeader {
            prg_rom_chunks: bytes[4],
            chr_rom_chunks: bytes[5],
            mapper1: bytes[6],
            mapper2: bytes[7],
            prg_ram_size: bytes[8],
            tv_system1: bytes[9],
            tv_system2: bytes[10],
            ..Default::default()
        };
        header.name.copy_from_slice(&bytes[0..4]);
        header.unused.copy_from_slice(&bytes[11..16]);
        if &header.name != INES_MAGIC_BYTES {
            return Err("Couldn't parse iNES header: bytes doesn't include the iNES magic bytes.".into());
        }
        Ok(header)
    }

    pub fn has_trainer(&self) -> bool {
        self.mapper1 & FLAGS6_TRAINER_PRESENT != 0
    }

    pub fn vertical_mirroring(&self) -> bool {
        self.mapper1 & FLAGS6_VERTICAL_MIRRORING != 0
    }

    /// Mapper number from the high nibbles of flags 6 and 7.
    pub fn mapper_id(&self) -> u8 {
        (self.mapper2 & 0xf0) | (self.mapper1 >> 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes() -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[0..4].copy_from_slice(INES_MAGIC_BYTES);
        bytes
    }

    #[test]
    fn parses_all_header_fields() {
        let mut bytes = header_bytes();
        bytes[4] = 2;
        bytes[5] = 1;
        bytes[6] = 0x15;
        bytes[7] = 0x40;
        bytes[8] = 3;
        bytes[9] = 1;
        bytes[10] = 0x10;
        let header = InesHeader::parse(&bytes).unwrap();
        assert_eq!(header.prg_rom_chunks, 2);
        assert_eq!(header.chr_rom_chunks, 1);
        assert_eq!(header.prg_ram_size, 3);
        assert_eq!(header.tv_system1, 1);
        assert_eq!(header.tv_system2, 0x10);
        assert!(header.vertical_mirroring());
        assert!(header.has_trainer());
        assert_eq!(header.mapper_id(), 0x41);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = header_bytes();
        bytes[3] = 0;
        assert!(InesHeader::parse(&bytes).is_err());
    }

    #[test]
    fn rejects_short_header() {
        assert!(InesHeader::parse(&header_bytes()[..10]).is_err());
    }
}
