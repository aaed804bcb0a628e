use std::error::Error;
use std::fs;
use log::{debug, info};
use crate::emulator::rom::ines::{InesHeader, INES_HEADER_BYTES, TRAINER_BYTES};
use crate::emulator::rom::mapper::{create_mapper, Mapper};
use crate::emulator::rom::{CHR_BANK_SIZE, PRG_BANK_SIZE};

/// Nametable arrangement wired on the cartridge board.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mirroring {
    Horizontal,
    Vertical,
    OneScreenLo,
    OneScreenHi,
}

impl Mirroring {
    /// Physical 1K bank backing each of the four logical nametables at $2000, $2400, $2800 and $2C00.
    pub fn nametable_banks(&self) -> [usize; 4] {
        match self {
            Mirroring::Horizontal => [0, 0, 1, 1],
            Mirroring::Vertical => [0, 1, 0, 1],
            Mirroring::OneScreenLo => [0, 0, 0, 0],
            Mirroring::OneScreenHi => [1, 1, 1, 1],
        }
    }
}

#[derive(Debug)]
pub struct Cartridge {
    pub header: InesHeader,
    pub prg_memory: Vec<u8>,
    pub chr_memory: Vec<u8>,
    pub mapper_id: u8,
    pub prg_banks: u8,
    pub chr_banks: u8,
    pub mirroring: Mirroring,
    mapper: Box<dyn Mapper>,
}

impl Cartridge {
    pub fn from_file(path: &str) -> Result<Cartridge, Box<dyn Error>> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Cartridge, Box<dyn Error>> {
        let header = InesHeader::parse(bytes)?;
        let mut offset = INES_HEADER_BYTES;
        if header.has_trainer() {
            debug!("Skipping {} byte trainer", TRAINER_BYTES);
            offset += TRAINER_BYTES;
        }

        let prg_banks = header.prg_rom_chunks;
        if prg_banks == 0 {
            return Err("Cartridge declares no PRG ROM banks".into());
        }
        let prg_size = prg_banks as usize * PRG_BANK_SIZE;
        let prg_memory = Self::slice(bytes, offset, prg_size, "PRG ROM")?.to_vec();
        offset += prg_size;

        let chr_banks = header.chr_rom_chunks;
        let chr_memory = if chr_banks == 0 {
            // The board carries CHR RAM instead
            vec![0u8; CHR_BANK_SIZE]
        } else {
            Self::slice(bytes, offset, chr_banks as usize * CHR_BANK_SIZE, "CHR ROM")?.to_vec()
        };

        let mapper_id = header.mapper_id();
        let mapper = create_mapper(mapper_id, prg_banks, chr_banks)?;
        let mirroring = if header.vertical_mirroring() { Mirroring::Vertical } else { Mirroring::Horizontal };
        info!("Loaded cartridge: mapper #{}, {} PRG bank(s), {} CHR bank(s), {:?} mirroring",
              mapper_id, prg_banks, chr_banks, mirroring);

        Ok(Cartridge {
            header,
            prg_memory,
            chr_memory,
            mapper_id,
            prg_banks,
            chr_banks,
            mirroring,
            mapper,
        })
    }

    fn slice<'a>(bytes: &'a [u8], offset: usize, len: usize, what: &str) -> Result<&'a [u8], Box<dyn Error>> {
        bytes.get(offset..offset + len)
            .ok_or_else(|| format!("Truncated image: {} needs {} bytes at offset {}, file has {}", what, len, offset, bytes.len()).into())
    }

    pub fn reset(&mut self) {
        self.mapper.reset();
    }

    pub fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    pub fn cpu_read(&self, addr: u16) -> Option<u8> {
        self.mapper.cpu_map_read(addr)
            .map(|phy_addr| self.prg_memory[phy_addr as usize])
    }

    pub fn cpu_write(&mut self, addr: u16, data: u8) -> bool {
        match self.mapper.cpu_map_write(addr) {
            Some(phy_addr) => {
                self.prg_memory[phy_addr as usize] = data;
                true
            }
            None => false,
        }
    }

    pub fn ppu_read(&self, addr: u16) -> Option<u8> {
        self.mapper.ppu_map_read(addr)
            .map(|phy_addr| self.chr_memory[phy_addr as usize])
    }

    pub fn ppu_write(&mut self, addr: u16, data: u8) -> bool {
        match self.mapper.ppu_map_write(addr) {
            Some(phy_addr) => {
                self.chr_memory[phy_addr as usize] = data;
                true
            }
            None => false,
        }
    }
}

/// Builds an iNES image whose PRG banks are filled by `prg` (zero padded) and CHR banks with zeros.
#[cfg(test)]
pub(crate) fn build_image(prg_banks: u8, chr_banks: u8, flags6: u8, prg: &[u8]) -> Vec<u8> {
    let mut image = vec![0u8; INES_HEADER_BYTES];
    image[0..4].copy_from_slice(crate::emulator::rom::ines::INES_MAGIC_BYTES);
    image[4] = prg_banks;
    image[5] = chr_banks;
    image[6] = flags6;
    if flags6 & 0x04 != 0 {
        image.extend(std::iter::repeat(0xee).take(TRAINER_BYTES));
    }
    let mut prg_memory = vec![0u8; prg_banks as usize * PRG_BANK_SIZE];
    prg_memory[..prg.len()].copy_from_slice(prg);
    image.extend(prg_memory);
    image.extend(vec![0u8; chr_banks as usize * CHR_BANK_SIZE]);
    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_prg_and_defaults_to_chr_ram() {
        let cart = Cartridge::from_bytes(&build_image(1, 0, 0, &[0xa9, 0x42])).unwrap();
        assert_eq!(cart.prg_memory.len(), PRG_BANK_SIZE);
        assert_eq!(cart.chr_memory.len(), CHR_BANK_SIZE);
        assert_eq!(cart.mirroring(), Mirroring::Horizontal);
        assert_eq!(cart.cpu_read(0x8001), Some(0x42));
        assert_eq!(cart.cpu_read(0xc000), Some(0xa9));
    }

    #[test]
    fn skips_trainer_block() {
        let cart = Cartridge::from_bytes(&build_image(1, 1, 0x05, &[0x11, 0x22])).unwrap();
        assert_eq!(cart.mirroring(), Mirroring::Vertical);
        assert_eq!(cart.cpu_read(0x8000), Some(0x11));
        assert_eq!(cart.cpu_read(0x8001), Some(0x22));
    }

    #[test]
    fn rejects_truncated_image() {
        let mut image = build_image(2, 1, 0, &[]);
        image.truncate(INES_HEADER_BYTES + PRG_BANK_SIZE);
        let err = Cartridge::from_bytes(&image).unwrap_err();
        assert!(err.to_string().contains("PRG ROM"));
    }

    #[test]
    fn rejects_unsupported_mapper() {
        let image = build_image(1, 1, 0x10, &[]);
        assert!(Cartridge::from_bytes(&image).is_err());
    }

    #[test]
    fn chr_rom_ignores_writes_chr_ram_accepts_them() {
        let mut rom = Cartridge::from_bytes(&build_image(1, 1, 0, &[])).unwrap();
        assert!(!rom.ppu_write(0x0010, 0x55));
        assert_eq!(rom.ppu_read(0x0010), Some(0));

        let mut ram = Cartridge::from_bytes(&build_image(1, 0, 0, &[])).unwrap();
        assert!(ram.ppu_write(0x0010, 0x55));
        assert_eq!(ram.ppu_read(0x0010), Some(0x55));
    }

    #[test]
    fn mirroring_bank_tables() {
        assert_eq!(Mirroring::Horizontal.nametable_banks(), [0, 0, 1, 1]);
        assert_eq!(Mirroring::Vertical.nametable_banks(), [0, 1, 0, 1]);
        assert_eq!(Mirroring::OneScreenLo.nametable_banks(), [0, 0, 0, 0]);
        assert_eq!(Mirroring::OneScreenHi.nametable_banks(), [1, 1, 1, 1]);
    }
}
