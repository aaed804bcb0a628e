use std::error::Error;
use std::fmt::Debug;

/// Address translation performed by the cartridge board.
///
/// Every operation returns `Some(offset)` when the mapper claims the address; the offset indexes
/// PRG memory (CPU side) or CHR memory (PPU side). `None` lets the bus fall through to its own
/// regions.
pub trait Mapper: Debug {
    fn cpu_map_read(&self, addr: u16) -> Option<u32>;
    fn cpu_map_write(&mut self, addr: u16) -> Option<u32>;
    fn ppu_map_read(&self, addr: u16) -> Option<u32>;
    fn ppu_map_write(&mut self, addr: u16) -> Option<u32>;
    fn reset(&mut self);
}

pub fn create_mapper(mapper_id: u8, prg_banks: u8, chr_banks: u8) -> Result<Box<dyn Mapper>, Box<dyn Error>> {
    match mapper_id {
        0 => Ok(Box::new(NROMMapper::new(prg_banks, chr_banks))),
        _ => Err(format!("Unsupported mapper type {}", mapper_id).into()),
    }
}

/// https://wiki.nesdev.com/w/index.php/NROM
#[derive(Debug)]
pub struct NROMMapper {
    prg_banks: u8,
    chr_banks: u8,
}

impl NROMMapper {
    pub fn new(prg_banks: u8, chr_banks: u8) -> Self {
        NROMMapper {
            prg_banks,
            chr_banks,
        }
    }

    // NROM-128 mirrors its single 16K bank into $C000-$FFFF
    fn map_prg_address(&self, addr: u16) -> Option<u32> {
        match addr {
            0x8000..=0xffff => {
                let mask = if self.prg_banks > 1 { 0x7fff } else { 0x3fff };
                Some((addr & mask) as u32)
            }
            _ => None,
        }
    }
}

impl Mapper for NROMMapper {
    fn cpu_map_read(&self, addr: u16) -> Option<u32> {
        self.map_prg_address(addr)
    }

    fn cpu_map_write(&mut self, addr: u16) -> Option<u32> {
        self.map_prg_address(addr)
    }

    fn ppu_map_read(&self, addr: u16) -> Option<u32> {
        match addr {
            0x0000..=0x1fff => Some(addr as u32),
            _ => None,
        }
    }

    fn ppu_map_write(&mut self, addr: u16) -> Option<u32> {
        match addr {
            // Only CHR RAM boards accept pattern writes
            0x0000..=0x1fff if self.chr_banks == 0 => Some(addr as u32),
            _ => None,
        }
    }

    fn reset(&mut self) {}
}
