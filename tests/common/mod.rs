#![allow(dead_code)]

use daisynes::emulator::famicom::bus::Bus;
use daisynes::emulator::rom::cartridge::Cartridge;

/// Assembles a NROM-128 image: one 16K PRG bank mirrored at $8000 and $C000, one 8K CHR bank.
pub struct RomBuilder {
    prg: Vec<u8>,
    flags6: u8,
}

impl RomBuilder {
    pub const RESET_VECTOR: u16 = 0xFFFC;
    pub const NMI_VECTOR: u16 = 0xFFFA;

    pub fn new() -> Self {
        RomBuilder { prg: vec![0; 0x4000], flags6: 0 }.vector(Self::RESET_VECTOR, 0x8000)
    }

    pub fn code(mut self, addr: u16, bytes: &[u8]) -> Self {
        let start = addr as usize & 0x3FFF;
        self.prg[start..start + bytes.len()].copy_from_slice(bytes);
        self
    }

    pub fn vector(self, vector: u16, target: u16) -> Self {
        self.code(vector, &[target as u8, (target >> 8) as u8])
    }

    pub fn vertical_mirroring(mut self) -> Self {
        self.flags6 |= 0x01;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut image = b"NES\x1a".to_vec();
        image.extend_from_slice(&[1, 1, self.flags6, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        image.extend_from_slice(&self.prg);
        image.extend(std::iter::repeat(0).take(0x2000));
        image
    }

    pub fn boot(&self) -> Bus {
        let _ = env_logger::builder().is_test(true).try_init();
        let cart = Cartridge::from_bytes(&self.build()).expect("valid image");
        let mut bus = Bus::new(cart);
        bus.reset();
        bus
    }
}
