use std::fmt::Debug;

pub type Ptr = u16;

/// A CPU-visible address space.
pub trait Memory: Debug {
    fn read(&mut self, addr: Ptr) -> u8;
    fn write(&mut self, addr: Ptr, val: u8);
    /// Reads without register side effects, for debuggers and disassembly.
    fn peek(&mut self, addr: Ptr) -> u8 {
        self.read(addr)
    }
    fn read_u16(&mut self, addr: Ptr) -> u16 {
        let low = self.read(addr);
        let high = self.read(addr.wrapping_add(1));
        (low as u16) | ((high as u16) << 8)
    }
}

const RAM_SIZE: usize = 0x800;

/// The console's 2K of work RAM, mirrored across $0000-$1FFF.
#[derive(Debug)]
pub struct RAM([u8; RAM_SIZE]);

impl RAM {
    pub fn new() -> Self {
        RAM([0; RAM_SIZE])
    }

    pub fn read(&self, addr: Ptr) -> u8 {
        self.0[addr as usize & 0x7ff]
    }

    pub fn write(&mut self, addr: Ptr, val: u8) {
        self.0[addr as usize & 0x7ff] = val;
    }
}
