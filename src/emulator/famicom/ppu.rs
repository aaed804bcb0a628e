use std::cell::RefCell;
use std::rc::Rc;
use bitflags::bitflags;
use log::debug;
use crate::emulator::famicom::loopy::LoopyRegister;
use crate::emulator::rom::cartridge::Cartridge;

/// Raster size including the non-visible area.
pub const WIDTH: usize = 342;
pub const HEIGHT: usize = 262;

const PATTERN_TABLE_DIM: usize = 128;

bitflags! {
    pub struct Status: u8 {
        const SPRITE_OVERFLOW = 1 << 5;
        const SPRITE_ZERO_HIT = 1 << 6;
        const VERTICAL_BLANK = 1 << 7;
    }
}

bitflags! {
    pub struct Mask: u8 {
        const GRAYSCALE = 1;
        const RENDER_BACKGROUND_LEFT = 1 << 1;
        const RENDER_SPRITES_LEFT = 1 << 2;
        const RENDER_BACKGROUND = 1 << 3;
        const RENDER_SPRITES = 1 << 4;
        const ENHANCE_RED = 1 << 5;
        const ENHANCE_GREEN = 1 << 6;
        const ENHANCE_BLUE = 1 << 7;
    }
}

bitflags! {
    pub struct Control: u8 {
        const NAMETABLE_X = 1;
        const NAMETABLE_Y = 1 << 1;
        const INCREMENT_MODE = 1 << 2;
        const PATTERN_SPRITE = 1 << 3;
        const PATTERN_BACKGROUND = 1 << 4;
        const SPRITE_SIZE = 1 << 5;
        const SLAVE_MODE = 1 << 6;
        const ENABLE_NMI = 1 << 7;
    }
}

/// 2C02 picture processing unit. Only the background plane is rendered.
#[derive(Debug)]
pub struct PPU {
    cart: Rc<RefCell<Cartridge>>,
    tbl_name: [[u8; 0x400]; 2],
    tbl_palette: [u8; 0x20],
    /// Pattern memory used when the cartridge does not claim CHR space
    tbl_pattern: [[u8; 0x1000]; 2],

    display: Vec<u8>,
    sprite_pattern_table: [Vec<u8>; 2],

    pub frame_complete: bool,
    /// NMI line, drained by the bus
    pub nmi: bool,
    scanline: i16,
    cycle: i16,

    pub control: Control,
    pub mask: Mask,
    pub status: Status,

    address_latch: bool,
    ppu_data_buffer: u8,
    pub vram_addr: LoopyRegister,
    pub tram_addr: LoopyRegister,
    pub fine_x: u8,

    bg_next_tile_id: u8,
    bg_next_tile_attrib: u8,
    bg_next_tile_lsb: u8,
    bg_next_tile_msb: u8,
    bg_shifter_pattern_lo: u16,
    bg_shifter_pattern_hi: u16,
    bg_shifter_attrib_lo: u16,
    bg_shifter_attrib_hi: u16,
}

impl PPU {
    // 2C02 palette as used by olcNES
    const PALETTE_COLORS: [(u8, u8, u8); 64] = [(84, 84, 84), (0, 30, 116), (8, 16, 144), (48, 0, 136), (68, 0, 100), (92, 0, 48), (84, 4, 0), (60, 24, 0), (32, 42, 0), (8, 58, 0), (0, 64, 0), (0, 60, 0), (0, 50, 60), (0, 0, 0), (0, 0, 0), (0, 0, 0), (152, 150, 152), (8, 76, 196), (48, 50, 236), (92, 30, 228), (136, 20, 176), (160, 20, 100), (152, 34, 32), (120, 60, 0), (84, 90, 0), (40, 114, 0), (8, 124, 0), (0, 118, 40), (0, 102, 120), (0, 0, 0), (0, 0, 0), (0, 0, 0), (236, 238, 236), (76, 154, 236), (120, 124, 236), (176, 98, 236), (228, 84, 236), (236, 88, 180), (236, 106, 100), (212, 136, 32), (160, 170, 0), (116, 196, 0), (76, 208, 32), (56, 204, 108), (56, 180, 204), (60, 60, 60), (0, 0, 0), (0, 0, 0), (236, 238, 236), (168, 204, 236), (188, 188, 236), (212, 178, 236), (236, 174, 236), (236, 174, 212), (236, 180, 176), (228, 196, 144), (204, 210, 120), (180, 222, 120), (168, 226, 144), (152, 226, 180), (160, 214, 228), (160, 162, 160), (0, 0, 0), (0, 0, 0)];

    pub fn new(cart: Rc<RefCell<Cartridge>>) -> Self {
        Self {
            cart,
            tbl_name: [[0; 0x400]; 2],
            tbl_palette: [0; 0x20],
            tbl_pattern: [[0; 0x1000]; 2],
            display: vec![0; WIDTH * HEIGHT * 4],
            sprite_pattern_table: [
                vec![0; PATTERN_TABLE_DIM * PATTERN_TABLE_DIM * 4],
                vec![0; PATTERN_TABLE_DIM * PATTERN_TABLE_DIM * 4],
            ],
            frame_complete: false,
            nmi: false,
            scanline: 0,
            cycle: 0,
            control: Control::empty(),
            mask: Mask::empty(),
            status: Status::empty(),
            address_latch: false,
            ppu_data_buffer: 0,
            vram_addr: LoopyRegister::default(),
            tram_addr: LoopyRegister::default(),
            fine_x: 0,
            bg_next_tile_id: 0,
            bg_next_tile_attrib: 0,
            bg_next_tile_lsb: 0,
            bg_next_tile_msb: 0,
            bg_shifter_pattern_lo: 0,
            bg_shifter_pattern_hi: 0,
            bg_shifter_attrib_lo: 0,
            bg_shifter_attrib_hi: 0,
        }
    }

    pub fn connect_cartridge(&mut self, cart: Rc<RefCell<Cartridge>>) {
        self.cart = cart;
    }

    /// Clears registers and the background pipeline. Memory contents are kept.
    pub fn reset(&mut self) {
        self.frame_complete = false;
        self.nmi = false;
        self.scanline = 0;
        self.cycle = 0;
        self.control = Control::empty();
        self.mask = Mask::empty();
        self.status = Status::empty();
        self.address_latch = false;
        self.ppu_data_buffer = 0;
        self.vram_addr = LoopyRegister::default();
        self.tram_addr = LoopyRegister::default();
        self.fine_x = 0;
        self.bg_next_tile_id = 0;
        self.bg_next_tile_attrib = 0;
        self.bg_next_tile_lsb = 0;
        self.bg_next_tile_msb = 0;
        self.bg_shifter_pattern_lo = 0;
        self.bg_shifter_pattern_hi = 0;
        self.bg_shifter_attrib_lo = 0;
        self.bg_shifter_attrib_hi = 0;
    }

    pub fn scanline(&self) -> i16 {
        self.scanline
    }

    pub fn cycle(&self) -> i16 {
        self.cycle
    }

    /// RGBA surface of `WIDTH` x `HEIGHT` pixels. Row 0 is the pre-render line.
    pub fn display(&self) -> &[u8] {
        &self.display
    }

    /// Physical 1K nametable bank `i`.
    pub fn name_table(&self, i: usize) -> &[u8; 0x400] {
        &self.tbl_name[i & 1]
    }

    #[inline(always)]
    fn vram_increment(&self) -> u16 {
        if self.control.contains(Control::INCREMENT_MODE) { 32 } else { 1 }
    }

    /// CPU access to register `addr` (0-7). `read_only` reads have no side effects.
    pub fn cpu_read(&mut self, addr: u16, read_only: bool) -> u8 {
        if read_only {
            return match addr {
                0x0000 => self.control.bits(),
                0x0001 => self.mask.bits(),
                0x0002 => self.status.bits(),
                _ => 0,
            };
        }
        match addr {
            0x0002 => { // PPUSTATUS
                // The low bits are open bus, approximated by the data buffer
                let data = (self.status.bits() & 0xE0) | (self.ppu_data_buffer & 0x1F);
                self.status.remove(Status::VERTICAL_BLANK);
                self.address_latch = false;
                data
            }
            0x0007 => { // PPUDATA
                // Reads below the palette are delayed by one access
                let mut data = self.ppu_data_buffer;
                self.ppu_data_buffer = self.ppu_read(self.vram_addr.0);
                if self.vram_addr.0 & 0x3FFF >= 0x3F00 {
                    data = self.ppu_data_buffer;
                }
                self.vram_addr.0 = self.vram_addr.0.wrapping_add(self.vram_increment());
                data
            }
            _ => 0,
        }
    }

    pub fn cpu_write(&mut self, addr: u16, data: u8) {
        match addr {
            0x0000 => { // PPUCTRL
                self.control = Control::from_bits_truncate(data);
                self.tram_addr.set_nametable_x(self.control.contains(Control::NAMETABLE_X) as u16);
                self.tram_addr.set_nametable_y(self.control.contains(Control::NAMETABLE_Y) as u16);
            }
            0x0001 => { // PPUMASK
                self.mask = Mask::from_bits_truncate(data);
            }
            0x0005 => { // PPUSCROLL
                if !self.address_latch {
                    self.fine_x = data & 0x07;
                    self.tram_addr.set_coarse_x(data as u16 >> 3);
                } else {
                    self.tram_addr.set_fine_y(data as u16 & 0x07);
                    self.tram_addr.set_coarse_y(data as u16 >> 3);
                }
                self.address_latch = !self.address_latch;
            }
            0x0006 => { // PPUADDR
                if !self.address_latch {
                    self.tram_addr.0 = (self.tram_addr.0 & 0x00FF) | ((data as u16 & 0x3F) << 8);
                } else {
                    self.tram_addr.0 = (self.tram_addr.0 & 0xFF00) | data as u16;
                    self.vram_addr = self.tram_addr;
                }
                self.address_latch = !self.address_latch;
            }
            0x0007 => { // PPUDATA
                self.ppu_write(self.vram_addr.0, data);
                self.vram_addr.0 = self.vram_addr.0.wrapping_add(self.vram_increment());
            }
            // OAM and status writes are not emulated
            _ => {}
        }
    }

    #[inline(always)]
    fn palette_index(addr: u16) -> usize {
        match addr & 0x1F {
            0x10 => 0x00,
            0x14 => 0x04,
            0x18 => 0x08,
            0x1C => 0x0C,
            index => index as usize,
        }
    }

    #[inline(always)]
    fn nametable_slot(&self, addr: u16) -> (usize, usize) {
        let addr = addr & 0x0FFF;
        let banks = self.cart.borrow().mirroring().nametable_banks();
        (banks[addr as usize / 0x400], addr as usize & 0x3FF)
    }

    pub fn ppu_read(&self, addr: u16) -> u8 {
        let addr = addr & 0x3FFF;
        if let Some(data) = self.cart.borrow().ppu_read(addr) {
            return data;
        }
        match addr {
            0x0000..=0x1FFF => self.tbl_pattern[(addr as usize & 0x1000) >> 12][addr as usize & 0x0FFF],
            0x2000..=0x3EFF => {
                let (bank, offset) = self.nametable_slot(addr);
                self.tbl_name[bank][offset]
            }
            _ => self.tbl_palette[Self::palette_index(addr)],
        }
    }

    pub fn ppu_write(&mut self, addr: u16, data: u8) {
        let addr = addr & 0x3FFF;
        if self.cart.borrow_mut().ppu_write(addr, data) {
            return;
        }
        match addr {
            0x0000..=0x1FFF => self.tbl_pattern[(addr as usize & 0x1000) >> 12][addr as usize & 0x0FFF] = data,
            0x2000..=0x3EFF => {
                let (bank, offset) = self.nametable_slot(addr);
                self.tbl_name[bank][offset] = data;
            }
            _ => self.tbl_palette[Self::palette_index(addr)] = data,
        }
    }

    /// Resolves a 2-bit pixel of `palette` through palette RAM.
    /// Greyscale mode keeps only the luminance column of the entry.
    pub fn get_color_from_palette_ram(&self, palette: u8, pixel: u8) -> (u8, u8, u8) {
        let entry = self.ppu_read(0x3F00 + ((palette as u16) << 2) + pixel as u16);
        let mask = if self.mask.contains(Mask::GRAYSCALE) { 0x30 } else { 0x3F };
        Self::PALETTE_COLORS[(entry & mask) as usize]
    }

    /// Renders pattern table `i` as a 16x16 grid of tiles into a 128x128 RGBA image.
    pub fn get_pattern_table(&mut self, i: usize, palette: u8) -> &[u8] {
        let i = i & 1;
        let base = i as u16 * 0x1000;
        for tile_y in 0..16u16 {
            for tile_x in 0..16u16 {
                let offset = tile_y * 256 + tile_x * 16;
                for row in 0..8u16 {
                    let mut tile_lsb = self.ppu_read(base + offset + row);
                    let mut tile_msb = self.ppu_read(base + offset + row + 8);
                    for col in 0..8u16 {
                        let pixel = (tile_lsb & 0x01) | ((tile_msb & 0x01) << 1);
                        tile_lsb >>= 1;
                        tile_msb >>= 1;

                        let (r, g, b) = self.get_color_from_palette_ram(palette, pixel);
                        let x = (tile_x * 8 + (7 - col)) as usize;
                        let y = (tile_y * 8 + row) as usize;
                        let index = (y * PATTERN_TABLE_DIM + x) * 4;
                        let image = &mut self.sprite_pattern_table[i];
                        image[index] = r;
                        image[index + 1] = g;
                        image[index + 2] = b;
                        image[index + 3] = 0xFF;
                    }
                }
            }
        }
        &self.sprite_pattern_table[i]
    }

    #[inline(always)]
    fn rendering_enabled(&self) -> bool {
        self.mask.intersects(Mask::RENDER_BACKGROUND | Mask::RENDER_SPRITES)
    }

    fn increment_scroll_x(&mut self) {
        if !self.rendering_enabled() {
            return;
        }
        if self.vram_addr.coarse_x() == 31 {
            self.vram_addr.set_coarse_x(0);
            self.vram_addr.set_nametable_x(self.vram_addr.nametable_x() ^ 1);
        } else {
            self.vram_addr.set_coarse_x(self.vram_addr.coarse_x() + 1);
        }
    }

    fn increment_scroll_y(&mut self) {
        if !self.rendering_enabled() {
            return;
        }
        if self.vram_addr.fine_y() < 7 {
            self.vram_addr.set_fine_y(self.vram_addr.fine_y() + 1);
            return;
        }
        self.vram_addr.set_fine_y(0);
        match self.vram_addr.coarse_y() {
            29 => {
                self.vram_addr.set_coarse_y(0);
                self.vram_addr.set_nametable_y(self.vram_addr.nametable_y() ^ 1);
            }
            // Rows 30 and 31 hold attributes; wrapping out of them keeps the nametable
            31 => self.vram_addr.set_coarse_y(0),
            coarse_y => self.vram_addr.set_coarse_y(coarse_y + 1),
        }
    }

    fn transfer_address_x(&mut self) {
        if self.rendering_enabled() {
            self.vram_addr.set_nametable_x(self.tram_addr.nametable_x());
            self.vram_addr.set_coarse_x(self.tram_addr.coarse_x());
        }
    }

    fn transfer_address_y(&mut self) {
        if self.rendering_enabled() {
            self.vram_addr.set_fine_y(self.tram_addr.fine_y());
            self.vram_addr.set_nametable_y(self.tram_addr.nametable_y());
            self.vram_addr.set_coarse_y(self.tram_addr.coarse_y());
        }
    }

    fn load_background_shifters(&mut self) {
        self.bg_shifter_pattern_lo = (self.bg_shifter_pattern_lo & 0xFF00) | self.bg_next_tile_lsb as u16;
        self.bg_shifter_pattern_hi = (self.bg_shifter_pattern_hi & 0xFF00) | self.bg_next_tile_msb as u16;
        let attrib_lo = if self.bg_next_tile_attrib & 0b01 != 0 { 0xFF } else { 0x00 };
        let attrib_hi = if self.bg_next_tile_attrib & 0b10 != 0 { 0xFF } else { 0x00 };
        self.bg_shifter_attrib_lo = (self.bg_shifter_attrib_lo & 0xFF00) | attrib_lo;
        self.bg_shifter_attrib_hi = (self.bg_shifter_attrib_hi & 0xFF00) | attrib_hi;
    }

    fn update_shifters(&mut self) {
        if self.mask.contains(Mask::RENDER_BACKGROUND) {
            self.bg_shifter_pattern_lo <<= 1;
            self.bg_shifter_pattern_hi <<= 1;
            self.bg_shifter_attrib_lo <<= 1;
            self.bg_shifter_attrib_hi <<= 1;
        }
    }

    fn background_pattern_addr(&self, plane: u16) -> u16 {
        let table = if self.control.contains(Control::PATTERN_BACKGROUND) { 0x1000 } else { 0 };
        table + ((self.bg_next_tile_id as u16) << 4) + self.vram_addr.fine_y() + plane
    }

    /// One background tile fetch step on the 8-dot cadence.
    fn fetch_background(&mut self) {
        match (self.cycle - 1) % 8 {
            0 => {
                self.load_background_shifters();
                self.bg_next_tile_id = self.ppu_read(0x2000 | (self.vram_addr.0 & 0x0FFF));
            }
            2 => {
                let v = self.vram_addr;
                let mut attrib = self.ppu_read(0x23C0
                    | (v.nametable_y() << 11)
                    | (v.nametable_x() << 10)
                    | ((v.coarse_y() >> 2) << 3)
                    | (v.coarse_x() >> 2));
                if v.coarse_y() & 0x02 != 0 {
                    attrib >>= 4;
                }
                if v.coarse_x() & 0x02 != 0 {
                    attrib >>= 2;
                }
                self.bg_next_tile_attrib = attrib & 0x03;
            }
            4 => self.bg_next_tile_lsb = self.ppu_read(self.background_pattern_addr(0)),
            // https://wiki.nesdev.com/w/index.php/PPU_rendering: the high plane sits 8 bytes above
            6 => self.bg_next_tile_msb = self.ppu_read(self.background_pattern_addr(8)),
            7 => self.increment_scroll_x(),
            _ => {}
        }
    }

    /// Advances the raster by one dot.
    pub fn clock(&mut self) {
        if self.scanline >= -1 && self.scanline < 240 {
            if self.scanline == 0 && self.cycle == 0 {
                // Odd frame skip
                self.cycle = 1;
            }
            if self.scanline == -1 && self.cycle == 1 {
                self.status.remove(Status::VERTICAL_BLANK);
            }

            if (self.cycle >= 2 && self.cycle < 258) || (self.cycle >= 321 && self.cycle < 328) {
                self.update_shifters();
                self.fetch_background();
            }
            if self.cycle == 256 {
                self.increment_scroll_y();
            }
            if self.cycle == 257 {
                self.transfer_address_x();
            }
            if self.scanline == -1 && self.cycle >= 280 && self.cycle < 305 {
                self.transfer_address_y();
            }
        }

        if self.scanline == 241 && self.cycle == 1 {
            self.status.insert(Status::VERTICAL_BLANK);
            if self.control.contains(Control::ENABLE_NMI) {
                debug!("VBlank NMI raised");
                self.nmi = true;
            }
        }

        let mut bg_pixel = 0u8;
        let mut bg_palette = 0u8;
        if self.mask.contains(Mask::RENDER_BACKGROUND) {
            let bit_mux = 0x8000u16 >> self.fine_x;
            let p0 = (self.bg_shifter_pattern_lo & bit_mux != 0) as u8;
            let p1 = (self.bg_shifter_pattern_hi & bit_mux != 0) as u8;
            bg_pixel = (p1 << 1) | p0;
            let pal0 = (self.bg_shifter_attrib_lo & bit_mux != 0) as u8;
            let pal1 = (self.bg_shifter_attrib_hi & bit_mux != 0) as u8;
            bg_palette = (pal1 << 1) | pal0;
        }

        let (r, g, b) = self.get_color_from_palette_ram(bg_palette, bg_pixel);
        let index = ((self.scanline + 1) as usize * WIDTH + self.cycle as usize) * 4;
        self.display[index] = r;
        self.display[index + 1] = g;
        self.display[index + 2] = b;
        self.display[index + 3] = 0xFF;

        self.cycle += 1;
        if self.cycle >= 341 {
            self.cycle = 0;
            self.scanline += 1;
            if self.scanline >= 261 {
                self.scanline = -1;
                self.frame_complete = true;
            }
        }
    }
}
