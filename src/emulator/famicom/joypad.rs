/// Standard controller. Buttons are reported MSB first: A, B, Select, Start, Up, Down, Left, Right.
#[derive(Debug, Default)]
pub struct Joypad {
    pressed_keys: u8,
    shift: u8,
}

impl Joypad {
    pub const BUTTON_A: u8 = 1 << 7;
    pub const BUTTON_B: u8 = 1 << 6;
    pub const BUTTON_SELECT: u8 = 1 << 5;
    pub const BUTTON_START: u8 = 1 << 4;
    pub const BUTTON_UP: u8 = 1 << 3;
    pub const BUTTON_DOWN: u8 = 1 << 2;
    pub const BUTTON_LEFT: u8 = 1 << 1;
    pub const BUTTON_RIGHT: u8 = 1;

    pub fn new() -> Self {
        Self {
            pressed_keys: 0,
            shift: 0,
        }
    }

    pub fn set(&mut self, keys: u8) {
        self.pressed_keys = keys;
    }

    pub fn get(&self) -> u8 {
        self.pressed_keys
    }

    pub fn press(&mut self, keys: u8) {
        self.pressed_keys |= keys;
    }
    pub fn release(&mut self, keys: u8) {
        self.pressed_keys &= !keys;
    }

    /// Snapshot the buttons into the shift register ($4016/$4017 write).
    pub fn latch(&mut self) {
        self.shift = self.pressed_keys;
    }

    /// Next serial bit ($4016/$4017 read).
    pub fn read(&mut self, read_only: bool) -> u8 {
        let bit = (self.shift & 0x80 != 0) as u8;
        if !read_only {
            self.shift <<= 1;
        }
        bit
    }
}
