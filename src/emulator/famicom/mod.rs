pub mod cpu;
pub mod memory;
mod cpu_instructions;
pub mod bus;
pub mod ppu;
pub mod loopy;
pub mod joypad;
