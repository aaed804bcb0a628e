use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use log::{debug, info};
use crate::emulator::famicom::cpu::{disassemble, CPU};
use crate::emulator::famicom::joypad::Joypad;
use crate::emulator::famicom::memory::{Memory, Ptr, RAM};
use crate::emulator::famicom::ppu::PPU;
use crate::emulator::rom::cartridge::Cartridge;

/// Everything the CPU can address: work RAM, PPU registers, controller ports and the cartridge.
#[derive(Debug)]
pub struct CpuBus {
    ram: RAM,
    ppu: PPU,
    cart: Rc<RefCell<Cartridge>>,
    joypads: [Joypad; 2],
}

impl CpuBus {
    /// `read_only` reads leave PPU registers and controller shift registers untouched.
    pub fn cpu_read(&mut self, addr: Ptr, read_only: bool) -> u8 {
        if let Some(data) = self.cart.borrow().cpu_read(addr) {
            return data;
        }
        match addr {
            0x0000..=0x1FFF => self.ram.read(addr),
            0x2000..=0x3FFF => self.ppu.cpu_read(addr & 0x0007, read_only),
            0x4016..=0x4017 => self.joypads[addr as usize & 1].read(read_only),
            _ => 0,
        }
    }

    pub fn cpu_write(&mut self, addr: Ptr, data: u8) {
        if self.cart.borrow_mut().cpu_write(addr, data) {
            return;
        }
        match addr {
            0x0000..=0x1FFF => self.ram.write(addr, data),
            0x2000..=0x3FFF => self.ppu.cpu_write(addr & 0x0007, data),
            0x4016..=0x4017 => self.joypads[addr as usize & 1].latch(),
            _ => {}
        }
    }
}

impl Memory for CpuBus {
    fn read(&mut self, addr: Ptr) -> u8 {
        self.cpu_read(addr, false)
    }

    fn write(&mut self, addr: Ptr, val: u8) {
        self.cpu_write(addr, val)
    }

    fn peek(&mut self, addr: Ptr) -> u8 {
        self.cpu_read(addr, true)
    }
}

/// The console: owns the CPU, its address space and the master clock.
#[derive(Debug)]
pub struct Bus {
    cpu: CPU,
    mem: CpuBus,
    system_clock_counter: u64,
}

impl Bus {
    pub fn new(cart: Cartridge) -> Self {
        let cart = Rc::new(RefCell::new(cart));
        Self {
            cpu: CPU::new(),
            mem: CpuBus {
                ram: RAM::new(),
                ppu: PPU::new(cart.clone()),
                cart,
                joypads: [Joypad::new(), Joypad::new()],
            },
            system_clock_counter: 0,
        }
    }

    /// Swaps the cartridge. Call `reset` afterwards to boot it.
    pub fn insert_cartridge(&mut self, cart: Cartridge) {
        info!("Inserting cartridge with mapper #{}", cart.mapper_id);
        self.mem.cart = Rc::new(RefCell::new(cart));
        self.mem.ppu.connect_cartridge(self.mem.cart.clone());
    }

    pub fn reset(&mut self) {
        debug!("System reset");
        self.mem.cart.borrow_mut().reset();
        self.cpu.reset(&mut self.mem);
        self.mem.ppu.reset();
        self.system_clock_counter = 0;
    }

    /// One PPU dot. The CPU runs on every third call.
    pub fn clock(&mut self) {
        self.mem.ppu.clock();
        if self.system_clock_counter % 3 == 0 {
            self.cpu.clock(&mut self.mem);
        }
        if self.mem.ppu.nmi {
            self.mem.ppu.nmi = false;
            self.cpu.nmi(&mut self.mem);
        }
        self.system_clock_counter += 1;
    }

    /// Runs the in-flight instruction to completion, then executes exactly one more.
    pub fn step_instruction(&mut self) {
        while !self.cpu.complete() {
            self.clock();
        }
        // The CPU only ticks on every third clock
        loop {
            self.clock();
            if !self.cpu.complete() {
                break;
            }
        }
        while !self.cpu.complete() {
            self.clock();
        }
    }

    /// Runs until the PPU finishes a frame and the CPU reaches an instruction boundary.
    pub fn run_frame(&mut self) {
        while !self.mem.ppu.frame_complete {
            self.clock();
        }
        while !self.cpu.complete() {
            self.clock();
        }
        self.mem.ppu.frame_complete = false;
    }

    pub fn cpu_read(&mut self, addr: Ptr, read_only: bool) -> u8 {
        self.mem.cpu_read(addr, read_only)
    }

    pub fn cpu_write(&mut self, addr: Ptr, data: u8) {
        self.mem.cpu_write(addr, data)
    }

    pub fn disassemble(&mut self, start: Ptr, end: Ptr) -> BTreeMap<Ptr, String> {
        disassemble(&mut self.mem, start, end)
    }

    pub fn cpu(&self) -> &CPU {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut CPU {
        &mut self.cpu
    }

    pub fn ppu(&self) -> &PPU {
        &self.mem.ppu
    }

    pub fn ppu_mut(&mut self) -> &mut PPU {
        &mut self.mem.ppu
    }

    pub fn joypads_mut(&mut self) -> &mut [Joypad; 2] {
        &mut self.mem.joypads
    }

    pub fn system_clock_counter(&self) -> u64 {
        self.system_clock_counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::rom::cartridge::build_image;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// NROM-128 with `program` at $8000 and the reset vector pointing at it.
    fn bus_with(program: &[u8]) -> Bus {
        let mut prg = vec![0u8; 0x4000];
        prg[..program.len()].copy_from_slice(program);
        prg[0x3FFC] = 0x00;
        prg[0x3FFD] = 0x80;
        let cart = Cartridge::from_bytes(&build_image(1, 1, 0, &prg)).unwrap();
        let mut bus = Bus::new(cart);
        bus.reset();
        bus
    }

    #[test]
    fn decodes_cpu_address_space() {
        init_logger();
        let mut bus = bus_with(&[0xEA]);
        bus.cpu_write(0x0001, 0x42);
        assert_eq!(bus.cpu_read(0x1801, false), 0x42);
        assert_eq!(bus.cpu_read(0x8000, false), 0xEA);
        assert_eq!(bus.cpu_read(0xC000, false), 0xEA);
        // unmapped
        bus.cpu_write(0x5000, 0x99);
        assert_eq!(bus.cpu_read(0x5000, false), 0);
        assert_eq!(bus.cpu_read(0x4015, false), 0);
    }

    #[test]
    fn ppu_registers_mirror_every_8_bytes() {
        init_logger();
        let mut bus = bus_with(&[0xEA]);
        bus.cpu_write(0x3FF8, 0x80);
        assert_eq!(bus.ppu().control.bits(), 0x80);
        bus.cpu_write(0x2006, 0x21);
        bus.cpu_write(0x200E, 0x08);
        bus.cpu_write(0x2007, 0x5A);
        assert_eq!(bus.ppu().ppu_read(0x2108), 0x5A);
    }

    #[test]
    fn controller_ports_shift_latched_buttons() {
        init_logger();
        let mut bus = bus_with(&[0xEA]);
        bus.joypads_mut()[1].set(Joypad::BUTTON_A | Joypad::BUTTON_SELECT);
        bus.cpu_write(0x4017, 1);
        assert_eq!(bus.cpu_read(0x4017, true), 1);
        let bits: Vec<u8> = (0..3).map(|_| bus.cpu_read(0x4017, false)).collect();
        assert_eq!(bits, vec![1, 0, 1]);
        // pad 0 was never latched
        assert_eq!(bus.cpu_read(0x4016, false), 0);
    }

    #[test]
    fn cpu_runs_every_third_clock() {
        init_logger();
        let mut bus = bus_with(&[0xEA]);
        for _ in 0..300 {
            bus.clock();
        }
        assert_eq!(bus.system_clock_counter(), 300);
        assert_eq!(bus.cpu().clock_count, 100);
    }

    #[test]
    fn reset_boots_from_vector() {
        init_logger();
        let mut bus = bus_with(&[0xEA]);
        for _ in 0..100 {
            bus.clock();
        }
        bus.reset();
        assert_eq!(bus.cpu().pc, 0x8000);
        assert_eq!(bus.cpu().cycles, 8);
        assert_eq!(bus.system_clock_counter(), 0);
        assert_eq!((bus.ppu().scanline(), bus.ppu().cycle()), (0, 0));
    }

    #[test]
    fn step_instruction_executes_one_instruction() {
        init_logger();
        // LDA #$07; STA $10; INX
        let mut bus = bus_with(&[0xA9, 0x07, 0x85, 0x10, 0xE8]);
        bus.step_instruction();
        assert_eq!(bus.cpu().pc, 0x8002);
        assert_eq!(bus.cpu().a, 0x07);
        bus.step_instruction();
        assert_eq!(bus.cpu_read(0x0010, false), 0x07);
        bus.step_instruction();
        assert_eq!(bus.cpu().x, 1);
        assert!(bus.cpu().complete());
    }

    #[test]
    fn insert_cartridge_rewires_cpu_and_ppu() {
        init_logger();
        let mut bus = bus_with(&[0xEA]);
        let mut prg = vec![0u8; 0x4000];
        prg[0] = 0x60;
        bus.insert_cartridge(Cartridge::from_bytes(&build_image(1, 0, 1, &prg)).unwrap());
        assert_eq!(bus.cpu_read(0x8000, false), 0x60);
        bus.ppu_mut().ppu_write(0x0000, 0x11);
        bus.ppu_mut().ppu_write(0x2000, 0x22);
        assert_eq!(bus.ppu().ppu_read(0x0000), 0x11);
        assert_eq!(bus.ppu().ppu_read(0x2800), 0x22);
    }

    #[test]
    fn disassembles_through_the_bus() {
        init_logger();
        let mut bus = bus_with(&[0xAD, 0x02, 0x20, 0x4C, 0x00, 0x80]);
        bus.ppu_mut().status.insert(crate::emulator::famicom::ppu::Status::VERTICAL_BLANK);
        let lines = bus.disassemble(0x8000, 0x8005);
        assert_eq!(lines[&0x8000], "$8000: AD 02 20  LDA $2002");
        assert_eq!(lines[&0x8003], "$8003: 4C 00 80  JMP $8000");
        // peeking must not acknowledge vblank
        assert!(bus.ppu().status.contains(crate::emulator::famicom::ppu::Status::VERTICAL_BLANK));
    }
}
