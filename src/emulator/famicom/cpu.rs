use bitflags::bitflags;
use log::{log_enabled, trace, Level};
use crate::emulator::famicom::memory::{Memory, Ptr};
pub use crate::emulator::famicom::cpu_instructions::*;

bitflags! {
    /// Processor status register (P).
    pub struct Flags: u8 {
        const CARRY = 1;
        const ZERO = 1 << 1;
        const DISABLE_INTERRUPTS = 1 << 2;
        /// Ignored by the 2A03
        const DECIMAL_MODE = 1 << 3;
        const BREAK = 1 << 4;
        const UNUSED = 1 << 5;
        const OVERFLOW = 1 << 6;
        const NEGATIVE = 1 << 7;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AddressingMode {
    Implied,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Relative,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndirectX,
    IndirectY,
}

/// Cycle-stepped 6502 core.
///
/// The CPU owns no memory: every operation borrows the address space it runs against, so a CPU
/// that is not attached to a bus simply has nothing to execute.
#[derive(Debug)]
pub struct CPU {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    /// Stack pointer into page $01
    pub stkp: u8,
    pub pc: u16,
    pub status: Flags,

    /// Working input of the ALU
    pub fetched: u8,
    pub temp: u16,
    pub addr_abs: Ptr,
    pub addr_rel: Ptr,
    pub opcode: u8,
    /// Cycles left before the current instruction completes
    pub cycles: u8,
    pub clock_count: u64,
}

impl CPU {
    pub const IV_NMI: u16 = 0xFFFA;
    pub const IV_RESET: u16 = 0xFFFC;
    pub const IV_IRQ_BRK: u16 = 0xFFFE;

    pub fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            stkp: 0,
            pc: 0,
            status: Flags::empty(),
            fetched: 0,
            temp: 0,
            addr_abs: 0,
            addr_rel: 0,
            opcode: 0,
            cycles: 0,
            clock_count: 0,
        }
    }

    pub fn reset<M: Memory>(&mut self, bus: &mut M) {
        self.addr_abs = Self::IV_RESET;
        self.pc = bus.read_u16(self.addr_abs);

        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.stkp = 0xFD;
        self.status = Flags::UNUSED;

        self.addr_rel = 0;
        self.addr_abs = 0;
        self.fetched = 0;

        self.cycles = 8;
    }

    /// Maskable interrupt, ignored while interrupts are disabled.
    pub fn irq<M: Memory>(&mut self, bus: &mut M) {
        if !self.status.contains(Flags::DISABLE_INTERRUPTS) {
            self.interrupt(bus, Self::IV_IRQ_BRK);
            self.cycles = 7;
        }
    }

    pub fn nmi<M: Memory>(&mut self, bus: &mut M) {
        self.interrupt(bus, Self::IV_NMI);
        self.cycles = 8;
    }

    fn interrupt<M: Memory>(&mut self, bus: &mut M, vector: u16) {
        self.push_stack_u16(bus, self.pc);

        self.status.remove(Flags::BREAK);
        self.status.insert(Flags::UNUSED | Flags::DISABLE_INTERRUPTS);
        self.push_stack(bus, self.status.bits());

        self.addr_abs = vector;
        self.pc = bus.read_u16(self.addr_abs);
    }

    /// Advances one CPU cycle. The whole instruction executes on its first cycle; the remaining
    /// calls only burn its cycle budget.
    pub fn clock<M: Memory>(&mut self, bus: &mut M) {
        if self.cycles == 0 {
            if log_enabled!(Level::Trace) {
                trace!("{:04X}  {}  A:{:02X} X:{:02X} Y:{:02X} P:{:02X} SP:{:02X} CYC:{}",
                       self.pc, disassemble_one(bus, self.pc).1,
                       self.a, self.x, self.y, self.status.bits(), self.stkp, self.clock_count);
            }
            self.opcode = bus.read(self.pc);
            self.status.insert(Flags::UNUSED);
            self.pc = self.pc.wrapping_add(1);

            let instruction = LOOKUP[self.opcode as usize];
            self.cycles = instruction.cycles;

            let additional_cycle1 = self.address(bus, instruction.addressing_mode);
            let additional_cycle2 = self.execute(bus, instruction.operation);
            self.cycles += additional_cycle1 & additional_cycle2;

            self.status.insert(Flags::UNUSED);
        }

        self.clock_count += 1;
        self.cycles -= 1;
    }

    /// True between instructions.
    pub fn complete(&self) -> bool {
        self.cycles == 0
    }

    #[inline(always)]
    pub fn get_flag(&self, flag: Flags) -> u8 {
        self.status.contains(flag) as u8
    }

    #[inline(always)]
    pub(crate) fn set_flag(&mut self, flag: Flags, val: bool) {
        self.status.set(flag, val);
    }

    /// Resolves `addr_abs`/`addr_rel` for the mode. Returns 1 when an indexed access crossed a page.
    pub(crate) fn address<M: Memory>(&mut self, bus: &mut M, mode: AddressingMode) -> u8 {
        match mode {
            AddressingMode::Implied => {
                self.fetched = self.a;
                0
            }
            AddressingMode::Immediate => {
                self.addr_abs = self.pc;
                self.pc = self.pc.wrapping_add(1);
                0
            }
            AddressingMode::ZeroPage => {
                self.addr_abs = self.read_pc(bus) as Ptr;
                0
            }
            AddressingMode::ZeroPageX => {
                self.addr_abs = self.read_pc(bus).wrapping_add(self.x) as Ptr;
                0
            }
            AddressingMode::ZeroPageY => {
                self.addr_abs = self.read_pc(bus).wrapping_add(self.y) as Ptr;
                0
            }
            AddressingMode::Relative => {
                self.addr_rel = self.read_pc(bus) as i8 as Ptr;
                0
            }
            AddressingMode::Absolute => {
                self.addr_abs = self.read_pc_u16(bus);
                0
            }
            AddressingMode::AbsoluteX => {
                let base = self.read_pc_u16(bus);
                self.addr_abs = base.wrapping_add(self.x as Ptr);
                Self::page_crossed(base, self.addr_abs)
            }
            AddressingMode::AbsoluteY => {
                let base = self.read_pc_u16(bus);
                self.addr_abs = base.wrapping_add(self.y as Ptr);
                Self::page_crossed(base, self.addr_abs)
            }
            AddressingMode::Indirect => {
                let ptr = self.read_pc_u16(bus);
                let low = bus.read(ptr) as Ptr;
                // 6502 CPU bug: the high byte never leaves the pointer's page
                let high = if ptr & 0x00FF == 0x00FF {
                    bus.read(ptr & 0xFF00) as Ptr
                } else {
                    bus.read(ptr.wrapping_add(1)) as Ptr
                };
                self.addr_abs = high << 8 | low;
                0
            }
            AddressingMode::IndirectX => {
                let t = self.read_pc(bus);
                let low = bus.read(t.wrapping_add(self.x) as Ptr) as Ptr;
                let high = bus.read(t.wrapping_add(self.x).wrapping_add(1) as Ptr) as Ptr;
                self.addr_abs = high << 8 | low;
                0
            }
            AddressingMode::IndirectY => {
                let t = self.read_pc(bus);
                let low = bus.read(t as Ptr) as Ptr;
                let high = bus.read(t.wrapping_add(1) as Ptr) as Ptr;
                let base = high << 8 | low;
                self.addr_abs = base.wrapping_add(self.y as Ptr);
                Self::page_crossed(base, self.addr_abs)
            }
        }
    }

    #[inline(always)]
    fn page_crossed(base: Ptr, effective: Ptr) -> u8 {
        (base & 0xFF00 != effective & 0xFF00) as u8
    }

    fn read_pc<M: Memory>(&mut self, bus: &mut M) -> u8 {
        let val = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        val
    }

    fn read_pc_u16<M: Memory>(&mut self, bus: &mut M) -> u16 {
        let low = self.read_pc(bus) as u16;
        let high = self.read_pc(bus) as u16;
        high << 8 | low
    }

    /// Operand for the current instruction; implied instructions work on the accumulator.
    pub(crate) fn fetch<M: Memory>(&mut self, bus: &mut M) -> u8 {
        if LOOKUP[self.opcode as usize].addressing_mode != AddressingMode::Implied {
            self.fetched = bus.read(self.addr_abs);
        }
        self.fetched
    }

    #[inline(always)]
    pub(crate) fn push_stack<M: Memory>(&mut self, bus: &mut M, val: u8) {
        bus.write(0x0100 | self.stkp as Ptr, val);
        self.stkp = self.stkp.wrapping_sub(1);
    }

    #[inline(always)]
    pub(crate) fn push_stack_u16<M: Memory>(&mut self, bus: &mut M, val: u16) {
        self.push_stack(bus, (val >> 8) as u8);
        self.push_stack(bus, val as u8);
    }

    #[inline(always)]
    pub(crate) fn pop_stack<M: Memory>(&mut self, bus: &mut M) -> u8 {
        self.stkp = self.stkp.wrapping_add(1);
        bus.read(0x0100 | self.stkp as Ptr)
    }

    #[inline(always)]
    pub(crate) fn pop_stack_u16<M: Memory>(&mut self, bus: &mut M) -> u16 {
        let low = self.pop_stack(bus) as u16;
        let high = self.pop_stack(bus) as u16;
        high << 8 | low
    }
}

impl Default for CPU {
    fn default() -> Self {
        Self::new()
    }
}

/// Flat 64K address space used to exercise the CPU in isolation.
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct FlatMemory(pub Vec<u8>);

#[cfg(test)]
impl FlatMemory {
    pub fn new() -> Self {
        FlatMemory(vec![0; 0x10000])
    }

    /// Places `program` at `origin` and points the reset vector at it.
    pub fn with_program(origin: u16, program: &[u8]) -> Self {
        let mut mem = Self::new();
        mem.load(origin, program);
        mem.0[CPU::IV_RESET as usize] = origin as u8;
        mem.0[CPU::IV_RESET as usize + 1] = (origin >> 8) as u8;
        mem
    }

    pub fn load(&mut self, origin: u16, bytes: &[u8]) {
        let start = origin as usize;
        self.0[start..start + bytes.len()].copy_from_slice(bytes);
    }
}

#[cfg(test)]
impl Memory for FlatMemory {
    fn read(&mut self, addr: Ptr) -> u8 {
        self.0[addr as usize]
    }

    fn write(&mut self, addr: Ptr, val: u8) {
        self.0[addr as usize] = val;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reset, burn the reset sequence and return a CPU sitting on the first instruction.
    fn boot(mem: &mut FlatMemory) -> CPU {
        let mut cpu = CPU::new();
        cpu.reset(mem);
        while !cpu.complete() {
            cpu.clock(mem);
        }
        cpu
    }

    /// Runs one whole instruction and returns the number of clocks it took.
    fn step(cpu: &mut CPU, mem: &mut FlatMemory) -> usize {
        let mut clocks = 0;
        loop {
            cpu.clock(mem);
            clocks += 1;
            if cpu.complete() {
                return clocks;
            }
        }
    }

    #[test]
    fn reset_loads_vector_and_clears_registers() {
        let mut mem = FlatMemory::with_program(0x8123, &[]);
        let mut cpu = CPU::new();
        cpu.a = 1;
        cpu.x = 2;
        cpu.y = 3;
        cpu.status = Flags::all();
        cpu.reset(&mut mem);
        assert_eq!(cpu.pc, 0x8123);
        assert_eq!((cpu.a, cpu.x, cpu.y), (0, 0, 0));
        assert_eq!(cpu.stkp, 0xFD);
        assert_eq!(cpu.status, Flags::UNUSED);
        assert_eq!(cpu.cycles, 8);
    }

    #[test]
    fn reset_takes_eight_clocks() {
        let mut mem = FlatMemory::with_program(0x8000, &[0xEA]);
        let mut cpu = CPU::new();
        cpu.reset(&mut mem);
        for _ in 0..7 {
            cpu.clock(&mut mem);
            assert!(!cpu.complete());
        }
        cpu.clock(&mut mem);
        assert!(cpu.complete());
        assert_eq!(cpu.clock_count, 8);
        assert_eq!(cpu.pc, 0x8000);
    }

    #[test]
    fn absolute_x_reports_page_cross() {
        let mut mem = FlatMemory::new();
        let mut cpu = CPU::new();
        cpu.x = 1;
        mem.load(0x0200, &[0xFF, 0x00]);
        cpu.pc = 0x0200;
        assert_eq!(cpu.address(&mut mem, AddressingMode::AbsoluteX), 1);
        assert_eq!(cpu.addr_abs, 0x0100);

        mem.load(0x0200, &[0x10, 0x00]);
        cpu.pc = 0x0200;
        assert_eq!(cpu.address(&mut mem, AddressingMode::AbsoluteX), 0);
        assert_eq!(cpu.addr_abs, 0x0011);
    }

    #[test]
    fn indirect_y_reports_page_cross() {
        let mut mem = FlatMemory::new();
        let mut cpu = CPU::new();
        cpu.y = 0x10;
        mem.load(0x0040, &[0xF8, 0x12]);
        mem.load(0x0300, &[0x40]);
        cpu.pc = 0x0300;
        assert_eq!(cpu.address(&mut mem, AddressingMode::IndirectY), 1);
        assert_eq!(cpu.addr_abs, 0x1308);
    }

    #[test]
    fn zero_page_indexing_wraps_in_page_zero() {
        let mut mem = FlatMemory::new();
        let mut cpu = CPU::new();
        cpu.x = 0x20;
        mem.load(0x0300, &[0xF0]);
        cpu.pc = 0x0300;
        cpu.address(&mut mem, AddressingMode::ZeroPageX);
        assert_eq!(cpu.addr_abs, 0x0010);
    }

    #[test]
    fn indexed_indirect_pointer_wraps_in_page_zero() {
        let mut mem = FlatMemory::new();
        let mut cpu = CPU::new();
        cpu.x = 0x01;
        mem.0[0x00FF] = 0x34;
        mem.0[0x0000] = 0x12;
        mem.load(0x0300, &[0xFE]);
        cpu.pc = 0x0300;
        cpu.address(&mut mem, AddressingMode::IndirectX);
        assert_eq!(cpu.addr_abs, 0x1234);
    }

    #[test]
    fn indirect_jump_page_wrap_bug() {
        // JMP ($02FF)
        let mut mem = FlatMemory::with_program(0x8000, &[0x6C, 0xFF, 0x02]);
        mem.0[0x02FF] = 0x34;
        mem.0[0x0200] = 0x12;
        mem.0[0x0300] = 0x56;
        let mut cpu = boot(&mut mem);
        assert_eq!(step(&mut cpu, &mut mem), 5);
        assert_eq!(cpu.pc, 0x1234);
    }

    #[test]
    fn relative_offset_is_sign_extended() {
        let mut mem = FlatMemory::new();
        let mut cpu = CPU::new();
        mem.load(0x0300, &[0xFE]);
        cpu.pc = 0x0300;
        cpu.address(&mut mem, AddressingMode::Relative);
        assert_eq!(cpu.addr_rel, 0xFFFE);
    }

    #[test]
    fn nmi_pushes_state_and_jumps() {
        let mut mem = FlatMemory::with_program(0x8000, &[0xEA]);
        mem.load(CPU::IV_NMI, &[0x00, 0x90]);
        let mut cpu = boot(&mut mem);
        cpu.status.insert(Flags::CARRY | Flags::BREAK);
        cpu.nmi(&mut mem);
        assert_eq!(cpu.pc, 0x9000);
        assert_eq!(cpu.cycles, 8);
        assert_eq!(cpu.stkp, 0xFA);
        assert_eq!(mem.0[0x01FD], 0x80);
        assert_eq!(mem.0[0x01FC], 0x00);
        assert_eq!(mem.0[0x01FB], (Flags::CARRY | Flags::UNUSED | Flags::DISABLE_INTERRUPTS).bits());
    }

    #[test]
    fn irq_respects_interrupt_disable() {
        let mut mem = FlatMemory::with_program(0x8000, &[0xEA]);
        mem.load(CPU::IV_IRQ_BRK, &[0x00, 0xA0]);
        let mut cpu = boot(&mut mem);
        cpu.status.insert(Flags::DISABLE_INTERRUPTS);
        cpu.irq(&mut mem);
        assert_eq!(cpu.pc, 0x8000);
        assert_eq!(cpu.stkp, 0xFD);

        cpu.status.remove(Flags::DISABLE_INTERRUPTS);
        cpu.irq(&mut mem);
        assert_eq!(cpu.pc, 0xA000);
        assert_eq!(cpu.cycles, 7);
        assert!(cpu.status.contains(Flags::DISABLE_INTERRUPTS));
    }
}
