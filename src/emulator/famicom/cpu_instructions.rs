use crate::emulator::famicom::cpu::*;
use crate::emulator::famicom::memory::{Memory, Ptr};
use lazy_static::lazy_static;
use std::collections::BTreeMap;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operation {
    Adc, And, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Brk, Bvc, Bvs, Clc,
    Cld, Cli, Clv, Cmp, Cpx, Cpy, Dec, Dex, Dey, Eor, Inc, Inx, Iny, Jmp,
    Jsr, Lda, Ldx, Ldy, Lsr, Nop, Ora, Pha, Php, Pla, Plp, Rol, Ror, Rti,
    Rts, Sbc, Sec, Sed, Sei, Sta, Stx, Sty, Tax, Tay, Tsx, Txa, Txs, Tya,
    /// Unofficial opcodes that are not emulated
    Xxx,
}

#[derive(Debug, Copy, Clone)]
pub struct Instruction {
    pub opcode: u8,
    pub mnemonic: &'static str,
    pub operation: Operation,
    pub addressing_mode: AddressingMode,
    pub cycles: u8,
}

impl Instruction {
    pub fn new(opcode: u8, mnemonic: &'static str, operation: Operation, addressing_mode: AddressingMode, cycles: u8) -> Self {
        Instruction {
            opcode,
            mnemonic,
            operation,
            addressing_mode,
            cycles,
        }
    }

    /// Encoded size in bytes, opcode included.
    pub fn length(&self) -> u16 {
        match self.addressing_mode {
            AddressingMode::Implied => 1,
            AddressingMode::Immediate
            | AddressingMode::ZeroPage
            | AddressingMode::ZeroPageX
            | AddressingMode::ZeroPageY
            | AddressingMode::IndirectX
            | AddressingMode::IndirectY
            | AddressingMode::Relative => 2,
            AddressingMode::Absolute
            | AddressingMode::AbsoluteX
            | AddressingMode::AbsoluteY
            | AddressingMode::Indirect => 3,
        }
    }

    /// Formats the instruction located at `addr`, e.g. `20 00 90  JSR $9000`.
    pub fn to_string(&self, addr: Ptr, operand1: u8, operand2: u8) -> String {
        let operand_str: String = match self.addressing_mode {
            AddressingMode::Implied => "".into(),
            AddressingMode::Immediate => format!(" #${:02X}", operand1),
            AddressingMode::ZeroPage => format!(" ${:02X}", operand1),
            AddressingMode::ZeroPageX => format!(" ${:02X},X", operand1),
            AddressingMode::ZeroPageY => format!(" ${:02X},Y", operand1),
            AddressingMode::Relative => {
                let target = addr.wrapping_add(2).wrapping_add(operand1 as i8 as Ptr);
                format!(" ${:04X}", target)
            }
            AddressingMode::Absolute => format!(" ${:02X}{:02X}", operand2, operand1),
            AddressingMode::AbsoluteX => format!(" ${:02X}{:02X},X", operand2, operand1),
            AddressingMode::AbsoluteY => format!(" ${:02X}{:02X},Y", operand2, operand1),
            AddressingMode::Indirect => format!(" (${:02X}{:02X})", operand2, operand1),
            AddressingMode::IndirectX => format!(" (${:02X},X)", operand1),
            AddressingMode::IndirectY => format!(" (${:02X}),Y", operand1),
        };
        let hex = match self.length() {
            2 => format!("{:02X} {:02X}   ", self.opcode, operand1),
            3 => format!("{:02X} {:02X} {:02X}", self.opcode, operand1, operand2),
            _ => format!("{:02X}      ", self.opcode),
        };
        format!("{}  {}{}", hex, self.mnemonic, operand_str)
    }
}

lazy_static! {
    /// Decode table indexed by opcode. Slots not registered below are unofficial opcodes.
    pub static ref LOOKUP: [Instruction; 256] = {
        let mut instructions = [Instruction::new(0, "???", Operation::Xxx, AddressingMode::Implied, 2); 256];
        for (opcode, instruction) in instructions.iter_mut().enumerate() {
            instruction.opcode = opcode as u8;
        }
        let mut register = |opcode: u8, mnemonic: &'static str, operation: Operation, addressing_mode: AddressingMode, cycles: u8| {
            instructions[opcode as usize] = Instruction::new(opcode, mnemonic, operation, addressing_mode, cycles);
        };
        // BRK
        register(0x00, "BRK", Operation::Brk, AddressingMode::Immediate, 7);

        // ORA
        register(0x01, "ORA", Operation::Ora, AddressingMode::IndirectX, 6);
        register(0x05, "ORA", Operation::Ora, AddressingMode::ZeroPage, 3);
        register(0x09, "ORA", Operation::Ora, AddressingMode::Immediate, 2);
        register(0x0d, "ORA", Operation::Ora, AddressingMode::Absolute, 4);
        register(0x11, "ORA", Operation::Ora, AddressingMode::IndirectY, 5);
        register(0x15, "ORA", Operation::Ora, AddressingMode::ZeroPageX, 4);
        register(0x19, "ORA", Operation::Ora, AddressingMode::AbsoluteY, 4);
        register(0x1d, "ORA", Operation::Ora, AddressingMode::AbsoluteX, 4);

        // ASL
        register(0x06, "ASL", Operation::Asl, AddressingMode::ZeroPage, 5);
        register(0x0a, "ASL", Operation::Asl, AddressingMode::Implied, 2);
        register(0x0e, "ASL", Operation::Asl, AddressingMode::Absolute, 6);
        register(0x16, "ASL", Operation::Asl, AddressingMode::ZeroPageX, 6);
        register(0x1e, "ASL", Operation::Asl, AddressingMode::AbsoluteX, 7);

        // PHP
        register(0x08, "PHP", Operation::Php, AddressingMode::Implied, 3);

        // BPL
        register(0x10, "BPL", Operation::Bpl, AddressingMode::Relative, 2);

        // CLC
        register(0x18, "CLC", Operation::Clc, AddressingMode::Implied, 2);

        // JSR
        register(0x20, "JSR", Operation::Jsr, AddressingMode::Absolute, 6);

        // AND
        register(0x21, "AND", Operation::And, AddressingMode::IndirectX, 6);
        register(0x25, "AND", Operation::And, AddressingMode::ZeroPage, 3);
        register(0x29, "AND", Operation::And, AddressingMode::Immediate, 2);
        register(0x2d, "AND", Operation::And, AddressingMode::Absolute, 4);
        register(0x31, "AND", Operation::And, AddressingMode::IndirectY, 5);
        register(0x35, "AND", Operation::And, AddressingMode::ZeroPageX, 4);
        register(0x39, "AND", Operation::And, AddressingMode::AbsoluteY, 4);
        register(0x3d, "AND", Operation::And, AddressingMode::AbsoluteX, 4);

        // BIT
        register(0x24, "BIT", Operation::Bit, AddressingMode::ZeroPage, 3);
        register(0x2c, "BIT", Operation::Bit, AddressingMode::Absolute, 4);

        // ROL
        register(0x26, "ROL", Operation::Rol, AddressingMode::ZeroPage, 5);
        register(0x2a, "ROL", Operation::Rol, AddressingMode::Implied, 2);
        register(0x2e, "ROL", Operation::Rol, AddressingMode::Absolute, 6);
        register(0x36, "ROL", Operation::Rol, AddressingMode::ZeroPageX, 6);
        register(0x3e, "ROL", Operation::Rol, AddressingMode::AbsoluteX, 7);

        // PLP
        register(0x28, "PLP", Operation::Plp, AddressingMode::Implied, 4);

        // BMI
        register(0x30, "BMI", Operation::Bmi, AddressingMode::Relative, 2);

        // SEC
        register(0x38, "SEC", Operation::Sec, AddressingMode::Implied, 2);

        // RTI
        register(0x40, "RTI", Operation::Rti, AddressingMode::Implied, 6);

        // EOR
        register(0x41, "EOR", Operation::Eor, AddressingMode::IndirectX, 6);
        register(0x45, "EOR", Operation::Eor, AddressingMode::ZeroPage, 3);
        register(0x49, "EOR", Operation::Eor, AddressingMode::Immediate, 2);
        register(0x4d, "EOR", Operation::Eor, AddressingMode::Absolute, 4);
        register(0x51, "EOR", Operation::Eor, AddressingMode::IndirectY, 5);
        register(0x55, "EOR", Operation::Eor, AddressingMode::ZeroPageX, 4);
        register(0x59, "EOR", Operation::Eor, AddressingMode::AbsoluteY, 4);
        register(0x5d, "EOR", Operation::Eor, AddressingMode::AbsoluteX, 4);

        // LSR
        register(0x46, "LSR", Operation::Lsr, AddressingMode::ZeroPage, 5);
        register(0x4a, "LSR", Operation::Lsr, AddressingMode::Implied, 2);
        register(0x4e, "LSR", Operation::Lsr, AddressingMode::Absolute, 6);
        register(0x56, "LSR", Operation::Lsr, AddressingMode::ZeroPageX, 6);
        register(0x5e, "LSR", Operation::Lsr, AddressingMode::AbsoluteX, 7);

        // PHA
        register(0x48, "PHA", Operation::Pha, AddressingMode::Implied, 3);

        // JMP
        register(0x4c, "JMP", Operation::Jmp, AddressingMode::Absolute, 3);
        register(0x6c, "JMP", Operation::Jmp, AddressingMode::Indirect, 5);

        // BVC
        register(0x50, "BVC", Operation::Bvc, AddressingMode::Relative, 2);

        // CLI
        register(0x58, "CLI", Operation::Cli, AddressingMode::Implied, 2);

        // RTS
        register(0x60, "RTS", Operation::Rts, AddressingMode::Implied, 6);

        // ADC
        register(0x61, "ADC", Operation::Adc, AddressingMode::IndirectX, 6);
        register(0x65, "ADC", Operation::Adc, AddressingMode::ZeroPage, 3);
        register(0x69, "ADC", Operation::Adc, AddressingMode::Immediate, 2);
        register(0x6d, "ADC", Operation::Adc, AddressingMode::Absolute, 4);
        register(0x71, "ADC", Operation::Adc, AddressingMode::IndirectY, 5);
        register(0x75, "ADC", Operation::Adc, AddressingMode::ZeroPageX, 4);
        register(0x79, "ADC", Operation::Adc, AddressingMode::AbsoluteY, 4);
        register(0x7d, "ADC", Operation::Adc, AddressingMode::AbsoluteX, 4);

        // ROR
        register(0x66, "ROR", Operation::Ror, AddressingMode::ZeroPage, 5);
        register(0x6a, "ROR", Operation::Ror, AddressingMode::Implied, 2);
        register(0x6e, "ROR", Operation::Ror, AddressingMode::Absolute, 6);
        register(0x76, "ROR", Operation::Ror, AddressingMode::ZeroPageX, 6);
        register(0x7e, "ROR", Operation::Ror, AddressingMode::AbsoluteX, 7);

        // PLA
        register(0x68, "PLA", Operation::Pla, AddressingMode::Implied, 4);

        // BVS
        register(0x70, "BVS", Operation::Bvs, AddressingMode::Relative, 2);

        // SEI
        register(0x78, "SEI", Operation::Sei, AddressingMode::Implied, 2);

        // STA
        register(0x81, "STA", Operation::Sta, AddressingMode::IndirectX, 6);
        register(0x85, "STA", Operation::Sta, AddressingMode::ZeroPage, 3);
        register(0x8d, "STA", Operation::Sta, AddressingMode::Absolute, 4);
        register(0x91, "STA", Operation::Sta, AddressingMode::IndirectY, 6);
        register(0x95, "STA", Operation::Sta, AddressingMode::ZeroPageX, 4);
        register(0x99, "STA", Operation::Sta, AddressingMode::AbsoluteY, 5);
        register(0x9d, "STA", Operation::Sta, AddressingMode::AbsoluteX, 5);

        // STY
        register(0x84, "STY", Operation::Sty, AddressingMode::ZeroPage, 3);
        register(0x8c, "STY", Operation::Sty, AddressingMode::Absolute, 4);
        register(0x94, "STY", Operation::Sty, AddressingMode::ZeroPageX, 4);

        // STX
        register(0x86, "STX", Operation::Stx, AddressingMode::ZeroPage, 3);
        register(0x8e, "STX", Operation::Stx, AddressingMode::Absolute, 4);
        register(0x96, "STX", Operation::Stx, AddressingMode::ZeroPageY, 4);

        // DEY
        register(0x88, "DEY", Operation::Dey, AddressingMode::Implied, 2);

        // TXA
        register(0x8a, "TXA", Operation::Txa, AddressingMode::Implied, 2);

        // BCC
        register(0x90, "BCC", Operation::Bcc, AddressingMode::Relative, 2);

        // TYA
        register(0x98, "TYA", Operation::Tya, AddressingMode::Implied, 2);

        // TXS
        register(0x9a, "TXS", Operation::Txs, AddressingMode::Implied, 2);

        // LDY
        register(0xa0, "LDY", Operation::Ldy, AddressingMode::Immediate, 2);
        register(0xa4, "LDY", Operation::Ldy, AddressingMode::ZeroPage, 3);
        register(0xac, "LDY", Operation::Ldy, AddressingMode::Absolute, 4);
        register(0xb4, "LDY", Operation::Ldy, AddressingMode::ZeroPageX, 4);
        register(0xbc, "LDY", Operation::Ldy, AddressingMode::AbsoluteX, 4);

        // LDA
        register(0xa1, "LDA", Operation::Lda, AddressingMode::IndirectX, 6);
        register(0xa5, "LDA", Operation::Lda, AddressingMode::ZeroPage, 3);
        register(0xa9, "LDA", Operation::Lda, AddressingMode::Immediate, 2);
        register(0xad, "LDA", Operation::Lda, AddressingMode::Absolute, 4);
        register(0xb1, "LDA", Operation::Lda, AddressingMode::IndirectY, 5);
        register(0xb5, "LDA", Operation::Lda, AddressingMode::ZeroPageX, 4);
        register(0xb9, "LDA", Operation::Lda, AddressingMode::AbsoluteY, 4);
        register(0xbd, "LDA", Operation::Lda, AddressingMode::AbsoluteX, 4);

        // LDX
        register(0xa2, "LDX", Operation::Ldx, AddressingMode::Immediate, 2);
        register(0xa6, "LDX", Operation::Ldx, AddressingMode::ZeroPage, 3);
        register(0xae, "LDX", Operation::Ldx, AddressingMode::Absolute, 4);
        register(0xb6, "LDX", Operation::Ldx, AddressingMode::ZeroPageY, 4);
        register(0xbe, "LDX", Operation::Ldx, AddressingMode::AbsoluteY, 4);

        // TAY
        register(0xa8, "TAY", Operation::Tay, AddressingMode::Implied, 2);

        // TAX
        register(0xaa, "TAX", Operation::Tax, AddressingMode::Implied, 2);

        // BCS
        register(0xb0, "BCS", Operation::Bcs, AddressingMode::Relative, 2);

        // CLV
        register(0xb8, "CLV", Operation::Clv, AddressingMode::Implied, 2);

        // TSX
        register(0xba, "TSX", Operation::Tsx, AddressingMode::Implied, 2);

        // CPY
        register(0xc0, "CPY", Operation::Cpy, AddressingMode::Immediate, 2);
        register(0xc4, "CPY", Operation::Cpy, AddressingMode::ZeroPage, 3);
        register(0xcc, "CPY", Operation::Cpy, AddressingMode::Absolute, 4);

        // CMP
        register(0xc1, "CMP", Operation::Cmp, AddressingMode::IndirectX, 6);
        register(0xc5, "CMP", Operation::Cmp, AddressingMode::ZeroPage, 3);
        register(0xc9, "CMP", Operation::Cmp, AddressingMode::Immediate, 2);
        register(0xcd, "CMP", Operation::Cmp, AddressingMode::Absolute, 4);
        register(0xd1, "CMP", Operation::Cmp, AddressingMode::IndirectY, 5);
        register(0xd5, "CMP", Operation::Cmp, AddressingMode::ZeroPageX, 4);
        register(0xd9, "CMP", Operation::Cmp, AddressingMode::AbsoluteY, 4);
        register(0xdd, "CMP", Operation::Cmp, AddressingMode::AbsoluteX, 4);

        // DEC
        register(0xc6, "DEC", Operation::Dec, AddressingMode::ZeroPage, 5);
        register(0xce, "DEC", Operation::Dec, AddressingMode::Absolute, 6);
        register(0xd6, "DEC", Operation::Dec, AddressingMode::ZeroPageX, 6);
        register(0xde, "DEC", Operation::Dec, AddressingMode::AbsoluteX, 7);

        // INY
        register(0xc8, "INY", Operation::Iny, AddressingMode::Implied, 2);

        // DEX
        register(0xca, "DEX", Operation::Dex, AddressingMode::Implied, 2);

        // BNE
        register(0xd0, "BNE", Operation::Bne, AddressingMode::Relative, 2);

        // CLD
        register(0xd8, "CLD", Operation::Cld, AddressingMode::Implied, 2);

        // NOP
        register(0xda, "NOP", Operation::Nop, AddressingMode::Implied, 2);
        register(0xea, "NOP", Operation::Nop, AddressingMode::Implied, 2);
        register(0xfa, "NOP", Operation::Nop, AddressingMode::Implied, 2);

        // CPX
        register(0xe0, "CPX", Operation::Cpx, AddressingMode::Immediate, 2);
        register(0xe4, "CPX", Operation::Cpx, AddressingMode::ZeroPage, 3);
        register(0xec, "CPX", Operation::Cpx, AddressingMode::Absolute, 4);

        // SBC
        register(0xe1, "SBC", Operation::Sbc, AddressingMode::IndirectX, 6);
        register(0xe5, "SBC", Operation::Sbc, AddressingMode::ZeroPage, 3);
        register(0xe9, "SBC", Operation::Sbc, AddressingMode::Immediate, 2);
        register(0xed, "SBC", Operation::Sbc, AddressingMode::Absolute, 4);
        register(0xf1, "SBC", Operation::Sbc, AddressingMode::IndirectY, 5);
        register(0xf5, "SBC", Operation::Sbc, AddressingMode::ZeroPageX, 4);
        register(0xf9, "SBC", Operation::Sbc, AddressingMode::AbsoluteY, 4);
        register(0xfd, "SBC", Operation::Sbc, AddressingMode::AbsoluteX, 4);

        // INC
        register(0xe6, "INC", Operation::Inc, AddressingMode::ZeroPage, 5);
        register(0xee, "INC", Operation::Inc, AddressingMode::Absolute, 6);
        register(0xf6, "INC", Operation::Inc, AddressingMode::ZeroPageX, 6);
        register(0xfe, "INC", Operation::Inc, AddressingMode::AbsoluteX, 7);

        // INX
        register(0xe8, "INX", Operation::Inx, AddressingMode::Implied, 2);

        // BEQ
        register(0xf0, "BEQ", Operation::Beq, AddressingMode::Relative, 2);

        // SED
        register(0xf8, "SED", Operation::Sed, AddressingMode::Implied, 2);

        // Unofficial opcodes
        register(0x03, "???", Operation::Xxx, AddressingMode::Implied, 8);
        register(0x04, "???", Operation::Nop, AddressingMode::Implied, 3);
        register(0x07, "???", Operation::Xxx, AddressingMode::Implied, 5);
        register(0x0c, "???", Operation::Nop, AddressingMode::Implied, 4);
        register(0x0f, "???", Operation::Xxx, AddressingMode::Implied, 6);
        register(0x13, "???", Operation::Xxx, AddressingMode::Implied, 8);
        register(0x14, "???", Operation::Nop, AddressingMode::Implied, 4);
        register(0x17, "???", Operation::Xxx, AddressingMode::Implied, 6);
        register(0x1a, "???", Operation::Nop, AddressingMode::Implied, 2);
        register(0x1b, "???", Operation::Xxx, AddressingMode::Implied, 7);
        register(0x1c, "???", Operation::Nop, AddressingMode::Implied, 4);
        register(0x1f, "???", Operation::Xxx, AddressingMode::Implied, 7);
        register(0x23, "???", Operation::Xxx, AddressingMode::Implied, 8);
        register(0x27, "???", Operation::Xxx, AddressingMode::Implied, 5);
        register(0x2f, "???", Operation::Xxx, AddressingMode::Implied, 6);
        register(0x33, "???", Operation::Xxx, AddressingMode::Implied, 8);
        register(0x34, "???", Operation::Nop, AddressingMode::Implied, 4);
        register(0x37, "???", Operation::Xxx, AddressingMode::Implied, 6);
        register(0x3a, "???", Operation::Nop, AddressingMode::Implied, 2);
        register(0x3b, "???", Operation::Xxx, AddressingMode::Implied, 7);
        register(0x3c, "???", Operation::Nop, AddressingMode::Implied, 4);
        register(0x3f, "???", Operation::Xxx, AddressingMode::Implied, 7);
        register(0x43, "???", Operation::Xxx, AddressingMode::Implied, 8);
        register(0x44, "???", Operation::Nop, AddressingMode::Implied, 3);
        register(0x47, "???", Operation::Xxx, AddressingMode::Implied, 5);
        register(0x4f, "???", Operation::Xxx, AddressingMode::Implied, 6);
        register(0x53, "???", Operation::Xxx, AddressingMode::Implied, 8);
        register(0x54, "???", Operation::Nop, AddressingMode::Implied, 4);
        register(0x57, "???", Operation::Xxx, AddressingMode::Implied, 6);
        register(0x5a, "???", Operation::Nop, AddressingMode::Implied, 2);
        register(0x5b, "???", Operation::Xxx, AddressingMode::Implied, 7);
        register(0x5c, "???", Operation::Nop, AddressingMode::Implied, 4);
        register(0x5f, "???", Operation::Xxx, AddressingMode::Implied, 7);
        register(0x63, "???", Operation::Xxx, AddressingMode::Implied, 8);
        register(0x64, "???", Operation::Nop, AddressingMode::Implied, 3);
        register(0x67, "???", Operation::Xxx, AddressingMode::Implied, 5);
        register(0x6f, "???", Operation::Xxx, AddressingMode::Implied, 6);
        register(0x73, "???", Operation::Xxx, AddressingMode::Implied, 8);
        register(0x74, "???", Operation::Nop, AddressingMode::Implied, 4);
        register(0x77, "???", Operation::Xxx, AddressingMode::Implied, 6);
        register(0x7a, "???", Operation::Nop, AddressingMode::Implied, 2);
        register(0x7b, "???", Operation::Xxx, AddressingMode::Implied, 7);
        register(0x7c, "???", Operation::Nop, AddressingMode::Implied, 4);
        register(0x7f, "???", Operation::Xxx, AddressingMode::Implied, 7);
        register(0x80, "???", Operation::Nop, AddressingMode::Implied, 2);
        register(0x82, "???", Operation::Nop, AddressingMode::Implied, 2);
        register(0x83, "???", Operation::Xxx, AddressingMode::Implied, 6);
        register(0x87, "???", Operation::Xxx, AddressingMode::Implied, 3);
        register(0x89, "???", Operation::Nop, AddressingMode::Implied, 2);
        register(0x8f, "???", Operation::Xxx, AddressingMode::Implied, 4);
        register(0x93, "???", Operation::Xxx, AddressingMode::Implied, 6);
        register(0x97, "???", Operation::Xxx, AddressingMode::Implied, 4);
        register(0x9b, "???", Operation::Xxx, AddressingMode::Implied, 5);
        register(0x9c, "???", Operation::Nop, AddressingMode::Implied, 5);
        register(0x9e, "???", Operation::Xxx, AddressingMode::Implied, 5);
        register(0x9f, "???", Operation::Xxx, AddressingMode::Implied, 5);
        register(0xa3, "???", Operation::Xxx, AddressingMode::Implied, 6);
        register(0xa7, "???", Operation::Xxx, AddressingMode::Implied, 3);
        register(0xaf, "???", Operation::Xxx, AddressingMode::Implied, 4);
        register(0xb3, "???", Operation::Xxx, AddressingMode::Implied, 5);
        register(0xb7, "???", Operation::Xxx, AddressingMode::Implied, 4);
        register(0xbb, "???", Operation::Xxx, AddressingMode::Implied, 4);
        register(0xbf, "???", Operation::Xxx, AddressingMode::Implied, 4);
        register(0xc2, "???", Operation::Nop, AddressingMode::Implied, 2);
        register(0xc3, "???", Operation::Xxx, AddressingMode::Implied, 8);
        register(0xc7, "???", Operation::Xxx, AddressingMode::Implied, 5);
        register(0xcf, "???", Operation::Xxx, AddressingMode::Implied, 6);
        register(0xd3, "???", Operation::Xxx, AddressingMode::Implied, 8);
        register(0xd4, "???", Operation::Nop, AddressingMode::Implied, 4);
        register(0xd7, "???", Operation::Xxx, AddressingMode::Implied, 6);
        register(0xdb, "???", Operation::Xxx, AddressingMode::Implied, 7);
        register(0xdc, "???", Operation::Nop, AddressingMode::Implied, 4);
        register(0xdf, "???", Operation::Xxx, AddressingMode::Implied, 7);
        register(0xe2, "???", Operation::Nop, AddressingMode::Implied, 2);
        register(0xe3, "???", Operation::Xxx, AddressingMode::Implied, 8);
        register(0xe7, "???", Operation::Xxx, AddressingMode::Implied, 5);
        register(0xeb, "???", Operation::Sbc, AddressingMode::Implied, 2);
        register(0xef, "???", Operation::Xxx, AddressingMode::Implied, 6);
        register(0xf3, "???", Operation::Xxx, AddressingMode::Implied, 8);
        register(0xf4, "???", Operation::Nop, AddressingMode::Implied, 4);
        register(0xf7, "???", Operation::Xxx, AddressingMode::Implied, 6);
        register(0xfb, "???", Operation::Xxx, AddressingMode::Implied, 7);
        register(0xfc, "???", Operation::Nop, AddressingMode::Implied, 4);
        register(0xff, "???", Operation::Xxx, AddressingMode::Implied, 7);
        instructions
    };
}

/// Disassembles the instruction at `addr` through side-effect-free reads.
/// Returns the address of the following instruction along with the text.
pub fn disassemble_one<M: Memory>(mem: &mut M, addr: Ptr) -> (Ptr, String) {
    let instruction = &LOOKUP[mem.peek(addr) as usize];
    let length = instruction.length();
    let operand1 = if length > 1 { mem.peek(addr.wrapping_add(1)) } else { 0 };
    let operand2 = if length > 2 { mem.peek(addr.wrapping_add(2)) } else { 0 };
    (addr.wrapping_add(length), instruction.to_string(addr, operand1, operand2))
}

/// Disassembles `[start, end]`, keyed by instruction address.
pub fn disassemble<M: Memory>(mem: &mut M, start: Ptr, end: Ptr) -> BTreeMap<Ptr, String> {
    let mut lines = BTreeMap::new();
    let mut addr = start as u32;
    while addr <= end as u32 {
        let line_addr = addr as Ptr;
        let (_, text) = disassemble_one(mem, line_addr);
        lines.insert(line_addr, format!("${:04X}: {}", line_addr, text));
        addr += LOOKUP[mem.peek(line_addr) as usize].length() as u32;
    }
    lines
}

impl CPU {
    /// Runs `operation` on the operand resolved by the addressing stage.
    /// Returns 1 when the operation can take the page-cross penalty.
    pub(crate) fn execute<M: Memory>(&mut self, bus: &mut M, operation: Operation) -> u8 {
        match operation {
            Operation::Adc => self.adc(bus),
            Operation::And => self.and(bus),
            Operation::Asl => self.asl(bus),
            Operation::Bcc => self.branch(!self.status.contains(Flags::CARRY)),
            Operation::Bcs => self.branch(self.status.contains(Flags::CARRY)),
            Operation::Beq => self.branch(self.status.contains(Flags::ZERO)),
            Operation::Bit => self.bit(bus),
            Operation::Bmi => self.branch(self.status.contains(Flags::NEGATIVE)),
            Operation::Bne => self.branch(!self.status.contains(Flags::ZERO)),
            Operation::Bpl => self.branch(!self.status.contains(Flags::NEGATIVE)),
            Operation::Brk => self.brk(bus),
            Operation::Bvc => self.branch(!self.status.contains(Flags::OVERFLOW)),
            Operation::Bvs => self.branch(self.status.contains(Flags::OVERFLOW)),
            Operation::Clc => self.change_flag(Flags::CARRY, false),
            Operation::Cld => self.change_flag(Flags::DECIMAL_MODE, false),
            Operation::Cli => self.change_flag(Flags::DISABLE_INTERRUPTS, false),
            Operation::Clv => self.change_flag(Flags::OVERFLOW, false),
            Operation::Cmp => {
                self.compare(bus, self.a);
                1
            }
            Operation::Cpx => {
                self.compare(bus, self.x);
                0
            }
            Operation::Cpy => {
                self.compare(bus, self.y);
                0
            }
            Operation::Dec => self.dec(bus),
            Operation::Dex => {
                self.x = self.x.wrapping_sub(1);
                self.set_zero_negative(self.x);
                0
            }
            Operation::Dey => {
                self.y = self.y.wrapping_sub(1);
                self.set_zero_negative(self.y);
                0
            }
            Operation::Eor => {
                self.a ^= self.fetch(bus);
                self.set_zero_negative(self.a);
                1
            }
            Operation::Inc => self.inc(bus),
            Operation::Inx => {
                self.x = self.x.wrapping_add(1);
                self.set_zero_negative(self.x);
                0
            }
            Operation::Iny => {
                self.y = self.y.wrapping_add(1);
                self.set_zero_negative(self.y);
                0
            }
            Operation::Jmp => {
                self.pc = self.addr_abs;
                0
            }
            Operation::Jsr => self.jsr(bus),
            Operation::Lda => {
                self.a = self.fetch(bus);
                self.set_zero_negative(self.a);
                1
            }
            Operation::Ldx => {
                self.x = self.fetch(bus);
                self.set_zero_negative(self.x);
                1
            }
            Operation::Ldy => {
                self.y = self.fetch(bus);
                self.set_zero_negative(self.y);
                1
            }
            Operation::Lsr => self.lsr(bus),
            Operation::Nop => self.nop(),
            Operation::Ora => {
                self.a |= self.fetch(bus);
                self.set_zero_negative(self.a);
                1
            }
            Operation::Pha => {
                self.push_stack(bus, self.a);
                0
            }
            Operation::Php => self.php(bus),
            Operation::Pla => {
                self.a = self.pop_stack(bus);
                self.set_zero_negative(self.a);
                0
            }
            Operation::Plp => self.plp(bus),
            Operation::Rol => self.rol(bus),
            Operation::Ror => self.ror(bus),
            Operation::Rti => self.rti(bus),
            Operation::Rts => {
                self.pc = self.pop_stack_u16(bus).wrapping_add(1);
                0
            }
            Operation::Sbc => self.sbc(bus),
            Operation::Sec => self.change_flag(Flags::CARRY, true),
            Operation::Sed => self.change_flag(Flags::DECIMAL_MODE, true),
            Operation::Sei => self.change_flag(Flags::DISABLE_INTERRUPTS, true),
            Operation::Sta => {
                bus.write(self.addr_abs, self.a);
                0
            }
            Operation::Stx => {
                bus.write(self.addr_abs, self.x);
                0
            }
            Operation::Sty => {
                bus.write(self.addr_abs, self.y);
                0
            }
            Operation::Tax => {
                self.x = self.a;
                self.set_zero_negative(self.x);
                0
            }
            Operation::Tay => {
                self.y = self.a;
                self.set_zero_negative(self.y);
                0
            }
            Operation::Tsx => {
                self.x = self.stkp;
                self.set_zero_negative(self.x);
                0
            }
            Operation::Txa => {
                self.a = self.x;
                self.set_zero_negative(self.a);
                0
            }
            Operation::Txs => {
                self.stkp = self.x;
                0
            }
            Operation::Tya => {
                self.a = self.y;
                self.set_zero_negative(self.a);
                0
            }
            Operation::Xxx => 0,
        }
    }

    #[inline(always)]
    fn set_zero_negative(&mut self, val: u8) {
        self.set_flag(Flags::ZERO, val == 0);
        self.set_flag(Flags::NEGATIVE, val & 0x80 != 0);
    }

    #[inline(always)]
    fn change_flag(&mut self, flag: Flags, val: bool) -> u8 {
        self.set_flag(flag, val);
        0
    }

    /// Writes a shift/rotate result back to A or to memory depending on the addressing mode.
    fn write_back<M: Memory>(&mut self, bus: &mut M, val: u8) {
        if LOOKUP[self.opcode as usize].addressing_mode == AddressingMode::Implied {
            self.a = val;
        } else {
            bus.write(self.addr_abs, val);
        }
    }

    /// Shared by the eight conditional branches. A taken branch costs one cycle, two if it lands
    /// on another page.
    fn branch(&mut self, condition: bool) -> u8 {
        if condition {
            self.cycles += 1;
            self.addr_abs = self.pc.wrapping_add(self.addr_rel);
            if self.addr_abs & 0xFF00 != self.pc & 0xFF00 {
                self.cycles += 1;
            }
            self.pc = self.addr_abs;
        }
        0
    }

    fn adc<M: Memory>(&mut self, bus: &mut M) -> u8 {
        let operand = self.fetch(bus) as u16;
        self.add_with_carry(operand);
        1
    }

    fn sbc<M: Memory>(&mut self, bus: &mut M) -> u8 {
        // A - M - (1 - C) is A + !M + C
        let operand = (self.fetch(bus) as u16) ^ 0x00FF;
        self.add_with_carry(operand);
        1
    }

    fn add_with_carry(&mut self, operand: u16) {
        let a = self.a as u16;
        self.temp = a + operand + self.get_flag(Flags::CARRY) as u16;
        self.set_flag(Flags::CARRY, self.temp > 0xFF);
        // Signed overflow: both inputs share a sign the result does not
        self.set_flag(Flags::OVERFLOW, (a ^ self.temp) & (operand ^ self.temp) & 0x0080 != 0);
        self.a = self.temp as u8;
        self.set_zero_negative(self.a);
    }

    fn and<M: Memory>(&mut self, bus: &mut M) -> u8 {
        self.a &= self.fetch(bus);
        self.set_zero_negative(self.a);
        1
    }

    fn asl<M: Memory>(&mut self, bus: &mut M) -> u8 {
        self.temp = (self.fetch(bus) as u16) << 1;
        self.set_flag(Flags::CARRY, self.temp & 0xFF00 != 0);
        self.set_zero_negative(self.temp as u8);
        self.write_back(bus, self.temp as u8);
        0
    }

    fn lsr<M: Memory>(&mut self, bus: &mut M) -> u8 {
        let operand = self.fetch(bus);
        self.set_flag(Flags::CARRY, operand & 0x01 != 0);
        self.temp = (operand >> 1) as u16;
        self.set_zero_negative(self.temp as u8);
        self.write_back(bus, self.temp as u8);
        0
    }

    fn rol<M: Memory>(&mut self, bus: &mut M) -> u8 {
        self.temp = (self.fetch(bus) as u16) << 1 | self.get_flag(Flags::CARRY) as u16;
        self.set_flag(Flags::CARRY, self.temp & 0xFF00 != 0);
        self.set_zero_negative(self.temp as u8);
        self.write_back(bus, self.temp as u8);
        0
    }

    fn ror<M: Memory>(&mut self, bus: &mut M) -> u8 {
        let operand = self.fetch(bus);
        self.temp = (self.get_flag(Flags::CARRY) as u16) << 7 | (operand >> 1) as u16;
        self.set_flag(Flags::CARRY, operand & 0x01 != 0);
        self.set_zero_negative(self.temp as u8);
        self.write_back(bus, self.temp as u8);
        0
    }

    fn bit<M: Memory>(&mut self, bus: &mut M) -> u8 {
        let operand = self.fetch(bus);
        self.set_flag(Flags::ZERO, self.a & operand == 0);
        self.set_flag(Flags::NEGATIVE, operand & 0x80 != 0);
        self.set_flag(Flags::OVERFLOW, operand & 0x40 != 0);
        0
    }

    fn compare<M: Memory>(&mut self, bus: &mut M, register: u8) {
        let operand = self.fetch(bus);
        self.temp = (register as u16).wrapping_sub(operand as u16);
        self.set_flag(Flags::CARRY, register >= operand);
        self.set_zero_negative(self.temp as u8);
    }

    fn dec<M: Memory>(&mut self, bus: &mut M) -> u8 {
        let val = self.fetch(bus).wrapping_sub(1);
        bus.write(self.addr_abs, val);
        self.set_zero_negative(val);
        0
    }

    fn inc<M: Memory>(&mut self, bus: &mut M) -> u8 {
        let val = self.fetch(bus).wrapping_add(1);
        bus.write(self.addr_abs, val);
        self.set_zero_negative(val);
        0
    }

    fn brk<M: Memory>(&mut self, bus: &mut M) -> u8 {
        self.pc = self.pc.wrapping_add(1);

        self.set_flag(Flags::DISABLE_INTERRUPTS, true);
        self.push_stack_u16(bus, self.pc);

        self.set_flag(Flags::BREAK, true);
        self.push_stack(bus, self.status.bits());
        self.set_flag(Flags::BREAK, false);

        self.pc = bus.read_u16(CPU::IV_IRQ_BRK);
        0
    }

    fn jsr<M: Memory>(&mut self, bus: &mut M) -> u8 {
        // The return address pushed is the last byte of the JSR
        self.pc = self.pc.wrapping_sub(1);
        self.push_stack_u16(bus, self.pc);
        self.pc = self.addr_abs;
        0
    }

    fn rti<M: Memory>(&mut self, bus: &mut M) -> u8 {
        self.status = Flags::from_bits_truncate(self.pop_stack(bus));
        self.status.remove(Flags::BREAK | Flags::UNUSED);
        self.pc = self.pop_stack_u16(bus);
        0
    }

    fn php<M: Memory>(&mut self, bus: &mut M) -> u8 {
        self.push_stack(bus, (self.status | Flags::BREAK | Flags::UNUSED).bits());
        self.status.remove(Flags::BREAK | Flags::UNUSED);
        0
    }

    fn plp<M: Memory>(&mut self, bus: &mut M) -> u8 {
        // B only exists on the stack copy
        // https://wiki.nesdev.com/w/index.php/Status_flags
        self.status = Flags::from_bits_truncate(self.pop_stack(bus));
        self.status.insert(Flags::UNUSED);
        self.status.remove(Flags::BREAK);
        0
    }

    fn nop(&self) -> u8 {
        match self.opcode {
            0x1C | 0x3C | 0x5C | 0x7C | 0xDC | 0xFC => 1,
            _ => 0,
        }
    }
}
