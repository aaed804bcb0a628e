//! Golden log comparison against nestest (https://www.qmtpro.com/~nes/misc/nestest.txt).
//!
//! The ROM and log are not bundled. Drop `nestest.nes` and `nestest.log` into `tests/roms/`
//! and run `cargo test -- --ignored`.

use std::fs;
use std::path::PathBuf;
use daisynes::emulator::famicom::bus::Bus;
use daisynes::emulator::famicom::cpu::Flags;
use daisynes::emulator::rom::cartridge::Cartridge;

#[derive(Debug)]
struct LogEntry {
    pc: u16,
    a: u8,
    x: u8,
    y: u8,
    p: u8,
    sp: u8,
    cycles: u64,
    unofficial: bool,
}

fn parse_hex(s: &str, prefix: &str) -> Option<u8> {
    let start = s.find(prefix)? + prefix.len();
    u8::from_str_radix(s.get(start..start + 2)?, 16).ok()
}

// C000  4C F5 C5  JMP $C5F5                       A:00 X:00 Y:00 P:24 SP:FD PPU:  0, 21 CYC:7
fn parse_log_line(line: &str) -> Option<LogEntry> {
    let pc = u16::from_str_radix(line.get(0..4)?, 16).ok()?;
    let registers_start = line.find("A:")?;
    let registers = &line[registers_start..];
    let cyc_start = registers.find("CYC:")? + 4;
    Some(LogEntry {
        pc,
        a: parse_hex(registers, "A:")?,
        x: parse_hex(registers, "X:")?,
        y: parse_hex(registers, "Y:")?,
        p: parse_hex(registers, "P:")?,
        sp: parse_hex(registers, "SP:")?,
        cycles: registers[cyc_start..].trim().parse().ok()?,
        // unofficial opcodes are marked with a star in front of the mnemonic
        unofficial: line[..registers_start].contains('*'),
    })
}

fn rom_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("roms").join(name)
}

#[test]
#[ignore = "needs tests/roms/nestest.nes and nestest.log"]
fn nestest_official_opcodes_match_golden_log() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (rom, log) = (rom_path("nestest.nes"), rom_path("nestest.log"));
    assert!(rom.exists() && log.exists(), "{} or {} not found", rom.display(), log.display());

    let entries: Vec<LogEntry> = fs::read_to_string(&log)
        .unwrap()
        .lines()
        .filter_map(parse_log_line)
        .take_while(|entry| !entry.unofficial)
        .collect();
    assert!(entries.len() > 5000, "only {} official entries parsed", entries.len());

    let mut bus = Bus::new(Cartridge::from_file(rom.to_str().unwrap()).unwrap());
    bus.reset();
    // Automation mode starts at $C000 instead of the reset vector
    bus.cpu_mut().pc = 0xC000;
    bus.cpu_mut().status = Flags::from_bits_truncate(0x24);
    while !bus.cpu().complete() {
        bus.clock();
    }

    for pair in entries.windows(2) {
        let (expected, next) = (&pair[0], &pair[1]);
        let cpu = bus.cpu();
        let actual = (cpu.pc, cpu.a, cpu.x, cpu.y, cpu.status.bits(), cpu.stkp);
        assert_eq!(actual, (expected.pc, expected.a, expected.x, expected.y, expected.p, expected.sp),
                   "register mismatch at {:04X}:\n{}",
                   expected.pc, bus.disassemble(expected.pc, expected.pc).values().next().unwrap());

        let before = bus.cpu().clock_count;
        bus.step_instruction();
        assert_eq!(bus.cpu().clock_count - before, next.cycles - expected.cycles,
                   "cycle count mismatch for instruction at {:04X}", expected.pc);
    }

    // nestest stores its official opcode failure code at $02
    assert_eq!(bus.cpu_read(0x0002, true), 0x00);
    assert_eq!(bus.cpu_read(0x0003, true), 0x00);
}
