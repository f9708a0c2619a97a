//! Disassembly suite: line addressing, labels, data marks, search and
//! incremental re-decode after code writes.

#![allow(clippy::pedantic, clippy::nursery)]

use debugger_core::machine::{Cartridge, CartridgeConfig, PrgRomSize, ReferenceMachine};
use debugger_core::{CodeLineData, Debugger, DebuggerConfig, LineKind, MemoryType};
use log as _;
use proptest::prelude::*;
#[cfg(feature = "serde")]
use serde as _;
use rstest as _;
use tempfile as _;
use thiserror as _;

// $8000 LDX #$00
// $8002 INX
// $8003 STX $10
// $8005 JMP $8002
const COUNTER: [u8; 8] = [0xA2, 0x00, 0xE8, 0x86, 0x10, 0x4C, 0x02, 0x80];

const WINDOW: std::ops::Range<u32> = 0x8000..0x8040;

fn windowed(program: &[u8], range: std::ops::Range<u32>) -> Debugger<ReferenceMachine> {
    Debugger::new(
        ReferenceMachine::with_program(program),
        DebuggerConfig {
            disassembly_range: Some(range),
            ..DebuggerConfig::default()
        },
    )
}

fn lines(debugger: &mut Debugger<ReferenceMachine>) -> Vec<CodeLineData> {
    let disassembly = debugger.disassembly();
    (0..disassembly.line_count())
        .map(|index| disassembly.line_data(index).unwrap())
        .collect()
}

#[test]
fn program_decodes_into_instruction_lines() {
    let mut debugger = windowed(&COUNTER, 0x8000..0x8008);
    let lines = lines(&mut debugger);
    let texts: Vec<&str> = lines.iter().map(|line| line.text.as_str()).collect();
    assert_eq!(texts, ["LDX #$00", "INX", "STX $10", "JMP $8002"]);
    assert_eq!(lines[3].bytes, [0x4C, 0x02, 0x80]);
    assert!(lines.iter().all(|line| line.kind == LineKind::Code));
}

#[test]
fn full_code_range_covers_every_address() {
    let mut debugger = Debugger::new(
        ReferenceMachine::with_program(&COUNTER),
        DebuggerConfig::default(),
    );
    let count = debugger.disassembly_line_count();
    let last = debugger.disassembly_line_data(count - 1).unwrap();
    assert_eq!(last.address + last.bytes.len() as u32, 0x1_0000);
    assert_eq!(debugger.disassembly_line_index(0x8004), 2);
    assert_eq!(debugger.disassembly_line_index(0xFFFF), count - 1);
    assert!(debugger.disassembly_line_data(count).is_err());
}

#[test]
fn addresses_outside_the_range_clamp_to_the_edges() {
    let mut debugger = windowed(&COUNTER, 0x8000..0x8008);
    assert_eq!(debugger.disassembly_line_index(0x0000), 0);
    assert_eq!(debugger.disassembly_line_index(0x9000), 3);
}

#[test]
fn label_becomes_its_own_zero_width_line() {
    let mut debugger = windowed(&COUNTER, 0x8000..0x8008);
    debugger.set_label(0x8002, "loop");
    let lines = lines(&mut debugger);
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[1].text, "loop:");
    assert!(lines[1].is_label());
    assert!(lines[1].bytes.is_empty());
    assert_eq!(debugger.disassembly_line_index(0x8002), 2);

    assert_eq!(debugger.remove_label(0x8002).as_deref(), Some("loop"));
    assert_eq!(debugger.disassembly_line_count(), 4);
}

#[test]
fn data_marks_render_bytes_until_cleared() {
    let mut debugger = windowed(&COUNTER, 0x8000..0x8008);
    debugger.mark_data(0x8003..0x8005);
    let marked = debugger.disassembly_line_data(2).unwrap();
    assert_eq!(marked.text, ".db $86, $10");
    assert_eq!(marked.kind, LineKind::Data);
    assert!(marked.is_data());

    debugger.clear_data_marks();
    assert_eq!(debugger.disassembly_line_data(2).unwrap().text, "STX $10");
}

#[test]
fn unknown_opcodes_become_single_byte_rows() {
    let mut debugger = windowed(&[0xEA, 0x02, 0xEA], 0x8000..0x8003);
    let lines = lines(&mut debugger);
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1].text, ".db $02");
    assert_eq!(lines[1].kind, LineKind::Unknown);
}

#[test]
fn search_respects_direction_and_does_not_wrap() {
    let mut debugger = windowed(&COUNTER, 0x8000..0x8008);
    assert_eq!(debugger.search_disassembly("X", 0, 4, false), Some(0));
    assert_eq!(debugger.search_disassembly("X", 0, 4, true), Some(2));
    assert_eq!(debugger.search_disassembly("LDX", 1, 4, false), None);
    assert_eq!(debugger.search_disassembly("JMP", 0, 100, true), Some(3));
    assert_eq!(debugger.search_disassembly("JMP", 3, 3, false), None);
}

#[test]
fn rom_patch_through_physical_space_rebuilds_everything() {
    let mut debugger = windowed(&COUNTER, 0x8000..0x8008);
    debugger.disassembly();
    debugger
        .set_memory_value(MemoryType::PrgRom, 0x0002, 0xC8)
        .unwrap();
    assert!(debugger.code_version().has_pending_full_rebuild());
    assert_eq!(debugger.disassembly_line_data(1).unwrap().text, "INY");
    assert!(!debugger.code_version().has_pending_full_rebuild());
}

#[test]
fn cpu_write_into_ram_code_is_redecoded() {
    // LDA #$A9; STA $0200; JMP $8005
    let program = [0xA9, 0xA9, 0x8D, 0x00, 0x02, 0x4C, 0x05, 0x80];
    let mut debugger = windowed(&program, 0x0200..0x0300);
    assert_eq!(debugger.disassembly_line_count(), 256);
    assert_eq!(debugger.disassembly_line_data(0).unwrap().text, "BRK");
    let before = debugger.code_version().current();

    debugger.step(2).unwrap();
    assert!(debugger.code_version().current() > before);
    assert_eq!(debugger.disassembly_line_data(0).unwrap().text, "LDA #$00");
    assert_eq!(debugger.disassembly_line_count(), 255);
    assert_eq!(debugger.disassembly_line_index(0x0201), 0);
    assert_eq!(debugger.disassembly_line_index(0x0202), 1);
}

#[test]
fn rom_patch_reaches_the_mirrored_bank() {
    let mut cartridge = Cartridge::new(CartridgeConfig {
        prg_rom: PrgRomSize::Kib16,
        save_ram: false,
    });
    cartridge.load(0x8000, &[0xEA]);
    let mut debugger = Debugger::new(ReferenceMachine::new(cartridge), DebuggerConfig::default());
    let mirror = debugger.disassembly_line_index(0xC000);
    assert_eq!(debugger.disassembly_line_data(mirror).unwrap().text, "NOP");

    debugger
        .set_memory_value(MemoryType::CpuMemory, 0x8000, 0xA9)
        .unwrap();
    let mirror = debugger.disassembly_line_index(0xC000);
    let line = debugger.disassembly_line_data(mirror).unwrap();
    assert_eq!(line.address, 0xC000);
    assert_eq!(line.bytes, [0xA9, 0xFF]);
    assert_eq!(line.text, "LDA #$FF");
}

#[test]
fn ram_patch_through_a_mirror_is_redecoded() {
    let mut debugger = windowed(&COUNTER, 0x0200..0x0210);
    assert_eq!(debugger.disassembly_line_data(0).unwrap().text, "BRK");

    debugger
        .set_memory_values(MemoryType::CpuMemory, 0x0A00, &[0xE8])
        .unwrap();
    assert_eq!(debugger.disassembly_line_data(0).unwrap().text, "INX");
    assert_eq!(debugger.disassembly_line_count(), 16);
}

proptest! {
    #[test]
    fn every_address_maps_to_the_line_covering_it(
        program in proptest::collection::vec(any::<u8>(), 0x40),
        address in WINDOW,
    ) {
        let mut debugger = windowed(&program, WINDOW);
        let index = debugger.disassembly_line_index(address);
        let line = debugger.disassembly_line_data(index).unwrap();
        prop_assert!(line.address <= address);
        prop_assert!(address < line.address + line.bytes.len() as u32);
    }

    #[test]
    fn incremental_redecode_matches_fresh_decode(
        program in proptest::collection::vec(any::<u8>(), 0x40),
        patches in proptest::collection::vec((WINDOW, any::<u8>()), 1..8),
    ) {
        let mut debugger = windowed(&program, WINDOW);
        debugger.disassembly();
        for (step, (address, value)) in patches.into_iter().enumerate() {
            debugger
                .set_memory_value(MemoryType::CpuMemory, address, value)
                .unwrap();
            if step % 2 == 0 {
                debugger.disassembly();
            }
        }
        let patched = lines(&mut debugger);

        let mut fresh = Debugger::new(debugger.target().clone(), debugger.config().clone());
        prop_assert_eq!(patched, lines(&mut fresh));
    }
}
