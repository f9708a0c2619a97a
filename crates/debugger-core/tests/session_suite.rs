//! Session suite: lifetime rules and the flat host call surface.

#![allow(clippy::pedantic, clippy::nursery)]

use debugger_core::machine::{ReferenceMachine, PALETTE_RAM_SIZE, WORK_RAM_SIZE};
use debugger_core::{
    BreakReason, DebugSession, DebuggerConfig, DebuggerError, EvalError, EvalResultType,
    MemoryType,
};
use log as _;
use proptest as _;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use tempfile::tempdir;
use thiserror as _;

// $8000 INX
// $8001 STX $10
// $8003 JMP $8000
const PROGRAM: [u8; 6] = [0xE8, 0x86, 0x10, 0x4C, 0x00, 0x80];

fn attached() -> DebugSession<ReferenceMachine> {
    let mut session = DebugSession::new(
        ReferenceMachine::with_program(&PROGRAM),
        DebuggerConfig::default(),
    );
    session.initialize();
    session
}

fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|index| (index as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

#[test]
fn every_call_requires_initialize() {
    let mut session = DebugSession::new(
        ReferenceMachine::with_program(&PROGRAM),
        DebuggerConfig::default(),
    );
    let dir = tempdir().unwrap();
    assert!(matches!(session.execute(1), Err(DebuggerError::NotInitialized)));
    assert!(matches!(session.resume_execution(), Err(DebuggerError::NotInitialized)));
    assert!(matches!(
        session.disassembly_line_count(),
        Err(DebuggerError::NotInitialized)
    ));
    assert!(matches!(
        session.start_trace_logger(dir.path().join("trace.log")),
        Err(DebuggerError::NotInitialized)
    ));
    assert!(matches!(
        session.evaluate_expression("1", false),
        Err(DebuggerError::NotInitialized)
    ));
    assert!(matches!(
        session.memory_value(MemoryType::WorkRam, 0),
        Err(DebuggerError::NotInitialized)
    ));
    assert!(!dir.path().join("trace.log").exists());
}

#[test]
fn memory_sizes_match_the_console_layout() {
    let session = attached();
    let sizes: Vec<u32> = MemoryType::ALL
        .iter()
        .map(|&memory_type| session.memory_size(memory_type).unwrap())
        .collect();
    assert_eq!(
        sizes,
        [
            0x1_0000,
            0x8000,
            WORK_RAM_SIZE as u32,
            0x2000,
            0x800,
            0x100,
            PALETTE_RAM_SIZE as u32
        ]
    );
}

#[rstest]
#[case(MemoryType::PrgRom)]
#[case(MemoryType::WorkRam)]
#[case(MemoryType::SaveRam)]
#[case(MemoryType::VideoRam)]
#[case(MemoryType::SpriteRam)]
#[case(MemoryType::PaletteRam)]
fn physical_region_state_round_trips(#[case] memory_type: MemoryType) {
    let mut session = attached();
    let size = session.memory_size(memory_type).unwrap() as usize;
    let data = pattern(size, 0x5A);
    session.set_memory_state(memory_type, &data).unwrap();

    let mut out = vec![0; size];
    session.memory_state(memory_type, &mut out).unwrap();
    assert_eq!(out, data);

    let last = size as u32 - 1;
    session.set_memory_value(memory_type, last, 0xA5).unwrap();
    assert_eq!(session.memory_value(memory_type, last).unwrap(), 0xA5);
}

#[rstest]
#[case(0x0005, 0x0005)]
#[case(0x0805, 0x0005)]
#[case(0x1FFF, 0x07FF)]
fn cpu_writes_land_in_mirrored_work_ram(#[case] cpu_address: u32, #[case] ram_offset: u32) {
    let mut session = attached();
    session
        .set_memory_value(MemoryType::CpuMemory, cpu_address, 0x42)
        .unwrap();
    assert_eq!(
        session.memory_value(MemoryType::WorkRam, ram_offset).unwrap(),
        0x42
    );
    assert_eq!(
        session.memory_value(MemoryType::CpuMemory, cpu_address).unwrap(),
        0x42
    );
}

#[test]
fn cpu_memory_patch_reaches_rom_and_disassembly() {
    let mut session = attached();
    session
        .set_memory_values(MemoryType::CpuMemory, 0x8000, &[0xC8])
        .unwrap();
    assert_eq!(session.memory_value(MemoryType::PrgRom, 0).unwrap(), 0xC8);
    assert_eq!(session.disassembly_line_data(0).unwrap().text, "INY");
}

#[test]
fn span_past_the_end_writes_nothing() {
    let mut session = attached();
    let end = WORK_RAM_SIZE as u32;
    session
        .set_memory_values(MemoryType::WorkRam, end - 2, &[1, 2])
        .unwrap();

    let result = session.set_memory_values(MemoryType::WorkRam, end - 2, &[9, 9, 9]);
    assert!(matches!(
        result,
        Err(DebuggerError::OutOfRange { value, .. }) if value == u64::from(end - 2)
    ));
    assert_eq!(session.memory_value(MemoryType::WorkRam, end - 2).unwrap(), 1);
    assert_eq!(session.memory_value(MemoryType::WorkRam, end - 1).unwrap(), 2);
}

#[test]
fn empty_write_still_checks_its_address() {
    let mut session = attached();
    let end = WORK_RAM_SIZE as u32;
    assert!(session
        .set_memory_values(MemoryType::WorkRam, end - 1, &[])
        .is_ok());
    assert!(matches!(
        session.set_memory_values(MemoryType::WorkRam, end, &[]),
        Err(DebuggerError::OutOfRange { .. })
    ));
}

#[test]
fn single_byte_access_outside_region_fails() {
    let mut session = attached();
    assert!(matches!(
        session.memory_value(MemoryType::SpriteRam, 0x100),
        Err(DebuggerError::OutOfRange { .. })
    ));
    assert!(matches!(
        session.set_memory_value(MemoryType::PaletteRam, 0x20, 1),
        Err(DebuggerError::OutOfRange { .. })
    ));
}

#[test]
fn whole_region_buffers_must_match_exactly() {
    let mut session = attached();
    let mut short = vec![0; 0x10];
    assert!(matches!(
        session.memory_state(MemoryType::SpriteRam, &mut short),
        Err(DebuggerError::SizeMismatch {
            memory_type: MemoryType::SpriteRam,
            expected: 0x100,
            actual: 0x10,
        })
    ));
    assert!(matches!(
        session.set_memory_state(MemoryType::VideoRam, &[0; 0x801]),
        Err(DebuggerError::SizeMismatch { .. })
    ));
}

#[test]
fn expressions_report_value_and_kind() {
    let mut session = attached();
    assert_eq!(
        session.evaluate_expression("2+2*3", false).unwrap(),
        (8, EvalResultType::Numeric)
    );
    assert_eq!(
        session.evaluate_expression("1==1", true).unwrap(),
        (1, EvalResultType::Boolean)
    );
    assert!(matches!(
        session.evaluate_expression("1/", false),
        Err(DebuggerError::Eval(_))
    ));
    assert!(matches!(
        session.evaluate_expression("4 / (x - x)", false),
        Err(DebuggerError::Eval(EvalError::DivisionByZero))
    ));
}

#[test]
fn run_control_through_the_surface() {
    let mut session = attached();
    assert!(!session.is_execution_stopped().unwrap());
    assert_eq!(session.execute(6).unwrap().instructions, 6);

    session.pause_execution().unwrap();
    assert!(session.is_execution_stopped().unwrap());
    assert_eq!(session.execute(6).unwrap().instructions, 0);

    let report = session.step(2).unwrap();
    assert_eq!(report.reason, BreakReason::Step);
    assert_eq!(session.state().unwrap().instruction_count, 8);
    assert_eq!(session.memory_value(MemoryType::WorkRam, 0x10).unwrap(), 3);

    session.resume_execution().unwrap();
    assert!(!session.is_execution_stopped().unwrap());
    assert!(matches!(session.step(0), Err(DebuggerError::OutOfRange { .. })));
}

#[test]
fn disassembly_surface_uses_line_numbers() {
    let mut session = attached();
    let count = session.disassembly_line_count().unwrap();
    assert!(count > 3);
    assert_eq!(session.disassembly_line_index(0x8002).unwrap(), 1);
    assert_eq!(session.disassembly_line_data(2).unwrap().text, "JMP $8000");
    assert_eq!(session.search_disassembly("STX", 0, count, false).unwrap(), 1);
    assert_eq!(session.search_disassembly("STX", 2, count, false).unwrap(), -1);
    assert!(matches!(
        session.disassembly_line_data(count),
        Err(DebuggerError::OutOfRange { .. })
    ));
}

#[test]
fn trace_survives_until_release() {
    let mut session = attached();
    session.step(3).unwrap();
    assert_eq!(session.execution_trace(10).unwrap().lines().count(), 3);

    assert!(session.release());
    assert_eq!(session.target().unwrap().cpu().state().x, 1);
    assert!(matches!(
        session.execution_trace(10),
        Err(DebuggerError::NotInitialized)
    ));
}

#[test]
fn trace_lines_run_oldest_to_newest() {
    let mut session = attached();
    session.step(4).unwrap();
    let trace = session.execution_trace(3).unwrap();
    let lines: Vec<&str> = trace.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("STX $10"));
    assert!(lines[1].contains("JMP $8000"));
    assert!(lines[2].contains("INX"));
}

#[test]
fn session_can_be_initialized_again_after_release() {
    let mut session = attached();
    session.step(3).unwrap();
    session.release();
    assert!(!session.is_debugger_running());

    session.initialize();
    assert!(session.is_debugger_running());
    assert_eq!(session.state().unwrap().instruction_count, 0);
    assert_eq!(session.state().unwrap().cpu.x, 1);
    assert_eq!(session.execution_trace(10).unwrap(), "");

    session.step(2).unwrap();
    assert_eq!(session.memory_value(MemoryType::WorkRam, 0x10).unwrap(), 2);
}
