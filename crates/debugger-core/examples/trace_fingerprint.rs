//! Deterministic debug-session fingerprint used for cross-host comparison.
//!
//! Runs a short vblank-driven program under a [`DebugSession`], then hashes
//! the disassembly, the execution trace and the final work RAM.

use debugger_core::machine::{Cartridge, ReferenceMachine, NMI_VECTOR};
use debugger_core::{DebugSession, DebuggerConfig, MemoryType, TraceCategories, TraceLoggerOptions};
use log as _;
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use tempfile as _;
use thiserror as _;

// $8000 LDA #$80
// $8002 STA $2000
// $8005 INC $00
// $8007 JMP $8005
// $800A INC $01      ; NMI handler
// $800C RTI
const PROGRAM: [u8; 13] = [
    0xA9, 0x80, 0x8D, 0x00, 0x20, 0xE6, 0x00, 0x4C, 0x05, 0x80, 0xE6, 0x01, 0x40,
];

fn hash_bytes(hash: &mut u64, bytes: &[u8]) {
    for byte in bytes {
        *hash ^= u64::from(*byte);
        *hash = hash.wrapping_mul(0x1000_0000_01B3);
    }
}

fn fingerprint() -> String {
    let mut cartridge = Cartridge::with_program(&PROGRAM);
    cartridge.set_vector(NMI_VECTOR, 0x800A);
    let mut session = DebugSession::new(
        ReferenceMachine::new(cartridge),
        DebuggerConfig {
            trace_capacity: 512,
            disassembly_range: Some(0x8000..0x8010),
            ..DebuggerConfig::default()
        },
    );
    session.initialize();
    session
        .set_trace_options(TraceLoggerOptions {
            categories: TraceCategories {
                register_writes: true,
                ..TraceCategories::default()
            },
            ..TraceLoggerOptions::default()
        })
        .expect("session is initialized");

    let outcome = session.execute(60_000).expect("session is initialized");
    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    hash_bytes(&mut hash, &outcome.instructions.to_le_bytes());

    let lines = session
        .disassembly_line_count()
        .expect("session is initialized");
    for index in 0..lines {
        let line = session
            .disassembly_line_data(index)
            .expect("index is below the line count");
        hash_bytes(&mut hash, &line.address.to_le_bytes());
        hash_bytes(&mut hash, line.text.as_bytes());
    }

    let trace = session.execution_trace(512).expect("session is initialized");
    hash_bytes(&mut hash, trace.as_bytes());

    let mut work_ram = vec![0; 0x800];
    session
        .memory_state(MemoryType::WorkRam, &mut work_ram)
        .expect("buffer matches work RAM size");
    hash_bytes(&mut hash, &work_ram);

    let state = session.state().expect("session is initialized");
    hash_bytes(&mut hash, &state.cpu.cycle_count.to_le_bytes());
    hash_bytes(&mut hash, &state.ppu.frame_count.to_le_bytes());

    assert!(session.release(), "session was attached");
    format!("{hash:016x}")
}

fn main() {
    println!("{}", fingerprint());
}
