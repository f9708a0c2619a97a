//! Instruction-level debugger core for 6502-family emulators.
//!
//! A [`Debugger`] owns a [`DebugTarget`] and layers execution control,
//! breakpoints, disassembly, memory inspection, trace capture and expression
//! evaluation on top of it. [`DebugSession`] wraps the debugger lifetime
//! behind a flat call surface for hosts. [`machine::ReferenceMachine`] is a
//! compact NES-style console implementing the target contract.

/// Error taxonomy for debugger and expression operations.
pub mod error;
pub use error::{DebuggerError, EvalError, Result};

/// Debugger and trace configuration.
pub mod config;
pub use config::{
    DebuggerConfig, TraceCategories, TraceFormat, TraceLoggerOptions, DEFAULT_TRACE_CAPACITY,
};

/// Execution state machine and machine snapshot types.
pub mod state;
pub use state::{
    BreakReason, CpuState, DebugState, ExecutionHandle, ExecutionState, PpuState, FLAG_BREAK,
    FLAG_CARRY, FLAG_DECIMAL, FLAG_INTERRUPT, FLAG_NEGATIVE, FLAG_OVERFLOW, FLAG_UNUSED,
    FLAG_ZERO,
};

/// Memory-space tags, dispatch descriptors and the memory dumper.
pub mod memory;
pub use memory::{MemoryDumper, MemorySpace, MemoryType, MEMORY_TYPE_COUNT};

/// Opcode tables and operand formatting.
pub mod isa;
pub use isa::{
    branch_target, AddressingMode, InstructionSet, Mnemonic, Mos6502, OpcodeInfo, MOS6502,
    MOS6502_DECODE_TABLE, MOS6502_OPCODES,
};

/// Contract between the debugger and an emulation core.
pub mod target;
pub use target::{DebugTarget, InterruptKind, NullSink, StepOutcome, TraceEvent, TraceSink};

/// Line-indexed disassembly with incremental re-decode.
pub mod disasm;
pub use disasm::{CodeLineData, CodeVersion, Disassembler, LineKind, MAX_DATA_LINE_BYTES};

/// Watch and condition expressions.
pub mod expr;
pub use expr::{EvalContext, EvalResult, EvalResultType, ExpressionEvaluator};

/// Bounded execution trace ring and file sink.
pub mod trace;
pub use trace::{TraceKind, TraceLogger, TraceRecord};

/// Execution and memory-access breakpoints.
pub mod breakpoint;
pub use breakpoint::{Breakpoint, BreakpointKind, BreakpointSet, BusAccess};

/// Debugger orchestration over a target.
pub mod debugger;
pub use debugger::{Debugger, RunOutcome, StepReport};

/// Session lifetime and host call surface.
pub mod session;
pub use session::DebugSession;

/// Reference NES-style machine.
pub mod machine;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
#[cfg(test)]
use tempfile as _;
