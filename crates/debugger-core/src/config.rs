//! Debugger configuration and trace-logger option sets.

use std::ops::Range;

/// Default number of records retained by the trace ring.
pub const DEFAULT_TRACE_CAPACITY: usize = 30_000;

/// Event categories captured by the trace logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TraceCategories {
    /// Record every retired instruction.
    pub instructions: bool,
    /// Record interrupt entry.
    pub interrupts: bool,
    /// Record writes to memory-mapped hardware registers.
    pub register_writes: bool,
}

impl Default for TraceCategories {
    fn default() -> Self {
        Self {
            instructions: true,
            interrupts: true,
            register_writes: false,
        }
    }
}

/// Columns included when a trace record is rendered.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TraceFormat {
    /// Raw instruction bytes after the address.
    pub byte_code: bool,
    /// CPU register and flag columns.
    pub registers: bool,
    /// CPU cycle counter column.
    pub cycle_count: bool,
    /// PPU scanline and dot columns.
    pub ppu_position: bool,
    /// Resolved operand address for indexed and indirect modes.
    pub effective_address: bool,
}

impl Default for TraceFormat {
    fn default() -> Self {
        Self {
            byte_code: true,
            registers: true,
            cycle_count: true,
            ppu_position: false,
            effective_address: false,
        }
    }
}

/// Trace logger option set, applied to future captures only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TraceLoggerOptions {
    /// Categories recorded.
    pub categories: TraceCategories,
    /// Rendering toggles stored with each record.
    pub format: TraceFormat,
}

/// Construction-time configuration for a [`crate::Debugger`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DebuggerConfig {
    /// Number of records retained by the trace ring.
    pub trace_capacity: usize,
    /// Trace options in effect when the debugger attaches.
    pub trace_options: TraceLoggerOptions,
    /// Stop execution when the CPU jams on an unusable opcode.
    pub break_on_jam: bool,
    /// Start in the stopped state instead of running.
    pub start_stopped: bool,
    /// Address range to disassemble instead of the target's code range.
    pub disassembly_range: Option<Range<u32>>,
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            trace_capacity: DEFAULT_TRACE_CAPACITY,
            trace_options: TraceLoggerOptions::default(),
            break_on_jam: true,
            start_stopped: false,
            disassembly_range: None,
        }
    }
}
