//! Execution-control state and machine snapshot types.

/// Point-in-time CPU and PPU snapshot types.
pub mod debug_state;
/// Execution-control state machine and its cross-thread handle.
pub mod run_state;

pub use debug_state::{
    CpuState, DebugState, PpuState, FLAG_BREAK, FLAG_CARRY, FLAG_DECIMAL, FLAG_INTERRUPT,
    FLAG_NEGATIVE, FLAG_OVERFLOW, FLAG_UNUSED, FLAG_ZERO,
};
pub use run_state::{BreakReason, ExecutionHandle, ExecutionState};
