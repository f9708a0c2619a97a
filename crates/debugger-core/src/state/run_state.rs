use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Execution-control state owned by the debugger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum ExecutionState {
    /// Instructions execute whenever the host calls `execute`.
    #[default]
    Running = 0,
    /// A bounded step is in progress; transient sub-mode of `Stopped`.
    Stepping = 1,
    /// No instruction executes until resumed or stepped.
    Stopped = 2,
}

impl ExecutionState {
    /// Returns `true` for `Stopped` and its `Stepping` sub-mode.
    #[must_use]
    pub const fn is_stopped(self) -> bool {
        matches!(self, Self::Stopped | Self::Stepping)
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Running,
            1 => Self::Stepping,
            _ => Self::Stopped,
        }
    }
}

/// Why execution last entered the stopped state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum BreakReason {
    /// A breakpoint with this id matched.
    Breakpoint(u32),
    /// A bounded step ran to completion.
    Step,
    /// Execution was paused by the host or a break request.
    Pause,
    /// The CPU reached an opcode it cannot execute.
    CpuJam,
}

#[derive(Debug)]
struct SharedControl {
    state: AtomicU8,
    break_requested: AtomicBool,
}

/// Cloneable cross-thread view of the execution state.
///
/// The handle can observe the state and request a break; the request is
/// honored by the debugger at the next instruction boundary of `execute`.
#[derive(Debug, Clone)]
pub struct ExecutionHandle {
    shared: Arc<SharedControl>,
}

impl ExecutionHandle {
    pub(crate) fn new(initial: ExecutionState) -> Self {
        Self {
            shared: Arc::new(SharedControl {
                state: AtomicU8::new(initial as u8),
                break_requested: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the current execution state.
    #[must_use]
    pub fn state(&self) -> ExecutionState {
        ExecutionState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Returns `true` when no free-running execution is in progress.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.state().is_stopped()
    }

    /// Asks the running debugger to stop at the next instruction boundary.
    pub fn request_break(&self) {
        self.shared.break_requested.store(true, Ordering::Release);
    }

    pub(crate) fn set_state(&self, state: ExecutionState) {
        self.shared.state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn take_break_request(&self) -> bool {
        self.shared.break_requested.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::{ExecutionHandle, ExecutionState};

    #[test]
    fn execution_state_default_is_running() {
        assert_eq!(ExecutionState::default(), ExecutionState::Running);
    }

    #[test]
    fn stepping_counts_as_stopped() {
        assert!(!ExecutionState::Running.is_stopped());
        assert!(ExecutionState::Stepping.is_stopped());
        assert!(ExecutionState::Stopped.is_stopped());
    }

    #[test]
    fn cloned_handles_share_state_and_break_requests() {
        let handle = ExecutionHandle::new(ExecutionState::Running);
        let remote = handle.clone();

        handle.set_state(ExecutionState::Stopped);
        assert!(remote.is_stopped());

        remote.request_break();
        assert!(handle.take_break_request());
        assert!(!handle.take_break_request());
    }

    #[test]
    fn handle_is_usable_from_another_thread() {
        let handle = ExecutionHandle::new(ExecutionState::Running);
        let remote = handle.clone();
        std::thread::spawn(move || remote.request_break())
            .join()
            .unwrap();
        assert!(handle.take_break_request());
    }
}
