//! Host-facing session: explicit debugger lifetime and the flat call surface.
//!
//! Every call made while no debugger is attached fails with
//! [`DebuggerError::NotInitialized`]. Counts, indices and addresses use `u32`
//! on this surface; the [`Debugger`] underneath works in `usize`.

use std::path::Path;

use crate::{
    CodeLineData, DebugState, DebugTarget, Debugger, DebuggerConfig, DebuggerError, EvalResultType,
    MemoryType, Result, RunOutcome, StepReport, TraceLoggerOptions,
};

enum Attachment<T: DebugTarget> {
    Detached(T),
    Attached(Box<Debugger<T>>),
    /// Held only while moving between the other two; left behind if attaching panics.
    Vacant,
}

/// Owns a target and, between `initialize` and `release`, the debugger attached to it.
///
/// A session can be initialized again after a release; the new debugger
/// starts from a clean slate over the same target.
pub struct DebugSession<T: DebugTarget> {
    attachment: Attachment<T>,
    config: DebuggerConfig,
}

impl<T: DebugTarget> std::fmt::Debug for DebugSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let attachment = match &self.attachment {
            Attachment::Detached(_) => "detached",
            Attachment::Attached(_) => "attached",
            Attachment::Vacant => "vacant",
        };
        f.debug_struct("DebugSession")
            .field("attachment", &attachment)
            .field("config", &self.config)
            .finish()
    }
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn to_usize(value: u32) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

impl<T: DebugTarget> DebugSession<T> {
    /// Wraps `target`; no debugger is attached until [`DebugSession::initialize`].
    #[must_use]
    pub const fn new(target: T, config: DebuggerConfig) -> Self {
        Self {
            attachment: Attachment::Detached(target),
            config,
        }
    }

    /// Attaches a debugger. Calling it again while attached does nothing.
    pub fn initialize(&mut self) {
        match std::mem::replace(&mut self.attachment, Attachment::Vacant) {
            Attachment::Detached(target) => {
                log::info!("initializing debug session");
                let debugger = Debugger::new(target, self.config.clone());
                self.attachment = Attachment::Attached(Box::new(debugger));
            }
            Attachment::Attached(debugger) => self.attachment = Attachment::Attached(debugger),
            Attachment::Vacant => log::warn!("initialize called on a session without a target"),
        }
    }

    /// Tears the debugger down: closes any trace file and drops its buffers
    /// and breakpoints. The target stays in the session, detached.
    ///
    /// Returns `true` when a debugger was attached.
    pub fn release(&mut self) -> bool {
        match std::mem::replace(&mut self.attachment, Attachment::Vacant) {
            Attachment::Attached(debugger) => {
                log::info!("releasing debug session");
                self.attachment = Attachment::Detached(debugger.release());
                true
            }
            other => {
                self.attachment = other;
                false
            }
        }
    }

    /// Releases any attached debugger and hands the target back.
    #[must_use]
    pub fn into_target(mut self) -> Option<T> {
        self.release();
        match self.attachment {
            Attachment::Detached(target) => Some(target),
            Attachment::Attached(_) | Attachment::Vacant => None,
        }
    }

    /// Returns `true` while a debugger is attached.
    #[must_use]
    pub const fn is_debugger_running(&self) -> bool {
        matches!(self.attachment, Attachment::Attached(_))
    }

    /// Attached debugger.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::NotInitialized`] when no debugger is attached.
    pub fn debugger(&self) -> Result<&Debugger<T>> {
        match &self.attachment {
            Attachment::Attached(debugger) => Ok(&**debugger),
            Attachment::Detached(_) | Attachment::Vacant => Err(DebuggerError::NotInitialized),
        }
    }

    /// Attached debugger, mutably.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::NotInitialized`] when no debugger is attached.
    pub fn debugger_mut(&mut self) -> Result<&mut Debugger<T>> {
        match &mut self.attachment {
            Attachment::Attached(debugger) => Ok(&mut **debugger),
            Attachment::Detached(_) | Attachment::Vacant => Err(DebuggerError::NotInitialized),
        }
    }

    /// Target, whether or not a debugger is attached.
    #[must_use]
    pub fn target(&self) -> Option<&T> {
        match &self.attachment {
            Attachment::Detached(target) => Some(target),
            Attachment::Attached(debugger) => Some(debugger.target()),
            Attachment::Vacant => None,
        }
    }

    /// Drives the emulation for up to `budget` instructions.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::NotInitialized`] when no debugger is attached.
    pub fn execute(&mut self, budget: u32) -> Result<RunOutcome> {
        Ok(self.debugger_mut()?.execute(budget))
    }

    /// Returns `true` unless the target is running freely.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::NotInitialized`] when no debugger is attached.
    pub fn is_execution_stopped(&self) -> Result<bool> {
        Ok(self.debugger()?.is_stopped())
    }

    /// Resumes free running.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::NotInitialized`] when no debugger is attached.
    pub fn resume_execution(&mut self) -> Result<()> {
        self.debugger_mut()?.run();
        Ok(())
    }

    /// Stops free running.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::NotInitialized`] when no debugger is attached.
    pub fn pause_execution(&mut self) -> Result<()> {
        self.debugger_mut()?.pause();
        Ok(())
    }

    /// Executes `count` instructions and stops.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::NotInitialized`] when no debugger is attached
    /// and [`DebuggerError::OutOfRange`] when `count` is zero.
    pub fn step(&mut self, count: u32) -> Result<StepReport> {
        self.debugger_mut()?.step(count)
    }

    /// Disassembly line at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::NotInitialized`] when no debugger is attached
    /// and [`DebuggerError::OutOfRange`] when `index` is not below the line count.
    pub fn disassembly_line_data(&mut self, index: u32) -> Result<CodeLineData> {
        self.debugger_mut()?.disassembly_line_data(to_usize(index))
    }

    /// Number of disassembly lines.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::NotInitialized`] when no debugger is attached.
    pub fn disassembly_line_count(&mut self) -> Result<u32> {
        Ok(to_u32(self.debugger_mut()?.disassembly_line_count()))
    }

    /// Index of the line covering `address`.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::NotInitialized`] when no debugger is attached.
    pub fn disassembly_line_index(&mut self, address: u32) -> Result<u32> {
        Ok(to_u32(self.debugger_mut()?.disassembly_line_index(address)))
    }

    /// Line index of the first match in `start..end`, or -1.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::NotInitialized`] when no debugger is attached.
    pub fn search_disassembly(
        &mut self,
        text: &str,
        start: u32,
        end: u32,
        backwards: bool,
    ) -> Result<i32> {
        let found = self.debugger_mut()?.search_disassembly(
            text,
            to_usize(start),
            to_usize(end),
            backwards,
        );
        Ok(found
            .and_then(|index| i32::try_from(index).ok())
            .unwrap_or(-1))
    }

    /// Applies trace options to future captures.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::NotInitialized`] when no debugger is attached.
    pub fn set_trace_options(&mut self, options: TraceLoggerOptions) -> Result<()> {
        self.debugger_mut()?.set_trace_options(options);
        Ok(())
    }

    /// Mirrors future trace records to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::NotInitialized`] when no debugger is attached
    /// and [`DebuggerError::Io`] when the file cannot be created.
    pub fn start_trace_logger(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.debugger_mut()?.start_trace_logger(path)
    }

    /// Flushes and closes the trace file.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::NotInitialized`] when no debugger is attached.
    pub fn stop_trace_logger(&mut self) -> Result<()> {
        self.debugger_mut()?.stop_trace_logger();
        Ok(())
    }

    /// The most recent `line_count` trace records, one per line.
    ///
    /// Lines are chronological: the oldest record of the window comes first
    /// and the last line is the instruction or event that retired most
    /// recently. Asking for more lines than are buffered returns them all.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::NotInitialized`] when no debugger is attached.
    pub fn execution_trace(&self, line_count: u32) -> Result<String> {
        Ok(self.debugger()?.execution_trace(to_usize(line_count)))
    }

    /// Evaluates `text` against the current state.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::NotInitialized`] when no debugger is attached
    /// and [`DebuggerError::Eval`] when evaluation fails.
    pub fn evaluate_expression(
        &mut self,
        text: &str,
        use_cache: bool,
    ) -> Result<(i32, EvalResultType)> {
        let result = self.debugger_mut()?.evaluate_expression(text, use_cache)?;
        Ok((result.value, result.kind))
    }

    /// Machine snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::NotInitialized`] when no debugger is attached.
    pub fn state(&self) -> Result<DebugState> {
        Ok(self.debugger()?.state())
    }

    /// Replaces a whole memory region.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::NotInitialized`] when no debugger is attached
    /// and [`DebuggerError::SizeMismatch`] when `data` is not the region size.
    pub fn set_memory_state(&mut self, memory_type: MemoryType, data: &[u8]) -> Result<()> {
        self.debugger_mut()?.set_memory_state(memory_type, data)
    }

    /// Size of a memory region in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::NotInitialized`] when no debugger is attached.
    pub fn memory_size(&self, memory_type: MemoryType) -> Result<u32> {
        Ok(to_u32(self.debugger()?.memory_size(memory_type)))
    }

    /// Copies a whole memory region into `out`.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::NotInitialized`] when no debugger is attached
    /// and [`DebuggerError::SizeMismatch`] when `out` is not the region size.
    pub fn memory_state(&self, memory_type: MemoryType, out: &mut [u8]) -> Result<()> {
        self.debugger()?.memory_state(memory_type, out)
    }

    /// Reads one byte without side effects.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::NotInitialized`] when no debugger is attached
    /// and [`DebuggerError::OutOfRange`] when `address` is outside the region.
    pub fn memory_value(&self, memory_type: MemoryType, address: u32) -> Result<u8> {
        self.debugger()?.memory_value(memory_type, address)
    }

    /// Writes one byte.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::NotInitialized`] when no debugger is attached
    /// and [`DebuggerError::OutOfRange`] when `address` is outside the region.
    pub fn set_memory_value(
        &mut self,
        memory_type: MemoryType,
        address: u32,
        value: u8,
    ) -> Result<()> {
        self.debugger_mut()?
            .set_memory_value(memory_type, address, value)
    }

    /// Writes `data` starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::NotInitialized`] when no debugger is attached
    /// and [`DebuggerError::OutOfRange`] when the span leaves the region.
    pub fn set_memory_values(
        &mut self,
        memory_type: MemoryType,
        address: u32,
        data: &[u8],
    ) -> Result<()> {
        self.debugger_mut()?
            .set_memory_values(memory_type, address, data)
    }
}
