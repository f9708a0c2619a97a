//! Execution control, breakpoints and the views a debugger front end queries.

use std::ops::Range;
use std::path::Path;

use crate::{
    BreakReason, Breakpoint, BreakpointSet, BusAccess, CodeLineData, CodeVersion, DebugState,
    DebugTarget, DebuggerConfig, DebuggerError, Disassembler, EvalContext, EvalError, EvalResult,
    ExecutionHandle, ExecutionState, ExpressionEvaluator, MemoryDumper, MemoryType, Result,
    StepOutcome, TraceEvent, TraceLogger, TraceLoggerOptions,
};

/// Result of a bounded [`Debugger::execute`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunOutcome {
    /// Instructions retired during the call.
    pub instructions: u32,
    /// Why execution stopped, or `None` when the budget ran out while running.
    pub stop: Option<BreakReason>,
}

/// Result of a [`Debugger::step`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepReport {
    /// Instructions retired; fewer than requested when a breakpoint or jam intervened.
    pub instructions: u32,
    /// [`BreakReason::Step`] when the full count ran.
    pub reason: BreakReason,
}

/// Outcome of advancing the target by one instruction boundary.
enum Advance {
    /// An instruction retired; `hit` names a read/write breakpoint it triggered.
    Retired { hit: Option<u32> },
    /// An execute breakpoint matched before the instruction ran.
    Blocked(u32),
    /// The CPU cannot make progress.
    Jammed,
}

/// Instruction-level debugger owning an emulation target.
///
/// The debugger is driven by one emulation context through [`Debugger::execute`]
/// and [`Debugger::step`]; other threads observe it through an
/// [`ExecutionHandle`].
pub struct Debugger<T: DebugTarget> {
    target: T,
    config: DebuggerConfig,
    handle: ExecutionHandle,
    breakpoints: BreakpointSet,
    dumper: MemoryDumper<T>,
    disassembler: Disassembler,
    code_version: CodeVersion,
    trace: TraceLogger,
    evaluator: ExpressionEvaluator,
    last_break: Option<BreakReason>,
    instructions_retired: u64,
    resume_pc: Option<u32>,
    events: Vec<TraceEvent>,
}

impl<T: DebugTarget> std::fmt::Debug for Debugger<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debugger")
            .field("state", &self.handle.state())
            .field("last_break", &self.last_break)
            .field("instructions_retired", &self.instructions_retired)
            .field("breakpoints", &self.breakpoints.len())
            .field("trace", &self.trace)
            .finish_non_exhaustive()
    }
}

impl<T: DebugTarget> Debugger<T> {
    /// Attaches to `target`.
    #[must_use]
    pub fn new(target: T, config: DebuggerConfig) -> Self {
        let isa = target.instruction_set();
        let range = config
            .disassembly_range
            .clone()
            .unwrap_or_else(|| target.code_range());
        let initial = if config.start_stopped {
            ExecutionState::Stopped
        } else {
            ExecutionState::Running
        };
        log::info!(
            "debugger attached to {} target, disassembling {range:#x?}",
            isa.name()
        );
        Self {
            dumper: MemoryDumper::new(target.memory_spaces()),
            disassembler: Disassembler::new(isa, range.clone()),
            code_version: CodeVersion::new(range),
            trace: TraceLogger::new(isa, config.trace_capacity, config.trace_options),
            handle: ExecutionHandle::new(initial),
            breakpoints: BreakpointSet::new(),
            evaluator: ExpressionEvaluator::new(),
            last_break: None,
            instructions_retired: 0,
            resume_pc: None,
            events: Vec::new(),
            target,
            config,
        }
    }

    /// Configuration the debugger was attached with.
    #[must_use]
    pub const fn config(&self) -> &DebuggerConfig {
        &self.config
    }

    /// Observed target.
    #[must_use]
    pub const fn target(&self) -> &T {
        &self.target
    }

    /// Detaches and returns the target, closing any open trace file.
    pub fn release(mut self) -> T {
        self.trace.stop_logging();
        log::info!(
            "debugger released after {} instructions",
            self.instructions_retired
        );
        self.target
    }

    /// Cross-thread view of the execution state.
    #[must_use]
    pub fn handle(&self) -> ExecutionHandle {
        self.handle.clone()
    }

    /// Current execution state.
    #[must_use]
    pub fn execution_state(&self) -> ExecutionState {
        self.handle.state()
    }

    /// Returns `true` unless the target is running freely.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.handle.is_stopped()
    }

    /// Why execution last stopped.
    #[must_use]
    pub const fn last_break(&self) -> Option<BreakReason> {
        self.last_break
    }

    /// Instructions retired under this debugger.
    #[must_use]
    pub const fn instructions_retired(&self) -> u64 {
        self.instructions_retired
    }

    /// Resumes free running. The breakpoint at the current PC does not fire
    /// again until execution leaves it.
    pub fn run(&mut self) {
        if !self.handle.is_stopped() {
            return;
        }
        let pc = self.target.program_counter();
        self.resume_pc = Some(pc);
        self.handle.set_state(ExecutionState::Running);
        log::debug!("resumed at ${pc:04X}");
    }

    /// Stops free running.
    pub fn pause(&mut self) {
        if !self.handle.is_stopped() {
            self.stop(BreakReason::Pause);
        }
    }

    /// Executes up to `budget` instructions while running.
    ///
    /// Returns early when a breakpoint matches, a break was requested through
    /// a handle, or the CPU jams. Nothing executes while stopped.
    pub fn execute(&mut self, budget: u32) -> RunOutcome {
        let mut instructions = 0;
        if self.handle.state() != ExecutionState::Running {
            return RunOutcome {
                instructions,
                stop: None,
            };
        }
        let stop = loop {
            if self.handle.take_break_request() {
                break Some(BreakReason::Pause);
            }
            if instructions == budget {
                break None;
            }
            let skip = self.resume_pc.take();
            match self.advance(skip) {
                Advance::Retired { hit: None } => instructions += 1,
                Advance::Retired { hit: Some(id) } => {
                    instructions += 1;
                    break Some(BreakReason::Breakpoint(id));
                }
                Advance::Blocked(id) => break Some(BreakReason::Breakpoint(id)),
                Advance::Jammed if self.config.break_on_jam => break Some(BreakReason::CpuJam),
                Advance::Jammed => break None,
            }
        };
        if let Some(reason) = stop {
            self.stop(reason);
        }
        RunOutcome { instructions, stop }
    }

    /// Executes exactly `count` instructions, stopping early on a breakpoint
    /// or CPU jam, and leaves execution stopped.
    ///
    /// The execute breakpoint at the starting PC is ignored for the first
    /// instruction.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::OutOfRange`] when `count` is zero.
    pub fn step(&mut self, count: u32) -> Result<StepReport> {
        if count == 0 {
            return Err(DebuggerError::out_of_range(
                "step count",
                count,
                1..u64::from(u32::MAX) + 1,
            ));
        }
        self.handle.set_state(ExecutionState::Stepping);
        self.resume_pc = None;
        let mut skip = Some(self.target.program_counter());
        let mut instructions = 0;
        let reason = loop {
            if instructions == count {
                break BreakReason::Step;
            }
            match self.advance(skip.take()) {
                Advance::Retired { hit: None } => instructions += 1,
                Advance::Retired { hit: Some(id) } => {
                    instructions += 1;
                    break BreakReason::Breakpoint(id);
                }
                Advance::Blocked(id) => break BreakReason::Breakpoint(id),
                Advance::Jammed => break BreakReason::CpuJam,
            }
        };
        self.stop(reason);
        Ok(StepReport {
            instructions,
            reason,
        })
    }

    fn stop(&mut self, reason: BreakReason) {
        self.handle.set_state(ExecutionState::Stopped);
        self.last_break = Some(reason);
        self.resume_pc = None;
        log::debug!(
            "stopped at ${:04X}: {reason:?}",
            self.target.program_counter()
        );
    }

    fn advance(&mut self, skip_execute_at: Option<u32>) -> Advance {
        self.events.clear();
        self.target.service_interrupts(&mut self.events);
        if !self.events.is_empty() {
            let pc = self.target.program_counter();
            self.absorb_events(pc, false);
            self.evaluator.invalidate();
        }

        let pc = self.target.program_counter();
        if skip_execute_at != Some(pc) {
            if let Some(id) = self.check_execute(pc) {
                return Advance::Blocked(id);
            }
        }

        let pre_state = self.snapshot();
        let (bytes, len) = self.instruction_bytes(pc);
        let effective_address = if self.trace.wants_effective_address() {
            self.effective_address(&bytes[..len], &pre_state)
        } else {
            None
        };

        self.events.clear();
        match self.target.execute_instruction(&mut self.events) {
            StepOutcome::Jammed { pc } => {
                log::debug!("cpu jammed at ${pc:04X}");
                Advance::Jammed
            }
            StepOutcome::Retired { pc, .. } => {
                self.instructions_retired += 1;
                self.trace
                    .log_instruction(pc, &bytes[..len], &pre_state, effective_address);
                let hit = self.absorb_events(pc, true);
                self.evaluator.invalidate();
                Advance::Retired { hit }
            }
        }
    }

    /// Feeds collected target events to the trace, code-version tracking and
    /// access breakpoints. Returns the first access breakpoint hit.
    fn absorb_events(&mut self, pc: u32, check_breakpoints: bool) -> Option<u32> {
        let events = std::mem::take(&mut self.events);
        let state = self.snapshot();
        let mut hit = None;
        for event in &events {
            let access = match *event {
                TraceEvent::MemoryRead { address, value } => BusAccess::Read { address, value },
                TraceEvent::MemoryWrite { address, value } => {
                    if self.target.is_executable(address) {
                        let code = &mut self.code_version;
                        self.target
                            .code_aliases(address, &mut |alias| code.mark_written(alias));
                    }
                    BusAccess::Write { address, value }
                }
                TraceEvent::RegisterWrite { address, value } => {
                    self.trace.log_register_write(pc, address, value, &state);
                    continue;
                }
                TraceEvent::Interrupt {
                    kind,
                    return_address,
                    handler,
                } => {
                    self.trace
                        .log_interrupt(kind, return_address, handler, &state);
                    continue;
                }
            };
            if check_breakpoints && hit.is_none() {
                hit = self.check_access(access, &state);
            }
        }
        self.events = events;
        hit
    }

    fn check_execute(&mut self, pc: u32) -> Option<u32> {
        let context = MachineContext {
            target: &self.target,
            dumper: &self.dumper,
            state: self.snapshot(),
            access: None,
        };
        let evaluator = &mut self.evaluator;
        let hit = self
            .breakpoints
            .execute_candidates(pc)
            .find(|breakpoint| condition_holds(evaluator, &context, breakpoint))
            .map(|breakpoint| breakpoint.id);
        if let Some(id) = hit {
            self.breakpoints.record_hit(id);
        }
        hit
    }

    fn check_access(&mut self, access: BusAccess, state: &DebugState) -> Option<u32> {
        if !self.breakpoints.has_access_breakpoints() {
            return None;
        }
        let context = MachineContext {
            target: &self.target,
            dumper: &self.dumper,
            state: *state,
            access: Some(access),
        };
        let evaluator = &mut self.evaluator;
        let hit = self
            .breakpoints
            .access_candidates(access)
            .find(|breakpoint| condition_holds(evaluator, &context, breakpoint))
            .map(|breakpoint| breakpoint.id);
        if let Some(id) = hit {
            self.breakpoints.record_hit(id);
        }
        hit
    }

    fn peek_cpu(&self, address: u32) -> u8 {
        peek_cpu(&self.dumper, &self.target, address)
    }

    fn instruction_bytes(&self, pc: u32) -> ([u8; 3], usize) {
        let opcode = self.peek_cpu(pc);
        let len = self
            .target
            .instruction_set()
            .opcode(opcode)
            .map_or(1, |info| usize::from(info.len()));
        let mut bytes = [0; 3];
        for (slot, address) in bytes.iter_mut().take(len).zip(pc..) {
            *slot = self.peek_cpu(address);
        }
        (bytes, len)
    }

    fn effective_address(&self, bytes: &[u8], state: &DebugState) -> Option<u16> {
        let (&opcode, operand) = bytes.split_first()?;
        let info = self.target.instruction_set().opcode(opcode)?;
        info.mode
            .effective_address(operand, state.cpu.x, state.cpu.y, |address| {
                self.peek_cpu(u32::from(address))
            })
    }

    fn snapshot(&self) -> DebugState {
        let mut state = self.target.debug_state();
        state.instruction_count = self.instructions_retired;
        state
    }

    /// Machine snapshot with the debugger's instruction count.
    #[must_use]
    pub fn state(&self) -> DebugState {
        self.snapshot()
    }

    /// Evaluates `text` against the current state.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError`] for malformed text, unknown identifiers and
    /// division by zero.
    pub fn evaluate_expression(
        &mut self,
        text: &str,
        use_cache: bool,
    ) -> std::result::Result<EvalResult, EvalError> {
        let context = MachineContext {
            target: &self.target,
            dumper: &self.dumper,
            state: self.snapshot(),
            access: None,
        };
        self.evaluator.evaluate(text, &context, use_cache)
    }

    /// Replaces every breakpoint.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::Eval`] when a condition does not parse; the
    /// existing breakpoints are kept.
    pub fn set_breakpoints(&mut self, breakpoints: Vec<Breakpoint>) -> Result<()> {
        for breakpoint in &breakpoints {
            self.validate_condition(breakpoint)?;
        }
        log::debug!("installing {} breakpoints", breakpoints.len());
        self.breakpoints.replace(breakpoints);
        Ok(())
    }

    /// Adds or replaces a breakpoint and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::Eval`] when the condition does not parse.
    pub fn add_breakpoint(&mut self, breakpoint: Breakpoint) -> Result<u32> {
        self.validate_condition(&breakpoint)?;
        Ok(self.breakpoints.insert(breakpoint))
    }

    /// Removes the breakpoint with `id`.
    pub fn remove_breakpoint(&mut self, id: u32) -> Option<Breakpoint> {
        self.breakpoints.remove(id)
    }

    /// Removes every breakpoint.
    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    /// Installed breakpoints.
    #[must_use]
    pub fn breakpoints(&self) -> &[Breakpoint] {
        self.breakpoints.as_slice()
    }

    /// Id not used by any breakpoint added so far.
    #[must_use]
    pub const fn next_breakpoint_id(&self) -> u32 {
        self.breakpoints.next_id()
    }

    fn validate_condition(&mut self, breakpoint: &Breakpoint) -> Result<()> {
        if let Some(condition) = breakpoint.condition.as_deref() {
            self.evaluator.validate(condition)?;
        }
        Ok(())
    }

    /// Disassembly brought up to date with every code write so far.
    pub fn disassembly(&mut self) -> &Disassembler {
        let (dumper, target) = (&self.dumper, &self.target);
        self.disassembler
            .refresh(&mut self.code_version, |address| peek_cpu(dumper, target, address));
        &self.disassembler
    }

    /// Number of disassembly lines.
    pub fn disassembly_line_count(&mut self) -> usize {
        self.disassembly().line_count()
    }

    /// Disassembly line at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::OutOfRange`] when `index` is not below the line count.
    pub fn disassembly_line_data(&mut self, index: usize) -> Result<CodeLineData> {
        self.disassembly().line_data(index)
    }

    /// Index of the line covering `address`.
    pub fn disassembly_line_index(&mut self, address: u32) -> usize {
        self.disassembly().line_index(address)
    }

    /// First line in `start..end` whose text contains `needle`.
    pub fn search_disassembly(
        &mut self,
        needle: &str,
        start: usize,
        end: usize,
        backwards: bool,
    ) -> Option<usize> {
        self.disassembly().search_code(needle, start, end, backwards)
    }

    /// Names `address`; the next disassembly rebuilds fully.
    pub fn set_label(&mut self, address: u32, name: impl Into<String>) {
        self.disassembler.set_label(address, name);
    }

    /// Removes the label at `address`.
    pub fn remove_label(&mut self, address: u32) -> Option<String> {
        self.disassembler.remove_label(address)
    }

    /// Renders `range` as data rows instead of instructions.
    pub fn mark_data(&mut self, range: Range<u32>) {
        self.disassembler.mark_data(range);
    }

    /// Drops every data mark.
    pub fn clear_data_marks(&mut self) {
        self.disassembler.clear_data_marks();
    }

    /// Code-write tracking shared by the bus and the memory dumper.
    #[must_use]
    pub const fn code_version(&self) -> &CodeVersion {
        &self.code_version
    }

    /// Trace ring and file sink.
    #[must_use]
    pub const fn trace_logger(&self) -> &TraceLogger {
        &self.trace
    }

    /// Mutable access to the trace ring and file sink.
    pub fn trace_logger_mut(&mut self) -> &mut TraceLogger {
        &mut self.trace
    }

    /// Applies trace options to future captures.
    pub fn set_trace_options(&mut self, options: TraceLoggerOptions) {
        self.trace.set_options(options);
    }

    /// Mirrors future trace records to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::Io`] when the file cannot be created.
    pub fn start_trace_logger(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.trace.start_logging(path)
    }

    /// Flushes and closes the trace file.
    pub fn stop_trace_logger(&mut self) {
        self.trace.stop_logging();
    }

    /// The most recent `line_count` trace records in chronological order,
    /// so the newest record is the last line.
    #[must_use]
    pub fn execution_trace(&self, line_count: usize) -> String {
        self.trace.execution_trace(line_count)
    }

    /// Size of the memory region in bytes; 0 when the target lacks it.
    #[must_use]
    pub fn memory_size(&self, memory_type: MemoryType) -> usize {
        self.dumper.memory_size(&self.target, memory_type)
    }

    /// Copies the whole region into `out`.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::SizeMismatch`] when `out` is not exactly the region size.
    pub fn memory_state(&self, memory_type: MemoryType, out: &mut [u8]) -> Result<()> {
        self.dumper.memory_state(&self.target, memory_type, out)
    }

    /// Copies the whole region into a new buffer.
    #[must_use]
    pub fn memory_state_vec(&self, memory_type: MemoryType) -> Vec<u8> {
        self.dumper.memory_state_vec(&self.target, memory_type)
    }

    /// Replaces the whole region.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::SizeMismatch`] when `data` is not exactly the region size.
    pub fn set_memory_state(&mut self, memory_type: MemoryType, data: &[u8]) -> Result<()> {
        self.dumper
            .set_memory_state(&mut self.target, memory_type, data, &mut self.code_version)?;
        self.mark_cpu_mirrors(memory_type, 0, data.len());
        self.evaluator.invalidate();
        Ok(())
    }

    /// Reads one byte without side effects.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::OutOfRange`] when `address` is outside the region.
    pub fn memory_value(&self, memory_type: MemoryType, address: u32) -> Result<u8> {
        self.dumper.memory_value(&self.target, memory_type, address)
    }

    /// Writes one byte.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::OutOfRange`] when `address` is outside the region.
    pub fn set_memory_value(
        &mut self,
        memory_type: MemoryType,
        address: u32,
        value: u8,
    ) -> Result<()> {
        self.dumper.set_memory_value(
            &mut self.target,
            memory_type,
            address,
            value,
            &mut self.code_version,
        )?;
        self.mark_cpu_mirrors(memory_type, address, 1);
        self.evaluator.invalidate();
        Ok(())
    }

    /// Writes `data` starting at `address`, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::OutOfRange`] when the span leaves the region;
    /// nothing is written in that case.
    pub fn set_memory_values(
        &mut self,
        memory_type: MemoryType,
        address: u32,
        data: &[u8],
    ) -> Result<()> {
        self.dumper.set_memory_values(
            &mut self.target,
            memory_type,
            address,
            data,
            &mut self.code_version,
        )?;
        self.mark_cpu_mirrors(memory_type, address, data.len());
        self.evaluator.invalidate();
        Ok(())
    }

    /// Invalidates every mirror of a CPU-view span that was just patched.
    fn mark_cpu_mirrors(&mut self, memory_type: MemoryType, start: u32, len: usize) {
        if memory_type != MemoryType::CpuMemory {
            return;
        }
        let code = &mut self.code_version;
        for address in (start..).take(len) {
            self.target
                .code_aliases(address, &mut |alias| code.mark_written(alias));
        }
    }
}

fn peek_cpu<T>(dumper: &MemoryDumper<T>, target: &T, address: u32) -> u8 {
    dumper
        .memory_value(target, MemoryType::CpuMemory, address)
        .unwrap_or(0)
}

/// Evaluation context over a target snapshot, optionally inside a bus access.
struct MachineContext<'a, T> {
    target: &'a T,
    dumper: &'a MemoryDumper<T>,
    state: DebugState,
    access: Option<BusAccess>,
}

impl<T> EvalContext for MachineContext<'_, T> {
    #[allow(clippy::cast_possible_wrap)]
    fn resolve(&self, name: &str) -> Option<i32> {
        match name {
            "address" => self.access.map(|access| access.address() as i32),
            "value" => self.access.map(|access| i32::from(access.value())),
            _ => self.state.resolve(name),
        }
    }

    fn read_byte(&self, address: u32) -> u8 {
        peek_cpu(self.dumper, self.target, address)
    }
}

fn condition_holds<T>(
    evaluator: &mut ExpressionEvaluator,
    context: &MachineContext<'_, T>,
    breakpoint: &Breakpoint,
) -> bool {
    let Some(condition) = breakpoint.condition.as_deref() else {
        return true;
    };
    match evaluator.evaluate(condition, context, false) {
        Ok(result) => result.is_truthy(),
        Err(error) => {
            log::warn!(
                "breakpoint {} condition `{condition}` failed, breaking anyway: {error}",
                breakpoint.id
            );
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Debugger;
    use crate::machine::ReferenceMachine;
    use crate::{
        BreakReason, Breakpoint, BreakpointKind, DebuggerConfig, DebuggerError, ExecutionState,
        MemoryType,
    };

    // $8000 LDX #$00
    // $8002 INX
    // $8003 STX $10
    // $8005 JMP $8002
    const COUNTER: [u8; 8] = [0xA2, 0x00, 0xE8, 0x86, 0x10, 0x4C, 0x02, 0x80];

    fn debugger() -> Debugger<ReferenceMachine> {
        Debugger::new(
            ReferenceMachine::with_program(&COUNTER),
            DebuggerConfig::default(),
        )
    }

    #[test]
    fn step_zero_is_rejected() {
        let mut debugger = debugger();
        assert!(matches!(
            debugger.step(0),
            Err(DebuggerError::OutOfRange { value: 0, .. })
        ));
        assert_eq!(debugger.execution_state(), ExecutionState::Running);
    }

    #[test]
    fn step_runs_exact_count_and_stops() {
        let mut debugger = debugger();
        let report = debugger.step(4).unwrap();
        assert_eq!(report.instructions, 4);
        assert_eq!(report.reason, BreakReason::Step);
        assert!(debugger.is_stopped());
        assert_eq!(debugger.state().cpu.pc, 0x8002);
        assert_eq!(debugger.state().instruction_count, 4);
        assert_eq!(debugger.last_break(), Some(BreakReason::Step));
    }

    #[test]
    fn execute_does_nothing_while_stopped() {
        let mut debugger = debugger();
        debugger.pause();
        let outcome = debugger.execute(100);
        assert_eq!(outcome.instructions, 0);
        assert_eq!(debugger.instructions_retired(), 0);
    }

    #[test]
    fn execute_breakpoint_stops_before_instruction_and_resume_skips_it() {
        let mut debugger = debugger();
        debugger.add_breakpoint(Breakpoint::execute(1, 0x8003)).unwrap();

        let outcome = debugger.execute(100);
        assert_eq!(outcome.stop, Some(BreakReason::Breakpoint(1)));
        assert_eq!(outcome.instructions, 2);
        assert_eq!(debugger.state().cpu.pc, 0x8003);

        debugger.run();
        let outcome = debugger.execute(100);
        assert_eq!(outcome.stop, Some(BreakReason::Breakpoint(1)));
        assert_eq!(outcome.instructions, 3);
        assert_eq!(debugger.memory_value(MemoryType::WorkRam, 0x10).unwrap(), 1);
        assert_eq!(debugger.breakpoints()[0].hit_count, 2);
    }

    #[test]
    fn write_breakpoint_condition_sees_access_value() {
        let mut debugger = debugger();
        debugger
            .add_breakpoint(
                Breakpoint::new(3, BreakpointKind::Write, 0x10).with_condition("value == 3"),
            )
            .unwrap();
        let outcome = debugger.execute(1_000);
        assert_eq!(outcome.stop, Some(BreakReason::Breakpoint(3)));
        assert_eq!(debugger.state().cpu.x, 3);
        assert_eq!(debugger.state().cpu.pc, 0x8005);
    }

    #[test]
    fn malformed_condition_is_rejected_up_front() {
        let mut debugger = debugger();
        let result =
            debugger.add_breakpoint(Breakpoint::execute(1, 0x8000).with_condition("x =="));
        assert!(matches!(result, Err(DebuggerError::Eval(_))));
        assert!(debugger.breakpoints().is_empty());
    }

    #[test]
    fn condition_failing_at_runtime_counts_as_hit() {
        let mut debugger = debugger();
        debugger
            .add_breakpoint(Breakpoint::execute(2, 0x8002).with_condition("x / 0"))
            .unwrap();
        let outcome = debugger.execute(10);
        assert_eq!(outcome.stop, Some(BreakReason::Breakpoint(2)));
    }

    #[test]
    fn break_request_from_handle_pauses_execution() {
        let mut debugger = debugger();
        debugger.handle().request_break();
        let outcome = debugger.execute(10);
        assert_eq!(outcome.stop, Some(BreakReason::Pause));
        assert_eq!(outcome.instructions, 0);
        assert!(debugger.is_stopped());
    }

    #[test]
    fn jam_stops_execution() {
        let mut debugger = Debugger::new(
            ReferenceMachine::with_program(&[0xEA, 0x02]),
            DebuggerConfig::default(),
        );
        let outcome = debugger.execute(10);
        assert_eq!(outcome.stop, Some(BreakReason::CpuJam));
        assert_eq!(outcome.instructions, 1);
    }

    #[test]
    fn expressions_see_instruction_count_and_memory() {
        let mut debugger = debugger();
        debugger.step(3).unwrap();
        let result = debugger.evaluate_expression("[$10] == 1 && instructions == 3", true);
        assert!(result.unwrap().is_truthy());
        assert_eq!(
            debugger.evaluate_expression("{$FFFC}", false).unwrap().value,
            0x8000
        );
    }

    #[test]
    fn release_returns_target() {
        let mut debugger = debugger();
        debugger.step(1).unwrap();
        let machine = debugger.release();
        assert_eq!(machine.cpu().state().x, 0);
        assert_eq!(machine.cpu().pc(), 0x8002);
    }
}
