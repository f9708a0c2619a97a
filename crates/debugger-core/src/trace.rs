//! Rolling execution history with optional file streaming.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::{
    DebugState, InstructionSet, InterruptKind, Result, TraceFormat, TraceLoggerOptions,
};

/// Payload of one captured trace record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceKind {
    /// A retired instruction.
    Instruction {
        /// Instruction bytes; only the first `len` are meaningful.
        bytes: [u8; 3],
        /// Instruction length.
        len: u8,
        /// Resolved operand address, when requested and applicable.
        effective_address: Option<u16>,
    },
    /// Interrupt handler entry.
    Interrupt {
        /// Interrupt source.
        kind: InterruptKind,
        /// Handler address loaded from the vector.
        handler: u32,
    },
    /// Write to a memory-mapped hardware register.
    RegisterWrite {
        /// Register address.
        address: u32,
        /// Value written.
        value: u8,
    },
}

/// One captured event with the machine state at capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceRecord {
    /// Capture order, starting at 0 and never reused.
    pub sequence: u64,
    /// Program counter the event is attributed to.
    pub pc: u32,
    /// Event payload.
    pub kind: TraceKind,
    /// Machine state when the event was captured.
    pub state: DebugState,
    /// Format flags in effect when the record was captured.
    pub format: TraceFormat,
}

impl TraceRecord {
    /// Renders the record as one line of text, without a line terminator.
    #[must_use]
    pub fn render(&self, isa: &dyn InstructionSet) -> String {
        let mut columns = vec![format!("{:04X}", self.pc)];
        match self.kind {
            TraceKind::Instruction {
                bytes,
                len,
                effective_address,
            } => {
                let bytes = &bytes[..usize::from(len).min(bytes.len())];
                if self.format.byte_code {
                    let hex: Vec<String> = bytes.iter().map(|byte| format!("{byte:02X}")).collect();
                    columns.push(format!("{:<8}", hex.join(" ")));
                }
                let mut text = match bytes.split_first() {
                    Some((&opcode, operand)) => isa.opcode(opcode).map_or_else(
                        || format!(".db ${opcode:02X}"),
                        |info| info.format(operand, self.pc),
                    ),
                    None => String::new(),
                };
                if let Some(address) = effective_address.filter(|_| self.format.effective_address) {
                    text.push_str(&format!(" [${address:04X}]"));
                }
                columns.push(format!("{text:<20}"));
            }
            TraceKind::Interrupt { kind, handler } => {
                columns.push(format!("[{}] -> ${handler:04X}", kind.label()));
            }
            TraceKind::RegisterWrite { address, value } => {
                columns.push(format!("[${address:04X}] <- ${value:02X}"));
            }
        }

        let cpu = &self.state.cpu;
        if self.format.registers {
            columns.push(format!(
                "A:{:02X} X:{:02X} Y:{:02X} S:{:02X} P:{}",
                cpu.a,
                cpu.x,
                cpu.y,
                cpu.sp,
                cpu.flags_string()
            ));
        }
        if self.format.cycle_count {
            columns.push(format!("CYC:{}", cpu.cycle_count));
        }
        if self.format.ppu_position {
            let ppu = &self.state.ppu;
            columns.push(format!("SL:{:>3} DOT:{:>3}", ppu.scanline, ppu.dot));
        }
        columns.join("  ").trim_end().to_owned()
    }
}

struct TraceFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

/// Fixed-capacity ring of trace records, optionally mirrored to a file.
pub struct TraceLogger {
    isa: &'static dyn InstructionSet,
    options: TraceLoggerOptions,
    capacity: usize,
    records: VecDeque<TraceRecord>,
    next_sequence: u64,
    file: Option<TraceFile>,
}

impl std::fmt::Debug for TraceLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceLogger")
            .field("options", &self.options)
            .field("capacity", &self.capacity)
            .field("len", &self.records.len())
            .field("next_sequence", &self.next_sequence)
            .field("file", &self.log_path())
            .finish_non_exhaustive()
    }
}

impl TraceLogger {
    /// Creates an empty logger retaining at most `capacity` records.
    #[must_use]
    pub fn new(
        isa: &'static dyn InstructionSet,
        capacity: usize,
        options: TraceLoggerOptions,
    ) -> Self {
        Self {
            isa,
            options,
            capacity,
            records: VecDeque::with_capacity(capacity.min(4096)),
            next_sequence: 0,
            file: None,
        }
    }

    /// Options applied to future captures.
    #[must_use]
    pub const fn options(&self) -> TraceLoggerOptions {
        self.options
    }

    /// Replaces the options; records already captured keep their format.
    pub fn set_options(&mut self, options: TraceLoggerOptions) {
        self.options = options;
    }

    /// Maximum number of retained records.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Changes the capacity, evicting the oldest records if needed.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.records.len() > capacity {
            self.records.pop_front();
        }
    }

    /// Number of retained records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` when no record is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Retained records, oldest first.
    pub fn records(&self) -> impl Iterator<Item = &TraceRecord> + '_ {
        self.records.iter()
    }

    /// Empties the ring. File logging and sequence numbering continue.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Starts streaming accepted records to `path`, closing any previous file first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DebuggerError::Io`] when the file cannot be created.
    /// Ring capture is unaffected either way.
    pub fn start_logging(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.stop_logging();
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        log::info!("trace logging started: {}", path.display());
        self.file = Some(TraceFile {
            path,
            writer: BufWriter::new(file),
        });
        Ok(())
    }

    /// Flushes and closes the trace file, if any. The ring is untouched.
    pub fn stop_logging(&mut self) {
        if let Some(mut file) = self.file.take() {
            if let Err(err) = file.writer.flush() {
                log::warn!("trace file {} flush failed: {err}", file.path.display());
            }
            log::info!("trace logging stopped: {}", file.path.display());
        }
    }

    /// Returns `true` while records are streamed to a file.
    #[must_use]
    pub const fn is_logging(&self) -> bool {
        self.file.is_some()
    }

    /// Path of the active trace file.
    #[must_use]
    pub fn log_path(&self) -> Option<&Path> {
        self.file.as_ref().map(|file| file.path.as_path())
    }

    /// Returns `true` when captured instructions should carry an effective address.
    #[must_use]
    pub const fn wants_effective_address(&self) -> bool {
        self.options.categories.instructions && self.options.format.effective_address
    }

    /// Captures a retired instruction using the state from before it executed.
    pub fn log_instruction(
        &mut self,
        pc: u32,
        bytes: &[u8],
        state: &DebugState,
        effective_address: Option<u16>,
    ) {
        if !self.options.categories.instructions {
            return;
        }
        let mut raw = [0; 3];
        let len = bytes.len().min(raw.len());
        raw[..len].copy_from_slice(&bytes[..len]);
        self.push(
            pc,
            TraceKind::Instruction {
                bytes: raw,
                len: u8::try_from(len).unwrap_or(3),
                effective_address,
            },
            state,
        );
    }

    /// Captures an interrupt handler entry.
    pub fn log_interrupt(
        &mut self,
        kind: InterruptKind,
        return_address: u32,
        handler: u32,
        state: &DebugState,
    ) {
        if self.options.categories.interrupts {
            self.push(return_address, TraceKind::Interrupt { kind, handler }, state);
        }
    }

    /// Captures a hardware register write made by the instruction at `pc`.
    pub fn log_register_write(&mut self, pc: u32, address: u32, value: u8, state: &DebugState) {
        if self.options.categories.register_writes {
            self.push(pc, TraceKind::RegisterWrite { address, value }, state);
        }
    }

    /// Renders the most recent `line_count` records, oldest first, one per line.
    #[must_use]
    pub fn execution_trace(&self, line_count: usize) -> String {
        let skip = self.records.len().saturating_sub(line_count);
        let mut out = String::new();
        for record in self.records.iter().skip(skip) {
            out.push_str(&record.render(self.isa));
            out.push('\n');
        }
        out
    }

    fn push(&mut self, pc: u32, kind: TraceKind, state: &DebugState) {
        let record = TraceRecord {
            sequence: self.next_sequence,
            pc,
            kind,
            state: *state,
            format: self.options.format,
        };
        self.next_sequence += 1;

        if let Some(file) = self.file.as_mut() {
            if let Err(err) = writeln!(file.writer, "{}", record.render(self.isa)) {
                log::warn!(
                    "trace file {} write failed, file logging stopped: {err}",
                    file.path.display()
                );
                self.file = None;
            }
        }

        if self.capacity == 0 {
            return;
        }
        if self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }
}

impl Drop for TraceLogger {
    fn drop(&mut self) {
        self.stop_logging();
    }
}
