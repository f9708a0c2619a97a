//! Linear-sweep disassembly into addressable display lines.
//!
//! The disassembler decodes a CPU address range once and keeps an ordered
//! list of lines. Writes to that range are recorded in a [`CodeVersion`];
//! on the next refresh only the stale span is decoded again, starting at
//! the line covering the first dirty byte and stopping once the new decode
//! lands on an old line boundary past the dirty range.

use std::collections::BTreeMap;
use std::mem;
use std::ops::Range;

use crate::{DebuggerError, InstructionSet, Result};

/// Maximum number of bytes shown on one `.db` data line.
pub const MAX_DATA_LINE_BYTES: usize = 8;

const MAX_DIRTY_RANGES: usize = 32;

/// Write tracker for executable memory.
///
/// The version increases on every write that lands in the watched range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeVersion {
    watched: Range<u32>,
    version: u64,
    dirty: Vec<Range<u32>>,
    full: bool,
}

enum PendingDecode {
    Full,
    Ranges(Vec<Range<u32>>),
}

impl CodeVersion {
    /// Creates a tracker for writes inside `watched`.
    #[must_use]
    pub const fn new(watched: Range<u32>) -> Self {
        Self {
            watched,
            version: 0,
            dirty: Vec::new(),
            full: false,
        }
    }

    /// Address range whose writes are tracked.
    #[must_use]
    pub fn watched(&self) -> Range<u32> {
        self.watched.clone()
    }

    /// Current version number.
    #[must_use]
    pub const fn current(&self) -> u64 {
        self.version
    }

    /// Records a one-byte write.
    pub fn mark_written(&mut self, address: u32) {
        self.mark_range(address..address.saturating_add(1));
    }

    /// Records a write covering `range`; the part outside the watched range is ignored.
    pub fn mark_range(&mut self, range: Range<u32>) {
        let start = range.start.max(self.watched.start);
        let end = range.end.min(self.watched.end);
        if start >= end {
            return;
        }
        self.version += 1;
        if self.full {
            return;
        }
        if let Some(last) = self.dirty.last_mut() {
            if start <= last.end && last.start <= end {
                last.start = last.start.min(start);
                last.end = last.end.max(end);
                return;
            }
        }
        self.dirty.push(start..end);
        if self.dirty.len() > MAX_DIRTY_RANGES {
            self.full = true;
            self.dirty.clear();
        }
    }

    /// Records a change that requires the whole range to be decoded again.
    pub fn mark_all(&mut self) {
        self.version += 1;
        self.full = true;
        self.dirty.clear();
    }

    /// Returns `true` when the next refresh must decode the whole range.
    #[must_use]
    pub const fn has_pending_full_rebuild(&self) -> bool {
        self.full
    }

    /// Dirty ranges waiting for the next refresh.
    #[must_use]
    pub fn pending_ranges(&self) -> &[Range<u32>] {
        &self.dirty
    }

    fn take_pending(&mut self) -> PendingDecode {
        if mem::take(&mut self.full) {
            self.dirty.clear();
            PendingDecode::Full
        } else {
            PendingDecode::Ranges(mem::take(&mut self.dirty))
        }
    }
}

/// Classification of a disassembly line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum LineKind {
    /// A decoded instruction.
    Code,
    /// A zero-width label preceding the line it names.
    Label,
    /// Bytes explicitly marked as data.
    Data,
    /// A single byte whose opcode is not recognized.
    Unknown,
}

/// One disassembly line as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CodeLineData {
    /// CPU address of the first byte.
    pub address: u32,
    /// Raw bytes covered by the line; empty for labels.
    pub bytes: Vec<u8>,
    /// Rendered mnemonic and operands, `.db` list, or `name:` label.
    pub text: String,
    /// Line classification.
    pub kind: LineKind,
}

impl CodeLineData {
    /// Returns `true` for label lines.
    #[must_use]
    pub fn is_label(&self) -> bool {
        self.kind == LineKind::Label
    }

    /// Returns `true` for lines that show bytes as data instead of code.
    #[must_use]
    pub fn is_data(&self) -> bool {
        matches!(self.kind, LineKind::Data | LineKind::Unknown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineEntry {
    address: u32,
    len: u8,
    bytes: [u8; MAX_DATA_LINE_BYTES],
    kind: LineKind,
}

impl LineEntry {
    const fn label(address: u32) -> Self {
        Self {
            address,
            len: 0,
            bytes: [0; MAX_DATA_LINE_BYTES],
            kind: LineKind::Label,
        }
    }

    fn end(&self) -> u32 {
        self.address + u32::from(self.len)
    }

    fn bytes(&self) -> &[u8] {
        &self.bytes[..usize::from(self.len)]
    }
}

/// Address-indexed disassembly of one CPU address range.
pub struct Disassembler {
    isa: &'static dyn InstructionSet,
    range: Range<u32>,
    lines: Vec<LineEntry>,
    labels: BTreeMap<u32, String>,
    data_marks: Vec<Range<u32>>,
    decoded_version: Option<u64>,
}

impl std::fmt::Debug for Disassembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disassembler")
            .field("isa", &self.isa.name())
            .field("range", &self.range)
            .field("lines", &self.lines.len())
            .field("labels", &self.labels.len())
            .field("decoded_version", &self.decoded_version)
            .finish_non_exhaustive()
    }
}

impl Disassembler {
    /// Creates an empty disassembler for `range`; nothing is decoded until the first refresh.
    #[must_use]
    pub fn new(isa: &'static dyn InstructionSet, range: Range<u32>) -> Self {
        Self {
            isa,
            range,
            lines: Vec::new(),
            labels: BTreeMap::new(),
            data_marks: Vec::new(),
            decoded_version: None,
        }
    }

    /// CPU address range being disassembled.
    #[must_use]
    pub fn range(&self) -> Range<u32> {
        self.range.clone()
    }

    /// Returns `true` when the line index reflects `code`'s current version.
    #[must_use]
    pub fn is_current(&self, code: &CodeVersion) -> bool {
        self.decoded_version == Some(code.current())
    }

    /// Brings the line index up to date with `code`, decoding only stale spans when possible.
    pub fn refresh(&mut self, code: &mut CodeVersion, peek: impl Fn(u32) -> u8) {
        if self.is_current(code) {
            return;
        }
        let pending = code.take_pending();
        match (self.decoded_version, pending) {
            (Some(_), PendingDecode::Ranges(mut ranges)) => {
                ranges.sort_by(|a, b| b.start.cmp(&a.start));
                for dirty in ranges {
                    self.redecode(dirty, &peek);
                }
            }
            _ => self.rebuild(&peek),
        }
        self.decoded_version = Some(code.current());
    }

    /// Number of lines in the current decode.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Returns the line at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::OutOfRange`] when `index` is not below [`Self::line_count`].
    pub fn line_data(&self, index: usize) -> Result<CodeLineData> {
        let line = self.lines.get(index).ok_or_else(|| {
            DebuggerError::out_of_range("line index", index as u64, 0..self.lines.len() as u64)
        })?;
        Ok(CodeLineData {
            address: line.address,
            bytes: line.bytes().to_vec(),
            text: self.render(line),
            kind: line.kind,
        })
    }

    /// Index of the line whose bytes cover `address`.
    ///
    /// Label lines never cover an address. Addresses outside the decoded
    /// range clamp to the first or last line; an empty index yields 0.
    #[must_use]
    pub fn line_index(&self, address: u32) -> usize {
        let index = self.lines.partition_point(|line| line.end() <= address);
        index.min(self.lines.len().saturating_sub(1))
    }

    /// Finds the first line in `[start, end)` whose text contains `needle`.
    ///
    /// `backwards` scans from the end of the window toward its start. The
    /// search never wraps.
    #[must_use]
    pub fn search_code(
        &self,
        needle: &str,
        start: usize,
        end: usize,
        backwards: bool,
    ) -> Option<usize> {
        let end = end.min(self.lines.len());
        if start >= end {
            return None;
        }
        let matches = |index: &usize| self.render(&self.lines[*index]).contains(needle);
        if backwards {
            (start..end).rev().find(matches)
        } else {
            (start..end).find(matches)
        }
    }

    /// Names `address`; the label appears as its own line before the instruction.
    pub fn set_label(&mut self, address: u32, name: impl Into<String>) {
        self.labels.insert(address, name.into());
        self.decoded_version = None;
    }

    /// Removes the label at `address`, returning its name.
    pub fn remove_label(&mut self, address: u32) -> Option<String> {
        let removed = self.labels.remove(&address);
        if removed.is_some() {
            self.decoded_version = None;
        }
        removed
    }

    /// Label defined at `address`, if any.
    #[must_use]
    pub fn label(&self, address: u32) -> Option<&str> {
        self.labels.get(&address).map(String::as_str)
    }

    /// Marks `range` to be shown as `.db` data instead of instructions.
    pub fn mark_data(&mut self, range: Range<u32>) {
        if range.is_empty() {
            return;
        }
        self.data_marks.push(range);
        self.decoded_version = None;
    }

    /// Removes every data mark.
    pub fn clear_data_marks(&mut self) {
        if !self.data_marks.is_empty() {
            self.data_marks.clear();
            self.decoded_version = None;
        }
    }

    fn rebuild(&mut self, peek: &impl Fn(u32) -> u8) {
        let mut lines = Vec::with_capacity(self.lines.len());
        self.decode_span(self.range.start, |_| false, peek, &mut lines);
        log::debug!(
            "{} disassembly rebuilt: {} lines over {:#06x}..{:#06x}",
            self.isa.name(),
            lines.len(),
            self.range.start,
            self.range.end
        );
        self.lines = lines;
    }

    fn redecode(&mut self, dirty: Range<u32>, peek: &impl Fn(u32) -> u8) {
        let dirty_start = dirty.start.max(self.range.start);
        let dirty_end = dirty.end.min(self.range.end);
        if dirty_start >= dirty_end {
            return;
        }
        let mut first = self.lines.partition_point(|line| line.end() <= dirty_start);
        let Some(covering) = self.lines.get(first) else {
            self.rebuild(peek);
            return;
        };
        let restart = covering.address;
        while first > 0 && self.lines[first - 1].address == restart {
            first -= 1;
        }

        let mut fresh = Vec::new();
        let mut old = first;
        let lines = &self.lines;
        let stopped_at = self.decode_span(
            restart,
            |address| {
                if address < dirty_end {
                    return false;
                }
                while old < lines.len() && lines[old].address < address {
                    old += 1;
                }
                old < lines.len() && lines[old].address == address
            },
            peek,
            &mut fresh,
        );
        if stopped_at >= self.range.end {
            old = self.lines.len();
        }
        log::debug!(
            "re-decoded {:#06x}..{:#06x}: {} lines replaced by {}",
            restart,
            stopped_at,
            old - first,
            fresh.len()
        );
        self.lines.splice(first..old, fresh);
    }

    fn decode_span(
        &self,
        start: u32,
        mut stop: impl FnMut(u32) -> bool,
        peek: &impl Fn(u32) -> u8,
        out: &mut Vec<LineEntry>,
    ) -> u32 {
        let mut address = start;
        while address < self.range.end {
            if stop(address) {
                break;
            }
            if self.labels.contains_key(&address) {
                out.push(LineEntry::label(address));
            }
            let line = self.decode_line(address, peek);
            address = line.end();
            out.push(line);
        }
        address
    }

    fn decode_line(&self, address: u32, peek: &impl Fn(u32) -> u8) -> LineEntry {
        let mut line = LineEntry {
            address,
            len: 1,
            bytes: [0; MAX_DATA_LINE_BYTES],
            kind: LineKind::Unknown,
        };
        line.bytes[0] = peek(address);

        if self.is_data(address) {
            line.kind = LineKind::Data;
            while usize::from(line.len) < MAX_DATA_LINE_BYTES {
                let next = address + u32::from(line.len);
                if next >= self.range.end || !self.is_data(next) || self.labels.contains_key(&next)
                {
                    break;
                }
                line.bytes[usize::from(line.len)] = peek(next);
                line.len += 1;
            }
            return line;
        }

        if let Some(info) = self.isa.opcode(line.bytes[0]) {
            let len = info.len();
            if address + u32::from(len) <= self.range.end {
                for offset in 1..len {
                    line.bytes[usize::from(offset)] = peek(address + u32::from(offset));
                }
                line.len = len;
                line.kind = LineKind::Code;
            }
        }
        line
    }

    fn is_data(&self, address: u32) -> bool {
        self.data_marks.iter().any(|range| range.contains(&address))
    }

    fn render(&self, line: &LineEntry) -> String {
        match line.kind {
            LineKind::Label => format!("{}:", self.label(line.address).unwrap_or_default()),
            LineKind::Code => self.isa.opcode(line.bytes[0]).map_or_else(
                || render_db(line.bytes()),
                |info| info.format(&line.bytes()[1..], line.address),
            ),
            LineKind::Data | LineKind::Unknown => render_db(line.bytes()),
        }
    }
}

fn render_db(bytes: &[u8]) -> String {
    let list: Vec<String> = bytes.iter().map(|byte| format!("${byte:02X}")).collect();
    format!(".db {}", list.join(", "))
}

#[cfg(test)]
mod tests {
    use super::{CodeVersion, Disassembler, LineKind};
    use crate::isa::MOS6502;
    use proptest::prelude::*;
    use std::cell::RefCell;

    const ORIGIN: u32 = 0x8000;

    struct Rom {
        bytes: RefCell<Vec<u8>>,
    }

    impl Rom {
        fn new(program: &[u8]) -> Self {
            Self {
                bytes: RefCell::new(program.to_vec()),
            }
        }

        fn peek(&self, address: u32) -> u8 {
            self.bytes.borrow()[(address - ORIGIN) as usize]
        }

        fn poke(&self, code: &mut CodeVersion, address: u32, value: u8) {
            self.bytes.borrow_mut()[(address - ORIGIN) as usize] = value;
            code.mark_written(address);
        }

        fn end(&self) -> u32 {
            ORIGIN + self.bytes.borrow().len() as u32
        }
    }

    fn decoded(rom: &Rom) -> (Disassembler, CodeVersion) {
        let mut disasm = Disassembler::new(&MOS6502, ORIGIN..rom.end());
        let mut code = CodeVersion::new(ORIGIN..rom.end());
        disasm.refresh(&mut code, |address| rom.peek(address));
        (disasm, code)
    }

    fn texts(disasm: &Disassembler) -> Vec<String> {
        (0..disasm.line_count())
            .map(|index| disasm.line_data(index).unwrap().text)
            .collect()
    }

    #[test]
    fn decodes_instructions_in_a_single_linear_pass() {
        let rom = Rom::new(&[0xA9, 0x01, 0x8D, 0x00, 0x02, 0xEA, 0x4C, 0x00, 0x80]);
        let (disasm, _) = decoded(&rom);
        assert_eq!(
            texts(&disasm),
            ["LDA #$01", "STA $0200", "NOP", "JMP $8000"]
        );
        let line = disasm.line_data(1).unwrap();
        assert_eq!(line.address, 0x8002);
        assert_eq!(line.bytes, vec![0x8D, 0x00, 0x02]);
        assert_eq!(line.kind, LineKind::Code);
    }

    #[test]
    fn unknown_opcode_becomes_one_byte_data_line() {
        let rom = Rom::new(&[0x02, 0xEA]);
        let (disasm, _) = decoded(&rom);
        let line = disasm.line_data(0).unwrap();
        assert_eq!(line.text, ".db $02");
        assert_eq!(line.kind, LineKind::Unknown);
        assert!(line.is_data());
        assert_eq!(disasm.line_data(1).unwrap().address, 0x8001);
    }

    #[test]
    fn truncated_instruction_at_range_end_is_unknown() {
        let rom = Rom::new(&[0xEA, 0x4C, 0x00]);
        let (disasm, _) = decoded(&rom);
        assert_eq!(texts(&disasm), ["NOP", ".db $4C", ".db $00"]);
    }

    #[test]
    fn data_marks_group_up_to_eight_bytes_per_line() {
        let rom = Rom::new(&[0u8; 12]);
        let mut disasm = Disassembler::new(&MOS6502, ORIGIN..rom.end());
        let mut code = CodeVersion::new(ORIGIN..rom.end());
        disasm.mark_data(ORIGIN..ORIGIN + 10);
        disasm.refresh(&mut code, |address| rom.peek(address));

        let first = disasm.line_data(0).unwrap();
        assert_eq!(first.kind, LineKind::Data);
        assert_eq!(first.bytes.len(), 8);
        assert_eq!(disasm.line_data(1).unwrap().bytes.len(), 2);
        assert_eq!(disasm.line_data(2).unwrap().text, "BRK");
        assert_eq!(disasm.line_index(ORIGIN + 7), 0);
        assert_eq!(disasm.line_index(ORIGIN + 8), 1);
    }

    #[test]
    fn label_is_a_zero_width_line_before_its_instruction() {
        let rom = Rom::new(&[0xEA, 0xEA, 0xEA]);
        let mut disasm = Disassembler::new(&MOS6502, ORIGIN..rom.end());
        let mut code = CodeVersion::new(ORIGIN..rom.end());
        disasm.set_label(ORIGIN + 1, "loop");
        disasm.refresh(&mut code, |address| rom.peek(address));

        assert_eq!(texts(&disasm), ["NOP", "loop:", "NOP", "NOP"]);
        assert!(disasm.line_data(1).unwrap().is_label());
        assert_eq!(disasm.line_index(ORIGIN + 1), 2);
    }

    #[test]
    fn line_index_clamps_outside_decoded_range() {
        let rom = Rom::new(&[0xEA, 0xEA]);
        let (disasm, _) = decoded(&rom);
        assert_eq!(disasm.line_index(0x0000), 0);
        assert_eq!(disasm.line_index(0xFFFF), 1);

        let empty = Disassembler::new(&MOS6502, ORIGIN..ORIGIN);
        assert_eq!(empty.line_index(ORIGIN), 0);
        assert_eq!(empty.line_count(), 0);
    }

    #[test]
    fn line_data_past_end_is_out_of_range() {
        let rom = Rom::new(&[0xEA]);
        let (disasm, _) = decoded(&rom);
        assert!(disasm.line_data(1).is_err());
    }

    #[test]
    fn search_respects_direction_and_never_wraps() {
        let rom = Rom::new(&[0xEA, 0xA9, 0x01, 0xEA, 0xA9, 0x02, 0xEA]);
        let (disasm, _) = decoded(&rom);
        assert_eq!(disasm.search_code("LDA", 0, 5, false), Some(1));
        assert_eq!(disasm.search_code("LDA", 0, 5, true), Some(3));
        assert_eq!(disasm.search_code("LDA", 4, 5, false), None);
        assert_eq!(disasm.search_code("LDA", 4, 5, true), None);
        assert_eq!(disasm.search_code("lda", 0, 5, false), None);
        assert_eq!(disasm.search_code("NOP", 3, 2, false), None);
    }

    #[test]
    fn write_into_operand_redecodes_only_the_stale_span() {
        let rom = Rom::new(&[0xEA, 0xA9, 0x01, 0xEA, 0xEA, 0xEA]);
        let (mut disasm, mut code) = decoded(&rom);
        assert!(disasm.is_current(&code));

        rom.poke(&mut code, ORIGIN + 2, 0x7F);
        assert!(!disasm.is_current(&code));
        disasm.refresh(&mut code, |address| rom.peek(address));
        assert_eq!(texts(&disasm), ["NOP", "LDA #$7F", "NOP", "NOP", "NOP"]);
    }

    #[test]
    fn write_that_changes_instruction_length_resynchronises() {
        let rom = Rom::new(&[0xEA, 0xEA, 0xEA, 0xEA, 0xEA, 0xEA]);
        let (mut disasm, mut code) = decoded(&rom);

        rom.poke(&mut code, ORIGIN + 1, 0x4C);
        disasm.refresh(&mut code, |address| rom.peek(address));
        assert_eq!(texts(&disasm), ["NOP", "JMP $EAEA", "NOP", "NOP"]);

        rom.poke(&mut code, ORIGIN + 1, 0xEA);
        disasm.refresh(&mut code, |address| rom.peek(address));
        assert_eq!(texts(&disasm), ["NOP"; 6]);
    }

    #[test]
    fn label_change_forces_full_rebuild() {
        let rom = Rom::new(&[0xEA, 0xEA]);
        let (mut disasm, mut code) = decoded(&rom);
        disasm.set_label(ORIGIN, "start");
        assert!(!disasm.is_current(&code));
        disasm.refresh(&mut code, |address| rom.peek(address));
        assert_eq!(texts(&disasm), ["start:", "NOP", "NOP"]);
        assert_eq!(disasm.remove_label(ORIGIN).as_deref(), Some("start"));
        disasm.refresh(&mut code, |address| rom.peek(address));
        assert_eq!(disasm.line_count(), 2);
    }

    #[test]
    fn code_version_ignores_writes_outside_watched_range() {
        let mut code = CodeVersion::new(0x8000..0x9000);
        code.mark_written(0x0200);
        assert_eq!(code.current(), 0);
        code.mark_written(0x8000);
        code.mark_written(0x8001);
        assert_eq!(code.current(), 2);
        assert_eq!(code.pending_ranges(), &[0x8000..0x8002]);
    }

    #[test]
    fn code_version_falls_back_to_full_rebuild_when_fragmented() {
        let mut code = CodeVersion::new(0x8000..0x9000);
        for offset in 0..40 {
            code.mark_written(0x8000 + offset * 4);
        }
        assert!(code.has_pending_full_rebuild());
        assert!(code.pending_ranges().is_empty());
    }

    proptest! {
        #[test]
        fn every_covered_address_maps_to_its_line(
            program in proptest::collection::vec(any::<u8>(), 1..256),
        ) {
            let rom = Rom::new(&program);
            let (disasm, _) = decoded(&rom);
            for index in 0..disasm.line_count() {
                let line = disasm.line_data(index).unwrap();
                for offset in 0..line.bytes.len() as u32 {
                    prop_assert_eq!(disasm.line_index(line.address + offset), index);
                }
            }
        }

        #[test]
        fn partial_redecode_matches_full_decode(
            program in proptest::collection::vec(any::<u8>(), 4..128),
            writes in proptest::collection::vec((any::<prop::sample::Index>(), any::<u8>()), 1..8),
        ) {
            let rom = Rom::new(&program);
            let (mut disasm, mut code) = decoded(&rom);
            for (index, value) in writes {
                let address = ORIGIN + index.index(program.len()) as u32;
                rom.poke(&mut code, address, value);
            }
            disasm.refresh(&mut code, |address| rom.peek(address));
            let (fresh, _) = decoded(&rom);
            prop_assert_eq!(texts(&disasm), texts(&fresh));
        }
    }
}
