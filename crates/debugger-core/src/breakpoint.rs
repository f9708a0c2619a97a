//! Execution and memory-access breakpoints over the CPU address space.

use std::ops::RangeInclusive;

/// What a breakpoint reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum BreakpointKind {
    /// Instruction fetch at an address; checked before the instruction runs.
    Execute,
    /// Data read on the CPU bus; checked after the instruction retires.
    Read,
    /// Write on the CPU bus; checked after the instruction retires.
    Write,
    /// Either a read or a write.
    Access,
}

impl BreakpointKind {
    const fn matches_read(self) -> bool {
        matches!(self, Self::Read | Self::Access)
    }

    const fn matches_write(self) -> bool {
        matches!(self, Self::Write | Self::Access)
    }
}

/// A breakpoint on an inclusive CPU address range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Breakpoint {
    /// Caller-visible identifier reported in break reasons.
    pub id: u32,
    /// Trigger kind.
    pub kind: BreakpointKind,
    /// First address covered.
    pub start: u32,
    /// Last address covered.
    pub end: u32,
    /// Disabled breakpoints never match.
    pub enabled: bool,
    /// Expression that must be truthy for the breakpoint to stop execution.
    pub condition: Option<String>,
    /// Number of times the breakpoint stopped execution.
    pub hit_count: u32,
}

impl Breakpoint {
    /// Creates an enabled, unconditional breakpoint on one address.
    #[must_use]
    pub const fn new(id: u32, kind: BreakpointKind, address: u32) -> Self {
        Self {
            id,
            kind,
            start: address,
            end: address,
            enabled: true,
            condition: None,
            hit_count: 0,
        }
    }

    /// Execute breakpoint on `address`.
    #[must_use]
    pub const fn execute(id: u32, address: u32) -> Self {
        Self::new(id, BreakpointKind::Execute, address)
    }

    /// Read breakpoint on `address`.
    #[must_use]
    pub const fn read(id: u32, address: u32) -> Self {
        Self::new(id, BreakpointKind::Read, address)
    }

    /// Write breakpoint on `address`.
    #[must_use]
    pub const fn write(id: u32, address: u32) -> Self {
        Self::new(id, BreakpointKind::Write, address)
    }

    /// Widens the breakpoint to cover `range`.
    #[must_use]
    pub const fn with_range(mut self, range: RangeInclusive<u32>) -> Self {
        self.start = *range.start();
        self.end = *range.end();
        self
    }

    /// Attaches a condition expression.
    #[must_use]
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Sets the enabled flag.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns `true` when `address` falls inside the breakpoint range.
    #[must_use]
    pub const fn contains(&self, address: u32) -> bool {
        self.start <= address && address <= self.end
    }
}

/// Memory access observed during an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusAccess {
    /// Data read.
    Read {
        /// CPU address.
        address: u32,
        /// Value read.
        value: u8,
    },
    /// Write.
    Write {
        /// CPU address.
        address: u32,
        /// Value written.
        value: u8,
    },
}

impl BusAccess {
    /// Address accessed.
    #[must_use]
    pub const fn address(self) -> u32 {
        match self {
            Self::Read { address, .. } | Self::Write { address, .. } => address,
        }
    }

    /// Value transferred.
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::Read { value, .. } | Self::Write { value, .. } => value,
        }
    }
}

/// Ordered breakpoint list with fast emptiness checks per trigger class.
#[derive(Debug, Clone, Default)]
pub struct BreakpointSet {
    entries: Vec<Breakpoint>,
    next_id: u32,
}

impl BreakpointSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every breakpoint.
    pub fn replace(&mut self, breakpoints: Vec<Breakpoint>) {
        self.next_id = breakpoints
            .iter()
            .map(|breakpoint| breakpoint.id.wrapping_add(1))
            .max()
            .unwrap_or(0)
            .max(self.next_id);
        self.entries = breakpoints;
    }

    /// Adds a breakpoint, replacing one with the same id, and returns its id.
    pub fn insert(&mut self, breakpoint: Breakpoint) -> u32 {
        let id = breakpoint.id;
        self.next_id = self.next_id.max(id.wrapping_add(1));
        if let Some(existing) = self.entries.iter_mut().find(|entry| entry.id == id) {
            *existing = breakpoint;
        } else {
            self.entries.push(breakpoint);
        }
        id
    }

    /// Returns an id not used by any breakpoint added so far.
    #[must_use]
    pub const fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Removes the breakpoint with `id`.
    pub fn remove(&mut self, id: u32) -> Option<Breakpoint> {
        let index = self.entries.iter().position(|entry| entry.id == id)?;
        Some(self.entries.remove(index))
    }

    /// Removes every breakpoint.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Breakpoint with `id`.
    #[must_use]
    pub fn get(&self, id: u32) -> Option<&Breakpoint> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// All breakpoints in insertion order.
    #[must_use]
    pub fn as_slice(&self) -> &[Breakpoint] {
        &self.entries
    }

    /// Number of breakpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Enabled execute breakpoints covering `pc`.
    pub fn execute_candidates(&self, pc: u32) -> impl Iterator<Item = &Breakpoint> + '_ {
        self.entries.iter().filter(move |entry| {
            entry.enabled && entry.kind == BreakpointKind::Execute && entry.contains(pc)
        })
    }

    /// Enabled read/write breakpoints matching `access`.
    pub fn access_candidates(&self, access: BusAccess) -> impl Iterator<Item = &Breakpoint> + '_ {
        self.entries.iter().filter(move |entry| {
            let kind_matches = match access {
                BusAccess::Read { .. } => entry.kind.matches_read(),
                BusAccess::Write { .. } => entry.kind.matches_write(),
            };
            entry.enabled && kind_matches && entry.contains(access.address())
        })
    }

    /// Returns `true` when any enabled read, write or access breakpoint exists.
    #[must_use]
    pub fn has_access_breakpoints(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.enabled && entry.kind != BreakpointKind::Execute)
    }

    pub(crate) fn record_hit(&mut self, id: u32) {
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.id == id) {
            entry.hit_count = entry.hit_count.saturating_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Breakpoint, BreakpointKind, BreakpointSet, BusAccess};

    #[test]
    fn execute_candidates_honor_range_and_enabled_flag() {
        let mut set = BreakpointSet::new();
        set.insert(Breakpoint::execute(1, 0x8000).with_range(0x8000..=0x8003));
        set.insert(Breakpoint::execute(2, 0x8002).enabled(false));
        set.insert(Breakpoint::read(3, 0x8002));

        let hits: Vec<u32> = set.execute_candidates(0x8002).map(|bp| bp.id).collect();
        assert_eq!(hits, vec![1]);
        assert_eq!(set.execute_candidates(0x8004).count(), 0);
    }

    #[test]
    fn access_candidates_match_direction() {
        let mut set = BreakpointSet::new();
        set.insert(Breakpoint::read(1, 0x10));
        set.insert(Breakpoint::write(2, 0x10));
        set.insert(Breakpoint::new(3, BreakpointKind::Access, 0x10));

        let read = BusAccess::Read {
            address: 0x10,
            value: 0,
        };
        let write = BusAccess::Write {
            address: 0x10,
            value: 0,
        };
        let read_hits: Vec<u32> = set.access_candidates(read).map(|bp| bp.id).collect();
        let write_hits: Vec<u32> = set.access_candidates(write).map(|bp| bp.id).collect();
        assert_eq!(read_hits, vec![1, 3]);
        assert_eq!(write_hits, vec![2, 3]);
        assert!(set.has_access_breakpoints());
    }

    #[test]
    fn insert_with_existing_id_replaces_entry() {
        let mut set = BreakpointSet::new();
        set.insert(Breakpoint::execute(4, 0x8000));
        set.insert(Breakpoint::execute(4, 0x9000).with_condition("a == 1"));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(4).map(|bp| bp.start), Some(0x9000));
        assert_eq!(set.next_id(), 5);
    }

    #[test]
    fn remove_and_clear() {
        let mut set = BreakpointSet::new();
        set.replace(vec![Breakpoint::execute(0, 1), Breakpoint::execute(7, 2)]);
        assert_eq!(set.next_id(), 8);
        assert_eq!(set.remove(0).map(|bp| bp.start), Some(1));
        assert!(set.remove(0).is_none());
        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn hit_count_saturates() {
        let mut set = BreakpointSet::new();
        set.insert(Breakpoint {
            hit_count: u32::MAX - 1,
            ..Breakpoint::execute(1, 0)
        });
        set.record_hit(1);
        set.record_hit(1);
        assert_eq!(set.get(1).map(|bp| bp.hit_count), Some(u32::MAX));
    }
}
