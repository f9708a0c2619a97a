use crate::disasm::CodeVersion;
use crate::{DebuggerError, MemorySpace, MemoryType, Result, MEMORY_TYPE_COUNT};

/// Table-driven memory access over a target's memory spaces.
///
/// Every operation is bounds-checked against the current size of the tag.
/// Tags the target does not expose have size 0.
pub struct MemoryDumper<T> {
    table: [Option<MemorySpace<T>>; MEMORY_TYPE_COUNT],
}

impl<T> std::fmt::Debug for MemoryDumper<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.table.iter().flatten()).finish()
    }
}

impl<T> MemoryDumper<T> {
    /// Builds the lookup table; a later entry for the same tag replaces an earlier one.
    #[must_use]
    pub fn new(spaces: &[MemorySpace<T>]) -> Self {
        let mut table = std::array::from_fn(|_| None);
        for space in spaces {
            table[space.memory_type.index()] = Some(*space);
        }
        Self { table }
    }

    /// Returns the descriptor registered for `memory_type`, if any.
    #[must_use]
    pub fn space(&self, memory_type: MemoryType) -> Option<&MemorySpace<T>> {
        self.table[memory_type.index()].as_ref()
    }

    /// Current size of `memory_type` in bytes.
    #[must_use]
    pub fn memory_size(&self, target: &T, memory_type: MemoryType) -> usize {
        self.space(memory_type).map_or(0, |space| (space.size)(target))
    }

    /// Copies the whole region into `out`, which must match its size exactly.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::SizeMismatch`] when `out.len()` differs from the region size.
    pub fn memory_state(&self, target: &T, memory_type: MemoryType, out: &mut [u8]) -> Result<()> {
        let size = self.checked_len(target, memory_type, out.len())?;
        if let Some(space) = self.space(memory_type) {
            for (offset, byte) in out.iter_mut().enumerate().take(size) {
                *byte = (space.peek)(target, offset);
            }
        }
        Ok(())
    }

    /// Returns a freshly allocated copy of the whole region.
    #[must_use]
    pub fn memory_state_vec(&self, target: &T, memory_type: MemoryType) -> Vec<u8> {
        self.space(memory_type).map_or_else(Vec::new, |space| {
            (0..(space.size)(target))
                .map(|offset| (space.peek)(target, offset))
                .collect()
        })
    }

    /// Replaces the whole region with `data`, which must match its size exactly.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::SizeMismatch`] when `data.len()` differs from the region size.
    pub fn set_memory_state(
        &self,
        target: &mut T,
        memory_type: MemoryType,
        data: &[u8],
        code: &mut CodeVersion,
    ) -> Result<()> {
        self.checked_len(target, memory_type, data.len())?;
        let Some(space) = self.space(memory_type) else {
            return Ok(());
        };
        for (offset, &byte) in data.iter().enumerate() {
            (space.write)(target, offset, byte);
        }
        Self::invalidate(space, 0, data.len(), code);
        Ok(())
    }

    /// Reads one byte without side effects.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::OutOfRange`] when `address` is not below the region size.
    pub fn memory_value(&self, target: &T, memory_type: MemoryType, address: u32) -> Result<u8> {
        let (space, offset) = self.checked_range(target, memory_type, address, 1)?;
        Ok((space.peek)(target, offset))
    }

    /// Writes one byte.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::OutOfRange`] when `address` is not below the region size.
    pub fn set_memory_value(
        &self,
        target: &mut T,
        memory_type: MemoryType,
        address: u32,
        value: u8,
        code: &mut CodeVersion,
    ) -> Result<()> {
        let (space, offset) = self.checked_range(target, memory_type, address, 1)?;
        (space.write)(target, offset, value);
        Self::invalidate(&space, offset, 1, code);
        Ok(())
    }

    /// Writes `data` byte by byte in ascending address order.
    ///
    /// Nothing is written when the range check fails.
    ///
    /// # Errors
    ///
    /// Returns [`DebuggerError::OutOfRange`] when `address + data.len()` exceeds the region size.
    pub fn set_memory_values(
        &self,
        target: &mut T,
        memory_type: MemoryType,
        address: u32,
        data: &[u8],
        code: &mut CodeVersion,
    ) -> Result<()> {
        let (space, offset) = self.checked_range(target, memory_type, address, data.len())?;
        for (index, &byte) in data.iter().enumerate() {
            (space.write)(target, offset + index, byte);
        }
        Self::invalidate(&space, offset, data.len(), code);
        Ok(())
    }

    fn checked_len(&self, target: &T, memory_type: MemoryType, actual: usize) -> Result<usize> {
        let expected = self.memory_size(target, memory_type);
        if actual == expected {
            Ok(expected)
        } else {
            Err(DebuggerError::SizeMismatch {
                memory_type,
                expected,
                actual,
            })
        }
    }

    fn checked_range(
        &self,
        target: &T,
        memory_type: MemoryType,
        address: u32,
        len: usize,
    ) -> Result<(MemorySpace<T>, usize)> {
        let size = self.memory_size(target, memory_type);
        let offset = address as usize;
        let fits = offset
            .checked_add(len.max(1))
            .is_some_and(|end| end <= size);
        match self.space(memory_type) {
            Some(space) if fits => Ok((*space, offset)),
            _ => Err(DebuggerError::out_of_range(
                "address",
                address,
                0..(size as u64),
            )),
        }
    }

    fn invalidate(space: &MemorySpace<T>, offset: usize, len: usize, code: &mut CodeVersion) {
        if len == 0 {
            return;
        }
        if space.memory_type == MemoryType::CpuMemory {
            let start = u32::try_from(offset).unwrap_or(u32::MAX);
            let end = u32::try_from(offset + len).unwrap_or(u32::MAX);
            code.mark_range(start..end);
        } else if space.executable {
            code.mark_all();
        }
    }
}
