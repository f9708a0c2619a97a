//! Memory-space tags and per-target dispatch descriptors.

use std::fmt;

/// Bounds-checked bulk and single-byte memory access.
pub mod dumper;

pub use dumper::MemoryDumper;

/// Number of distinct memory-space tags.
pub const MEMORY_TYPE_COUNT: usize = 7;

/// Distinct memory regions addressable by the debugger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum MemoryType {
    /// CPU-visible address space, mapped onto physical regions by the bus.
    CpuMemory = 0,
    /// Cartridge program ROM.
    PrgRom = 1,
    /// Console work RAM.
    WorkRam = 2,
    /// Battery-backed cartridge RAM.
    SaveRam = 3,
    /// PPU nametable RAM.
    VideoRam = 4,
    /// PPU object attribute memory.
    SpriteRam = 5,
    /// PPU palette RAM.
    PaletteRam = 6,
}

impl MemoryType {
    /// Ordered list of all memory-space tags.
    pub const ALL: [Self; MEMORY_TYPE_COUNT] = [
        Self::CpuMemory,
        Self::PrgRom,
        Self::WorkRam,
        Self::SaveRam,
        Self::VideoRam,
        Self::SpriteRam,
        Self::PaletteRam,
    ];

    /// Returns the lookup-table index for this tag.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns `true` for regions backed by physical storage rather than a bus view.
    #[must_use]
    pub const fn is_physical(self) -> bool {
        !matches!(self, Self::CpuMemory)
    }

    /// Human-readable region name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CpuMemory => "CPU memory",
            Self::PrgRom => "PRG ROM",
            Self::WorkRam => "work RAM",
            Self::SaveRam => "save RAM",
            Self::VideoRam => "video RAM",
            Self::SpriteRam => "sprite RAM",
            Self::PaletteRam => "palette RAM",
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Dispatch entry describing how a target exposes one memory space.
///
/// `peek` must not trigger hardware side effects. `write` applies whatever
/// side effects the target defines for a debugger write to that space.
pub struct MemorySpace<T> {
    /// Tag served by this entry.
    pub memory_type: MemoryType,
    /// Current size of the space in bytes.
    pub size: fn(&T) -> usize,
    /// Side-effect-free read of one byte at an in-bounds offset.
    pub peek: fn(&T, usize) -> u8,
    /// Write of one byte at an in-bounds offset.
    pub write: fn(&mut T, usize, u8),
    /// Whether the space can hold executed code (writes invalidate disassembly).
    pub executable: bool,
}

impl<T> Clone for MemorySpace<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for MemorySpace<T> {}

impl<T> fmt::Debug for MemorySpace<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySpace")
            .field("memory_type", &self.memory_type)
            .field("executable", &self.executable)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryType, MEMORY_TYPE_COUNT};

    #[test]
    fn all_lists_every_tag_in_index_order() {
        assert_eq!(MemoryType::ALL.len(), MEMORY_TYPE_COUNT);
        for (index, ty) in MemoryType::ALL.iter().enumerate() {
            assert_eq!(ty.index(), index);
        }
    }

    #[test]
    fn only_cpu_memory_is_a_bus_view() {
        let views: Vec<_> = MemoryType::ALL
            .iter()
            .filter(|ty| !ty.is_physical())
            .collect();
        assert_eq!(views, [&MemoryType::CpuMemory]);
    }

    #[test]
    fn display_uses_region_name() {
        assert_eq!(MemoryType::PaletteRam.to_string(), "palette RAM");
    }
}
