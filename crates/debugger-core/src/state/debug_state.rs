/// Status bit for carry.
pub const FLAG_CARRY: u8 = 1 << 0;
/// Status bit for zero result.
pub const FLAG_ZERO: u8 = 1 << 1;
/// Status bit for interrupt disable.
pub const FLAG_INTERRUPT: u8 = 1 << 2;
/// Status bit for decimal mode.
pub const FLAG_DECIMAL: u8 = 1 << 3;
/// Status bit set in pushed copies by `BRK`/`PHP`.
pub const FLAG_BREAK: u8 = 1 << 4;
/// Status bit that always reads as set.
pub const FLAG_UNUSED: u8 = 1 << 5;
/// Status bit for signed overflow.
pub const FLAG_OVERFLOW: u8 = 1 << 6;
/// Status bit for negative result.
pub const FLAG_NEGATIVE: u8 = 1 << 7;

/// CPU register snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CpuState {
    /// Accumulator.
    pub a: u8,
    /// X index register.
    pub x: u8,
    /// Y index register.
    pub y: u8,
    /// Stack pointer (offset into page 1).
    pub sp: u8,
    /// Program counter.
    pub pc: u16,
    /// Processor status flags.
    pub status: u8,
    /// CPU cycles elapsed since power-on.
    pub cycle_count: u64,
}

impl CpuState {
    /// Returns `true` when every bit of `mask` is set in the status register.
    #[must_use]
    pub const fn flag(&self, mask: u8) -> bool {
        self.status & mask == mask
    }

    /// Renders the status register as `NV-BDIZC` with clear flags in lowercase.
    #[must_use]
    pub fn flags_string(&self) -> String {
        const LETTERS: [(u8, char); 8] = [
            (FLAG_NEGATIVE, 'N'),
            (FLAG_OVERFLOW, 'V'),
            (FLAG_UNUSED, '-'),
            (FLAG_BREAK, 'B'),
            (FLAG_DECIMAL, 'D'),
            (FLAG_INTERRUPT, 'I'),
            (FLAG_ZERO, 'Z'),
            (FLAG_CARRY, 'C'),
        ];
        LETTERS
            .iter()
            .map(|&(mask, letter)| {
                if self.flag(mask) {
                    letter
                } else {
                    letter.to_ascii_lowercase()
                }
            })
            .collect()
    }
}

/// PPU timing and register snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct PpuState {
    /// Current scanline (`0..262`).
    pub scanline: u16,
    /// Current dot within the scanline (`0..341`).
    pub dot: u16,
    /// Frames completed since power-on.
    pub frame_count: u64,
    /// Last value written to the control register.
    pub control: u8,
    /// Last value written to the mask register.
    pub mask: u8,
    /// Status register as the CPU would read it.
    pub status: u8,
    /// Current VRAM address.
    pub vram_address: u16,
}

/// Point-in-time machine snapshot returned to debugger callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DebugState {
    /// CPU registers.
    pub cpu: CpuState,
    /// PPU timing registers.
    pub ppu: PpuState,
    /// Instructions retired while the debugger was attached.
    pub instruction_count: u64,
}

impl DebugState {
    /// Resolves a lowercase expression identifier against this snapshot.
    ///
    /// Counters wider than 32 bits wrap, matching the evaluator's arithmetic.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn resolve(&self, name: &str) -> Option<i32> {
        let cpu = &self.cpu;
        let value = match name {
            "a" => i32::from(cpu.a),
            "x" => i32::from(cpu.x),
            "y" => i32::from(cpu.y),
            "sp" => i32::from(cpu.sp),
            "pc" => i32::from(cpu.pc),
            "ps" => i32::from(cpu.status),
            "carry" => i32::from(cpu.flag(FLAG_CARRY)),
            "zero" => i32::from(cpu.flag(FLAG_ZERO)),
            "interrupt" => i32::from(cpu.flag(FLAG_INTERRUPT)),
            "decimal" => i32::from(cpu.flag(FLAG_DECIMAL)),
            "overflow" => i32::from(cpu.flag(FLAG_OVERFLOW)),
            "negative" => i32::from(cpu.flag(FLAG_NEGATIVE)),
            "cycles" => cpu.cycle_count as i32,
            "scanline" => i32::from(self.ppu.scanline),
            "dot" => i32::from(self.ppu.dot),
            "frame" => self.ppu.frame_count as i32,
            "instructions" => self.instruction_count as i32,
            _ => return None,
        };
        Some(value)
    }
}
