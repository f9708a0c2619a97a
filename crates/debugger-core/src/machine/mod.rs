//! Reference NES-style console used to exercise the debugger end to end.
//!
//! The machine couples a 6502 core, 2 KiB of work RAM, a register-level PPU
//! and a fixed-mapping cartridge. It implements [`DebugTarget`] and exposes
//! every [`MemoryType`] through a static dispatch table.

use std::ops::Range;

/// CPU address decoding.
pub mod bus;
/// Fixed-mapping cartridge board.
pub mod cartridge;
/// 6502 core.
pub mod cpu;
/// Register-level picture processor.
pub mod ppu;

pub use bus::{Bus, WORK_RAM_SIZE};
pub use cartridge::{Cartridge, CartridgeConfig, PrgRomSize, PRG_BANK_SIZE, SAVE_RAM_SIZE};
pub use cpu::{Cpu, IRQ_VECTOR, NMI_VECTOR, RESET_VECTOR};
pub use ppu::{Ppu, DOTS_PER_CPU_CYCLE, PALETTE_RAM_SIZE, SPRITE_RAM_SIZE, VIDEO_RAM_SIZE};

use crate::{
    DebugState, DebugTarget, InstructionSet, MemorySpace, MemoryType, StepOutcome, TraceSink,
    MOS6502,
};

/// CPU address range holding cartridge program code.
pub const CODE_RANGE: Range<u32> = 0x8000..0x1_0000;
/// Size of the CPU-visible address space.
pub const CPU_ADDRESS_SPACE: usize = 0x1_0000;

/// Console assembled from a CPU, a bus and a cartridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceMachine {
    cpu: Cpu,
    bus: Bus,
}

impl ReferenceMachine {
    /// Inserts `cartridge` and runs the reset sequence.
    #[must_use]
    pub fn new(cartridge: Cartridge) -> Self {
        let mut machine = Self {
            cpu: Cpu::new(),
            bus: Bus::new(cartridge),
        };
        machine.reset();
        machine
    }

    /// Machine running `program` from `$8000`; see [`Cartridge::with_program`].
    #[must_use]
    pub fn with_program(program: &[u8]) -> Self {
        Self::new(Cartridge::with_program(program))
    }

    /// Runs the CPU reset sequence. Memory contents are preserved.
    pub fn reset(&mut self) {
        self.cpu.reset(&mut self.bus);
    }

    /// CPU core.
    #[must_use]
    pub const fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// CPU bus.
    #[must_use]
    pub const fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Picture processor.
    #[must_use]
    pub const fn ppu(&self) -> &Ppu {
        self.bus.ppu()
    }

    fn cpu_memory_peek(&self, offset: usize) -> u8 {
        u16::try_from(offset).map_or(0, |address| self.bus.peek(address))
    }

    fn cpu_memory_write(&mut self, offset: usize, value: u8) {
        if let Ok(address) = u16::try_from(offset) {
            self.bus.debug_write(address, value);
        }
    }
}

/// Dispatch table consulted by the memory dumper.
static MEMORY_SPACES: [MemorySpace<ReferenceMachine>; 7] = [
    MemorySpace {
        memory_type: MemoryType::CpuMemory,
        size: |_| CPU_ADDRESS_SPACE,
        peek: ReferenceMachine::cpu_memory_peek,
        write: ReferenceMachine::cpu_memory_write,
        executable: false,
    },
    MemorySpace {
        memory_type: MemoryType::PrgRom,
        size: |machine| machine.bus.cartridge().prg_rom().len(),
        peek: |machine, offset| machine.bus.cartridge().prg_rom()[offset],
        write: |machine, offset, value| machine.bus.cartridge_mut().prg_rom_mut()[offset] = value,
        executable: true,
    },
    MemorySpace {
        memory_type: MemoryType::WorkRam,
        size: |machine| machine.bus.work_ram().len(),
        peek: |machine, offset| machine.bus.work_ram()[offset],
        write: |machine, offset, value| machine.bus.work_ram_mut()[offset] = value,
        executable: true,
    },
    MemorySpace {
        memory_type: MemoryType::SaveRam,
        size: |machine| machine.bus.cartridge().save_ram().len(),
        peek: |machine, offset| machine.bus.cartridge().save_ram()[offset],
        write: |machine, offset, value| machine.bus.cartridge_mut().save_ram_mut()[offset] = value,
        executable: true,
    },
    MemorySpace {
        memory_type: MemoryType::VideoRam,
        size: |machine| machine.ppu().video_ram().len(),
        peek: |machine, offset| machine.ppu().video_ram()[offset],
        write: |machine, offset, value| machine.bus.ppu_mut().video_ram_mut()[offset] = value,
        executable: false,
    },
    MemorySpace {
        memory_type: MemoryType::SpriteRam,
        size: |machine| machine.ppu().sprite_ram().len(),
        peek: |machine, offset| machine.ppu().sprite_ram()[offset],
        write: |machine, offset, value| machine.bus.ppu_mut().sprite_ram_mut()[offset] = value,
        executable: false,
    },
    MemorySpace {
        memory_type: MemoryType::PaletteRam,
        size: |_| PALETTE_RAM_SIZE,
        peek: |machine, offset| machine.ppu().palette_ram()[offset],
        write: |machine, offset, value| machine.bus.ppu_mut().palette_ram_mut()[offset] = value,
        executable: false,
    },
];

impl DebugTarget for ReferenceMachine {
    fn instruction_set(&self) -> &'static dyn InstructionSet {
        &MOS6502
    }

    fn program_counter(&self) -> u32 {
        u32::from(self.cpu.pc())
    }

    fn code_range(&self) -> Range<u32> {
        CODE_RANGE
    }

    fn is_executable(&self, address: u32) -> bool {
        u16::try_from(address).is_ok_and(|address| {
            address < 0x2000 || (address >= 0x6000 && self.bus.is_storage(address))
        })
    }

    fn code_aliases(&self, address: u32, visit: &mut dyn FnMut(u32)) {
        let (base, end, mirror_size) = match address {
            0x0000..=0x1FFF => (0x0000, 0x2000, WORK_RAM_SIZE),
            0x8000..=0xFFFF => (0x8000, 0x1_0000, self.bus.cartridge().prg_rom().len()),
            _ => {
                visit(address);
                return;
            }
        };
        let stride = u32::try_from(mirror_size).unwrap_or(u32::MAX).max(1);
        let mut mirror = base + (address - base) % stride;
        while mirror < end {
            visit(mirror);
            mirror += stride;
        }
    }

    fn service_interrupts(&mut self, sink: &mut dyn TraceSink) {
        if self.cpu.is_jammed() || !self.bus.ppu_mut().take_nmi() {
            return;
        }
        let cycles = self.cpu.nmi(&mut self.bus, sink);
        self.bus
            .ppu_mut()
            .tick(u32::from(cycles) * DOTS_PER_CPU_CYCLE);
    }

    fn execute_instruction(&mut self, sink: &mut dyn TraceSink) -> StepOutcome {
        let outcome = self.cpu.step(&mut self.bus, sink);
        if let StepOutcome::Retired { cycles, .. } = outcome {
            self.bus
                .ppu_mut()
                .tick(u32::from(cycles) * DOTS_PER_CPU_CYCLE);
        }
        outcome
    }

    fn debug_state(&self) -> DebugState {
        DebugState {
            cpu: self.cpu.state(),
            ppu: self.ppu().state(),
            instruction_count: 0,
        }
    }

    fn memory_spaces(&self) -> &'static [MemorySpace<Self>] {
        &MEMORY_SPACES
    }
}
