use super::cartridge::{Cartridge, PRG_ROM_START};
use super::ppu::Ppu;
use crate::{TraceEvent, TraceSink};

/// Console work RAM size; mirrored through `$0000-$1FFF`.
pub const WORK_RAM_SIZE: usize = 0x800;

/// Decoded target of a CPU address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mapped {
    WorkRam(usize),
    PpuRegister(u16),
    Unmapped,
    SaveRam(usize),
    PrgRom(usize),
}

/// CPU address decoder joining work RAM, PPU registers and the cartridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bus {
    work_ram: Vec<u8>,
    cartridge: Cartridge,
    ppu: Ppu,
}

impl Bus {
    /// Powers on a bus around `cartridge`.
    #[must_use]
    pub fn new(cartridge: Cartridge) -> Self {
        Self {
            work_ram: vec![0; WORK_RAM_SIZE],
            cartridge,
            ppu: Ppu::new(),
        }
    }

    fn map(&self, address: u16) -> Mapped {
        match address {
            0x0000..=0x1FFF => Mapped::WorkRam(usize::from(address) & (WORK_RAM_SIZE - 1)),
            0x2000..=0x3FFF => Mapped::PpuRegister(address & 7),
            0x6000..=0x7FFF => self
                .cartridge
                .save_ram_offset(address)
                .map_or(Mapped::Unmapped, Mapped::SaveRam),
            PRG_ROM_START..=0xFFFF => Mapped::PrgRom(self.cartridge.prg_offset(address)),
            _ => Mapped::Unmapped,
        }
    }

    /// Value at `address` as the CPU would see it, without side effects.
    #[must_use]
    pub fn peek(&self, address: u16) -> u8 {
        match self.map(address) {
            Mapped::WorkRam(offset) => self.work_ram[offset],
            Mapped::PpuRegister(index) => self.ppu.peek_register(index),
            Mapped::Unmapped => 0,
            Mapped::SaveRam(offset) => self.cartridge.save_ram()[offset],
            Mapped::PrgRom(offset) => self.cartridge.prg_rom()[offset],
        }
    }

    /// Little-endian word at `address`, without side effects.
    #[must_use]
    pub fn peek_word(&self, address: u16) -> u16 {
        u16::from_le_bytes([self.peek(address), self.peek(address.wrapping_add(1))])
    }

    /// Instruction-stream or vector read: side effects apply, no event is reported.
    pub fn fetch(&mut self, address: u16) -> u8 {
        match self.map(address) {
            Mapped::PpuRegister(index) => self.ppu.read_register(index),
            _ => self.peek(address),
        }
    }

    /// Data read reported to `sink`.
    pub fn read(&mut self, address: u16, sink: &mut dyn TraceSink) -> u8 {
        let value = self.fetch(address);
        sink.on_event(TraceEvent::MemoryRead {
            address: u32::from(address),
            value,
        });
        value
    }

    /// CPU write reported to `sink`; ROM ignores writes.
    pub fn write(&mut self, address: u16, value: u8, sink: &mut dyn TraceSink) {
        sink.on_event(TraceEvent::MemoryWrite {
            address: u32::from(address),
            value,
        });
        match self.map(address) {
            Mapped::WorkRam(offset) => self.work_ram[offset] = value,
            Mapped::PpuRegister(index) => {
                self.ppu.write_register(index, value);
                sink.on_event(TraceEvent::RegisterWrite {
                    address: u32::from(address),
                    value,
                });
            }
            Mapped::SaveRam(offset) => self.cartridge.save_ram_mut()[offset] = value,
            Mapped::Unmapped | Mapped::PrgRom(_) => {}
        }
    }

    /// Debugger write: patches ROM in place and applies register side effects.
    pub fn debug_write(&mut self, address: u16, value: u8) {
        match self.map(address) {
            Mapped::WorkRam(offset) => self.work_ram[offset] = value,
            Mapped::PpuRegister(index) => self.ppu.write_register(index, value),
            Mapped::Unmapped => {}
            Mapped::SaveRam(offset) => self.cartridge.save_ram_mut()[offset] = value,
            Mapped::PrgRom(offset) => self.cartridge.prg_rom_mut()[offset] = value,
        }
    }

    /// Returns `true` when `address` decodes to RAM or ROM storage.
    #[must_use]
    pub fn is_storage(&self, address: u16) -> bool {
        matches!(
            self.map(address),
            Mapped::WorkRam(_) | Mapped::SaveRam(_) | Mapped::PrgRom(_)
        )
    }

    /// Work RAM.
    #[must_use]
    pub fn work_ram(&self) -> &[u8] {
        &self.work_ram
    }

    pub(crate) fn work_ram_mut(&mut self) -> &mut [u8] {
        &mut self.work_ram
    }

    /// Inserted cartridge.
    #[must_use]
    pub const fn cartridge(&self) -> &Cartridge {
        &self.cartridge
    }

    pub(crate) fn cartridge_mut(&mut self) -> &mut Cartridge {
        &mut self.cartridge
    }

    /// Picture processor.
    #[must_use]
    pub const fn ppu(&self) -> &Ppu {
        &self.ppu
    }

    pub(crate) fn ppu_mut(&mut self) -> &mut Ppu {
        &mut self.ppu
    }
}

#[cfg(test)]
mod tests {
    use super::Bus;
    use crate::machine::{Cartridge, CartridgeConfig, PrgRomSize};
    use crate::{NullSink, TraceEvent};

    fn bus() -> Bus {
        Bus::new(Cartridge::with_program(&[0xA9, 0x01]))
    }

    #[test]
    fn work_ram_is_mirrored_every_two_kib() {
        let mut bus = bus();
        bus.write(0x0805, 0x42, &mut NullSink);
        assert_eq!(bus.peek(0x0005), 0x42);
        assert_eq!(bus.peek(0x1805), 0x42);
    }

    #[test]
    fn rom_ignores_cpu_writes_but_accepts_debugger_writes() {
        let mut bus = bus();
        bus.write(0x8000, 0xEA, &mut NullSink);
        assert_eq!(bus.peek(0x8000), 0xA9);
        bus.debug_write(0x8000, 0xEA);
        assert_eq!(bus.peek(0x8000), 0xEA);
    }

    #[test]
    fn register_writes_report_memory_and_register_events() {
        let mut bus = bus();
        let mut events = Vec::new();
        bus.write(0x2000, 0x80, &mut events);
        assert_eq!(
            events,
            vec![
                TraceEvent::MemoryWrite {
                    address: 0x2000,
                    value: 0x80
                },
                TraceEvent::RegisterWrite {
                    address: 0x2000,
                    value: 0x80
                },
            ]
        );
        assert_eq!(bus.ppu().state().control, 0x80);
    }

    #[test]
    fn fetch_reports_nothing_and_read_reports_value() {
        let mut bus = bus();
        let mut events = Vec::new();
        assert_eq!(bus.fetch(0x8000), 0xA9);
        assert!(events.is_empty());
        assert_eq!(bus.read(0x8001, &mut events), 0x01);
        assert_eq!(
            events,
            vec![TraceEvent::MemoryRead {
                address: 0x8001,
                value: 0x01
            }]
        );
    }

    #[test]
    fn save_ram_window_is_open_bus_without_save_ram() {
        let mut bus = Bus::new(Cartridge::new(CartridgeConfig {
            prg_rom: PrgRomSize::Kib16,
            save_ram: false,
        }));
        bus.write(0x6000, 0x11, &mut NullSink);
        assert_eq!(bus.peek(0x6000), 0);
        assert!(!bus.is_storage(0x6000));
        assert!(bus.is_storage(0xC000));
        assert!(!bus.is_storage(0x2002));
    }
}
