/// Size of one PRG ROM bank.
pub const PRG_BANK_SIZE: usize = 0x4000;
/// Size of battery-backed save RAM when present.
pub const SAVE_RAM_SIZE: usize = 0x2000;
/// First CPU address mapped to PRG ROM.
pub const PRG_ROM_START: u16 = 0x8000;

/// Byte used for PRG ROM not covered by a loaded program.
const ERASED: u8 = 0xFF;

/// Number of 16 KiB PRG banks on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum PrgRomSize {
    /// One bank, mirrored into both halves of `$8000-$FFFF`.
    Kib16,
    /// Two banks filling `$8000-$FFFF`.
    #[default]
    Kib32,
}

impl PrgRomSize {
    /// Size in bytes.
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::Kib16 => PRG_BANK_SIZE,
            Self::Kib32 => PRG_BANK_SIZE * 2,
        }
    }
}

/// Board layout for a [`Cartridge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CartridgeConfig {
    /// PRG ROM size.
    pub prg_rom: PrgRomSize,
    /// Whether `$6000-$7FFF` is backed by save RAM.
    pub save_ram: bool,
}

/// Mapper-0 style board: fixed PRG ROM and optional save RAM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cartridge {
    prg_rom: Vec<u8>,
    save_ram: Vec<u8>,
}

impl Cartridge {
    /// Blank board; ROM is filled with `$FF`.
    #[must_use]
    pub fn new(config: CartridgeConfig) -> Self {
        let save_ram_size = if config.save_ram { SAVE_RAM_SIZE } else { 0 };
        Self {
            prg_rom: vec![ERASED; config.prg_rom.bytes()],
            save_ram: vec![0; save_ram_size],
        }
    }

    /// 32 KiB board with `program` at `$8000` and every vector pointing there.
    ///
    /// Bytes past the end of the bank are dropped.
    #[must_use]
    pub fn with_program(program: &[u8]) -> Self {
        let mut cartridge = Self::new(CartridgeConfig {
            prg_rom: PrgRomSize::Kib32,
            save_ram: true,
        });
        cartridge.load(PRG_ROM_START, program);
        for vector in [0xFFFA, 0xFFFC, 0xFFFE] {
            cartridge.set_vector(vector, PRG_ROM_START);
        }
        cartridge
    }

    /// Copies `bytes` into ROM starting at CPU address `address`.
    ///
    /// Addresses below `$8000` are ignored; writes wrap through ROM mirrors.
    pub fn load(&mut self, address: u16, bytes: &[u8]) {
        let mut cursor = address;
        for &byte in bytes {
            if cursor < PRG_ROM_START {
                break;
            }
            let offset = self.prg_offset(cursor);
            self.prg_rom[offset] = byte;
            match cursor.checked_add(1) {
                Some(next) => cursor = next,
                None => break,
            }
        }
    }

    /// Stores a little-endian vector at `vector` (e.g. `$FFFC` for reset).
    pub fn set_vector(&mut self, vector: u16, target: u16) {
        self.load(vector, &target.to_le_bytes());
    }

    /// Program ROM contents.
    #[must_use]
    pub fn prg_rom(&self) -> &[u8] {
        &self.prg_rom
    }

    pub(crate) fn prg_rom_mut(&mut self) -> &mut [u8] {
        &mut self.prg_rom
    }

    /// Save RAM contents; empty when the board has none.
    #[must_use]
    pub fn save_ram(&self) -> &[u8] {
        &self.save_ram
    }

    pub(crate) fn save_ram_mut(&mut self) -> &mut [u8] {
        &mut self.save_ram
    }

    /// ROM offset for a CPU address in `$8000-$FFFF`.
    pub(crate) fn prg_offset(&self, address: u16) -> usize {
        usize::from(address - PRG_ROM_START) % self.prg_rom.len()
    }

    /// Save RAM offset for a CPU address in `$6000-$7FFF`, if the board has any.
    pub(crate) fn save_ram_offset(&self, address: u16) -> Option<usize> {
        (!self.save_ram.is_empty()).then(|| usize::from(address & 0x1FFF) % self.save_ram.len())
    }
}

#[cfg(test)]
mod tests {
    use super::{Cartridge, CartridgeConfig, PrgRomSize};

    #[test]
    fn single_bank_rom_is_mirrored() {
        let mut cartridge = Cartridge::new(CartridgeConfig {
            prg_rom: PrgRomSize::Kib16,
            save_ram: false,
        });
        cartridge.load(0xC000, &[0xA9]);
        assert_eq!(cartridge.prg_rom().len(), 0x4000);
        assert_eq!(cartridge.prg_offset(0x8000), 0);
        assert_eq!(cartridge.prg_rom()[cartridge.prg_offset(0x8000)], 0xA9);
        assert!(cartridge.save_ram_offset(0x6000).is_none());
    }

    #[test]
    fn with_program_places_code_and_vectors() {
        let cartridge = Cartridge::with_program(&[0xEA, 0x4C, 0x00, 0x80]);
        let rom = cartridge.prg_rom();
        assert_eq!(&rom[..4], &[0xEA, 0x4C, 0x00, 0x80]);
        assert_eq!(rom[4], 0xFF);
        assert_eq!(&rom[0x7FFC..], &[0x00, 0x80, 0x00, 0x80]);
        assert_eq!(cartridge.save_ram().len(), 0x2000);
    }

    #[test]
    fn load_stops_at_top_of_address_space() {
        let mut cartridge = Cartridge::new(CartridgeConfig::default());
        cartridge.load(0xFFFF, &[1, 2, 3]);
        assert_eq!(cartridge.prg_rom()[0x7FFF], 1);
        assert_eq!(cartridge.prg_rom()[0], 0xFF);
    }
}
