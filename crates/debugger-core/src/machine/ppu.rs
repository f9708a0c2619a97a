use crate::PpuState;

/// Dots per scanline.
pub const DOTS_PER_SCANLINE: u16 = 341;
/// Scanlines per frame, including vblank and pre-render lines.
pub const SCANLINES_PER_FRAME: u16 = 262;
/// Scanline on which vblank begins.
pub const VBLANK_SCANLINE: u16 = 241;
/// Scanline on which vblank ends.
pub const PRE_RENDER_SCANLINE: u16 = 261;
/// PPU dots elapsed per CPU cycle.
pub const DOTS_PER_CPU_CYCLE: u32 = 3;

/// Nametable RAM size.
pub const VIDEO_RAM_SIZE: usize = 0x800;
/// Object attribute memory size.
pub const SPRITE_RAM_SIZE: usize = 0x100;
/// Palette RAM size.
pub const PALETTE_RAM_SIZE: usize = 0x20;

const CTRL_INCREMENT_32: u8 = 0x04;
const CTRL_NMI_ENABLE: u8 = 0x80;
const STATUS_VBLANK: u8 = 0x80;
const STATUS_SPRITE_FLAGS: u8 = 0x60;

/// Register-level picture processor: timing, vblank NMI and VRAM access ports.
///
/// No pixels are produced; only the state a debugger can observe is modeled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ppu {
    vram: Vec<u8>,
    oam: Vec<u8>,
    palette: [u8; PALETTE_RAM_SIZE],
    control: u8,
    mask: u8,
    status: u8,
    oam_address: u8,
    vram_address: u16,
    write_toggle: bool,
    read_buffer: u8,
    io_latch: u8,
    scanline: u16,
    dot: u16,
    frame_count: u64,
    nmi_pending: bool,
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

impl Ppu {
    /// Power-on state at scanline 0, dot 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            vram: vec![0; VIDEO_RAM_SIZE],
            oam: vec![0; SPRITE_RAM_SIZE],
            palette: [0; PALETTE_RAM_SIZE],
            control: 0,
            mask: 0,
            status: 0,
            oam_address: 0,
            vram_address: 0,
            write_toggle: false,
            read_buffer: 0,
            io_latch: 0,
            scanline: 0,
            dot: 0,
            frame_count: 0,
            nmi_pending: false,
        }
    }

    /// Observable register and timing snapshot.
    #[must_use]
    pub const fn state(&self) -> PpuState {
        PpuState {
            scanline: self.scanline,
            dot: self.dot,
            frame_count: self.frame_count,
            control: self.control,
            mask: self.mask,
            status: self.status,
            vram_address: self.vram_address,
        }
    }

    /// Advances the dot clock.
    pub fn tick(&mut self, dots: u32) {
        for _ in 0..dots {
            self.dot += 1;
            if self.dot == DOTS_PER_SCANLINE {
                self.dot = 0;
                self.scanline += 1;
                if self.scanline == SCANLINES_PER_FRAME {
                    self.scanline = 0;
                    self.frame_count += 1;
                }
            }
            if self.dot == 1 {
                if self.scanline == VBLANK_SCANLINE {
                    self.status |= STATUS_VBLANK;
                    if self.control & CTRL_NMI_ENABLE != 0 {
                        self.nmi_pending = true;
                    }
                } else if self.scanline == PRE_RENDER_SCANLINE {
                    self.status &= !(STATUS_VBLANK | STATUS_SPRITE_FLAGS);
                }
            }
        }
    }

    /// Consumes a pending NMI edge.
    pub fn take_nmi(&mut self) -> bool {
        std::mem::take(&mut self.nmi_pending)
    }

    /// CPU read of register `index` (`address & 7`), with read side effects.
    pub fn read_register(&mut self, index: u16) -> u8 {
        let value = self.peek_register(index);
        match index & 7 {
            2 => {
                self.status &= !STATUS_VBLANK;
                self.write_toggle = false;
            }
            7 => {
                self.read_buffer = self.vram_read(self.vram_address);
                self.increment_address();
            }
            _ => {}
        }
        value
    }

    /// Value a CPU read of register `index` would return, without side effects.
    #[must_use]
    pub fn peek_register(&self, index: u16) -> u8 {
        match index & 7 {
            2 => self.status | (self.io_latch & 0x1F),
            4 => self.oam[usize::from(self.oam_address)],
            7 if self.vram_address & 0x3FFF >= 0x3F00 => self.vram_read(self.vram_address),
            7 => self.read_buffer,
            _ => self.io_latch,
        }
    }

    /// CPU write of register `index` (`address & 7`).
    pub fn write_register(&mut self, index: u16, value: u8) {
        self.io_latch = value;
        match index & 7 {
            0 => {
                let enabling = self.control & CTRL_NMI_ENABLE == 0 && value & CTRL_NMI_ENABLE != 0;
                self.control = value;
                if enabling && self.status & STATUS_VBLANK != 0 {
                    self.nmi_pending = true;
                }
            }
            1 => self.mask = value,
            3 => self.oam_address = value,
            4 => {
                self.oam[usize::from(self.oam_address)] = value;
                self.oam_address = self.oam_address.wrapping_add(1);
            }
            5 => self.write_toggle = !self.write_toggle,
            6 => {
                self.vram_address = if self.write_toggle {
                    (self.vram_address & 0xFF00) | u16::from(value)
                } else {
                    (u16::from(value & 0x3F) << 8) | (self.vram_address & 0x00FF)
                };
                self.write_toggle = !self.write_toggle;
            }
            7 => {
                self.vram_write(self.vram_address, value);
                self.increment_address();
            }
            _ => {}
        }
    }

    /// Nametable RAM.
    #[must_use]
    pub fn video_ram(&self) -> &[u8] {
        &self.vram
    }

    pub(crate) fn video_ram_mut(&mut self) -> &mut [u8] {
        &mut self.vram
    }

    /// Object attribute memory.
    #[must_use]
    pub fn sprite_ram(&self) -> &[u8] {
        &self.oam
    }

    pub(crate) fn sprite_ram_mut(&mut self) -> &mut [u8] {
        &mut self.oam
    }

    /// Palette RAM.
    #[must_use]
    pub const fn palette_ram(&self) -> &[u8; PALETTE_RAM_SIZE] {
        &self.palette
    }

    pub(crate) fn palette_ram_mut(&mut self) -> &mut [u8; PALETTE_RAM_SIZE] {
        &mut self.palette
    }

    fn increment_address(&mut self) {
        let step = if self.control & CTRL_INCREMENT_32 != 0 { 32 } else { 1 };
        self.vram_address = self.vram_address.wrapping_add(step) & 0x3FFF;
    }

    fn vram_read(&self, address: u16) -> u8 {
        match address & 0x3FFF {
            0x0000..=0x1FFF => 0,
            0x2000..=0x3EFF => self.vram[usize::from(address) & (VIDEO_RAM_SIZE - 1)],
            _ => self.palette[palette_index(address)],
        }
    }

    fn vram_write(&mut self, address: u16, value: u8) {
        match address & 0x3FFF {
            0x0000..=0x1FFF => {}
            0x2000..=0x3EFF => self.vram[usize::from(address) & (VIDEO_RAM_SIZE - 1)] = value,
            _ => self.palette[palette_index(address)] = value,
        }
    }
}

/// Maps a palette address onto palette RAM, folding the sprite backdrop mirrors.
const fn palette_index(address: u16) -> usize {
    let index = (address & 0x1F) as usize;
    if index >= 0x10 && index % 4 == 0 {
        index - 0x10
    } else {
        index
    }
}
