use super::bus::Bus;
use crate::{
    AddressingMode, CpuState, InstructionSet, InterruptKind, Mnemonic, StepOutcome, TraceEvent,
    TraceSink, FLAG_BREAK, FLAG_CARRY, FLAG_DECIMAL, FLAG_INTERRUPT, FLAG_NEGATIVE,
    FLAG_OVERFLOW, FLAG_UNUSED, FLAG_ZERO, MOS6502,
};

/// NMI handler vector.
pub const NMI_VECTOR: u16 = 0xFFFA;
/// Reset handler vector.
pub const RESET_VECTOR: u16 = 0xFFFC;
/// IRQ/BRK handler vector.
pub const IRQ_VECTOR: u16 = 0xFFFE;

const STACK_PAGE: u16 = 0x0100;
const INTERRUPT_CYCLES: u16 = 7;

/// Resolved operand of the instruction being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand {
    Implied,
    Accumulator,
    Immediate(u8),
    Memory { address: u16, page_crossed: bool },
    Branch(u16),
}

impl Operand {
    const fn address(self) -> u16 {
        match self {
            Self::Memory { address, .. } | Self::Branch(address) => address,
            Self::Implied | Self::Accumulator | Self::Immediate(_) => 0,
        }
    }
}

/// NMOS 6502 core without decimal arithmetic, as found in the 2A03.
///
/// Unofficial opcodes jam the core; it then refuses to advance until reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cpu {
    a: u8,
    x: u8,
    y: u8,
    sp: u8,
    pc: u16,
    status: u8,
    cycles: u64,
    jammed: bool,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    /// Power-on register file; call [`Cpu::reset`] before executing.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0xFD,
            pc: 0,
            status: FLAG_UNUSED | FLAG_INTERRUPT,
            cycles: 0,
            jammed: false,
        }
    }

    /// Runs the reset sequence: loads the reset vector and clears the jam latch.
    pub fn reset(&mut self, bus: &mut Bus) {
        self.pc = u16::from_le_bytes([bus.fetch(RESET_VECTOR), bus.fetch(RESET_VECTOR + 1)]);
        self.sp = 0xFD;
        self.status = FLAG_UNUSED | FLAG_INTERRUPT;
        self.cycles += u64::from(INTERRUPT_CYCLES);
        self.jammed = false;
    }

    /// Register snapshot.
    #[must_use]
    pub const fn state(&self) -> CpuState {
        CpuState {
            a: self.a,
            x: self.x,
            y: self.y,
            sp: self.sp,
            pc: self.pc,
            status: self.status,
            cycle_count: self.cycles,
        }
    }

    /// Program counter.
    #[must_use]
    pub const fn pc(&self) -> u16 {
        self.pc
    }

    /// Returns `true` after an unofficial opcode halted the core.
    #[must_use]
    pub const fn is_jammed(&self) -> bool {
        self.jammed
    }

    /// Enters the NMI handler and returns the cycles consumed.
    pub fn nmi(&mut self, bus: &mut Bus, sink: &mut dyn TraceSink) -> u16 {
        let return_address = self.pc;
        self.push_word(bus, sink, return_address);
        self.push(bus, sink, (self.status & !FLAG_BREAK) | FLAG_UNUSED);
        self.status |= FLAG_INTERRUPT;
        let handler = u16::from_le_bytes([bus.fetch(NMI_VECTOR), bus.fetch(NMI_VECTOR + 1)]);
        self.pc = handler;
        self.cycles += u64::from(INTERRUPT_CYCLES);
        sink.on_event(TraceEvent::Interrupt {
            kind: InterruptKind::Nmi,
            return_address: u32::from(return_address),
            handler: u32::from(handler),
        });
        INTERRUPT_CYCLES
    }

    /// Executes one instruction.
    pub fn step(&mut self, bus: &mut Bus, sink: &mut dyn TraceSink) -> StepOutcome {
        let pc = self.pc;
        if self.jammed {
            return StepOutcome::Jammed { pc: u32::from(pc) };
        }
        let opcode = bus.fetch(pc);
        let Some(info) = MOS6502.opcode(opcode) else {
            log::debug!("cpu jammed on opcode ${opcode:02X} at ${pc:04X}");
            self.jammed = true;
            return StepOutcome::Jammed { pc: u32::from(pc) };
        };
        self.pc = pc.wrapping_add(1);
        let operand = self.fetch_operand(bus, info.mode);
        let cycles = base_cycles(info.mnemonic, info.mode)
            + self.execute(bus, sink, info.mnemonic, operand);
        self.cycles += u64::from(cycles);
        StepOutcome::Retired {
            pc: u32::from(pc),
            cycles,
        }
    }

    fn next_byte(&mut self, bus: &mut Bus) -> u8 {
        let value = bus.fetch(self.pc);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    fn next_word(&mut self, bus: &mut Bus) -> u16 {
        u16::from_le_bytes([self.next_byte(bus), self.next_byte(bus)])
    }

    fn fetch_operand(&mut self, bus: &mut Bus, mode: AddressingMode) -> Operand {
        let memory = |address| Operand::Memory {
            address,
            page_crossed: false,
        };
        let indexed = |base: u16, index: u8| {
            let address = base.wrapping_add(u16::from(index));
            Operand::Memory {
                address,
                page_crossed: base & 0xFF00 != address & 0xFF00,
            }
        };
        match mode {
            AddressingMode::Implied => Operand::Implied,
            AddressingMode::Accumulator => Operand::Accumulator,
            AddressingMode::Immediate => Operand::Immediate(self.next_byte(bus)),
            AddressingMode::ZeroPage => memory(u16::from(self.next_byte(bus))),
            AddressingMode::ZeroPageX => {
                memory(u16::from(self.next_byte(bus).wrapping_add(self.x)))
            }
            AddressingMode::ZeroPageY => {
                memory(u16::from(self.next_byte(bus).wrapping_add(self.y)))
            }
            AddressingMode::Absolute => memory(self.next_word(bus)),
            AddressingMode::AbsoluteX => indexed(self.next_word(bus), self.x),
            AddressingMode::AbsoluteY => indexed(self.next_word(bus), self.y),
            AddressingMode::Indirect => {
                let pointer = self.next_word(bus);
                // The high byte is fetched without carrying into the pointer's page.
                let high = (pointer & 0xFF00) | (pointer.wrapping_add(1) & 0x00FF);
                memory(u16::from_le_bytes([bus.fetch(pointer), bus.fetch(high)]))
            }
            AddressingMode::IndirectX => {
                let pointer = self.next_byte(bus).wrapping_add(self.x);
                memory(zero_page_word(bus, pointer))
            }
            AddressingMode::IndirectY => {
                let pointer = self.next_byte(bus);
                indexed(zero_page_word(bus, pointer), self.y)
            }
            AddressingMode::Relative => {
                let displacement = self.next_byte(bus);
                Operand::Branch(branch_destination(self.pc, displacement))
            }
        }
    }

    fn load(&self, bus: &mut Bus, sink: &mut dyn TraceSink, operand: Operand) -> u8 {
        match operand {
            Operand::Immediate(value) => value,
            Operand::Accumulator => self.a,
            Operand::Memory { address, .. } => bus.read(address, sink),
            Operand::Implied | Operand::Branch(_) => 0,
        }
    }

    fn store(&mut self, bus: &mut Bus, sink: &mut dyn TraceSink, operand: Operand, value: u8) {
        match operand {
            Operand::Accumulator => self.a = value,
            Operand::Memory { address, .. } => bus.write(address, value, sink),
            Operand::Implied | Operand::Immediate(_) | Operand::Branch(_) => {}
        }
    }

    /// Applies the instruction and returns cycles beyond the base cost.
    #[allow(clippy::too_many_lines)]
    fn execute(
        &mut self,
        bus: &mut Bus,
        sink: &mut dyn TraceSink,
        mnemonic: Mnemonic,
        operand: Operand,
    ) -> u16 {
        let read_penalty = match operand {
            Operand::Memory {
                page_crossed: true, ..
            } => 1,
            _ => 0,
        };
        match mnemonic {
            Mnemonic::Lda => {
                self.a = self.load(bus, sink, operand);
                self.set_zn(self.a);
                return read_penalty;
            }
            Mnemonic::Ldx => {
                self.x = self.load(bus, sink, operand);
                self.set_zn(self.x);
                return read_penalty;
            }
            Mnemonic::Ldy => {
                self.y = self.load(bus, sink, operand);
                self.set_zn(self.y);
                return read_penalty;
            }
            Mnemonic::Adc => {
                let value = self.load(bus, sink, operand);
                self.add_with_carry(value);
                return read_penalty;
            }
            Mnemonic::Sbc => {
                let value = self.load(bus, sink, operand);
                self.add_with_carry(!value);
                return read_penalty;
            }
            Mnemonic::And | Mnemonic::Ora | Mnemonic::Eor => {
                let value = self.load(bus, sink, operand);
                self.a = match mnemonic {
                    Mnemonic::And => self.a & value,
                    Mnemonic::Ora => self.a | value,
                    _ => self.a ^ value,
                };
                self.set_zn(self.a);
                return read_penalty;
            }
            Mnemonic::Cmp | Mnemonic::Cpx | Mnemonic::Cpy => {
                let register = match mnemonic {
                    Mnemonic::Cmp => self.a,
                    Mnemonic::Cpx => self.x,
                    _ => self.y,
                };
                let value = self.load(bus, sink, operand);
                self.set_flag(FLAG_CARRY, register >= value);
                self.set_zn(register.wrapping_sub(value));
                return read_penalty;
            }
            Mnemonic::Bit => {
                let value = self.load(bus, sink, operand);
                self.set_flag(FLAG_ZERO, self.a & value == 0);
                self.set_flag(FLAG_OVERFLOW, value & FLAG_OVERFLOW != 0);
                self.set_flag(FLAG_NEGATIVE, value & FLAG_NEGATIVE != 0);
            }
            Mnemonic::Nop => {}
            Mnemonic::Asl | Mnemonic::Lsr | Mnemonic::Rol | Mnemonic::Ror => {
                let value = self.load(bus, sink, operand);
                let carry_in = self.status & FLAG_CARRY;
                let (result, carry_out) = match mnemonic {
                    Mnemonic::Asl => (value << 1, value & 0x80 != 0),
                    Mnemonic::Lsr => (value >> 1, value & 0x01 != 0),
                    Mnemonic::Rol => ((value << 1) | carry_in, value & 0x80 != 0),
                    _ => ((value >> 1) | (carry_in << 7), value & 0x01 != 0),
                };
                self.set_flag(FLAG_CARRY, carry_out);
                self.set_zn(result);
                self.store(bus, sink, operand, result);
            }
            Mnemonic::Inc | Mnemonic::Dec => {
                let value = self.load(bus, sink, operand);
                let result = if mnemonic == Mnemonic::Inc {
                    value.wrapping_add(1)
                } else {
                    value.wrapping_sub(1)
                };
                self.set_zn(result);
                self.store(bus, sink, operand, result);
            }
            Mnemonic::Sta => self.store(bus, sink, operand, self.a),
            Mnemonic::Stx => self.store(bus, sink, operand, self.x),
            Mnemonic::Sty => self.store(bus, sink, operand, self.y),
            Mnemonic::Inx => {
                self.x = self.x.wrapping_add(1);
                self.set_zn(self.x);
            }
            Mnemonic::Iny => {
                self.y = self.y.wrapping_add(1);
                self.set_zn(self.y);
            }
            Mnemonic::Dex => {
                self.x = self.x.wrapping_sub(1);
                self.set_zn(self.x);
            }
            Mnemonic::Dey => {
                self.y = self.y.wrapping_sub(1);
                self.set_zn(self.y);
            }
            Mnemonic::Tax => {
                self.x = self.a;
                self.set_zn(self.x);
            }
            Mnemonic::Tay => {
                self.y = self.a;
                self.set_zn(self.y);
            }
            Mnemonic::Txa => {
                self.a = self.x;
                self.set_zn(self.a);
            }
            Mnemonic::Tya => {
                self.a = self.y;
                self.set_zn(self.a);
            }
            Mnemonic::Tsx => {
                self.x = self.sp;
                self.set_zn(self.x);
            }
            Mnemonic::Txs => self.sp = self.x,
            Mnemonic::Clc => self.set_flag(FLAG_CARRY, false),
            Mnemonic::Sec => self.set_flag(FLAG_CARRY, true),
            Mnemonic::Cli => self.set_flag(FLAG_INTERRUPT, false),
            Mnemonic::Sei => self.set_flag(FLAG_INTERRUPT, true),
            Mnemonic::Cld => self.set_flag(FLAG_DECIMAL, false),
            Mnemonic::Sed => self.set_flag(FLAG_DECIMAL, true),
            Mnemonic::Clv => self.set_flag(FLAG_OVERFLOW, false),
            Mnemonic::Bcc => return self.branch(self.status & FLAG_CARRY == 0, operand),
            Mnemonic::Bcs => return self.branch(self.status & FLAG_CARRY != 0, operand),
            Mnemonic::Bne => return self.branch(self.status & FLAG_ZERO == 0, operand),
            Mnemonic::Beq => return self.branch(self.status & FLAG_ZERO != 0, operand),
            Mnemonic::Bpl => return self.branch(self.status & FLAG_NEGATIVE == 0, operand),
            Mnemonic::Bmi => return self.branch(self.status & FLAG_NEGATIVE != 0, operand),
            Mnemonic::Bvc => return self.branch(self.status & FLAG_OVERFLOW == 0, operand),
            Mnemonic::Bvs => return self.branch(self.status & FLAG_OVERFLOW != 0, operand),
            Mnemonic::Jmp => self.pc = operand.address(),
            Mnemonic::Jsr => {
                self.push_word(bus, sink, self.pc.wrapping_sub(1));
                self.pc = operand.address();
            }
            Mnemonic::Rts => self.pc = self.pull_word(bus, sink).wrapping_add(1),
            Mnemonic::Rti => {
                self.status = (self.pull(bus, sink) & !FLAG_BREAK) | FLAG_UNUSED;
                self.pc = self.pull_word(bus, sink);
            }
            Mnemonic::Brk => {
                self.push_word(bus, sink, self.pc.wrapping_add(1));
                self.push(bus, sink, self.status | FLAG_BREAK | FLAG_UNUSED);
                self.status |= FLAG_INTERRUPT;
                self.pc = u16::from_le_bytes([bus.fetch(IRQ_VECTOR), bus.fetch(IRQ_VECTOR + 1)]);
            }
            Mnemonic::Pha => self.push(bus, sink, self.a),
            Mnemonic::Php => self.push(bus, sink, self.status | FLAG_BREAK | FLAG_UNUSED),
            Mnemonic::Pla => {
                self.a = self.pull(bus, sink);
                self.set_zn(self.a);
            }
            Mnemonic::Plp => self.status = (self.pull(bus, sink) & !FLAG_BREAK) | FLAG_UNUSED,
        }
        0
    }

    fn branch(&mut self, taken: bool, operand: Operand) -> u16 {
        if !taken {
            return 0;
        }
        let target = operand.address();
        let crossed = self.pc & 0xFF00 != target & 0xFF00;
        self.pc = target;
        1 + u16::from(crossed)
    }

    fn add_with_carry(&mut self, value: u8) {
        let sum = u16::from(self.a) + u16::from(value) + u16::from(self.status & FLAG_CARRY);
        let [result, carry] = sum.to_le_bytes();
        self.set_flag(FLAG_CARRY, carry != 0);
        self.set_flag(
            FLAG_OVERFLOW,
            (!(self.a ^ value) & (self.a ^ result) & 0x80) != 0,
        );
        self.a = result;
        self.set_zn(result);
    }

    fn set_flag(&mut self, mask: u8, on: bool) {
        if on {
            self.status |= mask;
        } else {
            self.status &= !mask;
        }
    }

    fn set_zn(&mut self, value: u8) {
        self.set_flag(FLAG_ZERO, value == 0);
        self.set_flag(FLAG_NEGATIVE, value & 0x80 != 0);
    }

    fn push(&mut self, bus: &mut Bus, sink: &mut dyn TraceSink, value: u8) {
        bus.write(STACK_PAGE | u16::from(self.sp), value, sink);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn push_word(&mut self, bus: &mut Bus, sink: &mut dyn TraceSink, value: u16) {
        let [low, high] = value.to_le_bytes();
        self.push(bus, sink, high);
        self.push(bus, sink, low);
    }

    fn pull(&mut self, bus: &mut Bus, sink: &mut dyn TraceSink) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        bus.read(STACK_PAGE | u16::from(self.sp), sink)
    }

    fn pull_word(&mut self, bus: &mut Bus, sink: &mut dyn TraceSink) -> u16 {
        let low = self.pull(bus, sink);
        let high = self.pull(bus, sink);
        u16::from_le_bytes([low, high])
    }
}

/// Pointer stored in zero page; the high byte wraps within page zero.
fn zero_page_word(bus: &mut Bus, pointer: u8) -> u16 {
    u16::from_le_bytes([
        bus.fetch(u16::from(pointer)),
        bus.fetch(u16::from(pointer.wrapping_add(1))),
    ])
}

/// Branch target relative to the address following the operand.
#[allow(clippy::cast_possible_wrap)]
const fn branch_destination(next_pc: u16, displacement: u8) -> u16 {
    next_pc.wrapping_add_signed(displacement as i8 as i16)
}

/// Cycle cost before page-crossing and branch penalties.
const fn base_cycles(mnemonic: Mnemonic, mode: AddressingMode) -> u16 {
    use AddressingMode as M;
    match mnemonic {
        Mnemonic::Brk => 7,
        Mnemonic::Jsr | Mnemonic::Rts | Mnemonic::Rti => 6,
        Mnemonic::Pha | Mnemonic::Php => 3,
        Mnemonic::Pla | Mnemonic::Plp => 4,
        Mnemonic::Jmp => {
            if matches!(mode, M::Indirect) {
                5
            } else {
                3
            }
        }
        Mnemonic::Asl
        | Mnemonic::Lsr
        | Mnemonic::Rol
        | Mnemonic::Ror
        | Mnemonic::Inc
        | Mnemonic::Dec => match mode {
            M::ZeroPage => 5,
            M::ZeroPageX | M::Absolute => 6,
            M::AbsoluteX => 7,
            _ => 2,
        },
        Mnemonic::Sta | Mnemonic::Stx | Mnemonic::Sty => match mode {
            M::ZeroPage => 3,
            M::ZeroPageX | M::ZeroPageY | M::Absolute => 4,
            M::AbsoluteX | M::AbsoluteY => 5,
            M::IndirectX | M::IndirectY => 6,
            _ => 2,
        },
        _ => match mode {
            M::ZeroPage => 3,
            M::ZeroPageX | M::ZeroPageY | M::Absolute | M::AbsoluteX | M::AbsoluteY => 4,
            M::IndirectY | M::Indirect => 5,
            M::IndirectX => 6,
            M::Implied | M::Accumulator | M::Immediate | M::Relative => 2,
        },
    }
}
