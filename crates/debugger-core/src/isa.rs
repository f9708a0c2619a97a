//! Opcode tables and operand formatting for 6502-family instruction sets.

/// Operand addressing modes of the 6502 family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AddressingMode {
    /// No operand.
    Implied,
    /// Operates on the accumulator.
    Accumulator,
    /// `#$nn`
    Immediate,
    /// `$nn`
    ZeroPage,
    /// `$nn,X`
    ZeroPageX,
    /// `$nn,Y`
    ZeroPageY,
    /// `$nnnn`
    Absolute,
    /// `$nnnn,X`
    AbsoluteX,
    /// `$nnnn,Y`
    AbsoluteY,
    /// `($nnnn)`
    Indirect,
    /// `($nn,X)`
    IndirectX,
    /// `($nn),Y`
    IndirectY,
    /// Signed branch displacement, rendered as the target address.
    Relative,
}

impl AddressingMode {
    /// Number of operand bytes following the opcode.
    #[must_use]
    pub const fn operand_len(self) -> u8 {
        match self {
            Self::Implied | Self::Accumulator => 0,
            Self::Immediate
            | Self::ZeroPage
            | Self::ZeroPageX
            | Self::ZeroPageY
            | Self::IndirectX
            | Self::IndirectY
            | Self::Relative => 1,
            Self::Absolute | Self::AbsoluteX | Self::AbsoluteY | Self::Indirect => 2,
        }
    }

    /// Renders the operand for an instruction whose opcode sits at `address`.
    ///
    /// Missing operand bytes read as zero.
    #[must_use]
    pub fn format_operand(self, operand: &[u8], address: u32) -> String {
        let byte = operand.first().copied().unwrap_or(0);
        let word = u16::from_le_bytes([byte, operand.get(1).copied().unwrap_or(0)]);
        match self {
            Self::Implied => String::new(),
            Self::Accumulator => "A".to_owned(),
            Self::Immediate => format!("#${byte:02X}"),
            Self::ZeroPage => format!("${byte:02X}"),
            Self::ZeroPageX => format!("${byte:02X},X"),
            Self::ZeroPageY => format!("${byte:02X},Y"),
            Self::Absolute => format!("${word:04X}"),
            Self::AbsoluteX => format!("${word:04X},X"),
            Self::AbsoluteY => format!("${word:04X},Y"),
            Self::Indirect => format!("(${word:04X})"),
            Self::IndirectX => format!("(${byte:02X},X)"),
            Self::IndirectY => format!("(${byte:02X}),Y"),
            Self::Relative => format!("${:04X}", branch_target(address, byte)),
        }
    }

    /// Resolves the address an indexed or indirect operand refers to.
    ///
    /// Returns `None` for modes without a memory operand or whose address is
    /// already visible in the operand text.
    #[must_use]
    pub fn effective_address(
        self,
        operand: &[u8],
        x: u8,
        y: u8,
        peek: impl Fn(u16) -> u8,
    ) -> Option<u16> {
        let byte = operand.first().copied().unwrap_or(0);
        let word = u16::from_le_bytes([byte, operand.get(1).copied().unwrap_or(0)]);
        let zero_page_word = |pointer: u8| {
            u16::from_le_bytes([
                peek(u16::from(pointer)),
                peek(u16::from(pointer.wrapping_add(1))),
            ])
        };
        match self {
            Self::ZeroPageX => Some(u16::from(byte.wrapping_add(x))),
            Self::ZeroPageY => Some(u16::from(byte.wrapping_add(y))),
            Self::AbsoluteX => Some(word.wrapping_add(u16::from(x))),
            Self::AbsoluteY => Some(word.wrapping_add(u16::from(y))),
            Self::IndirectX => Some(zero_page_word(byte.wrapping_add(x))),
            Self::IndirectY => Some(zero_page_word(byte).wrapping_add(u16::from(y))),
            Self::Indirect => {
                let high_pointer = (word & 0xFF00) | (word.wrapping_add(1) & 0x00FF);
                Some(u16::from_le_bytes([peek(word), peek(high_pointer)]))
            }
            Self::Implied
            | Self::Accumulator
            | Self::Immediate
            | Self::ZeroPage
            | Self::Absolute
            | Self::Relative => None,
        }
    }
}

/// Computes a branch target from the opcode address and signed displacement.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub const fn branch_target(address: u32, displacement: u8) -> u16 {
    let next = (address as u16).wrapping_add(2);
    next.wrapping_add_signed(displacement as i8 as i16)
}

/// Official 6502 mnemonics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum Mnemonic {
    Adc,
    And,
    Asl,
    Bcc,
    Bcs,
    Beq,
    Bit,
    Bmi,
    Bne,
    Bpl,
    Brk,
    Bvc,
    Bvs,
    Clc,
    Cld,
    Cli,
    Clv,
    Cmp,
    Cpx,
    Cpy,
    Dec,
    Dex,
    Dey,
    Eor,
    Inc,
    Inx,
    Iny,
    Jmp,
    Jsr,
    Lda,
    Ldx,
    Ldy,
    Lsr,
    Nop,
    Ora,
    Pha,
    Php,
    Pla,
    Plp,
    Rol,
    Ror,
    Rti,
    Rts,
    Sbc,
    Sec,
    Sed,
    Sei,
    Sta,
    Stx,
    Sty,
    Tax,
    Tay,
    Tsx,
    Txa,
    Txs,
    Tya,
}

impl Mnemonic {
    /// Canonical upper-case assembler spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Adc => "ADC",
            Self::And => "AND",
            Self::Asl => "ASL",
            Self::Bcc => "BCC",
            Self::Bcs => "BCS",
            Self::Beq => "BEQ",
            Self::Bit => "BIT",
            Self::Bmi => "BMI",
            Self::Bne => "BNE",
            Self::Bpl => "BPL",
            Self::Brk => "BRK",
            Self::Bvc => "BVC",
            Self::Bvs => "BVS",
            Self::Clc => "CLC",
            Self::Cld => "CLD",
            Self::Cli => "CLI",
            Self::Clv => "CLV",
            Self::Cmp => "CMP",
            Self::Cpx => "CPX",
            Self::Cpy => "CPY",
            Self::Dec => "DEC",
            Self::Dex => "DEX",
            Self::Dey => "DEY",
            Self::Eor => "EOR",
            Self::Inc => "INC",
            Self::Inx => "INX",
            Self::Iny => "INY",
            Self::Jmp => "JMP",
            Self::Jsr => "JSR",
            Self::Lda => "LDA",
            Self::Ldx => "LDX",
            Self::Ldy => "LDY",
            Self::Lsr => "LSR",
            Self::Nop => "NOP",
            Self::Ora => "ORA",
            Self::Pha => "PHA",
            Self::Php => "PHP",
            Self::Pla => "PLA",
            Self::Plp => "PLP",
            Self::Rol => "ROL",
            Self::Ror => "ROR",
            Self::Rti => "RTI",
            Self::Rts => "RTS",
            Self::Sbc => "SBC",
            Self::Sec => "SEC",
            Self::Sed => "SED",
            Self::Sei => "SEI",
            Self::Sta => "STA",
            Self::Stx => "STX",
            Self::Sty => "STY",
            Self::Tax => "TAX",
            Self::Tay => "TAY",
            Self::Tsx => "TSX",
            Self::Txa => "TXA",
            Self::Txs => "TXS",
            Self::Tya => "TYA",
        }
    }
}

/// Decoding metadata for one opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct OpcodeInfo {
    /// Instruction mnemonic.
    pub mnemonic: Mnemonic,
    /// Operand addressing mode.
    pub mode: AddressingMode,
}

impl OpcodeInfo {
    /// Total instruction length including the opcode byte.
    #[must_use]
    pub const fn len(self) -> u8 {
        1 + self.mode.operand_len()
    }

    /// Renders mnemonic and operand, e.g. `LDA #$01`.
    #[must_use]
    pub fn format(self, operand: &[u8], address: u32) -> String {
        let operand = self.mode.format_operand(operand, address);
        if operand.is_empty() {
            self.mnemonic.as_str().to_owned()
        } else {
            format!("{} {operand}", self.mnemonic.as_str())
        }
    }
}

/// Addressing-mode table consumed by the disassembler and trace renderer.
pub trait InstructionSet: Send + Sync {
    /// Short architecture name for logs.
    fn name(&self) -> &'static str;

    /// Decoding metadata for `opcode`, or `None` when it is not recognized.
    fn opcode(&self, opcode: u8) -> Option<OpcodeInfo>;

    /// Longest instruction in bytes.
    fn max_instruction_len(&self) -> usize {
        3
    }
}

/// Official NMOS 6502 instruction set.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mos6502;

/// Shared instance handed out by targets.
pub static MOS6502: Mos6502 = Mos6502;

impl InstructionSet for Mos6502 {
    fn name(&self) -> &'static str {
        "6502"
    }

    fn opcode(&self, opcode: u8) -> Option<OpcodeInfo> {
        MOS6502_DECODE_TABLE[usize::from(opcode)]
    }
}

/// Canonical list of official opcodes as `(opcode, mnemonic, mode)`.
#[rustfmt::skip]
pub const MOS6502_OPCODES: [(u8, Mnemonic, AddressingMode); 151] = {
    use AddressingMode::{
        Absolute as Abs, AbsoluteX as AbsX, AbsoluteY as AbsY, Accumulator as Acc,
        Immediate as Imm, Implied as Imp, Indirect as Ind, IndirectX as IndX,
        IndirectY as IndY, Relative as Rel, ZeroPage as Zp, ZeroPageX as ZpX,
        ZeroPageY as ZpY,
    };
    use Mnemonic::{
        Adc, And, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Brk, Bvc, Bvs, Clc, Cld, Cli, Clv,
        Cmp, Cpx, Cpy, Dec, Dex, Dey, Eor, Inc, Inx, Iny, Jmp, Jsr, Lda, Ldx, Ldy, Lsr, Nop,
        Ora, Pha, Php, Pla, Plp, Rol, Ror, Rti, Rts, Sbc, Sec, Sed, Sei, Sta, Stx, Sty, Tax,
        Tay, Tsx, Txa, Txs, Tya,
    };
    [
        (0x69, Adc, Imm), (0x65, Adc, Zp), (0x75, Adc, ZpX), (0x6D, Adc, Abs),
        (0x7D, Adc, AbsX), (0x79, Adc, AbsY), (0x61, Adc, IndX), (0x71, Adc, IndY),
        (0x29, And, Imm), (0x25, And, Zp), (0x35, And, ZpX), (0x2D, And, Abs),
        (0x3D, And, AbsX), (0x39, And, AbsY), (0x21, And, IndX), (0x31, And, IndY),
        (0x0A, Asl, Acc), (0x06, Asl, Zp), (0x16, Asl, ZpX), (0x0E, Asl, Abs),
        (0x1E, Asl, AbsX),
        (0x90, Bcc, Rel), (0xB0, Bcs, Rel), (0xF0, Beq, Rel), (0x30, Bmi, Rel),
        (0xD0, Bne, Rel), (0x10, Bpl, Rel), (0x50, Bvc, Rel), (0x70, Bvs, Rel),
        (0x24, Bit, Zp), (0x2C, Bit, Abs),
        (0x00, Brk, Imp),
        (0x18, Clc, Imp), (0xD8, Cld, Imp), (0x58, Cli, Imp), (0xB8, Clv, Imp),
        (0xC9, Cmp, Imm), (0xC5, Cmp, Zp), (0xD5, Cmp, ZpX), (0xCD, Cmp, Abs),
        (0xDD, Cmp, AbsX), (0xD9, Cmp, AbsY), (0xC1, Cmp, IndX), (0xD1, Cmp, IndY),
        (0xE0, Cpx, Imm), (0xE4, Cpx, Zp), (0xEC, Cpx, Abs),
        (0xC0, Cpy, Imm), (0xC4, Cpy, Zp), (0xCC, Cpy, Abs),
        (0xC6, Dec, Zp), (0xD6, Dec, ZpX), (0xCE, Dec, Abs), (0xDE, Dec, AbsX),
        (0xCA, Dex, Imp), (0x88, Dey, Imp),
        (0x49, Eor, Imm), (0x45, Eor, Zp), (0x55, Eor, ZpX), (0x4D, Eor, Abs),
        (0x5D, Eor, AbsX), (0x59, Eor, AbsY), (0x41, Eor, IndX), (0x51, Eor, IndY),
        (0xE6, Inc, Zp), (0xF6, Inc, ZpX), (0xEE, Inc, Abs), (0xFE, Inc, AbsX),
        (0xE8, Inx, Imp), (0xC8, Iny, Imp),
        (0x4C, Jmp, Abs), (0x6C, Jmp, Ind),
        (0x20, Jsr, Abs),
        (0xA9, Lda, Imm), (0xA5, Lda, Zp), (0xB5, Lda, ZpX), (0xAD, Lda, Abs),
        (0xBD, Lda, AbsX), (0xB9, Lda, AbsY), (0xA1, Lda, IndX), (0xB1, Lda, IndY),
        (0xA2, Ldx, Imm), (0xA6, Ldx, Zp), (0xB6, Ldx, ZpY), (0xAE, Ldx, Abs),
        (0xBE, Ldx, AbsY),
        (0xA0, Ldy, Imm), (0xA4, Ldy, Zp), (0xB4, Ldy, ZpX), (0xAC, Ldy, Abs),
        (0xBC, Ldy, AbsX),
        (0x4A, Lsr, Acc), (0x46, Lsr, Zp), (0x56, Lsr, ZpX), (0x4E, Lsr, Abs),
        (0x5E, Lsr, AbsX),
        (0xEA, Nop, Imp),
        (0x09, Ora, Imm), (0x05, Ora, Zp), (0x15, Ora, ZpX), (0x0D, Ora, Abs),
        (0x1D, Ora, AbsX), (0x19, Ora, AbsY), (0x01, Ora, IndX), (0x11, Ora, IndY),
        (0x48, Pha, Imp), (0x08, Php, Imp), (0x68, Pla, Imp), (0x28, Plp, Imp),
        (0x2A, Rol, Acc), (0x26, Rol, Zp), (0x36, Rol, ZpX), (0x2E, Rol, Abs),
        (0x3E, Rol, AbsX),
        (0x6A, Ror, Acc), (0x66, Ror, Zp), (0x76, Ror, ZpX), (0x6E, Ror, Abs),
        (0x7E, Ror, AbsX),
        (0x40, Rti, Imp), (0x60, Rts, Imp),
        (0xE9, Sbc, Imm), (0xE5, Sbc, Zp), (0xF5, Sbc, ZpX), (0xED, Sbc, Abs),
        (0xFD, Sbc, AbsX), (0xF9, Sbc, AbsY), (0xE1, Sbc, IndX), (0xF1, Sbc, IndY),
        (0x38, Sec, Imp), (0xF8, Sed, Imp), (0x78, Sei, Imp),
        (0x85, Sta, Zp), (0x95, Sta, ZpX), (0x8D, Sta, Abs), (0x9D, Sta, AbsX),
        (0x99, Sta, AbsY), (0x81, Sta, IndX), (0x91, Sta, IndY),
        (0x86, Stx, Zp), (0x96, Stx, ZpY), (0x8E, Stx, Abs),
        (0x84, Sty, Zp), (0x94, Sty, ZpX), (0x8C, Sty, Abs),
        (0xAA, Tax, Imp), (0xA8, Tay, Imp), (0xBA, Tsx, Imp), (0x8A, Txa, Imp),
        (0x9A, Txs, Imp), (0x98, Tya, Imp),
    ]
};

/// Opcode-indexed lookup table derived from [`MOS6502_OPCODES`].
pub const MOS6502_DECODE_TABLE: [Option<OpcodeInfo>; 256] = build_decode_table();

const fn build_decode_table() -> [Option<OpcodeInfo>; 256] {
    let mut table = [None; 256];
    let mut index = 0;
    while index < MOS6502_OPCODES.len() {
        let (opcode, mnemonic, mode) = MOS6502_OPCODES[index];
        assert!(
            table[opcode as usize].is_none(),
            "opcode listed twice in 6502 table"
        );
        table[opcode as usize] = Some(OpcodeInfo { mnemonic, mode });
        index += 1;
    }
    table
}
