//! Instruction decoder for the 8-digit word encoding.
//!
//! An executable word reads `OO M VVVVV`: a two-digit opcode, one
//! addressing-mode digit, and a five-digit value. Decode validates the
//! digits, classifies the opcode, and resolves the effective address, so
//! the execute stage only ever sees well-formed instructions.

use thiserror::Error;

use crate::word::Word;

/// Addressing modes of the ISA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum AddressingMode {
    /// The value is a memory address.
    Direct = 0,
    /// The value is the operand itself.
    Immediate = 1,
    /// The address is AC plus the value.
    Indexed = 2,
}

impl AddressingMode {
    /// Decodes the mode digit.
    #[must_use]
    pub const fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            0 => Some(Self::Direct),
            1 => Some(Self::Immediate),
            2 => Some(Self::Indexed),
            _ => None,
        }
    }
}

/// Assigned opcodes. Gaps (20..=24, 37..=39, 46..) are reserved and decode
/// as invalid instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
#[repr(u8)]
pub enum Opcode {
    Sum = 0,
    Res = 1,
    Mult = 2,
    Divi = 3,
    Load = 4,
    Str = 5,
    Cmp = 6,
    Tst = 7,
    Mov = 8,
    Jeq = 9,
    Jgt = 10,
    Jlt = 11,
    Jov = 12,
    Svc = 13,
    Call = 14,
    Ret = 15,
    Ldr = 16,
    Strr = 17,
    Ldrl = 18,
    Strl = 19,
    Push = 25,
    Pop = 26,
    Jmp = 27,
    Dmar = 28,
    Dmaw = 29,
    Dmawait = 30,
    Dmas = 31,
    Dmac = 32,
    Dmaz = 33,
    In = 34,
    Out = 35,
    Iost = 36,
    Halt = 40,
    Nop = 41,
    Ei = 42,
    Di = 43,
    Swuser = 44,
    Swkern = 45,
}

impl Opcode {
    /// Classifies a two-digit opcode field.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Sum),
            1 => Some(Self::Res),
            2 => Some(Self::Mult),
            3 => Some(Self::Divi),
            4 => Some(Self::Load),
            5 => Some(Self::Str),
            6 => Some(Self::Cmp),
            7 => Some(Self::Tst),
            8 => Some(Self::Mov),
            9 => Some(Self::Jeq),
            10 => Some(Self::Jgt),
            11 => Some(Self::Jlt),
            12 => Some(Self::Jov),
            13 => Some(Self::Svc),
            14 => Some(Self::Call),
            15 => Some(Self::Ret),
            16 => Some(Self::Ldr),
            17 => Some(Self::Strr),
            18 => Some(Self::Ldrl),
            19 => Some(Self::Strl),
            25 => Some(Self::Push),
            26 => Some(Self::Pop),
            27 => Some(Self::Jmp),
            28 => Some(Self::Dmar),
            29 => Some(Self::Dmaw),
            30 => Some(Self::Dmawait),
            31 => Some(Self::Dmas),
            32 => Some(Self::Dmac),
            33 => Some(Self::Dmaz),
            34 => Some(Self::In),
            35 => Some(Self::Out),
            36 => Some(Self::Iost),
            40 => Some(Self::Halt),
            41 => Some(Self::Nop),
            42 => Some(Self::Ei),
            43 => Some(Self::Di),
            44 => Some(Self::Swuser),
            45 => Some(Self::Swkern),
            _ => None,
        }
    }

    /// Assembly mnemonic, for the debugger printout.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Sum => "SUM",
            Self::Res => "RES",
            Self::Mult => "MULT",
            Self::Divi => "DIVI",
            Self::Load => "LOAD",
            Self::Str => "STR",
            Self::Cmp => "CMP",
            Self::Tst => "TST",
            Self::Mov => "MOV",
            Self::Jeq => "JEQ",
            Self::Jgt => "JGT",
            Self::Jlt => "JLT",
            Self::Jov => "JOV",
            Self::Svc => "SVC",
            Self::Call => "CALL",
            Self::Ret => "RET",
            Self::Ldr => "LDR",
            Self::Strr => "STRR",
            Self::Ldrl => "LDRL",
            Self::Strl => "STRL",
            Self::Push => "PUSH",
            Self::Pop => "POP",
            Self::Jmp => "JMP",
            Self::Dmar => "DMAR",
            Self::Dmaw => "DMAW",
            Self::Dmawait => "DMAWAIT",
            Self::Dmas => "DMAS",
            Self::Dmac => "DMAC",
            Self::Dmaz => "DMAZ",
            Self::In => "IN",
            Self::Out => "OUT",
            Self::Iost => "IOST",
            Self::Halt => "HALT",
            Self::Nop => "NOP",
            Self::Ei => "EI",
            Self::Di => "DI",
            Self::Swuser => "SWUSER",
            Self::Swkern => "SWKERN",
        }
    }
}

/// A fully decoded instruction ready for execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedInstruction {
    /// Classified opcode.
    pub opcode: Opcode,
    /// Addressing mode.
    pub mode: AddressingMode,
    /// Raw five-digit value field.
    pub value: i64,
    /// Resolved effective address (AC + value for indexed mode).
    pub effective_address: i64,
}

/// Why a word failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum DecodeError {
    /// The word is not eight ASCII digits.
    #[error("word is not an 8-digit instruction")]
    MalformedWord,
    /// The mode digit is outside 0..=2.
    #[error("addressing mode digit {0} is not defined")]
    BadMode(u8),
    /// The opcode field is reserved or unassigned.
    #[error("opcode {0:02} is not assigned")]
    UnassignedOpcode(u8),
}

/// Decode result: an instruction or the reason it is invalid. Invalid
/// decodes surface as `INT_INVALID_INSTRUCTION` in the execute stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedOrInvalid {
    /// A well-formed instruction.
    Instruction(DecodedInstruction),
    /// Decoding failed.
    Invalid(DecodeError),
}

impl DecodedOrInvalid {
    /// Returns the instruction when decoding succeeded.
    #[must_use]
    pub const fn instruction(self) -> Option<DecodedInstruction> {
        match self {
            Self::Instruction(instruction) => Some(instruction),
            Self::Invalid(_) => None,
        }
    }
}

/// The instruction decoder.
pub struct Decoder;

impl Decoder {
    /// Decodes one word. `ac` is the current accumulator value, needed to
    /// resolve indexed effective addresses at decode time.
    #[must_use]
    pub fn decode(word: Word, ac: i64) -> DecodedOrInvalid {
        let bytes = word.bytes();
        if !word.is_numeric() {
            return DecodedOrInvalid::Invalid(DecodeError::MalformedWord);
        }

        let opcode_field = (bytes[0] - b'0') * 10 + (bytes[1] - b'0');
        let mode_digit = bytes[2] - b'0';
        let value = bytes[3..]
            .iter()
            .fold(0i64, |acc, byte| acc * 10 + i64::from(byte - b'0'));

        let Some(mode) = AddressingMode::from_digit(mode_digit) else {
            return DecodedOrInvalid::Invalid(DecodeError::BadMode(mode_digit));
        };

        let Some(opcode) = Opcode::from_u8(opcode_field) else {
            return DecodedOrInvalid::Invalid(DecodeError::UnassignedOpcode(opcode_field));
        };

        let effective_address = match mode {
            AddressingMode::Direct | AddressingMode::Immediate => value,
            AddressingMode::Indexed => ac + value,
        };

        DecodedOrInvalid::Instruction(DecodedInstruction {
            opcode,
            mode,
            value,
            effective_address,
        })
    }
}
