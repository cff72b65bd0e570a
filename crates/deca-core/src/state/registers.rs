//! The register file and program status word.

use log::debug;

use crate::word::Word;

/// Condition code: last result was zero, or the compared values were equal.
pub const CC_EQUAL: u8 = 0;
/// Condition code: last result was negative, or less-than on compare.
pub const CC_LESS: u8 = 1;
/// Condition code: last result was positive, or greater-than on compare.
pub const CC_GREATER: u8 = 2;
/// Condition code: arithmetic overflow.
pub const CC_OVERFLOW: u8 = 3;

/// Largest value representable by the 10-bit PC mirror in the PSW.
pub const PC_MIRROR_MAX: u16 = 1023;

/// Privilege mode carried in the PSW.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum OperationMode {
    /// Unprivileged: the OS region is off limits.
    User = 0,
    /// Privileged: full physical address range.
    Kernel = 1,
}

/// Program status word.
///
/// The condition code is a plain byte rather than an enum: the documented
/// domain is 0..=3 but the underflow interrupt handler parks the marker
/// value 7 there, and the packing helpers must carry it through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Psw {
    /// Condition code, usually one of [`CC_EQUAL`]..[`CC_OVERFLOW`].
    pub condition_code: u8,
    /// Current privilege mode.
    pub mode: OperationMode,
    /// Interrupt-enable gate checked by `trigger`.
    pub interrupt_enabled: bool,
    /// Clipped 10-bit mirror of the PC, kept for fast predicates.
    pub pc_psw: u16,
}

/// The architectural register file.
///
/// Every register is a [`Word`]; the PSW is the only structured field. The
/// PC additionally maintains its clipped mirror inside the PSW, so all PC
/// updates must go through [`Registers::set_pc`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Registers {
    /// Accumulator.
    pub ac: Word,
    /// Memory address register, written during fetch.
    pub mar: Word,
    /// Memory data register, written during fetch.
    pub mdr: Word,
    /// Instruction register.
    pub ir: Word,
    /// Base register of the current logical window.
    pub rb: Word,
    /// Limit register of the current logical window.
    pub rl: Word,
    /// Stack base register. Reserved; nothing in the ISA writes it.
    pub rx: Word,
    /// Stack pointer, grows downward from 1023.
    pub sp: Word,
    /// Program counter (full value; the PSW carries the clipped mirror).
    pub pc: Word,
    /// Program status word.
    pub psw: Psw,
}

impl Registers {
    /// Builds the power-on register file: everything zero except RL=1024
    /// and SP=1023, kernel mode, interrupts disabled.
    #[must_use]
    pub fn new() -> Self {
        debug!("registers initialized");
        Self {
            ac: Word::ZERO,
            mar: Word::ZERO,
            mdr: Word::ZERO,
            ir: Word::ZERO,
            rb: Word::ZERO,
            rl: Word::from_int(1024),
            rx: Word::ZERO,
            sp: Word::from_int(1023),
            pc: Word::ZERO,
            psw: Psw {
                condition_code: CC_EQUAL,
                mode: OperationMode::Kernel,
                interrupt_enabled: false,
                pc_psw: 0,
            },
        }
    }

    /// Writes the PC and refreshes the clipped PSW mirror.
    pub fn set_pc(&mut self, value: i64) {
        self.pc = Word::from_int(value);
        self.psw.pc_psw = value.clamp(0, i64::from(PC_MIRROR_MAX)) as u16;
        debug!("pc updated to {value}");
    }

    /// Reads the PC as an integer.
    #[must_use]
    pub fn pc_value(&self) -> i64 {
        self.pc.to_int()
    }

    /// Sets the condition code from the sign of `result`.
    ///
    /// The overflow code is never set here; arithmetic callers assign it
    /// explicitly after their range check.
    pub fn update_condition_code(&mut self, result: i64) {
        self.psw.condition_code = if result == 0 {
            CC_EQUAL
        } else if result < 0 {
            CC_LESS
        } else {
            CC_GREATER
        };
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl Psw {
    /// Packs the PSW into its 16-bit layout: condition code in bits 0..4,
    /// mode in bit 4, interrupt enable in bit 5, PC mirror in bits 6..16.
    #[must_use]
    pub const fn pack(&self) -> u16 {
        let mut value = (self.condition_code & 0xF) as u16;
        value |= (self.mode as u16) << 4;
        value |= (self.interrupt_enabled as u16) << 5;
        value |= (self.pc_psw & 0x3FF) << 6;
        value
    }

    /// Unpacks a 16-bit value into PSW fields.
    #[must_use]
    pub const fn unpack(value: u16) -> Self {
        Self {
            condition_code: (value & 0xF) as u8,
            mode: if value & 0x10 != 0 {
                OperationMode::Kernel
            } else {
                OperationMode::User
            },
            interrupt_enabled: value & 0x20 != 0,
            pc_psw: (value >> 6) & 0x3FF,
        }
    }
}

/// Renders the packed PSW as a word, for the register dump.
#[must_use]
pub fn psw_to_word(psw: &Psw) -> Word {
    Word::from_int(i64::from(psw.pack()))
}

/// Rebuilds PSW fields from a packed word. Negative values clear to zero
/// before the bit extraction.
#[must_use]
pub fn word_to_psw(word: Word) -> Psw {
    let value = word.to_int().max(0);
    Psw::unpack((value & 0xFFFF) as u16)
}
