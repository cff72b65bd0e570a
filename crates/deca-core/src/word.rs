//! The 8-character decimal machine word and its integer codec.
//!
//! Every memory cell, register, and disk sector holds one [`Word`]: eight
//! bytes encoding a sign digit (`'0'` positive, `'1'` negative) followed by a
//! seven-digit magnitude. The codec functions on this type are the only way
//! to cross between the textual view and the native integer view. Reserved
//! sentinel words carry non-digit bytes and deliberately fail the codec.

use std::fmt;

use log::error;

/// Number of bytes in one machine word.
pub const WORD_LEN: usize = 8;

/// Largest magnitude representable by the seven-digit field.
pub const WORD_MAX: i64 = 9_999_999;

/// One 8-byte machine word.
///
/// The payload is either `sign + 7 digits` or one of the reserved sentinel
/// byte strings. Sentinels shorter than eight bytes are NUL-padded; longer
/// ones are truncated to the first eight bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(transparent)]
pub struct Word([u8; WORD_LEN]);

const fn sentinel(text: &[u8]) -> Word {
    let mut bytes = [0u8; WORD_LEN];
    let mut index = 0;
    while index < text.len() && index < WORD_LEN {
        bytes[index] = text[index];
        index += 1;
    }
    Word(bytes)
}

impl Word {
    /// The all-zero word, also the initial content of memory and disk.
    pub const ZERO: Self = Self(*b"00000000");

    /// Marks cells inside the privileged OS region after memory init.
    pub const OS_RESERVED: Self = sentinel(b"OS_RESERVED");

    /// Returned by a read whose logical address failed translation.
    pub const MEM_ERR: Self = sentinel(b"MEM_ERR");

    /// Returned by a read whose physical address left the backing store.
    pub const ADDR_ERR: Self = sentinel(b"ADDR_ERR");

    /// Returned by a user-mode read of the privileged OS region.
    pub const PRIV_ERR: Self = sentinel(b"PRIV_ERR");

    /// Produced by the codec when a value exceeds the seven-digit range.
    pub const OVERFLOW: Self = sentinel(b"OVERFLOW");

    /// Returned by a disk read with out-of-range coordinates.
    pub const ERROR: Self = sentinel(b"ERROR");

    /// Wraps raw bytes as a word without validation.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; WORD_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the raw byte payload.
    #[must_use]
    pub const fn bytes(&self) -> &[u8; WORD_LEN] {
        &self.0
    }

    /// Builds a word from arbitrary text, truncating or NUL-padding to
    /// eight bytes. Used by the disk when storing sector payloads.
    #[must_use]
    pub fn from_text(text: &[u8]) -> Self {
        let mut bytes = [0u8; WORD_LEN];
        let take = text.len().min(WORD_LEN);
        bytes[..take].copy_from_slice(&text[..take]);
        Self(bytes)
    }

    /// Encodes an integer as a sign+magnitude word.
    ///
    /// Values whose magnitude exceeds [`WORD_MAX`] cannot round-trip; the
    /// failure is logged and the [`Word::OVERFLOW`] sentinel is returned.
    #[must_use]
    pub fn from_int(value: i64) -> Self {
        if value.abs() > WORD_MAX {
            error!("value {value} exceeds the 7-digit word range");
            return Self::OVERFLOW;
        }

        let mut bytes = [0u8; WORD_LEN];
        bytes[0] = if value < 0 { b'1' } else { b'0' };
        let mut magnitude = value.unsigned_abs();
        for slot in bytes[1..].iter_mut().rev() {
            *slot = b'0' + (magnitude % 10) as u8;
            magnitude /= 10;
        }
        Self(bytes)
    }

    /// Decodes this word as a signed integer.
    ///
    /// Fail-soft: a payload that is not `sign + 7 digits` (sentinels
    /// included) logs an error and decodes as 0.
    #[must_use]
    pub fn to_int(self) -> i64 {
        if self.0[0] != b'0' && self.0[0] != b'1' {
            error!("word {} is not a sign+magnitude value", self);
            return 0;
        }

        let mut magnitude: i64 = 0;
        for byte in &self.0[1..] {
            if !byte.is_ascii_digit() {
                error!("word {} is not a sign+magnitude value", self);
                return 0;
            }
            magnitude = magnitude * 10 + i64::from(byte - b'0');
        }

        if self.0[0] == b'1' {
            -magnitude
        } else {
            magnitude
        }
    }

    /// Returns `true` when every byte is an ASCII digit.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.0.iter().all(u8::is_ascii_digit)
    }
}

impl Default for Word {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter().take_while(|byte| **byte != 0) {
            write!(f, "{}", char::from(*byte))?;
        }
        Ok(())
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Word({})", self)
    }
}
