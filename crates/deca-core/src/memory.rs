//! Main memory: the physical word store and the logical access layer.
//!
//! Physical layout: 2000 words, of which the first 300 form the privileged
//! OS region. Logical addresses are translated through the RB/RL window of
//! the current register file; translation and privilege failures surface as
//! `INT_INVALID_ADDRESS` plus a sentinel word, never as a Rust error.

use std::sync::{Arc, Mutex};

use log::{debug, error, info};

use crate::interrupt::{InterruptCode, InterruptLine};
use crate::state::{OperationMode, Registers};
use crate::word::Word;

/// Total number of memory words.
pub const MEMORY_WORDS: usize = 2000;

/// Number of words reserved for the OS region at the bottom of memory.
pub const OS_RESERVED_WORDS: usize = 300;

/// The physical word store.
///
/// Shared between the CPU (through [`MemoryUnit`]) and the DMA worker,
/// which addresses it physically.
#[derive(Debug)]
pub struct MainMemory {
    cells: Box<[Word]>,
}

impl MainMemory {
    /// Zero-fills the store and marks the OS region with its sentinel.
    #[must_use]
    pub fn new() -> Self {
        let mut cells = vec![Word::ZERO; MEMORY_WORDS].into_boxed_slice();
        for cell in cells.iter_mut().take(OS_RESERVED_WORDS) {
            *cell = Word::OS_RESERVED;
        }
        info!(
            "memory initialized: {MEMORY_WORDS} words total, {OS_RESERVED_WORDS} reserved for the OS"
        );
        Self { cells }
    }

    /// Reads a physical cell. `None` when the address is out of range.
    #[must_use]
    pub fn load(&self, physical: usize) -> Option<Word> {
        self.cells.get(physical).copied()
    }

    /// Writes a physical cell; out-of-range addresses are ignored.
    pub fn store(&mut self, physical: usize, word: Word) {
        if let Some(cell) = self.cells.get_mut(physical) {
            *cell = word;
        }
    }

    /// Copies the clamped range `[start, end]` for inspection.
    #[must_use]
    pub fn snapshot(&self, start: usize, end: usize) -> Vec<Word> {
        let start = start.min(MEMORY_WORDS);
        let end = end.min(MEMORY_WORDS.saturating_sub(1));
        if start > end {
            return Vec::new();
        }
        self.cells[start..=end].to_vec()
    }
}

impl Default for MainMemory {
    fn default() -> Self {
        Self::new()
    }
}

/// Logical access layer over the shared physical store.
///
/// Methods take the register file by reference because translation reads
/// RB/RL and the privilege check reads the PSW; the caller (the CPU) holds
/// the register lock for the duration of the access.
pub struct MemoryUnit {
    cells: Arc<Mutex<MainMemory>>,
    irq: InterruptLine,
}

impl MemoryUnit {
    /// Builds the access layer over a shared store.
    #[must_use]
    pub fn new(cells: Arc<Mutex<MainMemory>>, irq: InterruptLine) -> Self {
        Self { cells, irq }
    }

    /// Translates a logical address through the RB/RL window.
    ///
    /// RB=0 and RL=0 means kernel trust: identity mapping with no bounds
    /// check. Otherwise the physical address must stay inside
    /// `[RB, RB+RL)`; a violation raises `INT_INVALID_ADDRESS` and yields
    /// `None`.
    fn translate(&self, registers: &Registers, logical: i64) -> Option<i64> {
        let base = registers.rb.to_int();
        let limit = registers.rl.to_int();

        if base == 0 && limit == 0 {
            return Some(logical);
        }

        let physical = logical + base;
        if physical < base || physical >= base + limit {
            error!(
                "memory violation: address {logical} outside window [RB={base}, RL={limit}]"
            );
            self.irq.raise_with(registers, InterruptCode::InvalidAddress);
            return None;
        }
        Some(physical)
    }

    /// Reads the word at a logical address.
    ///
    /// Failures return a sentinel instead of data: `MEM_ERR` for a
    /// translation fault, `ADDR_ERR` for a physical address outside the
    /// store, `PRIV_ERR` for a user-mode touch of the OS region.
    pub fn read(&self, registers: &mut Registers, logical: i64) -> Word {
        let Some(physical) = self.translate(registers, logical) else {
            return Word::MEM_ERR;
        };

        if physical < 0 || physical >= MEMORY_WORDS as i64 {
            error!("invalid physical address {physical}");
            return Word::ADDR_ERR;
        }

        if physical < OS_RESERVED_WORDS as i64 && registers.psw.mode == OperationMode::User {
            error!("user-mode read of the OS region at {physical}");
            self.irq.raise_with(registers, InterruptCode::InvalidAddress);
            return Word::PRIV_ERR;
        }

        let word = crate::lock(&self.cells).cells[physical as usize];
        debug!("read: logical={logical} -> physical={physical} = {word}");
        word
    }

    /// Writes a word to a logical address. Failed accesses are skipped
    /// after the same fault reporting as [`MemoryUnit::read`].
    pub fn write(&self, registers: &mut Registers, logical: i64, word: Word) {
        let Some(physical) = self.translate(registers, logical) else {
            return;
        };

        if physical < 0 || physical >= MEMORY_WORDS as i64 {
            error!("invalid physical address {physical} for write");
            return;
        }

        if physical < OS_RESERVED_WORDS as i64 && registers.psw.mode == OperationMode::User {
            error!("user-mode write to the OS region at {physical}");
            self.irq.raise_with(registers, InterruptCode::InvalidAddress);
            return;
        }

        crate::lock(&self.cells).cells[physical as usize] = word;
        debug!("write: logical={logical} -> physical={physical} = {word}");
    }

    /// Installs a process window: RB := base, RL := limit.
    pub fn set_region(&self, registers: &mut Registers, base: i64, limit: i64) {
        registers.rb = Word::from_int(base);
        registers.rl = Word::from_int(limit);
        info!("memory region configured: RB={base}, RL={limit}");
    }
}
