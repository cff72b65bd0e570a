//! Core emulation library for the DECA-2000, a pedagogical von Neumann
//! machine with decimal 8-character words.
//!
//! The machine couples a fetch/decode/execute CPU, a word-addressed memory
//! with base/limit protection, a static-vector interrupt controller, a
//! bus-arbitrated DMA engine on a background thread, and a
//! cylinder/head/sector disk. [`Machine`] owns one of each and is the
//! embedding surface for hosts such as the operator console.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// The 8-character machine word and its integer codec.
pub mod word;
pub use word::{Word, WORD_LEN, WORD_MAX};

/// Register file, PSW, and CPU run states.
pub mod state;
pub use state::{
    psw_to_word, word_to_psw, CpuState, OperationMode, Psw, Registers, CC_EQUAL, CC_GREATER,
    CC_LESS, CC_OVERFLOW, PC_MIRROR_MAX,
};

/// Main memory: physical store plus the logical access layer.
pub mod memory;
pub use memory::{MainMemory, MemoryUnit, MEMORY_WORDS, OS_RESERVED_WORDS};

/// The cylinder/head/sector disk store.
pub mod disk;
pub use disk::{Disk, CYLINDERS, SECTORS_PER_CYLINDER, SECTOR_BYTES, TRACKS};

/// Interrupt codes, pending bits, and the dispatch vector.
pub mod interrupt;
pub use interrupt::{InterruptCode, InterruptController, InterruptLine, INTERRUPT_COUNT};

/// The background DMA transfer engine.
pub mod dma;
pub use dma::{DmaController, DmaOperation, DmaState, DmaStatus};

/// Instruction decode pipeline.
pub mod decoder;
pub use decoder::{
    AddressingMode, DecodeError, DecodedInstruction, DecodedOrInvalid, Decoder, Opcode,
};

mod execute;

/// The owning machine container and cycle loop.
pub mod machine;
pub use machine::{Machine, StepReport, CYCLE_PACING};

/// Program loading seam.
pub mod loader;
pub use loader::ProgramLoader;

/// Locks a mutex, recovering the guard from a poisoned lock. A panicking
/// DMA worker must not wedge the whole machine.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
