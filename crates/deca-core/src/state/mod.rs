//! Architectural CPU state: the register file and the run-state machine.

/// Register file, PSW bitfield, and packing helpers.
pub mod registers;
/// Host-observable CPU run states.
pub mod run_state;

pub use registers::{
    psw_to_word, word_to_psw, OperationMode, Psw, Registers, CC_EQUAL, CC_GREATER, CC_LESS,
    CC_OVERFLOW, PC_MIRROR_MAX,
};
pub use run_state::CpuState;
