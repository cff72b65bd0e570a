//! Interrupt controller: static 9-slot vector, pending bits, dispatch.
//!
//! Interrupts are latched into per-code pending bits and dispatched by the
//! CPU once per cycle after execute, in ascending code order. The pending
//! bits are atomics published with release/acquire ordering because the DMA
//! worker raises the I/O completion code from its own thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, error, info};
use thiserror::Error;

use crate::state::{OperationMode, Registers, CC_OVERFLOW};

/// Number of interrupt vector slots.
pub const INTERRUPT_COUNT: usize = 9;

/// Condition-code marker parked by the underflow handler. Outside the
/// documented 0..=3 domain; nothing reads it back.
const CC_UNDERFLOW_MARK: u8 = 7;

/// Stable interrupt code taxonomy, one per vector slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum InterruptCode {
    /// A system call carried an unknown service number.
    #[error("invalid syscall code")]
    InvalidSyscall = 0,
    /// An interrupt was raised with a code outside the vector.
    #[error("invalid interrupt code")]
    InvalidInterrupt = 1,
    /// Service call entry.
    #[error("system call")]
    Syscall = 2,
    /// Periodic timer tick.
    #[error("timer")]
    Timer = 3,
    /// A device transfer finished.
    #[error("i/o completion")]
    IoCompletion = 4,
    /// Decode produced no executable instruction.
    #[error("invalid instruction")]
    InvalidInstruction = 5,
    /// A memory access failed translation or privilege.
    #[error("invalid address")]
    InvalidAddress = 6,
    /// Arithmetic underflow.
    #[error("underflow")]
    Underflow = 7,
    /// Arithmetic overflow.
    #[error("overflow")]
    Overflow = 8,
}

impl InterruptCode {
    /// All codes in dispatch (ascending) order.
    pub const ALL: [Self; INTERRUPT_COUNT] = [
        Self::InvalidSyscall,
        Self::InvalidInterrupt,
        Self::Syscall,
        Self::Timer,
        Self::IoCompletion,
        Self::InvalidInstruction,
        Self::InvalidAddress,
        Self::Underflow,
        Self::Overflow,
    ];

    /// Returns the vector slot index for this code.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Maps a slot index back to its code.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::InvalidSyscall),
            1 => Some(Self::InvalidInterrupt),
            2 => Some(Self::Syscall),
            3 => Some(Self::Timer),
            4 => Some(Self::IoCompletion),
            5 => Some(Self::InvalidInstruction),
            6 => Some(Self::InvalidAddress),
            7 => Some(Self::Underflow),
            8 => Some(Self::Overflow),
            _ => None,
        }
    }
}

/// Per-code pending latches. Multiple raises while pending collapse into
/// one dispatch.
#[derive(Debug, Default)]
struct PendingSet {
    bits: [AtomicBool; INTERRUPT_COUNT],
}

impl PendingSet {
    fn set(&self, code: InterruptCode) {
        self.bits[code.as_u8() as usize].store(true, Ordering::Release);
    }

    fn clear(&self, code: InterruptCode) {
        self.bits[code.as_u8() as usize].store(false, Ordering::Release);
    }

    fn is_set(&self, code: InterruptCode) -> bool {
        self.bits[code.as_u8() as usize].load(Ordering::Acquire)
    }
}

/// Raise-only handle to the interrupt controller.
///
/// Cheap to clone; the memory unit, the CPU, and the DMA worker each hold
/// one. Raising consults `PSW.interrupt_enabled`, so the line also carries
/// a shared reference to the register file.
#[derive(Clone)]
pub struct InterruptLine {
    pending: Arc<PendingSet>,
    registers: Arc<Mutex<Registers>>,
}

impl InterruptLine {
    /// Latches `code` as pending when interrupts are enabled; otherwise
    /// the raise is dropped with a debug record. Locks the register file.
    pub fn raise(&self, code: InterruptCode) {
        let registers = crate::lock(&self.registers);
        self.raise_with(&registers, code);
    }

    /// Same as [`InterruptLine::raise`] for callers that already hold the
    /// register file lock.
    pub fn raise_with(&self, registers: &Registers, code: InterruptCode) {
        if registers.psw.interrupt_enabled {
            self.pending.set(code);
            debug!("interrupt {} marked pending", code.as_u8());
        } else {
            debug!(
                "interrupt {} dropped (interrupts disabled)",
                code.as_u8()
            );
        }
    }

    /// Raises an untyped code. Codes outside the vector degrade to
    /// [`InterruptCode::InvalidInterrupt`].
    pub fn raise_raw(&self, code: i64) {
        let parsed = u8::try_from(code).ok().and_then(InterruptCode::from_u8);
        match parsed {
            Some(code) => self.raise(code),
            None => {
                error!("interrupt code {code} is outside the vector");
                self.raise(InterruptCode::InvalidInterrupt);
            }
        }
    }

    /// Reads a pending bit without clearing it.
    #[must_use]
    pub fn is_pending(&self, code: InterruptCode) -> bool {
        self.pending.is_set(code)
    }
}

type Handler = fn(&mut Registers);

/// The interrupt controller: fixed handler vector plus pending bits.
pub struct InterruptController {
    line: InterruptLine,
    handlers: [Handler; INTERRUPT_COUNT],
}

impl InterruptController {
    /// Installs the static vector and clears every pending bit.
    #[must_use]
    pub fn new(registers: Arc<Mutex<Registers>>) -> Self {
        let controller = Self {
            line: InterruptLine {
                pending: Arc::new(PendingSet::default()),
                registers,
            },
            handlers: [
                invalid_syscall_handler,
                invalid_interrupt_handler,
                syscall_handler,
                timer_handler,
                io_completion_handler,
                invalid_instruction_handler,
                invalid_address_handler,
                underflow_handler,
                overflow_handler,
            ],
        };
        info!("interrupt vector installed ({INTERRUPT_COUNT} slots)");
        controller
    }

    /// Returns a raise-only handle for other subsystems.
    #[must_use]
    pub fn line(&self) -> InterruptLine {
        self.line.clone()
    }

    /// Dispatches every pending interrupt in ascending code order.
    ///
    /// Each dispatch saves context, forces kernel mode, runs the handler,
    /// clears the pending bit, and restores context. The context hooks are
    /// no-ops here but stay in the call path so a richer implementation
    /// can push stack frames without touching the dispatcher.
    pub fn handle_pending(&self) {
        let mut registers = crate::lock(&self.line.registers);
        for code in InterruptCode::ALL {
            if !self.line.pending.is_set(code) {
                continue;
            }
            debug!("dispatching pending interrupt {}", code.as_u8());
            save_context(&mut registers);
            registers.psw.mode = OperationMode::Kernel;
            self.handlers[code.as_u8() as usize](&mut registers);
            self.line.pending.clear(code);
            restore_context(&mut registers);
        }
    }
}

fn save_context(_registers: &mut Registers) {
    debug!("context saved (stub)");
}

fn restore_context(_registers: &mut Registers) {
    debug!("context restored (stub)");
}

fn invalid_syscall_handler(_registers: &mut Registers) {
    info!(target: "interrupt", "interrupt 0: invalid syscall code");
}

fn invalid_interrupt_handler(_registers: &mut Registers) {
    info!(target: "interrupt", "interrupt 1: invalid interrupt code");
}

fn syscall_handler(registers: &mut Registers) {
    info!(target: "interrupt", "interrupt 2: system call");
    registers.psw.mode = OperationMode::Kernel;
}

fn timer_handler(_registers: &mut Registers) {
    info!(target: "interrupt", "interrupt 3: timer");
}

fn io_completion_handler(_registers: &mut Registers) {
    info!(target: "interrupt", "interrupt 4: i/o operation complete");
}

fn invalid_instruction_handler(_registers: &mut Registers) {
    info!(target: "interrupt", "interrupt 5: invalid instruction");
}

fn invalid_address_handler(registers: &mut Registers) {
    info!(target: "interrupt", "interrupt 6: invalid addressing");
    error!("faulting access at address {}", registers.mar.to_int());
}

fn underflow_handler(registers: &mut Registers) {
    info!(target: "interrupt", "interrupt 7: underflow");
    registers.psw.condition_code = CC_UNDERFLOW_MARK;
}

fn overflow_handler(registers: &mut Registers) {
    info!(target: "interrupt", "interrupt 8: overflow");
    registers.psw.condition_code = CC_OVERFLOW;
}
