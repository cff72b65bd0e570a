//! The execute stage of the CPU cycle.
//!
//! Memory faults never abort an instruction: the memory unit reports them
//! as interrupts and hands back a sentinel, which decodes to 0 wherever an
//! integer was expected. The only instruction that stops the machine is
//! HALT.

use std::sync::{Arc, Mutex};

use log::{debug, info, warn};

use crate::decoder::{AddressingMode, DecodedInstruction, DecodedOrInvalid, Opcode};
use crate::dma::{DmaController, DmaOperation};
use crate::interrupt::{InterruptCode, InterruptLine};
use crate::memory::MemoryUnit;
use crate::state::{OperationMode, Registers, CC_EQUAL, CC_GREATER, CC_LESS, CC_OVERFLOW};
use crate::word::{Word, WORD_MAX};

/// What the cycle loop should do after this instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecuteOutcome {
    Continue,
    Halt,
}

pub(crate) fn execute_instruction(
    decoded: DecodedOrInvalid,
    registers: &Arc<Mutex<Registers>>,
    memory: &MemoryUnit,
    dma: &DmaController,
    irq: &InterruptLine,
) -> ExecuteOutcome {
    let instruction = match decoded {
        DecodedOrInvalid::Instruction(instruction) => instruction,
        DecodedOrInvalid::Invalid(reason) => {
            warn!("instruction rejected: {reason}");
            irq.raise(InterruptCode::InvalidInstruction);
            return ExecuteOutcome::Continue;
        }
    };

    debug!(
        "execute: {} mode={:?} value={} ea={}",
        instruction.opcode.mnemonic(),
        instruction.mode,
        instruction.value,
        instruction.effective_address
    );

    match instruction.opcode {
        Opcode::Sum | Opcode::Res | Opcode::Mult | Opcode::Divi => {
            arithmetic(&instruction, registers, memory, irq);
        }

        Opcode::Load => {
            let mut regs = crate::lock(registers);
            let word = if instruction.mode == AddressingMode::Immediate {
                Word::from_int(instruction.value)
            } else {
                memory.read(&mut regs, instruction.effective_address)
            };
            regs.ac = word;
        }
        Opcode::Str => {
            let mut regs = crate::lock(registers);
            let ac = regs.ac;
            memory.write(&mut regs, instruction.effective_address, ac);
        }

        Opcode::Cmp => {
            let mut regs = crate::lock(registers);
            let a = regs.ac.to_int();
            let operand = operand_value(&mut regs, memory, &instruction);
            regs.update_condition_code(a - operand);
        }
        Opcode::Tst => {
            let mut regs = crate::lock(registers);
            let a = regs.ac.to_int();
            let operand = operand_value(&mut regs, memory, &instruction);
            regs.update_condition_code(a & operand);
        }
        Opcode::Mov => {
            let mut regs = crate::lock(registers);
            let operand = operand_value(&mut regs, memory, &instruction);
            regs.ac = Word::from_int(operand);
        }

        Opcode::Jeq | Opcode::Jgt | Opcode::Jlt | Opcode::Jov => {
            let wanted = match instruction.opcode {
                Opcode::Jeq => CC_EQUAL,
                Opcode::Jgt => CC_GREATER,
                Opcode::Jlt => CC_LESS,
                _ => CC_OVERFLOW,
            };
            let mut regs = crate::lock(registers);
            if regs.psw.condition_code == wanted {
                regs.set_pc(instruction.effective_address);
            }
        }
        Opcode::Jmp => {
            crate::lock(registers).set_pc(instruction.effective_address);
        }

        Opcode::Svc => irq.raise(InterruptCode::Syscall),

        Opcode::Call => {
            let mut regs = crate::lock(registers);
            let sp = regs.sp.to_int();
            let return_address = Word::from_int(regs.pc.to_int());
            memory.write(&mut regs, sp, return_address);
            regs.sp = Word::from_int(sp - 1);
            regs.set_pc(instruction.effective_address);
        }
        Opcode::Ret => {
            let mut regs = crate::lock(registers);
            let sp = regs.sp.to_int() + 1;
            regs.sp = Word::from_int(sp);
            let return_address = memory.read(&mut regs, sp);
            regs.set_pc(return_address.to_int());
        }

        Opcode::Ldr => {
            let mut regs = crate::lock(registers);
            let rb = regs.rb;
            regs.ac = rb;
        }
        Opcode::Strr => {
            let mut regs = crate::lock(registers);
            let ac = regs.ac;
            regs.rb = ac;
        }
        Opcode::Ldrl => {
            let mut regs = crate::lock(registers);
            let rl = regs.rl;
            regs.ac = rl;
        }
        Opcode::Strl => {
            let mut regs = crate::lock(registers);
            let ac = regs.ac;
            regs.rl = ac;
        }

        Opcode::Push => {
            let mut regs = crate::lock(registers);
            let sp = regs.sp.to_int();
            let ac = regs.ac;
            memory.write(&mut regs, sp, ac);
            regs.sp = Word::from_int(sp - 1);
        }
        Opcode::Pop => {
            let mut regs = crate::lock(registers);
            let sp = regs.sp.to_int() + 1;
            regs.sp = Word::from_int(sp);
            let word = memory.read(&mut regs, sp);
            regs.ac = word;
        }

        Opcode::Dmar => {
            dma.set_memory_address(instruction.value);
            dma.set_operation(DmaOperation::Read);
            dma.start_transfer();
        }
        Opcode::Dmaw => {
            dma.set_memory_address(instruction.value);
            dma.set_operation(DmaOperation::Write);
            dma.start_transfer();
        }
        Opcode::Dmawait => dma.wait_completion(),
        Opcode::Dmas => {
            crate::lock(registers).ac = Word::from_int(dma.status() as i64);
        }
        Opcode::Dmac => {
            let value = instruction.value;
            dma.set_disk_location(value / 10_000, (value % 10_000) / 100, value % 100);
        }
        Opcode::Dmaz => dma.set_transfer_size(instruction.value),

        Opcode::In | Opcode::Out | Opcode::Iost => {
            info!(
                "i/o operation {} requested",
                instruction.opcode.mnemonic()
            );
            irq.raise(InterruptCode::IoCompletion);
        }

        Opcode::Halt => {
            info!("cpu halted by instruction");
            return ExecuteOutcome::Halt;
        }
        Opcode::Nop => {}
        Opcode::Ei => crate::lock(registers).psw.interrupt_enabled = true,
        Opcode::Di => crate::lock(registers).psw.interrupt_enabled = false,
        Opcode::Swuser => crate::lock(registers).psw.mode = OperationMode::User,
        Opcode::Swkern => crate::lock(registers).psw.mode = OperationMode::Kernel,
    }

    ExecuteOutcome::Continue
}

/// Resolves the operand: the value field for immediate mode, otherwise the
/// word at the effective address coerced to an integer.
fn operand_value(
    registers: &mut Registers,
    memory: &MemoryUnit,
    instruction: &DecodedInstruction,
) -> i64 {
    if instruction.mode == AddressingMode::Immediate {
        instruction.value
    } else {
        memory.read(registers, instruction.effective_address).to_int()
    }
}

fn arithmetic(
    instruction: &DecodedInstruction,
    registers: &Arc<Mutex<Registers>>,
    memory: &MemoryUnit,
    irq: &InterruptLine,
) {
    let mut regs = crate::lock(registers);
    let a = regs.ac.to_int();
    let operand = operand_value(&mut regs, memory, instruction);

    let result = match instruction.opcode {
        Opcode::Sum => a + operand,
        Opcode::Res => a - operand,
        Opcode::Mult => a * operand,
        // Division by zero yields 0 silently; only the word-range check
        // below raises an interrupt, and never for DIVI.
        _ => {
            if operand == 0 {
                0
            } else {
                a / operand
            }
        }
    };

    regs.ac = Word::from_int(result);
    regs.update_condition_code(result);

    if instruction.opcode != Opcode::Divi && result.abs() > WORD_MAX {
        regs.psw.condition_code = CC_OVERFLOW;
        irq.raise_with(&regs, InterruptCode::Overflow);
    }
}
