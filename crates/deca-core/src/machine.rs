//! The owning machine container and the fetch/decode/execute cycle.
//!
//! One [`Machine`] owns exactly one register file, memory, disk, interrupt
//! controller, and DMA controller. The register file and the physical
//! stores sit behind shared synchronized handles because the DMA worker
//! borrows them from its own thread; everything else is plain ownership.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{debug, info};

use crate::decoder::{DecodedOrInvalid, Decoder};
use crate::disk::Disk;
use crate::dma::DmaController;
use crate::execute::{execute_instruction, ExecuteOutcome};
use crate::interrupt::{InterruptCode, InterruptController, InterruptLine};
use crate::loader::ProgramLoader;
use crate::memory::{MainMemory, MemoryUnit};
use crate::state::{CpuState, Registers};
use crate::word::Word;

/// Pause inserted between cycles by the continuous run loop.
pub const CYCLE_PACING: Duration = Duration::from_millis(10);

/// Snapshot of one debugger step, for the console printout.
#[derive(Debug, Clone, Copy)]
pub struct StepReport {
    /// PC before the cycle.
    pub pc: i64,
    /// The word fetched from that address.
    pub instruction: Word,
    /// Its decode result.
    pub decoded: DecodedOrInvalid,
    /// Accumulator before the cycle.
    pub ac_before: Word,
    /// Accumulator after the cycle.
    pub ac_after: Word,
    /// Condition code after the cycle.
    pub condition_code: u8,
}

/// The virtual machine.
pub struct Machine {
    registers: Arc<Mutex<Registers>>,
    cells: Arc<Mutex<MainMemory>>,
    memory: MemoryUnit,
    disk: Arc<Mutex<Disk>>,
    interrupts: InterruptController,
    dma: DmaController,
    irq: InterruptLine,
    state: CpuState,
}

impl Machine {
    /// Powers on a fully initialized machine, CPU left running.
    #[must_use]
    pub fn new() -> Self {
        let cells = Arc::new(Mutex::new(MainMemory::new()));
        let registers = Arc::new(Mutex::new(Registers::new()));
        let interrupts = InterruptController::new(Arc::clone(&registers));
        let irq = interrupts.line();
        let memory = MemoryUnit::new(Arc::clone(&cells), interrupts.line());
        let disk = Arc::new(Mutex::new(Disk::new()));
        let dma = DmaController::new(Arc::clone(&cells), Arc::clone(&disk), interrupts.line());
        info!("cpu initialized");

        Self {
            registers,
            cells,
            memory,
            disk,
            interrupts,
            dma,
            irq,
            state: CpuState::Running,
        }
    }

    /// Re-initializes the register file and returns the CPU to running.
    /// Memory, disk, and DMA configuration are left untouched.
    pub fn reset(&mut self) {
        *crate::lock(&self.registers) = Registers::new();
        self.state = CpuState::Running;
    }

    /// Current CPU run state.
    #[must_use]
    pub fn state(&self) -> CpuState {
        self.state
    }

    /// Parks or resumes the CPU from the host side.
    pub fn set_state(&mut self, state: CpuState) {
        self.state = state;
    }

    fn fetch(&self) -> DecodedOrInvalid {
        let mut regs = crate::lock(&self.registers);
        let pc = regs.pc.to_int();
        regs.mar = Word::from_int(pc);
        let word = self.memory.read(&mut regs, pc);
        regs.mdr = word;
        regs.ir = word;
        regs.set_pc(pc + 1);
        debug!("fetch: pc={pc} instruction={word}");
        let ac = regs.ac.to_int();
        drop(regs);
        Decoder::decode(word, ac)
    }

    /// Runs one full cycle: fetch, decode, execute, interrupt sweep.
    /// A no-op unless the CPU is running.
    pub fn cycle(&mut self) {
        if !self.state.is_running() {
            return;
        }
        let decoded = self.fetch();
        let outcome =
            execute_instruction(decoded, &self.registers, &self.memory, &self.dma, &self.irq);
        if outcome == ExecuteOutcome::Halt {
            self.state = CpuState::Halted;
        }
        self.interrupts.handle_pending();
    }

    /// Executes one cycle and reports what happened, for the debugger.
    /// `None` when the CPU is not running.
    pub fn step(&mut self) -> Option<StepReport> {
        if !self.state.is_running() {
            return None;
        }

        let (pc, instruction, ac_before, decoded) = {
            let mut regs = crate::lock(&self.registers);
            let pc = regs.pc.to_int();
            let instruction = self.memory.read(&mut regs, pc);
            let decoded = Decoder::decode(instruction, regs.ac.to_int());
            (pc, instruction, regs.ac, decoded)
        };

        self.cycle();

        let regs = crate::lock(&self.registers);
        Some(StepReport {
            pc,
            instruction,
            decoded,
            ac_before,
            ac_after: regs.ac,
            condition_code: regs.psw.condition_code,
        })
    }

    /// Points the PC at `start` and marks the CPU running, without
    /// executing anything. The debugger uses this before stepping.
    pub fn prepare(&mut self, start: i64) {
        crate::lock(&self.registers).set_pc(start);
        self.state = CpuState::Running;
    }

    /// Runs continuously from `start` until the CPU leaves the running
    /// state, pacing cycles by [`CYCLE_PACING`].
    pub fn run(&mut self, start: i64) {
        self.prepare(start);
        info!("starting execution at address {start}");
        self.resume(CYCLE_PACING);
    }

    /// Resumes the cycle loop with the given pacing until the CPU stops.
    pub fn resume(&mut self, pacing: Duration) {
        while self.state.is_running() {
            self.cycle();
            thread::sleep(pacing);
        }
        info!("execution finished");
    }

    /// Loads a program through the loader seam and returns its start
    /// address.
    pub fn load(&mut self, loader: &dyn ProgramLoader) -> i64 {
        let start = loader.load(self);
        info!("program loaded, start address {start}");
        start
    }

    /// Reads a logical address through the memory unit.
    pub fn read_memory(&self, logical: i64) -> Word {
        let mut regs = crate::lock(&self.registers);
        self.memory.read(&mut regs, logical)
    }

    /// Writes a logical address through the memory unit.
    pub fn write_memory(&self, logical: i64, word: Word) {
        let mut regs = crate::lock(&self.registers);
        self.memory.write(&mut regs, logical, word);
    }

    /// Installs a process memory window (RB, RL).
    pub fn set_memory_region(&self, base: i64, limit: i64) {
        let mut regs = crate::lock(&self.registers);
        self.memory.set_region(&mut regs, base, limit);
    }

    /// Clones the current register file for inspection.
    #[must_use]
    pub fn registers(&self) -> Registers {
        crate::lock(&self.registers).clone()
    }

    /// Runs `f` with mutable access to the register file. Test harnesses
    /// and the console use this to stage PSW or window changes.
    pub fn with_registers<R>(&self, f: impl FnOnce(&mut Registers) -> R) -> R {
        f(&mut crate::lock(&self.registers))
    }

    /// Copies the physical memory range `[start, end]` for inspection.
    #[must_use]
    pub fn memory_snapshot(&self, start: usize, end: usize) -> Vec<Word> {
        crate::lock(&self.cells).snapshot(start, end)
    }

    /// Runs `f` with mutable access to the disk.
    pub fn with_disk<R>(&self, f: impl FnOnce(&mut Disk) -> R) -> R {
        f(&mut crate::lock(&self.disk))
    }

    /// The DMA controller.
    #[must_use]
    pub fn dma(&self) -> &DmaController {
        &self.dma
    }

    /// A raise-only interrupt handle.
    #[must_use]
    pub fn interrupt_line(&self) -> InterruptLine {
        self.interrupts.line()
    }

    /// Reads an interrupt pending bit without clearing it.
    #[must_use]
    pub fn interrupt_pending(&self, code: InterruptCode) -> bool {
        self.irq.is_pending(code)
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}
