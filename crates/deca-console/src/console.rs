//! Interactive operator console: command parsing and the REPL.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use deca_core::{
    psw_to_word, DecodedOrInvalid, Machine, OperationMode, StepReport, CYLINDERS,
    SECTORS_PER_CYLINDER, SECTOR_BYTES, TRACKS,
};

use crate::loader::SampleProgram;

/// Cycle pacing used by `continue`, slower than a plain run so the
/// operator can follow the trace.
const CONTINUE_PACING: Duration = Duration::from_millis(100);

const DEFAULT_DUMP_START: i64 = 300;
const DEFAULT_DUMP_SPAN: i64 = 20;

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(String),
    Debug(String),
    Step,
    Continue,
    Registers,
    Memory {
        start: Option<i64>,
        end: Option<i64>,
    },
    Disk,
    Load(String),
    Help,
    Exit,
    Empty,
    Unknown,
}

/// Tokenizes one input line. Matching is case-insensitive; numeric
/// arguments that fail to parse are treated as absent.
pub fn parse_command(input: &str) -> Command {
    let lower = input.to_lowercase();
    let mut tokens = lower.split_whitespace();
    let Some(keyword) = tokens.next() else {
        return Command::Empty;
    };

    match keyword {
        "run" => Command::Run(tokens.next().unwrap_or_default().to_string()),
        "debug" => Command::Debug(tokens.next().unwrap_or_default().to_string()),
        "step" | "s" => Command::Step,
        "continue" | "c" => Command::Continue,
        "registers" | "reg" | "r" => Command::Registers,
        "memory" | "mem" | "m" => Command::Memory {
            start: tokens.next().and_then(|token| token.parse().ok()),
            end: tokens.next().and_then(|token| token.parse().ok()),
        },
        "disk" | "d" => Command::Disk,
        "load" => Command::Load(tokens.next().unwrap_or_default().to_string()),
        "help" | "?" | "h" => Command::Help,
        "exit" | "quit" | "q" => Command::Exit,
        _ => Command::Unknown,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    Debugger,
}

/// The interactive console driving one machine.
pub struct Console {
    machine: Machine,
    mode: Mode,
    step_count: u32,
}

impl Console {
    /// Wraps a machine and starts in normal mode.
    #[must_use]
    pub fn new(machine: Machine) -> Self {
        Self {
            machine,
            mode: Mode::Normal,
            step_count: 0,
        }
    }

    /// Reads commands from stdin until `exit` or end of input.
    pub fn run(&mut self) {
        print_banner();
        let stdin = io::stdin();
        loop {
            self.show_prompt();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let command = parse_command(&line);
            if command == Command::Exit {
                println!("Leaving the system...");
                break;
            }
            self.execute(command);
        }
    }

    fn show_prompt(&self) {
        match self.mode {
            Mode::Debugger => print!("DEBUG [{}] >> ", self.step_count),
            Mode::Normal => print!("SYS >> "),
        }
        let _ = io::stdout().flush();
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::Run(file) => {
                println!("Running {file} in normal mode...");
                self.mode = Mode::Normal;
                let start = self.machine.load(&SampleProgram);
                self.machine.run(start);
                println!("Execution finished.");
            }
            Command::Debug(file) => {
                println!("Running {file} in debugger mode...");
                self.mode = Mode::Debugger;
                self.step_count = 0;
                let start = self.machine.load(&SampleProgram);
                self.machine.prepare(start);
                println!("Program loaded at address {start}. Use 'step' to single-cycle.");
            }
            Command::Step => {
                if self.mode != Mode::Debugger {
                    println!("'step' is only available in debugger mode");
                    return;
                }
                match self.machine.step() {
                    Some(report) => {
                        print_step_report(&report);
                        self.step_count += 1;
                    }
                    None => println!("CPU is not running. Use 'debug <file>' first."),
                }
            }
            Command::Continue => {
                if self.mode != Mode::Debugger {
                    println!("'continue' is only available in debugger mode");
                    return;
                }
                println!("Resuming automatic execution...");
                self.mode = Mode::Normal;
                self.machine.resume(CONTINUE_PACING);
                println!("Execution finished.");
                self.show_registers();
            }
            Command::Registers => self.show_registers(),
            Command::Memory { start, end } => {
                let (start, end) = match (start, end) {
                    (None, _) => (DEFAULT_DUMP_START, DEFAULT_DUMP_START + DEFAULT_DUMP_SPAN),
                    (Some(start), None) => (start, start + DEFAULT_DUMP_SPAN),
                    (Some(start), Some(end)) => (start, end),
                };
                self.dump_memory(start, end);
            }
            Command::Disk => self.show_disk_info(),
            Command::Load(file) => {
                println!("Loading program: {file}");
                self.machine.load(&SampleProgram);
                println!("Program loaded. Use 'run' or 'debug' to execute.");
            }
            Command::Help => print_banner(),
            Command::Unknown => {
                println!("Unknown command. Type 'help' to list the available commands.");
            }
            Command::Empty | Command::Exit => {}
        }
    }

    fn show_registers(&self) {
        let registers = self.machine.registers();
        println!("\n=== CPU REGISTERS ===");
        println!("AC:  {} (int: {})", registers.ac, registers.ac.to_int());
        println!("PC:  {} (Word: {})", registers.psw.pc_psw, registers.pc);
        println!("IR:  {}", registers.ir);
        println!("MAR: {}", registers.mar);
        println!("MDR: {}", registers.mdr);
        println!(
            "RB:  {} (int: {}) - base register",
            registers.rb,
            registers.rb.to_int()
        );
        println!(
            "RL:  {} (int: {}) - limit register",
            registers.rl,
            registers.rl.to_int()
        );
        println!(
            "SP:  {} (int: {}) - stack pointer",
            registers.sp,
            registers.sp.to_int()
        );
        println!("RX:  {} - stack base", registers.rx);

        println!("\n=== STATUS WORD (PSW) ===");
        println!(
            "Condition Code:    {} ({})",
            registers.psw.condition_code,
            condition_code_name(registers.psw.condition_code)
        );
        println!(
            "Operation Mode:    {}",
            match registers.psw.mode {
                OperationMode::Kernel => "KERNEL",
                OperationMode::User => "USER",
            }
        );
        println!(
            "Interrupt Enabled: {}",
            if registers.psw.interrupt_enabled {
                "YES"
            } else {
                "NO"
            }
        );
        println!("PC (in PSW):       {}", registers.psw.pc_psw);
        println!("PSW as Word:       {}", psw_to_word(&registers.psw));

        println!("\n=== CPU STATE ===");
        println!("State: {}", self.machine.state());
        println!(
            "Console mode: {}",
            match self.mode {
                Mode::Debugger => "DEBUGGER",
                Mode::Normal => "NORMAL",
            }
        );
        println!("=====================");
    }

    fn dump_memory(&self, start: i64, end: i64) {
        let start = start.max(0) as usize;
        let end = end.max(0) as usize;
        let words = self.machine.memory_snapshot(start, end);
        println!("\nMemory dump [{start} - {end}]:");
        for (offset, word) in words.iter().enumerate() {
            println!("{:04}: {word}", start + offset);
        }
    }

    fn show_disk_info(&self) {
        let (track, cylinder, sector) = self.machine.with_disk(|disk| disk.head());
        println!("\n=== DISK INFORMATION ===");
        println!("Tracks: {TRACKS}");
        println!("Cylinders: {CYLINDERS}");
        println!("Sectors per cylinder: {SECTORS_PER_CYLINDER}");
        println!("Sector size: {SECTOR_BYTES} characters");
        println!(
            "Total capacity: {} sectors",
            TRACKS * CYLINDERS * SECTORS_PER_CYLINDER
        );
        println!("Head position: T={track}, C={cylinder}, S={sector}");
    }
}

fn print_banner() {
    println!("========================================");
    println!("    DECA-2000 VIRTUAL MACHINE CONSOLE");
    println!("========================================");
    println!("Available commands:");
    println!("  run <file>            - load and run a program");
    println!("  debug <file>          - load a program and enter step mode");
    println!("  step                  - execute one instruction (debug)");
    println!("  continue              - resume continuous execution (debug)");
    println!("  registers             - dump the register file");
    println!("  memory [start] [end]  - dump a memory range");
    println!("  disk                  - show disk geometry and head");
    println!("  load <file>           - load a program without running it");
    println!("  help                  - show this help");
    println!("  exit                  - leave the system");
    println!("========================================\n");
}

fn print_step_report(report: &StepReport) {
    println!("\n=== STEP ===");
    println!("PC: {}", report.pc);
    println!("Instruction: {}", report.instruction);
    match report.decoded {
        DecodedOrInvalid::Instruction(instruction) => println!(
            "Opcode: {} ({:02}), Mode: {:?}, Value: {}, EA: {}",
            instruction.opcode.mnemonic(),
            instruction.opcode as u8,
            instruction.mode,
            instruction.value,
            instruction.effective_address
        ),
        DecodedOrInvalid::Invalid(reason) => println!("Invalid instruction: {reason}"),
    }
    println!(
        "AC before: {} (int: {})",
        report.ac_before,
        report.ac_before.to_int()
    );
    println!(
        "AC after:  {} (int: {})",
        report.ac_after,
        report.ac_after.to_int()
    );
    println!(
        "Condition Code: {} ({})",
        report.condition_code,
        condition_code_name(report.condition_code)
    );
    println!("============");
}

fn condition_code_name(code: u8) -> &'static str {
    match code {
        0 => "ZERO/Equal",
        1 => "Less Than",
        2 => "Greater Than",
        3 => "Overflow",
        _ => "Unknown",
    }
}
