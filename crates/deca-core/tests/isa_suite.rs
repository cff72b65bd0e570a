//! End-to-end instruction-set scenarios driven through the machine cycle.

use deca_core::{CpuState, InterruptCode, Machine, OperationMode, Word, CC_EQUAL, CC_OVERFLOW};
use proptest as _;
use rstest as _;

const MAX_CYCLES: usize = 200;

/// Writes `words` at physical 300 upward and points the PC at 300.
fn machine_with_program(words: &[&[u8; 8]]) -> Machine {
    let mut machine = Machine::new();
    for (offset, word) in words.iter().enumerate() {
        machine.write_memory(300 + offset as i64, Word::from_bytes(**word));
    }
    machine.prepare(300);
    machine
}

fn run_to_halt(machine: &mut Machine) {
    for _ in 0..MAX_CYCLES {
        if !machine.state().is_running() {
            return;
        }
        machine.cycle();
    }
    panic!("program did not halt within {MAX_CYCLES} cycles");
}

#[test]
fn arithmetic_and_store_scenario() {
    // LOAD 15, SUM 3, STR 400, HALT.
    let mut machine = machine_with_program(&[
        b"04100015",
        b"00100003",
        b"05000400",
        b"40000000",
    ]);
    run_to_halt(&mut machine);

    assert_eq!(machine.state(), CpuState::Halted);
    assert_eq!(machine.registers().ac.to_int(), 18);
    assert_eq!(machine.memory_snapshot(400, 400), vec![Word::from_int(18)]);
}

#[test]
fn unconditional_jump_skips_the_dead_word() {
    // LOAD 2, JMP 303, (never executed), HALT.
    let mut machine = machine_with_program(&[
        b"04100002",
        b"27000303",
        b"00009999",
        b"40000000",
    ]);
    run_to_halt(&mut machine);

    assert_eq!(machine.state(), CpuState::Halted);
    assert_eq!(machine.registers().ac.to_int(), 2);
    assert_eq!(
        machine.memory_snapshot(302, 302),
        vec![Word::from_bytes(*b"00009999")]
    );
}

#[test]
fn sum_overflow_sets_cc_and_raises_the_interrupt() {
    let mut machine = machine_with_program(&[b"00102000", b"40000000"]);
    machine.with_registers(|regs| {
        regs.ac = Word::from_int(9_999_000);
        regs.psw.interrupt_enabled = true;
        regs.psw.mode = OperationMode::User;
    });
    run_to_halt(&mut machine);

    let registers = machine.registers();
    assert_eq!(registers.psw.condition_code, CC_OVERFLOW);
    // The wrapped result is unrepresentable, so AC carries the sentinel.
    assert_eq!(registers.ac, Word::OVERFLOW);
    // The overflow interrupt was dispatched, which forced kernel mode.
    assert_eq!(registers.psw.mode, OperationMode::Kernel);
    assert!(!machine.interrupt_pending(InterruptCode::Overflow));
}

#[test]
fn res_overflow_detects_the_negative_boundary() {
    let mut machine = machine_with_program(&[b"01102000", b"40000000"]);
    machine.with_registers(|regs| {
        regs.ac = Word::from_int(-9_999_000);
        regs.psw.interrupt_enabled = true;
    });
    run_to_halt(&mut machine);

    assert_eq!(machine.registers().psw.condition_code, CC_OVERFLOW);
}

#[test]
fn mult_overflow_raises_while_divide_by_zero_stays_silent() {
    // LOAD 5000, MULT 5000 -> 25_000_000 overflows the word range.
    let mut machine = machine_with_program(&[b"04105000", b"02105000", b"40000000"]);
    machine.with_registers(|regs| regs.psw.interrupt_enabled = true);
    machine.cycle();
    machine.cycle();
    assert_eq!(machine.registers().psw.condition_code, CC_OVERFLOW);

    // LOAD 10, DIVI 0 -> AC = 0, no interrupt.
    let mut machine = machine_with_program(&[b"04100010", b"03100000", b"40000000"]);
    machine.with_registers(|regs| regs.psw.interrupt_enabled = true);
    run_to_halt(&mut machine);

    assert_eq!(machine.registers().ac.to_int(), 0);
    assert_eq!(machine.registers().psw.condition_code, CC_EQUAL);
    assert!(!machine.interrupt_pending(InterruptCode::Overflow));
}

#[test]
fn division_truncates_toward_zero() {
    let mut machine = machine_with_program(&[b"04100010", b"03100003", b"40000000"]);
    run_to_halt(&mut machine);
    assert_eq!(machine.registers().ac.to_int(), 3);
}

#[test]
fn compare_drives_the_conditional_jumps() {
    // LOAD 5, CMP 5 -> equal, JEQ 305, dead LOAD 99, dead HALT, HALT.
    let mut machine = machine_with_program(&[
        b"04100005",
        b"06100005",
        b"09000305",
        b"04100099",
        b"40000000",
        b"40000000",
    ]);
    run_to_halt(&mut machine);

    assert_eq!(machine.registers().ac.to_int(), 5);
    assert_eq!(machine.registers().pc.to_int(), 306);
}

#[test]
fn jlt_and_jgt_follow_the_comparison_sign() {
    // LOAD 3, CMP 10 -> less, JLT 305, dead word, dead HALT, LOAD 1, HALT.
    let mut machine = machine_with_program(&[
        b"04100003",
        b"06100010",
        b"11000305",
        b"00000000",
        b"40000000",
        b"04100001",
        b"40000000",
    ]);
    run_to_halt(&mut machine);
    assert_eq!(machine.registers().ac.to_int(), 1);

    // LOAD 10, CMP 3 -> greater, JGT 305.
    let mut machine = machine_with_program(&[
        b"04100010",
        b"06100003",
        b"10000305",
        b"00000000",
        b"40000000",
        b"04100002",
        b"40000000",
    ]);
    run_to_halt(&mut machine);
    assert_eq!(machine.registers().ac.to_int(), 2);
}

#[test]
fn tst_masks_the_accumulator() {
    // LOAD 6, TST 4 -> nonzero, cc greater.
    let mut machine = machine_with_program(&[b"04100006", b"07100004", b"40000000"]);
    run_to_halt(&mut machine);
    assert_eq!(machine.registers().psw.condition_code, 2);

    // LOAD 6, TST 1 -> zero, cc equal.
    let mut machine = machine_with_program(&[b"04100006", b"07100001", b"40000000"]);
    run_to_halt(&mut machine);
    assert_eq!(machine.registers().psw.condition_code, CC_EQUAL);
}

#[test]
fn mov_replaces_the_accumulator() {
    let mut machine = machine_with_program(&[b"08100009", b"40000000"]);
    run_to_halt(&mut machine);
    assert_eq!(machine.registers().ac.to_int(), 9);
}

#[test]
fn load_and_store_round_trip_through_memory() {
    // LOAD 7, STR 500, LOAD 0, LOAD direct 500, HALT.
    let mut machine = machine_with_program(&[
        b"04100007",
        b"05000500",
        b"04100000",
        b"04000500",
        b"40000000",
    ]);
    run_to_halt(&mut machine);
    assert_eq!(machine.registers().ac.to_int(), 7);
}

#[test]
fn indexed_mode_addresses_relative_to_the_accumulator() {
    // Seed memory[450] = 99. LOAD 400, then LOAD indexed +50.
    let mut machine = machine_with_program(&[b"04100400", b"04200050", b"40000000"]);
    machine.write_memory(450, Word::from_int(99));
    run_to_halt(&mut machine);
    assert_eq!(machine.registers().ac.to_int(), 99);
}

#[test]
fn call_pushes_the_return_address_and_ret_pops_it() {
    let mut machine = Machine::new();
    machine.write_memory(300, Word::from_bytes(*b"14000310")); // CALL 310
    machine.write_memory(301, Word::from_bytes(*b"40000000")); // HALT
    machine.write_memory(310, Word::from_bytes(*b"04100007")); // LOAD 7
    machine.write_memory(311, Word::from_bytes(*b"15000000")); // RET
    machine.prepare(300);
    run_to_halt(&mut machine);

    let registers = machine.registers();
    assert_eq!(registers.ac.to_int(), 7);
    assert_eq!(registers.sp.to_int(), 1023);
    assert_eq!(machine.memory_snapshot(1023, 1023), vec![Word::from_int(301)]);
}

#[test]
fn push_and_pop_are_last_in_first_out() {
    let mut machine = machine_with_program(&[
        b"04100005",
        b"25000000", // PUSH 5
        b"04100009",
        b"25000000", // PUSH 9
        b"26000000", // POP -> 9
        b"05000600", // STR 600
        b"26000000", // POP -> 5
        b"40000000",
    ]);
    run_to_halt(&mut machine);

    let registers = machine.registers();
    assert_eq!(registers.ac.to_int(), 5);
    assert_eq!(registers.sp.to_int(), 1023);
    assert_eq!(machine.memory_snapshot(600, 600), vec![Word::from_int(9)]);
}

#[test]
fn base_register_is_readable_through_ldr() {
    let mut machine = Machine::new();
    machine.set_memory_region(300, 100);
    // With RB=300 the program lives at logical 0.
    machine.write_memory(0, Word::from_bytes(*b"16000000")); // LDR
    machine.write_memory(1, Word::from_bytes(*b"40000000")); // HALT
    machine.prepare(0);
    run_to_halt(&mut machine);

    assert_eq!(machine.registers().ac.to_int(), 300);
}

#[test]
fn limit_register_round_trips_through_strl_and_ldrl() {
    // LOAD 1500, STRL, LOAD 0, LDRL, HALT.
    let mut machine = machine_with_program(&[
        b"04101500",
        b"19000000",
        b"04100000",
        b"18000000",
        b"40000000",
    ]);
    run_to_halt(&mut machine);

    let registers = machine.registers();
    assert_eq!(registers.rl.to_int(), 1500);
    assert_eq!(registers.ac.to_int(), 1500);
}

#[test]
fn strr_rewrites_the_base_register() {
    let mut machine = Machine::new();
    machine.set_memory_region(300, 100);
    machine.write_memory(0, Word::from_bytes(*b"16000000")); // LDR -> AC = 300
    machine.write_memory(1, Word::from_bytes(*b"17000000")); // STRR (same value)
    machine.write_memory(2, Word::from_bytes(*b"40000000")); // HALT
    machine.prepare(0);
    run_to_halt(&mut machine);

    assert_eq!(machine.registers().rb.to_int(), 300);
}

#[test]
fn svc_enters_kernel_mode_through_the_syscall_interrupt() {
    let mut machine = machine_with_program(&[b"13000000", b"40000000"]);
    machine.with_registers(|regs| {
        regs.psw.interrupt_enabled = true;
        regs.psw.mode = OperationMode::User;
    });
    run_to_halt(&mut machine);

    assert_eq!(machine.registers().psw.mode, OperationMode::Kernel);
    assert!(!machine.interrupt_pending(InterruptCode::Syscall));
}

#[test]
fn interrupt_toggles_and_mode_switches() {
    let mut machine = machine_with_program(&[b"42000000", b"44000000", b"40000000"]);
    run_to_halt(&mut machine);
    let registers = machine.registers();
    assert!(registers.psw.interrupt_enabled);
    assert_eq!(registers.psw.mode, OperationMode::User);

    let mut machine = machine_with_program(&[
        b"42000000", // EI
        b"43000000", // DI
        b"45000000", // SWKERN
        b"40000000",
    ]);
    run_to_halt(&mut machine);
    let registers = machine.registers();
    assert!(!registers.psw.interrupt_enabled);
    assert_eq!(registers.psw.mode, OperationMode::Kernel);
}

#[test]
fn io_opcodes_raise_completion_and_keep_running() {
    let mut machine = machine_with_program(&[b"34000000", b"35000000", b"36000000", b"40000000"]);
    machine.with_registers(|regs| {
        regs.psw.interrupt_enabled = true;
        regs.psw.mode = OperationMode::User;
    });
    run_to_halt(&mut machine);

    assert_eq!(machine.state(), CpuState::Halted);
    // Each request was dispatched by the end-of-cycle sweep.
    assert!(!machine.interrupt_pending(InterruptCode::IoCompletion));
    assert_eq!(machine.registers().psw.mode, OperationMode::Kernel);
}

#[test]
fn nop_only_advances_the_pc() {
    let mut machine = machine_with_program(&[b"41000000", b"40000000"]);
    run_to_halt(&mut machine);
    assert_eq!(machine.registers().pc.to_int(), 302);
    assert_eq!(machine.registers().ac.to_int(), 0);
}

#[test]
fn disabled_interrupts_drop_raises_instead_of_latching() {
    let mut machine = machine_with_program(&[b"13000000", b"40000000"]);
    // Interrupts stay disabled (the power-on default).
    run_to_halt(&mut machine);
    assert!(!machine.interrupt_pending(InterruptCode::Syscall));
}
