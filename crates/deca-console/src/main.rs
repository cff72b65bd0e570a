//! Entry point for the `deca` operator console.

mod console;
mod event_log;
mod loader;

use deca_core::Machine;

#[cfg(test)]
use tempfile as _;

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    println!("=== Initializing DECA-2000 virtual machine ===");

    if let Err(err) = event_log::init() {
        eprintln!("could not open {}: {err}", event_log::LOG_FILE);
        return 1;
    }

    let machine = Machine::new();
    println!("System initialized.\n");

    console::Console::new(machine).run();

    log::info!("system shut down");
    println!("=== System stopped ===");
    0
}
