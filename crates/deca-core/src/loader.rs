//! Program loading seam.

use crate::machine::Machine;

/// Writes a program into machine memory and reports where it starts.
///
/// The console's stock loader is one implementation; tests provide their
/// own. Loaders typically write words through [`Machine::write_memory`]
/// and then install the process window with
/// [`Machine::set_memory_region`].
pub trait ProgramLoader {
    /// Loads the program and returns its start address.
    fn load(&self, machine: &mut Machine) -> i64;
}
