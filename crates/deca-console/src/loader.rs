//! The stock program loader.

use deca_core::{Machine, ProgramLoader, Word};
use log::info;

/// Base address where the sample image lands.
pub const SAMPLE_BASE: i64 = 300;

/// Window length installed for the sample process.
const SAMPLE_LIMIT: i64 = 100;

/// The built-in sample image. The final word is opcode 45 (SWKERN), not
/// HALT, so the image runs until the operator intervenes.
const SAMPLE_WORDS: [&[u8; 8]; 4] = [b"00050000", b"01030000", b"05001200", b"45000000"];

/// Loader used by `run`, `debug`, and `load`. Reading program files is not
/// implemented yet; every load images the built-in sample and ignores the
/// file name.
pub struct SampleProgram;

impl ProgramLoader for SampleProgram {
    fn load(&self, machine: &mut Machine) -> i64 {
        for (offset, word) in SAMPLE_WORDS.iter().enumerate() {
            machine.write_memory(SAMPLE_BASE + offset as i64, Word::from_bytes(**word));
        }
        machine.set_memory_region(SAMPLE_BASE, SAMPLE_LIMIT);
        info!("sample program imaged at {SAMPLE_BASE}");
        SAMPLE_BASE
    }
}

#[cfg(test)]
mod tests {
    use deca_core::{Machine, Word};

    use super::{SampleProgram, SAMPLE_BASE, SAMPLE_WORDS};

    #[test]
    fn load_images_the_sample_and_installs_the_window() {
        let mut machine = Machine::new();
        let start = machine.load(&SampleProgram);

        assert_eq!(start, SAMPLE_BASE);
        let imaged = machine.memory_snapshot(300, 303);
        let expected: Vec<Word> = SAMPLE_WORDS
            .iter()
            .map(|word| Word::from_bytes(**word))
            .collect();
        assert_eq!(imaged, expected);

        let registers = machine.registers();
        assert_eq!(registers.rb.to_int(), 300);
        assert_eq!(registers.rl.to_int(), 100);
    }
}
