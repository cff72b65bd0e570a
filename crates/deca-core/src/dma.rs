//! Bus-arbitrated DMA controller.
//!
//! One background worker at a time moves words between main memory and the
//! disk while the CPU keeps cycling. The worker holds the bus mutex for the
//! whole transfer, publishes its state through atomics, and raises the I/O
//! completion interrupt after releasing the bus. The join handle is kept so
//! `wait_completion` and drop can park on the worker instead of detaching
//! it.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::disk::{Disk, CYLINDERS, SECTORS_PER_CYLINDER, TRACKS};
use crate::interrupt::{InterruptCode, InterruptLine};
use crate::memory::{MainMemory, MEMORY_WORDS};

/// Pause between transferred words, pacing only.
const WORD_PACING: Duration = Duration::from_millis(1);

/// Transfer direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum DmaOperation {
    /// Disk to memory.
    Read,
    /// Memory to disk.
    Write,
}

/// Controller state machine: `Idle -> (Reading | Writing) -> Idle | Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum DmaState {
    /// No transfer in flight; configuration is accepted.
    Idle = 0,
    /// A disk-to-memory transfer is running.
    Reading = 1,
    /// A memory-to-disk transfer is running.
    Writing = 2,
    /// The last transfer aborted; configuration is frozen until reset.
    Error = 3,
}

impl DmaState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Reading,
            2 => Self::Writing,
            3 => Self::Error,
            _ => Self::Idle,
        }
    }
}

/// Result of the last completed transfer, readable through the DMAS opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum DmaStatus {
    /// Last transfer completed.
    Ok = 0,
    /// Last transfer aborted.
    Err = 1,
}

#[derive(Debug, Clone, Copy)]
struct DmaConfig {
    memory_address: i64,
    track: i64,
    cylinder: i64,
    sector_base: i64,
    operation: DmaOperation,
    transfer_words: i64,
}

impl Default for DmaConfig {
    fn default() -> Self {
        Self {
            memory_address: 0,
            track: 0,
            cylinder: 0,
            sector_base: 0,
            operation: DmaOperation::Read,
            transfer_words: 1,
        }
    }
}

#[derive(Debug)]
struct DmaShared {
    state: AtomicU8,
    status: AtomicU8,
    config: Mutex<DmaConfig>,
}

impl DmaShared {
    fn state(&self) -> DmaState {
        DmaState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: DmaState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn status(&self) -> DmaStatus {
        if self.status.load(Ordering::Acquire) == DmaStatus::Err as u8 {
            DmaStatus::Err
        } else {
            DmaStatus::Ok
        }
    }

    fn set_status(&self, status: DmaStatus) {
        self.status.store(status as u8, Ordering::Release);
    }
}

/// The DMA controller.
pub struct DmaController {
    shared: Arc<DmaShared>,
    bus: Arc<Mutex<()>>,
    memory: Arc<Mutex<MainMemory>>,
    disk: Arc<Mutex<Disk>>,
    irq: InterruptLine,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DmaController {
    /// Builds an idle controller sharing the memory and disk stores.
    #[must_use]
    pub fn new(
        memory: Arc<Mutex<MainMemory>>,
        disk: Arc<Mutex<Disk>>,
        irq: InterruptLine,
    ) -> Self {
        info!("dma controller initialized");
        Self {
            shared: Arc::new(DmaShared {
                state: AtomicU8::new(DmaState::Idle as u8),
                status: AtomicU8::new(DmaStatus::Ok as u8),
                config: Mutex::new(DmaConfig::default()),
            }),
            bus: Arc::new(Mutex::new(())),
            memory,
            disk,
            irq,
            worker: Mutex::new(None),
        }
    }

    /// Current state-machine position.
    #[must_use]
    pub fn state(&self) -> DmaState {
        self.shared.state()
    }

    /// Result of the last transfer.
    #[must_use]
    pub fn status(&self) -> DmaStatus {
        self.shared.status()
    }

    fn busy(&self, what: &str) -> bool {
        let state = self.state();
        if state == DmaState::Idle {
            return false;
        }
        warn!("dma: {what} rejected, controller is not idle ({state:?})");
        true
    }

    /// Sets the memory-side start address for the next transfer.
    pub fn set_memory_address(&self, address: i64) {
        if self.busy("memory address change") {
            return;
        }
        if address < 0 || address >= MEMORY_WORDS as i64 {
            error!("dma: invalid memory address {address}");
            return;
        }
        crate::lock(&self.shared.config).memory_address = address;
        debug!("dma: memory address set to {address}");
    }

    /// Sets the disk-side start coordinates for the next transfer.
    pub fn set_disk_location(&self, track: i64, cylinder: i64, sector: i64) {
        if self.busy("disk location change") {
            return;
        }
        let track_ok = (0..TRACKS as i64).contains(&track);
        let cylinder_ok = (0..CYLINDERS as i64).contains(&cylinder);
        let sector_ok = (0..SECTORS_PER_CYLINDER as i64).contains(&sector);
        if !(track_ok && cylinder_ok && sector_ok) {
            error!("dma: invalid disk coordinates: T={track}, C={cylinder}, S={sector}");
            return;
        }
        let mut config = crate::lock(&self.shared.config);
        config.track = track;
        config.cylinder = cylinder;
        config.sector_base = sector;
        debug!("dma: disk location set to T={track}, C={cylinder}, S={sector}");
    }

    /// Selects the transfer direction.
    pub fn set_operation(&self, operation: DmaOperation) {
        if self.busy("operation change") {
            return;
        }
        crate::lock(&self.shared.config).operation = operation;
        debug!("dma: operation set to {operation:?}");
    }

    /// Sets the number of words to move.
    pub fn set_transfer_size(&self, words: i64) {
        if self.busy("transfer size change") {
            return;
        }
        if words <= 0 {
            error!("dma: invalid transfer size {words}");
            return;
        }
        crate::lock(&self.shared.config).transfer_words = words;
        debug!("dma: transfer size set to {words}");
    }

    /// Launches the background worker for the configured transfer.
    ///
    /// Rejected with a warning unless the controller is idle. The state is
    /// claimed before the spawn so two starts can never both observe idle.
    pub fn start_transfer(&self) {
        let state = self.state();
        if state != DmaState::Idle {
            warn!("dma: transfer already in flight (state {state:?})");
            return;
        }

        let config = *crate::lock(&self.shared.config);
        if config.memory_address < 0 || config.memory_address >= MEMORY_WORDS as i64 {
            error!("dma: invalid memory address for transfer");
            self.shared.set_status(DmaStatus::Err);
            self.shared.set_state(DmaState::Error);
            return;
        }

        self.shared.set_state(match config.operation {
            DmaOperation::Read => DmaState::Reading,
            DmaOperation::Write => DmaState::Writing,
        });

        let shared = Arc::clone(&self.shared);
        let bus = Arc::clone(&self.bus);
        let memory = Arc::clone(&self.memory);
        let disk = Arc::clone(&self.disk);
        let irq = self.irq.clone();

        let spawned = thread::Builder::new()
            .name("dma-worker".into())
            .spawn(move || run_transfer(&shared, &bus, &memory, &disk, &irq));

        match spawned {
            Ok(handle) => {
                *crate::lock(&self.worker) = Some(handle);
                info!("dma: transfer started (asynchronous)");
            }
            Err(err) => {
                error!("dma: could not spawn transfer worker: {err}");
                self.shared.set_status(DmaStatus::Err);
                self.shared.set_state(DmaState::Error);
            }
        }
    }

    /// Blocks until the in-flight worker finishes. Returns immediately
    /// when the controller is already idle or latched in error.
    pub fn wait_completion(&self) {
        if matches!(self.state(), DmaState::Idle | DmaState::Error) {
            return;
        }
        let handle = crate::lock(&self.worker).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("dma: transfer worker panicked");
            }
            debug!("dma: transfer finished (synchronous wait)");
        }
    }
}

impl Drop for DmaController {
    fn drop(&mut self) {
        let handle = crate::lock(&self.worker).take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

fn run_transfer(
    shared: &DmaShared,
    bus: &Mutex<()>,
    memory: &Mutex<MainMemory>,
    disk: &Mutex<Disk>,
    irq: &InterruptLine,
) {
    let bus_guard = crate::lock(bus);
    debug!("dma: bus acquired");

    let config = *crate::lock(&shared.config);
    info!(
        "dma: starting {} transfer",
        match config.operation {
            DmaOperation::Read => "read (disk to memory)",
            DmaOperation::Write => "write (memory to disk)",
        }
    );

    for offset in 0..config.transfer_words {
        let address = config.memory_address + offset;
        if address >= MEMORY_WORDS as i64 {
            error!("dma: memory address {address} out of range");
            shared.set_status(DmaStatus::Err);
            shared.set_state(DmaState::Error);
            break;
        }

        let sector = config.sector_base + offset;
        match config.operation {
            DmaOperation::Read => {
                let word = crate::lock(disk).read_sector(config.track, config.cylinder, sector);
                crate::lock(memory).store(address as usize, word);
                debug!("dma: sector {sector} -> memory[{address}] = {word}");
            }
            DmaOperation::Write => {
                let word = crate::lock(memory).load(address as usize).unwrap_or_default();
                crate::lock(disk).write_sector(config.track, config.cylinder, sector, word.bytes());
                debug!("dma: memory[{address}] = {word} -> sector {sector}");
            }
        }

        thread::sleep(WORD_PACING);
    }

    if shared.state() == DmaState::Error {
        error!("dma: transfer failed");
    } else {
        shared.set_status(DmaStatus::Ok);
        shared.set_state(DmaState::Idle);
        info!("dma: transfer completed");
    }

    drop(bus_guard);
    debug!("dma: bus released");

    irq.raise(InterruptCode::IoCompletion);
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::{DmaController, DmaOperation, DmaState, DmaStatus};
    use crate::disk::Disk;
    use crate::interrupt::{InterruptCode, InterruptController};
    use crate::memory::{MainMemory, MEMORY_WORDS};
    use crate::state::Registers;
    use crate::word::Word;

    struct Fixture {
        controller: DmaController,
        memory: Arc<Mutex<MainMemory>>,
        disk: Arc<Mutex<Disk>>,
        interrupts: InterruptController,
    }

    fn fixture() -> Fixture {
        let mut registers = Registers::new();
        registers.psw.interrupt_enabled = true;
        let registers = Arc::new(Mutex::new(registers));
        let interrupts = InterruptController::new(registers);
        let memory = Arc::new(Mutex::new(MainMemory::new()));
        let disk = Arc::new(Mutex::new(Disk::new()));
        let controller = DmaController::new(
            Arc::clone(&memory),
            Arc::clone(&disk),
            interrupts.line(),
        );
        Fixture {
            controller,
            memory,
            disk,
            interrupts,
        }
    }

    #[test]
    fn write_then_read_round_trips_through_the_disk() {
        let fx = fixture();
        for (offset, value) in [11, 22, 33, 44].into_iter().enumerate() {
            crate::lock(&fx.memory).store(500 + offset, Word::from_int(value));
        }

        fx.controller.set_transfer_size(4);
        fx.controller.set_disk_location(0, 0, 0);
        fx.controller.set_memory_address(500);
        fx.controller.set_operation(DmaOperation::Write);
        fx.controller.start_transfer();
        fx.controller.wait_completion();

        assert_eq!(fx.controller.state(), DmaState::Idle);
        assert_eq!(fx.controller.status(), DmaStatus::Ok);
        assert_eq!(crate::lock(&fx.disk).read_sector(0, 0, 2).to_int(), 33);

        fx.controller.set_memory_address(600);
        fx.controller.set_operation(DmaOperation::Read);
        fx.controller.start_transfer();
        fx.controller.wait_completion();

        let copied: Vec<i64> = (600..604)
            .map(|address| crate::lock(&fx.memory).load(address).map_or(0, Word::to_int))
            .collect();
        assert_eq!(copied, vec![11, 22, 33, 44]);
        assert!(fx
            .interrupts
            .line()
            .is_pending(InterruptCode::IoCompletion));
    }

    #[test]
    fn transfer_past_the_end_of_memory_latches_error() {
        let fx = fixture();
        fx.controller.set_memory_address(MEMORY_WORDS as i64 - 2);
        fx.controller.set_transfer_size(5);
        fx.controller.set_operation(DmaOperation::Read);
        fx.controller.start_transfer();
        fx.controller.wait_completion();

        assert_eq!(fx.controller.state(), DmaState::Error);
        assert_eq!(fx.controller.status(), DmaStatus::Err);
        // The completion interrupt is raised even for failed transfers.
        assert!(fx
            .interrupts
            .line()
            .is_pending(InterruptCode::IoCompletion));
    }

    #[test]
    fn configuration_is_rejected_while_a_transfer_is_claimed() {
        let fx = fixture();
        fx.controller.set_memory_address(100);
        fx.controller.set_transfer_size(50);
        fx.controller.set_operation(DmaOperation::Read);
        fx.controller.start_transfer();

        // The worker is still pacing through 50 words; config must bounce.
        fx.controller.set_memory_address(700);
        fx.controller.set_transfer_size(1);
        fx.controller.start_transfer();
        fx.controller.wait_completion();

        assert_eq!(fx.controller.state(), DmaState::Idle);
        assert_eq!(crate::lock(&fx.controller.shared.config).memory_address, 100);
        assert_eq!(crate::lock(&fx.controller.shared.config).transfer_words, 50);
    }

    #[test]
    fn invalid_configuration_is_logged_and_ignored() {
        let fx = fixture();
        fx.controller.set_memory_address(-1);
        fx.controller.set_memory_address(MEMORY_WORDS as i64);
        fx.controller.set_disk_location(10, 0, 0);
        fx.controller.set_disk_location(0, 10, 0);
        fx.controller.set_disk_location(0, 0, 100);
        fx.controller.set_transfer_size(0);

        let config = *crate::lock(&fx.controller.shared.config);
        assert_eq!(config.memory_address, 0);
        assert_eq!(config.track, 0);
        assert_eq!(config.transfer_words, 1);
    }

    #[test]
    fn wait_completion_returns_immediately_when_idle() {
        let fx = fixture();
        fx.controller.wait_completion();
        assert_eq!(fx.controller.state(), DmaState::Idle);
    }
}
