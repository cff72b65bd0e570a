use std::fmt;

/// Host-observable execution state of the CPU.
///
/// Only `Running` and `Halted` are driven by the core itself: the machine
/// powers on halted, `Machine::new` leaves it running, and the HALT opcode
/// stops it. `WaitingIo` and `Error` exist for host tooling that wants to
/// park the CPU from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CpuState {
    /// Ready to execute the next cycle.
    Running,
    /// Stopped; `cycle` is a no-op until the state is reset.
    #[default]
    Halted,
    /// Parked on an I/O wait by the host.
    WaitingIo,
    /// Parked on an unrecoverable condition by the host.
    Error,
}

impl CpuState {
    /// Returns `true` when the CPU will execute cycles.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for CpuState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Running => "RUNNING",
            Self::Halted => "HALTED",
            Self::WaitingIo => "WAITING_IO",
            Self::Error => "ERROR",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::CpuState;

    #[test]
    fn power_on_state_is_halted() {
        assert_eq!(CpuState::default(), CpuState::Halted);
        assert!(!CpuState::default().is_running());
        assert!(CpuState::Running.is_running());
    }
}
