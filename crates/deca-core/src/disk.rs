//! The cylinder/head/sector disk store.
//!
//! Geometry is fixed at 10 tracks x 10 cylinders x 100 sectors, each sector
//! holding one 8-character payload. There is no head-motion simulation; the
//! head triple only moves on an explicit seek and exists for the operator
//! console's disk report.

use log::{debug, error, info, warn};

use crate::word::{Word, WORD_LEN};

/// Number of tracks.
pub const TRACKS: usize = 10;
/// Number of cylinders per track.
pub const CYLINDERS: usize = 10;
/// Number of sectors per cylinder.
pub const SECTORS_PER_CYLINDER: usize = 100;
/// Payload bytes per sector.
pub const SECTOR_BYTES: usize = WORD_LEN;

/// The sector store plus the current head position.
#[derive(Debug)]
pub struct Disk {
    sectors: Box<[Word]>,
    head: (usize, usize, usize),
}

impl Disk {
    /// Builds a formatted disk with the head parked at the origin.
    #[must_use]
    pub fn new() -> Self {
        let sectors =
            vec![Word::ZERO; TRACKS * CYLINDERS * SECTORS_PER_CYLINDER].into_boxed_slice();
        info!(
            "disk initialized: {TRACKS} tracks, {CYLINDERS} cylinders, {SECTORS_PER_CYLINDER} sectors per cylinder"
        );
        Self {
            sectors,
            head: (0, 0, 0),
        }
    }

    fn index(track: i64, cylinder: i64, sector: i64) -> Option<usize> {
        let track_ok = (0..TRACKS as i64).contains(&track);
        let cylinder_ok = (0..CYLINDERS as i64).contains(&cylinder);
        let sector_ok = (0..SECTORS_PER_CYLINDER as i64).contains(&sector);
        if !(track_ok && cylinder_ok && sector_ok) {
            return None;
        }
        Some(
            (track as usize * CYLINDERS + cylinder as usize) * SECTORS_PER_CYLINDER
                + sector as usize,
        )
    }

    /// Reads one sector. Invalid coordinates log an error and yield the
    /// `ERROR` sentinel.
    #[must_use]
    pub fn read_sector(&self, track: i64, cylinder: i64, sector: i64) -> Word {
        let Some(index) = Self::index(track, cylinder, sector) else {
            error!("invalid disk coordinates: T={track}, C={cylinder}, S={sector}");
            return Word::ERROR;
        };
        let word = self.sectors[index];
        debug!("disk read: T={track}, C={cylinder}, S={sector} -> {word}");
        word
    }

    /// Writes one sector. Invalid coordinates log an error and skip the
    /// write; a payload that is not exactly 8 bytes logs a warning but is
    /// stored anyway (truncated or padded).
    pub fn write_sector(&mut self, track: i64, cylinder: i64, sector: i64, data: &[u8]) {
        let Some(index) = Self::index(track, cylinder, sector) else {
            error!("invalid disk coordinates: T={track}, C={cylinder}, S={sector}");
            return;
        };
        if data.len() != SECTOR_BYTES {
            warn!(
                "sector payload has {} bytes instead of {SECTOR_BYTES}",
                data.len()
            );
        }
        self.sectors[index] = Word::from_text(data);
        debug!(
            "disk write: T={track}, C={cylinder}, S={sector} <- {}",
            self.sectors[index]
        );
    }

    /// Moves the head to the given coordinates when they are valid.
    pub fn seek(&mut self, track: i64, cylinder: i64, sector: i64) {
        if Self::index(track, cylinder, sector).is_none() {
            error!("invalid seek target: T={track}, C={cylinder}, S={sector}");
            return;
        }
        self.head = (track as usize, cylinder as usize, sector as usize);
        debug!("head moved to T={track}, C={cylinder}, S={sector}");
    }

    /// Current head position as (track, cylinder, sector).
    #[must_use]
    pub const fn head(&self) -> (usize, usize, usize) {
        self.head
    }

    /// Rewrites every sector with the zero word.
    pub fn format(&mut self) {
        self.sectors.fill(Word::ZERO);
        info!("disk formatted");
    }
}

impl Default for Disk {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{Disk, CYLINDERS, SECTORS_PER_CYLINDER, TRACKS};
    use crate::word::Word;

    #[test]
    fn new_disk_is_zero_filled() {
        let disk = Disk::new();
        assert_eq!(disk.read_sector(0, 0, 0), Word::ZERO);
        assert_eq!(
            disk.read_sector(
                TRACKS as i64 - 1,
                CYLINDERS as i64 - 1,
                SECTORS_PER_CYLINDER as i64 - 1
            ),
            Word::ZERO
        );
    }

    #[test]
    fn sectors_are_independent() {
        let mut disk = Disk::new();
        disk.write_sector(1, 2, 3, b"00000042");
        disk.write_sector(3, 2, 1, b"00000077");
        assert_eq!(disk.read_sector(1, 2, 3).to_int(), 42);
        assert_eq!(disk.read_sector(3, 2, 1).to_int(), 77);
        assert_eq!(disk.read_sector(1, 2, 4), Word::ZERO);
    }

    #[rstest]
    #[case(-1, 0, 0)]
    #[case(TRACKS as i64, 0, 0)]
    #[case(0, CYLINDERS as i64, 0)]
    #[case(0, 0, SECTORS_PER_CYLINDER as i64)]
    fn invalid_coordinates_read_the_error_sentinel(
        #[case] track: i64,
        #[case] cylinder: i64,
        #[case] sector: i64,
    ) {
        let disk = Disk::new();
        assert_eq!(disk.read_sector(track, cylinder, sector), Word::ERROR);
    }

    #[test]
    fn invalid_write_is_skipped() {
        let mut disk = Disk::new();
        disk.write_sector(0, 0, SECTORS_PER_CYLINDER as i64, b"00000042");
        assert_eq!(disk.read_sector(0, 0, 0), Word::ZERO);
    }

    #[test]
    fn short_payload_is_stored_padded() {
        let mut disk = Disk::new();
        disk.write_sector(0, 0, 0, b"ABC");
        assert_eq!(disk.read_sector(0, 0, 0).to_string(), "ABC");
    }

    #[test]
    fn seek_moves_the_head_only_to_valid_targets() {
        let mut disk = Disk::new();
        disk.seek(4, 5, 6);
        assert_eq!(disk.head(), (4, 5, 6));
        disk.seek(99, 0, 0);
        assert_eq!(disk.head(), (4, 5, 6));
    }

    #[test]
    fn format_clears_previous_writes() {
        let mut disk = Disk::new();
        disk.write_sector(2, 2, 2, b"00000042");
        disk.format();
        assert_eq!(disk.read_sector(2, 2, 2), Word::ZERO);
    }
}
