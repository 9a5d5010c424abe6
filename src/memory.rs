//! Process-wide tuning for bulk text parsing.
//!
//! Row readers consult this state: with periodic compaction on, they shrink their scratch
//! line buffer every `occasional_frequency` rows, and they log progress at the same interval.
//! A large model read switches compaction off and raises the interval for its whole
//! duration through [`BulkReadGuard`].

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;

pub const DEFAULT_OCCASIONAL_FREQUENCY: usize = 1000;
pub const BULK_OCCASIONAL_FREQUENCY: usize = 50000;

static PERIODIC_COMPACTION: AtomicBool = AtomicBool::new(true);
static OCCASIONAL_FREQUENCY: AtomicUsize = AtomicUsize::new(DEFAULT_OCCASIONAL_FREQUENCY);

pub fn is_periodic_compaction_active() -> bool {
    PERIODIC_COMPACTION.load(Ordering::SeqCst)
}

pub fn toggle_periodic_compaction(active: bool) {
    PERIODIC_COMPACTION.store(active, Ordering::SeqCst)
}

pub fn occasional_frequency() -> usize {
    OCCASIONAL_FREQUENCY.load(Ordering::SeqCst)
}

pub fn set_occasional_frequency(frequency: usize) {
    OCCASIONAL_FREQUENCY.store(frequency.max(1), Ordering::SeqCst)
}


/// Holds bulk-read tuning while alive and puts the previous settings back on drop.
pub struct BulkReadGuard {
    original_periodic: bool,
    original_frequency: usize,
}

impl BulkReadGuard {

    pub fn acquire() -> BulkReadGuard {

        let original_periodic = is_periodic_compaction_active();
        let original_frequency = occasional_frequency();

        if original_periodic {
            toggle_periodic_compaction(false);
        }
        set_occasional_frequency(BULK_OCCASIONAL_FREQUENCY);
        debug!("bulk read tuning on (was periodic={}, frequency={})", original_periodic, original_frequency);

        Self { original_periodic, original_frequency }
    }
}

impl Drop for BulkReadGuard {
    fn drop(&mut self) {
        if self.original_periodic {
            toggle_periodic_compaction(true);
        }
        set_occasional_frequency(self.original_frequency);
        debug!("bulk read tuning restored");
    }
}


/// Row-level hook used by the text readers. Returns true on rows where progress was due.
pub fn on_row_parsed(row: usize, scratch: &mut String) -> bool {
    let frequency = occasional_frequency();
    if row == 0 || row % frequency != 0 {
        return false;
    }
    if is_periodic_compaction_active() {
        scratch.shrink_to(256);
    }
    debug!("parsed {} rows", row);
    true
}
