//! Sync status state machine and broadcast stream.
//!
//! ```text
//! idle ──admit──▶ syncing ──▶ completed ──▶ idle
//!                        └──▶ failed ─────▶ idle
//! ```
//!
//! Admission and both terminal transitions happen under one lock, so a
//! terminal state is always broadcast and followed by `idle` before the next
//! attempt can be admitted.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

/// Observable engine status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// No attempt in flight.
    Idle,
    /// Exactly one attempt in flight.
    Syncing,
    /// The last attempt completed.
    Completed,
    /// The last attempt failed.
    Failed,
}

impl SyncStatus {
    /// Returns true for `Completed` and `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Completed | SyncStatus::Failed)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Completed => "completed",
            SyncStatus::Failed => "failed",
        })
    }
}

/// Single-flight status cell with a multi-subscriber broadcast.
#[derive(Debug)]
pub(crate) struct StatusCell {
    state: Mutex<CellState>,
    sender: broadcast::Sender<SyncStatus>,
}

#[derive(Debug)]
struct CellState {
    status: SyncStatus,
    // Held by out-of-band conflict resolution; not broadcast.
    reserved: bool,
}

impl StatusCell {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            state: Mutex::new(CellState {
                status: SyncStatus::Idle,
                reserved: false,
            }),
            sender,
        }
    }

    pub(crate) fn current(&self) -> SyncStatus {
        self.state.lock().status
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SyncStatus> {
        self.sender.subscribe()
    }

    /// Moves `idle → syncing`. Returns false if the engine is busy.
    pub(crate) fn try_admit(&self) -> bool {
        let mut state = self.state.lock();
        if state.status != SyncStatus::Idle || state.reserved {
            return false;
        }
        self.set(&mut state, SyncStatus::Syncing);
        true
    }

    /// Publishes the terminal state, then returns to idle.
    pub(crate) fn finish(&self, terminal: SyncStatus) {
        let mut state = self.state.lock();
        self.set(&mut state, terminal);
        self.set(&mut state, SyncStatus::Idle);
    }

    /// Claims the idle engine without starting an attempt.
    ///
    /// Sync requests are skipped until [`StatusCell::release`].
    pub(crate) fn try_reserve(&self) -> bool {
        let mut state = self.state.lock();
        if state.status != SyncStatus::Idle || state.reserved {
            return false;
        }
        state.reserved = true;
        true
    }

    pub(crate) fn release(&self) {
        self.state.lock().reserved = false;
    }

    fn set(&self, state: &mut CellState, status: SyncStatus) {
        state.status = status;
        // No subscribers is fine.
        let _ = self.sender.send(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_is_single_flight() {
        let cell = StatusCell::new(8);
        assert!(cell.try_admit());
        assert_eq!(cell.current(), SyncStatus::Syncing);
        assert!(!cell.try_admit());

        cell.finish(SyncStatus::Completed);
        assert_eq!(cell.current(), SyncStatus::Idle);
        assert!(cell.try_admit());
    }

    #[test]
    fn subscribers_see_terminal_then_idle() {
        let cell = StatusCell::new(8);
        let mut rx = cell.subscribe();

        assert!(cell.try_admit());
        cell.finish(SyncStatus::Failed);

        assert_eq!(rx.try_recv().unwrap(), SyncStatus::Syncing);
        assert_eq!(rx.try_recv().unwrap(), SyncStatus::Failed);
        assert_eq!(rx.try_recv().unwrap(), SyncStatus::Idle);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn reservation_blocks_admission() {
        let cell = StatusCell::new(8);
        let mut rx = cell.subscribe();

        assert!(cell.try_reserve());
        assert!(!cell.try_reserve());
        assert!(!cell.try_admit());
        assert_eq!(cell.current(), SyncStatus::Idle);

        cell.release();
        assert!(cell.try_admit());
        assert!(!cell.try_reserve());
        assert_eq!(rx.try_recv().unwrap(), SyncStatus::Syncing);
    }

    #[test]
    fn terminal_states() {
        assert!(SyncStatus::Completed.is_terminal());
        assert!(SyncStatus::Failed.is_terminal());
        assert!(!SyncStatus::Idle.is_terminal());
        assert!(!SyncStatus::Syncing.is_terminal());
    }
}
