//! Recording progress listener for testing.

use crate::transfer::{ProgressListener, TransferProgress};
use parking_lot::Mutex;

/// Records every progress update it receives.
#[derive(Debug, Default)]
pub struct RecordingProgressListener {
    events: Mutex<Vec<(u64, u64)>>,
}

impl RecordingProgressListener {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All `(bytes_transferred, total_bytes)` updates in call order.
    pub fn events(&self) -> Vec<(u64, u64)> {
        self.events.lock().clone()
    }

    /// Most recent update.
    pub fn last(&self) -> Option<TransferProgress> {
        self.events
            .lock()
            .last()
            .map(|&(done, total)| TransferProgress::new(done, total))
    }

    /// Returns true if the most recent update covers every byte of a known
    /// total.
    ///
    /// This only says every byte was handed over. An upload the store then
    /// rejects ends on `(total, total)` as well, so check the operation's
    /// result before reading this as success.
    pub fn is_complete(&self) -> bool {
        self.last().is_some_and(|p| p.is_total_known() && p.is_complete())
    }

    /// Returns true if `bytes_transferred` never decreased.
    pub fn is_monotonic(&self) -> bool {
        self.events.lock().windows(2).all(|w| w[0].0 <= w[1].0)
    }
}

impl ProgressListener for RecordingProgressListener {
    fn processed(&self, bytes_transferred: u64, total_bytes: u64) {
        self.events.lock().push((bytes_transferred, total_bytes));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        let listener = RecordingProgressListener::new();
        assert!(!listener.is_complete());

        listener.processed(3, 6);
        assert!(!listener.is_complete());
        listener.processed(6, 6);

        assert_eq!(listener.events(), vec![(3, 6), (6, 6)]);
        assert!(listener.is_complete());
        assert!(listener.is_monotonic());
    }

    #[test]
    fn test_complete_means_all_bytes_not_success() {
        let listener = RecordingProgressListener::new();
        // A single-chunk upload rejected after the body went out.
        listener.processed(3, 3);
        assert!(listener.is_complete());
        assert_eq!(listener.events().len(), 1);
    }

    #[test]
    fn test_unknown_total_is_not_complete() {
        let listener = RecordingProgressListener::new();
        listener.processed(5, TransferProgress::UNKNOWN_TOTAL);
        assert!(!listener.is_complete());
    }
}
