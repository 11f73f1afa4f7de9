//! Debounced set of files awaiting re-index.
//!
//! Editors save in bursts; every mark pushes the single deadline out, so a
//! burst costs one round of jobs. The driver polls [`DirtySet::take_ready`]
//! on its tick.

use crate::types::FileId;
use std::collections::HashSet;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct DirtySet {
    pending: HashSet<FileId>,
    deadline: Option<Instant>,
    debounce: Duration,
}

impl DirtySet {
    pub fn new(debounce: Duration) -> Self {
        Self {
            pending: HashSet::new(),
            deadline: None,
            debounce,
        }
    }

    /// Mark a file dirty and re-arm the timer.
    pub fn mark(&mut self, file_id: FileId) {
        self.pending.insert(file_id);
        self.deadline = Some(Instant::now() + self.debounce);
    }

    pub fn contains(&self, file_id: FileId) -> bool {
        self.pending.contains(&file_id)
    }

    pub fn remove(&mut self, file_id: FileId) {
        self.pending.remove(&file_id);
        if self.pending.is_empty() {
            self.deadline = None;
        }
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// The pending set, once the debounce interval has passed. Disarms the
    /// timer; marks arriving afterwards re-arm it.
    pub fn take_ready(&mut self) -> Option<HashSet<FileId>> {
        let deadline = self.deadline?;
        if Instant::now() < deadline {
            return None;
        }
        self.deadline = None;
        Some(std::mem::take(&mut self.pending))
    }

    /// Pending ids regardless of the timer, sorted; used by persistence.
    pub fn snapshot(&self) -> Vec<FileId> {
        let mut ids: Vec<_> = self.pending.iter().copied().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn fid(value: u32) -> FileId {
        FileId::new(value).unwrap()
    }

    #[test]
    fn test_not_ready_before_debounce() {
        let mut dirty = DirtySet::new(Duration::from_millis(50));
        dirty.mark(fid(1));

        assert!(dirty.is_armed());
        assert!(dirty.take_ready().is_none());

        sleep(Duration::from_millis(60));
        let ready = dirty.take_ready().unwrap();
        assert_eq!(ready, HashSet::from([fid(1)]));
        assert!(!dirty.is_armed());
        assert!(dirty.is_empty());
    }

    #[test]
    fn test_new_mark_resets_deadline() {
        let mut dirty = DirtySet::new(Duration::from_millis(50));
        dirty.mark(fid(1));

        sleep(Duration::from_millis(30));
        dirty.mark(fid(2));

        // Only 30ms since the second mark.
        sleep(Duration::from_millis(30));
        assert!(dirty.take_ready().is_none());

        sleep(Duration::from_millis(30));
        let ready = dirty.take_ready().unwrap();
        assert_eq!(ready, HashSet::from([fid(1), fid(2)]));
    }

    #[test]
    fn test_remove_last_pending_disarms() {
        let mut dirty = DirtySet::new(Duration::from_millis(50));
        dirty.mark(fid(1));
        dirty.remove(fid(1));

        assert!(!dirty.is_armed());
        sleep(Duration::from_millis(60));
        assert!(dirty.take_ready().is_none());
    }

    #[test]
    fn test_marks_after_fire_rearm() {
        let mut dirty = DirtySet::new(Duration::from_millis(10));
        dirty.mark(fid(1));
        sleep(Duration::from_millis(20));
        assert!(dirty.take_ready().is_some());

        // A mark landing after the fire starts a fresh round.
        dirty.mark(fid(2));
        assert!(dirty.is_armed());
        sleep(Duration::from_millis(20));
        assert_eq!(dirty.take_ready().unwrap(), HashSet::from([fid(2)]));
    }
}
