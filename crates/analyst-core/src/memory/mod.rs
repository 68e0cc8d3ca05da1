//! Session memory: a bounded buffer of recent findings.
//!
//! Analyses running in the same session see what earlier analyses concluded,
//! which keeps multi-request reviews consistent. Memory lives for one process
//! run and is never persisted.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Number of findings retained.
pub const SESSION_MEMORY_CAPACITY: usize = 5;

/// Text returned by [`SessionMemory::formatted`] when nothing was recorded.
pub const EMPTY_MEMORY: &str = "None.";

/// Fixed-capacity FIFO of `"[source] summary"` entries.
///
/// All access is serialised through an internal mutex. The backing buffer is
/// never handed out; callers get formatted text or an owned snapshot.
#[derive(Debug)]
pub struct SessionMemory {
    capacity: usize,
    entries: Mutex<VecDeque<String>>,
}

impl Default for SessionMemory {
    fn default() -> Self {
        Self::with_capacity(SESSION_MEMORY_CAPACITY)
    }
}

impl SessionMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a buffer holding at most `capacity` entries (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity + 1)),
        }
    }

    /// Appends a finding, evicting the oldest one past capacity.
    ///
    /// Blank sources or summaries are ignored.
    pub fn record(&self, source: &str, summary: &str) {
        if source.trim().is_empty() || summary.trim().is_empty() {
            tracing::debug!("Skipping session memory entry with blank source or summary");
            return;
        }

        let mut entries = self.lock();
        entries.push_back(format!("[{}] {}", source, summary));
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Entries joined by newlines, or `"None."` when empty.
    pub fn formatted(&self) -> String {
        let entries = self.lock();
        if entries.is_empty() {
            return EMPTY_MEMORY.to_string();
        }
        entries.iter().cloned().collect::<Vec<_>>().join("\n")
    }

    /// Owned copy of the current entries, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // A panic while holding the lock cannot leave the deque half-updated, so a
    // poisoned lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_empty_memory_formats_as_none() {
        let memory = SessionMemory::new();
        assert_eq!(memory.formatted(), "None.");
        assert!(memory.is_empty());
    }

    #[test]
    fn test_record_formats_entry() {
        let memory = SessionMemory::new();
        memory.record("https://example.com/login", "No issues found.");
        assert_eq!(memory.formatted(), "[https://example.com/login] No issues found.");
    }

    #[test]
    fn test_keeps_five_most_recent_in_order() {
        let memory = SessionMemory::new();
        for i in 0..12 {
            memory.record(&format!("src{}", i), &format!("finding {}", i));
            assert!(memory.len() <= SESSION_MEMORY_CAPACITY);
        }

        let expected: Vec<String> = (7..12)
            .map(|i| format!("[src{}] finding {}", i, i))
            .collect();
        assert_eq!(memory.snapshot(), expected);
        assert_eq!(memory.formatted(), expected.join("\n"));
    }

    #[test]
    fn test_blank_arguments_are_ignored() {
        let memory = SessionMemory::new();
        memory.record("", "summary");
        memory.record("source", "  ");
        assert!(memory.is_empty());
    }

    #[test]
    fn test_clear() {
        let memory = SessionMemory::new();
        memory.record("a", "b");
        memory.clear();
        assert_eq!(memory.formatted(), EMPTY_MEMORY);
    }

    #[test]
    fn test_concurrent_writers_respect_capacity() {
        let memory = Arc::new(SessionMemory::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let memory = Arc::clone(&memory);
                thread::spawn(move || {
                    for i in 0..50 {
                        memory.record(&format!("t{}", t), &format!("n{}", i));
                        if i % 10 == 0 {
                            memory.clear();
                        }
                        assert!(memory.formatted().lines().count() <= SESSION_MEMORY_CAPACITY);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(memory.len() <= SESSION_MEMORY_CAPACITY);
    }
}
