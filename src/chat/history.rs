//! Bounded history of recent chat lines.

use std::collections::VecDeque;

/// Number of lines kept for `/history` and `GET /messages`.
pub const HISTORY_CAPACITY: usize = 30;

/// FIFO ring of the most recent formatted lines, oldest first.
#[derive(Debug, Clone)]
pub struct HistoryRing {
    entries: VecDeque<String>,
    capacity: usize,
}

impl HistoryRing {
    /// Create a ring with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    /// Create a ring holding at most `capacity` lines.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a line, evicting the oldest once full.
    pub fn push(&mut self, line: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(line.into());
    }

    /// Lines in order, newest last.
    pub fn entries(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    /// Most recent line.
    pub fn last(&self) -> Option<&str> {
        self.entries.back().map(String::as_str)
    }

    /// Concatenate all lines (each already newline terminated).
    pub fn render(&self) -> String {
        self.entries.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryRing {
    fn default() -> Self {
        Self::new()
    }
}
