//! History API
//!
//! In-memory session history: pushState, back, forward, go.
//! Every entry pushed by the engine carries a `{href}` state object.

use serde::{Deserialize, Serialize};

/// State object stored with pushed entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryState {
    pub href: String,
}

impl HistoryState {
    pub fn new(href: &str) -> Self {
        Self {
            href: href.to_string(),
        }
    }
}

/// History entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub url: String,
    pub title: String,
    pub state: Option<HistoryState>,
}

/// History manager
#[derive(Debug)]
pub struct HistoryManager {
    entries: Vec<HistoryEntry>,
    current: usize,
}

impl HistoryManager {
    pub fn new(initial_url: &str) -> Self {
        Self {
            entries: vec![HistoryEntry {
                url: initial_url.to_string(),
                title: String::new(),
                state: None,
            }],
            current: 0,
        }
    }

    /// Push a new history entry
    pub fn push_state(&mut self, state: Option<HistoryState>, title: &str, url: &str) {
        // Remove forward history
        self.entries.truncate(self.current + 1);

        self.entries.push(HistoryEntry {
            url: url.to_string(),
            title: title.to_string(),
            state,
        });
        self.current = self.entries.len() - 1;
    }

    /// Go back
    pub fn back(&mut self) -> Option<&HistoryEntry> {
        self.go(-1)
    }

    /// Go forward
    pub fn forward(&mut self) -> Option<&HistoryEntry> {
        self.go(1)
    }

    /// Go to specific offset
    pub fn go(&mut self, delta: i64) -> Option<&HistoryEntry> {
        let target = self.current as i64 + delta;
        if delta == 0 || target < 0 || target >= self.entries.len() as i64 {
            return None;
        }
        self.current = target as usize;
        self.entries.get(self.current)
    }

    /// Get current entry
    pub fn current(&self) -> &HistoryEntry {
        &self.entries[self.current]
    }

    /// Get history length
    pub fn length(&self) -> usize {
        self.entries.len()
    }
}
