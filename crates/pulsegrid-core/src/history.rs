//! Bounded undo/redo history of value snapshots

use std::collections::VecDeque;

/// Default number of undo steps kept
pub const DEFAULT_HISTORY_DEPTH: usize = 50;

#[derive(Debug, Clone)]
pub struct History<T> {
    past: VecDeque<T>,
    future: Vec<T>,
    depth: usize,
}

impl<T> Default for History<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

impl<T> History<T> {
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            past: VecDeque::with_capacity(depth),
            future: Vec::new(),
            depth,
        }
    }

    /// Remember the state prior to a mutation; drops the oldest entry when full
    pub fn record(&mut self, snapshot: T) {
        if self.past.len() == self.depth {
            self.past.pop_front();
        }
        self.past.push_back(snapshot);
        self.future.clear();
    }

    /// Swap `current` for the previous snapshot
    pub fn undo(&mut self, current: T) -> Option<T> {
        let previous = self.past.pop_back()?;
        self.future.push(current);
        Some(previous)
    }

    /// Swap `current` for the next snapshot
    pub fn redo(&mut self, current: T) -> Option<T> {
        let next = self.future.pop()?;
        self.past.push_back(current);
        if self.past.len() > self.depth {
            self.past.pop_front();
        }
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn len(&self) -> usize {
        self.past.len()
    }

    pub fn is_empty(&self) -> bool {
        self.past.is_empty()
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }
}
