//! Fixed-capacity identity number pool with FIFO reuse.

use std::collections::{HashSet, VecDeque};

use tracing::warn;

use crate::{Error, Result};

/// Issues identity numbers from a fixed range.
///
/// Allocation takes from the front of the queue and release appends to the
/// back, so a released number is reused only after every other free number.
#[derive(Clone, Debug)]
pub struct IdentityPool {
    available: VecDeque<u32>,
    in_use: HashSet<u32>,
    start: u32,
    end: u32,
}

impl IdentityPool {
    /// Create a pool issuing numbers in `[start, end)`.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` when the range is empty.
    pub fn new(start: u32, end: u32) -> Result<Self> {
        if start >= end {
            return Err(Error::InvalidConfig(format!(
                "identity range [{}, {}) is empty",
                start, end
            )));
        }
        Ok(Self {
            available: (start..end).collect(),
            in_use: HashSet::new(),
            start,
            end,
        })
    }

    /// Take the next free number.
    ///
    /// # Errors
    /// Returns `Error::IdentityPoolExhausted` when every number is in use.
    pub fn allocate(&mut self) -> Result<u32> {
        let id = self
            .available
            .pop_front()
            .ok_or(Error::IdentityPoolExhausted {
                capacity: self.capacity(),
            })?;
        self.in_use.insert(id);
        Ok(id)
    }

    /// Return a number to the back of the queue.
    ///
    /// Returns `false` (and leaves the pool untouched) for numbers that are
    /// out of range or not currently allocated.
    pub fn release(&mut self, id: u32) -> bool {
        if !self.in_use.remove(&id) {
            warn!(id, "Ignoring release of identity number that is not in use");
            return false;
        }
        self.available.push_back(id);
        true
    }

    /// Undo allocations, putting the numbers back at the front of the queue.
    ///
    /// After reclaiming, the next allocations return the reclaimed numbers in
    /// ascending order.
    pub fn reclaim(&mut self, ids: &[u32]) {
        let mut sorted: Vec<u32> = ids.iter().copied().filter(|id| self.in_use.remove(id)).collect();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        for id in sorted {
            self.available.push_front(id);
        }
    }

    pub fn is_in_use(&self, id: u32) -> bool {
        self.in_use.contains(&id)
    }

    pub fn capacity(&self) -> usize {
        (self.end - self.start) as usize
    }

    pub fn available(&self) -> usize {
        self.available.len()
    }

    pub fn in_use_count(&self) -> usize {
        self.in_use.len()
    }
}
