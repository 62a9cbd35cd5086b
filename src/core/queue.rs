use thiserror::Error;

use super::state::WorkloadId;

// Backing storage grows by this many slots at a time
pub const QUEUE_GROWTH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("index {index} out of range for queue of size {size}")]
    IndexOutOfRange { index: usize, size: usize },
}

/// Ordered sequence of workload handles. Position 0 is the head.
#[derive(Debug, Default, Clone)]
pub struct Queue {
    items: Vec<WorkloadId>,
}

impl Queue {
    pub fn new() -> Self {
        Self {
            items: Vec::with_capacity(QUEUE_GROWTH),
        }
    }

    pub fn append(&mut self, id: WorkloadId) {
        if self.items.len() == self.items.capacity() {
            self.items.reserve_exact(QUEUE_GROWTH);
        }
        self.items.push(id);
    }

    /// Removes the entry at `index`, shifting later entries down by one.
    pub fn remove_at(&mut self, index: usize) -> Result<WorkloadId, QueueError> {
        if index >= self.items.len() {
            return Err(QueueError::IndexOutOfRange {
                index,
                size: self.items.len(),
            });
        }
        Ok(self.items.remove(index))
    }

    pub fn pop_front(&mut self) -> Option<WorkloadId> {
        self.remove_at(0).ok()
    }

    /// Removes the first entry with the smallest key.
    pub fn remove_min_by_key<K: Ord>(
        &mut self,
        mut key: impl FnMut(WorkloadId) -> K,
    ) -> Option<WorkloadId> {
        let index = self
            .items
            .iter()
            .enumerate()
            .min_by_key(|&(_, &id)| key(id))
            .map(|(index, _)| index)?;
        self.remove_at(index).ok()
    }

    /// Removes every entry matching `pred`, preserving the order of both
    /// the removed entries and the remainder.
    pub fn take_where(&mut self, mut pred: impl FnMut(WorkloadId) -> bool) -> Vec<WorkloadId> {
        let mut taken = Vec::new();
        let mut index = 0;
        while index < self.items.len() {
            if pred(self.items[index]) {
                taken.push(self.items.remove(index));
            } else {
                index += 1;
            }
        }
        taken
    }

    /// Stable sort.
    pub fn sort_by_key<K: Ord>(&mut self, mut key: impl FnMut(WorkloadId) -> K) {
        self.items.sort_by_key(|&id| key(id));
    }

    pub fn get(&self, index: usize) -> Option<WorkloadId> {
        self.items.get(index).copied()
    }

    pub fn front(&self) -> Option<WorkloadId> {
        self.get(0)
    }

    pub fn contains(&self, id: WorkloadId) -> bool {
        self.items.contains(&id)
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = WorkloadId> + '_ {
        self.items.iter().copied()
    }
}
