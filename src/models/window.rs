use crate::error::{DetectorError, Result};
use std::collections::VecDeque;

/// Fixed-capacity FIFO of the most recent observations.
///
/// `push` may leave the buffer one past capacity until the owner calls
/// `truncate_to_capacity`; the detector always does so before returning.
#[derive(Debug, Clone)]
pub struct WindowBuffer {
    capacity: usize,
    items: VecDeque<f64>,
}

impl WindowBuffer {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(DetectorError::InvalidConfiguration(
                "window size must be a positive integer".into(),
            ));
        }
        Ok(Self {
            capacity,
            items: VecDeque::with_capacity(capacity + 1),
        })
    }

    pub fn push(&mut self, x: f64) {
        self.items.push_back(x);
    }

    /// Remove the newest observation, undoing the last `push`.
    pub fn pop_latest(&mut self) -> Option<f64> {
        self.items.pop_back()
    }

    /// The `n` newest observations, oldest first.
    pub fn last_n(&self, n: usize) -> Result<Vec<f64>> {
        let available = self.items.len();
        if n > available {
            return Err(DetectorError::NotEnoughObservations {
                requested: n,
                available,
            });
        }
        Ok(self.items.iter().skip(available - n).copied().collect())
    }

    /// Evict the oldest entries until at most `capacity` remain.
    pub fn truncate_to_capacity(&mut self) {
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.items.iter()
    }
}
