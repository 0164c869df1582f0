//! Append-only chunked arena.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TinError};

/// A growable sequence stored as fixed-capacity partitions.
///
/// Growth appends a new partition and never moves existing ones, so an index
/// handed out once stays valid for the life of the arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionedVec<T> {
    partition_size: usize,
    partitions: Vec<Vec<T>>,
    len: usize,
}

impl<T> PartitionedVec<T> {
    pub fn new(partition_size: usize) -> Self {
        Self {
            partition_size: partition_size.max(1),
            partitions: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Appends `value` and returns its index.
    pub fn push(&mut self, value: T) -> Result<usize> {
        let full = self
            .partitions
            .last()
            .map_or(true, |p| p.len() >= self.partition_size);
        if full {
            let mut partition = Vec::new();
            partition
                .try_reserve_exact(self.partition_size)
                .map_err(|e| TinError::MemoryExhaustion(e.to_string()))?;
            self.partitions.push(partition);
        }
        let index = self.len;
        if let Some(partition) = self.partitions.last_mut() {
            partition.push(value);
        }
        self.len += 1;
        Ok(index)
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.partitions
            .get(index / self.partition_size)?
            .get(index % self.partition_size)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.partitions
            .get_mut(index / self.partition_size)?
            .get_mut(index % self.partition_size)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.partitions.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.partitions.iter_mut().flatten()
    }

    /// Releases every partition at once.
    pub fn clear(&mut self) {
        self.partitions.clear();
        self.len = 0;
    }
}

impl<T> std::ops::Index<usize> for PartitionedVec<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.partitions[index / self.partition_size][index % self.partition_size]
    }
}

impl<T> std::ops::IndexMut<usize> for PartitionedVec<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.partitions[index / self.partition_size][index % self.partition_size]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_keeps_indices() {
        let mut v = PartitionedVec::new(3);
        for i in 0..10 {
            assert_eq!(v.push(i * 10).unwrap(), i);
        }
        assert_eq!(v.len(), 10);
        assert_eq!(v.partition_count(), 4);
        assert_eq!(v[7], 70);
        assert_eq!(v.get(10), None);
        v[2] = 5;
        assert_eq!(v.iter().copied().collect::<Vec<_>>()[2], 5);
    }
}
