//! Thread-safe handle to a dataset
//!
//! `DataStructure` restores its invariants only at method boundaries, so
//! concurrent use goes through one lock per instance: queries that do not
//! touch the slice cache take a read guard, everything else a write guard.

use crate::block::Block;
use crate::structure::{DataStructure, Selection};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use sparsecube_common::{Coord, ObjectId, Result, Selector};
use std::sync::Arc;

/// Result of a positional lookup through a [`SharedDataStructure`]
#[derive(Debug, Clone)]
pub enum OwnedSelection {
    Block(Block),
    Reduced(DataStructure),
}

/// Cloneable, lock-protected dataset
#[derive(Clone, Debug, Default)]
pub struct SharedDataStructure {
    inner: Arc<RwLock<DataStructure>>,
}

impl From<DataStructure> for SharedDataStructure {
    fn from(structure: DataStructure) -> Self {
        Self::new(structure)
    }
}

impl SharedDataStructure {
    /// Wrap a structure
    #[must_use]
    pub fn new(structure: DataStructure) -> Self {
        Self {
            inner: Arc::new(RwLock::new(structure)),
        }
    }

    /// Shared guard
    pub fn read(&self) -> RwLockReadGuard<'_, DataStructure> {
        self.inner.read()
    }

    /// Exclusive guard
    pub fn write(&self) -> RwLockWriteGuard<'_, DataStructure> {
        self.inner.write()
    }

    /// Number of data objects
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Check if there are no data objects
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Build the axis index
    pub fn validate(&self) -> Result<()> {
        self.inner.write().validate()
    }

    /// Ids located at `query`
    pub fn get_id_for_index(&self, query: &[Selector]) -> Result<Vec<ObjectId>> {
        self.inner.read().get_id_for_index(query)
    }

    /// Positional lookup; the result is detached from the lock
    pub fn get(&self, query: &[Selector]) -> Result<OwnedSelection> {
        let structure = self.inner.read();
        Ok(match structure.get(query)? {
            Selection::Block(block) => OwnedSelection::Block(block.clone()),
            Selection::Reduced(reduced) => OwnedSelection::Reduced(reduced),
        })
    }

    /// Value-based lookup. Takes the write guard because the result is
    /// memoised.
    pub fn get_slice(&self, values: &[Coord]) -> Result<DataStructure> {
        self.inner.write().get_slice(values).cloned()
    }

    /// Copy-on-write removal under a shared guard
    pub fn remove_from_axis(&self, axis: usize, keep: &[bool]) -> Result<DataStructure> {
        self.inner.read().remove_from_axis(axis, keep)
    }

    /// Aggregate consecutive runs in place
    pub fn sum_in_order(&self, increment: usize, sum_metadata: bool) -> Result<()> {
        self.inner.write().sum_in_order(increment, sum_metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn shared_line(n: u32) -> SharedDataStructure {
        let mut ds = DataStructure::default();
        for i in 0..n {
            ds.add_data_object(f64::from(i), vec![i as usize], None)
                .unwrap();
        }
        ds.validate().unwrap();
        ds.into()
    }

    #[test]
    fn test_readers_share_one_structure() {
        let shared = shared_line(8);
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let shared = shared.clone();
                thread::spawn(move || {
                    let ids = shared.get_id_for_index(&[Selector::At(t)]).unwrap();
                    assert_eq!(ids.len(), 1);
                    shared.remove_from_axis(0, &[t % 2 == 0; 8]).unwrap().len()
                })
            })
            .collect();
        let kept: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(kept, vec![8, 0, 8, 0]);
        assert_eq!(shared.len(), 8);
    }

    #[test]
    fn test_get_detaches_results() {
        let shared = shared_line(3);
        match shared.get(&[Selector::At(1)]).unwrap() {
            OwnedSelection::Block(block) => assert_eq!(block, Block::from(1.0)),
            OwnedSelection::Reduced(_) => panic!("expected a single block"),
        }
        match shared.get(&[Selector::All]).unwrap() {
            OwnedSelection::Reduced(reduced) => assert_eq!(reduced.len(), 3),
            OwnedSelection::Block(_) => panic!("expected a reduced structure"),
        }
    }

    #[test]
    fn test_writers_are_exclusive() {
        let shared = shared_line(4);
        let writer = {
            let shared = shared.clone();
            thread::spawn(move || shared.sum_in_order(2, false))
        };
        writer.join().unwrap().unwrap();
        assert_eq!(shared.len(), 2);
        let slice = shared.get_slice(&[Coord::from(0.0)]).unwrap();
        assert_eq!(slice.len(), 1);
        assert_eq!(shared.read().cached_slices(), 1);
    }
}
