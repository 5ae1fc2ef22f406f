//! Per-dimension coordinate index
//!
//! Each axis carries a name, a unit, one coordinate label per position and
//! an inverted index: `buckets[axis][k]` lists every data object whose
//! `index[axis] == k`. Positional queries intersect those buckets; removal
//! scrubs ids from them and [`Axes::clean_axes`] compacts away positions
//! that no longer hold anything.
//!
//! # Query resolution
//!
//! ```text
//! query    [ 2 ,  -  ,  0 ]
//!            │    │     │
//! axis 0   bucket[2] ─────────┐
//! axis 1   all buckets        ├─ smallest set is the pivot,
//! axis 2   bucket[0] ─────────┘  the rest are membership filters
//! ```

use crate::object::DataObject;
use serde::{Deserialize, Serialize};
use sparsecube_common::{Coord, Error, ObjectId, Result, Selector, StoreConfig};
use std::collections::HashSet;
use tracing::trace;

/// Mapping from old coordinate positions to new ones on one axis.
///
/// Positions whose bucket was emptied map to `None`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Equivalence(Vec<Option<usize>>);

impl Equivalence {
    /// New position of `old`, if it survived
    #[must_use]
    pub fn get(&self, old: usize) -> Option<usize> {
        self.0.get(old).copied().flatten()
    }

    /// Number of positions before compaction
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the axis had no positions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of positions that survived
    #[must_use]
    pub fn survivors(&self) -> usize {
        self.0.iter().flatten().count()
    }
}

/// Candidate ids for one query component
enum Candidates<'a> {
    All(&'a [Vec<ObjectId>]),
    Bucket(&'a [ObjectId]),
}

impl Candidates<'_> {
    fn len(&self) -> usize {
        match self {
            Self::All(buckets) => buckets.iter().map(Vec::len).sum(),
            Self::Bucket(ids) => ids.len(),
        }
    }

    fn to_vec(&self) -> Vec<ObjectId> {
        match self {
            Self::All(buckets) => buckets.iter().flatten().copied().collect(),
            Self::Bucket(ids) => ids.to_vec(),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn default_value(position: usize) -> Coord {
    Coord::Num(position as f64)
}

/// Coordinate index over all axes of a structure
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Axes {
    names: Vec<String>,
    units: Vec<String>,
    values: Vec<Vec<Coord>>,
    buckets: Vec<Vec<Vec<ObjectId>>>,
}

impl Axes {
    fn with_dim(dim: usize, config: &StoreConfig) -> Self {
        Self {
            names: (0..dim).map(|i| config.axis_name(i)).collect(),
            units: vec![String::new(); dim],
            values: vec![Vec::new(); dim],
            buckets: vec![Vec::new(); dim],
        }
    }

    /// Build the index from a set of objects.
    ///
    /// The dimension is taken from the first object; each axis is as long as
    /// the largest position used on it plus one, and its labels default to
    /// `0..len`.
    pub fn build(objects: &[DataObject], config: &StoreConfig) -> Result<Self> {
        let first = objects.first().ok_or(Error::EmptyStructure)?;
        let mut axes = Self::with_dim(first.index().len(), config);
        for object in objects {
            axes.insert(object.id(), object.index())?;
        }
        Ok(axes)
    }

    /// Number of axes
    #[must_use]
    pub fn dim(&self) -> usize {
        self.names.len()
    }

    /// Number of positions on every axis
    #[must_use]
    pub fn axes_len(&self) -> Vec<usize> {
        self.buckets.iter().map(Vec::len).collect()
    }

    /// Number of positions on one axis
    pub fn len(&self, axis: usize) -> Result<usize> {
        self.check_axis(axis)?;
        Ok(self.buckets[axis].len())
    }

    /// Check if there are no axes at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Axis names in order
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Axis units in order
    #[must_use]
    pub fn units(&self) -> &[String] {
        &self.units
    }

    /// Coordinate labels of one axis
    pub fn values(&self, axis: usize) -> Result<&[Coord]> {
        self.check_axis(axis)?;
        Ok(&self.values[axis])
    }

    /// Inverted index of one axis
    pub fn buckets(&self, axis: usize) -> Result<&[Vec<ObjectId>]> {
        self.check_axis(axis)?;
        Ok(&self.buckets[axis])
    }

    /// Position of the axis called `name`
    pub fn axis_index(&self, name: &str) -> Result<usize> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| Error::AxisNotFound(name.to_string()))
    }

    fn check_axis(&self, axis: usize) -> Result<()> {
        if axis < self.dim() {
            Ok(())
        } else {
            Err(Error::AxisNotFound(format!("#{axis}")))
        }
    }

    /// Name, unit and labels of one axis. One label per position.
    pub fn set_axis(
        &mut self,
        axis: usize,
        name: impl Into<String>,
        unit: impl Into<String>,
        values: Vec<Coord>,
    ) -> Result<()> {
        self.check_axis(axis)?;
        if values.len() != self.buckets[axis].len() {
            return Err(Error::invalid_argument(format!(
                "axis {axis} has {} positions, got {} values",
                self.buckets[axis].len(),
                values.len()
            )));
        }
        self.names[axis] = name.into();
        self.units[axis] = unit.into();
        self.values[axis] = values;
        Ok(())
    }

    /// Overwrite an axis with labels taken from a wider parent axis,
    /// padding the buckets with empty positions to match.
    pub(crate) fn transplant(
        &mut self,
        axis: usize,
        name: &str,
        unit: &str,
        values: &[Coord],
    ) -> Result<()> {
        self.check_axis(axis)?;
        let buckets = &mut self.buckets[axis];
        if values.len() < buckets.len() {
            return Err(Error::internal(format!(
                "cannot transplant {} labels onto axis {axis} of length {}",
                values.len(),
                buckets.len()
            )));
        }
        buckets.resize_with(values.len(), Vec::new);
        self.names[axis] = name.to_string();
        self.units[axis] = unit.to_string();
        self.values[axis] = values.to_vec();
        Ok(())
    }

    /// Position of the label `value` on `axis`
    pub fn get_position(&self, value: &Coord, axis: usize) -> Result<usize> {
        self.check_axis(axis)?;
        self.values[axis]
            .iter()
            .position(|v| v == value)
            .ok_or_else(|| Error::CoordNotFound {
                axis,
                value: value.to_string(),
            })
    }

    /// Resolve a positional query to the ids located there.
    ///
    /// Each component yields a candidate set: the whole axis for a wildcard,
    /// one bucket otherwise. The smallest set is walked and every id missing
    /// from any other component's set is dropped.
    pub fn get_id_for_index(&self, query: &[Selector]) -> Result<Vec<ObjectId>> {
        if query.len() != self.dim() {
            return Err(Error::invalid_query(format!(
                "query has {} components but there are {} axes",
                query.len(),
                self.dim()
            )));
        }

        let mut candidates = Vec::with_capacity(query.len());
        for (axis, selector) in query.iter().enumerate() {
            match *selector {
                Selector::All => candidates.push(Candidates::All(&self.buckets[axis])),
                Selector::At(k) => {
                    let bucket = self.buckets[axis].get(k).ok_or_else(|| {
                        Error::invalid_query(format!(
                            "position {k} is outside axis {axis} of length {}",
                            self.buckets[axis].len()
                        ))
                    })?;
                    candidates.push(Candidates::Bucket(bucket));
                }
            }
        }

        let Some((pivot, _)) = candidates
            .iter()
            .enumerate()
            .min_by_key(|(_, c)| c.len())
        else {
            return Ok(Vec::new());
        };
        trace!("get_id_for_index: pivot axis {}", pivot);

        // Wildcard sets hold every indexed id, so only buckets can reject.
        let filters: Vec<HashSet<ObjectId>> = candidates
            .iter()
            .enumerate()
            .filter(|(axis, _)| *axis != pivot)
            .filter_map(|(_, c)| match c {
                Candidates::Bucket(ids) => Some(ids.iter().copied().collect()),
                Candidates::All(_) => None,
            })
            .collect();

        let mut ids = candidates[pivot].to_vec();
        ids.retain(|id| filters.iter().all(|set| set.contains(id)));
        Ok(ids)
    }

    /// Add one object to the index, growing axes with default labels when
    /// its position lies past the current end.
    pub(crate) fn insert(&mut self, id: ObjectId, index: &[usize]) -> Result<()> {
        if index.len() != self.dim() {
            return Err(Error::DimensionMismatch {
                expected: self.dim(),
                found: index.len(),
                object: id,
            });
        }
        for (axis, &position) in index.iter().enumerate() {
            let buckets = &mut self.buckets[axis];
            if position >= buckets.len() {
                let old_len = buckets.len();
                buckets.resize_with(position + 1, Vec::new);
                self.values[axis].extend((old_len..=position).map(default_value));
            }
            self.buckets[axis][position].push(id);
        }
        Ok(())
    }

    /// Merge positions that carry the same label.
    ///
    /// Labels are sorted and deduplicated; every object's position on the
    /// axis is rewritten through the old -> new transfer map and the
    /// buckets are rebuilt.
    pub(crate) fn collapse_axis(&mut self, axis: usize, objects: &mut [DataObject]) -> Result<()> {
        self.check_axis(axis)?;
        let mut unique = self.values[axis].clone();
        unique.sort();
        unique.dedup();

        let transfer = self.values[axis]
            .iter()
            .map(|v| {
                unique
                    .binary_search(v)
                    .map_err(|_| Error::internal("label vanished while collapsing"))
            })
            .collect::<Result<Vec<usize>>>()?;

        let mut buckets = vec![Vec::new(); unique.len()];
        for object in objects.iter_mut() {
            let old = object.index[axis];
            let new = *transfer.get(old).ok_or_else(|| {
                Error::internal(format!("object {} sits outside axis {axis}", object.id()))
            })?;
            object.index[axis] = new;
            buckets[new].push(object.id());
        }

        self.buckets[axis] = buckets;
        self.values[axis] = unique;
        Ok(())
    }

    /// Ids located at every position of `axis` whose `keep` entry is false
    pub fn prepare_remove(&self, axis: usize, keep: &[bool]) -> Result<Vec<ObjectId>> {
        self.check_axis(axis)?;
        let buckets = &self.buckets[axis];
        if keep.len() != buckets.len() {
            return Err(Error::invalid_argument(format!(
                "keep mask has {} entries but axis {axis} has {} positions",
                keep.len(),
                buckets.len()
            )));
        }
        Ok(buckets
            .iter()
            .zip(keep)
            .filter(|(_, keep)| !**keep)
            .flat_map(|(bucket, _)| bucket.iter().copied())
            .collect())
    }

    /// Scrub `id` out of every bucket
    pub(crate) fn remove_from_axes(&mut self, id: ObjectId) {
        for bucket in self.buckets.iter_mut().flatten() {
            bucket.retain(|&x| x != id);
        }
    }

    /// Drop every position whose bucket is empty and report, per axis,
    /// where the surviving positions moved.
    pub(crate) fn clean_axes(&mut self) -> Vec<Equivalence> {
        let mut equivalence = Vec::with_capacity(self.dim());
        for axis in 0..self.dim() {
            let buckets = std::mem::take(&mut self.buckets[axis]);
            let values = std::mem::take(&mut self.values[axis]);
            let mut table = Vec::with_capacity(buckets.len());
            for (bucket, value) in buckets.into_iter().zip(values) {
                if bucket.is_empty() {
                    table.push(None);
                } else {
                    table.push(Some(self.buckets[axis].len()));
                    self.buckets[axis].push(bucket);
                    self.values[axis].push(value);
                }
            }
            equivalence.push(Equivalence(table));
        }
        equivalence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Block;

    fn object(id: u64, index: Vec<usize>) -> DataObject {
        DataObject::new(ObjectId::new(id), Block::from(0.0), index, None)
    }

    fn grid() -> (Vec<DataObject>, Axes) {
        // 3 x 2 grid with (1, 1) missing
        let objects = vec![
            object(0, vec![0, 0]),
            object(1, vec![0, 1]),
            object(2, vec![1, 0]),
            object(3, vec![2, 0]),
            object(4, vec![2, 1]),
        ];
        let axes = Axes::build(&objects, &StoreConfig::default()).unwrap();
        (objects, axes)
    }

    fn ids(raw: &[u64]) -> Vec<ObjectId> {
        raw.iter().copied().map(ObjectId::new).collect()
    }

    #[test]
    fn test_build() {
        let (_, axes) = grid();
        assert_eq!(axes.dim(), 2);
        assert_eq!(axes.axes_len(), vec![3, 2]);
        assert_eq!(axes.names(), &["axis_0".to_string(), "axis_1".to_string()]);
        assert_eq!(
            axes.values(0).unwrap(),
            &[Coord::from(0), Coord::from(1), Coord::from(2)]
        );
        assert_eq!(axes.buckets(1).unwrap()[1], ids(&[1, 4]));
        assert_eq!(Axes::build(&[], &StoreConfig::default()), Err(Error::EmptyStructure));
    }

    #[test]
    fn test_build_rejects_ragged_indices() {
        let objects = vec![object(0, vec![0, 0]), object(1, vec![1])];
        let err = Axes::build(&objects, &StoreConfig::default()).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, found: 1, .. }));
    }

    #[test]
    fn test_query_concrete_and_wildcard() {
        let (_, axes) = grid();
        assert_eq!(
            axes.get_id_for_index(&[Selector::At(2), Selector::At(1)]).unwrap(),
            ids(&[4])
        );
        assert!(
            axes.get_id_for_index(&[Selector::At(1), Selector::At(1)])
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            axes.get_id_for_index(&[Selector::All, Selector::At(1)]).unwrap(),
            ids(&[1, 4])
        );
        let mut all = axes.get_id_for_index(&[Selector::All, Selector::All]).unwrap();
        all.sort();
        assert_eq!(all, ids(&[0, 1, 2, 3, 4]));
    }

    #[test]
    fn test_query_errors() {
        let (_, axes) = grid();
        assert!(matches!(
            axes.get_id_for_index(&[Selector::All]),
            Err(Error::InvalidQuery(_))
        ));
        assert!(matches!(
            axes.get_id_for_index(&[Selector::At(3), Selector::All]),
            Err(Error::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_set_axis_and_position() {
        let (_, mut axes) = grid();
        axes.set_axis(
            0,
            "temperature",
            "K",
            vec![Coord::from(10.0), Coord::from(20.0), Coord::from(30.0)],
        )
        .unwrap();
        assert_eq!(axes.axis_index("temperature").unwrap(), 0);
        assert_eq!(axes.units()[0], "K");
        assert_eq!(axes.get_position(&Coord::from(20.0), 0).unwrap(), 1);
        assert!(axes.get_position(&Coord::from(25.0), 0).unwrap_err().is_not_found());
        assert!(axes.set_axis(1, "x", "", vec![Coord::from(1)]).is_err());
        assert!(axes.axis_index("pressure").is_err());
    }

    #[test]
    fn test_collapse_axis() {
        let (mut objects, mut axes) = grid();
        axes.set_axis(
            0,
            "field",
            "T",
            vec![Coord::from(0.5), Coord::from(0.1), Coord::from(0.5)],
        )
        .unwrap();
        axes.collapse_axis(0, &mut objects).unwrap();

        assert_eq!(axes.values(0).unwrap(), &[Coord::from(0.1), Coord::from(0.5)]);
        assert_eq!(axes.axes_len(), vec![2, 2]);
        assert_eq!(objects[0].index(), &[1, 0]);
        assert_eq!(objects[2].index(), &[0, 0]);
        assert_eq!(objects[4].index(), &[1, 1]);
        assert_eq!(axes.buckets(0).unwrap()[0], ids(&[2]));
        assert_eq!(axes.buckets(0).unwrap()[1], ids(&[0, 1, 3, 4]));
    }

    #[test]
    fn test_prepare_remove() {
        let (_, axes) = grid();
        assert_eq!(axes.prepare_remove(0, &[true, false, false]).unwrap(), ids(&[2, 3, 4]));
        assert!(axes.prepare_remove(0, &[true, true, true]).unwrap().is_empty());
        assert!(axes.prepare_remove(0, &[true]).is_err());
        assert!(axes.prepare_remove(4, &[]).is_err());
    }

    #[test]
    fn test_clean_axes_equivalence() {
        let (_, mut axes) = grid();
        axes.remove_from_axes(ObjectId::new(2));
        let eq = axes.clean_axes();

        assert_eq!(eq.len(), 2);
        assert_eq!(eq[0].get(0), Some(0));
        assert_eq!(eq[0].get(1), None);
        assert_eq!(eq[0].get(2), Some(1));
        assert_eq!(eq[0].survivors(), 2);
        assert_eq!(eq[1].get(1), Some(1));
        assert_eq!(axes.axes_len(), vec![2, 2]);
        assert_eq!(axes.values(0).unwrap(), &[Coord::from(0), Coord::from(2)]);
    }

    #[test]
    fn test_insert_grows_axis() {
        let (_, mut axes) = grid();
        axes.insert(ObjectId::new(9), &[4, 0]).unwrap();
        assert_eq!(axes.axes_len(), vec![5, 2]);
        assert_eq!(axes.values(0).unwrap()[3], Coord::from(3));
        assert!(axes.buckets(0).unwrap()[3].is_empty());
        assert!(axes.insert(ObjectId::new(10), &[0]).is_err());
    }

    #[test]
    fn test_transplant_pads_buckets() {
        let objects = vec![object(0, vec![0]), object(1, vec![1])];
        let mut axes = Axes::build(&objects, &StoreConfig::default()).unwrap();
        let labels: Vec<Coord> = (0..4).map(|i| Coord::from(f64::from(i) * 0.5)).collect();
        axes.transplant(0, "energy", "eV", &labels).unwrap();
        assert_eq!(axes.axes_len(), vec![4]);
        assert_eq!(axes.names()[0], "energy");
        let eq = axes.clean_axes();
        assert_eq!(eq[0].survivors(), 2);
        assert_eq!(axes.values(0).unwrap(), &[Coord::from(0.0), Coord::from(0.5)]);
    }
}
