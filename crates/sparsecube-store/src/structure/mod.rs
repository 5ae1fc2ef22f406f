//! The dataset container
//!
//! A `DataStructure` owns the data objects, the metadata records, the axis
//! index built over them, a dense id map and a memo cache of value slices.
//!
//! # Lifecycle
//!
//! ```text
//! new ──► add_data_object / add_metadata_object ──► validate ──► query
//!                                                      │           │
//!                                                      └── edit ◄──┘
//! ```
//!
//! Every public method leaves the structure consistent:
//! - all objects have one position per axis
//! - object metadata links and record back-links agree
//! - each axis bucket lists exactly the objects at that position
//! - the dense map mirrors the coordinate -> id mapping
//! - cached slices belong to the current topology generation
//!
//! Query operations live in `query.rs`, structural edits in `edit.rs` and
//! dense materialisation in `dense.rs`.

mod dense;
mod edit;
mod query;

pub use query::Selection;

use crate::axes::Axes;
use crate::block::Block;
use crate::cache::SliceCache;
use crate::metadata::{Metadata, Value};
use crate::object::{DataObject, SubAxisValues};
use ndarray::{ArrayD, IxDyn};
use sparsecube_common::{Coord, Error, IdAllocator, MetaId, ObjectId, Result, StoreConfig};
use tracing::{debug, warn};

/// Sparse N-dimensional dataset with linked metadata
#[derive(Clone, Debug)]
pub struct DataStructure {
    config: StoreConfig,
    objects: Vec<DataObject>,
    ids: Vec<ObjectId>,
    metadata: Vec<Metadata>,
    meta_ids: Vec<MetaId>,
    axes: Option<Axes>,
    map: Option<ArrayD<i64>>,
    slices: SliceCache<DataStructure>,
    dense: Option<ArrayD<f64>>,
    object_ids: IdAllocator,
    meta_id_source: IdAllocator,
    generation: u64,
    generated: bool,
}

impl Default for DataStructure {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl DataStructure {
    /// Create an empty structure
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        let slices = SliceCache::new(config.max_cached_slices);
        Self {
            config,
            objects: Vec::new(),
            ids: Vec::new(),
            metadata: Vec::new(),
            meta_ids: Vec::new(),
            axes: None,
            map: None,
            slices,
            dense: None,
            object_ids: IdAllocator::new(),
            meta_id_source: IdAllocator::new(),
            generation: 0,
            generated: false,
        }
    }

    /// Drop all content and start over with fresh identifiers
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    /// Copy of this structure without its slice cache
    fn detached(&self) -> Self {
        Self {
            config: self.config.clone(),
            objects: self.objects.clone(),
            ids: self.ids.clone(),
            metadata: self.metadata.clone(),
            meta_ids: self.meta_ids.clone(),
            axes: self.axes.clone(),
            map: self.map.clone(),
            slices: SliceCache::new(self.config.max_cached_slices),
            dense: None,
            object_ids: self.object_ids.clone(),
            meta_id_source: self.meta_id_source.clone(),
            generation: self.generation,
            generated: self.generated,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Container configuration
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of data objects
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if there are no data objects
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Data objects in insertion order
    #[must_use]
    pub fn objects(&self) -> &[DataObject] {
        &self.objects
    }

    /// Object ids in insertion order
    #[must_use]
    pub fn ids(&self) -> &[ObjectId] {
        &self.ids
    }

    /// Metadata records in insertion order
    #[must_use]
    pub fn metadata(&self) -> &[Metadata] {
        &self.metadata
    }

    /// Metadata ids in insertion order
    #[must_use]
    pub fn meta_ids(&self) -> &[MetaId] {
        &self.meta_ids
    }

    fn position(&self, id: ObjectId) -> Result<usize> {
        self.ids
            .iter()
            .position(|&x| x == id)
            .ok_or(Error::ObjectNotFound(id))
    }

    fn meta_position(&self, meta_id: MetaId) -> Result<usize> {
        self.meta_ids
            .iter()
            .position(|&x| x == meta_id)
            .ok_or(Error::MetadataNotFound(meta_id))
    }

    /// Look up a data object
    pub fn object(&self, id: ObjectId) -> Result<&DataObject> {
        self.position(id).map(|pos| &self.objects[pos])
    }

    /// Look up a metadata record
    pub fn metadata_record(&self, meta_id: MetaId) -> Result<&Metadata> {
        self.meta_position(meta_id).map(|pos| &self.metadata[pos])
    }

    /// Edit the fields of a metadata record. Links are managed by the
    /// structure and cannot be changed through this handle.
    pub fn metadata_mut(&mut self, meta_id: MetaId) -> Result<&mut Metadata> {
        let pos = self.meta_position(meta_id)?;
        Ok(&mut self.metadata[pos])
    }

    /// Metadata records linked to one object
    pub fn object_metadata(&self, id: ObjectId) -> Result<Vec<&Metadata>> {
        self.object(id)?
            .meta_address()
            .iter()
            .map(|&m| self.metadata_record(m))
            .collect()
    }

    /// Axis index; only present once the structure has been validated
    pub fn axes(&self) -> Result<&Axes> {
        self.axes.as_ref().ok_or(Error::NotValidated)
    }

    /// Dense id map (`-1` marks an empty cell)
    pub fn map(&self) -> Result<&ArrayD<i64>> {
        self.map.as_ref().ok_or(Error::NotValidated)
    }

    /// Topology generation; bumped by every mutation
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Check if `validate` has run
    #[must_use]
    pub const fn is_generated(&self) -> bool {
        self.generated
    }

    /// Number of memoised slices
    #[must_use]
    pub fn cached_slices(&self) -> usize {
        self.slices.len()
    }

    // ------------------------------------------------------------------
    // Insertion
    // ------------------------------------------------------------------

    /// Append a new data object at `index`.
    ///
    /// With `add_meta_auto` set, the object is linked to the most recently
    /// added metadata record.
    pub fn add_data_object(
        &mut self,
        data: impl Into<Block>,
        index: Vec<usize>,
        axes: Option<SubAxisValues>,
    ) -> Result<ObjectId> {
        let object = DataObject::new(ObjectId::new(0), data.into(), index, axes);
        let id = self.push_object(object)?;
        if self.config.add_meta_auto {
            if let Some(&meta_id) = self.meta_ids.last() {
                self.link_records(id, meta_id)?;
            }
        }
        self.rebuild_map()?;
        self.invalidate();
        Ok(id)
    }

    /// Append an empty metadata record
    pub fn add_metadata_object(&mut self) -> MetaId {
        let meta_id = self.meta_id_source.allocate();
        self.metadata.push(Metadata::new(meta_id));
        self.meta_ids.push(meta_id);
        self.invalidate();
        meta_id
    }

    /// Append a copy of `source` under a new id. Metadata links are not
    /// carried over.
    pub fn inject_data_object(&mut self, source: &DataObject) -> Result<ObjectId> {
        let mut object = source.clone();
        object.meta_address.clear();
        let id = self.push_object(object)?;
        self.rebuild_map()?;
        self.invalidate();
        Ok(id)
    }

    /// Append a copy of `source` under a new id, with no links
    pub fn inject_metadata_object(&mut self, source: &Metadata) -> MetaId {
        let meta_id = self.meta_id_source.allocate();
        let mut record = source.clone();
        record.set_id(meta_id);
        record.clear_links();
        self.metadata.push(record);
        self.meta_ids.push(meta_id);
        self.invalidate();
        meta_id
    }

    /// Give `object` a fresh id, index it if the axes exist and append it
    fn push_object(&mut self, mut object: DataObject) -> Result<ObjectId> {
        let id = self.object_ids.allocate();
        object.set_id(id);
        if let Some(axes) = self.axes.as_mut() {
            axes.insert(id, object.index())?;
        }
        self.objects.push(object);
        self.ids.push(id);
        Ok(id)
    }

    fn link_records(&mut self, id: ObjectId, meta_id: MetaId) -> Result<()> {
        let meta_pos = self.meta_position(meta_id)?;
        let pos = self.position(id)?;
        let object = &mut self.objects[pos];
        if !object.meta_address.contains(&meta_id) {
            object.meta_address.push(meta_id);
        }
        self.metadata[meta_pos].link(id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Check that every object has the same number of axes
    pub fn sanity_check(&self) -> Result<()> {
        let first = self.objects.first().ok_or(Error::EmptyStructure)?;
        let expected = first.index().len();
        if let Some(bad) = self.objects.iter().find(|o| o.index().len() != expected) {
            warn!(
                "object {} has {} axes, expected {}",
                bad.id(),
                bad.index().len(),
                expected
            );
            return Err(Error::DimensionMismatch {
                expected,
                found: bad.index().len(),
                object: bad.id(),
            });
        }
        Ok(())
    }

    /// Build the axis index (once) and the dense map.
    ///
    /// Calling this again without intervening mutation changes nothing.
    pub fn validate(&mut self) -> Result<()> {
        self.sanity_check()?;
        self.invalidate();
        if self.axes.is_none() {
            self.axes = Some(Axes::build(&self.objects, &self.config)?);
        }
        self.rebuild_map()?;
        self.generated = true;
        debug!(
            "validated structure: {} objects, axes {:?}",
            self.objects.len(),
            self.axes.as_ref().map(Axes::axes_len)
        );
        Ok(())
    }

    fn rebuild_map(&mut self) -> Result<()> {
        let Some(axes) = self.axes.as_ref() else {
            self.map = None;
            return Ok(());
        };
        let mut map = ArrayD::from_elem(IxDyn(&axes.axes_len()), -1_i64);
        for object in &self.objects {
            let cell = map.get_mut(object.index()).ok_or_else(|| {
                Error::internal(format!("object {} lies outside the axes", object.id()))
            })?;
            if *cell >= 0 {
                warn!(
                    "objects {} and {} share coordinates {:?}",
                    *cell,
                    object.id(),
                    object.index()
                );
            }
            *cell = i64::try_from(object.id().get())
                .map_err(|_| Error::internal("object id exceeds the map range"))?;
        }
        self.map = Some(map);
        Ok(())
    }

    /// Forget every cached result; called at the end of every mutation
    fn invalidate(&mut self) {
        self.slices.clear();
        self.dense = None;
        self.generation += 1;
    }

    // ------------------------------------------------------------------
    // Name-indexed wrappers
    // ------------------------------------------------------------------

    /// Axis names in order
    pub fn axis_names(&self) -> Result<&[String]> {
        self.axes().map(Axes::names)
    }

    /// Labels of the axis called `name`
    pub fn get_axis(&self, name: &str) -> Result<&[Coord]> {
        let axes = self.axes()?;
        axes.values(axes.axis_index(name)?)
    }

    /// Unit of the axis called `name`
    pub fn get_axis_unit(&self, name: &str) -> Result<&str> {
        let axes = self.axes()?;
        let axis = axes.axis_index(name)?;
        Ok(axes.units()[axis].as_str())
    }

    /// Number of positions on the axis called `name`
    pub fn get_axis_len(&self, name: &str) -> Result<usize> {
        let axes = self.axes()?;
        axes.len(axes.axis_index(name)?)
    }

    /// Name, unit and labels of one axis
    pub fn set_axis(
        &mut self,
        axis: usize,
        name: impl Into<String>,
        unit: impl Into<String>,
        values: Vec<Coord>,
    ) -> Result<()> {
        self.axes
            .as_mut()
            .ok_or(Error::NotValidated)?
            .set_axis(axis, name, unit, values)?;
        self.invalidate();
        Ok(())
    }

    /// Value of field `name` in every record that carries it
    pub fn get_metadata(&self, name: &str) -> Result<Vec<Value>> {
        let values = self
            .metadata
            .iter()
            .filter(|m| m.field(name).is_ok())
            .map(|m| m.get(name))
            .collect::<Result<Vec<_>>>()?;
        if values.is_empty() {
            return Err(Error::FieldNotFound(name.to_string()));
        }
        Ok(values)
    }
}

/// One-axis structure with scalar values at positions `0..n`
#[cfg(test)]
pub(crate) fn line(values: &[f64]) -> DataStructure {
    let mut ds = DataStructure::default();
    for (i, &v) in values.iter().enumerate() {
        ds.add_data_object(v, vec![i], None).unwrap();
    }
    ds.validate().unwrap();
    ds
}

/// Two-axis structure, 3 x 2, holding `10 * i + j` at `(i, j)`
#[cfg(test)]
pub(crate) fn grid() -> DataStructure {
    let mut ds = DataStructure::default();
    for i in 0..3_u32 {
        for j in 0..2_u32 {
            ds.add_data_object(f64::from(10 * i + j), vec![i as usize, j as usize], None)
                .unwrap();
        }
    }
    ds.validate().unwrap();
    ds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Kind;

    #[test]
    fn test_add_assigns_monotonic_ids() {
        let mut ds = DataStructure::default();
        let a = ds.add_data_object(1.0, vec![0], None).unwrap();
        let b = ds.add_data_object(2.0, vec![1], None).unwrap();
        assert_eq!((a.get(), b.get()), (0, 1));
        assert_eq!(ds.ids(), &[a, b]);
        assert!(ds.axes().is_err());
        assert!(!ds.is_generated());
    }

    #[test]
    fn test_auto_link_to_latest_metadata() {
        let mut ds = DataStructure::default();
        let orphan = ds.add_data_object(0.0, vec![0], None).unwrap();
        let first = ds.add_metadata_object();
        let second = ds.add_metadata_object();
        let id = ds.add_data_object(1.0, vec![1], None).unwrap();

        assert!(ds.object(orphan).unwrap().meta_address().is_empty());
        assert_eq!(ds.object(id).unwrap().meta_address(), &[second]);
        assert_eq!(ds.metadata_record(second).unwrap().links(), &[id]);
        assert!(ds.metadata_record(first).unwrap().is_orphan());
    }

    #[test]
    fn test_auto_link_disabled() {
        let config = StoreConfig {
            add_meta_auto: false,
            ..StoreConfig::default()
        };
        let mut ds = DataStructure::new(config);
        let meta = ds.add_metadata_object();
        let id = ds.add_data_object(1.0, vec![0], None).unwrap();
        assert!(ds.object(id).unwrap().meta_address().is_empty());
        assert!(ds.metadata_record(meta).unwrap().is_orphan());
    }

    #[test]
    fn test_inject_breaks_aliasing() {
        let mut source = line(&[1.0, 2.0]);
        let meta = source.add_metadata_object();
        source
            .metadata_mut(meta)
            .unwrap()
            .add_metadata("gain", Kind::Float, 2.0, "");

        let mut target = DataStructure::default();
        let original = source.objects()[1].clone();
        let id = target.inject_data_object(&original).unwrap();
        let meta_copy = target.inject_metadata_object(source.metadata_record(meta).unwrap());

        target
            .metadata_mut(meta_copy)
            .unwrap()
            .add_metadata("gain", Kind::Float, 5.0, "");
        assert_eq!(
            source.metadata_record(meta).unwrap().get("gain").unwrap(),
            Value::Float(2.0)
        );
        assert_eq!(id.get(), 0);
        assert_eq!(target.object(id).unwrap().index(), &[1]);
        assert_eq!(target.object(id).unwrap().data, Block::from(2.0));
    }

    #[test]
    fn test_validate_builds_axes_and_map() {
        let ds = grid();
        let axes = ds.axes().unwrap();
        assert_eq!(axes.axes_len(), vec![3, 2]);
        let map = ds.map().unwrap();
        assert_eq!(map.shape(), &[3, 2]);
        assert_eq!(map[IxDyn(&[2, 1])], 5);
        assert!(ds.is_generated());
    }

    #[test]
    fn test_validate_is_idempotent() {
        let mut ds = grid();
        let axes = ds.axes().unwrap().clone();
        let map = ds.map().unwrap().clone();
        ds.validate().unwrap();
        assert_eq!(ds.axes().unwrap(), &axes);
        assert_eq!(ds.map().unwrap(), &map);
    }

    #[test]
    fn test_validate_errors() {
        let mut empty = DataStructure::default();
        assert_eq!(empty.validate(), Err(Error::EmptyStructure));

        let mut ragged = DataStructure::default();
        ragged.add_data_object(1.0, vec![0, 0], None).unwrap();
        let bad = ragged.add_data_object(2.0, vec![1], None).unwrap();
        assert_eq!(
            ragged.validate(),
            Err(Error::DimensionMismatch {
                expected: 2,
                found: 1,
                object: bad
            })
        );
        assert!(ragged.axes().is_err());
    }

    #[test]
    fn test_add_after_validate_extends_index() {
        let mut ds = line(&[1.0, 2.0]);
        let id = ds.add_data_object(7.0, vec![4], None).unwrap();
        assert_eq!(ds.axes().unwrap().axes_len(), vec![5]);
        assert_eq!(ds.map().unwrap()[IxDyn(&[4])], i64::try_from(id.get()).unwrap());
        assert_eq!(ds.map().unwrap()[IxDyn(&[3])], -1);
        assert!(ds.add_data_object(1.0, vec![0, 0], None).is_err());
        assert_eq!(ds.len(), 3);
    }

    #[test]
    fn test_axis_wrappers() {
        let mut ds = grid();
        ds.set_axis(
            1,
            "polarisation",
            "",
            vec![Coord::from("up"), Coord::from("down")],
        )
        .unwrap();
        assert_eq!(ds.axis_names().unwrap()[1], "polarisation");
        assert_eq!(ds.get_axis_len("polarisation").unwrap(), 2);
        assert_eq!(ds.get_axis_unit("polarisation").unwrap(), "");
        assert_eq!(ds.get_axis("polarisation").unwrap()[1], Coord::from("down"));
        assert!(ds.get_axis("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_get_metadata_across_records() {
        let mut ds = DataStructure::default();
        for t in [280.0, 290.0] {
            let meta = ds.add_metadata_object();
            ds.metadata_mut(meta)
                .unwrap()
                .add_metadata("temperature", Kind::Float, t, "K");
        }
        ds.add_metadata_object();
        assert_eq!(
            ds.get_metadata("temperature").unwrap(),
            vec![Value::Float(280.0), Value::Float(290.0)]
        );
        assert!(ds.get_metadata("field").unwrap_err().is_not_found());
    }

    #[test]
    fn test_reset() {
        let mut ds = grid();
        ds.reset();
        assert!(ds.is_empty());
        assert!(ds.axes().is_err());
        assert_eq!(ds.add_data_object(1.0, vec![0], None).unwrap().get(), 0);
    }
}
