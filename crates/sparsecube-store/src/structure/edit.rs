//! Structural edits: linking, removal, compaction and aggregation

use super::DataStructure;
use crate::axes::Equivalence;
use crate::metadata::Metadata;
use crate::object::DataObject;
use sparsecube_common::{Error, MetaId, ObjectId, Result};
use tracing::{debug, info};

/// One aggregated run, computed before anything is mutated
struct Aggregate {
    object: DataObject,
    metadata: Option<Metadata>,
    links: Vec<MetaId>,
}

impl DataStructure {
    /// Link an object to a metadata record in both directions
    pub fn link(&mut self, id: ObjectId, meta_id: MetaId) -> Result<()> {
        self.link_records(id, meta_id)?;
        self.invalidate();
        Ok(())
    }

    /// Break the link between an object and a metadata record. The record
    /// stays until the next clean even if nothing references it any more.
    pub fn unlink(&mut self, id: ObjectId, meta_id: MetaId) -> Result<()> {
        let meta_pos = self.meta_position(meta_id)?;
        let pos = self.position(id)?;
        self.objects[pos].meta_address.retain(|&m| m != meta_id);
        self.metadata[meta_pos].unlink(id);
        self.invalidate();
        Ok(())
    }

    /// Take an object out of the objects list, its metadata back-links and
    /// the axis buckets. Positions it leaves empty remain until a clean.
    fn purge_object(&mut self, id: ObjectId) -> Result<DataObject> {
        let pos = self.position(id)?;
        let object = self.objects.remove(pos);
        self.ids.remove(pos);
        for meta_id in object.meta_address() {
            if let Some(record) = self.metadata.iter_mut().find(|m| m.id() == *meta_id) {
                record.unlink(id);
            }
        }
        if let Some(axes) = self.axes.as_mut() {
            axes.remove_from_axes(id);
        }
        Ok(object)
    }

    /// Remove one object and compact what it leaves behind
    pub fn remove_data_object(&mut self, id: ObjectId) -> Result<DataObject> {
        let object = self.purge_object(id)?;
        self.clean()?;
        Ok(object)
    }

    /// Drop every metadata record no object references; returns how many
    pub fn clean_metadata(&mut self) -> usize {
        let before = self.metadata.len();
        self.metadata.retain(|m| !m.is_orphan());
        self.meta_ids = self.metadata.iter().map(Metadata::id).collect();
        let removed = before - self.metadata.len();
        if removed > 0 {
            debug!("dropped {} orphaned metadata records", removed);
        }
        removed
    }

    /// Restore a compact structure after removals: orphaned metadata goes,
    /// empty axis positions go, object indices are remapped and the map is
    /// rebuilt.
    pub fn clean(&mut self) -> Result<()> {
        self.clean_metadata();
        if let Some(axes) = self.axes.as_mut() {
            let equivalence = axes.clean_axes();
            self.clean_data(&equivalence)?;
        }
        self.rebuild_map()?;
        self.invalidate();
        Ok(())
    }

    fn clean_data(&mut self, equivalence: &[Equivalence]) -> Result<()> {
        for object in &mut self.objects {
            let id = object.id();
            if object.index.len() != equivalence.len() {
                return Err(Error::DimensionMismatch {
                    expected: equivalence.len(),
                    found: object.index.len(),
                    object: id,
                });
            }
            for (position, table) in object.index.iter_mut().zip(equivalence) {
                *position = table.get(*position).ok_or_else(|| {
                    Error::internal(format!("object {id} sits on a position that was cleaned away"))
                })?;
            }
        }
        Ok(())
    }

    /// Merge positions of `axis` that carry the same label
    pub fn collapse_axis(&mut self, axis: usize) -> Result<()> {
        let axes = self.axes.as_mut().ok_or(Error::NotValidated)?;
        axes.collapse_axis(axis, &mut self.objects)?;
        self.rebuild_map()?;
        self.invalidate();
        Ok(())
    }

    /// Copy of this structure without the positions of `axis` whose `keep`
    /// entry is false. The receiver is left untouched.
    pub fn remove_from_axis(&self, axis: usize, keep: &[bool]) -> Result<Self> {
        let doomed = self.axes()?.prepare_remove(axis, keep)?;
        let mut copy = self.detached();
        for &id in &doomed {
            copy.purge_object(id)?;
        }
        copy.clean()?;
        info!(
            "removed {} objects along axis {}, {} remain",
            doomed.len(),
            axis,
            copy.len()
        );
        Ok(copy)
    }

    /// Aggregate consecutive runs of `increment` objects.
    ///
    /// Each run is summed into one new object placed at the run's first
    /// position. With `sum_metadata` the run's linked records are summed
    /// and divided by `increment` into one new record linked only to the
    /// aggregate; otherwise the aggregate keeps every distinct link of the
    /// run. The original objects are then removed and the structure is
    /// cleaned.
    pub fn sum_in_order(&mut self, increment: usize, sum_metadata: bool) -> Result<()> {
        if increment == 0 || self.objects.len() % increment != 0 {
            return Err(Error::invalid_argument(format!(
                "cannot split {} objects into runs of {increment}",
                self.objects.len()
            )));
        }
        self.axes()?;

        let aggregates = self
            .objects
            .chunks(increment)
            .map(|run| self.aggregate(run, sum_metadata))
            .collect::<Result<Vec<_>>>()?;
        let originals = self.ids.clone();

        for aggregate in aggregates {
            let id = self.push_object(aggregate.object)?;
            if let Some(record) = aggregate.metadata {
                let meta_id = self.inject_metadata_object(&record);
                self.link_records(id, meta_id)?;
            }
            for meta_id in aggregate.links {
                self.link_records(id, meta_id)?;
            }
        }
        for id in originals {
            self.purge_object(id)?;
        }
        self.clean()?;
        info!(
            "aggregated runs of {} into {} objects",
            increment,
            self.objects.len()
        );
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn aggregate(&self, run: &[DataObject], sum_metadata: bool) -> Result<Aggregate> {
        let (first, rest) = run
            .split_first()
            .ok_or_else(|| Error::internal("empty aggregation run"))?;
        let mut object = first.clone();
        for other in rest {
            object.add_assign(other)?;
        }
        let addresses = std::mem::take(&mut object.meta_address);

        if sum_metadata {
            let mut records = addresses.iter().map(|&m| self.metadata_record(m));
            let metadata = match records.next() {
                Some(first) => {
                    let mut total = first?.clone();
                    for record in records {
                        total.add_assign(record?)?;
                    }
                    total.div_scalar(run.len() as f64)?;
                    Some(total)
                }
                None => None,
            };
            return Ok(Aggregate {
                object,
                metadata,
                links: Vec::new(),
            });
        }

        let mut links: Vec<MetaId> = Vec::with_capacity(addresses.len());
        for meta_id in addresses {
            if !links.contains(&meta_id) {
                links.push(meta_id);
            }
        }
        Ok(Aggregate {
            object,
            metadata: None,
            links,
        })
    }
}
