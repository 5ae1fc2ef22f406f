//! Positional and value-based queries

use super::DataStructure;
use crate::block::Block;
use sparsecube_common::{Coord, Error, MetaId, ObjectId, Result, Selector, format_query};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// Result of a positional lookup
#[derive(Debug)]
pub enum Selection<'a> {
    /// Exactly one object matched
    Block(&'a Block),
    /// Several objects matched; the fixed axes are dropped
    Reduced(DataStructure),
}

impl Selection<'_> {
    /// The single block, if exactly one object matched
    #[must_use]
    pub const fn as_block(&self) -> Option<&Block> {
        match self {
            Self::Block(block) => Some(block),
            Self::Reduced(_) => None,
        }
    }

    /// The reduced structure, if several objects matched
    #[must_use]
    pub fn into_reduced(self) -> Option<DataStructure> {
        match self {
            Self::Block(_) => None,
            Self::Reduced(reduced) => Some(reduced),
        }
    }
}

impl DataStructure {
    /// Ids located at `query`
    pub fn get_id_for_index(&self, query: &[Selector]) -> Result<Vec<ObjectId>> {
        let axes = self.axes()?;
        if axes.dim() == 0 && query.is_empty() {
            return Ok(self.ids.clone());
        }
        axes.get_id_for_index(query)
    }

    /// Positional lookup.
    ///
    /// One match yields the object's block; several yield a reduced
    /// structure over the wildcard axes.
    pub fn get(&self, query: &[Selector]) -> Result<Selection<'_>> {
        let ids = self.get_id_for_index(query)?;
        match ids.as_slice() {
            [] => Err(Error::NoMatch(format_query(query))),
            [id] => Ok(Selection::Block(&self.object(*id)?.data)),
            _ => self.process_reduction(query, &ids).map(Selection::Reduced),
        }
    }

    /// Build a sub-structure from `ids`, dropping every axis `query` fixes.
    ///
    /// The copy is validated before the parent's axis labels are put onto
    /// the surviving axes, because validation would otherwise replace them
    /// with defaults.
    pub fn process_reduction(&self, query: &[Selector], ids: &[ObjectId]) -> Result<Self> {
        let axes = self.axes()?;
        if query.len() != axes.dim() {
            return Err(Error::invalid_query(format!(
                "query has {} components but there are {} axes",
                query.len(),
                axes.dim()
            )));
        }

        let mut reduced = Self::new(self.config.clone());
        let mut parent_links: Vec<(ObjectId, Vec<MetaId>)> = Vec::with_capacity(ids.len());
        for &id in ids {
            let source = self.object(id)?;
            let mut copy = source.clone();
            copy.meta_address.clear();
            copy.index = source
                .index()
                .iter()
                .zip(query)
                .filter(|(_, selector)| !selector.is_concrete())
                .map(|(&position, _)| position)
                .collect();
            let new_id = reduced.push_object(copy)?;
            parent_links.push((new_id, source.meta_address().to_vec()));
        }

        reduced.validate()?;

        let surviving = query
            .iter()
            .enumerate()
            .filter(|(_, selector)| !selector.is_concrete())
            .map(|(axis, _)| axis);
        if let Some(child) = reduced.axes.as_mut() {
            for (new_axis, old_axis) in surviving.enumerate() {
                child.transplant(
                    new_axis,
                    &axes.names()[old_axis],
                    &axes.units()[old_axis],
                    axes.values(old_axis)?,
                )?;
            }
        }

        let referenced: HashSet<MetaId> = parent_links
            .iter()
            .flat_map(|(_, links)| links.iter().copied())
            .collect();
        let mut remap = HashMap::with_capacity(referenced.len());
        for record in self.metadata.iter().filter(|m| referenced.contains(&m.id())) {
            remap.insert(record.id(), reduced.inject_metadata_object(record));
        }
        for (new_id, links) in parent_links {
            for old in links {
                let new_meta = *remap.get(&old).ok_or(Error::MetadataNotFound(old))?;
                reduced.link_records(new_id, new_meta)?;
            }
        }

        reduced.clean()?;
        Ok(reduced)
    }

    /// Value-based lookup.
    ///
    /// Each label is resolved to a position on its axis; labels that are
    /// not found leave the axis open. Results are memoised until the next
    /// structural change.
    pub fn get_slice(&mut self, values: &[Coord]) -> Result<&Self> {
        let key = format!("{values:?}");
        let generation = self.generation;
        if self.slices.contains(&key, generation) {
            trace!("slice cache hit for {}", key);
            return self
                .slices
                .get(&key, generation)
                .ok_or_else(|| Error::internal("slice cache lost a live entry"));
        }

        let axes = self.axes()?;
        if values.len() != axes.dim() {
            return Err(Error::invalid_query(format!(
                "{} values given but there are {} axes",
                values.len(),
                axes.dim()
            )));
        }
        let query: Vec<Selector> = values
            .iter()
            .enumerate()
            .map(|(axis, value)| {
                axes.get_position(value, axis)
                    .map_or(Selector::All, Selector::At)
            })
            .collect();

        let ids = self.get_id_for_index(&query)?;
        if ids.is_empty() {
            return Err(Error::NoMatch(key));
        }
        let reduced = self.process_reduction(&query, &ids)?;
        debug!(
            "sliced {} -> {} objects over {} axes",
            key,
            reduced.len(),
            reduced.axes().map_or(0, |a| a.dim())
        );
        Ok(self.slices.insert(key, generation, reduced))
    }
}
