//! Data objects: one block at one coordinate tuple

use crate::block::Block;
use serde::{Deserialize, Serialize};
use sparsecube_common::{Coord, MetaId, ObjectId, Result};

/// Coordinate values describing the internal axes of a block
pub type SubAxisValues = Vec<Vec<Coord>>;

/// One data block located at a coordinate tuple
///
/// `index` has one position per axis of the owning structure. The object
/// itself does not check that; the structure does.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataObject {
    id: ObjectId,
    /// Payload
    pub data: Block,
    pub(crate) index: Vec<usize>,
    pub(crate) meta_address: Vec<MetaId>,
    /// Values along the block's own axes, independent of the outer axes
    pub axes: Option<SubAxisValues>,
}

impl DataObject {
    /// Create an object with no metadata links
    #[must_use]
    pub const fn new(id: ObjectId, data: Block, index: Vec<usize>, axes: Option<SubAxisValues>) -> Self {
        Self {
            id,
            data,
            index,
            meta_address: Vec::new(),
            axes,
        }
    }

    /// Object identifier
    #[must_use]
    pub const fn id(&self) -> ObjectId {
        self.id
    }

    pub(crate) const fn set_id(&mut self, id: ObjectId) {
        self.id = id;
    }

    /// Coordinate position on each axis
    #[must_use]
    pub fn index(&self) -> &[usize] {
        &self.index
    }

    /// Linked metadata records
    #[must_use]
    pub fn meta_address(&self) -> &[MetaId] {
        &self.meta_address
    }

    /// In-place sum (`+=`): adds the payloads and appends the other
    /// object's metadata links without deduplicating them. The caller
    /// fixes up the links afterwards.
    pub fn add_assign(&mut self, other: &Self) -> Result<()> {
        self.data.add_assign(&other.data)?;
        self.meta_address.extend_from_slice(&other.meta_address);
        Ok(())
    }
}
