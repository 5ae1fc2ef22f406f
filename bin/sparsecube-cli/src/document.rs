//! Dataset documents read by the CLI and the JSON views it prints

use serde::{Deserialize, Serialize};
use sparsecube_common::{Coord, Error, MetaId, ObjectId, Result, StoreConfig};
use sparsecube_store::{Block, DataStructure, Kind, Metadata, SubAxisValues, Value};
use tracing::info;

/// A dataset as stored on disk.
///
/// Entries are applied in order, so with auto-linking on an object picks up
/// the metadata record written before it.
#[derive(Debug, Deserialize)]
pub struct DatasetDocument {
    pub entries: Vec<Entry>,
    /// Names, units and labels, one per axis, applied after validation
    #[serde(default)]
    pub axes: Vec<AxisSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Entry {
    Metadata {
        fields: Vec<FieldSpec>,
    },
    Object {
        data: DataSpec,
        index: Vec<usize>,
        #[serde(default)]
        sub_axes: Option<SubAxisValues>,
    },
}

#[derive(Debug, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: Kind,
    pub value: String,
    #[serde(default)]
    pub unit: String,
}

/// Block payload: a bare number or a shaped row-major buffer
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DataSpec {
    Scalar(f64),
    Dense { shape: Vec<usize>, values: Vec<f64> },
}

impl DataSpec {
    fn into_block(self) -> Result<Block> {
        match self {
            Self::Scalar(value) => Ok(Block::Scalar(value)),
            Self::Dense { shape, values } => Block::from_shape_vec(&shape, values),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AxisSpec {
    pub name: String,
    #[serde(default)]
    pub unit: String,
    pub values: Vec<Coord>,
}

impl DatasetDocument {
    /// Build and validate the structure this document describes
    pub fn build(self, config: StoreConfig) -> Result<DataStructure> {
        let mut ds = DataStructure::new(config);
        for entry in self.entries {
            match entry {
                Entry::Metadata { fields } => {
                    let meta_id = ds.add_metadata_object();
                    let record = ds.metadata_mut(meta_id)?;
                    for field in fields {
                        let value = Value::parse(field.kind, &field.value).ok_or_else(|| {
                            Error::ParseValue {
                                field: field.name.clone(),
                                kind: field.kind.to_string(),
                                raw: field.value.clone(),
                            }
                        })?;
                        record.add_metadata(field.name, field.kind, value, field.unit);
                    }
                }
                Entry::Object {
                    data,
                    index,
                    sub_axes,
                } => {
                    ds.add_data_object(data.into_block()?, index, sub_axes)?;
                }
            }
        }
        ds.validate()?;
        for (axis, spec) in self.axes.into_iter().enumerate() {
            ds.set_axis(axis, spec.name, spec.unit, spec.values)?;
        }
        info!(
            "loaded {} objects and {} metadata records",
            ds.len(),
            ds.metadata().len()
        );
        Ok(ds)
    }
}

/// Comma separated coordinate labels, e.g. `77,-`
pub fn parse_values(raw: &str) -> Vec<Coord> {
    raw.split(',').filter_map(|part| part.parse().ok()).collect()
}

/// Comma separated keep mask, e.g. `1,0,1` or `true,false,true`
pub fn parse_mask(raw: &str) -> Result<Vec<bool>> {
    raw.split(',')
        .map(|part| match part.trim() {
            "1" | "true" | "keep" => Ok(true),
            "0" | "false" | "drop" => Ok(false),
            other => Err(Error::invalid_argument(format!("bad mask entry {other:?}"))),
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct AxisView<'a> {
    pub name: &'a str,
    pub unit: &'a str,
    pub values: &'a [Coord],
}

#[derive(Debug, Serialize)]
pub struct ObjectView<'a> {
    pub id: ObjectId,
    pub index: &'a [usize],
    pub data: &'a Block,
    pub metadata: &'a [MetaId],
}

/// Printable snapshot of a whole structure
#[derive(Debug, Serialize)]
pub struct StructureView<'a> {
    pub axes: Vec<AxisView<'a>>,
    pub objects: Vec<ObjectView<'a>>,
    pub metadata: &'a [Metadata],
}

impl<'a> StructureView<'a> {
    pub fn new(ds: &'a DataStructure) -> Result<Self> {
        let axes = ds.axes()?;
        let axes = (0..axes.dim())
            .map(|axis| {
                Ok(AxisView {
                    name: &axes.names()[axis],
                    unit: &axes.units()[axis],
                    values: axes.values(axis)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let objects = ds
            .objects()
            .iter()
            .map(|o| ObjectView {
                id: o.id(),
                index: o.index(),
                data: &o.data,
                metadata: o.meta_address(),
            })
            .collect();
        Ok(Self {
            axes,
            objects,
            metadata: ds.metadata(),
        })
    }
}

/// Dense array flattened in row-major order
#[derive(Debug, Serialize)]
pub struct DenseView {
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
}

impl DenseView {
    pub fn new(ds: &DataStructure) -> Result<Self> {
        let dense = ds.to_dense()?;
        Ok(Self {
            shape: dense.shape().to_vec(),
            values: dense.iter().copied().collect(),
        })
    }
}
