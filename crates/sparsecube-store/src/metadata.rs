//! Typed metadata records
//!
//! Field values are kept in their textual form so records can be written out
//! and read back without loss; the declared [`Kind`] decides how the text is
//! parsed on read. Numeric fields (`float`, `int`) take part in aggregation,
//! every other kind is carried along untouched.

use serde::{Deserialize, Serialize};
use sparsecube_common::{Error, MetaId, ObjectId, Result, format_float};
use std::fmt;
use std::str::FromStr;

/// Declared type of a metadata field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Float,
    Bool,
    Int,
    FloatArray,
    IntArray,
    String,
}

impl Kind {
    /// Name used in the textual format
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::FloatArray => "float_array",
            Self::IntArray => "int_array",
            Self::String => "string",
        }
    }

    /// Kinds that are summed and averaged during aggregation
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Float | Self::Int)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "float" => Ok(Self::Float),
            "bool" => Ok(Self::Bool),
            "int" => Ok(Self::Int),
            "float_array" => Ok(Self::FloatArray),
            "int_array" => Ok(Self::IntArray),
            "string" | "str" => Ok(Self::String),
            other => Err(Error::invalid_argument(format!("unknown field kind {other:?}"))),
        }
    }
}

/// A parsed metadata value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Float(f64),
    Bool(bool),
    Int(i64),
    FloatArray(Vec<f64>),
    IntArray(Vec<i64>),
    Str(String),
}

impl Value {
    /// Kind this value naturally belongs to
    #[must_use]
    pub const fn kind(&self) -> Kind {
        match self {
            Self::Float(_) => Kind::Float,
            Self::Bool(_) => Kind::Bool,
            Self::Int(_) => Kind::Int,
            Self::FloatArray(_) => Kind::FloatArray,
            Self::IntArray(_) => Kind::IntArray,
            Self::Str(_) => Kind::String,
        }
    }

    /// Parse stored text according to `kind`
    pub fn parse(kind: Kind, raw: &str) -> Option<Self> {
        match kind {
            Kind::Float => raw.trim().parse().ok().map(Self::Float),
            Kind::Bool => Some(Self::Bool(is_truthy(raw))),
            Kind::Int => parse_truncated(raw).map(Self::Int),
            Kind::FloatArray => array_items(raw)
                .map(|item| item.parse::<f64>().ok())
                .collect::<Option<Vec<_>>>()
                .map(Self::FloatArray),
            Kind::IntArray => array_items(raw)
                .map(parse_truncated)
                .collect::<Option<Vec<_>>>()
                .map(Self::IntArray),
            Kind::String => Some(Self::Str(raw.to_string())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => f.write_str(&format_float(*v)),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(v) => write!(f, "{v}"),
            Self::FloatArray(items) => {
                let parts: Vec<String> = items.iter().map(|v| format_float(*v)).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Self::IntArray(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<Vec<f64>> for Value {
    fn from(value: Vec<f64>) -> Self {
        Self::FloatArray(value)
    }
}

impl From<Vec<i64>> for Value {
    fn from(value: Vec<i64>) -> Self {
        Self::IntArray(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// 2^63; integral floats at or beyond this do not fit an `i64`
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "1.0" | "yes" | "y" | "on"
    )
}

#[allow(clippy::cast_possible_truncation)]
fn parse_truncated(raw: &str) -> Option<i64> {
    raw.trim().parse::<f64>().ok().map(|v| v.trunc() as i64)
}

/// Items between the first `[` and the last `]`, split on commas
fn array_items(raw: &str) -> impl Iterator<Item = &str> {
    let start = raw.find('[').map_or(0, |i| i + 1);
    let end = raw.rfind(']').filter(|&e| e >= start).unwrap_or(raw.len());
    raw[start..end]
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
}

/// One named field of a record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field name
    pub name: String,
    /// Declared kind
    pub kind: Kind,
    /// Stored textual value
    pub raw: String,
    /// Physical unit, empty when unitless
    pub unit: String,
}

impl Field {
    /// Numeric reading of the field; `int` fields read truncated, as `get`
    /// returns them
    #[allow(clippy::cast_precision_loss)]
    fn number(&self) -> Result<f64> {
        match Value::parse(self.kind, &self.raw) {
            Some(Value::Float(v)) => Ok(v),
            Some(Value::Int(v)) => Ok(v as f64),
            _ => Err(Error::ParseValue {
                field: self.name.clone(),
                kind: self.kind.to_string(),
                raw: self.raw.clone(),
            }),
        }
    }

    /// Text for a computed value: integral `int` results within `i64`
    /// range print as integers, everything else as a float
    #[allow(clippy::cast_possible_truncation)]
    fn number_text(&self, value: f64) -> String {
        if self.kind == Kind::Int && value.fract() == 0.0 && value.abs() < I64_LIMIT {
            (value as i64).to_string()
        } else {
            format_float(value)
        }
    }
}

/// A typed key/value record shared by one or more data objects
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    meta_id: MetaId,
    fields: Vec<Field>,
    links: Vec<ObjectId>,
}

impl Metadata {
    /// Create an empty record
    #[must_use]
    pub const fn new(meta_id: MetaId) -> Self {
        Self {
            meta_id,
            fields: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Record identifier
    #[must_use]
    pub const fn id(&self) -> MetaId {
        self.meta_id
    }

    pub(crate) const fn set_id(&mut self, meta_id: MetaId) {
        self.meta_id = meta_id;
    }

    /// Insert or overwrite a field. The value is always stored as text.
    pub fn add_metadata(
        &mut self,
        name: impl Into<String>,
        kind: Kind,
        value: impl Into<Value>,
        unit: impl Into<String>,
    ) {
        let name = name.into();
        let field = Field {
            raw: value.into().to_string(),
            unit: unit.into(),
            kind,
            name,
        };
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    /// Parse a field according to its declared kind
    pub fn get(&self, name: &str) -> Result<Value> {
        let field = self.field(name)?;
        Value::parse(field.kind, &field.raw).ok_or_else(|| Error::ParseValue {
            field: field.name.clone(),
            kind: field.kind.to_string(),
            raw: field.raw.clone(),
        })
    }

    /// Raw field lookup
    pub fn field(&self, name: &str) -> Result<&Field> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| Error::FieldNotFound(name.to_string()))
    }

    /// Unit of a field
    pub fn unit(&self, name: &str) -> Result<&str> {
        self.field(name).map(|f| f.unit.as_str())
    }

    /// Fields in insertion order
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Data objects currently referencing this record
    #[must_use]
    pub fn links(&self) -> &[ObjectId] {
        &self.links
    }

    /// Check if nothing references this record any more
    #[must_use]
    pub fn is_orphan(&self) -> bool {
        self.links.is_empty()
    }

    pub(crate) fn link(&mut self, id: ObjectId) {
        if !self.links.contains(&id) {
            self.links.push(id);
        }
    }

    pub(crate) fn unlink(&mut self, id: ObjectId) {
        self.links.retain(|&l| l != id);
    }

    pub(crate) fn clear_links(&mut self) {
        self.links.clear();
    }

    /// Add every numeric field of `other` into this record (`+=`).
    ///
    /// Fields of other kinds, and fields `other` does not carry, are left
    /// as they are. Both records are assumed to declare the same kind for a
    /// shared field name. On error the record is unchanged.
    pub fn add_assign(&mut self, other: &Self) -> Result<()> {
        let mut updates = Vec::new();
        for (pos, field) in self.numeric_fields() {
            let Some(theirs) = other.fields.iter().find(|f| f.name == field.name) else {
                continue;
            };
            let sum = field.number()? + theirs.number()?;
            updates.push((pos, field.number_text(sum)));
        }
        self.commit(updates);
        Ok(())
    }

    /// Divide every numeric field by `divisor` (`/`). On error the record
    /// is unchanged.
    pub fn div_scalar(&mut self, divisor: f64) -> Result<()> {
        if divisor == 0.0 {
            return Err(Error::invalid_argument("metadata divisor must be non-zero"));
        }
        let updates = self
            .numeric_fields()
            .map(|(pos, field)| Ok((pos, field.number_text(field.number()? / divisor))))
            .collect::<Result<Vec<_>>>()?;
        self.commit(updates);
        Ok(())
    }

    fn numeric_fields(&self) -> impl Iterator<Item = (usize, &Field)> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.kind.is_numeric())
    }

    fn commit(&mut self, updates: Vec<(usize, String)>) {
        for (pos, raw) in updates {
            self.fields[pos].raw = raw;
        }
    }
}
