//! Core type definitions for sparsecube
//!
//! Identifiers, coordinate labels and query selectors shared by the
//! container crate and its tools.

use crate::error::{Error, Result};
use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Identifier of a data object, unique within one structure
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
#[display("{_0}")]
pub struct ObjectId(u64);

impl ObjectId {
    /// Wrap a raw identifier
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw identifier
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Identifier of a metadata record, unique within one structure
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
#[display("{_0}")]
pub struct MetaId(u64);

impl MetaId {
    /// Wrap a raw identifier
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw identifier
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Monotonic identifier source scoped to one structure
///
/// Identifiers are never reused, even after the record they named is removed.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    /// Create an allocator starting at zero
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Hand out the next identifier
    pub fn allocate<T: From<u64>>(&mut self) -> T {
        let id = self.next;
        self.next += 1;
        T::from(id)
    }

    /// Identifier the next call to [`allocate`](Self::allocate) will return
    #[must_use]
    pub const fn peek(&self) -> u64 {
        self.next
    }
}

/// Format a float the way the textual persistence layer expects.
///
/// Integral values keep a trailing `.0` so they read back as floats.
#[must_use]
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value.is_infinite() {
        let inf = if value > 0.0 { "inf" } else { "-inf" };
        inf.to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

/// A coordinate label on one axis
///
/// Labels are numeric in the common case, with free text allowed for
/// categorical axes. Numeric labels compare by total order so they can be
/// sorted and deduplicated.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coord {
    Num(f64),
    Text(String),
}

impl Coord {
    /// Numeric value, if this label is numeric
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Num(v) => Some(*v),
            Self::Text(_) => None,
        }
    }
}

impl PartialEq for Coord {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Coord {}

impl PartialOrd for Coord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Coord {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Num(a), Self::Num(b)) => a.total_cmp(b),
            (Self::Num(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Num(_)) => Ordering::Greater,
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
        }
    }
}

impl Hash for Coord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Num(v) => {
                0u8.hash(state);
                v.to_bits().hash(state);
            }
            Self::Text(s) => {
                1u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(v) => f.write_str(&format_float(*v)),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl FromStr for Coord {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        Ok(trimmed
            .parse::<f64>()
            .map_or_else(|_| Self::Text(trimmed.to_string()), Self::Num))
    }
}

impl From<f64> for Coord {
    fn from(value: f64) -> Self {
        Self::Num(value)
    }
}

impl From<i32> for Coord {
    fn from(value: i32) -> Self {
        Self::Num(f64::from(value))
    }
}

impl From<&str> for Coord {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Coord {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// One component of a positional query
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Selector {
    /// A concrete coordinate position
    At(usize),
    /// Every position on the axis
    All,
}

impl Selector {
    /// Check if this selector fixes the axis to one position
    #[must_use]
    pub const fn is_concrete(&self) -> bool {
        matches!(self, Self::At(_))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(k) => write!(f, "{k}"),
            Self::All => f.write_str("-"),
        }
    }
}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "-" | ":" | "*" => Ok(Self::All),
            other => other
                .parse::<usize>()
                .map(Self::At)
                .map_err(|_| Error::invalid_query(format!("bad selector {other:?}"))),
        }
    }
}

/// Parse a comma separated query such as `0,-,2`
pub fn parse_query(query: &str) -> Result<Vec<Selector>> {
    query.split(',').map(str::parse).collect()
}

/// Render a query the way it is written on the command line
#[must_use]
pub fn format_query(query: &[Selector]) -> String {
    let parts: Vec<String> = query.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_is_monotonic() {
        let mut alloc = IdAllocator::new();
        let a: ObjectId = alloc.allocate();
        let b: ObjectId = alloc.allocate();
        assert_eq!(a.get(), 0);
        assert_eq!(b.get(), 1);
        assert_eq!(alloc.peek(), 2);
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(-3.0), "-3.0");
        assert_eq!(format_float(0.25), "0.25");
        assert_eq!(format_float(f64::NAN), "nan");
        assert_eq!(format_float(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn test_coord_ordering() {
        let mut coords = vec![
            Coord::from("b"),
            Coord::from(2.0),
            Coord::from("a"),
            Coord::from(-1.0),
        ];
        coords.sort();
        assert_eq!(
            coords,
            vec![
                Coord::from(-1.0),
                Coord::from(2.0),
                Coord::from("a"),
                Coord::from("b"),
            ]
        );
    }

    #[test]
    fn test_coord_parse() {
        assert_eq!("1.5".parse::<Coord>().unwrap(), Coord::Num(1.5));
        assert_eq!(" red ".parse::<Coord>().unwrap(), Coord::from("red"));
        assert_eq!(Coord::from(4).to_string(), "4.0");
    }

    #[test]
    fn test_parse_query() {
        let query = parse_query("0, -,2").unwrap();
        assert_eq!(query, vec![Selector::At(0), Selector::All, Selector::At(2)]);
        assert_eq!(format_query(&query), "[0, -, 2]");
        assert!(parse_query("0,x").is_err());
    }
}
