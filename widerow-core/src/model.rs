//! Column, path and predicate types exchanged with the remote store.
//!
//! Names, values and row keys are raw byte sequences; only the column family
//! name is a string. Predicates and key ranges are passed through to the
//! endpoint unmodified.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Ordering token attached to a write, used by the store to resolve conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Clock {
    /// Timestamp in the unit chosen by the clock resolution that produced it.
    pub timestamp: i64,
}

impl Clock {
    /// Creates a clock with the given timestamp.
    pub fn new(timestamp: i64) -> Self {
        Self { timestamp }
    }
}

/// A `(name, value, clock)` triple stored under a row key.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Column {
    /// Column name.
    pub name: Bytes,
    /// Column value.
    pub value: Bytes,
    /// Write stamp.
    pub clock: Clock,
}

impl Column {
    /// Creates a column.
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>, clock: Clock) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            clock,
        }
    }
}

/// A named, ordered group of columns stored under a row key.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SuperColumn {
    /// Super column name.
    pub name: Bytes,
    /// Child columns in comparator order.
    pub columns: Vec<Column>,
}

impl SuperColumn {
    /// Creates a super column.
    pub fn new(name: impl Into<Bytes>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }
}

/// A single result item: either a column or a super column.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ColumnOrSuperColumn {
    /// A standard column.
    Column(Column),
    /// A super column.
    SuperColumn(SuperColumn),
}

impl ColumnOrSuperColumn {
    /// Returns the standard column, if this item holds one.
    pub fn into_column(self) -> Option<Column> {
        match self {
            ColumnOrSuperColumn::Column(c) => Some(c),
            ColumnOrSuperColumn::SuperColumn(_) => None,
        }
    }

    /// Returns the super column, if this item holds one.
    pub fn into_super_column(self) -> Option<SuperColumn> {
        match self {
            ColumnOrSuperColumn::SuperColumn(sc) => Some(sc),
            ColumnOrSuperColumn::Column(_) => None,
        }
    }
}

impl From<Column> for ColumnOrSuperColumn {
    fn from(column: Column) -> Self {
        ColumnOrSuperColumn::Column(column)
    }
}

impl From<SuperColumn> for ColumnOrSuperColumn {
    fn from(super_column: SuperColumn) -> Self {
        ColumnOrSuperColumn::SuperColumn(super_column)
    }
}

/// Identifies a column family, an optional super column and an optional column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ColumnPath {
    /// Column family name.
    pub column_family: String,
    /// Super column name, for super families.
    pub super_column: Option<Bytes>,
    /// Column name.
    pub column: Option<Bytes>,
}

impl ColumnPath {
    /// Creates a path naming only a column family.
    pub fn new(column_family: impl Into<String>) -> Self {
        Self {
            column_family: column_family.into(),
            super_column: None,
            column: None,
        }
    }

    /// Sets the column name.
    pub fn with_column(mut self, column: impl Into<Bytes>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Sets the super column name.
    pub fn with_super_column(mut self, super_column: impl Into<Bytes>) -> Self {
        self.super_column = Some(super_column.into());
        self
    }

    /// Returns the parent of this path (family plus optional super column).
    pub fn parent(&self) -> ColumnParent {
        ColumnParent {
            column_family: self.column_family.clone(),
            super_column: self.super_column.clone(),
        }
    }
}

/// The container a column is read from or written to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ColumnParent {
    /// Column family name.
    pub column_family: String,
    /// Super column name, for super families.
    pub super_column: Option<Bytes>,
}

impl ColumnParent {
    /// Creates a parent naming only a column family.
    pub fn new(column_family: impl Into<String>) -> Self {
        Self {
            column_family: column_family.into(),
            super_column: None,
        }
    }

    /// Sets the super column name.
    pub fn with_super_column(mut self, super_column: impl Into<Bytes>) -> Self {
        self.super_column = Some(super_column.into());
        self
    }
}

/// A contiguous range of column names.
///
/// Empty `start` and `finish` select from the first and to the last column.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SliceRange {
    /// First column name (inclusive).
    pub start: Bytes,
    /// Last column name (inclusive).
    pub finish: Bytes,
    /// Return columns in reverse comparator order.
    pub reversed: bool,
    /// Maximum number of columns to return.
    pub count: i32,
}

impl SliceRange {
    /// Creates a range over all columns with the given direction and limit.
    pub fn all(reversed: bool, count: i32) -> Self {
        Self {
            start: Bytes::new(),
            finish: Bytes::new(),
            reversed,
            count,
        }
    }
}

/// Selects columns within a row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SlicePredicate {
    /// An explicit list of column names.
    ColumnNames(Vec<Bytes>),
    /// A contiguous range of column names.
    SliceRange(SliceRange),
}

impl From<SliceRange> for SlicePredicate {
    fn from(range: SliceRange) -> Self {
        SlicePredicate::SliceRange(range)
    }
}

/// Selects a contiguous range of rows.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KeyRange {
    /// First key (inclusive); empty means unbounded.
    pub start_key: Bytes,
    /// Last key (inclusive); empty means unbounded.
    pub end_key: Bytes,
    /// First token, as an alternative to `start_key`.
    pub start_token: Option<String>,
    /// Last token, as an alternative to `end_key`.
    pub end_token: Option<String>,
    /// Maximum number of rows to return.
    pub count: i32,
}

impl KeyRange {
    /// Creates a key range with the given bounds and row limit.
    pub fn new(start_key: impl Into<Bytes>, end_key: impl Into<Bytes>, count: i32) -> Self {
        Self {
            start_key: start_key.into(),
            end_key: end_key.into(),
            start_token: None,
            end_token: None,
            count,
        }
    }
}

impl Default for KeyRange {
    fn default() -> Self {
        Self::new(Bytes::new(), Bytes::new(), 100)
    }
}

/// One row returned by a range scan.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KeySlice {
    /// Row key.
    pub key: Bytes,
    /// Matched items.
    pub columns: Vec<ColumnOrSuperColumn>,
}

/// Removal of a whole row, a super column or selected columns.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Deletion {
    /// Write stamp of the deletion.
    pub clock: Clock,
    /// Super column to delete from, for super families.
    pub super_column: Option<Bytes>,
    /// Columns to delete; `None` deletes everything under the parent.
    pub predicate: Option<SlicePredicate>,
}

/// One entry of a batch mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Mutation {
    /// Write a column or super column.
    Insert(ColumnOrSuperColumn),
    /// Delete data.
    Delete(Deletion),
}

/// How many replicas must acknowledge a read or write.
///
/// Opaque to the client; forwarded with every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConsistencyLevel {
    /// Fire and forget.
    Zero,
    /// One replica.
    One,
    /// A majority of replicas.
    #[default]
    Quorum,
    /// A majority of replicas in the local data center.
    DcQuorum,
    /// A majority of replicas in every data center.
    DcQuorumSync,
    /// Every replica.
    All,
    /// Any node, including hinted handoff.
    Any,
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConsistencyLevel::Zero => "ZERO",
            ConsistencyLevel::One => "ONE",
            ConsistencyLevel::Quorum => "QUORUM",
            ConsistencyLevel::DcQuorum => "DCQUORUM",
            ConsistencyLevel::DcQuorumSync => "DCQUORUMSYNC",
            ConsistencyLevel::All => "ALL",
            ConsistencyLevel::Any => "ANY",
        };
        f.write_str(name)
    }
}

impl FromStr for ConsistencyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace(['-', '_'], "").as_str() {
            "ZERO" => Ok(ConsistencyLevel::Zero),
            "ONE" => Ok(ConsistencyLevel::One),
            "QUORUM" => Ok(ConsistencyLevel::Quorum),
            "DCQUORUM" => Ok(ConsistencyLevel::DcQuorum),
            "DCQUORUMSYNC" => Ok(ConsistencyLevel::DcQuorumSync),
            "ALL" => Ok(ConsistencyLevel::All),
            "ANY" => Ok(ConsistencyLevel::Any),
            _ => Err(format!("unknown consistency level: {s}")),
        }
    }
}
