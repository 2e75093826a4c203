//! Keyspace descriptions and column-path validation.
//!
//! A [`KeyspaceDescription`] is fetched once when a keyspace is opened and never
//! refreshed. Single-item reads check their column path against it so that a
//! request with the wrong shape fails locally instead of reaching the server.

use std::collections::HashMap;
use std::fmt;

use crate::error::{Result, WideRowError};
use crate::model::ColumnPath;

/// Metadata key holding the column family type.
pub const CF_TYPE: &str = "Type";
/// Type value of a standard column family.
pub const CF_TYPE_STANDARD: &str = "Standard";
/// Type value of a super column family.
pub const CF_TYPE_SUPER: &str = "Super";

/// Shape of a column family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnFamilyType {
    /// Flat columns under each row key.
    Standard,
    /// Super columns, each holding columns, under each row key.
    Super,
}

impl ColumnFamilyType {
    /// Parses the value of the [`CF_TYPE`] metadata entry.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            CF_TYPE_STANDARD => Some(ColumnFamilyType::Standard),
            CF_TYPE_SUPER => Some(ColumnFamilyType::Super),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnFamilyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnFamilyType::Standard => f.write_str(CF_TYPE_STANDARD),
            ColumnFamilyType::Super => f.write_str(CF_TYPE_SUPER),
        }
    }
}

/// Immutable map from column family name to its metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyspaceDescription {
    families: HashMap<String, HashMap<String, String>>,
}

impl KeyspaceDescription {
    /// Wraps a raw family → metadata map.
    pub fn new(families: HashMap<String, HashMap<String, String>>) -> Self {
        Self { families }
    }

    /// Returns the metadata of a column family.
    pub fn family(&self, name: &str) -> Option<&HashMap<String, String>> {
        self.families.get(name)
    }

    /// Returns the declared type of a column family, if it exists and the type is known.
    pub fn family_type(&self, name: &str) -> Option<ColumnFamilyType> {
        self.family(name)
            .and_then(|meta| meta.get(CF_TYPE))
            .and_then(|value| ColumnFamilyType::parse(value))
    }

    /// Returns `true` if the keyspace declares the column family.
    pub fn contains(&self, name: &str) -> bool {
        self.families.contains_key(name)
    }

    /// Checks that `path` addresses a column of a standard family or a super
    /// column of a super family.
    ///
    /// # Errors
    ///
    /// Returns [`WideRowError::InvalidRequest`] if the family does not exist or
    /// the path does not match the family type.
    pub fn validate_column_path(&self, path: &ColumnPath) -> Result<()> {
        let cf = &path.column_family;
        if !self.contains(cf) {
            return Err(rejected(format!(
                "The specified column family does not exist: {cf}"
            )));
        }

        match self.family_type(cf) {
            Some(ColumnFamilyType::Standard) if path.column.is_some() => Ok(()),
            Some(ColumnFamilyType::Super) if path.super_column.is_some() => Ok(()),
            _ => Err(rejected(format!(
                "Invalid Request for column family {cf} Make sure you have the right type"
            ))),
        }
    }

    /// Checks that `path` names a super column of an existing super family.
    ///
    /// # Errors
    ///
    /// Returns [`WideRowError::InvalidRequest`] otherwise.
    pub fn validate_super_column_path(&self, path: &ColumnPath) -> Result<()> {
        let cf = &path.column_family;
        if self.family_type(cf) == Some(ColumnFamilyType::Super) && path.super_column.is_some() {
            return Ok(());
        }
        Err(rejected(format!(
            "Invalid super column name or super column family does not exist: {cf}"
        )))
    }
}

impl From<HashMap<String, HashMap<String, String>>> for KeyspaceDescription {
    fn from(families: HashMap<String, HashMap<String, String>>) -> Self {
        Self::new(families)
    }
}

fn rejected(message: String) -> WideRowError {
    tracing::debug!(reason = %message, "column path rejected");
    WideRowError::InvalidRequest(message)
}
