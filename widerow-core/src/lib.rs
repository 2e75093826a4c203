//! Core types for the wide-row column store client.
//!
//! This crate holds everything that does not touch a connection: the column and
//! predicate model, key codecs, keyspace descriptions with column-path
//! validation, the canonical error type and the translation of wire errors into it.

#![warn(missing_docs)]

pub mod codec;
pub mod error;
pub mod model;
pub mod schema;
pub mod wire;

pub use codec::{BytesCodec, KeyCodec, LongCodec, StringCodec, UuidCodec};
pub use error::{ErrorKind, Result, WideRowError};
pub use model::{
    Clock, Column, ColumnOrSuperColumn, ColumnParent, ColumnPath, ConsistencyLevel, Deletion,
    KeyRange, KeySlice, Mutation, SlicePredicate, SliceRange, SuperColumn,
};
pub use schema::{ColumnFamilyType, KeyspaceDescription};
pub use wire::{translate, WireError, WireResult};
