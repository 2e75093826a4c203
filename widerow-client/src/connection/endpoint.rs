//! The RPC surface of one server.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use widerow_core::{
    Clock, Column, ColumnOrSuperColumn, ColumnParent, ColumnPath, ConsistencyLevel, KeyRange,
    KeySlice, Mutation, SlicePredicate, WireResult,
};

/// Raw batch payload: row key → column family → mutations.
pub type MutationMap = HashMap<Bytes, HashMap<String, Vec<Mutation>>>;

/// One method per RPC the keyspace issues against a server.
///
/// Arguments are already marshalled: row keys are bytes, and paths and
/// predicates are passed through unchanged. Failures are reported as wire
/// errors and translated by the caller.
#[async_trait]
pub trait RemoteEndpoint: Send + Sync + std::fmt::Debug {
    /// Returns the family → metadata map of a keyspace.
    async fn describe_keyspace(
        &self,
        keyspace: &str,
    ) -> WireResult<HashMap<String, HashMap<String, String>>>;

    /// Reads a single column or super column.
    async fn get(
        &self,
        keyspace: &str,
        key: Bytes,
        path: &ColumnPath,
        consistency: ConsistencyLevel,
    ) -> WireResult<ColumnOrSuperColumn>;

    /// Reads the items of one row selected by a predicate.
    async fn get_slice(
        &self,
        keyspace: &str,
        key: Bytes,
        parent: &ColumnParent,
        predicate: &SlicePredicate,
        consistency: ConsistencyLevel,
    ) -> WireResult<Vec<ColumnOrSuperColumn>>;

    /// Reads the items of several rows selected by a predicate.
    async fn multiget_slice(
        &self,
        keyspace: &str,
        keys: Vec<Bytes>,
        parent: &ColumnParent,
        predicate: &SlicePredicate,
        consistency: ConsistencyLevel,
    ) -> WireResult<HashMap<Bytes, Vec<ColumnOrSuperColumn>>>;

    /// Counts the items of one row selected by a predicate.
    async fn get_count(
        &self,
        keyspace: &str,
        key: Bytes,
        parent: &ColumnParent,
        predicate: &SlicePredicate,
        consistency: ConsistencyLevel,
    ) -> WireResult<i32>;

    /// Reads a contiguous range of rows.
    async fn get_range_slices(
        &self,
        keyspace: &str,
        parent: &ColumnParent,
        predicate: &SlicePredicate,
        range: &KeyRange,
        consistency: ConsistencyLevel,
    ) -> WireResult<Vec<KeySlice>>;

    /// Writes a single column.
    async fn insert(
        &self,
        keyspace: &str,
        key: Bytes,
        parent: &ColumnParent,
        column: &Column,
        consistency: ConsistencyLevel,
    ) -> WireResult<()>;

    /// Applies a batch of mutations.
    async fn batch_mutate(
        &self,
        keyspace: &str,
        mutations: MutationMap,
        consistency: ConsistencyLevel,
    ) -> WireResult<()>;

    /// Removes a column, a super column or a whole row.
    async fn remove(
        &self,
        keyspace: &str,
        key: Bytes,
        path: &ColumnPath,
        clock: Clock,
        consistency: ConsistencyLevel,
    ) -> WireResult<()>;
}
