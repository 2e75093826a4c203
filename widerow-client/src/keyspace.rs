//! The keyspace operation surface.
//!
//! Every operation comes in two forms: `<op>_with`, generic over a
//! [`KeyCodec`], and `<op>`, taking `&str` keys encoded with [`StringCodec`].
//! Each call builds an [`Operation`] around a single RPC and dispatches it with
//! failover; the connection that served the last successful call is reused for
//! the next one.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use arc_swap::ArcSwap;
use bytes::Bytes;
use widerow_core::{
    translate, Clock, Column, ColumnOrSuperColumn, ColumnParent, ColumnPath, ConsistencyLevel,
    ErrorKind, KeyCodec, KeyRange, KeyspaceDescription, Result, SlicePredicate, SliceRange,
    StringCodec, SuperColumn, WideRowError,
};

use crate::batch::{BatchMutation, MutationsByKey};
use crate::config::FailoverPolicy;
use crate::connection::{ConnectionHandle, ConnectionPool};
use crate::failover::FailoverOperator;
use crate::operation::Operation;

/// Window size used when a nested column is read without an explicit limit.
const DEFAULT_WINDOW: i32 = i32::MAX;

/// A handle to one keyspace on the remote store.
#[derive(Debug)]
pub struct Keyspace {
    name: String,
    description: KeyspaceDescription,
    consistency: ConsistencyLevel,
    failover: FailoverPolicy,
    pool: Arc<dyn ConnectionPool>,
    current: ArcSwap<ConnectionHandle>,
}

impl Keyspace {
    /// Creates a keyspace bound to `connection`, which must have been acquired from `pool`.
    pub fn new(
        name: impl Into<String>,
        description: KeyspaceDescription,
        consistency: ConsistencyLevel,
        failover: FailoverPolicy,
        pool: Arc<dyn ConnectionPool>,
        connection: ConnectionHandle,
    ) -> Self {
        Self {
            name: name.into(),
            description,
            consistency,
            failover,
            pool,
            current: ArcSwap::from_pointee(connection),
        }
    }

    /// Returns the keyspace name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the column family description fetched when the keyspace was opened.
    pub fn describe_keyspace(&self) -> &KeyspaceDescription {
        &self.description
    }

    /// Returns the consistency level sent with every request.
    pub fn consistency_level(&self) -> ConsistencyLevel {
        self.consistency
    }

    /// Returns the failover policy.
    pub fn failover_policy(&self) -> &FailoverPolicy {
        &self.failover
    }

    /// Returns the connection the next operation will start on.
    pub fn client(&self) -> ConnectionHandle {
        ConnectionHandle::clone(&self.current.load())
    }

    /// Creates a write stamp with the current connection's clock resolution.
    pub fn create_clock(&self) -> Clock {
        self.current.load().create_clock()
    }

    async fn dispatch<'a, T: Send + 'a>(&self, op: &mut Operation<'a, T>) -> Result<()> {
        let current = self.current.load_full();
        let operator = FailoverOperator::new(self.pool.as_ref(), &self.failover);
        let used = operator.operate(op, ConnectionHandle::clone(&current)).await?;

        if used != *current {
            let previous = self.current.compare_and_swap(&current, Arc::new(used.clone()));
            if Arc::ptr_eq(&*previous, &current) {
                tracing::debug!(
                    keyspace = %self.name,
                    from = %current,
                    to = %used,
                    "keyspace moved to a new connection"
                );
                self.pool.release(ConnectionHandle::clone(&current));
            } else {
                // Another dispatch already replaced the connection.
                self.pool.release(used);
            }
        }
        Ok(())
    }

    /// Reads a single column.
    ///
    /// Returns `None` if the column does not exist.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` without contacting the server if `path` does
    /// not name a column of a standard family or a super column of a super family.
    pub async fn get_column_with<C: KeyCodec>(
        &self,
        key: &C::Key,
        path: &ColumnPath,
        codec: &C,
    ) -> Result<Option<Column>> {
        self.description.validate_column_path(path)?;

        let keyspace = self.name.as_str();
        let consistency = self.consistency;
        let mut op = Operation::read("get_column", move |conn: ConnectionHandle| async move {
            let key = codec.to_bytes(key)?;
            let item = conn
                .endpoint()
                .get(keyspace, key, path, consistency)
                .await
                .map_err(translate)?;
            Ok::<_, WideRowError>(item.into_column())
        })
        .handling(ErrorKind::NotFound);

        self.dispatch(&mut op).await?;
        Ok(op.into_result().flatten())
    }

    /// Reads a single column under a string key.
    pub async fn get_column(&self, key: &str, path: &ColumnPath) -> Result<Option<Column>> {
        self.get_column_with(&key.to_string(), path, &StringCodec)
            .await
    }

    /// Reads a whole super column.
    ///
    /// Returns `None` if the super column does not exist.
    pub async fn get_super_column_with<C: KeyCodec>(
        &self,
        key: &C::Key,
        path: &ColumnPath,
        codec: &C,
    ) -> Result<Option<SuperColumn>> {
        self.description.validate_column_path(path)?;

        let keyspace = self.name.as_str();
        let consistency = self.consistency;
        let mut op = Operation::read("get_super_column", move |conn: ConnectionHandle| async move {
            let key = codec.to_bytes(key)?;
            let item = conn
                .endpoint()
                .get(keyspace, key, path, consistency)
                .await
                .map_err(translate)?;
            Ok::<_, WideRowError>(item.into_super_column())
        })
        .handling(ErrorKind::NotFound);

        self.dispatch(&mut op).await?;
        Ok(op.into_result().flatten())
    }

    /// Reads a whole super column under a string key.
    pub async fn get_super_column(
        &self,
        key: &str,
        path: &ColumnPath,
    ) -> Result<Option<SuperColumn>> {
        self.get_super_column_with(&key.to_string(), path, &StringCodec)
            .await
    }

    /// Reads up to `size` children of a super column, in reverse order if `reversed`.
    ///
    /// Returns `None` if the super column has no children.
    pub async fn get_super_column_window_with<C: KeyCodec>(
        &self,
        key: &C::Key,
        path: &ColumnPath,
        reversed: bool,
        size: i32,
        codec: &C,
    ) -> Result<Option<SuperColumn>> {
        self.description.validate_super_column_path(path)?;

        let name = path.super_column.clone().unwrap_or_default();
        let parent = ColumnParent::new(path.column_family.as_str()).with_super_column(name.clone());
        let predicate = SlicePredicate::from(SliceRange::all(reversed, size));

        let keyspace = self.name.as_str();
        let consistency = self.consistency;
        let (parent, predicate, name) = (&parent, &predicate, &name);
        let mut op = Operation::read("get_super_column_window", move |conn: ConnectionHandle| {
            async move {
                let key = codec.to_bytes(key)?;
                let items = conn
                    .endpoint()
                    .get_slice(keyspace, key, parent, predicate, consistency)
                    .await
                    .map_err(translate)?;
                if items.is_empty() {
                    return Ok(None);
                }
                Ok::<_, WideRowError>(Some(SuperColumn::new(name.clone(), columns(items))))
            }
        })
        .handling(ErrorKind::NotFound);

        self.dispatch(&mut op).await?;
        Ok(op.into_result().flatten())
    }

    /// Reads a window of a super column's children under a string key.
    pub async fn get_super_column_window(
        &self,
        key: &str,
        path: &ColumnPath,
        reversed: bool,
        size: i32,
    ) -> Result<Option<SuperColumn>> {
        self.get_super_column_window_with(&key.to_string(), path, reversed, size, &StringCodec)
            .await
    }

    /// Reads the columns of one row matching `predicate`.
    pub async fn get_slice_with<C: KeyCodec>(
        &self,
        key: &C::Key,
        parent: &ColumnParent,
        predicate: &SlicePredicate,
        codec: &C,
    ) -> Result<Vec<Column>> {
        let items = self
            .slice("get_slice", key, parent, predicate, codec)
            .await?;
        Ok(columns(items))
    }

    /// Reads the columns of one string-keyed row matching `predicate`.
    pub async fn get_slice(
        &self,
        key: &str,
        parent: &ColumnParent,
        predicate: &SlicePredicate,
    ) -> Result<Vec<Column>> {
        self.get_slice_with(&key.to_string(), parent, predicate, &StringCodec)
            .await
    }

    /// Reads the super columns of one row matching `predicate`.
    pub async fn get_super_slice_with<C: KeyCodec>(
        &self,
        key: &C::Key,
        parent: &ColumnParent,
        predicate: &SlicePredicate,
        codec: &C,
    ) -> Result<Vec<SuperColumn>> {
        let items = self
            .slice("get_super_slice", key, parent, predicate, codec)
            .await?;
        Ok(super_columns(items))
    }

    /// Reads the super columns of one string-keyed row matching `predicate`.
    pub async fn get_super_slice(
        &self,
        key: &str,
        parent: &ColumnParent,
        predicate: &SlicePredicate,
    ) -> Result<Vec<SuperColumn>> {
        self.get_super_slice_with(&key.to_string(), parent, predicate, &StringCodec)
            .await
    }

    async fn slice<C: KeyCodec>(
        &self,
        name: &'static str,
        key: &C::Key,
        parent: &ColumnParent,
        predicate: &SlicePredicate,
        codec: &C,
    ) -> Result<Vec<ColumnOrSuperColumn>> {
        let keyspace = self.name.as_str();
        let consistency = self.consistency;
        let mut op = Operation::read(name, move |conn: ConnectionHandle| async move {
            let key = codec.to_bytes(key)?;
            let items = conn
                .endpoint()
                .get_slice(keyspace, key, parent, predicate, consistency)
                .await
                .map_err(translate)?;
            Ok::<_, WideRowError>(items)
        });

        self.dispatch(&mut op).await?;
        Ok(op.into_result().unwrap_or_default())
    }

    /// Reads the columns matching `predicate` for several rows.
    ///
    /// Rows the server returns nothing for are absent from the result.
    pub async fn multiget_slice_with<C>(
        &self,
        keys: &[C::Key],
        parent: &ColumnParent,
        predicate: &SlicePredicate,
        codec: &C,
    ) -> Result<HashMap<C::Key, Vec<Column>>>
    where
        C: KeyCodec,
        C::Key: Eq + Hash,
    {
        let rows = self
            .multiget("multiget_slice", keys, parent, predicate, codec)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(key, items)| (key, columns(items)))
            .collect())
    }

    /// Reads the columns matching `predicate` for several string-keyed rows.
    pub async fn multiget_slice(
        &self,
        keys: &[&str],
        parent: &ColumnParent,
        predicate: &SlicePredicate,
    ) -> Result<HashMap<String, Vec<Column>>> {
        self.multiget_slice_with(&string_keys(keys), parent, predicate, &StringCodec)
            .await
    }

    /// Reads the super columns matching `predicate` for several rows.
    ///
    /// When `parent` names a super column, the server answers with that super
    /// column's children; they are wrapped into a single super column per row
    /// so both request shapes return the same type.
    pub async fn multiget_super_slice_with<C>(
        &self,
        keys: &[C::Key],
        parent: &ColumnParent,
        predicate: &SlicePredicate,
        codec: &C,
    ) -> Result<HashMap<C::Key, Vec<SuperColumn>>>
    where
        C: KeyCodec,
        C::Key: Eq + Hash,
    {
        let rows = self
            .multiget("multiget_super_slice", keys, parent, predicate, codec)
            .await?;

        let result = match &parent.super_column {
            None => rows
                .into_iter()
                .map(|(key, items)| (key, super_columns(items)))
                .collect(),
            Some(name) => rows
                .into_iter()
                .map(|(key, items)| (key, vec![SuperColumn::new(name.clone(), columns(items))]))
                .collect(),
        };
        Ok(result)
    }

    /// Reads the super columns matching `predicate` for several string-keyed rows.
    pub async fn multiget_super_slice(
        &self,
        keys: &[&str],
        parent: &ColumnParent,
        predicate: &SlicePredicate,
    ) -> Result<HashMap<String, Vec<SuperColumn>>> {
        self.multiget_super_slice_with(&string_keys(keys), parent, predicate, &StringCodec)
            .await
    }

    async fn multiget<C>(
        &self,
        name: &'static str,
        keys: &[C::Key],
        parent: &ColumnParent,
        predicate: &SlicePredicate,
        codec: &C,
    ) -> Result<HashMap<C::Key, Vec<ColumnOrSuperColumn>>>
    where
        C: KeyCodec,
        C::Key: Eq + Hash,
    {
        let keyspace = self.name.as_str();
        let consistency = self.consistency;
        let mut op = Operation::read(name, move |conn: ConnectionHandle| async move {
            let keys = codec.to_bytes_list(keys)?;
            let rows = conn
                .endpoint()
                .multiget_slice(keyspace, keys, parent, predicate, consistency)
                .await
                .map_err(translate)?;
            rows.into_iter()
                .map(|(key, items)| Ok((codec.from_bytes(&key)?, items)))
                .collect::<Result<HashMap<_, _>>>()
        });

        self.dispatch(&mut op).await?;
        Ok(op.into_result().unwrap_or_default())
    }

    /// Reads one super column from several rows.
    ///
    /// Rows without the super column map to a super column with no children.
    pub async fn multiget_super_column_with<C>(
        &self,
        keys: &[C::Key],
        path: &ColumnPath,
        codec: &C,
    ) -> Result<HashMap<C::Key, SuperColumn>>
    where
        C: KeyCodec,
        C::Key: Eq + Hash,
    {
        self.multiget_super_column_window_with(keys, path, false, DEFAULT_WINDOW, codec)
            .await
    }

    /// Reads one super column from several string-keyed rows.
    pub async fn multiget_super_column(
        &self,
        keys: &[&str],
        path: &ColumnPath,
    ) -> Result<HashMap<String, SuperColumn>> {
        self.multiget_super_column_with(&string_keys(keys), path, &StringCodec)
            .await
    }

    /// Reads up to `size` children of one super column from several rows.
    pub async fn multiget_super_column_window_with<C>(
        &self,
        keys: &[C::Key],
        path: &ColumnPath,
        reversed: bool,
        size: i32,
        codec: &C,
    ) -> Result<HashMap<C::Key, SuperColumn>>
    where
        C: KeyCodec,
        C::Key: Eq + Hash,
    {
        self.description.validate_super_column_path(path)?;

        let mut parent = ColumnParent::new(path.column_family.as_str());
        parent.super_column = path.super_column.clone();
        let predicate = SlicePredicate::from(SliceRange::all(reversed, size));

        let rows = self
            .multiget_super_slice_with(keys, &parent, &predicate, codec)
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(key, super_columns)| {
                super_columns.into_iter().next().map(|sc| (key, sc))
            })
            .collect())
    }

    /// Reads a window of one super column from several string-keyed rows.
    pub async fn multiget_super_column_window(
        &self,
        keys: &[&str],
        path: &ColumnPath,
        reversed: bool,
        size: i32,
    ) -> Result<HashMap<String, SuperColumn>> {
        self.multiget_super_column_window_with(
            &string_keys(keys),
            path,
            reversed,
            size,
            &StringCodec,
        )
        .await
    }

    /// Scans a range of rows, returning the matching columns of each.
    ///
    /// Rows are returned in the order the server sent them.
    pub async fn get_range_slices_with<C: KeyCodec>(
        &self,
        parent: &ColumnParent,
        predicate: &SlicePredicate,
        range: &KeyRange,
        codec: &C,
    ) -> Result<Vec<(C::Key, Vec<Column>)>> {
        let rows = self
            .range("get_range_slices", parent, predicate, range, codec)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(key, items)| (key, columns(items)))
            .collect())
    }

    /// Scans a range of string-keyed rows.
    pub async fn get_range_slices(
        &self,
        parent: &ColumnParent,
        predicate: &SlicePredicate,
        range: &KeyRange,
    ) -> Result<Vec<(String, Vec<Column>)>> {
        self.get_range_slices_with(parent, predicate, range, &StringCodec)
            .await
    }

    /// Scans a range of rows, returning the matching super columns of each.
    pub async fn get_super_range_slices_with<C: KeyCodec>(
        &self,
        parent: &ColumnParent,
        predicate: &SlicePredicate,
        range: &KeyRange,
        codec: &C,
    ) -> Result<Vec<(C::Key, Vec<SuperColumn>)>> {
        let rows = self
            .range("get_super_range_slices", parent, predicate, range, codec)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(key, items)| (key, super_columns(items)))
            .collect())
    }

    /// Scans a range of string-keyed rows for super columns.
    pub async fn get_super_range_slices(
        &self,
        parent: &ColumnParent,
        predicate: &SlicePredicate,
        range: &KeyRange,
    ) -> Result<Vec<(String, Vec<SuperColumn>)>> {
        self.get_super_range_slices_with(parent, predicate, range, &StringCodec)
            .await
    }

    async fn range<C: KeyCodec>(
        &self,
        name: &'static str,
        parent: &ColumnParent,
        predicate: &SlicePredicate,
        range: &KeyRange,
        codec: &C,
    ) -> Result<Vec<(C::Key, Vec<ColumnOrSuperColumn>)>> {
        let keyspace = self.name.as_str();
        let consistency = self.consistency;
        let mut op = Operation::read(name, move |conn: ConnectionHandle| async move {
            let slices = conn
                .endpoint()
                .get_range_slices(keyspace, parent, predicate, range, consistency)
                .await
                .map_err(translate)?;
            slices
                .into_iter()
                .map(|slice| Ok((codec.from_bytes(&slice.key)?, slice.columns)))
                .collect::<Result<Vec<_>>>()
        });

        self.dispatch(&mut op).await?;
        Ok(op.into_result().unwrap_or_default())
    }

    /// Counts the columns of one row matching `predicate`.
    pub async fn get_count_with<C: KeyCodec>(
        &self,
        key: &C::Key,
        parent: &ColumnParent,
        predicate: &SlicePredicate,
        codec: &C,
    ) -> Result<i32> {
        let keyspace = self.name.as_str();
        let consistency = self.consistency;
        let mut op = Operation::read("get_count", move |conn: ConnectionHandle| async move {
            let key = codec.to_bytes(key)?;
            let count = conn
                .endpoint()
                .get_count(keyspace, key, parent, predicate, consistency)
                .await
                .map_err(translate)?;
            Ok::<_, WideRowError>(count)
        });

        self.dispatch(&mut op).await?;
        Ok(op.into_result().unwrap_or_default())
    }

    /// Counts the columns of one string-keyed row matching `predicate`.
    pub async fn get_count(
        &self,
        key: &str,
        parent: &ColumnParent,
        predicate: &SlicePredicate,
    ) -> Result<i32> {
        self.get_count_with(&key.to_string(), parent, predicate, &StringCodec)
            .await
    }

    /// Writes one column under `parent`.
    pub async fn insert_with<C: KeyCodec>(
        &self,
        key: &C::Key,
        parent: &ColumnParent,
        column: Column,
        codec: &C,
    ) -> Result<()> {
        let keyspace = self.name.as_str();
        let consistency = self.consistency;
        let column = &column;
        let mut op = Operation::write("insert", move |conn: ConnectionHandle| async move {
            let key = codec.to_bytes(key)?;
            conn.endpoint()
                .insert(keyspace, key, parent, column, consistency)
                .await
                .map_err(translate)
        });

        self.dispatch(&mut op).await
    }

    /// Writes `value` at `path` under a string key, stamped with a new clock.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if `path` does not name a column.
    pub async fn insert(&self, key: &str, path: &ColumnPath, value: impl Into<Bytes>) -> Result<()> {
        let clock = self.create_clock();
        self.insert_clocked(key, path, value.into(), clock).await
    }

    /// Writes `value` at `path` under a string key with a caller-supplied timestamp.
    pub async fn insert_at(
        &self,
        key: &str,
        path: &ColumnPath,
        value: impl Into<Bytes>,
        timestamp: i64,
    ) -> Result<()> {
        self.insert_clocked(key, path, value.into(), Clock::new(timestamp))
            .await
    }

    async fn insert_clocked(
        &self,
        key: &str,
        path: &ColumnPath,
        value: Bytes,
        clock: Clock,
    ) -> Result<()> {
        let name = path.column.clone().ok_or_else(|| {
            WideRowError::InvalidRequest(format!(
                "insert into {} requires a column name",
                path.column_family
            ))
        })?;

        self.insert_with(
            &key.to_string(),
            &path.parent(),
            Column::new(name, value, clock),
            &StringCodec,
        )
        .await
    }

    /// Applies insertions and deletions for several rows in one request.
    ///
    /// An empty mapping completes without contacting the server.
    pub async fn batch_mutate_with<C>(
        &self,
        mutations: &MutationsByKey<C::Key>,
        codec: &C,
    ) -> Result<()>
    where
        C: KeyCodec,
        C::Key: Eq + Hash,
    {
        if mutations.is_empty() {
            tracing::debug!(keyspace = %self.name, "skipping empty batch mutation");
            return Ok(());
        }

        let keyspace = self.name.as_str();
        let consistency = self.consistency;
        let mut op = Operation::write("batch_mutate", move |conn: ConnectionHandle| async move {
            let mutations = codec.to_bytes_map(mutations)?;
            conn.endpoint()
                .batch_mutate(keyspace, mutations, consistency)
                .await
                .map_err(translate)
        });

        self.dispatch(&mut op).await
    }

    /// Applies a string-keyed mutation mapping in one request.
    pub async fn batch_mutate(&self, mutations: &MutationsByKey<String>) -> Result<()> {
        self.batch_mutate_with(mutations, &StringCodec).await
    }

    /// Executes a [`BatchMutation`].
    pub async fn execute_batch_with<C>(
        &self,
        batch: &BatchMutation<C::Key>,
        codec: &C,
    ) -> Result<()>
    where
        C: KeyCodec,
        C::Key: Eq + Hash,
    {
        if batch.is_empty() {
            tracing::debug!(keyspace = %self.name, "skipping empty batch mutation");
            return Ok(());
        }
        self.batch_mutate_with(batch.mutations(), codec).await
    }

    /// Executes a string-keyed [`BatchMutation`].
    pub async fn execute_batch(&self, batch: &BatchMutation<String>) -> Result<()> {
        self.execute_batch_with(batch, &StringCodec).await
    }

    /// Removes the data at `path` with the given write stamp.
    pub async fn remove_with<C: KeyCodec>(
        &self,
        key: &C::Key,
        path: &ColumnPath,
        clock: Clock,
        codec: &C,
    ) -> Result<()> {
        let keyspace = self.name.as_str();
        let consistency = self.consistency;
        let mut op = Operation::write("remove", move |conn: ConnectionHandle| async move {
            let key = codec.to_bytes(key)?;
            conn.endpoint()
                .remove(keyspace, key, path, clock, consistency)
                .await
                .map_err(translate)
        });

        self.dispatch(&mut op).await
    }

    /// Removes the data at `path` under a string key, stamped with a new clock.
    pub async fn remove(&self, key: &str, path: &ColumnPath) -> Result<()> {
        let clock = self.create_clock();
        self.remove_with(&key.to_string(), path, clock, &StringCodec)
            .await
    }

    /// Removes the data at `path` under a string key with a caller-supplied timestamp.
    pub async fn remove_at(&self, key: &str, path: &ColumnPath, timestamp: i64) -> Result<()> {
        self.remove_with(&key.to_string(), path, Clock::new(timestamp), &StringCodec)
            .await
    }
}

impl fmt::Display for Keyspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self.current.load();
        write!(f, "Keyspace<{}@{}>", self.name, **current)
    }
}

fn columns(items: Vec<ColumnOrSuperColumn>) -> Vec<Column> {
    items
        .into_iter()
        .filter_map(ColumnOrSuperColumn::into_column)
        .collect()
}

fn super_columns(items: Vec<ColumnOrSuperColumn>) -> Vec<SuperColumn> {
    items
        .into_iter()
        .filter_map(ColumnOrSuperColumn::into_super_column)
        .collect()
}

fn string_keys(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|k| k.to_string()).collect()
}
