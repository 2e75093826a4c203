//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::ops::Bound;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use widerow_client::{
    ClientConfig, ClockResolution, FailoverPolicy, MutationMap, RemoteEndpoint,
    StaticConnectionPool, WideRowClient,
};
use widerow_core::{
    Clock, Column, ColumnOrSuperColumn, ColumnParent, ColumnPath, ConsistencyLevel, Deletion,
    KeyRange, KeySlice, Mutation, SlicePredicate, SuperColumn, WireError, WireResult,
};

pub const KEYSPACE: &str = "Keyspace1";
pub const USERS: &str = "Users";
pub const POSTS: &str = "Posts";

/// The description served for [`KEYSPACE`]: `Users` is standard, `Posts` is super.
pub fn description() -> HashMap<String, HashMap<String, String>> {
    HashMap::from([
        (
            USERS.to_string(),
            HashMap::from([("Type".to_string(), "Standard".to_string())]),
        ),
        (
            POSTS.to_string(),
            HashMap::from([("Type".to_string(), "Super".to_string())]),
        ),
    ])
}

#[derive(Debug, Clone)]
enum Row {
    Standard(BTreeMap<Bytes, Column>),
    Super(BTreeMap<Bytes, BTreeMap<Bytes, Column>>),
}

/// Rows of every family, shared by all endpoints of one in-memory cluster.
#[derive(Debug, Default)]
pub struct Store {
    rows: Mutex<HashMap<String, BTreeMap<Bytes, Row>>>,
}

fn is_super(family: &str) -> WireResult<bool> {
    match description().get(family).and_then(|meta| meta.get("Type")) {
        Some(t) if t == "Super" => Ok(true),
        Some(_) => Ok(false),
        None => Err(WireError::InvalidRequest {
            why: format!("unconfigured column family: {family}"),
        }),
    }
}

fn empty_row(family: &str) -> WireResult<Row> {
    Ok(if is_super(family)? {
        Row::Super(BTreeMap::new())
    } else {
        Row::Standard(BTreeMap::new())
    })
}

/// Applies a slice predicate to a name-ordered map.
fn select<V: Clone>(map: &BTreeMap<Bytes, V>, predicate: &SlicePredicate) -> Vec<V> {
    match predicate {
        SlicePredicate::ColumnNames(names) => {
            names.iter().filter_map(|n| map.get(n).cloned()).collect()
        }
        SlicePredicate::SliceRange(range) => {
            let limit = usize::try_from(range.count.max(0)).unwrap_or(usize::MAX);
            let bound = |b: &Bytes| {
                if b.is_empty() {
                    Bound::Unbounded
                } else {
                    Bound::Included(b.clone())
                }
            };
            if range.reversed {
                map.range((bound(&range.finish), bound(&range.start)))
                    .rev()
                    .take(limit)
                    .map(|(_, v)| v.clone())
                    .collect()
            } else {
                map.range((bound(&range.start), bound(&range.finish)))
                    .take(limit)
                    .map(|(_, v)| v.clone())
                    .collect()
            }
        }
    }
}

fn slice_row(row: &Row, parent: &ColumnParent, predicate: &SlicePredicate) -> Vec<ColumnOrSuperColumn> {
    match (row, &parent.super_column) {
        (Row::Standard(columns), _) => select(columns, predicate)
            .into_iter()
            .map(ColumnOrSuperColumn::Column)
            .collect(),
        (Row::Super(supers), None) => {
            let named: BTreeMap<Bytes, SuperColumn> = supers
                .iter()
                .map(|(name, cols)| {
                    (
                        name.clone(),
                        SuperColumn::new(name.clone(), cols.values().cloned().collect()),
                    )
                })
                .collect();
            select(&named, predicate)
                .into_iter()
                .map(ColumnOrSuperColumn::SuperColumn)
                .collect()
        }
        (Row::Super(supers), Some(sc)) => supers
            .get(sc)
            .map(|cols| {
                select(cols, predicate)
                    .into_iter()
                    .map(ColumnOrSuperColumn::Column)
                    .collect()
            })
            .unwrap_or_default(),
    }
}

impl Store {
    fn slice(&self, key: &Bytes, parent: &ColumnParent, predicate: &SlicePredicate) -> WireResult<Vec<ColumnOrSuperColumn>> {
        is_super(&parent.column_family)?;
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .get(&parent.column_family)
            .and_then(|family| family.get(key))
            .map(|row| slice_row(row, parent, predicate))
            .unwrap_or_default())
    }

    fn write(&self, family: &str, key: Bytes, item: ColumnOrSuperColumn, super_column: Option<&Bytes>) -> WireResult<()> {
        let template = empty_row(family)?;
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .entry(family.to_string())
            .or_default()
            .entry(key)
            .or_insert(template);

        match (row, item, super_column) {
            (Row::Standard(columns), ColumnOrSuperColumn::Column(c), None) => {
                columns.insert(c.name.clone(), c);
            }
            (Row::Super(supers), ColumnOrSuperColumn::Column(c), Some(sc)) => {
                supers.entry(sc.clone()).or_default().insert(c.name.clone(), c);
            }
            (Row::Super(supers), ColumnOrSuperColumn::SuperColumn(sc), None) => {
                let target = supers.entry(sc.name.clone()).or_default();
                for c in sc.columns {
                    target.insert(c.name.clone(), c);
                }
            }
            _ => {
                return Err(WireError::InvalidRequest {
                    why: format!("write does not match the shape of {family}"),
                })
            }
        }
        Ok(())
    }

    fn delete(&self, family: &str, key: &Bytes, super_column: Option<&Bytes>, names: Option<&[Bytes]>) -> WireResult<()> {
        is_super(family)?;
        let mut rows = self.rows.lock().unwrap();
        let Some(family_rows) = rows.get_mut(family) else {
            return Ok(());
        };

        match (super_column, names) {
            (None, None) => {
                family_rows.remove(key);
            }
            (sc, Some(names)) => match (family_rows.get_mut(key), sc) {
                (Some(Row::Standard(columns)), None) => names.iter().for_each(|n| {
                    columns.remove(n);
                }),
                (Some(Row::Super(supers)), Some(sc)) => {
                    if let Some(columns) = supers.get_mut(sc) {
                        names.iter().for_each(|n| {
                            columns.remove(n);
                        });
                    }
                }
                (Some(Row::Super(supers)), None) => names.iter().for_each(|n| {
                    supers.remove(n);
                }),
                _ => {}
            },
            (Some(sc), None) => {
                if let Some(Row::Super(supers)) = family_rows.get_mut(key) {
                    supers.remove(sc);
                }
            }
        }
        Ok(())
    }
}

/// An endpoint serving [`KEYSPACE`] from a shared in-memory [`Store`].
#[derive(Debug, Clone)]
pub struct InMemoryEndpoint {
    store: Arc<Store>,
}

impl InMemoryEndpoint {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RemoteEndpoint for InMemoryEndpoint {
    async fn describe_keyspace(
        &self,
        keyspace: &str,
    ) -> WireResult<HashMap<String, HashMap<String, String>>> {
        if keyspace == KEYSPACE {
            Ok(description())
        } else {
            Err(WireError::NotFound)
        }
    }

    async fn get(
        &self,
        _keyspace: &str,
        key: Bytes,
        path: &ColumnPath,
        _consistency: ConsistencyLevel,
    ) -> WireResult<ColumnOrSuperColumn> {
        let mut parent = path.parent();
        let names = match (&path.super_column, &path.column) {
            (Some(sc), None) => {
                parent.super_column = None;
                vec![sc.clone()]
            }
            (_, Some(column)) => vec![column.clone()],
            (None, None) => {
                return Err(WireError::InvalidRequest {
                    why: "column path names nothing".to_string(),
                })
            }
        };

        self.store
            .slice(&key, &parent, &SlicePredicate::ColumnNames(names))?
            .into_iter()
            .next()
            .ok_or(WireError::NotFound)
    }

    async fn get_slice(
        &self,
        _keyspace: &str,
        key: Bytes,
        parent: &ColumnParent,
        predicate: &SlicePredicate,
        _consistency: ConsistencyLevel,
    ) -> WireResult<Vec<ColumnOrSuperColumn>> {
        self.store.slice(&key, parent, predicate)
    }

    async fn multiget_slice(
        &self,
        _keyspace: &str,
        keys: Vec<Bytes>,
        parent: &ColumnParent,
        predicate: &SlicePredicate,
        _consistency: ConsistencyLevel,
    ) -> WireResult<HashMap<Bytes, Vec<ColumnOrSuperColumn>>> {
        keys.into_iter()
            .map(|key| {
                let items = self.store.slice(&key, parent, predicate)?;
                Ok((key, items))
            })
            .collect()
    }

    async fn get_count(
        &self,
        _keyspace: &str,
        key: Bytes,
        parent: &ColumnParent,
        predicate: &SlicePredicate,
        _consistency: ConsistencyLevel,
    ) -> WireResult<i32> {
        let items = self.store.slice(&key, parent, predicate)?;
        Ok(i32::try_from(items.len()).unwrap_or(i32::MAX))
    }

    async fn get_range_slices(
        &self,
        _keyspace: &str,
        parent: &ColumnParent,
        predicate: &SlicePredicate,
        range: &KeyRange,
        _consistency: ConsistencyLevel,
    ) -> WireResult<Vec<KeySlice>> {
        is_super(&parent.column_family)?;
        let rows = self.store.rows.lock().unwrap();
        let Some(family) = rows.get(&parent.column_family) else {
            return Ok(Vec::new());
        };

        let limit = usize::try_from(range.count.max(0)).unwrap_or(usize::MAX);
        Ok(family
            .iter()
            .filter(|(key, _)| range.start_key.is_empty() || **key >= range.start_key)
            .filter(|(key, _)| range.end_key.is_empty() || **key <= range.end_key)
            .take(limit)
            .map(|(key, row)| KeySlice {
                key: key.clone(),
                columns: slice_row(row, parent, predicate),
            })
            .collect())
    }

    async fn insert(
        &self,
        _keyspace: &str,
        key: Bytes,
        parent: &ColumnParent,
        column: &Column,
        _consistency: ConsistencyLevel,
    ) -> WireResult<()> {
        self.store.write(
            &parent.column_family,
            key,
            ColumnOrSuperColumn::Column(column.clone()),
            parent.super_column.as_ref(),
        )
    }

    async fn batch_mutate(
        &self,
        _keyspace: &str,
        mutations: MutationMap,
        _consistency: ConsistencyLevel,
    ) -> WireResult<()> {
        for (key, families) in mutations {
            for (family, list) in families {
                for mutation in list {
                    match mutation {
                        Mutation::Insert(item) => {
                            self.store.write(&family, key.clone(), item, None)?
                        }
                        Mutation::Delete(Deletion {
                            super_column,
                            predicate,
                            ..
                        }) => {
                            let names = match predicate {
                                None => None,
                                Some(SlicePredicate::ColumnNames(names)) => Some(names),
                                Some(SlicePredicate::SliceRange(_)) => {
                                    return Err(WireError::InvalidRequest {
                                        why: "range deletions are not supported".to_string(),
                                    })
                                }
                            };
                            self.store.delete(
                                &family,
                                &key,
                                super_column.as_ref(),
                                names.as_deref(),
                            )?
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn remove(
        &self,
        _keyspace: &str,
        key: Bytes,
        path: &ColumnPath,
        _clock: Clock,
        _consistency: ConsistencyLevel,
    ) -> WireResult<()> {
        let names = path.column.clone().map(|c| vec![c]);
        self.store.delete(
            &path.column_family,
            &key,
            path.super_column.as_ref(),
            names.as_deref(),
        )
    }
}

/// Wraps an endpoint, failing calls on demand and counting every call.
#[derive(Debug)]
pub struct FaultyEndpoint {
    inner: Arc<dyn RemoteEndpoint>,
    failures_left: AtomicU32,
    fault: Mutex<fn() -> WireError>,
    calls: AtomicU32,
}

impl FaultyEndpoint {
    pub fn new(inner: Arc<dyn RemoteEndpoint>) -> Self {
        Self {
            inner,
            failures_left: AtomicU32::new(0),
            fault: Mutex::new(transport_error as fn() -> WireError),
            calls: AtomicU32::new(0),
        }
    }

    /// Makes the next `count` calls fail with the error produced by `fault`.
    pub fn fail_next(&self, count: u32, fault: fn() -> WireError) {
        *self.fault.lock().unwrap() = fault;
        self.failures_left.store(count, Ordering::SeqCst);
    }

    /// Returns how many calls reached this endpoint.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }

    fn enter(&self) -> WireResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            let fault = *self.fault.lock().unwrap();
            Err(fault())
        } else {
            Ok(())
        }
    }
}

pub fn transport_error() -> WireError {
    WireError::Transport("connection reset by peer".to_string())
}

pub fn timed_out() -> WireError {
    WireError::TimedOut
}

pub fn invalid_request() -> WireError {
    WireError::InvalidRequest {
        why: "rejected by server".to_string(),
    }
}

#[async_trait]
impl RemoteEndpoint for FaultyEndpoint {
    async fn describe_keyspace(
        &self,
        keyspace: &str,
    ) -> WireResult<HashMap<String, HashMap<String, String>>> {
        self.enter()?;
        self.inner.describe_keyspace(keyspace).await
    }

    async fn get(
        &self,
        keyspace: &str,
        key: Bytes,
        path: &ColumnPath,
        consistency: ConsistencyLevel,
    ) -> WireResult<ColumnOrSuperColumn> {
        self.enter()?;
        self.inner.get(keyspace, key, path, consistency).await
    }

    async fn get_slice(
        &self,
        keyspace: &str,
        key: Bytes,
        parent: &ColumnParent,
        predicate: &SlicePredicate,
        consistency: ConsistencyLevel,
    ) -> WireResult<Vec<ColumnOrSuperColumn>> {
        self.enter()?;
        self.inner
            .get_slice(keyspace, key, parent, predicate, consistency)
            .await
    }

    async fn multiget_slice(
        &self,
        keyspace: &str,
        keys: Vec<Bytes>,
        parent: &ColumnParent,
        predicate: &SlicePredicate,
        consistency: ConsistencyLevel,
    ) -> WireResult<HashMap<Bytes, Vec<ColumnOrSuperColumn>>> {
        self.enter()?;
        self.inner
            .multiget_slice(keyspace, keys, parent, predicate, consistency)
            .await
    }

    async fn get_count(
        &self,
        keyspace: &str,
        key: Bytes,
        parent: &ColumnParent,
        predicate: &SlicePredicate,
        consistency: ConsistencyLevel,
    ) -> WireResult<i32> {
        self.enter()?;
        self.inner
            .get_count(keyspace, key, parent, predicate, consistency)
            .await
    }

    async fn get_range_slices(
        &self,
        keyspace: &str,
        parent: &ColumnParent,
        predicate: &SlicePredicate,
        range: &KeyRange,
        consistency: ConsistencyLevel,
    ) -> WireResult<Vec<KeySlice>> {
        self.enter()?;
        self.inner
            .get_range_slices(keyspace, parent, predicate, range, consistency)
            .await
    }

    async fn insert(
        &self,
        keyspace: &str,
        key: Bytes,
        parent: &ColumnParent,
        column: &Column,
        consistency: ConsistencyLevel,
    ) -> WireResult<()> {
        self.enter()?;
        self.inner
            .insert(keyspace, key, parent, column, consistency)
            .await
    }

    async fn batch_mutate(
        &self,
        keyspace: &str,
        mutations: MutationMap,
        consistency: ConsistencyLevel,
    ) -> WireResult<()> {
        self.enter()?;
        self.inner
            .batch_mutate(keyspace, mutations, consistency)
            .await
    }

    async fn remove(
        &self,
        keyspace: &str,
        key: Bytes,
        path: &ColumnPath,
        clock: Clock,
        consistency: ConsistencyLevel,
    ) -> WireResult<()> {
        self.enter()?;
        self.inner
            .remove(keyspace, key, path, clock, consistency)
            .await
    }
}

/// An in-memory cluster of `size` servers sharing one store.
pub struct Cluster {
    pub store: Arc<Store>,
    pub endpoints: Vec<Arc<FaultyEndpoint>>,
    pub pool: Arc<StaticConnectionPool>,
}

impl Cluster {
    pub fn new(size: u16) -> Self {
        let store = Arc::new(Store::default());
        let endpoints: Vec<Arc<FaultyEndpoint>> = (0..size)
            .map(|_| {
                let inner: Arc<dyn RemoteEndpoint> = Arc::new(InMemoryEndpoint::new(store.clone()));
                Arc::new(FaultyEndpoint::new(inner))
            })
            .collect();

        let pool = Arc::new(StaticConnectionPool::new(
            endpoints.iter().enumerate().map(|(i, e)| {
                let endpoint: Arc<dyn RemoteEndpoint> = e.clone();
                (address(i), endpoint)
            }),
            ClockResolution::Microseconds,
        ));

        Self {
            store,
            endpoints,
            pool,
        }
    }

    pub fn client(&self, policy: FailoverPolicy) -> WideRowClient {
        let config = ClientConfig::builder()
            .addresses((0..self.endpoints.len()).map(address))
            .failover_policy(policy)
            .build()
            .expect("failed to build config");
        WideRowClient::new(config, self.pool.clone())
    }

    /// Returns the endpoint serving `addr`.
    pub fn endpoint_at(&self, addr: SocketAddr) -> &FaultyEndpoint {
        let index = usize::from(addr.port() - 9160);
        &self.endpoints[index]
    }

    pub fn total_calls(&self) -> u32 {
        self.endpoints.iter().map(|e| e.calls()).sum()
    }

    pub fn reset_calls(&self) {
        self.endpoints.iter().for_each(|e| e.reset_calls());
    }
}

pub fn address(index: usize) -> SocketAddr {
    let port = 9160 + u16::try_from(index).expect("too many endpoints");
    SocketAddr::from(([127, 0, 0, 1], port))
}
