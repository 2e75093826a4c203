//! Batch mutation builder.

use std::collections::HashMap;
use std::hash::Hash;

use widerow_core::{Column, ColumnOrSuperColumn, Deletion, Mutation, SuperColumn};

/// Mutations grouped by row key and column family.
pub type MutationsByKey<K> = HashMap<K, HashMap<String, Vec<Mutation>>>;

/// Collects insertions and deletions for several rows, sent in one request.
///
/// ```
/// use widerow_client::BatchMutation;
/// use widerow_core::{Clock, Column};
///
/// let mut batch = BatchMutation::new();
/// batch.add_insertion(
///     "u1".to_string(),
///     &["Users"],
///     Column::new("name", "Bob", Clock::new(100)),
/// );
/// assert_eq!(batch.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct BatchMutation<K> {
    mutations: MutationsByKey<K>,
}

impl<K: Eq + Hash> BatchMutation<K> {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self {
            mutations: HashMap::new(),
        }
    }

    /// Adds a column insertion under `key` for every family in `column_families`.
    pub fn add_insertion<S: AsRef<str>>(
        &mut self,
        key: K,
        column_families: &[S],
        column: Column,
    ) -> &mut Self {
        self.add(key, column_families, Mutation::Insert(column.into()))
    }

    /// Adds a super column insertion under `key` for every family in `column_families`.
    pub fn add_super_insertion<S: AsRef<str>>(
        &mut self,
        key: K,
        column_families: &[S],
        super_column: SuperColumn,
    ) -> &mut Self {
        self.add(
            key,
            column_families,
            Mutation::Insert(ColumnOrSuperColumn::SuperColumn(super_column)),
        )
    }

    /// Adds a deletion under `key` for every family in `column_families`.
    pub fn add_deletion<S: AsRef<str>>(
        &mut self,
        key: K,
        column_families: &[S],
        deletion: Deletion,
    ) -> &mut Self {
        self.add(key, column_families, Mutation::Delete(deletion))
    }

    fn add<S: AsRef<str>>(&mut self, key: K, column_families: &[S], mutation: Mutation) -> &mut Self {
        let by_family = self.mutations.entry(key).or_default();
        for family in column_families {
            by_family
                .entry(family.as_ref().to_string())
                .or_default()
                .push(mutation.clone());
        }
        self
    }

    /// Returns the collected mutations.
    pub fn mutations(&self) -> &MutationsByKey<K> {
        &self.mutations
    }

    /// Returns the number of row keys in the batch.
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Returns `true` if the batch holds no mutations.
    pub fn is_empty(&self) -> bool {
        self.mutations
            .values()
            .all(|families| families.values().all(Vec::is_empty))
    }
}

impl<K: Eq + Hash> Default for BatchMutation<K> {
    fn default() -> Self {
        Self::new()
    }
}
