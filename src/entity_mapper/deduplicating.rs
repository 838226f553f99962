//! Identity-based deduplication across a result set
//!
//! Join fan-out repeats a parent once per matching child row. Wrapping the
//! parent's mapper in a [`DeduplicatingMapper`] keeps one canonical instance
//! per primary key: when a key has been seen before, the row's leading
//! fragment is replaced with the canonical instance before the inner mapper
//! runs, so child collections accumulate on that instance.
//!
//! ```text
//! Row 1: [Company#1, Email(a)]  -> Entity(C1)       C1.emails = [a]
//! Row 2: [Company#1, Email(b)]  -> Duplicate(C1)    C1.emails = [a, b]
//! Row 3: [Company#2, <absent>]  -> Entity(C2)       C2.emails = []
//! ```
//!
//! The identity cache lives exactly as long as the mapper. Use one mapper per
//! query execution and never share it across queries.

use std::any::type_name;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use super::errors::MapperError;
use super::row_cursor::RowCursor;
use super::{EntityMapper, EntityRef, RowOutcome};
use crate::config::MapperConfig;

type PrimaryKeyFn<T, K> = Box<dyn Fn(&T) -> Option<K>>;

/// Decorator that collapses rows sharing a primary key onto one instance
pub struct DeduplicatingMapper<T, K, M> {
    inner: M,
    primary_key: PrimaryKeyFn<T, K>,
    suppress_duplicates: bool,
    cache: HashMap<K, EntityRef<T>>,
}

impl<T, K, M> DeduplicatingMapper<T, K, M>
where
    T: 'static,
    K: Eq + Hash + Debug,
    M: EntityMapper<T>,
{
    /// Wrap `inner` with duplicate suppression enabled.
    pub fn new(inner: M, primary_key: impl Fn(&T) -> Option<K> + 'static) -> Self {
        DeduplicatingMapper {
            inner,
            primary_key: Box::new(primary_key),
            suppress_duplicates: true,
            cache: HashMap::new(),
        }
    }

    pub fn builder(inner: M) -> DeduplicatingMapperBuilder<T, K, M> {
        DeduplicatingMapperBuilder {
            inner,
            primary_key: None,
            suppress_duplicates: true,
            capacity: 0,
        }
    }

    pub fn suppresses_duplicates(&self) -> bool {
        self.suppress_duplicates
    }

    /// Canonical instance for `key`, if a row has produced one
    pub fn canonical(&self, key: &K) -> Option<EntityRef<T>> {
        self.cache.get(key).cloned()
    }

    /// Number of distinct keys seen so far
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Forget every canonical instance so the mapper can serve a new query.
    pub fn reset(&mut self) {
        log::debug!(
            "DeduplicatingMapper<{}>: reset ({} cached keys dropped)",
            type_name::<T>(),
            self.cache.len()
        );
        self.cache.clear();
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }

    pub fn into_inner(self) -> M {
        self.inner
    }
}

impl<T, K, M> EntityMapper<T> for DeduplicatingMapper<T, K, M>
where
    T: 'static,
    K: Eq + Hash + Debug,
    M: EntityMapper<T>,
{
    fn map(&mut self, cursor: &mut RowCursor) -> Result<RowOutcome<T>, MapperError> {
        // No leading T: nothing to deduplicate, let the inner mapper decide
        let Some(key) = cursor.peek_first(|entity: &T| (self.primary_key)(entity)) else {
            return self.inner.map(cursor);
        };
        let key = key.ok_or(MapperError::NullPrimaryKey {
            entity: type_name::<T>(),
        })?;

        let canonical = self.cache.get(&key).cloned();
        let seen = canonical.is_some();
        if let Some(canonical) = canonical {
            log::trace!("DeduplicatingMapper: key {:?} already mapped", key);
            cursor.replace_first(canonical);
        }

        let entity = match self.inner.map(cursor)? {
            RowOutcome::Entity(entity) | RowOutcome::Duplicate(entity) => entity,
            RowOutcome::Empty => return Ok(RowOutcome::Empty),
        };

        if seen {
            if self.suppress_duplicates {
                return Ok(RowOutcome::Duplicate(entity));
            }
            log::warn!(
                "DeduplicatingMapper<{}>: returning key {:?} again (suppression disabled)",
                type_name::<T>(),
                key
            );
        } else {
            log::debug!(
                "DeduplicatingMapper<{}>: new key {:?}",
                type_name::<T>(),
                key
            );
        }

        self.cache.insert(key, Rc::clone(&entity));
        Ok(RowOutcome::Entity(entity))
    }
}

/// Builder for [`DeduplicatingMapper`]
///
/// `build` fails with [`MapperError::MissingPrimaryKey`] when no selector was set.
pub struct DeduplicatingMapperBuilder<T, K, M> {
    inner: M,
    primary_key: Option<PrimaryKeyFn<T, K>>,
    suppress_duplicates: bool,
    capacity: usize,
}

impl<T, K, M> DeduplicatingMapperBuilder<T, K, M>
where
    T: 'static,
    K: Eq + Hash + Debug,
    M: EntityMapper<T>,
{
    pub fn primary_key(mut self, primary_key: impl Fn(&T) -> Option<K> + 'static) -> Self {
        self.primary_key = Some(Box::new(primary_key));
        self
    }

    pub fn suppress_duplicates(mut self, suppress: bool) -> Self {
        self.suppress_duplicates = suppress;
        self
    }

    /// Apply suppression and cache sizing from a loaded configuration.
    pub fn config(mut self, config: &MapperConfig) -> Self {
        self.suppress_duplicates = config.suppress_duplicates;
        self.capacity = config.identity_cache_capacity;
        self
    }

    pub fn build(self) -> Result<DeduplicatingMapper<T, K, M>, MapperError> {
        let primary_key = self.primary_key.ok_or(MapperError::MissingPrimaryKey {
            entity: type_name::<T>(),
        })?;
        Ok(DeduplicatingMapper {
            inner: self.inner,
            primary_key,
            suppress_duplicates: self.suppress_duplicates,
            cache: HashMap::with_capacity(self.capacity),
        })
    }
}
