//! Row-to-entity mapping
//!
//! Reconstructs a typed object graph from denormalized join rows.
//!
//! # Architecture
//!
//! 1. **RowCursor**: the ordered fragments of one row, consumed in the order
//!    the query declared them
//!
//! 2. **EntityMapper**: one implementation per entity type; takes its own
//!    fragment, then one fragment per declared child relation, and attaches
//!    children without duplicating them on the parent it holds
//!
//! 3. **DeduplicatingMapper**: wraps any mapper and keeps one canonical
//!    instance per primary key for the whole result set, so later rows mutate
//!    the instance returned by an earlier row
//!
//! 4. **Result-set assembly**: feeds rows through the root mapper in order
//!    and keeps only [`RowOutcome::Entity`] results

pub mod deduplicating;
pub mod errors;
pub mod result_set;
pub mod row_cursor;

use std::cell::RefCell;
use std::rc::Rc;

pub use deduplicating::{DeduplicatingMapper, DeduplicatingMapperBuilder};
pub use errors::MapperError;
pub use result_set::{assemble, assemble_with_stats, into_owned, ResultSetStats};
pub use row_cursor::{Fragment, RowCursor};

/// Shared handle to an entity instance
///
/// Canonical instances are compared by reference (`Rc::ptr_eq`), never by value.
pub type EntityRef<T> = Rc<RefCell<T>>;

/// What a single row contributed for the mapped type
#[derive(Debug)]
pub enum RowOutcome<T> {
    /// A new top-level entity, or one refreshed by this row
    Entity(EntityRef<T>),
    /// The key was already represented by an earlier row. The handle is the
    /// canonical instance, which this row may have updated in place.
    Duplicate(EntityRef<T>),
    /// The row held no instance of `T`
    Empty,
}

impl<T> RowOutcome<T> {
    /// The entity to append to the result list, if any
    pub fn into_entity(self) -> Option<EntityRef<T>> {
        match self {
            RowOutcome::Entity(entity) => Some(entity),
            RowOutcome::Duplicate(_) | RowOutcome::Empty => None,
        }
    }

    /// The handle this row mapped onto, whether new or canonical
    pub fn handle(&self) -> Option<&EntityRef<T>> {
        match self {
            RowOutcome::Entity(entity) | RowOutcome::Duplicate(entity) => Some(entity),
            RowOutcome::Empty => None,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, RowOutcome::Duplicate(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RowOutcome::Empty)
    }
}

/// Maps the fragments of one row onto an instance of `T`
///
/// Implementations must consume fragments in the order the query layer
/// declared them. A missing optional relation is skipped, never an error.
pub trait EntityMapper<T> {
    fn map(&mut self, cursor: &mut RowCursor) -> Result<RowOutcome<T>, MapperError>;
}

impl<T, F> EntityMapper<T> for F
where
    F: FnMut(&mut RowCursor) -> Result<RowOutcome<T>, MapperError>,
{
    fn map(&mut self, cursor: &mut RowCursor) -> Result<RowOutcome<T>, MapperError> {
        self(cursor)
    }
}

/// Push `item` unless an entry with the same key is already present.
///
/// Returns true when the item was attached.
pub fn attach_unique<T, K, F>(list: &mut Vec<T>, item: T, key: F) -> bool
where
    K: PartialEq,
    F: Fn(&T) -> K,
{
    let item_key = key(&item);
    if list.iter().any(|existing| key(existing) == item_key) {
        return false;
    }
    list.push(item);
    true
}
