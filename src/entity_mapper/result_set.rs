//! Result-set assembly
//!
//! Drives the root mapper over the row stream in source order and collects
//! the distinct top-level entities. Rows that map onto an already-returned
//! entity are dropped from the list; their children have already been merged
//! into the shared instance by the time the row is dropped.

use std::cell::RefCell;
use std::rc::Rc;

use super::errors::MapperError;
use super::row_cursor::RowCursor;
use super::{EntityMapper, EntityRef, RowOutcome};

/// Counters collected while assembling one result set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultSetStats {
    /// Rows fed to the mapper
    pub rows: usize,
    /// Rows that produced a new top-level entity
    pub entities: usize,
    /// Rows folded into an earlier entity
    pub duplicates: usize,
    /// Rows without an instance of the root type
    pub empty: usize,
}

/// Map every row and return the distinct top-level entities in row order.
///
/// Stops at the first mapping error.
pub fn assemble<T, M, I>(rows: I, mapper: &mut M) -> Result<Vec<EntityRef<T>>, MapperError>
where
    M: EntityMapper<T> + ?Sized,
    I: IntoIterator<Item = RowCursor>,
{
    assemble_with_stats(rows, mapper).map(|(entities, _)| entities)
}

pub fn assemble_with_stats<T, M, I>(
    rows: I,
    mapper: &mut M,
) -> Result<(Vec<EntityRef<T>>, ResultSetStats), MapperError>
where
    M: EntityMapper<T> + ?Sized,
    I: IntoIterator<Item = RowCursor>,
{
    let mut entities = Vec::new();
    let mut stats = ResultSetStats::default();

    for mut cursor in rows {
        stats.rows += 1;
        match mapper.map(&mut cursor)? {
            RowOutcome::Entity(entity) => {
                stats.entities += 1;
                entities.push(entity);
            }
            RowOutcome::Duplicate(_) => stats.duplicates += 1,
            RowOutcome::Empty => stats.empty += 1,
        }
        if !cursor.is_exhausted() {
            log::trace!(
                "Row {} left {} fragment(s) unconsumed",
                stats.rows,
                cursor.remaining()
            );
        }
    }

    log::debug!(
        "Assembled {} entities from {} rows ({} duplicates, {} empty)",
        stats.entities,
        stats.rows,
        stats.duplicates,
        stats.empty
    );
    Ok((entities, stats))
}

/// Unwrap shared handles into owned values.
///
/// Handles still referenced elsewhere (for example by a live identity cache)
/// are cloned.
pub fn into_owned<T: Clone>(entities: Vec<EntityRef<T>>) -> Vec<T> {
    entities
        .into_iter()
        .map(|entity| {
            Rc::try_unwrap(entity)
                .map(RefCell::into_inner)
                .unwrap_or_else(|shared| shared.borrow().clone())
        })
        .collect()
}
