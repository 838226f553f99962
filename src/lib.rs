//! Joingraph - object graph reconstruction from SQL join rows
//!
//! This crate turns the flattened rows of a join query back into a typed,
//! deduplicated object graph:
//! - Row shapes declaring which `(type, alias)` fragments each row carries
//! - An ordered, single-use cursor over the fragments of one row
//! - Per-entity mappers that attach child relations without duplicates
//! - A deduplicating decorator keeping one canonical instance per primary key

pub mod config;
pub mod domain;
pub mod entity_mapper;
pub mod row_shape;

pub use config::{ConfigError, MapperConfig};
pub use entity_mapper::{
    assemble, DeduplicatingMapper, EntityMapper, EntityRef, Fragment, MapperError, RowCursor,
    RowOutcome,
};
pub use row_shape::RowShape;
