//! Ordered, single-use cursor over the entity fragments of one result row.
//!
//! The data-access layer materializes one [`Fragment`] per declared
//! `(type, alias)` pair, in the order the query declared them. Mappers consume
//! those fragments in that same order. The order is a contract between the
//! query layer and the mapper: the cursor does not reorder or search ahead.
//!
//! # Example
//!
//! ```text
//! Declared:  company, emails, phones
//! Fragments: [Company#1, Email("a@x"), <absent phones>]
//!
//! take_first::<Company>()          -> Some(Company#1)
//! take_next::<Phone>(Some("phones")) -> None   (next slot is "emails", not consumed)
//! take_next::<Email>(Some("emails")) -> Some(Email("a@x"))
//! take_next::<Phone>(Some("phones")) -> None   (absent slot, consumed)
//! ```

use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;
use std::rc::Rc;

use super::errors::MapperError;
use super::EntityRef;

/// Payload of a single fragment slot
enum Payload {
    /// Freshly materialized value of the declared type
    Value(Box<dyn Any>),
    /// Canonical `EntityRef<T>` substituted by the deduplicating mapper
    Shared(Box<dyn Any>),
    /// Declared slot whose columns were all NULL (left join with no match)
    Absent,
    /// Already handed out to a mapper
    Consumed,
}

/// One entity-shaped value extracted from a result row, not yet linked to
/// its relationships.
pub struct Fragment {
    alias: Option<String>,
    type_id: TypeId,
    type_name: &'static str,
    payload: Payload,
}

impl Fragment {
    /// Fragment without a declared alias; matched by type only.
    pub fn new<T: 'static>(value: T) -> Self {
        Fragment {
            alias: None,
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            payload: Payload::Value(Box::new(value)),
        }
    }

    pub fn aliased<T: 'static>(alias: impl Into<String>, value: T) -> Self {
        Fragment {
            alias: Some(alias.into()),
            ..Fragment::new(value)
        }
    }

    /// Placeholder for a declared slot that produced no value in this row.
    pub fn absent<T: 'static>(alias: Option<String>) -> Self {
        Fragment {
            alias,
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            payload: Payload::Absent,
        }
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is_absent(&self) -> bool {
        matches!(self.payload, Payload::Absent)
    }

    fn holds<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl std::fmt::Debug for Fragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.payload {
            Payload::Value(_) => "value",
            Payload::Shared(_) => "shared",
            Payload::Absent => "absent",
            Payload::Consumed => "consumed",
        };
        f.debug_struct("Fragment")
            .field("alias", &self.alias)
            .field("type_name", &self.type_name)
            .field("state", &state)
            .finish()
    }
}

/// Single-use cursor over the fragments of one row
///
/// Consuming past the end yields `Ok(None)`: a left join may legitimately
/// produce no child fragment.
#[derive(Debug)]
pub struct RowCursor {
    fragments: Vec<Fragment>,
    position: usize,
}

impl RowCursor {
    pub fn new(fragments: Vec<Fragment>) -> Self {
        RowCursor {
            fragments,
            position: 0,
        }
    }

    /// Total number of fragment slots in the row
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Number of slots not yet consumed
    pub fn remaining(&self) -> usize {
        self.fragments.len() - self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Take the first unconsumed fragment as a shared entity handle.
    ///
    /// Fresh values are wrapped into a new handle; a canonical handle placed
    /// by [`RowCursor::replace_first`] is returned as-is so the caller mutates
    /// the canonical instance.
    pub fn take_first<T: 'static>(&mut self) -> Result<Option<EntityRef<T>>, MapperError> {
        let position = self.position;
        let Some(fragment) = self.fragments.get_mut(position) else {
            return Ok(None);
        };

        if fragment.is_absent() {
            self.position += 1;
            return Ok(None);
        }
        if !fragment.holds::<T>() {
            return Err(mismatch::<T>(position, fragment.type_name));
        }

        let found = fragment.type_name;
        let payload = std::mem::replace(&mut fragment.payload, Payload::Consumed);
        self.position += 1;
        log::trace!("RowCursor: took root `{}` at {}", found, position);

        match payload {
            Payload::Value(value) => value
                .downcast::<T>()
                .map(|value| Some(Rc::new(RefCell::new(*value))))
                .map_err(|_| mismatch::<T>(position, found)),
            Payload::Shared(handle) => handle
                .downcast::<EntityRef<T>>()
                .map(|handle| Some(*handle))
                .map_err(|_| mismatch::<T>(position, found)),
            Payload::Absent | Payload::Consumed => Ok(None),
        }
    }

    /// Take the next unconsumed fragment if it belongs to `alias`.
    ///
    /// With `alias = None` the fragment is matched by type instead. A
    /// fragment that does not match is left in place and `Ok(None)` is
    /// returned; a matching absent slot is consumed and also yields `Ok(None)`.
    pub fn take_next<T: Clone + 'static>(
        &mut self,
        alias: Option<&str>,
    ) -> Result<Option<T>, MapperError> {
        let position = self.position;
        let Some(fragment) = self.fragments.get_mut(position) else {
            return Ok(None);
        };

        let matches = match alias {
            Some(alias) => fragment.alias.as_deref() == Some(alias),
            None => fragment.holds::<T>(),
        };
        if !matches {
            log::trace!(
                "RowCursor: next slot at {} is {:?}, not {:?}",
                position,
                fragment.alias,
                alias
            );
            return Ok(None);
        }

        if fragment.is_absent() {
            self.position += 1;
            return Ok(None);
        }
        if !fragment.holds::<T>() {
            return Err(mismatch::<T>(position, fragment.type_name));
        }

        let found = fragment.type_name;
        let payload = std::mem::replace(&mut fragment.payload, Payload::Consumed);
        self.position += 1;

        match payload {
            Payload::Value(value) => value
                .downcast::<T>()
                .map(|value| Some(*value))
                .map_err(|_| mismatch::<T>(position, found)),
            Payload::Shared(handle) => handle
                .downcast::<EntityRef<T>>()
                .map(|handle| Some(handle.borrow().clone()))
                .map_err(|_| mismatch::<T>(position, found)),
            Payload::Absent | Payload::Consumed => Ok(None),
        }
    }

    /// Inspect the first unconsumed fragment as `T` without consuming it.
    ///
    /// Returns `None` when the cursor is exhausted, the slot is absent, or the
    /// slot holds a different type.
    pub fn peek_first<T: 'static, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let fragment = self.fragments.get(self.position)?;
        match &fragment.payload {
            Payload::Value(value) => value.downcast_ref::<T>().map(f),
            Payload::Shared(handle) => handle
                .downcast_ref::<EntityRef<T>>()
                .map(|handle| f(&handle.borrow())),
            Payload::Absent | Payload::Consumed => None,
        }
    }

    /// Replace the first unconsumed fragment with a canonical instance.
    ///
    /// The slot keeps its alias. Does nothing on an exhausted cursor.
    pub fn replace_first<T: 'static>(&mut self, canonical: EntityRef<T>) {
        if let Some(fragment) = self.fragments.get_mut(self.position) {
            fragment.type_id = TypeId::of::<T>();
            fragment.type_name = type_name::<T>();
            fragment.payload = Payload::Shared(Box::new(canonical));
        }
    }
}

fn mismatch<T>(position: usize, found: &'static str) -> MapperError {
    MapperError::TypeMismatch {
        position,
        expected: type_name::<T>(),
        found,
    }
}
