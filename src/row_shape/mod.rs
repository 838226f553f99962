//! Row shape: the declared fragment layout of a join query
//!
//! A [`RowShape`] lists the `(type, alias)` pairs a query selects, in
//! declaration order. The first declaration is the root entity. Given a flat
//! result row whose columns are named `<alias><separator><column>`, the shape
//! splits the row into one column group per alias, deserializes each group
//! into its declared type and returns a [`RowCursor`] in declaration order.
//!
//! # Example
//!
//! ```text
//! Shape: company: Company, emails: Email, phones: Phone
//!
//! Input Row: {"company.id": 1, "company.name": "Acme",
//!             "emails.id": 10, "emails.address": "a@acme.io",
//!             "phones.id": null, "phones.number": null}
//!
//! Cursor: [Company{id: 1, ..}, Email{id: 10, ..}, <absent phones>]
//! ```
//!
//! A column group whose values are all NULL is a left join with no match and
//! becomes an absent slot, not an error.

use std::any::type_name;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::config::MapperConfig;
use crate::entity_mapper::{Fragment, MapperError, RowCursor};

type DecodeFn = fn(&str, Value) -> Result<Fragment, MapperError>;
type AbsentFn = fn(String) -> Fragment;

/// One declared `(type, alias)` pair
#[derive(Debug, Clone)]
struct Declaration {
    alias: String,
    type_name: &'static str,
    decode: DecodeFn,
    absent: AbsentFn,
}

/// Ordered fragment declarations for one query
#[derive(Debug, Clone)]
pub struct RowShape {
    declarations: Vec<Declaration>,
    separator: String,
}

impl Default for RowShape {
    fn default() -> Self {
        Self::new()
    }
}

impl RowShape {
    pub fn new() -> Self {
        RowShape {
            declarations: Vec::new(),
            separator: MapperConfig::default().column_separator,
        }
    }

    pub fn with_config(config: &MapperConfig) -> Self {
        RowShape {
            declarations: Vec::new(),
            separator: config.column_separator.clone(),
        }
    }

    /// Declare the next fragment. Declaration order is consumption order.
    pub fn declare<T>(mut self, alias: impl Into<String>) -> Result<Self, MapperError>
    where
        T: DeserializeOwned + 'static,
    {
        let alias = alias.into();
        if self.declarations.iter().any(|d| d.alias == alias) {
            return Err(MapperError::DuplicateAlias { alias });
        }
        self.declarations.push(Declaration {
            alias,
            type_name: type_name::<T>(),
            decode: decode_fragment::<T>,
            absent: absent_fragment::<T>,
        });
        Ok(self)
    }

    /// Declared aliases in consumption order
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.declarations.iter().map(|d| d.alias.as_str())
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Split a flat row into fragments, in declaration order.
    pub fn materialize(&self, row: &Map<String, Value>) -> Result<RowCursor, MapperError> {
        let mut groups: Vec<Map<String, Value>> = vec![Map::new(); self.declarations.len()];

        for (column, value) in row {
            match self.locate(column) {
                Some((index, field)) => {
                    groups[index].insert(field.to_string(), value.clone());
                }
                None => log::trace!("RowShape: ignoring undeclared column `{}`", column),
            }
        }

        let fragments = self
            .declarations
            .iter()
            .zip(groups)
            .map(|(declaration, group)| {
                if group.values().all(Value::is_null) {
                    log::trace!(
                        "RowShape: `{}` ({}) absent in this row",
                        declaration.alias,
                        declaration.type_name
                    );
                    Ok((declaration.absent)(declaration.alias.clone()))
                } else {
                    (declaration.decode)(&declaration.alias, Value::Object(group))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RowCursor::new(fragments))
    }

    /// Materialize every row of a result set, preserving row order.
    pub fn materialize_all<'a, I>(&self, rows: I) -> Result<Vec<RowCursor>, MapperError>
    where
        I: IntoIterator<Item = &'a Map<String, Value>>,
    {
        rows.into_iter().map(|row| self.materialize(row)).collect()
    }

    /// Find the declaration owning `column` and the column's field name.
    ///
    /// Aliases may contain the separator, so the column is matched against
    /// each declared `<alias><separator>` prefix. The longest alias wins.
    fn locate<'c>(&self, column: &'c str) -> Option<(usize, &'c str)> {
        let separator = self.separator.as_str();
        self.declarations
            .iter()
            .enumerate()
            .filter_map(|(index, d)| {
                column
                    .strip_prefix(d.alias.as_str())
                    .and_then(|rest| rest.strip_prefix(separator))
                    .map(|field| (index, d.alias.len(), field))
            })
            .max_by_key(|&(_, alias_len, _)| alias_len)
            .map(|(index, _, field)| (index, field))
    }
}

fn decode_fragment<T: DeserializeOwned + 'static>(
    alias: &str,
    group: Value,
) -> Result<Fragment, MapperError> {
    serde_json::from_value::<T>(group)
        .map(|value| Fragment::aliased(alias, value))
        .map_err(|source| MapperError::Decode {
            alias: alias.to_string(),
            source,
        })
}

fn absent_fragment<T: 'static>(alias: String) -> Fragment {
    Fragment::absent::<T>(Some(alias))
}
