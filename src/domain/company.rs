//! Company entity and its composite mapper
//!
//! The query selects `company`, then `emails`, then `phones`. A company with
//! two emails and three phones arrives as six rows, so every email is
//! redelivered once per phone and vice versa.

use serde::{Deserialize, Serialize};

use crate::entity_mapper::{
    attach_unique, DeduplicatingMapper, EntityMapper, MapperError, RowCursor, RowOutcome,
};
use crate::row_shape::RowShape;

/// Alias of the root company fragment
pub const ROOT: &str = "company";
/// Alias of the joined email fragment
pub const EMAILS: &str = "emails";
/// Alias of the joined phone fragment
pub const PHONES: &str = "phones";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Company {
    /// None when the query did not select the identity column
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub emails: Vec<Email>,
    #[serde(default)]
    pub phones: Vec<Phone>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Email {
    #[serde(default)]
    pub id: i64,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Phone {
    #[serde(default)]
    pub id: i64,
    pub number: String,
}

impl Company {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Company {
            id: Some(id),
            name: name.into(),
            ..Default::default()
        }
    }
}

impl Email {
    pub fn new(id: i64, address: impl Into<String>) -> Self {
        Email {
            id,
            address: address.into(),
        }
    }
}

impl Phone {
    pub fn new(id: i64, number: impl Into<String>) -> Self {
        Phone {
            id,
            number: number.into(),
        }
    }
}

/// Shape matching the consumption order of [`CompanyMapper`]
pub fn company_shape(shape: RowShape) -> Result<RowShape, MapperError> {
    shape
        .declare::<Company>(ROOT)?
        .declare::<Email>(EMAILS)?
        .declare::<Phone>(PHONES)
}

/// Attaches one email and one phone per row to the company it holds
#[derive(Debug, Clone, Copy, Default)]
pub struct CompanyMapper;

impl CompanyMapper {
    /// Wrap in a deduplicating mapper keyed by company id.
    pub fn deduplicating() -> DeduplicatingMapper<Company, i64, CompanyMapper> {
        DeduplicatingMapper::new(CompanyMapper, |company: &Company| company.id)
    }
}

impl EntityMapper<Company> for CompanyMapper {
    fn map(&mut self, cursor: &mut RowCursor) -> Result<RowOutcome<Company>, MapperError> {
        // Order must match company_shape()
        let company = cursor.take_first::<Company>()?;
        let email = cursor.take_next::<Email>(Some(EMAILS))?;
        let phone = cursor.take_next::<Phone>(Some(PHONES))?;

        let Some(company) = company else {
            return Ok(RowOutcome::Empty);
        };

        {
            let mut entity = company.borrow_mut();
            if let Some(email) = email {
                attach_unique(&mut entity.emails, email, |e| e.address.clone());
            }
            if let Some(phone) = phone {
                attach_unique(&mut entity.phones, phone, |p| p.number.clone());
            }
        }

        Ok(RowOutcome::Entity(company))
    }
}
