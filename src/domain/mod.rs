//! Representative domain: companies with email and phone relations.

pub mod company;

pub use company::{company_shape, Company, CompanyMapper, Email, Phone, EMAILS, PHONES, ROOT};
