//! Query, aggregation and reporting services over the in-memory issue index.

pub mod facets;
pub mod filter;
pub mod histogram;
pub mod index;
pub mod loader;
pub mod ordering;
pub mod security_report;
pub mod security_standards;

#[cfg(test)]
pub mod test_support;
