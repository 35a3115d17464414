pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod services;

pub use errors::IndexError;
pub use models::issue::Issue;
pub use models::query::{IssueQuery, IssueQueryBuilder};
pub use services::index::{IndexBatch, IssueIndex, ReportScope, SearchResult, SecurityReport, Snapshot};
