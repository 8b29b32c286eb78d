//! Query building for history search and listing
//!
//! Raw caller parameters are normalized into [`SearchQuery`] and [`ListQuery`] values that the
//! conversation store executes.

pub mod filter;
pub mod query;

pub use filter::{RetrievalFilter, normalize_tags};
pub use query::{ListQuery, RawListParams, RawSearchParams, SearchQuery};
