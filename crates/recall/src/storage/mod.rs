pub mod filter;
pub mod lance;

pub use filter::{DateRange, RecordFilter};
pub use lance::LanceStore;
