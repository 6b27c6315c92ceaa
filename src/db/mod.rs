mod repository;
mod schema;

pub use repository::{PendingCounts, Repository};
