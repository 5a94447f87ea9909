pub mod database;
pub mod repositories;
pub mod store;

pub use database::{Database, open_database, open_in_memory};
pub use repositories::PaperFilter;
pub use store::{EnrichmentStore, PaperEnrichmentUnit};
