mod authorship_repository;
mod columns;
mod paper_repository;
mod publication_repository;
mod researcher_repository;

pub use authorship_repository::SqliteAuthorshipRepository;
pub use paper_repository::{PaperFilter, SqlitePaperRepository};
pub use publication_repository::SqlitePublicationRepository;
pub use researcher_repository::SqliteResearcherRepository;

use crate::error::Result;

pub trait Repository {
    type Entity;
    type Id;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>>;
    fn save(&self, entity: &Self::Entity) -> Result<()>;
}
