pub mod doi;
pub mod orcid;

pub use doi::Doi;
pub use orcid::Orcid;
