//! Paper resolution, researcher enrichment and the publication cache.

pub mod authors;
pub mod batch;
pub mod guard;
pub mod import;
pub mod locks;
pub mod merge;
pub mod paper;
pub mod profile;
pub mod publications;
pub mod quality;
pub mod researcher;

pub use batch::BatchStats;
pub use guard::{GuardDecision, apply_author_guard, guard_decision};
pub use import::{ExternalPaperImporter, ImportOutcome};
pub use locks::EntityLocks;
pub use merge::{is_generic_scholar_url, is_placeholder_abstract, merge_into_paper};
pub use paper::{PaperResolution, PaperResolver, RejectKind, RejectReason};
pub use profile::{ProfileFacts, ProfileTextGenerator, template_profile_text};
pub use publications::{PublicationCache, ResearcherPublications};
pub use quality::quality_score;
pub use researcher::{
    ProfileSources, ResearcherEnricher, ResearcherEnrichment, ResearcherPatch, SourceProfiles,
    extract_interests, merge_profiles,
};

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}
