use chrono::Utc;
use scholarhub_core::{EnrichmentStore, PaperEntity};
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::NormalizedPaper;

const PLACEHOLDER_ABSTRACT_PREFIX: &str = "This paper examines";
const MIN_ABSTRACT_CHARS: usize = 50;
const MIN_STORED_KEYWORDS: usize = 3;

/// Stand-in abstracts written at import time, before any source matched.
pub fn is_placeholder_abstract(text: &str) -> bool {
    text.trim_start().starts_with(PLACEHOLDER_ABSTRACT_PREFIX)
}

/// Google Scholar links carry no bibliographic value once a real record is known.
pub fn is_generic_scholar_url(url: &str) -> bool {
    url.contains("scholar.google.")
}

fn should_replace_abstract(current: Option<&str>, incoming: &str) -> bool {
    if incoming.trim().chars().count() <= MIN_ABSTRACT_CHARS {
        return false;
    }
    current.is_none_or(|c| c.trim().is_empty() || is_placeholder_abstract(c))
}

/// Merges a matched candidate into the stored paper.
///
/// Returns the names of the fields that changed. Identifiers already held by
/// another paper are skipped with a warning.
pub fn merge_into_paper(
    store: &dyn EnrichmentStore,
    paper: &mut PaperEntity,
    incoming: &NormalizedPaper,
) -> Result<Vec<String>> {
    let mut updated = Vec::new();

    if paper.doi.is_none() {
        if let Some(doi) = incoming.doi.as_deref() {
            match store.find_paper_by_doi(doi)? {
                Some(other) if other.id != paper.id => {
                    warn!(doi, paper = %paper.id, other = %other.id, "DOI already held by another paper");
                }
                _ => {
                    paper.doi = Some(doi.to_string());
                    updated.push("doi".to_string());
                }
            }
        }
    }

    if let Some(text) = incoming.abstract_text.as_deref() {
        if should_replace_abstract(paper.abstract_text.as_deref(), text) {
            paper.abstract_text = Some(text.trim().to_string());
            updated.push("abstract".to_string());
        }
    }

    if paper.publication_date.is_none() && incoming.publication_date.is_some() {
        paper.publication_date = incoming.publication_date;
        updated.push("publication_date".to_string());
    }

    if paper.venue.is_none() {
        if let Some(venue) = &incoming.venue {
            paper.venue = Some(venue.clone());
            updated.push("venue".to_string());
        }
    }

    if paper.keywords.len() < MIN_STORED_KEYWORDS && !incoming.keywords.is_empty() {
        paper.keywords = incoming.keywords.clone();
        updated.push("keywords".to_string());
    }

    if let Some(count) = incoming.citation_count {
        if paper.citation_count != count {
            paper.citation_count = count;
            updated.push("citation_count".to_string());
        }
    }

    if let Some(url) = &incoming.url {
        let replace = paper
            .url
            .as_deref()
            .is_none_or(|u| u.trim().is_empty() || is_generic_scholar_url(u));
        if replace && paper.url.as_deref() != Some(url.as_str()) {
            paper.url = Some(url.clone());
            updated.push("url".to_string());
        }
    }

    if let Some(source_id) = incoming.source_id.as_deref() {
        let claimed = store.paper_external_id_claimed(incoming.source, source_id, &paper.id)?;
        if let Some(slot) = paper.external_ids.slot_mut(incoming.source) {
            if slot.is_none() {
                if claimed {
                    warn!(
                        source = %incoming.source,
                        id = source_id,
                        paper = %paper.id,
                        "external id already claimed by another paper"
                    );
                } else {
                    *slot = Some(source_id.to_string());
                    updated.push(format!("{}_id", incoming.source.as_str()));
                }
            }
        }
    }

    if !incoming.raw.is_null() {
        paper
            .raw_data
            .insert(incoming.source.as_str().to_string(), incoming.raw.clone());
    }

    if !updated.is_empty() {
        paper.updated_at = Utc::now();
    }
    debug!(paper = %paper.id, source = %incoming.source, ?updated, "merged candidate");
    Ok(updated)
}
