//! Author-list safety guard.
//!
//! Consortium papers with hundreds of authors would flood the researcher
//! table, so long lists are either cut down to the first author or the whole
//! candidate is refused.

use tracing::warn;

use crate::types::NormalizedPaper;

/// Candidates with more authors than this are rejected outright.
pub const MAX_AUTHORS: usize = 50;

/// Lists longer than this keep only their first author.
pub const FULL_LIST_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Accept,
    KeepFirstAuthor { original: usize },
    Reject { count: usize },
}

pub fn guard_decision(author_count: usize) -> GuardDecision {
    if author_count > MAX_AUTHORS {
        GuardDecision::Reject {
            count: author_count,
        }
    } else if author_count > FULL_LIST_LIMIT {
        GuardDecision::KeepFirstAuthor {
            original: author_count,
        }
    } else {
        GuardDecision::Accept
    }
}

/// Applies the guard to a candidate, truncating its author list in place.
pub fn apply_author_guard(candidate: &mut NormalizedPaper) -> GuardDecision {
    let decision = guard_decision(candidate.authors.len());
    match decision {
        GuardDecision::Reject { count } => {
            warn!(
                source = %candidate.source,
                title = %candidate.title,
                count,
                "candidate rejected: too many authors"
            );
        }
        GuardDecision::KeepFirstAuthor { original } => {
            candidate.authors.truncate(1);
            warn!(
                source = %candidate.source,
                title = %candidate.title,
                original,
                "long author list truncated to first author"
            );
        }
        GuardDecision::Accept => {}
    }
    decision
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NormalizedAuthor;
    use scholarhub_core::DataSource;

    fn candidate(authors: usize) -> NormalizedPaper {
        let mut paper = NormalizedPaper::new(DataSource::OpenAlex, "Big collaboration");
        paper.authors = (0..authors)
            .map(|i| NormalizedAuthor::new(format!("Author {i}"), i))
            .collect();
        paper
    }

    #[test]
    fn thresholds() {
        assert_eq!(guard_decision(0), GuardDecision::Accept);
        assert_eq!(guard_decision(10), GuardDecision::Accept);
        assert_eq!(guard_decision(11), GuardDecision::KeepFirstAuthor { original: 11 });
        assert_eq!(guard_decision(50), GuardDecision::KeepFirstAuthor { original: 50 });
        assert_eq!(guard_decision(51), GuardDecision::Reject { count: 51 });
    }

    #[test]
    fn truncation_keeps_first_author() {
        let mut paper = candidate(30);
        apply_author_guard(&mut paper);
        assert_eq!(paper.authors.len(), 1);
        assert_eq!(paper.authors[0].name, "Author 0");
    }

    #[test]
    fn rejection_leaves_list_alone() {
        let mut paper = candidate(75);
        assert_eq!(apply_author_guard(&mut paper), GuardDecision::Reject { count: 75 });
        assert_eq!(paper.authors.len(), 75);
    }
}
