use std::collections::BTreeMap;

use serde::Serialize;

use super::paper::PaperResolution;
use super::researcher::ResearcherEnrichment;

const MAX_REPORTED_FAILURES: usize = 5;

/// Aggregate counters for a bulk paper or researcher run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub total: usize,
    pub succeeded: usize,
    /// Researchers actually re-enriched, as opposed to skipped as fresh.
    pub enriched: usize,
    pub skipped: usize,
    pub failed: usize,
    pub by_source: BTreeMap<String, usize>,
    pub researchers_created: usize,
    pub researchers_updated: usize,
    pub authorships_created: usize,
    pub failures: Vec<String>,
}

impl BatchStats {
    fn note_failure(&mut self, message: String) {
        self.failed += 1;
        if self.failures.len() < MAX_REPORTED_FAILURES {
            self.failures.push(message);
        }
    }

    pub fn record_paper(&mut self, r: &PaperResolution) {
        self.total += 1;
        if r.skipped {
            self.skipped += 1;
            return;
        }
        if r.matched {
            self.succeeded += 1;
            if let Some(source) = r.source {
                *self.by_source.entry(source.as_str().to_string()).or_default() += 1;
            }
        } else {
            let reason = r
                .failure_reason
                .clone()
                .or_else(|| r.errors.first().cloned())
                .unwrap_or_else(|| "unknown failure".to_string());
            self.note_failure(format!("{}: {reason}", r.paper_id));
        }
        self.researchers_created += r.researchers_created;
        self.researchers_updated += r.researchers_updated;
        self.authorships_created += r.authorships_created;
    }

    pub fn record_researcher(&mut self, r: &ResearcherEnrichment) {
        self.total += 1;
        if !r.success {
            let reason = r.errors.first().cloned().unwrap_or_default();
            self.note_failure(format!("{}: {reason}", r.researcher_id));
            return;
        }
        self.succeeded += 1;
        if r.enriched {
            self.enriched += 1;
            for source in &r.sources_used {
                *self.by_source.entry(source.as_str().to_string()).or_default() += 1;
            }
        } else {
            self.skipped += 1;
        }
    }
}
