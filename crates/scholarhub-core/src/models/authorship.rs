use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const FIRST_AUTHOR: &str = "First Author";
pub const CO_AUTHOR: &str = "Co-author";

/// Link between a paper and one of its researchers. Unique per pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorship {
    pub id: Uuid,
    pub paper_id: Uuid,
    pub researcher_id: Uuid,
    pub author_position: String,
    pub contribution_role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Authorship {
    /// Builds the authorship for the author at `index` in the paper's author list.
    pub fn for_position(paper_id: Uuid, researcher_id: Uuid, index: usize, paper_title: &str) -> Self {
        let position = if index == 0 { FIRST_AUTHOR } else { CO_AUTHOR };
        let short_title: String = paper_title.chars().take(100).collect();
        Self {
            id: Uuid::now_v7(),
            paper_id,
            researcher_id,
            author_position: position.to_string(),
            contribution_role: "Research and analysis".to_string(),
            summary: Some(format!("Contributed to {short_title}...")),
            created_at: Utc::now(),
        }
    }
}
