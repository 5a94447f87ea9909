use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Facts a profile text is written from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFacts {
    pub name: String,
    pub affiliation: Option<String>,
    pub h_index: u32,
    pub paper_count: u32,
    /// At most five, most relevant first.
    pub interests: Vec<String>,
}

/// Writes a short researcher profile. Best-effort: `Ok(None)` means "use the template".
#[async_trait]
pub trait ProfileTextGenerator: Send + Sync {
    async fn generate(&self, facts: &ProfileFacts) -> Result<Option<String>>;
}

/// Deterministic fallback used when no generator is configured or it declines.
pub fn template_profile_text(facts: &ProfileFacts) -> String {
    let mut text = format!("{} is a researcher", facts.name);
    if let Some(aff) = facts.affiliation.as_deref().filter(|a| !a.trim().is_empty()) {
        text.push_str(&format!(" at {aff}"));
    }
    if !facts.interests.is_empty() {
        let top: Vec<&str> = facts.interests.iter().take(3).map(String::as_str).collect();
        text.push_str(&format!(" specializing in {}", top.join(", ")));
    }
    text.push('.');
    if facts.paper_count > 0 {
        text.push_str(&format!(" They have published {} papers", facts.paper_count));
        if facts.h_index > 0 {
            text.push_str(&format!(" with an h-index of {}", facts.h_index));
        }
        text.push('.');
    }
    text
}
