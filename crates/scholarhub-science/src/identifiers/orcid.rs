use serde::{Deserialize, Serialize};

use crate::error::{Result, ScienceError};

/// An ORCID iD in `NNNN-NNNN-NNNN-NNNX` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Orcid(String);

impl Orcid {
    /// Accepts a bare iD or an `orcid.org` profile link.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let bare = trimmed
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_start_matches("www.")
            .trim_start_matches("orcid.org/")
            .trim_end_matches('/')
            .to_uppercase();

        if !is_well_formed(&bare) {
            return Err(ScienceError::InvalidOrcid(trimmed.to_string()));
        }
        Ok(Self(bare))
    }

    /// Lenient variant for source payloads.
    pub fn normalize(input: &str) -> Option<String> {
        Self::parse(input).ok().map(|o| o.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_well_formed(id: &str) -> bool {
    let groups: Vec<&str> = id.split('-').collect();
    if groups.len() != 4 || groups.iter().any(|g| g.len() != 4) {
        return false;
    }
    groups.iter().enumerate().all(|(i, g)| {
        g.chars().enumerate().all(|(j, c)| {
            c.is_ascii_digit() || (i == 3 && j == 3 && c == 'X')
        })
    })
}

impl std::fmt::Display for Orcid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
