use serde::{Deserialize, Serialize};

use crate::error::{Result, ScienceError};

const DOI_PREFIXES: &[&str] = &[
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi:",
];

/// A DOI in canonical lower-case form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Doi(String);

impl Doi {
    /// Accepts bare DOIs, `doi:` tags and doi.org links.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let lowered = trimmed.to_lowercase();
        let bare = DOI_PREFIXES
            .iter()
            .find_map(|p| lowered.strip_prefix(p))
            .unwrap_or(&lowered)
            .trim();

        let valid = bare.starts_with("10.")
            && bare
                .split_once('/')
                .is_some_and(|(_, suffix)| !suffix.trim().is_empty());
        if !valid {
            return Err(ScienceError::InvalidDoi(trimmed.to_string()));
        }
        Ok(Self(bare.to_string()))
    }

    /// Lenient variant for source payloads: invalid input yields `None`.
    pub fn normalize(input: &str) -> Option<String> {
        Self::parse(input).ok().map(|d| d.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn url(&self) -> String {
        format!("https://doi.org/{}", self.0)
    }
}

impl std::fmt::Display for Doi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_forms() {
        for input in [
            "10.1038/nature14539",
            "https://doi.org/10.1038/nature14539",
            "http://dx.doi.org/10.1038/NATURE14539",
            "DOI: 10.1038/nature14539",
            "  doi:10.1038/nature14539 ",
        ] {
            assert_eq!(Doi::parse(input).unwrap().as_str(), "10.1038/nature14539", "{input}");
        }
    }

    #[test]
    fn url_form() {
        let doi = Doi::parse("10.1145/3290605.3300233").unwrap();
        assert_eq!(doi.url(), "https://doi.org/10.1145/3290605.3300233");
    }

    #[test]
    fn rejects_malformed() {
        for input in ["", "not-a-doi", "10.1000", "10.1000/", "11.1000/x"] {
            assert!(Doi::parse(input).is_err(), "{input}");
        }
        assert_eq!(Doi::normalize("garbage"), None);
    }
}
