//! In-process fakes for the source traits.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use scholarhub_core::DataSource;

use crate::enrichment::profile::{ProfileFacts, ProfileTextGenerator};
use crate::error::{Result, ScienceError};
use crate::sources::{AuthorProfileSource, AuthorWorksSource, PaperSource};
use crate::types::{AuthorProfile, AuthorQuery, AuthorWork, NormalizedAuthor, NormalizedPaper};

fn unavailable(name: &str) -> ScienceError {
    ScienceError::SourceUnavailable(format!("{name} is down"))
}

pub fn candidate(source: DataSource, title: &str, authors: &[&str]) -> NormalizedPaper {
    let mut paper = NormalizedPaper::new(source, title);
    paper.authors = authors
        .iter()
        .enumerate()
        .map(|(i, name)| NormalizedAuthor::new(*name, i))
        .collect();
    paper
}

pub struct FakePaperSource {
    source: DataSource,
    by_id: HashMap<String, NormalizedPaper>,
    by_doi: HashMap<String, NormalizedPaper>,
    by_title: Option<NormalizedPaper>,
    supports_doi: bool,
    validates_title: bool,
    failing: bool,
    calls: AtomicUsize,
}

impl FakePaperSource {
    pub fn new(source: DataSource) -> Self {
        Self {
            source,
            by_id: HashMap::new(),
            by_doi: HashMap::new(),
            by_title: None,
            supports_doi: true,
            validates_title: false,
            failing: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_id(mut self, id: &str, paper: NormalizedPaper) -> Self {
        self.by_id.insert(id.to_string(), paper);
        self
    }

    pub fn with_doi(mut self, doi: &str, paper: NormalizedPaper) -> Self {
        self.by_doi.insert(doi.to_string(), paper);
        self
    }

    pub fn with_title_hit(mut self, paper: NormalizedPaper) -> Self {
        self.by_title = Some(paper);
        self
    }

    pub fn without_doi_lookup(mut self) -> Self {
        self.supports_doi = false;
        self
    }

    pub fn validating_titles(mut self) -> Self {
        self.validates_title = true;
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(unavailable(self.source.label()));
        }
        Ok(())
    }
}

#[async_trait]
impl PaperSource for FakePaperSource {
    fn name(&self) -> DataSource {
        self.source
    }

    async fn lookup_by_external_id(&self, id: &str) -> Result<Option<NormalizedPaper>> {
        self.tick()?;
        Ok(self.by_id.get(id).cloned())
    }

    async fn lookup_by_doi(&self, doi: &str) -> Result<Option<NormalizedPaper>> {
        if !self.supports_doi {
            return Err(ScienceError::Unsupported {
                source_name: self.source.label(),
                operation: "lookup by DOI",
            });
        }
        self.tick()?;
        Ok(self.by_doi.get(doi).cloned())
    }

    async fn search_by_title(&self, _title: &str) -> Result<Option<NormalizedPaper>> {
        self.tick()?;
        Ok(self.by_title.clone())
    }

    fn validates_title_internally(&self) -> bool {
        self.validates_title
    }
}

pub struct FakeProfileSource {
    source: DataSource,
    by_id: HashMap<String, AuthorProfile>,
    by_orcid: HashMap<String, AuthorProfile>,
    search_hit: Option<AuthorProfile>,
    failing: bool,
    calls: AtomicUsize,
    searches: Mutex<Vec<AuthorQuery>>,
}

impl FakeProfileSource {
    pub fn new(source: DataSource) -> Self {
        Self {
            source,
            by_id: HashMap::new(),
            by_orcid: HashMap::new(),
            search_hit: None,
            failing: false,
            calls: AtomicUsize::new(0),
            searches: Mutex::new(Vec::new()),
        }
    }

    pub fn with_id(mut self, id: &str, profile: AuthorProfile) -> Self {
        self.by_id.insert(id.to_string(), profile);
        self
    }

    pub fn with_orcid(mut self, orcid: &str, profile: AuthorProfile) -> Self {
        self.by_orcid.insert(orcid.to_string(), profile);
        self
    }

    pub fn with_search_hit(mut self, profile: AuthorProfile) -> Self {
        self.search_hit = Some(profile);
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> Vec<AuthorQuery> {
        self.searches.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn tick(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(unavailable(self.source.label()));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthorProfileSource for FakeProfileSource {
    fn name(&self) -> DataSource {
        self.source
    }

    async fn fetch_author_profile(&self, author_id: &str) -> Result<Option<AuthorProfile>> {
        self.tick()?;
        Ok(self.by_id.get(author_id).cloned())
    }

    async fn fetch_author_by_orcid(&self, orcid: &str) -> Result<Option<AuthorProfile>> {
        self.tick()?;
        Ok(self.by_orcid.get(orcid).cloned())
    }

    async fn search_author(&self, query: &AuthorQuery) -> Result<Option<AuthorProfile>> {
        self.tick()?;
        if let Ok(mut searches) = self.searches.lock() {
            searches.push(query.clone());
        }
        Ok(self.search_hit.clone())
    }
}

pub struct FakeWorks {
    works: Vec<AuthorWork>,
    failing: bool,
    calls: AtomicUsize,
}

impl FakeWorks {
    pub fn new(works: Vec<AuthorWork>) -> Self {
        Self {
            works,
            failing: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthorWorksSource for FakeWorks {
    async fn fetch_author_works(&self, _author_id: &str, limit: u32) -> Result<Vec<AuthorWork>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(unavailable("works"));
        }
        Ok(self.works.iter().take(limit as usize).cloned().collect())
    }
}

/// Always returns the same text, or fails when built with `failing`.
pub struct FixedProfileText {
    text: Option<String>,
}

impl FixedProfileText {
    pub fn new(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self { text: None }
    }
}

#[async_trait]
impl ProfileTextGenerator for FixedProfileText {
    async fn generate(&self, _facts: &ProfileFacts) -> Result<Option<String>> {
        match &self.text {
            Some(text) => Ok(Some(text.clone())),
            None => Err(ScienceError::ProfileText("model offline".to_string())),
        }
    }
}
