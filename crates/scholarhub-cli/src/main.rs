use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use scholarhub_core::{
    AppConfig, DataSource, Database, EnrichmentStore, ExitCode, ImportStatus, PaperEntity,
    PaperFilter, ResearcherEntity,
};
use scholarhub_science::enrichment::ExternalPaperImporter;
use scholarhub_science::identifiers::{Doi, Orcid};
use scholarhub_science::sources::{OrcidSource, SemanticScholarSource};
use scholarhub_science::{EnrichmentHooks, PaperResolver, ResearcherEnricher, ScienceConfig};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "scholarhub",
    about = "Resolve papers and enrich researcher profiles from bibliographic sources",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format (for scripts).
    /// Also enabled by setting SCHOLARHUB_JSON=1.
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Operations on a single paper.
    Paper {
        #[command(subcommand)]
        action: PaperAction,
    },

    /// Operations on a single researcher.
    Researcher {
        #[command(subcommand)]
        action: ResearcherAction,
    },

    /// Bulk enrichment runs.
    Enrich {
        #[command(subcommand)]
        action: EnrichAction,
    },

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show version information.
    Version,
}

// ─── Paper Actions ──────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum PaperAction {
    /// Add a paper; auto-enrichment runs unless disabled in config.
    Add {
        title: String,
        #[arg(long)]
        doi: Option<String>,
        #[arg(long)]
        venue: Option<String>,
    },
    /// Get a paper with its authorships.
    Get { id: String },
    /// Run the source cascade for one paper.
    Enrich {
        id: String,
        /// Re-run even when the paper was already resolved.
        #[arg(long)]
        force: bool,
    },
}

// ─── Researcher Actions ─────────────────────────────────────────────────────

#[derive(Subcommand)]
enum ResearcherAction {
    /// Add a researcher; auto-enrichment runs when an ORCID is given.
    Add {
        name: String,
        #[arg(long)]
        orcid: Option<String>,
        #[arg(long)]
        affiliation: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Get a researcher with their stored papers.
    Get { id: String },
    /// Merge profiles from Semantic Scholar, ORCID and OpenAlex.
    Enrich {
        id: String,
        /// Ignore the freshness window.
        #[arg(long)]
        force: bool,
    },
    /// Stored papers plus the cached external work list.
    Publications {
        id: String,
        /// Refetch the external list even when the cache is fresh.
        #[arg(long)]
        refresh: bool,
    },
    /// Import one entry of the external work list as a stored paper.
    ImportPaper {
        id: String,
        /// Semantic Scholar paper id.
        paper_id: String,
    },
    /// Search the ORCID registry by name.
    FindOrcid {
        name: String,
        #[arg(long)]
        affiliation: Option<String>,
    },
}

// ─── Enrich Actions ─────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum EnrichAction {
    /// Resolve stored papers against the external sources.
    Papers {
        #[arg(long)]
        limit: Option<usize>,
        /// Only papers whose last attempt failed.
        #[arg(long)]
        retry_failed: bool,
        /// Leave already-resolved papers alone.
        #[arg(long)]
        skip_existing: bool,
    },
    /// Enrich stored researcher profiles.
    Researchers {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        force: bool,
    },
}

// ─── Config Actions ─────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum ConfigAction {
    /// Show effective config values.
    List,
    /// Print the config file path.
    Path,
}

// ─── Services ───────────────────────────────────────────────────────────────

/// Store and pipeline components wired from config.
struct Services {
    db: Arc<Database>,
    science: ScienceConfig,
    resolver: Arc<PaperResolver>,
    enricher: Arc<ResearcherEnricher>,
    hooks: EnrichmentHooks,
}

impl Services {
    fn build(config: &AppConfig) -> Result<Self> {
        let db = Arc::new(Database::open(&config.database_path())?);
        let store: Arc<dyn EnrichmentStore> = db.clone();
        let science = ScienceConfig::from_env_and(config);

        let resolver = Arc::new(PaperResolver::from_config(store.clone(), &science)?);
        let mut enricher = ResearcherEnricher::from_config(store, &science)?;
        if let Some(generator) = scholarhub_ai::provider_from_config(&config.ai)? {
            enricher = enricher.with_profile_text(generator);
        }
        let enricher = Arc::new(enricher);
        let hooks = EnrichmentHooks::new(resolver.clone(), enricher.clone(), &science);

        Ok(Self {
            db,
            science,
            resolver,
            enricher,
            hooks,
        })
    }

    fn importer(&self) -> Result<ExternalPaperImporter> {
        Ok(ExternalPaperImporter::new(
            self.db.clone(),
            Arc::new(SemanticScholarSource::new(&self.science)?),
            self.resolver.clone(),
        ))
    }
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let json_output = cli.json || std::env::var("SCHOLARHUB_JSON").as_deref() == Ok("1");
    let out = Output { json: json_output, start };

    let config = AppConfig::load()?;
    debug!(path = %AppConfig::config_path().display(), "config loaded");

    match cli.command {
        Commands::Paper { action } => {
            let services = Services::build(&config)?;
            run_paper(&services, action, &out).await?;
        }
        Commands::Researcher { action } => {
            let services = Services::build(&config)?;
            run_researcher(&services, action, &out).await?;
        }
        Commands::Enrich { action } => {
            let services = Services::build(&config)?;
            run_enrich(&services, action, &out).await?;
        }

        // ── Config ─────────────────────────────────────────────────────────
        Commands::Config { action } => match action {
            ConfigAction::List => {
                let kv = config_key_values(&config);
                if out.json {
                    out.ok(serde_json::to_value(&kv)?)?;
                } else {
                    for (k, v) in &kv {
                        println!("{k} = {v}");
                    }
                }
            }
            ConfigAction::Path => {
                let path = AppConfig::config_path();
                if out.json {
                    out.ok(serde_json::json!({ "path": path, "exists": path.exists() }))?;
                } else {
                    println!("{}", path.display());
                }
            }
        },

        // ── Version ────────────────────────────────────────────────────────
        Commands::Version => {
            let version = env!("CARGO_PKG_VERSION");
            if out.json {
                out.ok(serde_json::json!({ "version": version }))?;
            } else {
                println!("scholarhub v{version}");
            }
        }
    }

    Ok(())
}

// ─── Paper ──────────────────────────────────────────────────────────────────

async fn run_paper(services: &Services, action: PaperAction, out: &Output) -> Result<()> {
    let db = &services.db;
    match action {
        PaperAction::Add { title, doi, venue } => {
            if title.trim().is_empty() {
                out.fail(ExitCode::InvalidArgs, "invalid_args", "Title must not be empty");
            }
            let mut paper = PaperEntity::new(title.trim());
            if let Some(raw) = doi {
                let doi = match Doi::parse(&raw) {
                    Ok(d) => d.as_str().to_string(),
                    Err(e) => out.fail(ExitCode::InvalidArgs, "invalid_args", &e.to_string()),
                };
                if let Some(existing) = db.find_paper_by_doi(&doi)? {
                    out.fail(
                        ExitCode::Conflict,
                        "conflict",
                        &format!("DOI {doi} already belongs to paper {}", existing.id),
                    );
                }
                paper.doi = Some(doi);
            }
            paper.venue = venue.filter(|v| !v.trim().is_empty());
            db.save_paper(&paper)?;

            let resolution = services.hooks.on_paper_created(&paper).await;
            let stored = db.find_paper(&paper.id)?.unwrap_or(paper);
            if out.json {
                out.ok(serde_json::json!({ "paper": stored, "enrichment": resolution }))?;
            } else {
                println!("Added paper {} ({})", stored.title, stored.id);
                if let Some(r) = resolution {
                    print_resolution_line(&r);
                }
            }
        }

        PaperAction::Get { id } => {
            let id = out.parse_id(&id);
            let Some(paper) = db.find_paper(&id)? else {
                out.fail(ExitCode::NotFound, "not_found", &format!("Paper {id} not found"));
            };
            let authorships = db.authorships_for_paper(&id)?;
            if out.json {
                out.ok(serde_json::json!({ "paper": paper, "authorships": authorships }))?;
            } else {
                println!("{}", paper.title);
                println!("  id:       {}", paper.id);
                if let Some(doi) = &paper.doi {
                    println!("  doi:      {doi}");
                }
                if let Some(venue) = &paper.venue {
                    println!("  venue:    {venue}");
                }
                println!("  status:   {}", paper.import_status);
                if let Some(reason) = &paper.import_failure_reason {
                    println!("  reason:   {reason}");
                }
                println!("  cited by: {}", paper.citation_count);
                for a in &authorships {
                    println!("  [{}] {} ({})", a.author_position, a.researcher_id, a.contribution_role);
                }
            }
        }

        PaperAction::Enrich { id, force } => {
            let id = out.parse_id(&id);
            let resolution = services.resolver.resolve(&id, force).await;
            if out.json {
                out.ok(serde_json::to_value(&resolution)?)?;
            } else {
                print_resolution_line(&resolution);
                for change in &resolution.fields_updated {
                    println!("  updated {change}");
                }
                for e in &resolution.errors {
                    eprintln!("  error: {e}");
                }
            }
            if !resolution.matched && !resolution.skipped {
                std::process::exit(ExitCode::GeneralError as i32);
            }
        }
    }
    Ok(())
}

// ─── Researcher ─────────────────────────────────────────────────────────────

async fn run_researcher(services: &Services, action: ResearcherAction, out: &Output) -> Result<()> {
    let db = &services.db;
    match action {
        ResearcherAction::Add { name, orcid, affiliation, email } => {
            if name.trim().is_empty() {
                out.fail(ExitCode::InvalidArgs, "invalid_args", "Name must not be empty");
            }
            let mut researcher = ResearcherEntity::new(name.trim());
            if let Some(raw) = orcid {
                let orcid = match Orcid::parse(&raw) {
                    Ok(o) => o.as_str().to_string(),
                    Err(e) => out.fail(ExitCode::InvalidArgs, "invalid_args", &e.to_string()),
                };
                if let Some(existing) = db.find_researcher_by_external_id(DataSource::Orcid, &orcid)? {
                    out.fail(
                        ExitCode::Conflict,
                        "conflict",
                        &format!("ORCID {orcid} already belongs to researcher {}", existing.id),
                    );
                }
                researcher.external_ids.orcid = Some(orcid);
            }
            researcher.affiliation = affiliation.filter(|a| !a.trim().is_empty());
            researcher.email = email.filter(|e| !e.trim().is_empty());
            db.save_researcher(&researcher)?;

            let enrichment = services.hooks.on_researcher_created(&researcher).await;
            let stored = db.find_researcher(&researcher.id)?.unwrap_or(researcher);
            if out.json {
                out.ok(serde_json::json!({ "researcher": stored, "enrichment": enrichment }))?;
            } else {
                println!("Added researcher {} ({})", stored.name, stored.id);
                if let Some(e) = enrichment {
                    println!("  enriched from {:?}, quality {}", e.sources_used, e.data_quality_score);
                }
            }
        }

        ResearcherAction::Get { id } => {
            let id = out.parse_id(&id);
            let Some(researcher) = db.find_researcher(&id)? else {
                out.fail(ExitCode::NotFound, "not_found", &format!("Researcher {id} not found"));
            };
            let papers = db.papers_for_researcher(&id)?;
            if out.json {
                out.ok(serde_json::json!({ "researcher": researcher, "papers": papers }))?;
            } else {
                println!("{}", researcher.name);
                println!("  id:          {}", researcher.id);
                if let Some(aff) = &researcher.affiliation {
                    println!("  affiliation: {aff}");
                }
                if let Some(orcid) = &researcher.external_ids.orcid {
                    println!("  orcid:       {orcid}");
                }
                println!(
                    "  h-index:     {}  citations: {}  papers: {}",
                    researcher.metrics.h_index, researcher.metrics.total_citations, researcher.metrics.paper_count
                );
                if !researcher.research_interests.is_empty() {
                    println!("  interests:   {}", researcher.research_interests.join(", "));
                }
                if let Some(summary) = &researcher.summary {
                    println!("  summary:     {summary}");
                }
                println!("  quality:     {}", researcher.data_quality_score);
                for p in &papers {
                    println!("  - {}", p.title);
                }
            }
        }

        ResearcherAction::Enrich { id, force } => {
            let id = out.parse_id(&id);
            let result = services.enricher.enrich(&id, force).await;
            if out.json {
                out.ok(serde_json::to_value(&result)?)?;
            } else if !result.success {
                eprintln!("Enrichment failed: {}", result.errors.join("; "));
            } else if !result.enriched {
                println!("Researcher {id} is fresh, nothing to do (use --force).");
            } else {
                println!(
                    "Enriched {id} from {:?}: {} fields, quality {}, {} cached publications",
                    result.sources_used,
                    result.fields_updated.len(),
                    result.data_quality_score,
                    result.publications_stored,
                );
                for e in &result.errors {
                    eprintln!("  warning: {e}");
                }
            }
            if !result.success {
                std::process::exit(ExitCode::GeneralError as i32);
            }
        }

        ResearcherAction::Publications { id, refresh } => {
            let id = out.parse_id(&id);
            let Some(researcher) = db.find_researcher(&id)? else {
                out.fail(ExitCode::NotFound, "not_found", &format!("Researcher {id} not found"));
            };
            let publications = services
                .enricher
                .publications()
                .get_publications(&researcher, refresh)
                .await?;
            if out.json {
                out.ok(serde_json::to_value(&publications)?)?;
            } else {
                println!("Stored papers ({}):", publications.papers.len());
                for p in &publications.papers {
                    println!("  {}  {}", p.id, p.title);
                }
                println!("External works ({}):", publications.external.len());
                for w in &publications.external {
                    let year = w.year.map(|y| y.to_string()).unwrap_or_default();
                    println!("  {:<40}  {year:>4}  {}", w.source_paper_id, w.title);
                }
            }
        }

        ResearcherAction::ImportPaper { id, paper_id } => {
            let id = out.parse_id(&id);
            let outcome = match services.importer()?.import_external_paper(&id, &paper_id).await {
                Ok(o) => o,
                Err(scholarhub_science::ScienceError::NotFound(what)) => {
                    out.fail(ExitCode::NotFound, "not_found", &format!("Not found: {what}"))
                }
                Err(e) if e.is_source_unavailable() => {
                    out.fail(ExitCode::NetworkError, "network", &e.to_string())
                }
                Err(e) => return Err(e.into()),
            };
            if out.json {
                out.ok(serde_json::to_value(&outcome)?)?;
            } else {
                let verb = if outcome.created { "Imported" } else { "Linked" };
                println!("{verb} paper {}", outcome.paper_id);
                if let Some(r) = &outcome.resolution {
                    print_resolution_line(r);
                }
            }
        }

        ResearcherAction::FindOrcid { name, affiliation } => {
            let orcid = OrcidSource::new(&services.science)?;
            let hits = orcid.search_by_name(&name, affiliation.as_deref()).await?;
            if out.json {
                out.ok(serde_json::json!({ "items": hits, "total": hits.len() }))?;
            } else if hits.is_empty() {
                println!("No ORCID records for: {name}");
            } else {
                for hit in &hits {
                    println!("  {}  {}", hit.orcid, hit.uri.as_deref().unwrap_or_default());
                }
            }
        }
    }
    Ok(())
}

// ─── Bulk ───────────────────────────────────────────────────────────────────

async fn run_enrich(services: &Services, action: EnrichAction, out: &Output) -> Result<()> {
    let stats = match action {
        EnrichAction::Papers { limit, retry_failed, skip_existing } => {
            let filter = PaperFilter {
                statuses: if retry_failed { vec![ImportStatus::Failed] } else { Vec::new() },
                limit,
            };
            services.resolver.resolve_batch(&filter, !skip_existing).await
        }
        EnrichAction::Researchers { limit, force } => {
            services.enricher.enrich_batch(limit, force).await
        }
    };

    if out.json {
        out.ok(serde_json::to_value(&stats)?)?;
    } else {
        println!("Processed {}:", stats.total);
        println!("  succeeded: {}", stats.succeeded);
        println!("  enriched:  {}", stats.enriched);
        println!("  skipped:   {}", stats.skipped);
        println!("  failed:    {}", stats.failed);
        for (source, count) in &stats.by_source {
            println!("  via {source}: {count}");
        }
        if stats.researchers_created + stats.researchers_updated + stats.authorships_created > 0 {
            println!(
                "  researchers +{} ~{}, authorships +{}",
                stats.researchers_created, stats.researchers_updated, stats.authorships_created
            );
        }
        for failure in &stats.failures {
            eprintln!("  failure: {failure}");
        }
    }
    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

struct Output {
    json: bool,
    start: Instant,
}

impl Output {
    fn ok(&self, data: serde_json::Value) -> Result<()> {
        print_json(&serde_json::json!({
            "status": "ok",
            "data": data,
            "meta": { "duration_ms": self.start.elapsed().as_millis() }
        }))
    }

    /// Reports the error in the chosen format and exits with `code`.
    fn fail(&self, code: ExitCode, kind: &str, message: &str) -> ! {
        if self.json {
            let body = serde_json::json!({
                "status": "error",
                "error": kind,
                "message": message,
                "meta": { "duration_ms": self.start.elapsed().as_millis() }
            });
            println!("{body}");
        } else {
            eprintln!("{message}");
        }
        std::process::exit(code as i32);
    }

    fn parse_id(&self, raw: &str) -> Uuid {
        match Uuid::parse_str(raw.trim()) {
            Ok(id) => id,
            Err(_) => self.fail(ExitCode::InvalidArgs, "invalid_args", &format!("Invalid UUID: {raw}")),
        }
    }
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

fn print_resolution_line(r: &scholarhub_science::PaperResolution) {
    if r.skipped {
        println!("Paper {} already resolved (use --force).", r.paper_id);
    } else if r.matched {
        let source = r.source.map(|s| s.label()).unwrap_or("unknown");
        println!(
            "Matched via {source}: {} fields, {} new researchers, {} authorships",
            r.fields_updated.len(),
            r.researchers_created,
            r.authorships_created
        );
    } else {
        println!(
            "No match: {}",
            r.failure_reason.as_deref().unwrap_or("see errors")
        );
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env("SCHOLARHUB_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn config_key_values(config: &AppConfig) -> BTreeMap<&'static str, String> {
    let mut map = BTreeMap::new();
    map.insert("config_path", AppConfig::config_path().to_string_lossy().to_string());
    map.insert("database_path", config.database_path().to_string_lossy().to_string());
    map.insert("sources.polite_email", config.sources.polite_email.clone().unwrap_or_default());
    map.insert(
        "sources.semantic_scholar_api_key",
        if config.sources.semantic_scholar_api_key.is_some() { "<set>" } else { "" }.to_string(),
    );
    map.insert("sources.semantic_scholar_url", config.sources.semantic_scholar_url.clone());
    map.insert("sources.openalex_url", config.sources.openalex_url.clone());
    map.insert("sources.crossref_url", config.sources.crossref_url.clone());
    map.insert("sources.orcid_url", config.sources.orcid_url.clone());
    map.insert("sources.timeout_secs", config.sources.timeout_secs.to_string());
    map.insert(
        "enrichment.title_similarity_threshold",
        config.enrichment.title_similarity_threshold.to_string(),
    );
    map.insert(
        "enrichment.researcher_freshness_days",
        config.enrichment.researcher_freshness_days.to_string(),
    );
    map.insert(
        "enrichment.publication_cache_days",
        config.enrichment.publication_cache_days.to_string(),
    );
    map.insert(
        "enrichment.auto_enrich_papers",
        config.enrichment.auto_enrich_papers.to_string(),
    );
    map.insert(
        "enrichment.auto_enrich_researchers",
        config.enrichment.auto_enrich_researchers.to_string(),
    );
    map.insert("ai.provider", config.ai.provider.clone());
    map.insert("ai.model", config.ai.model.clone());
    map
}
