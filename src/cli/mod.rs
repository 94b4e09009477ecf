//! Command-line interface for alibi.
//!
//! Provides commands for submitting footage, tracking analysis jobs,
//! assessing witness claims against evidence, and inspecting
//! configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::adapters::{
    FixtureIndexer, HttpIndexer, LocalVideoStore, VideoIndexer, VideoStore,
};
use crate::config::{Config, IndexerMode};
use crate::core::tracker::TrackerError;
use crate::core::{assess, normalize, JobJournal, JobTracker, RetryPolicy};
use crate::domain::analysis::VideoAnalysis;
use crate::domain::claim::WitnessClaim;
use crate::domain::evidence::{format_offset, EvidencePack, EvidencePackSource};
use crate::domain::job::{JobRecord, JobStatus, JobStatusResponse};
use crate::domain::report::CredibilityReport;

/// How often a waiting command re-polls the upstream service
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// How long a waiting command keeps polling before giving up
const WAIT_TIMEOUT: Duration = Duration::from_secs(600);

/// alibi - Footage-backed witness claim assessment
#[derive(Parser, Debug)]
#[command(name = "alibi")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit footage for analysis
    Submit {
        /// Video reference: a media file path or an id in the store
        reference: String,

        /// Block until the job reaches a terminal state
        #[arg(long)]
        wait: bool,
    },

    /// Check the status of an analysis job
    Status {
        /// Job ID (UUID)
        job_id: String,

        /// Print the status response as JSON
        #[arg(long)]
        json: bool,
    },

    /// List recent jobs
    Jobs {
        /// Maximum number of jobs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Re-poll the upstream service for unfinished jobs
    Reconcile {
        /// Job ID to reconcile (all unfinished jobs if omitted)
        job_id: Option<String>,
    },

    /// Mark a job as failed
    Fail {
        /// Job ID to fail
        job_id: String,

        /// Reason recorded against the job
        #[arg(short, long, default_value = "aborted by operator")]
        reason: String,
    },

    /// Submit footage and print its evidence pack when ready
    Analyze {
        /// Video reference: a media file path or an id in the store
        reference: String,
    },

    /// Assess a witness claim against a completed job's evidence
    Assess {
        /// Job ID of a completed analysis
        job_id: String,

        /// The witness statement to check
        claim: String,

        /// Case number recorded on the report
        #[arg(long)]
        case_id: Option<String>,

        /// Claimed location, when not part of the statement text
        #[arg(long)]
        location: Option<String>,
    },

    /// Normalize a raw analysis file into an evidence pack (debugging)
    Normalize {
        /// Path to a JSON analysis file
        analysis: PathBuf,

        /// Video reference the analysis belongs to
        #[arg(long)]
        video: String,
    },

    /// Run the bundled demo scenarios end to end
    Demo {
        /// Directory holding demo fixtures (media/ and analyses/)
        #[arg(long, default_value = "fixtures")]
        fixtures: PathBuf,
    },

    /// Check what the current configuration can reach
    Doctor,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = Config::load()?;

        match self.command {
            Commands::Submit { reference, wait } => submit_job(&config, &reference, wait).await,
            Commands::Status { job_id, json } => show_status(&config, &job_id, json).await,
            Commands::Jobs { limit } => list_jobs(&config, limit).await,
            Commands::Reconcile { job_id } => reconcile_jobs(&config, job_id).await,
            Commands::Fail { job_id, reason } => fail_job(&config, &job_id, &reason).await,
            Commands::Analyze { reference } => analyze_video(&config, &reference).await,
            Commands::Assess { job_id, claim, case_id, location } => {
                assess_claim(&config, &job_id, &claim, case_id, location).await
            }
            Commands::Normalize { analysis, video } => {
                normalize_file(&config, &analysis, &video).await
            }
            Commands::Demo { fixtures } => run_demo(&fixtures).await,
            Commands::Doctor => run_doctor(&config).await,
            Commands::Config => show_config(&config),
        }
    }
}

/// Build the indexer the configuration selects
fn build_indexer(config: &Config) -> Result<Arc<dyn VideoIndexer>> {
    match config.indexer.mode {
        IndexerMode::Live => {
            config.validate()?;
            let endpoint = config.indexer.endpoint.clone().unwrap_or_default();
            let token = config.indexer.api_token.clone().unwrap_or_default();
            Ok(Arc::new(HttpIndexer::new(
                endpoint,
                token,
                Duration::from_secs(config.indexer.timeout_seconds),
            )))
        }
        IndexerMode::Fixture => {
            Ok(Arc::new(FixtureIndexer::new(&config.indexer.fixtures_dir)))
        }
    }
}

/// Wire up a tracker from configuration
fn build_tracker(config: &Config) -> Result<JobTracker> {
    let journal = JobJournal::open(config.journal_path())?;
    let indexer = build_indexer(config)?;
    let store: Arc<dyn VideoStore> = Arc::new(LocalVideoStore::new(&config.media));
    Ok(JobTracker::new(journal, indexer, store, config.retry.clone())?)
}

fn parse_job_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("Invalid job ID: {}", raw))
}

/// Reconcile in a loop until the job settles
async fn wait_until_settled(tracker: &JobTracker, job_id: Uuid) -> Result<JobRecord> {
    let started = std::time::Instant::now();

    loop {
        match tracker.reconcile(job_id).await {
            Ok(record) if record.is_terminal() => return Ok(record),
            Ok(_) => {}
            Err(TrackerError::UpstreamTimeout { message, .. }) => {
                eprintln!("   upstream unreachable, retrying: {}", message);
            }
            Err(e) => return Err(e.into()),
        }

        if started.elapsed() > WAIT_TIMEOUT {
            bail!("Timed out waiting for job {}", job_id);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Submit footage for analysis
async fn submit_job(config: &Config, reference: &str, wait: bool) -> Result<()> {
    let tracker = build_tracker(config)?;

    let record = tracker.submit(reference).await?;
    eprintln!("📼 Job {} submitted for video '{}'", record.id, record.video_id());
    eprintln!("   Status: {}", record.status);

    if wait {
        let settled = wait_until_settled(&tracker, record.id).await?;
        print_record(&settled);
        if settled.status == JobStatus::Failed {
            std::process::exit(1);
        }
    } else {
        eprintln!("   Use 'alibi status {}' to follow progress", record.id);
    }

    Ok(())
}

/// Show the status of a job
async fn show_status(config: &Config, job_id_str: &str, json: bool) -> Result<()> {
    let job_id = parse_job_id(job_id_str)?;
    let tracker = build_tracker(config)?;

    let record = tracker.poll(job_id).await?;
    if json {
        let response = JobStatusResponse::from(&record);
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_record(&record);
    }

    Ok(())
}

/// List recent jobs
async fn list_jobs(config: &Config, limit: usize) -> Result<()> {
    let tracker = build_tracker(config)?;
    let jobs = tracker.jobs().await;

    if jobs.is_empty() {
        println!("No jobs found. Use 'alibi submit <video>' to start one.");
        return Ok(());
    }

    println!("{:<38} {:<20} {:<11} {:<20}", "JOB ID", "VIDEO", "STATUS", "UPDATED");
    println!("{}", "-".repeat(90));

    for job in jobs.iter().take(limit) {
        println!(
            "{:<38} {:<20} {:<11} {:<20}",
            job.id.to_string(),
            truncate(job.video_id(), 18),
            job.status.to_string(),
            job.updated_at.format("%Y-%m-%d %H:%M:%S").to_string()
        );
    }

    Ok(())
}

/// Re-poll the upstream service for one or all unfinished jobs
async fn reconcile_jobs(config: &Config, job_id: Option<String>) -> Result<()> {
    let tracker = build_tracker(config)?;

    let targets: Vec<JobRecord> = match job_id {
        Some(raw) => vec![tracker.poll(parse_job_id(&raw)?).await?],
        None => tracker.unsettled().await,
    };

    if targets.is_empty() {
        println!("Nothing to reconcile; all jobs are settled.");
        return Ok(());
    }

    for target in targets {
        let before = target.status;
        match tracker.reconcile(target.id).await {
            Ok(after) => {
                println!("{}  {} -> {}", target.id, before, after.status);
            }
            Err(TrackerError::UpstreamTimeout { message, .. }) => {
                println!("{}  {} (upstream unreachable: {})", target.id, before, message);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

/// Mark a job as failed
async fn fail_job(config: &Config, job_id_str: &str, reason: &str) -> Result<()> {
    let job_id = parse_job_id(job_id_str)?;
    let tracker = build_tracker(config)?;

    let record = tracker.fail(job_id, reason).await?;
    eprintln!("❌ Job {} marked {}", record.id, record.status);
    if let Some(error) = &record.error {
        eprintln!("   {}", error.message);
    }

    Ok(())
}

/// Submit footage and print its evidence pack when ready
async fn analyze_video(config: &Config, reference: &str) -> Result<()> {
    let tracker = build_tracker(config)?;

    let record = tracker.submit(reference).await?;
    eprintln!("📼 Job {} submitted, waiting for analysis...", record.id);

    let settled = wait_until_settled(&tracker, record.id).await?;
    match settled.status {
        JobStatus::Succeeded => {
            let pack = settled
                .evidence
                .as_ref()
                .context("completed job carries no evidence pack")?;
            print_pack(pack);
            eprintln!("\n✅ Job {} completed", settled.id);
            Ok(())
        }
        _ => {
            let reason = settled
                .error
                .as_ref()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "unknown".to_string());
            eprintln!("❌ Job {} ended {}: {}", settled.id, settled.status, reason);
            std::process::exit(1);
        }
    }
}

/// Assess a witness claim against a completed job's evidence
async fn assess_claim(
    config: &Config,
    job_id_str: &str,
    claim_text: &str,
    case_id: Option<String>,
    location: Option<String>,
) -> Result<()> {
    let job_id = parse_job_id(job_id_str)?;
    let tracker = build_tracker(config)?;

    let record = tracker.poll(job_id).await?;
    if record.status != JobStatus::Succeeded {
        bail!(
            "Job {} is {}, not succeeded; only completed jobs carry evidence",
            job_id,
            record.status
        );
    }
    let pack = record
        .evidence
        .as_ref()
        .context("completed job carries no evidence pack")?;

    let mut claim = WitnessClaim::new(claim_text);
    if let Some(case_id) = case_id {
        claim = claim.with_case_id(case_id);
    }
    if let Some(location) = location {
        claim = claim.with_location(location);
    }

    let report = assess(&claim, pack)?;
    print_report(&claim, &report);

    let path = save_report(config, &report)?;
    eprintln!("\n📄 Report written to {}", path.display());

    Ok(())
}

/// Normalize a raw analysis file into an evidence pack
async fn normalize_file(config: &Config, analysis_path: &PathBuf, video: &str) -> Result<()> {
    let content = std::fs::read_to_string(analysis_path)
        .with_context(|| format!("Failed to read analysis file: {}", analysis_path.display()))?;
    let analysis: VideoAnalysis = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse analysis file: {}", analysis_path.display()))?;

    let store = LocalVideoStore::new(&config.media);
    let asset = store.resolve(video).await?;

    let pack = normalize(&analysis, EvidencePackSource::from_asset(&asset))?;
    eprintln!(
        "Normalized {} detections into {} chapters, {} events, {} quotes",
        analysis.detections.len(),
        pack.chapters.len(),
        pack.events.len(),
        pack.quotes.len()
    );
    println!("{}", serde_json::to_string_pretty(&pack)?);

    Ok(())
}

/// Run the bundled demo: one video, one supported claim, one
/// contradicted claim. State lives in a throwaway directory.
async fn run_demo(fixtures: &PathBuf) -> Result<()> {
    let media = fixtures.join("media");
    let analyses = fixtures.join("analyses");
    if !media.is_dir() || !analyses.is_dir() {
        bail!(
            "Fixture directory {} must contain media/ and analyses/",
            fixtures.display()
        );
    }

    let demo_home = std::env::temp_dir().join(format!("alibi-demo-{}", Uuid::new_v4()));
    let journal = JobJournal::open(demo_home.join("jobs.jsonl"))?;
    let indexer: Arc<dyn VideoIndexer> = Arc::new(FixtureIndexer::new(&analyses));
    let store: Arc<dyn VideoStore> = Arc::new(LocalVideoStore::new(&media));
    let tracker = JobTracker::new(journal, indexer, store, RetryPolicy::default())?;

    eprintln!("📼 Analyzing demo footage 'dock-cam'...");
    let record = tracker.submit("dock-cam").await?;
    let settled = wait_until_settled(&tracker, record.id).await?;
    let pack = settled
        .evidence
        .as_ref()
        .context("demo analysis did not produce an evidence pack")?;
    print_pack(pack);

    let scenarios = [
        (
            "supported",
            WitnessClaim::new(
                "I was at the warehouse loading dock around 9pm, moving crates with a coworker",
            )
            .with_case_id("demo-001"),
        ),
        (
            "contradicted",
            WitnessClaim::new("I spent the whole evening at the Blue Note jazz club")
                .with_case_id("demo-002"),
        ),
    ];

    for (name, claim) in scenarios {
        eprintln!("\n🔍 Scenario: {} claim", name);
        let report = assess(&claim, pack)?;
        print_report(&claim, &report);
    }

    std::fs::remove_dir_all(&demo_home).ok();
    Ok(())
}

/// Check what the current configuration can reach
async fn run_doctor(config: &Config) -> Result<()> {
    println!("alibi doctor");
    println!();
    println!(
        "Config file: {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!("Home:        {}", config.home.display());
    println!("Media:       {}", config.media.display());

    let journal_path = config.journal_path();
    if journal_path.exists() {
        let events = JobJournal::open(&journal_path)?.replay()?;
        println!("Journal:     {} ({} events)", journal_path.display(), events.len());
    } else {
        println!("Journal:     {} (not created yet)", journal_path.display());
    }

    let availability = config.availability();
    println!();
    println!("Indexer mode: {}", config.indexer.mode);
    println!(
        "  live indexer:    {}",
        if availability.live_indexer { "available" } else { "unavailable" }
    );
    println!(
        "  fixture indexer: {}",
        if availability.fixture_indexer { "available" } else { "unavailable" }
    );
    for note in &availability.notes {
        println!("  note: {}", note);
    }

    println!();
    match build_indexer(config) {
        Ok(indexer) => match indexer.health_check().await {
            Ok(()) => println!("Health check: ok ({})", indexer.name()),
            Err(e) => println!("Health check: failed ({})", e),
        },
        Err(e) => println!("Health check: skipped ({})", e),
    }

    Ok(())
}

/// Show the resolved configuration (for debugging)
fn show_config(config: &Config) -> Result<()> {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("  Alibi Configuration");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!(
        "Config file: {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home (state):  {}", config.home.display());
    println!("  Media:         {}", config.media.display());
    println!("  Journal:       {}", config.journal_path().display());
    println!("  Reports:       {}", config.reports_dir().display());
    println!();
    println!("Indexer:");
    println!("  Mode:          {}", config.indexer.mode);
    println!(
        "  Endpoint:      {}",
        config.indexer.endpoint.as_deref().unwrap_or("(not set)")
    );
    println!(
        "  API token:     {}",
        if config.indexer.api_token.is_some() { "(set)" } else { "(not set)" }
    );
    println!("  Timeout:       {}s", config.indexer.timeout_seconds);
    println!("  Fixtures:      {}", config.indexer.fixtures_dir.display());
    println!();
    println!("Retry:");
    println!("  Max attempts:  {}", config.retry.max_attempts);
    println!("  Initial delay: {}ms", config.retry.initial_delay_ms);
    println!("  Max delay:     {}ms", config.retry.max_delay_ms);

    Ok(())
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

fn truncate(text: &str, max: usize) -> String {
    if text.len() > max {
        format!("{}...", &text[..max.saturating_sub(3)])
    } else {
        text.to_string()
    }
}

fn print_record(record: &JobRecord) {
    println!("Job ID: {}", record.id);
    println!(
        "Video: {}{}",
        record.video_id(),
        record
            .video
            .title
            .as_deref()
            .map(|t| format!(" ({})", t))
            .unwrap_or_default()
    );
    println!("Status: {}", record.status);
    println!("Attempts: {}", record.attempts);
    if let Some(task_id) = &record.upstream_task_id {
        println!("Upstream task: {}", task_id);
    }
    println!("Created: {}", record.created_at);
    println!("Updated: {}", record.updated_at);
    if let Some(error) = &record.error {
        println!("Error: {} ({})", error.message, error.kind);
    }
    if let Some(pack) = &record.evidence {
        println!(
            "Evidence: {} chapters, {} events, {} quotes",
            pack.chapters.len(),
            pack.events.len(),
            pack.quotes.len()
        );
    }
}

fn print_pack(pack: &EvidencePack) {
    println!(
        "Evidence pack for '{}' (duration {})",
        pack.source.video_id,
        format_offset(pack.source.duration_secs)
    );
    if let Some(recorded_at) = pack.source.recorded_at {
        println!("Recorded at: {}", recorded_at);
    }

    println!("\nChapters:");
    for chapter in &pack.chapters {
        println!(
            "  {:<8} {}-{}  {}",
            chapter.id,
            format_offset(chapter.start),
            format_offset(chapter.end),
            chapter.summary
        );
    }

    println!("\nEvents:");
    for event in &pack.events {
        println!(
            "  {:<12} {}  {:.2}  {}{}",
            event.id,
            format_offset(event.start),
            event.confidence,
            event.label,
            if event.sources > 1 { format!(" ({} sources)", event.sources) } else { String::new() }
        );
    }

    println!("\nQuotes:");
    for quote in &pack.quotes {
        println!(
            "  {:<12} {}  {}: \"{}\"",
            quote.id,
            format_offset(quote.start),
            quote.speaker,
            quote.text
        );
    }
}

fn print_report(claim: &WitnessClaim, report: &CredibilityReport) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("  Credibility Report");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!("Claim: \"{}\"", claim.text);
    if let Some(case_id) = &report.case_id {
        println!("Case: {}", case_id);
    }
    println!("Video: {}", report.video_id);
    println!(
        "Verdict: {} (confidence {:.2})",
        report.verdict.to_string().to_uppercase(),
        report.confidence
    );

    println!("\nAssertions:");
    for comparison in &report.comparisons {
        println!(
            "  [{:<11}] {:<11} \"{}\"  {:.2}",
            comparison.verdict.to_string(),
            comparison.kind.to_string(),
            comparison.assertion,
            comparison.confidence
        );
        println!("      {}", comparison.explanation);
        if !comparison.evidence.is_empty() {
            let ids: Vec<String> =
                comparison.evidence.iter().map(|e| e.to_string()).collect();
            println!("      cites: {}", ids.join(", "));
        }
    }

    println!("\nSummary: {}", report.summary);
    println!("Recommendation: {}", report.recommendation);
}

/// Write a report to the reports directory as JSON
fn save_report(config: &Config, report: &CredibilityReport) -> Result<PathBuf> {
    let dir = config.reports_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create reports directory: {}", dir.display()))?;

    let path = dir.join(format!("report-{}.json", report.claim_id));
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;

    Ok(path)
}
