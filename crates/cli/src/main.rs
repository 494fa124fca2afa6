use anyhow::Context;
use api_shared::CaseRecord;
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use swasth_core::{
    parse_symptom_list, validate_assessment, CaseBuilder, ClientConfig, ExistingConditions,
    FileStore, HttpBackend, Locale, PendingQueue, RawAssessment, ScoringRules, SubmissionOutcome,
    SubmissionPipeline, SymptomTaxonomy, TriageEngine,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "swasth")]
#[command(about = "Swasth symptom triage and case submission CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct AssessmentArgs {
    /// Symptom ids, comma-separated (e.g. fever,cough)
    #[arg(long)]
    symptoms: String,
    /// below18, 18-40, 41-60 or above60
    #[arg(long)]
    age: String,
    /// today, 1-2, 3-5 or more5
    #[arg(long)]
    duration: String,
    /// mild, moderate or severe
    #[arg(long)]
    severity: String,
    /// none, paracetamol, other or unsure
    #[arg(long, default_value = "none")]
    medicine: String,
    /// Language for the rationale (en or hi)
    #[arg(long, default_value = "en")]
    lang: String,
}

impl AssessmentArgs {
    fn raw(&self) -> RawAssessment {
        RawAssessment {
            symptoms: parse_symptom_list(&self.symptoms),
            age_group: self.age.clone(),
            duration: self.duration.clone(),
            severity: self.severity.clone(),
            medicine: self.medicine.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Classify an assessment and print the risk tier
    Assess {
        #[command(flatten)]
        assessment: AssessmentArgs,
    },
    /// Classify an assessment and submit it, saving it offline if the backend is unreachable
    Submit {
        #[command(flatten)]
        assessment: AssessmentArgs,
        /// Existing conditions: yes, no or unknown
        #[arg(long, default_value = "unknown")]
        conditions: String,
    },
    /// Retry delivery of every case saved offline
    Reconcile,
    /// List cases saved offline and awaiting delivery
    Pending,
    /// List cases held by the review backend
    Cases {
        /// all, pending or validated
        #[arg(long, default_value = "all")]
        status: String,
    },
}

fn engine(config: &ClientConfig) -> anyhow::Result<TriageEngine> {
    let taxonomy = SymptomTaxonomy::load(config.taxonomy_file())?;
    Ok(TriageEngine::new(Arc::new(taxonomy), ScoringRules::default()))
}

fn pipeline(config: &ClientConfig) -> anyhow::Result<SubmissionPipeline<HttpBackend>> {
    let store = FileStore::open(config.queue_dir())
        .with_context(|| format!("opening queue store at {}", config.queue_dir().display()))?;
    let backend = HttpBackend::with_timeout(config.backend_url(), config.attempt_timeout())?;
    Ok(SubmissionPipeline::from_config(
        backend,
        PendingQueue::new(Arc::new(store)),
        config,
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("swasth_cli=info".parse()?)
                .add_directive("swasth_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env()?;

    match cli.command {
        Commands::Assess { assessment } => {
            let locale: Locale = assessment.lang.parse()?;
            let input = validate_assessment(&assessment.raw())?;
            let result = engine(&config)?.classify(&input);

            println!("Risk: {}", result.tier);
            if result.matched_groups.is_empty() {
                println!("Groups: (none)");
            } else {
                println!("Groups: {}", result.matched_groups.join(", "));
            }
            if let Some(group) = &result.overridden_by {
                println!("Red flag: {group}");
            }
            println!("{}", result.rationale.get(locale));
        }
        Commands::Submit {
            assessment,
            conditions,
        } => {
            let conditions: ExistingConditions = conditions.parse()?;
            let builder = CaseBuilder::new(engine(&config)?);
            let case = builder.assess(&assessment.raw(), conditions)?;

            match pipeline(&config)?.submit(case).await? {
                SubmissionOutcome::Delivered { id, case } => {
                    println!("Delivered: {id} (risk {})", case.triage.tier);
                }
                SubmissionOutcome::Queued { id, case, reason } => {
                    println!("Saved offline: {id} (risk {})", case.triage.tier);
                    println!("  will retry on next reconcile; delivery failed: {reason}");
                }
            }
        }
        Commands::Reconcile => {
            let report = pipeline(&config)?.reconcile().await?;
            for (local, remote) in &report.delivered {
                println!("{local} -> {remote}");
            }
            println!(
                "Synced: {}, still pending: {}, dropped: {}",
                report.synced, report.still_pending, report.dropped
            );
        }
        Commands::Pending => {
            let pending = pipeline(&config)?.pending().await?;
            if pending.is_empty() {
                println!("No cases awaiting delivery.");
            }
            for entry in pending {
                println!(
                    "{} | risk {} | {} | attempts {}{}",
                    entry.id,
                    entry.case.triage.tier,
                    entry.case.created_at.to_rfc3339(),
                    entry.attempts,
                    entry
                        .last_error
                        .map(|e| format!(" | last error: {e}"))
                        .unwrap_or_default()
                );
            }
        }
        Commands::Cases { status } => {
            let url = format!("{}/api/cases", config.backend_url());
            let client = reqwest::Client::builder()
                .timeout(config.attempt_timeout())
                .build()?;
            let cases: Vec<CaseRecord> = client
                .get(&url)
                .query(&[("status", status.as_str())])
                .send()
                .await
                .with_context(|| format!("requesting {url}"))?
                .error_for_status()?
                .json()
                .await?;

            if cases.is_empty() {
                println!("No cases found.");
            }
            for case in cases {
                println!(
                    "{} | {} | {} | {} | {}",
                    case.id,
                    case.risk_level,
                    case.symptoms.join(","),
                    case.submitted_at.to_rfc3339(),
                    if case.validated { "validated" } else { "pending" }
                );
            }
        }
    }

    Ok(())
}
