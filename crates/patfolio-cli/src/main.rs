use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use patfolio_core::Extractor;
use patfolio_ops::{Credentials, EpNumber, IpcSubclass, OpsClient};

mod config;
mod engine;
mod export;
mod index;

use config::AppConfig;
use engine::PortfolioEngine;
use index::UniversityIndex;

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "patfolio",
    about = "University patent-portfolio analytics over the EPO OPS API",
    version
)]
struct Cli {
    /// Path to a TOML config file (default: ./patfolio.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the universities available in the input index.
    List,

    /// Per-university grant statistics from the index alone (no API calls).
    Stats,

    /// Fetch, extract and aggregate one university's patent portfolio.
    Analyze {
        /// University name, exactly as it appears in the index.
        university: String,
        /// Maximum number of patents to process.
        #[arg(long)]
        limit: Option<usize>,
        /// Directory for the CSV/JSON exports (default from config).
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Count published applications for an IPC subclass (e.g. A61K).
    SearchIpc {
        subclass: String,
    },

    /// Probe the OPS gateway with a single publication number.
    TestApi {
        /// Publication number or Espacenet link (e.g. EP19196837A).
        patent: String,
    },
}

// ─── Main ───────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::List => cmd_list(&config),
        Commands::Stats => cmd_stats(&config),
        Commands::Analyze {
            university,
            limit,
            output,
        } => cmd_analyze(&config, &university, limit, output).await,
        Commands::SearchIpc { subclass } => cmd_search_ipc(&config, &subclass).await,
        Commands::TestApi { patent } => cmd_test_api(&config, &patent).await,
    }
}

fn cmd_list(config: &AppConfig) -> Result<()> {
    let index = UniversityIndex::load(&config.data.input_file)?;
    let universities = index.universities();
    println!("{} universities in {}", universities.len(), config.data.input_file.display());
    for (position, university) in universities.iter().enumerate() {
        println!("{:4}. {university}", position + 1);
    }
    Ok(())
}

fn cmd_stats(config: &AppConfig) -> Result<()> {
    let index = UniversityIndex::load(&config.data.input_file)?;
    println!("{:<60} {:>8} {:>8} {:>7}", "university", "filings", "granted", "rate");
    for stats in index.university_statistics() {
        println!(
            "{:<60} {:>8} {:>8} {:>6.1}%",
            stats.university, stats.total_applications, stats.granted, stats.grant_rate
        );
    }
    Ok(())
}

async fn cmd_analyze(
    config: &AppConfig,
    university: &str,
    limit: Option<usize>,
    output: Option<PathBuf>,
) -> Result<()> {
    let index = UniversityIndex::load(&config.data.input_file)?;
    let limit = config.analysis.clamp_limit(limit);
    let applications = index.patents_for(university, limit);
    if applications.is_empty() {
        bail!(
            "university {university:?} not found in the index — run `patfolio list` for the exact names"
        );
    }

    let client = OpsClient::new(credentials_from_env()?, config.ops.to_client_config());
    let engine = PortfolioEngine::new(
        &client,
        Extractor::new(config.policy.clone()),
        config.policy.domestic_country.clone(),
    );
    let report = engine.analyze(university, &applications).await?;

    print_report(&report, &config.policy.domestic_country);

    let output_dir = output.unwrap_or_else(|| config.data.output_dir.clone());
    let (csv_path, json_path) = export::export_report(&output_dir, &report)?;
    println!();
    println!("records: {}", csv_path.display());
    println!("summary: {}", json_path.display());
    Ok(())
}

fn print_report(report: &engine::PortfolioReport, domestic_country: &str) {
    let stats = &report.statistics;
    println!();
    println!("{}", report.university);
    println!("{}", "=".repeat(report.university.len()));
    println!("students:            {}", report.total_students);
    println!(
        "patents processed:   {}/{} ({:.1}% retrieved)",
        report.retrieved, report.requested, report.success_rate
    );
    println!();
    println!(
        "collaboration:       {:.1}% of records name 2+ applicants ({}/{})",
        stats.collaboration_rate, stats.records_with_collaboration, stats.total_records
    );
    println!(
        "applicants:          {} distinct ({} university, {} industry/other)",
        stats.unique_applicants, stats.university_entities, stats.industry_partners
    );
    println!(
        "inventors:           {} distinct, {:.1} per record on average",
        stats.unique_inventors, stats.avg_inventors_per_record
    );
    println!(
        "                     {} core (3+), {} regular (2), {} occasional (1)",
        stats.core_inventors, stats.regular_inventors, stats.occasional_inventors
    );
    println!(
        "priorities:          {} claims on {} records, {} from {} ({:.1}%)",
        stats.total_priority_claims,
        stats.records_with_priorities,
        stats.domestic_priorities,
        domestic_country,
        stats.domestic_priority_rate
    );

    if !stats.top_applicants.is_empty() {
        println!();
        println!("top applicants:");
        for entry in &stats.top_applicants {
            println!(
                "  {:3}  {} [{}]",
                entry.record_count,
                entry.name,
                entry.category.label()
            );
        }
    }
    if !stats.top_inventors.is_empty() {
        println!();
        println!("top inventors:");
        for entry in &stats.top_inventors {
            println!("  {:3}  {}", entry.record_count, entry.name);
        }
    }
}

async fn cmd_search_ipc(config: &AppConfig, subclass: &str) -> Result<()> {
    let subclass = IpcSubclass::parse(subclass)?;
    let client = OpsClient::new(credentials_from_env()?, config.ops.to_client_config());
    let result = client.search_by_ipc(&subclass).await?;

    match result.total_results {
        Some(total) => println!("{total} published applications under {subclass}"),
        None => println!("no usable result count for {subclass}"),
    }
    for hit in &result.hits {
        println!("  {}{} ({})", hit.country, hit.number, hit.kind);
    }
    Ok(())
}

async fn cmd_test_api(config: &AppConfig, patent: &str) -> Result<()> {
    let number = EpNumber::parse(patent)?;
    let client = OpsClient::new(credentials_from_env()?, config.ops.to_client_config());

    let response = client
        .fetch_biblio(&number)
        .await
        .with_context(|| format!("probe fetch for {} failed", number.epodoc()))?;
    let size = serde_json::to_string(&response.data).map(|s| s.len()).unwrap_or(0);
    println!(
        "{} resolved as {} ({} bytes of bibliographic data)",
        number.raw, response.publication, size
    );
    Ok(())
}

/// Credentials come from the environment (an `.env` file is honored) and are
/// handed to the client explicitly; nothing else reads them.
fn credentials_from_env() -> Result<Credentials> {
    let key = std::env::var("OPS_KEY").ok().filter(|v| !v.is_empty());
    let secret = std::env::var("OPS_SECRET").ok().filter(|v| !v.is_empty());
    match (key, secret) {
        (Some(key), Some(secret)) => Ok(Credentials::new(key, secret)),
        _ => bail!("OPS_KEY and OPS_SECRET must be set (environment or .env file)"),
    }
}
