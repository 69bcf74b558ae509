//! Flattened CSV rows plus a structured JSON summary per batch.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use patfolio_core::BatchStatistics;

use crate::engine::{PatentRecord, PortfolioReport};

/// One row per processed record, facts flattened; multi-valued fields join
/// on "; ".
pub fn export_records_csv(path: &Path, records: &[PatentRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("cannot create {}", path.display()))?;

    writer.write_record([
        "ep_number",
        "university",
        "filing_year",
        "patent_status",
        "technical_field",
        "title",
        "applicants",
        "inventors",
        "priority_claims",
        "ipc_classes",
        "cpc_classes",
        "application_number",
        "filing_date",
        "status",
        "reason",
    ])?;

    for record in records {
        let facts = &record.facts;
        let title = facts
            .title
            .clone()
            .unwrap_or_else(|| record.original_title.clone());
        let applicants = join(facts.applicants.iter().map(|a| a.name.as_str()));
        let inventors = join(facts.inventors.iter().map(|i| i.name.as_str()));
        let priorities = join(facts.priority_claims.iter().map(|c| c.formatted.as_str()));
        let ipc = join(
            facts
                .classifications
                .iter()
                .filter(|c| c.scheme == patfolio_core::ClassificationScheme::Ipc)
                .map(|c| c.code.as_str()),
        );
        let cpc = join(
            facts
                .classifications
                .iter()
                .filter(|c| c.scheme == patfolio_core::ClassificationScheme::Cpc)
                .map(|c| c.code.as_str()),
        );
        let reference = facts.application_reference.as_ref();

        writer.write_record([
            record.ep_number.as_deref().unwrap_or_default(),
            record.university.as_str(),
            record.filing_year.as_str(),
            record.patent_status.as_str(),
            record.technical_field.as_str(),
            title.as_str(),
            applicants.as_str(),
            inventors.as_str(),
            priorities.as_str(),
            ipc.as_str(),
            cpc.as_str(),
            reference.map(|r| r.number.as_str()).unwrap_or_default(),
            reference
                .and_then(|r| r.filing_date.as_deref())
                .unwrap_or_default(),
            if record.fetched { "ok" } else { "failed" },
            record.failure_reason.as_deref().unwrap_or_default(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct Summary<'a> {
    university: &'a str,
    total_students: u32,
    patents_requested: usize,
    patents_retrieved: usize,
    success_rate: f64,
    statistics: &'a BatchStatistics,
}

/// Key→value summary document for the batch as a whole.
pub fn export_summary_json(path: &Path, report: &PortfolioReport) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    serde_json::to_writer_pretty(
        file,
        &Summary {
            university: &report.university,
            total_students: report.total_students,
            patents_requested: report.requested,
            patents_retrieved: report.retrieved,
            success_rate: report.success_rate,
            statistics: &report.statistics,
        },
    )?;
    Ok(())
}

/// Write both exports under `output_dir`, named after the university.
pub fn export_report(output_dir: &Path, report: &PortfolioReport) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("cannot create output dir {}", output_dir.display()))?;

    let stem = sanitize_filename(&report.university);
    let csv_path = output_dir.join(format!("{stem}_records.csv"));
    let json_path = output_dir.join(format!("{stem}_summary.json"));

    export_records_csv(&csv_path, &report.records)?;
    export_summary_json(&json_path, report)?;
    Ok((csv_path, json_path))
}

fn join<'a>(values: impl Iterator<Item = &'a str>) -> String {
    values.collect::<Vec<_>>().join("; ")
}

fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    cleaned.trim_matches('_').to_ascii_lowercase()
}
