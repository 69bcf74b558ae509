//! Sequential batch orchestration: one fetch, one extraction, one record —
//! repeat. The provider's rate limit is enforced inside the client, so the
//! loop stays strictly one-at-a-time by design.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{info, warn};

use patfolio_core::{BatchStatistics, BibliographicFacts, Extractor};
use patfolio_ops::{EpNumber, OpsClient, OpsError};

use crate::index::PatentApplication;

/// One index row carried through the batch, with its fetch outcome and the
/// (possibly partial) extracted facts alongside.
#[derive(Debug, Clone, Serialize)]
pub struct PatentRecord {
    pub ep_number: Option<String>,
    pub university: String,
    pub filing_year: String,
    pub patent_status: String,
    pub technical_field: String,
    pub original_title: String,
    pub fetched: bool,
    pub failure_reason: Option<String>,
    pub facts: BibliographicFacts,
}

impl PatentRecord {
    fn from_application(application: &PatentApplication) -> Self {
        Self {
            ep_number: None,
            university: application.university.clone(),
            filing_year: application.filing_year.clone(),
            patent_status: application.patent_status.clone(),
            technical_field: application.technical_field.clone(),
            original_title: application.application_title.clone(),
            fetched: false,
            failure_reason: None,
            facts: BibliographicFacts::default(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PortfolioReport {
    pub university: String,
    pub total_students: u32,
    pub requested: usize,
    pub retrieved: usize,
    pub success_rate: f64,
    pub records: Vec<PatentRecord>,
    pub statistics: BatchStatistics,
}

pub struct PortfolioEngine<'a> {
    client: &'a OpsClient,
    extractor: Extractor,
    domestic_country: String,
}

impl<'a> PortfolioEngine<'a> {
    pub fn new(client: &'a OpsClient, extractor: Extractor, domestic_country: String) -> Self {
        Self {
            client,
            extractor,
            domestic_country,
        }
    }

    /// Run the whole batch for one university. Authentication failure aborts
    /// immediately; everything else is recorded per item and the batch
    /// continues.
    pub async fn analyze(
        &self,
        university: &str,
        applications: &[&PatentApplication],
    ) -> Result<PortfolioReport> {
        if applications.is_empty() {
            bail!("no patent applications found for {university:?}");
        }

        let total = applications.len();
        let mut records = Vec::with_capacity(total);
        let mut retrieved = 0usize;

        for (position, application) in applications.iter().enumerate() {
            let mut record = PatentRecord::from_application(application);

            match EpNumber::parse(&application.espacenet_link) {
                Err(err) => {
                    warn!(
                        link = %application.espacenet_link,
                        error = %err,
                        "cannot derive a publication number from index row"
                    );
                    record.failure_reason = Some(err.to_string());
                }
                Ok(number) => {
                    record.ep_number = Some(number.epodoc());
                    info!(
                        item = position + 1,
                        total,
                        publication = %number,
                        "fetching bibliographic data"
                    );
                    match self.client.fetch_biblio(&number).await {
                        Ok(response) => {
                            record.fetched = true;
                            retrieved += 1;
                            record.facts = self.extractor.extract(&response.data);
                        }
                        // The whole batch is useless without a token; stop
                        // before recording anything as processed.
                        Err(err @ OpsError::Auth(_)) => {
                            return Err(err).context("authentication failed, aborting batch");
                        }
                        Err(err) => {
                            warn!(publication = %number, error = %err, "fetch failed");
                            record.failure_reason = Some(err.to_string());
                        }
                    }
                }
            }

            records.push(record);
        }

        let facts: Vec<BibliographicFacts> = records
            .iter()
            .filter(|record| record.fetched)
            .map(|record| record.facts.clone())
            .collect();
        let statistics = BatchStatistics::compute(&facts, &self.domestic_country);

        Ok(PortfolioReport {
            university: university.to_string(),
            total_students: applications[0].total_students,
            requested: total,
            retrieved,
            success_rate: round1(retrieved as f64 / total as f64 * 100.0),
            records,
            statistics,
        })
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
