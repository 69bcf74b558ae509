//! Portfolio-level statistics over a batch of extracted records.
//!
//! Everything here is recomputed fresh from the full facts sequence on every
//! call; there is no incremental update path to keep consistent.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::facts::{ApplicantCategory, BibliographicFacts};
use crate::names;

const TOP_N: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopEntry {
    pub name: String,
    pub record_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopApplicant {
    pub name: String,
    pub category: ApplicantCategory,
    pub record_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchStatistics {
    pub total_records: usize,

    // Collaboration: records naming two or more distinct applicants.
    pub records_with_collaboration: usize,
    pub collaboration_rate: f64,
    pub unique_applicants: usize,
    pub university_entities: usize,
    pub industry_partners: usize,
    pub top_applicants: Vec<TopApplicant>,

    // Inventor network.
    pub unique_inventors: usize,
    pub total_inventor_mentions: usize,
    pub avg_inventors_per_record: f64,
    /// Inventors appearing on three or more records.
    pub core_inventors: usize,
    /// Inventors appearing on exactly two records.
    pub regular_inventors: usize,
    /// Inventors appearing on exactly one record.
    pub occasional_inventors: usize,
    pub top_inventors: Vec<TopEntry>,

    // Priority filings.
    pub records_with_priorities: usize,
    pub priority_rate: f64,
    pub total_priority_claims: usize,
    pub domestic_priorities: usize,
    pub domestic_priority_rate: f64,
    pub priority_countries: BTreeMap<String, usize>,
}

impl BatchStatistics {
    /// Compute the full statistics block from an ordered facts sequence.
    /// Rates are percentages rounded to one decimal.
    pub fn compute(facts: &[BibliographicFacts], domestic_country: &str) -> Self {
        let total_records = facts.len();

        let mut applicants = FrequencyTable::default();
        let mut inventors = FrequencyTable::default();
        let mut records_with_collaboration = 0usize;
        let mut total_inventor_mentions = 0usize;
        let mut records_with_priorities = 0usize;
        let mut total_priority_claims = 0usize;
        let mut domestic_priorities = 0usize;
        let mut priority_countries: BTreeMap<String, usize> = BTreeMap::new();

        for record in facts {
            // Names inside one facts value are already unique by normalized
            // value, so per-record counts are distinct-entity counts.
            if record.applicants.len() >= 2 {
                records_with_collaboration += 1;
            }
            for applicant in &record.applicants {
                applicants.bump(names::dedup_key(&applicant.name), &applicant.name);
            }

            total_inventor_mentions += record.inventors.len();
            for inventor in &record.inventors {
                inventors.bump(inventor.name.clone(), &inventor.name);
            }

            if !record.priority_claims.is_empty() {
                records_with_priorities += 1;
            }
            for claim in &record.priority_claims {
                total_priority_claims += 1;
                if claim.country == domestic_country {
                    domestic_priorities += 1;
                }
                *priority_countries.entry(claim.country.clone()).or_insert(0) += 1;
            }
        }

        let university_entities = applicants
            .labels()
            .filter(|name| names::categorize(name) == ApplicantCategory::University)
            .count();
        let industry_partners = applicants.distinct() - university_entities;

        Self {
            total_records,
            records_with_collaboration,
            collaboration_rate: percent(records_with_collaboration, total_records),
            unique_applicants: applicants.distinct(),
            university_entities,
            industry_partners,
            top_applicants: applicants
                .top(TOP_N)
                .into_iter()
                .map(|entry| TopApplicant {
                    category: names::categorize(&entry.name),
                    name: entry.name,
                    record_count: entry.record_count,
                })
                .collect(),
            unique_inventors: inventors.distinct(),
            total_inventor_mentions,
            avg_inventors_per_record: round1(if total_records == 0 {
                0.0
            } else {
                total_inventor_mentions as f64 / total_records as f64
            }),
            core_inventors: inventors.count_where(|n| n >= 3),
            regular_inventors: inventors.count_where(|n| n == 2),
            occasional_inventors: inventors.count_where(|n| n == 1),
            top_inventors: inventors.top(TOP_N),
            records_with_priorities,
            priority_rate: percent(records_with_priorities, total_records),
            total_priority_claims,
            domestic_priorities,
            domestic_priority_rate: percent(domestic_priorities, total_priority_claims),
            priority_countries,
        }
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round1(part as f64 / whole as f64 * 100.0)
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Occurrence counts keyed by a dedup key, remembering first-encounter order
/// and the first-seen display label.
#[derive(Default)]
struct FrequencyTable {
    index: HashMap<String, usize>,
    entries: Vec<(String, usize)>,
}

impl FrequencyTable {
    fn bump(&mut self, key: String, label: &str) {
        match self.index.get(&key) {
            Some(&slot) => self.entries[slot].1 += 1,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push((label.to_string(), 1));
            }
        }
    }

    fn distinct(&self) -> usize {
        self.entries.len()
    }

    fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(label, _)| label.as_str())
    }

    fn count_where(&self, predicate: impl Fn(usize) -> bool) -> usize {
        self.entries.iter().filter(|(_, count)| predicate(*count)).count()
    }

    /// Descending by count; ties keep first-encounter order (stable sort).
    fn top(&self, limit: usize) -> Vec<TopEntry> {
        let mut ranked: Vec<TopEntry> = self
            .entries
            .iter()
            .map(|(label, count)| TopEntry {
                name: label.clone(),
                record_count: *count,
            })
            .collect();
        ranked.sort_by(|a, b| b.record_count.cmp(&a.record_count));
        ranked.truncate(limit);
        ranked
    }
}
