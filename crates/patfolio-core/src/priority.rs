//! Priority-claim formatting and selection rules.

use serde::{Deserialize, Serialize};

use crate::facts::PriorityClaim;

/// Separator between the document identifier and the date in a formatted
/// claim. A literal U+00B7 middle dot — downstream consumers parse on it, so
/// it must be preserved exactly.
pub const CLAIM_SEPARATOR: char = '·';

/// Deployment-configurable formatting and selection policy for priority
/// claims.
///
/// Selection keeps every claim from the domestic country when at least one
/// exists and otherwise keeps only the first claim encountered. That is a
/// deliberate business rule — domestic priority is the analytically
/// interesting case for this dataset — not a "best priority" heuristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityPolicy {
    /// Jurisdiction treated as analytically primary.
    pub domestic_country: String,
    /// Regional filing office code.
    pub regional_code: String,
    /// Domestic serial numbers start with this prefix…
    pub domestic_number_prefix: String,
    /// …and have exactly this length.
    pub domestic_number_len: usize,
    /// Kind-code letter appended to matching domestic numbers.
    pub domestic_kind: char,
    /// Kind-code letter appended to regional filings.
    pub regional_kind: char,
}

impl Default for PriorityPolicy {
    fn default() -> Self {
        Self {
            domestic_country: "DE".to_string(),
            regional_code: "EP".to_string(),
            domestic_number_prefix: "102".to_string(),
            domestic_number_len: 12,
            domestic_kind: 'A',
            regional_kind: 'W',
        }
    }
}

impl PriorityPolicy {
    /// Canonical display string for one `(country, number, date)` triple:
    /// `{country}{number}{suffix}·{YYYY-MM-DD}`.
    pub fn format(&self, country: &str, number: &str, date: &str) -> String {
        let formatted_date = repunctuate_date(date);
        let suffix = if country == self.domestic_country
            && number.starts_with(&self.domestic_number_prefix)
            && number.len() == self.domestic_number_len
        {
            Some(self.domestic_kind)
        } else if country == self.regional_code {
            Some(self.regional_kind)
        } else {
            None
        };

        match suffix {
            Some(kind) => format!("{country}{number}{kind}{CLAIM_SEPARATOR}{formatted_date}"),
            None => format!("{country}{number}{CLAIM_SEPARATOR}{formatted_date}"),
        }
    }

    pub fn claim(&self, country: &str, number: &str, date: &str) -> PriorityClaim {
        PriorityClaim {
            formatted: self.format(country, number, date),
            country: country.to_string(),
            number: number.to_string(),
            date: date.to_string(),
        }
    }

    /// Apply the selection rule: all domestic claims if any exist, otherwise
    /// only the first claim encountered.
    pub fn select(&self, claims: Vec<PriorityClaim>) -> Vec<PriorityClaim> {
        let domestic: Vec<PriorityClaim> = claims
            .iter()
            .filter(|claim| claim.country == self.domestic_country)
            .cloned()
            .collect();
        if !domestic.is_empty() {
            domestic
        } else {
            claims.into_iter().take(1).collect()
        }
    }
}

/// `YYYYMMDD` → `YYYY-MM-DD`; anything shorter passes through unchanged.
fn repunctuate_date(date: &str) -> String {
    match (date.get(0..4), date.get(4..6), date.get(6..8)) {
        (Some(year), Some(month), Some(day)) => format!("{year}-{month}-{day}"),
        _ => date.to_string(),
    }
}
