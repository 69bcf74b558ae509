//! Bibliographic fact extraction from one raw provider record.

use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use crate::facts::{
    Applicant, ApplicationReference, BibliographicFacts, ClassificationCode, ClassificationScheme,
    Inventor, PriorityClaim,
};
use crate::names;
use crate::navigate::{as_sequence, find_by_key_fragments, first_text};
use crate::priority::PriorityPolicy;

/// Identifier-type tag of the provider's preferred numbering scheme.
const CANONICAL_ID_TYPE: &str = "epodoc";

pub struct Extractor {
    policy: PriorityPolicy,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(PriorityPolicy::default())
    }
}

impl Extractor {
    pub fn new(policy: PriorityPolicy) -> Self {
        Self { policy }
    }

    /// Pull every field family out of one raw record.
    ///
    /// Families are independent: a malformed family degrades to its empty
    /// value while the rest of the record still extracts. An empty record
    /// yields empty facts, never an error.
    pub fn extract(&self, raw: &Value) -> BibliographicFacts {
        BibliographicFacts {
            title: extract_title(raw),
            applicants: extract_applicants(raw),
            inventors: extract_inventors(raw),
            priority_claims: self.extract_priority_claims(raw),
            classifications: extract_classifications(raw),
            application_reference: extract_application_reference(raw),
        }
    }

    fn extract_priority_claims(&self, raw: &Value) -> Vec<PriorityClaim> {
        let mut collected = Vec::new();
        let mut seen = HashSet::new();

        for occurrence in find_by_key_fragments(raw, &["priority-claim"]) {
            for entry in as_sequence(occurrence) {
                if !entry.is_object() {
                    continue;
                }
                let Some((country, number, date)) = canonical_doc_triple(&entry["document-id"])
                else {
                    continue;
                };
                let claim = self.policy.claim(&country, &number, &date);
                if seen.insert(claim.formatted.clone()) {
                    collected.push(claim);
                }
            }
        }

        self.policy.select(collected)
    }
}

/// Multiple language variants may be present; the English one wins, otherwise
/// the first non-empty variant.
fn extract_title(raw: &Value) -> Option<String> {
    let mut fallback = None;
    for occurrence in find_by_key_fragments(raw, &["invention-title"]) {
        for variant in as_sequence(occurrence) {
            let Some(text) = first_text(variant) else {
                continue;
            };
            if variant["@lang"].as_str() == Some("en") {
                return Some(text.to_string());
            }
            if fallback.is_none() {
                fallback = Some(text.to_string());
            }
        }
    }
    fallback
}

fn extract_applicants(raw: &Value) -> Vec<Applicant> {
    let entries = party_entries(raw, "applicant", "applicant-name");
    let chosen = prefer_original_format(entries);

    let mut applicants = Vec::new();
    let mut seen = HashSet::new();
    for entry in chosen {
        let Some(raw_name) = party_name(entry, "applicant-name") else {
            continue;
        };
        let (name, suffix_country) = names::clean_entity_name(&raw_name);
        if name.is_empty() || !seen.insert(names::dedup_key(&name)) {
            continue;
        }
        let country = residence_country(entry).or(suffix_country);
        applicants.push(Applicant {
            category: names::categorize(&name),
            name,
            country,
        });
    }
    applicants
}

fn extract_inventors(raw: &Value) -> Vec<Inventor> {
    let entries = party_entries(raw, "inventor", "inventor-name");
    let chosen = prefer_original_format(entries);

    let mut inventors = Vec::new();
    let mut seen = HashSet::new();
    for entry in chosen {
        let Some(raw_name) = party_name(entry, "inventor-name") else {
            continue;
        };
        let (_, suffix_country) = names::split_country_suffix(&raw_name);
        let name = names::normalize_name(&raw_name);
        if name.is_empty() || !seen.insert(name.clone()) {
            continue;
        }
        let country = residence_country(entry).or(suffix_country);
        inventors.push(Inventor { name, country });
    }
    inventors
}

fn extract_classifications(raw: &Value) -> Vec<ClassificationCode> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();
    let mut push = |codes: &mut Vec<ClassificationCode>, scheme, code: String| {
        if seen.insert((scheme, code.clone())) {
            codes.push(ClassificationCode { scheme, code });
        }
    };

    // IPC entries carry a text payload like "A61K  31/4525  20060101AFI…";
    // the subclass and group fields condense to "A61K31/4525".
    for occurrence in find_by_key_fragments(raw, &["classification-ipcr"]) {
        for entry in as_sequence(occurrence) {
            let Some(text) = first_text(&entry["text"]) else {
                continue;
            };
            let mut parts = text.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some(subclass), Some(group)) => {
                    push(&mut codes, ClassificationScheme::Ipc, format!("{subclass}{group}"));
                }
                _ => debug!(text, "skipping IPC entry without subclass and group"),
            }
        }
    }

    // CPC entries arrive as structured parts under the CPCI scheme.
    for occurrence in find_by_key_fragments(raw, &["patent-classification"]) {
        for entry in as_sequence(occurrence) {
            if entry["classification-scheme"]["@scheme"].as_str() != Some("CPCI") {
                continue;
            }
            let section = first_text(&entry["section"]);
            let class = first_text(&entry["class"]);
            let subclass = first_text(&entry["subclass"]);
            let main_group = first_text(&entry["main-group"]);
            let subgroup = first_text(&entry["subgroup"]);
            if let (Some(section), Some(class), Some(subclass), Some(main_group), Some(subgroup)) =
                (section, class, subclass, main_group, subgroup)
            {
                push(
                    &mut codes,
                    ClassificationScheme::Cpc,
                    format!("{section}{class}{subclass}{main_group}/{subgroup}"),
                );
            }
        }
    }

    codes
}

/// The occurrence tagged with the provider's canonical identifier scheme
/// wins; among several qualifying occurrences the first one is taken.
fn extract_application_reference(raw: &Value) -> Option<ApplicationReference> {
    for occurrence in find_by_key_fragments(raw, &["application-reference"]) {
        for reference in as_sequence(occurrence) {
            let Some(doc_id) = as_sequence(&reference["document-id"])
                .iter()
                .find(|id| id["@document-id-type"].as_str() == Some(CANONICAL_ID_TYPE))
            else {
                continue;
            };
            let Some(number) = first_text(&doc_id["doc-number"]) else {
                continue;
            };
            return Some(ApplicationReference {
                number: number.to_string(),
                filing_date: first_text(&doc_id["date"]).map(ToOwned::to_owned),
            });
        }
    }
    None
}

/// All party entries (applicant or inventor records) reachable under the key
/// fragment, in document order.
fn party_entries<'a>(raw: &'a Value, fragment: &str, name_key: &str) -> Vec<&'a Value> {
    let mut entries = Vec::new();
    for occurrence in find_by_key_fragments(raw, &[fragment]) {
        for entry in as_sequence(occurrence) {
            if entry.is_object() && !entry[name_key].is_null() {
                entries.push(entry);
            }
        }
    }
    entries
}

/// Entries tagged `@data-format == "original"` carry the names as filed;
/// epodoc renderings only fill in when no original-format entries exist.
fn prefer_original_format(entries: Vec<&Value>) -> Vec<&Value> {
    let originals: Vec<&Value> = entries
        .iter()
        .copied()
        .filter(|entry| entry["@data-format"].as_str() == Some("original"))
        .collect();
    if originals.is_empty() { entries } else { originals }
}

fn party_name(entry: &Value, name_key: &str) -> Option<String> {
    first_text(&entry[name_key]["name"])
        .or_else(|| first_text(&entry[name_key]))
        .map(ToOwned::to_owned)
}

fn residence_country(entry: &Value) -> Option<String> {
    first_text(&entry["residence"]["country"]).map(ToOwned::to_owned)
}

fn canonical_doc_triple(doc_ids: &Value) -> Option<(String, String, String)> {
    let ids = as_sequence(doc_ids);
    ids.iter()
        .find(|id| id["@document-id-type"].as_str() == Some(CANONICAL_ID_TYPE))
        .and_then(doc_id_triple)
        .or_else(|| ids.iter().find_map(doc_id_triple))
}

fn doc_id_triple(doc_id: &Value) -> Option<(String, String, String)> {
    let country = first_text(&doc_id["country"])?;
    let number = first_text(&doc_id["doc-number"])?;
    let date = first_text(&doc_id["date"])?;
    Some((country.to_string(), number.to_string(), date.to_string()))
}
