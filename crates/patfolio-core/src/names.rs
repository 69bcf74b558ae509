//! Canonicalization of person and organization names.
//!
//! The provider serves the same entity under cosmetic variants: all-caps
//! epodoc renderings, shuffled comma order, a trailing `[XX]` country tag.
//! `normalize_name` folds person names onto one canonical `"Family, Given"`
//! form; organizations keep their word order and only lose the cosmetic noise.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::facts::ApplicantCategory;

static COUNTRY_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\[([^\]]*)\]\s*$").expect("valid regex"));
static TRAILING_PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.,;]+$").expect("valid regex"));
static DR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bDr\.\s*").expect("valid regex"));
static PROF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bProf\.\s*").expect("valid regex"));

/// Indicator terms marking an applicant as academic. First match wins;
/// matching is against the lowercased name.
const UNIVERSITY_TERMS: &[&str] = &[
    "university",
    "universität",
    "universitaet",
    "technische",
    "hochschule",
    "college",
    "institut",
    "tu ",
];

/// Strip a trailing bracketed suffix, returning the remaining name and the
/// country code when the suffix is a two-letter code (`"Smith John [DE]"`).
pub fn split_country_suffix(raw: &str) -> (String, Option<String>) {
    match COUNTRY_SUFFIX_RE.captures(raw) {
        Some(caps) => {
            let inner = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            let country = (inner.len() == 2 && inner.chars().all(|c| c.is_ascii_alphabetic()))
                .then(|| inner.to_ascii_uppercase());
            let name = COUNTRY_SUFFIX_RE.replace(raw, "").trim().to_string();
            (name, country)
        }
        None => (raw.trim().to_string(), None),
    }
}

/// Canonicalize a person name. Idempotent: normalizing an already-normalized
/// name returns it unchanged.
///
/// `"SMITH, JOHN"`, `"Smith John [DE]"` and `"smith,john"` all come out as
/// `"Smith, John"`. Mixed-case components ("McDonald", "van der Berg") are
/// preserved as written.
pub fn normalize_name(raw: &str) -> String {
    let (base, _) = split_country_suffix(raw);
    let collapsed = collapse_whitespace(&base);
    let trimmed = TRAILING_PUNCT_RE.replace(&collapsed, "").trim().to_string();
    if trimmed.is_empty() {
        return String::new();
    }

    let normalized = match trimmed.matches(',').count() {
        1 => {
            let (family, given) = trimmed.split_once(',').unwrap_or((trimmed.as_str(), ""));
            join_family_given(family.trim(), given.trim())
        }
        0 => {
            let mut tokens = trimmed.split_whitespace();
            let family = tokens.next().unwrap_or_default();
            let given = tokens.collect::<Vec<_>>().join(" ");
            join_family_given(family, &given)
        }
        // More than one comma: not a Family/Given shape we understand.
        _ => fix_case(&trimmed),
    };

    respace_honorifics(&normalized)
}

/// Cosmetic-only cleanup for organization names: country suffix, whitespace
/// and trailing punctuation go; word order and casing stay.
pub fn clean_entity_name(raw: &str) -> (String, Option<String>) {
    let (base, country) = split_country_suffix(raw);
    let collapsed = collapse_whitespace(&base);
    let cleaned = TRAILING_PUNCT_RE.replace(&collapsed, "").trim().to_string();
    (cleaned, country)
}

/// Key under which two cosmetic variants of the same entity collide.
pub fn dedup_key(name: &str) -> String {
    normalize_name(name).to_uppercase()
}

/// Academic-vocabulary classification; anything unmatched is industry.
pub fn categorize(name: &str) -> ApplicantCategory {
    let lower = name.to_lowercase();
    if UNIVERSITY_TERMS.iter().any(|term| lower.contains(term)) {
        ApplicantCategory::University
    } else {
        ApplicantCategory::IndustryOther
    }
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn join_family_given(family: &str, given: &str) -> String {
    match (family.is_empty(), given.is_empty()) {
        (true, true) => String::new(),
        (true, false) => fix_case(given),
        (false, true) => fix_case(family),
        (false, false) => format!("{}, {}", fix_case(family), fix_case(given)),
    }
}

/// Title-case single-cased components (all-upper or all-lower); leave
/// mixed-case components as written.
fn fix_case(component: &str) -> String {
    let has_upper = component.chars().any(char::is_uppercase);
    let has_lower = component.chars().any(char::is_lowercase);
    if has_upper && has_lower {
        component.to_string()
    } else {
        title_case(component)
    }
}

fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut at_word_start = true;
    for ch in value.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}

fn respace_honorifics(name: &str) -> String {
    let step = DR_RE.replace_all(name, "Dr. ");
    let step = PROF_RE.replace_all(&step, "Prof. ");
    step.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_case_and_country_variants_collapse_to_one_form() {
        assert_eq!(normalize_name("SMITH, JOHN"), "Smith, John");
        assert_eq!(normalize_name("Smith John [DE]"), "Smith, John");
        assert_eq!(normalize_name("smith,john"), "Smith, John");
        assert_eq!(normalize_name("Smith , John"), "Smith, John");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in [
            "SMITH, JOHN",
            "Smith John [DE]",
            "MÜLLER-SCHMIDT, HANS PETER",
            "McDonald, Ewan",
            "Dr.Weber, Anna",
            "O'BRIEN PATRICK",
            "van der Berg, Jan",
        ] {
            let once = normalize_name(raw);
            assert_eq!(normalize_name(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn mixed_case_components_are_preserved() {
        assert_eq!(normalize_name("McDonald, Ewan"), "McDonald, Ewan");
        assert_eq!(normalize_name("van der Berg, Jan"), "van der Berg, Jan");
    }

    #[test]
    fn all_caps_umlauts_and_hyphens_title_case() {
        assert_eq!(
            normalize_name("MÜLLER-SCHMIDT, HANS PETER"),
            "Müller-Schmidt, Hans Peter"
        );
        assert_eq!(normalize_name("O'BRIEN, PATRICK"), "O'Brien, Patrick");
    }

    #[test]
    fn honorifics_get_canonical_spacing_and_are_kept() {
        assert_eq!(normalize_name("Weber, Dr.Anna"), "Weber, Dr. Anna");
        assert_eq!(normalize_name("Weber, Prof.  Anna"), "Weber, Prof. Anna");
    }

    #[test]
    fn country_suffix_is_recorded_separately() {
        let (name, country) = split_country_suffix("Smith John [DE]");
        assert_eq!(name, "Smith John");
        assert_eq!(country.as_deref(), Some("DE"));

        let (name, country) = split_country_suffix("Acme GmbH [unknown]");
        assert_eq!(name, "Acme GmbH");
        assert_eq!(country, None);

        assert_eq!(split_country_suffix("Plain Name").1, None);
    }

    #[test]
    fn trailing_punctuation_is_dropped() {
        assert_eq!(normalize_name("SMITH, John,,"), "Smith, John");
        assert_eq!(normalize_name("Smith, John;"), "Smith, John");
    }

    #[test]
    fn single_token_names_survive() {
        assert_eq!(normalize_name("SIEMENS"), "Siemens");
        assert_eq!(normalize_name("  "), "");
    }

    #[test]
    fn entity_cleanup_keeps_word_order() {
        let (name, country) = clean_entity_name("TECHNISCHE UNIVERSITAET CHEMNITZ [DE]");
        assert_eq!(name, "TECHNISCHE UNIVERSITAET CHEMNITZ");
        assert_eq!(country.as_deref(), Some("DE"));
    }

    #[test]
    fn academic_vocabulary_classifies_universities() {
        assert_eq!(
            categorize("Technische Universität Chemnitz"),
            ApplicantCategory::University
        );
        assert_eq!(
            categorize("FRAUNHOFER-GESELLSCHAFT ZUR FÖRDERUNG DER ANGEWANDTEN FORSCHUNG E.V."),
            ApplicantCategory::IndustryOther
        );
        assert_eq!(categorize("Siemens AG"), ApplicantCategory::IndustryOther);
        assert_eq!(categorize("Imperial College London"), ApplicantCategory::University);
    }

    #[test]
    fn dedup_key_merges_cosmetic_variants() {
        assert_eq!(dedup_key("SMITH, JOHN"), dedup_key("Smith John [DE]"));
        assert_ne!(dedup_key("Smith, John"), dedup_key("Smith, Jane"));
    }
}
