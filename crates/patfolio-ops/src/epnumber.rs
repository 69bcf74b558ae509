use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{OpsError, Result};

static EP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:EP)?(\d+)(?:[AB]\d?)?$").expect("valid regex"));

/// An EP publication number in epodoc form.
///
/// Accepts bare numbers (`3377490`), prefixed ones with a kind code
/// (`EP19196837A`), and Espacenet deeplinks carrying the number after the
/// last `=`. Leading zeros are era-sensitive: 2000s-era eight-digit serials
/// keep their single leading zero, everything else is zero-stripped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpNumber {
    pub raw: String,
    pub serial: String,
}

impl EpNumber {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let candidate = match input.rsplit_once('=') {
            Some((_, tail)) => tail.trim(),
            None => input,
        };
        let upper = candidate.to_ascii_uppercase();

        let digits = EP_RE
            .captures(&upper)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .ok_or_else(|| OpsError::InvalidPublicationNumber(input.to_string()))?;

        let serial = if digits.starts_with('0') && digits.len() == 8 {
            // 2000s-era serials keep the leading zero.
            digits.to_string()
        } else {
            let stripped = digits.trim_start_matches('0');
            if stripped.is_empty() {
                digits.to_string()
            } else {
                stripped.to_string()
            }
        };

        Ok(Self {
            raw: input.to_string(),
            serial,
        })
    }

    /// Canonical epodoc rendering, `EP{serial}`.
    pub fn epodoc(&self) -> String {
        format!("EP{}", self.serial)
    }

    /// Endpoint renderings to try in order: the era-aware serial first, then
    /// the fully zero-stripped alternate some records are filed under.
    pub fn endpoint_candidates(&self) -> Vec<String> {
        let mut candidates = vec![self.epodoc()];
        let stripped = self.serial.trim_start_matches('0');
        if !stripped.is_empty() && stripped != self.serial {
            candidates.push(format!("EP{stripped}"));
        }
        candidates
    }
}

impl std::fmt::Display for EpNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.epodoc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_publication_number_with_kind_code() {
        let number = EpNumber::parse("EP19196837A").unwrap();
        assert_eq!(number.serial, "19196837");
        assert_eq!(number.epodoc(), "EP19196837");
        assert_eq!(number.endpoint_candidates(), vec!["EP19196837"]);
    }

    #[test]
    fn espacenet_deeplink_yields_the_trailing_number() {
        let link = "https://worldwide.espacenet.com/searchResults?query=EP3377490A1";
        let number = EpNumber::parse(link).unwrap();
        assert_eq!(number.serial, "3377490");
    }

    #[test]
    fn eight_digit_serial_keeps_its_leading_zero() {
        let number = EpNumber::parse("EP08150237").unwrap();
        assert_eq!(number.serial, "08150237");
        assert_eq!(
            number.endpoint_candidates(),
            vec!["EP08150237", "EP8150237"]
        );
    }

    #[test]
    fn double_leading_zeros_are_stripped() {
        let number = EpNumber::parse("EP00123456").unwrap();
        assert_eq!(number.serial, "123456");
    }

    #[test]
    fn lowercase_and_whitespace_are_tolerated() {
        let number = EpNumber::parse("  ep3377490b1 ").unwrap();
        assert_eq!(number.serial, "3377490");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(EpNumber::parse("not-a-number").is_err());
        assert!(EpNumber::parse("").is_err());
        assert!(EpNumber::parse("US1234567").is_err());
    }
}
