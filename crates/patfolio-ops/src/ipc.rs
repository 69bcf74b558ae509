use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{OpsError, Result};

// Subclass level only: letter, two digits, letter (A61K, B66B, H01L, …).
static IPC_SUBCLASS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-H]\d{2}[A-Z]$").expect("valid regex"));

/// A four-character IPC subclass, the only granularity the search endpoint
/// accepts here. Trailing wildcards are tolerated and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpcSubclass(String);

impl IpcSubclass {
    pub fn parse(input: &str) -> Result<Self> {
        let cleaned = input.trim().trim_end_matches('*').to_ascii_uppercase();
        if IPC_SUBCLASS_RE.is_match(&cleaned) {
            Ok(Self(cleaned))
        } else {
            Err(OpsError::InvalidIpcSubclass(input.to_string()))
        }
    }

    pub fn code(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IpcSubclass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
