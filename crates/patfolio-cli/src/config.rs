use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use patfolio_core::PriorityPolicy;
use patfolio_ops::OpsConfig;

/// Default config file looked for in the working directory.
const DEFAULT_CONFIG_FILE: &str = "patfolio.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub ops: OpsSettings,
    pub analysis: AnalysisConfig,
    pub policy: PriorityPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub input_file: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            input_file: PathBuf::from("data/deeptechfinder.csv"),
            output_dir: PathBuf::from("output"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpsSettings {
    pub base_url: String,
    pub auth_url: String,
    pub rate_limit_ms: u64,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub cache_ttl_days: u64,
}

impl Default for OpsSettings {
    fn default() -> Self {
        let ops = OpsConfig::default();
        Self {
            base_url: ops.base_url,
            auth_url: ops.auth_url,
            rate_limit_ms: ops.min_interval.as_millis() as u64,
            timeout_secs: ops.timeout.as_secs(),
            max_retries: ops.max_retries,
            cache_ttl_days: 7,
        }
    }
}

impl OpsSettings {
    pub fn to_client_config(&self) -> OpsConfig {
        OpsConfig {
            base_url: self.base_url.clone(),
            auth_url: self.auth_url.clone(),
            min_interval: Duration::from_millis(self.rate_limit_ms),
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            cache_ttl: Duration::from_secs(self.cache_ttl_days * 24 * 3600),
            ..OpsConfig::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub default_patent_limit: usize,
    pub min_patent_limit: usize,
    pub max_patent_limit: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_patent_limit: 25,
            min_patent_limit: 1,
            max_patent_limit: 200,
        }
    }
}

impl AnalysisConfig {
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_patent_limit)
            .clamp(self.min_patent_limit, self.max_patent_limit)
    }
}

impl AppConfig {
    /// Load from an explicit path (errors if unreadable), or from
    /// `patfolio.toml` in the working directory when present, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(explicit) => Self::from_file(explicit),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_when_sections_are_partial() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [data]
            input_file = "fixtures/index.csv"

            [policy]
            domestic_country = "FR"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.data.input_file, PathBuf::from("fixtures/index.csv"));
        assert_eq!(parsed.data.output_dir, PathBuf::from("output"));
        assert_eq!(parsed.policy.domestic_country, "FR");
        assert_eq!(parsed.policy.regional_code, "EP");
        assert_eq!(parsed.analysis.default_patent_limit, 25);
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        assert!(AppConfig::load(Some(Path::new("/nonexistent/patfolio.toml"))).is_err());
    }

    #[test]
    fn config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patfolio.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[analysis]\nmax_patent_limit = 50").unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.analysis.max_patent_limit, 50);
        assert_eq!(config.analysis.clamp_limit(Some(500)), 50);
        assert_eq!(config.analysis.clamp_limit(None), 25);
    }
}
