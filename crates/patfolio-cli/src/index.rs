//! Reader for the DeepTechFinder university-patent index.
//!
//! The upstream export is not reliably UTF-8; decoding walks a fixed fallback
//! sequence instead of failing or replacing characters. An unreadable file is
//! fatal, a malformed field inside a row never is — it degrades to a default.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct PatentApplication {
    pub university: String,
    pub espacenet_link: String,
    pub filing_year: String,
    pub patent_status: String,
    pub technical_field: String,
    pub application_title: String,
    pub total_students: u32,
    pub total_applications: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct UniversityStats {
    pub university: String,
    pub total_students: u32,
    pub total_applications: usize,
    pub granted: usize,
    pub grant_rate: f64,
}

pub struct UniversityIndex {
    rows: Vec<PatentApplication>,
    encoding: &'static str,
}

struct Columns {
    university: usize,
    espacenet_link: usize,
    filing_year: usize,
    patent_status: usize,
    technical_field: usize,
    application_title: usize,
    total_students: Option<usize>,
    total_applications: Option<usize>,
}

impl UniversityIndex {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read index {}", path.display()))?;
        let (text, encoding) = decode_with_fallback(&bytes);

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());
        let headers = reader
            .headers()
            .with_context(|| format!("index {} has no header row", path.display()))?
            .clone();
        let columns = Columns::resolve(&headers)?;

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(err) => {
                    warn!(line = line + 2, error = %err, "skipping unparseable index row");
                    continue;
                }
            };
            rows.push(columns.row(&record));
        }

        info!(
            rows = rows.len(),
            encoding,
            path = %path.display(),
            "loaded university patent index"
        );
        Ok(Self { rows, encoding })
    }

    pub fn encoding(&self) -> &'static str {
        self.encoding
    }

    pub fn rows(&self) -> &[PatentApplication] {
        &self.rows
    }

    /// Distinct university names, sorted.
    pub fn universities(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .rows
            .iter()
            .map(|row| row.university.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Index rows for one university (exact name match), capped at `limit`.
    pub fn patents_for(&self, university: &str, limit: usize) -> Vec<&PatentApplication> {
        self.rows
            .iter()
            .filter(|row| row.university == university)
            .take(limit)
            .collect()
    }

    /// Per-university grant statistics from the index alone, most active
    /// university first.
    pub fn university_statistics(&self) -> Vec<UniversityStats> {
        let mut stats: Vec<UniversityStats> = self
            .universities()
            .into_iter()
            .map(|university| {
                let rows: Vec<&PatentApplication> = self
                    .rows
                    .iter()
                    .filter(|row| row.university == university)
                    .collect();
                let total_applications = rows.len();
                let granted = rows
                    .iter()
                    .filter(|row| row.patent_status == "EP granted")
                    .count();
                UniversityStats {
                    total_students: rows.first().map(|row| row.total_students).unwrap_or(0),
                    grant_rate: if total_applications == 0 {
                        0.0
                    } else {
                        granted as f64 / total_applications as f64 * 100.0
                    },
                    university,
                    total_applications,
                    granted,
                }
            })
            .collect();
        stats.sort_by(|a, b| b.total_applications.cmp(&a.total_applications));
        stats
    }
}

impl Columns {
    fn resolve(headers: &csv::StringRecord) -> Result<Self> {
        let position = |name: &str| headers.iter().position(|header| header == name);
        let required = |name: &str| -> Result<usize> {
            match position(name) {
                Some(index) => Ok(index),
                None => bail!("index is missing required column {name:?}"),
            }
        };

        Ok(Self {
            university: required("University")?,
            espacenet_link: required("Espacenet_link")?,
            filing_year: required("Filing_year")?,
            patent_status: required("Patent_status")?,
            technical_field: required("Technical_field")?,
            application_title: required("Application_title")?,
            total_students: position("Total_students"),
            total_applications: position("Total_number_of_applications"),
        })
    }

    fn row(&self, record: &csv::StringRecord) -> PatentApplication {
        let text = |index: usize| record.get(index).unwrap_or_default().trim().to_string();
        let number = |index: Option<usize>| {
            index
                .and_then(|i| record.get(i))
                .and_then(|value| value.trim().parse::<u32>().ok())
                .unwrap_or(0)
        };

        PatentApplication {
            university: text(self.university),
            espacenet_link: text(self.espacenet_link),
            filing_year: text(self.filing_year),
            patent_status: text(self.patent_status),
            technical_field: text(self.technical_field),
            application_title: text(self.application_title),
            total_students: number(self.total_students),
            total_applications: number(self.total_applications),
        }
    }
}

/// Fixed decoding fallback sequence: strict UTF-8, then windows-1252, then
/// raw Latin-1 as the never-failing last resort.
fn decode_with_fallback(bytes: &[u8]) -> (String, &'static str) {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return (text.to_string(), "utf-8");
    }
    let (text, had_errors) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
    if !had_errors {
        return (text.into_owned(), "windows-1252");
    }
    (
        encoding_rs::mem::decode_latin1(bytes).into_owned(),
        "iso-8859-1",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "University,Espacenet_link,Filing_year,Patent_status,Technical_field,Application_title,Total_students,Total_number_of_applications\n";

    fn write_index(bytes: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        (dir, path)
    }

    #[test]
    fn reads_utf8_index_and_filters_by_university() {
        let csv = format!(
            "{HEADER}TU Dresden,https://example.org?q=EP19196837A,2019,EP granted,Sensors,Title A,32000,120\n\
             TU Dresden,https://example.org?q=EP3377490A,2018,EP granted,Optics,Title B,32000,120\n\
             TU Chemnitz,https://example.org?q=EP3000000A,2017,Pending,Materials,Title C,9000,40\n"
        );
        let (_dir, path) = write_index(csv.as_bytes());

        let index = UniversityIndex::load(&path).unwrap();
        assert_eq!(index.encoding(), "utf-8");
        assert_eq!(index.universities(), vec!["TU Chemnitz", "TU Dresden"]);
        assert_eq!(index.patents_for("TU Dresden", 10).len(), 2);
        assert_eq!(index.patents_for("TU Dresden", 1).len(), 1);
        assert!(index.patents_for("Unknown", 10).is_empty());
    }

    #[test]
    fn latin1_bytes_fall_back_without_mangling_umlauts() {
        // "Universität" with 0xE4 — invalid as UTF-8, valid windows-1252.
        let mut csv = HEADER.as_bytes().to_vec();
        csv.extend_from_slice(b"Universit\xe4t Leipzig,link=EP1,2019,EP granted,Chemie,Titel,15000,30\n");
        let (_dir, path) = write_index(&csv);

        let index = UniversityIndex::load(&path).unwrap();
        assert_eq!(index.encoding(), "windows-1252");
        assert_eq!(index.rows()[0].university, "Universität Leipzig");
    }

    #[test]
    fn malformed_numeric_fields_degrade_to_zero() {
        let csv = format!("{HEADER}TU Dresden,link=EP1,2019,EP granted,Sensors,Title,n/a,\n");
        let (_dir, path) = write_index(csv.as_bytes());

        let index = UniversityIndex::load(&path).unwrap();
        assert_eq!(index.rows()[0].total_students, 0);
        assert_eq!(index.rows()[0].total_applications, 0);
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let (_dir, path) = write_index(b"University,Filing_year\nTU Dresden,2019\n");
        assert!(UniversityIndex::load(&path).is_err());
    }

    #[test]
    fn grant_statistics_rank_by_activity() {
        let csv = format!(
            "{HEADER}A,link=EP1,2019,EP granted,F,T,100,2\n\
             A,link=EP2,2019,Pending,F,T,100,2\n\
             B,link=EP3,2019,EP granted,F,T,50,1\n"
        );
        let (_dir, path) = write_index(csv.as_bytes());

        let stats = UniversityIndex::load(&path).unwrap().university_statistics();
        assert_eq!(stats[0].university, "A");
        assert_eq!(stats[0].granted, 1);
        assert_eq!(stats[0].grant_rate, 50.0);
        assert_eq!(stats[1].university, "B");
        assert_eq!(stats[1].grant_rate, 100.0);
    }
}
