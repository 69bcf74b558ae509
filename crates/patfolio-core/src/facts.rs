use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicantCategory {
    University,
    IndustryOther,
}

impl ApplicantCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::University => "University",
            Self::IndustryOther => "Industry/Other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Applicant {
    pub name: String,
    pub category: ApplicantCategory,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inventor {
    pub name: String,
    pub country: Option<String>,
}

/// One earlier filing a record claims priority from. `formatted` is a pure
/// function of the other three fields (see [`crate::priority::PriorityPolicy`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityClaim {
    pub country: String,
    pub number: String,
    pub date: String,
    pub formatted: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassificationScheme {
    Ipc,
    Cpc,
}

impl ClassificationScheme {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ipc => "IPC",
            Self::Cpc => "CPC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationCode {
    pub scheme: ClassificationScheme,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationReference {
    pub number: String,
    pub filing_date: Option<String>,
}

/// Normalized view of one provider record. Names within one facts value are
/// unique by normalized value; sequences keep provider order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BibliographicFacts {
    pub title: Option<String>,
    pub applicants: Vec<Applicant>,
    pub inventors: Vec<Inventor>,
    pub priority_claims: Vec<PriorityClaim>,
    pub classifications: Vec<ClassificationCode>,
    pub application_reference: Option<ApplicationReference>,
}

impl BibliographicFacts {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.applicants.is_empty()
            && self.inventors.is_empty()
            && self.priority_claims.is_empty()
            && self.classifications.is_empty()
            && self.application_reference.is_none()
    }
}
