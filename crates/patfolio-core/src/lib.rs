//! Patfolio Core — schema navigation, bibliographic fact extraction, name
//! normalization, priority-claim formatting and batch aggregation.
//!
//! Everything in this crate is pure: no I/O, no shared state. Missing or
//! malformed provider data degrades to empty values, it never errors.

pub mod aggregate;
pub mod extract;
pub mod facts;
pub mod names;
pub mod navigate;
pub mod priority;

pub use aggregate::{BatchStatistics, TopApplicant, TopEntry};
pub use extract::Extractor;
pub use facts::{
    Applicant, ApplicantCategory, ApplicationReference, BibliographicFacts, ClassificationCode,
    ClassificationScheme, Inventor, PriorityClaim,
};
pub use priority::PriorityPolicy;
