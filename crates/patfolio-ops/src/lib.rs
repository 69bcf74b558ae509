//! Patfolio OPS — authenticated, rate-limited access to the EPO Open Patent
//! Services REST gateway.

pub mod auth;
pub mod client;
pub mod epnumber;
pub mod error;
pub mod http;
pub mod ipc;

pub use auth::{Credentials, TokenManager};
pub use client::{BiblioResponse, IpcSearchHit, IpcSearchResult, OpsClient, OpsConfig};
pub use epnumber::EpNumber;
pub use error::{OpsError, Result};
pub use ipc::IpcSubclass;
