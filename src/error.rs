//! Error types for the BIR client.

use thiserror::Error;

/// Errors surfaced by BIR operations.
///
/// `Http`, `Fault` and `InvalidResponse` are all protocol-level failures and
/// propagate unchanged from the call that triggered them; nothing is retried
/// or swallowed internally. `NoData` is a domain condition, not a failure:
/// the registry answers "no matching records" with a degenerate report
/// document, and `search`/`get_full_report` translate that into this variant.
#[derive(Error, Debug)]
pub enum GusError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SOAP fault {code}: {reason}")]
    Fault { code: String, reason: String },

    #[error("Invalid response envelope: {0}")]
    InvalidResponse(String),

    #[error("No data found for the given criteria")]
    NoData,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GusError {
    /// True for the "no matching records" domain condition.
    pub fn is_no_data(&self) -> bool {
        matches!(self, GusError::NoData)
    }
}
