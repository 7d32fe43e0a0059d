//! SOAP transport bound to a fixed endpoint.
//!
//! The registry's WSDL declares a different address than the one the runtime
//! service answers on, and the service prefixes and suffixes its responses
//! with stray bytes that break strict XML parsing. The transport therefore
//! always dials its configured location and hands callers a repaired
//! envelope, never the raw response.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::config::GusConfig;
use crate::envelope::SoapCall;
use crate::error::GusError;

const ENVELOPE_OPEN_MARKER: &str = "<s:";
const ENVELOPE_CLOSE_MARKER: &str = "</s:Envelope>";

/// On-wire exchange for one call.
///
/// Implemented by [`SoapTransport`]; the client is generic over this trait
/// so tests can substitute a canned exchange.
#[async_trait]
pub trait SoapInvoker: Send + Sync {
    /// Send the call and return the repaired response envelope.
    async fn invoke(&self, call: &SoapCall) -> Result<String, GusError>;
}

/// HTTP transport for the BIR service.
///
/// Owns one `reqwest::Client` for its lifetime; no per-call state survives
/// an invocation. Transport failures propagate unchanged as
/// [`GusError::Http`]; there are no retries at this layer.
pub struct SoapTransport {
    http: reqwest::Client,
    location: String,
    extra_headers: Vec<(String, String)>,
}

impl SoapTransport {
    /// Build a transport dialing `config.service_address`.
    pub fn new(config: &GusConfig) -> Result<Self, GusError> {
        reqwest::Url::parse(&config.service_address)
            .map_err(|e| GusError::Config(format!("invalid service address: {e}")))?;

        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            location: config.service_address.clone(),
            extra_headers: Vec::new(),
        })
    }

    /// Override the effective endpoint. Every subsequent call dials this
    /// address regardless of what the interface description declares.
    pub fn set_location(&mut self, location: impl Into<String>) {
        self.location = location.into();
    }

    /// The currently configured endpoint.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Merge a persistent outbound HTTP header applied to subsequent
    /// invocations. Setting an already-present name replaces its value.
    pub fn set_http_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .extra_headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.extra_headers.push((name, value)),
        }
    }
}

#[async_trait]
impl SoapInvoker for SoapTransport {
    async fn invoke(&self, call: &SoapCall) -> Result<String, GusError> {
        let envelope = call.render();
        debug!(
            operation = call.request.name(),
            location = %self.location,
            "dispatching SOAP request"
        );

        let content_type = format!(
            "application/soap+xml; charset=utf-8; action=\"{}\"",
            call.headers.action
        );
        let mut request = self
            .http
            .post(&self.location)
            .header(CONTENT_TYPE, content_type);
        for (name, value) in &self.extra_headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(sid) = &call.headers.sid {
            request = request.header("sid", sid.as_str());
        }

        let response = request.body(envelope).send().await?;
        let raw = response.text().await?;
        Ok(repair_envelope(&raw))
    }
}

/// Cut the genuine SOAP envelope out of a raw BIR response.
///
/// The service wraps its envelope in MIME boundary material, so the raw text
/// carries junk before the envelope and a garbled or duplicated tail after
/// it. The repaired text runs from the first `<s:` marker up to (excluding)
/// the first `</s:Envelope>` after it, with a literal `</s:Envelope>`
/// appended. Both scans are case-insensitive. When either marker is missing
/// the result degenerates to the closing marker alone; downstream parsing
/// rejects such a document on its own.
///
/// The heuristic is deliberately lenient: it also masks genuinely malformed
/// responses as truncation artifacts. That matches the live service's
/// observed behavior and must not be tightened.
pub fn repair_envelope(raw: &str) -> String {
    let tail = match find_ignore_ascii_case(raw, ENVELOPE_OPEN_MARKER) {
        Some(start) => &raw[start..],
        None => "",
    };
    let kept = match find_ignore_ascii_case(tail, ENVELOPE_CLOSE_MARKER) {
        Some(end) => &tail[..end],
        None => "",
    };

    let mut repaired = String::with_capacity(kept.len() + ENVELOPE_CLOSE_MARKER.len());
    repaired.push_str(kept);
    repaired.push_str(ENVELOPE_CLOSE_MARKER);
    repaired
}

/// Byte offset of the first ASCII-case-insensitive occurrence of `needle`.
fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    // ASCII lowercasing preserves byte offsets, so indexes into the
    // lowered copy are valid in the original.
    haystack
        .to_ascii_lowercase()
        .find(&needle.to_ascii_lowercase())
}
