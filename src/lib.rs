//! Client for the Polish GUS REGON business registry (BIR) SOAP service.
//!
//! Covers session login/logout, captcha retrieval/validation, entity search,
//! full-report retrieval and single-value lookups over the registry's
//! SOAP 1.2 interface.
//!
//! # Features
//!
//! - Per-call WS-Addressing headers (`Action`, `To`) with session-id
//!   propagation via the `sid` transport header
//! - Fixed-endpoint transport that never trusts the WSDL-declared address
//! - Repair of the truncated/garbled envelopes the live service emits
//! - "No matching records" reported as a domain condition, not a parse error
//!
//! # Example
//!
//! ```ignore
//! use gus_bir::{Environment, GusClient, SearchParameters};
//!
//! let client = GusClient::for_environment(Environment::Test)?;
//! let sid = client.login("abcde12345abcde12345").await?;
//! let entities = client.search(&sid, SearchParameters::by_regon("123456785")).await?;
//! client.logout(&sid).await?;
//! ```

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod response;
pub mod transport;

pub use client::{reports, values, GusClient, SearchParameters};
pub use config::{Environment, GusConfig};
pub use error::GusError;
pub use response::DataRecord;
pub use transport::{SoapInvoker, SoapTransport};
