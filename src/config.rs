//! Configuration for the BIR client.

use serde::{Deserialize, Serialize};

/// Client configuration.
///
/// `service_address` is the endpoint every call is sent to. The WSDL the
/// registry publishes declares a different address than the one the runtime
/// service actually answers on, so the two are configured separately and the
/// WSDL address is never dialed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GusConfig {
    /// Address of the published WSDL (informational, never dialed).
    pub wsdl_address: String,

    /// Effective service endpoint; the destination of every call and the
    /// value of the WS-Addressing `To` header.
    pub service_address: String,

    /// User-Agent sent with every request.
    pub user_agent: String,

    /// Request timeout in seconds, enforced by the HTTP client.
    pub timeout_secs: u64,
}

impl Default for GusConfig {
    fn default() -> Self {
        GusConfig::for_environment(Environment::Production)
    }
}

impl GusConfig {
    /// Configuration for one of the published BIR environments.
    pub fn for_environment(env: Environment) -> Self {
        Self {
            wsdl_address: env.wsdl_address().to_string(),
            service_address: env.service_address().to_string(),
            user_agent: concat!("gus-bir/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 30,
        }
    }
}

/// Published BIR deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Live registry data; requires a registered user key.
    Production,
    /// Test deployment with sample data.
    Test,
}

impl Environment {
    /// Address of the interface description for this deployment.
    pub fn wsdl_address(&self) -> &'static str {
        match self {
            Environment::Production => {
                "https://wyszukiwarkaregon.stat.gov.pl/wsBIR/wsdl/UslugaBIRzewnPubl.wsdl"
            }
            Environment::Test => {
                "https://wyszukiwarkaregontest.stat.gov.pl/wsBIR/wsdl/UslugaBIRzewnPubl.wsdl"
            }
        }
    }

    /// Runtime endpoint actually answering calls for this deployment.
    pub fn service_address(&self) -> &'static str {
        match self {
            Environment::Production => {
                "https://wyszukiwarkaregon.stat.gov.pl/wsBIR/UslugaBIRzewnPubl.svc"
            }
            Environment::Test => {
                "https://wyszukiwarkaregontest.stat.gov.pl/wsBIR/UslugaBIRzewnPubl.svc"
            }
        }
    }
}
