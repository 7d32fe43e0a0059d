//! Operation-per-method client for the BIR service.
//!
//! Each public method builds a fresh per-call header set (WS-Addressing
//! `Action` and `To`, plus the `sid` transport header on session-bound
//! operations), hands the call to the transport, and unwraps the named
//! result field of the response. `search` and `get_full_report` additionally
//! decode the embedded report document. The client holds no session state;
//! the caller owns the login/logout lifecycle and must serialize calls when
//! sharing one instance across tasks.

use tracing::debug;

use crate::config::{Environment, GusConfig};
use crate::envelope::{CallHeaders, OperationRequest, SoapCall};
use crate::error::GusError;
use crate::response::{decode_payload, extract_result, DataRecord};
use crate::transport::{SoapInvoker, SoapTransport};

/// Namespace of the public-search service operations.
const BIR_PUBL_NS: &str = "http://CIS/BIR/PUBL/2014/07";
/// Namespace of the captcha/value service operations.
const BIR_NS: &str = "http://CIS/BIR/2014/07";
/// Namespace of the search-parameter data contract.
const SEARCH_CONTRACT_NS: &str = "http://CIS/BIR/PUBL/2014/07/DataContract";

/// Action URIs identifying each remote operation. Exact strings are part of
/// the wire contract.
mod actions {
    pub const LOGIN: &str = "http://CIS/BIR/PUBL/2014/07/IUslugaBIRzewnPubl/Zaloguj";
    pub const LOGOUT: &str = "http://CIS/BIR/PUBL/2014/07/IUslugaBIRzewnPubl/Wyloguj";
    pub const GET_CAPTCHA: &str = "http://CIS/BIR/2014/07/IUslugaBIR/PobierzCaptcha";
    pub const CHECK_CAPTCHA: &str = "http://CIS/BIR/2014/07/IUslugaBIR/SprawdzCaptcha";
    pub const SEARCH: &str = "http://CIS/BIR/PUBL/2014/07/IUslugaBIRzewnPubl/DaneSzukaj";
    pub const GET_FULL_REPORT: &str =
        "http://CIS/BIR/PUBL/2014/07/IUslugaBIRzewnPubl/DanePobierzPelnyRaport";
    pub const GET_VALUE: &str = "http://CIS/BIR/2014/07/IUslugaBIR/GetValue";
    pub const GET_MESSAGE: &str = "http://CIS/BIR/PUBL/2014/07/IUslugaBIRzewnPubl/DaneKomunikat";
}

/// Request parameter element names.
mod params {
    pub const USER_KEY: &str = "pKluczUzytkownika";
    pub const SESSION_ID: &str = "pIdentyfikatorSesji";
    pub const CAPTCHA: &str = "pCaptcha";
    pub const SEARCH: &str = "pParametryWyszukiwania";
    pub const REGON: &str = "pRegon";
    pub const REPORT_NAME: &str = "pNazwaRaportu";
    pub const PARAM_NAME: &str = "pNazwaParametru";
}

/// Full-report type names accepted by [`GusClient::get_full_report`].
pub mod reports {
    /// Legal person (KRS entity).
    pub const LEGAL_PERSON: &str = "PublDaneRaportPrawna";
    /// Natural person registered in CEIDG.
    pub const NATURAL_PERSON_CEIDG: &str = "PublDaneRaportDzialalnoscFizycznejCeidg";
    /// Natural person running agricultural activity.
    pub const NATURAL_PERSON_AGRICULTURE: &str = "PublDaneRaportDzialalnoscFizycznejRolnicza";
    /// Natural person, other activity.
    pub const NATURAL_PERSON_OTHER: &str = "PublDaneRaportDzialalnoscFizycznejPozostala";
    /// Local unit of a legal person.
    pub const LOCAL_UNIT_LEGAL_PERSON: &str = "PublDaneRaportLokalnaPrawnej";
    /// Local unit of a natural person.
    pub const LOCAL_UNIT_NATURAL_PERSON: &str = "PublDaneRaportLokalnaFizycznej";
    /// Unit type discriminator report.
    pub const UNIT_TYPE: &str = "PublDaneRaportTypJednostki";
}

/// Parameter names accepted by [`GusClient::get_value`].
pub mod values {
    /// Whether the current session is alive ("1"/"0").
    pub const SESSION_STATUS: &str = "StatusSesji";
    /// Availability status of the service itself.
    pub const SERVICE_STATUS: &str = "StatusUslugi";
    /// Human-readable service message.
    pub const SERVICE_MESSAGE: &str = "KomunikatUslugi";
    /// Numeric code of the last error.
    pub const MESSAGE_CODE: &str = "KomunikatKod";
}

/// Search criteria, passed through to the server unvalidated.
///
/// The registry accepts field names such as `Regon`, `Nip` and `Krs` (plus
/// their bulk variants); using an unsupported name is rejected server-side,
/// not here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParameters {
    fields: Vec<(String, String)>,
}

impl SearchParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one criterion. Order is preserved on the wire.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn by_regon(regon: impl Into<String>) -> Self {
        Self::new().field("Regon", regon)
    }

    pub fn by_nip(nip: impl Into<String>) -> Self {
        Self::new().field("Nip", nip)
    }

    pub fn by_krs(krs: impl Into<String>) -> Self {
        Self::new().field("Krs", krs)
    }

    fn into_fields(self) -> Vec<(String, String)> {
        self.fields
    }
}

/// Client for the BIR SOAP service, generic over the transport so tests can
/// substitute a canned exchange.
pub struct GusClient<T: SoapInvoker = SoapTransport> {
    transport: T,
    /// Destination carried in the WS-Addressing `To` header of every call.
    address: String,
}

impl GusClient<SoapTransport> {
    /// Build a client over an HTTP transport dialing
    /// `config.service_address`.
    pub fn new(config: &GusConfig) -> Result<Self, GusError> {
        Ok(Self {
            transport: SoapTransport::new(config)?,
            address: config.service_address.clone(),
        })
    }

    /// Client for one of the published BIR deployments.
    pub fn for_environment(env: Environment) -> Result<Self, GusError> {
        Self::new(&GusConfig::for_environment(env))
    }

    /// Mutable access to the transport, for endpoint or header overrides.
    pub fn transport_mut(&mut self) -> &mut SoapTransport {
        &mut self.transport
    }
}

impl<T: SoapInvoker> GusClient<T> {
    /// Build a client over an arbitrary transport.
    pub fn with_transport(transport: T, address: impl Into<String>) -> Self {
        Self {
            transport,
            address: address.into(),
        }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Open a session; the returned sid is required by every operation
    /// except [`get_message`](Self::get_message). Returned verbatim from
    /// the server, unprocessed.
    pub async fn login(&self, user_key: &str) -> Result<String, GusError> {
        let request = OperationRequest::new("Zaloguj", BIR_PUBL_NS).param(params::USER_KEY, user_key);
        let sid = self
            .call(actions::LOGIN, None, request, "ZalogujResult")
            .await?;
        debug!("session established");
        Ok(sid)
    }

    /// Close the session server-side. The sid stays caller-held; no local
    /// state changes.
    pub async fn logout(&self, sid: &str) -> Result<bool, GusError> {
        let request = OperationRequest::new("Wyloguj", BIR_PUBL_NS).param(params::SESSION_ID, sid);
        let text = self
            .call(actions::LOGOUT, Some(sid), request, "WylogujResult")
            .await?;
        parse_bool(&text)
    }

    /// Fetch the captcha image as the opaque (base64) payload the server
    /// returns.
    pub async fn get_captcha(&self, sid: &str) -> Result<String, GusError> {
        let request = OperationRequest::new("PobierzCaptcha", BIR_NS);
        self.call(actions::GET_CAPTCHA, Some(sid), request, "PobierzCaptchaResult")
            .await
    }

    /// Submit a captcha answer.
    pub async fn check_captcha(&self, sid: &str, captcha: &str) -> Result<bool, GusError> {
        let request = OperationRequest::new("SprawdzCaptcha", BIR_NS).param(params::CAPTCHA, captcha);
        let text = self
            .call(actions::CHECK_CAPTCHA, Some(sid), request, "SprawdzCaptchaResult")
            .await?;
        parse_bool(&text)
    }

    /// Search the registry. An empty or degenerate result document is
    /// reported as [`GusError::NoData`], never as a parse error.
    pub async fn search(
        &self,
        sid: &str,
        parameters: SearchParameters,
    ) -> Result<Vec<DataRecord>, GusError> {
        let request = OperationRequest::new("DaneSzukaj", BIR_PUBL_NS).group(
            params::SEARCH,
            SEARCH_CONTRACT_NS,
            parameters.into_fields(),
        );
        let payload = self
            .call(actions::SEARCH, Some(sid), request, "DaneSzukajResult")
            .await?;
        decode_payload(&payload).map_err(|e| {
            debug!(error = %e, "search payload rejected");
            GusError::NoData
        })
    }

    /// Fetch one of the canned full reports for a REGON identifier. See
    /// [`reports`] for accepted report names. "No rows" surfaces as
    /// [`GusError::NoData`], as with [`search`](Self::search).
    pub async fn get_full_report(
        &self,
        sid: &str,
        regon: &str,
        report_name: &str,
    ) -> Result<Vec<DataRecord>, GusError> {
        let request = OperationRequest::new("DanePobierzPelnyRaport", BIR_PUBL_NS)
            .param(params::REGON, regon)
            .param(params::REPORT_NAME, report_name);
        let payload = self
            .call(
                actions::GET_FULL_REPORT,
                Some(sid),
                request,
                "DanePobierzPelnyRaportResult",
            )
            .await?;
        decode_payload(&payload).map_err(|e| {
            debug!(error = %e, "report payload rejected");
            GusError::NoData
        })
    }

    /// Read a single service diagnostic value. See [`values`] for accepted
    /// parameter names.
    pub async fn get_value(&self, sid: &str, param_name: &str) -> Result<String, GusError> {
        let request = OperationRequest::new("GetValue", BIR_NS).param(params::PARAM_NAME, param_name);
        self.call(actions::GET_VALUE, Some(sid), request, "GetValueResult")
            .await
    }

    /// Read the service-wide message; requires no session.
    pub async fn get_message(&self) -> Result<String, GusError> {
        let request = OperationRequest::new("DaneKomunikat", BIR_PUBL_NS);
        self.call(actions::GET_MESSAGE, None, request, "DaneKomunikatResult")
            .await
    }

    /// Build the per-call header set and dispatch one operation.
    ///
    /// The header set is constructed fresh here for every call; nothing is
    /// retained between invocations, so headers cannot leak across calls.
    async fn call(
        &self,
        action: &str,
        sid: Option<&str>,
        request: OperationRequest,
        result_field: &str,
    ) -> Result<String, GusError> {
        let call = self.prepare_call(action, sid, request);
        let envelope = self.transport.invoke(&call).await?;
        extract_result(&envelope, result_field)
    }

    fn prepare_call(&self, action: &str, sid: Option<&str>, request: OperationRequest) -> SoapCall {
        let mut headers = CallHeaders::new(action, &self.address);
        if let Some(sid) = sid {
            headers = headers.with_sid(sid);
        }
        SoapCall::new(headers, request)
    }
}

fn parse_bool(text: &str) -> Result<bool, GusError> {
    match text.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(GusError::InvalidResponse(format!(
            "expected boolean result, got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_client() -> GusClient<NullInvoker> {
        GusClient::with_transport(NullInvoker, "https://example.test/svc")
    }

    struct NullInvoker;

    #[async_trait::async_trait]
    impl SoapInvoker for NullInvoker {
        async fn invoke(&self, _call: &SoapCall) -> Result<String, GusError> {
            Ok("</s:Envelope>".to_string())
        }
    }

    #[test]
    fn test_prepare_call_builds_fresh_headers_each_time() {
        let client = stub_client();
        let first = client.prepare_call(
            actions::LOGIN,
            None,
            OperationRequest::new("Zaloguj", BIR_PUBL_NS),
        );
        let second = client.prepare_call(
            actions::LOGOUT,
            Some("ABC"),
            OperationRequest::new("Wyloguj", BIR_PUBL_NS),
        );

        assert_eq!(first.headers.action, actions::LOGIN);
        assert_eq!(first.headers.to, "https://example.test/svc");
        assert_eq!(first.headers.sid, None);

        // The second call carries only its own headers; nothing of the
        // first call remains.
        assert_eq!(second.headers.action, actions::LOGOUT);
        assert_eq!(second.headers.to, "https://example.test/svc");
        assert_eq!(second.headers.sid.as_deref(), Some("ABC"));
    }

    #[test]
    fn test_search_parameters_preserve_order() {
        let params = SearchParameters::new()
            .field("Nip", "5261040828")
            .field("Regon", "123456785");
        assert_eq!(
            params.into_fields(),
            vec![
                ("Nip".to_string(), "5261040828".to_string()),
                ("Regon".to_string(), "123456785".to_string()),
            ]
        );
    }

    #[test]
    fn test_search_parameter_shortcuts() {
        assert_eq!(
            SearchParameters::by_regon("123456785").into_fields(),
            vec![("Regon".to_string(), "123456785".to_string())]
        );
        assert_eq!(
            SearchParameters::by_nip("5261040828").into_fields(),
            vec![("Nip".to_string(), "5261040828".to_string())]
        );
        assert_eq!(
            SearchParameters::by_krs("0000012345").into_fields(),
            vec![("Krs".to_string(), "0000012345".to_string())]
        );
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true").unwrap());
        assert!(!parse_bool("false").unwrap());
        assert!(parse_bool(" true ").unwrap());
        assert!(matches!(
            parse_bool("1"),
            Err(GusError::InvalidResponse(_))
        ));
    }
}
