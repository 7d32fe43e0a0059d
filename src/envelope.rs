//! Outbound SOAP 1.2 envelope construction.
//!
//! Every remote call is described by a [`SoapCall`]: the per-call addressing
//! headers plus the body operation. The value is built fresh for each
//! invocation and consumed by the transport, so no header state can leak
//! from one call into the next.

/// SOAP 1.2 envelope namespace.
pub const SOAP_ENVELOPE_NS: &str = "http://www.w3.org/2003/05/soap-envelope";

/// WS-Addressing namespace carrying the `Action` and `To` headers.
pub const WS_ADDRESSING_NS: &str = "http://www.w3.org/2005/08/addressing";

/// Addressing headers for one call.
///
/// Exactly two protocol headers (`Action`, `To`) go out with every request;
/// `sid` rides as a transport-level HTTP header on session-bound operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallHeaders {
    pub action: String,
    pub to: String,
    pub sid: Option<String>,
}

impl CallHeaders {
    pub fn new(action: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            to: to.into(),
            sid: None,
        }
    }

    /// Attach the session identifier for a session-bound operation.
    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }
}

/// One request parameter inside the operation element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    /// A plain `<ns:name>value</ns:name>` leaf.
    Leaf { name: String, value: String },
    /// A nested group whose children live in their own data-contract
    /// namespace (the search-parameter block).
    Group {
        name: String,
        namespace: String,
        fields: Vec<(String, String)>,
    },
}

/// The body operation of one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRequest {
    name: String,
    namespace: String,
    params: Vec<Param>,
}

impl OperationRequest {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push(Param::Leaf {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn group(
        mut self,
        name: impl Into<String>,
        namespace: impl Into<String>,
        fields: Vec<(String, String)>,
    ) -> Self {
        self.params.push(Param::Group {
            name: name.into(),
            namespace: namespace.into(),
            fields,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A complete outbound call: headers plus body operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapCall {
    pub headers: CallHeaders,
    pub request: OperationRequest,
}

impl SoapCall {
    pub fn new(headers: CallHeaders, request: OperationRequest) -> Self {
        Self { headers, request }
    }

    /// Render the full SOAP 1.2 envelope for this call.
    pub fn render(&self) -> String {
        let mut body = String::new();
        for param in &self.request.params {
            match param {
                Param::Leaf { name, value } => {
                    body.push_str(&format!(
                        "<ns:{name}>{}</ns:{name}>",
                        xml_escape(value)
                    ));
                }
                Param::Group {
                    name,
                    namespace,
                    fields,
                } => {
                    body.push_str(&format!(
                        "<ns:{name} xmlns:dat=\"{}\">",
                        xml_escape(namespace)
                    ));
                    for (field, value) in fields {
                        body.push_str(&format!(
                            "<dat:{field}>{}</dat:{field}>",
                            xml_escape(value)
                        ));
                    }
                    body.push_str(&format!("</ns:{name}>"));
                }
            }
        }

        format!(
            concat!(
                "<s:Envelope xmlns:s=\"{soap_ns}\" xmlns:wsa=\"{wsa_ns}\">",
                "<s:Header>",
                "<wsa:Action>{action}</wsa:Action>",
                "<wsa:To>{to}</wsa:To>",
                "</s:Header>",
                "<s:Body>",
                "<ns:{op} xmlns:ns=\"{op_ns}\">{body}</ns:{op}>",
                "</s:Body>",
                "</s:Envelope>"
            ),
            soap_ns = SOAP_ENVELOPE_NS,
            wsa_ns = WS_ADDRESSING_NS,
            action = xml_escape(&self.headers.action),
            to = xml_escape(&self.headers.to),
            op = self.request.name,
            op_ns = xml_escape(&self.request.namespace),
            body = body,
        )
    }
}

/// Escape text for embedding in XML content.
pub fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_carries_exactly_two_addressing_headers() {
        let call = SoapCall::new(
            CallHeaders::new("http://CIS/BIR/Action", "https://example.test/svc"),
            OperationRequest::new("Zaloguj", "http://CIS/BIR/PUBL/2014/07")
                .param("pKluczUzytkownika", "abc123"),
        );
        let xml = call.render();

        assert_eq!(xml.matches("<wsa:Action>").count(), 1);
        assert_eq!(xml.matches("<wsa:To>").count(), 1);
        assert!(xml.contains("<wsa:Action>http://CIS/BIR/Action</wsa:Action>"));
        assert!(xml.contains("<wsa:To>https://example.test/svc</wsa:To>"));
        assert!(xml.contains(
            "<ns:Zaloguj xmlns:ns=\"http://CIS/BIR/PUBL/2014/07\">\
             <ns:pKluczUzytkownika>abc123</ns:pKluczUzytkownika></ns:Zaloguj>"
        ));
    }

    #[test]
    fn test_render_nested_search_parameters() {
        let call = SoapCall::new(
            CallHeaders::new("a", "t").with_sid("S1"),
            OperationRequest::new("DaneSzukaj", "http://CIS/BIR/PUBL/2014/07").group(
                "pParametryWyszukiwania",
                "http://CIS/BIR/PUBL/2014/07/DataContract",
                vec![("Regon".to_string(), "123456785".to_string())],
            ),
        );
        let xml = call.render();

        assert!(xml.contains(
            "<ns:pParametryWyszukiwania \
             xmlns:dat=\"http://CIS/BIR/PUBL/2014/07/DataContract\">\
             <dat:Regon>123456785</dat:Regon></ns:pParametryWyszukiwania>"
        ));
        assert_eq!(call.headers.sid.as_deref(), Some("S1"));
    }

    #[test]
    fn test_render_escapes_parameter_values() {
        let call = SoapCall::new(
            CallHeaders::new("a", "t"),
            OperationRequest::new("GetValue", "http://CIS/BIR/2014/07")
                .param("pNazwaParametru", "a<b>&\"c\""),
        );
        let xml = call.render();
        assert!(xml.contains("a&lt;b&gt;&amp;&quot;c&quot;"));
    }

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape("a&b"), "a&amp;b");
        assert_eq!(xml_escape("<tag>"), "&lt;tag&gt;");
        assert_eq!(xml_escape("plain"), "plain");
    }
}
