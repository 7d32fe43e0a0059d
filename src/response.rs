//! Response envelope parsing and embedded-payload decoding.

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::error::GusError;

/// Pull the named `...Result` field out of a repaired response envelope.
///
/// A `Fault` element anywhere in the envelope wins over any result field and
/// surfaces as [`GusError::Fault`] with the SOAP 1.2 `Code/Value` and
/// `Reason/Text` content. A missing field, like an envelope the parser
/// rejects outright, is [`GusError::InvalidResponse`].
pub fn extract_result(envelope: &str, field: &str) -> Result<String, GusError> {
    let mut reader = Reader::from_str(envelope);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut field_text: Option<String> = None;
    let mut saw_fault = false;
    let mut fault_code = String::new();
    let mut fault_reason = String::new();
    let mut in_fault = false;

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = start_local_name(e);
                if name == "Fault" {
                    saw_fault = true;
                    in_fault = true;
                }
                stack.push(name);
            }

            Ok(Event::Empty(ref e)) => {
                // Self-closing result field means "present but empty".
                let name = start_local_name(e);
                if name == field && field_text.is_none() {
                    field_text = Some(String::new());
                }
            }

            Ok(Event::End(_)) => {
                if let Some(name) = stack.pop() {
                    if name == "Fault" {
                        in_fault = false;
                    }
                }
            }

            Ok(Event::Text(ref e)) => {
                let text = e.unescape().map_err(|e| {
                    GusError::InvalidResponse(format!("bad text content: {e}"))
                })?;
                append_text(
                    stack.last().map(String::as_str),
                    &text,
                    field,
                    in_fault,
                    &mut field_text,
                    &mut fault_code,
                    &mut fault_reason,
                );
            }

            Ok(Event::CData(ref e)) => {
                let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                append_text(
                    stack.last().map(String::as_str),
                    &text,
                    field,
                    in_fault,
                    &mut field_text,
                    &mut fault_code,
                    &mut fault_reason,
                );
            }

            Ok(Event::Eof) => break,

            Err(e) => {
                return Err(GusError::InvalidResponse(format!("XML parse error: {e}")));
            }

            _ => {}
        }

        buf.clear();
    }

    if saw_fault {
        return Err(GusError::Fault {
            code: if fault_code.is_empty() {
                "Unknown".to_string()
            } else {
                fault_code
            },
            reason: fault_reason,
        });
    }

    field_text.ok_or_else(|| GusError::InvalidResponse(format!("missing {field} element")))
}

fn append_text(
    current: Option<&str>,
    text: &str,
    field: &str,
    in_fault: bool,
    field_text: &mut Option<String>,
    fault_code: &mut String,
    fault_reason: &mut String,
) {
    match current {
        Some(name) if name == field => {
            field_text.get_or_insert_with(String::new).push_str(text);
        }
        Some("Value") if in_fault => fault_code.push_str(text),
        Some("Text") if in_fault => fault_reason.push_str(text),
        _ => {}
    }
}

fn start_local_name(e: &BytesStart) -> String {
    let name = e.local_name();
    std::str::from_utf8(name.as_ref()).unwrap_or("").to_string()
}

fn end_local_name(e: &BytesEnd) -> String {
    let name = e.local_name();
    std::str::from_utf8(name.as_ref()).unwrap_or("").to_string()
}

/// One `dane` record of an embedded report/search document, as element-name
/// to text pairs in document order. Business mapping of these fields is the
/// caller's concern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataRecord {
    fields: Vec<(String, String)>,
}

impl DataRecord {
    /// Text of the first field with the given element name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// All fields in document order.
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Why an embedded payload failed to decode.
///
/// Callers for `search`/`get_full_report` collapse every variant into
/// [`GusError::NoData`]: the service encodes "no rows" as an empty or
/// degenerate document, so the distinction cannot be trusted and is kept
/// only for diagnostics.
#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("payload is empty")]
    Empty,

    #[error("payload is not well-formed XML: {0}")]
    Malformed(String),

    #[error("payload contains no records")]
    NoRecords,
}

/// Decode the embedded `<root><dane>…</dane></root>` document carried inside
/// `DaneSzukajResult` and `DanePobierzPelnyRaportResult`.
pub fn decode_payload(xml: &str) -> Result<Vec<DataRecord>, PayloadError> {
    let trimmed = xml.trim();
    if trimmed.is_empty() {
        return Err(PayloadError::Empty);
    }

    let mut reader = Reader::from_str(trimmed);
    reader.config_mut().trim_text(true);

    let mut records: Vec<DataRecord> = Vec::new();
    let mut record: Option<DataRecord> = None;
    let mut current_field: Option<String> = None;
    let mut current_text = String::new();

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = start_local_name(e);
                if record.is_none() {
                    if name == "dane" {
                        record = Some(DataRecord::default());
                    }
                } else if current_field.is_none() {
                    current_field = Some(name);
                    current_text.clear();
                }
            }

            Ok(Event::Empty(ref e)) => {
                let name = start_local_name(e);
                if let Some(rec) = record.as_mut() {
                    if current_field.is_none() {
                        rec.fields.push((name, String::new()));
                    }
                }
            }

            Ok(Event::Text(ref e)) => {
                if current_field.is_some() {
                    let text = e
                        .unescape()
                        .map_err(|e| PayloadError::Malformed(e.to_string()))?;
                    current_text.push_str(&text);
                }
            }

            Ok(Event::CData(ref e)) => {
                if current_field.is_some() {
                    current_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }

            Ok(Event::End(ref e)) => {
                let name = end_local_name(e);
                if current_field.as_deref() == Some(name.as_str()) {
                    if let Some(rec) = record.as_mut() {
                        rec.fields
                            .push((current_field.take().unwrap_or_default(), std::mem::take(&mut current_text)));
                    }
                } else if name == "dane" {
                    if let Some(rec) = record.take() {
                        records.push(rec);
                    }
                }
            }

            Ok(Event::Eof) => break,

            Err(e) => return Err(PayloadError::Malformed(e.to_string())),

            _ => {}
        }

        buf.clear();
    }

    if records.is_empty() {
        return Err(PayloadError::NoRecords);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_RESPONSE: &str = r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope">
  <s:Body>
    <ZalogujResponse xmlns="http://CIS/BIR/PUBL/2014/07">
      <ZalogujResult>aaaaaabbbbbcccccdddd</ZalogujResult>
    </ZalogujResponse>
  </s:Body>
</s:Envelope>"#;

    const FAULT_RESPONSE: &str = r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope">
  <s:Body>
    <s:Fault>
      <s:Code><s:Value>s:Sender</s:Value></s:Code>
      <s:Reason><s:Text xml:lang="pl">Brak sesji</s:Text></s:Reason>
    </s:Fault>
  </s:Body>
</s:Envelope>"#;

    #[test]
    fn test_extract_result_returns_field_text_verbatim() {
        let sid = extract_result(LOGIN_RESPONSE, "ZalogujResult").unwrap();
        assert_eq!(sid, "aaaaaabbbbbcccccdddd");
    }

    #[test]
    fn test_extract_result_unescapes_embedded_markup() {
        let envelope = r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope">
  <s:Body><DaneSzukajResponse xmlns="http://CIS/BIR/PUBL/2014/07">
    <DaneSzukajResult>&lt;root&gt;&lt;dane&gt;&lt;Regon&gt;1&lt;/Regon&gt;&lt;/dane&gt;&lt;/root&gt;</DaneSzukajResult>
  </DaneSzukajResponse></s:Body>
</s:Envelope>"#;
        let payload = extract_result(envelope, "DaneSzukajResult").unwrap();
        assert_eq!(payload, "<root><dane><Regon>1</Regon></dane></root>");
    }

    #[test]
    fn test_extract_result_self_closing_field_is_empty_string() {
        let envelope = r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope">
  <s:Body><R xmlns="urn:x"><DaneSzukajResult/></R></s:Body>
</s:Envelope>"#;
        let payload = extract_result(envelope, "DaneSzukajResult").unwrap();
        assert_eq!(payload, "");
    }

    #[test]
    fn test_extract_result_missing_field_is_invalid_response() {
        let err = extract_result(LOGIN_RESPONSE, "WylogujResult").unwrap_err();
        assert!(matches!(err, GusError::InvalidResponse(_)));
    }

    #[test]
    fn test_extract_result_surfaces_soap_fault() {
        let err = extract_result(FAULT_RESPONSE, "ZalogujResult").unwrap_err();
        match err {
            GusError::Fault { code, reason } => {
                assert_eq!(code, "s:Sender");
                assert_eq!(reason, "Brak sesji");
            }
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn test_extract_result_rejects_degenerate_repair_output() {
        // What the transport hands over when no envelope was found.
        let err = extract_result("</s:Envelope>", "ZalogujResult").unwrap_err();
        assert!(matches!(err, GusError::InvalidResponse(_)));
    }

    #[test]
    fn test_decode_payload_single_record() {
        let xml = r#"<root>
  <dane>
    <Regon>123456785</Regon>
    <Nip>5261040828</Nip>
    <Nazwa>GŁÓWNY URZĄD STATYSTYCZNY</Nazwa>
  </dane>
</root>"#;
        let records = decode_payload(xml).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("Regon"), Some("123456785"));
        assert_eq!(records[0].get("Nazwa"), Some("GŁÓWNY URZĄD STATYSTYCZNY"));
        assert_eq!(records[0].get("Krs"), None);
    }

    #[test]
    fn test_decode_payload_multiple_records_in_order() {
        let xml = "<root><dane><Regon>1</Regon></dane><dane><Regon>2</Regon></dane></root>";
        let records = decode_payload(xml).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("Regon"), Some("1"));
        assert_eq!(records[1].get("Regon"), Some("2"));
    }

    #[test]
    fn test_decode_payload_empty_element_field() {
        let xml = "<root><dane><Regon>1</Regon><Ulica/></dane></root>";
        let records = decode_payload(xml).unwrap();
        assert_eq!(records[0].get("Ulica"), Some(""));
        assert_eq!(records[0].len(), 2);
    }

    #[test]
    fn test_decode_payload_empty_input() {
        assert!(matches!(decode_payload(""), Err(PayloadError::Empty)));
        assert!(matches!(decode_payload("   \n"), Err(PayloadError::Empty)));
    }

    #[test]
    fn test_decode_payload_no_records() {
        assert!(matches!(
            decode_payload("<root></root>"),
            Err(PayloadError::NoRecords)
        ));
    }

    #[test]
    fn test_decode_payload_malformed() {
        assert!(matches!(
            decode_payload("<root><dane><Regon>1</dane></root>"),
            Err(PayloadError::Malformed(_))
        ));
    }
}
