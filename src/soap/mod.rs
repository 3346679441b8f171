//! SOAP envelope construction and response unwrapping.
//!
//! Requests are built from an already serialized body fragment: the fragment
//! is checked for well-formedness against the ONVIF prefix vocabulary, wrapped
//! in a SOAP 1.2 envelope and decorated with addressing and security headers.
//! Responses go the other way: the Body content is cut out of the raw text and
//! checked for a Fault before anyone tries to deserialize it.

pub mod security;

use crate::error::{OnvifError, Result};
use security::UsernameToken;

use serde::Deserialize;
use std::fmt;
use std::io::BufReader;
use xml::reader::{EventReader, XmlEvent};

pub const SOAP_ENV: &str = "http://www.w3.org/2003/05/soap-envelope";
pub const CONTENT_TYPE: &str = "application/soap+xml; charset=utf-8";

const NS_ADDRESSING: &str = "http://www.w3.org/2005/08/addressing";

/// Prefixes a device may use for the Body element.
const BODY_PREFIXES: [&str; 4] = ["s", "env", "SOAP-ENV", "soap"];

/// Prefix vocabulary declared on every request envelope.
pub const NAMESPACES: &[(&str, &str)] = &[
    ("onvif", "http://www.onvif.org/ver10/schema"),
    ("tt", "http://www.onvif.org/ver10/schema"),
    ("tds", "http://www.onvif.org/ver10/device/wsdl"),
    ("trt", "http://www.onvif.org/ver10/media/wsdl"),
    ("tev", "http://www.onvif.org/ver10/events/wsdl"),
    ("tptz", "http://www.onvif.org/ver20/ptz/wsdl"),
    ("timg", "http://www.onvif.org/ver20/imaging/wsdl"),
    ("tan", "http://www.onvif.org/ver20/analytics/wsdl"),
    ("xmime", "http://www.w3.org/2005/05/xmlmime"),
    ("wsnt", "http://docs.oasis-open.org/wsn/b-2"),
    ("xop", "http://www.w3.org/2004/08/xop/include"),
    ("wsa", "http://www.w3.org/2005/08/addressing"),
    ("wstop", "http://docs.oasis-open.org/wsn/t-1"),
    ("wsntw", "http://docs.oasis-open.org/wsn/bw-2"),
    ("wsrf-rw", "http://docs.oasis-open.org/wsrf/rw-2"),
    ("wsaw", "http://www.w3.org/2006/05/addressing/wsdl"),
];

/// A SOAP 1.2 request under construction.
#[derive(Debug, Clone, Default)]
pub struct SoapMessage {
    namespaces: Vec<(String, String)>,
    headers: Vec<String>,
    body: String,
    root: Option<BodyRoot>,
}

/// Resolved name of the body's root element.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BodyRoot {
    namespace: Option<String>,
    local_name: String,
}

impl SoapMessage {
    /// Envelope with an empty Header and an empty Body.
    pub fn new_empty() -> Self {
        SoapMessage::default()
    }

    /// Wraps `fragment` as the Body content.
    ///
    /// The fragment must be well-formed XML whose prefixes come from
    /// [`NAMESPACES`] or are declared inside the fragment itself. A leading
    /// XML declaration is dropped.
    pub fn from_body(fragment: &str) -> Result<Self> {
        let fragment = strip_declaration(fragment);
        let root = parse_body_root(fragment)?;

        Ok(SoapMessage {
            namespaces: Vec::new(),
            headers: Vec::new(),
            body: fragment.to_string(),
            root: Some(root),
        })
    }

    /// Declares `namespaces` on the Envelope element, skipping prefixes that
    /// are already declared.
    pub fn add_root_namespaces(&mut self, namespaces: &[(&str, &str)]) {
        for (prefix, uri) in namespaces {
            if *prefix == "s" || self.namespaces.iter().any(|(p, _)| p == prefix) {
                continue;
            }
            self.namespaces.push((prefix.to_string(), uri.to_string()));
        }
    }

    pub fn add_header(&mut self, element: String) {
        self.headers.push(element);
    }

    /// Adds the WS-Addressing Action for the body's root element. Returns
    /// false when the root element has no namespace to build it from.
    pub fn add_action(&mut self) -> bool {
        match self.action() {
            Some(action) => {
                self.headers.push(format!(
                    r#"<Action xmlns="{NS_ADDRESSING}">{action}</Action>"#
                ));
                true
            }
            None => false,
        }
    }

    pub fn add_ws_security(&mut self, username: &str, password: &str) {
        let token = UsernameToken::new(username, password);
        self.headers.push(token.to_xml());
    }

    /// `<namespace>/<LocalName>` of the body's root element.
    pub fn action(&self) -> Option<String> {
        let root = self.root.as_ref()?;
        let namespace = root.namespace.as_deref()?;

        Some(format!(
            "{}/{}",
            namespace.trim_end_matches('/'),
            root.local_name
        ))
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

impl fmt::Display for SoapMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"<?xml version="1.0" encoding="UTF-8"?><s:Envelope xmlns:s="{SOAP_ENV}""#
        )?;
        for (prefix, uri) in &self.namespaces {
            write!(f, r#" xmlns:{prefix}="{uri}""#)?;
        }
        f.write_str(">")?;

        if self.headers.is_empty() {
            f.write_str("<s:Header/>")?;
        } else {
            f.write_str("<s:Header>")?;
            for header in &self.headers {
                f.write_str(header)?;
            }
            f.write_str("</s:Header>")?;
        }

        write!(f, "<s:Body>{}</s:Body></s:Envelope>", self.body)
    }
}

fn strip_declaration(fragment: &str) -> &str {
    let trimmed = fragment.trim_start();
    if trimmed.starts_with("<?xml") {
        if let Some(end) = trimmed.find("?>") {
            return &trimmed[end + 2..];
        }
    }
    fragment
}

/// Parses the fragment inside a wrapper that declares the ONVIF vocabulary,
/// so the whole fragment is checked and the root name resolved in one pass.
fn parse_body_root(fragment: &str) -> Result<BodyRoot> {
    let mut wrapped = String::from("<fragment");
    for (prefix, uri) in NAMESPACES {
        wrapped.push_str(&format!(r#" xmlns:{prefix}="{uri}""#));
    }
    wrapped.push('>');
    wrapped.push_str(fragment);
    wrapped.push_str("</fragment>");

    let parser = EventReader::new(BufReader::new(wrapped.as_bytes()));
    let mut root = None;
    let mut depth = 0;

    for e in parser {
        match e? {
            XmlEvent::StartElement { name, .. } => {
                depth += 1;
                if depth == 2 && root.is_none() {
                    root = Some(BodyRoot {
                        namespace: name.namespace,
                        local_name: name.local_name,
                    });
                }
            }
            XmlEvent::EndElement { .. } => depth -= 1,
            _ => {}
        }
    }

    root.ok_or(OnvifError::EmptyRequest)
}

/// Content between the opening and closing Body tags of a raw SOAP response.
///
/// When the document carries Body tags under more than one of the accepted
/// prefixes, the one opened first in document order wins.
pub fn extract_body(raw: &str) -> Option<&str> {
    BODY_PREFIXES
        .iter()
        .filter_map(|prefix| body_span(raw, prefix))
        .min_by_key(|(open, _, _)| *open)
        .map(|(_, start, end)| &raw[start..end])
}

/// (tag position, content start, content end) for one prefix.
fn body_span(raw: &str, prefix: &str) -> Option<(usize, usize, usize)> {
    let open_tag = format!("<{prefix}:Body");
    let close_tag = format!("</{prefix}:Body>");
    let mut search = 0;

    while let Some(found) = raw[search..].find(&open_tag) {
        let open = search + found;
        let after = open + open_tag.len();
        let rest = &raw[after..];

        let start = match rest.chars().next() {
            Some('>') => after + 1,
            Some(c) if c.is_whitespace() => {
                let gt = rest.find('>')?;
                // <s:Body/> carries nothing
                if rest[..gt].ends_with('/') {
                    return None;
                }
                after + gt + 1
            }
            // Some other element sharing the prefix, e.g. <s:BodyPart>
            _ => {
                search = after;
                continue;
            }
        };

        let end = start + raw[start..].find(&close_tag)?;
        return Some((open, start, end));
    }

    None
}

/// SOAP Fault payload, 1.2 `Reason/Text` or 1.1 `faultstring`.
#[derive(Debug, Default, Deserialize)]
pub struct Fault {
    #[serde(rename = "Reason", default)]
    reason: Option<FaultReason>,
    #[serde(rename = "faultstring", default)]
    faultstring: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FaultReason {
    #[serde(rename = "Text", default)]
    text: Vec<FaultText>,
}

#[derive(Debug, Default, Deserialize)]
struct FaultText {
    #[serde(rename = "$text", default)]
    value: String,
}

impl Fault {
    /// Reason text when `body` is a fault with a non-empty reason.
    ///
    /// Anything that does not deserialize as a fault is not one.
    pub fn reason_in(body: &str) -> Option<String> {
        let fault: Fault = quick_xml::de::from_str(body).ok()?;
        fault.reason()
    }

    pub fn reason(&self) -> Option<String> {
        let text = self
            .reason
            .iter()
            .flat_map(|r| r.text.iter())
            .map(|t| t.value.trim())
            .find(|t| !t.is_empty());

        text.or_else(|| self.faultstring.as_deref().map(str::trim))
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }
}
