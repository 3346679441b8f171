use crate::error::{OnvifError, Result};

use std::io::BufReader;
use url::Url;
use xml::reader::{EventReader, XmlEvent};

/// Service name to URL routing for one device.
///
/// Keys are lower-cased so vendors that spell a service `Events`, `EVENTS` or
/// `events` land on the same entry. Entries keep insertion order, which is
/// the tie-break for fuzzy lookups. Every URL has its host forced to the
/// device address, devices behind NAT love to advertise their internal one.
#[derive(Debug, Clone)]
pub struct EndpointTable {
    address: String,
    entries: Vec<(String, Url)>,
}

impl EndpointTable {
    /// Empty table for a device reachable at `address` (`host[:port]`).
    pub fn new(address: &str) -> Self {
        EndpointTable {
            address: address.to_string(),
            entries: Vec::new(),
        }
    }

    /// Registers `xaddr` under `service`, overwriting an existing entry in place.
    pub fn insert(&mut self, service: &str, xaddr: &str) -> Result<&Url> {
        let key = service.to_lowercase();
        let mut url = Url::parse(xaddr.trim())?;
        self.rewrite_host(&mut url)?;

        let index = match self.entries.iter().position(|(k, _)| *k == key) {
            Some(index) => {
                self.entries[index].1 = url;
                index
            }
            None => {
                self.entries.push((key, url));
                self.entries.len() - 1
            }
        };

        Ok(&self.entries[index].1)
    }

    /// Exact (case-insensitive) match first, then the first key containing
    /// `service`. Ambiguous fuzzy queries resolve to the earliest entry.
    pub fn resolve(&self, service: &str) -> Result<&Url> {
        let query = service.to_lowercase();

        self.entries
            .iter()
            .find(|(key, _)| *key == query)
            .or_else(|| self.entries.iter().find(|(key, _)| key.contains(&query)))
            .map(|(_, url)| url)
            .ok_or(OnvifError::EndpointNotFound(query))
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Url)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Registers every `Capabilities/<Service>/XAddr` of a GetCapabilities
    /// reply. Returns the services registered; XAddrs that are not URLs are
    /// skipped.
    pub fn add_from_capabilities(&mut self, response: &[u8]) -> Result<Vec<String>> {
        let mut added = Vec::new();

        for (service, xaddr) in capability_xaddrs(response)? {
            if self.insert(&service, &xaddr).is_ok() {
                added.push(service.to_lowercase());
            }
        }

        Ok(added)
    }

    fn rewrite_host(&self, url: &mut Url) -> Result<()> {
        let invalid = || OnvifError::InvalidAddress(self.address.clone());
        let device = Url::parse(&format!("http://{}", self.address)).map_err(|_| invalid())?;

        url.set_host(device.host_str())?;
        url.set_port(device.port()).map_err(|_| invalid())?;

        Ok(())
    }
}

/// (parent tag, XAddr text) for each XAddr that is a grandchild of the first
/// `Capabilities` element.
fn capability_xaddrs(response: &[u8]) -> Result<Vec<(String, String)>> {
    let parser = EventReader::new(BufReader::new(response));

    let mut result = Vec::new();
    let mut depth = 0usize;
    let mut caps_depth: Option<usize> = None;
    let mut service: Option<String> = None;
    let mut xaddr: Option<String> = None;

    for e in parser {
        match e? {
            XmlEvent::StartElement { name, .. } => {
                depth += 1;
                match caps_depth {
                    None if name.local_name == "Capabilities" => caps_depth = Some(depth),
                    Some(caps) if depth == caps + 1 => service = Some(name.local_name),
                    Some(caps) if depth == caps + 2 && name.local_name == "XAddr" => {
                        xaddr = Some(String::new())
                    }
                    _ => {}
                }
            }
            XmlEvent::Characters(chars) | XmlEvent::CData(chars) => {
                if let Some(text) = xaddr.as_mut() {
                    text.push_str(&chars);
                }
            }
            XmlEvent::EndElement { .. } => {
                match caps_depth {
                    Some(caps) if depth == caps + 2 => {
                        if let (Some(service), Some(text)) = (service.as_ref(), xaddr.take()) {
                            result.push((service.clone(), text.trim().to_string()));
                        }
                    }
                    Some(caps) if depth == caps + 1 => service = None,
                    Some(caps) if depth == caps => break,
                    _ => {}
                }
                depth -= 1;
            }
            _ => {}
        }
    }

    Ok(result)
}
