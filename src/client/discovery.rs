//! WS-Discovery of ONVIF devices on a local network segment.
//!
//! A Probe is multicast to 239.255.255.250:3702 from a socket scoped to one
//! interface and every ProbeMatch collected within the probe window becomes a
//! candidate. A candidate address is skipped once a session with it exists.

use crate::client::{HttpTransport, Transport};
use crate::config::Config;
use crate::device::{normalize_address, Credentials, Device, DeviceParams};
use crate::error::Result;
use crate::logging::emit;

use bytes::BytesMut;
use log::Level;
use socket2::{Domain, Protocol, Socket, Type};
use std::io::BufReader;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};
use uuid::Uuid;
use xml::reader::{EventReader, XmlEvent};

const NS_DISCOVERY: &str = "http://schemas.xmlsoap.org/ws/2005/04/discovery";
const NS_ADDRESSING: &str = "http://schemas.xmlsoap.org/ws/2004/08/addressing";
const ACTION_PROBE: &str = "http://schemas.xmlsoap.org/ws/2005/04/discovery/Probe";
const TO_DISCOVERY: &str = "urn:schemas-xmlsoap-org:ws:2005:04:discovery";
const REPLY_ANONYMOUS: &str = "http://schemas.xmlsoap.org/ws/2004/08/addressing/role/anonymous";

const NVT_TYPE: &str = "dn:NetworkVideoTransmitter";
const NVT_NAMESPACE: (&str, &str) = ("dn", "http://www.onvif.org/ver10/network/wsdl");

const MAX_DATAGRAM: usize = 65535;

/// One `ProbeMatch` of a discovery reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeMatch {
    pub xaddrs: Vec<String>,
    pub endpoint_reference: String,
    pub types: String,
    pub scopes: Vec<String>,
}

impl ProbeMatch {
    /// `host[:port]` of the first XAddr.
    pub fn address(&self) -> Option<String> {
        let first = self.xaddrs.first()?;
        normalize_address(first).ok()
    }

    /// Endpoint reference with everything up to `uuid:` removed.
    pub fn uuid(&self) -> &str {
        let address = self.endpoint_reference.trim();
        match address.find("uuid:") {
            Some(at) => &address[at + "uuid:".len()..],
            None => address,
        }
    }

    /// (mac, model, name) from the ONVIF scopes, each the last path segment
    /// of its scope. A token is checked for `MAC`, then `hardware`, then
    /// `name`, and later tokens overwrite earlier ones.
    pub fn scope_details(&self) -> (Option<&str>, Option<&str>, Option<&str>) {
        let (mut mac, mut model, mut name) = (None, None, None);

        for scope in &self.scopes {
            let last = scope.rsplit('/').next();
            if scope.contains("MAC") {
                mac = last;
            } else if scope.contains("hardware") {
                model = last;
            } else if scope.contains("name") {
                name = last;
            }
        }

        (mac, model, name)
    }

    pub fn apply_to(&self, params: &mut DeviceParams) {
        params.uuid = self.uuid().to_string();
        params.types = self.types.clone();

        let (mac, model, name) = self.scope_details();
        if let Some(mac) = mac {
            params.mac = mac.to_string();
        }
        if let Some(model) = model {
            params.model = model.to_string();
        }
        if let Some(name) = name {
            params.name = name.to_string();
        }
    }
}

/// WS-Discovery Probe for `types`, with `namespaces` declared on the envelope.
pub fn probe_message(types: &[&str], namespaces: &[(&str, &str)], message_id: Uuid) -> String {
    let declarations: String = namespaces
        .iter()
        .map(|(prefix, uri)| format!(r#" xmlns:{prefix}="{uri}""#))
        .collect();

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:a="{addressing}" xmlns:d="{discovery}"{declarations}>"#,
            r#"<s:Header>"#,
            r#"<a:Action s:mustUnderstand="1">{action}</a:Action>"#,
            r#"<a:MessageID>uuid:{id}</a:MessageID>"#,
            r#"<a:ReplyTo><a:Address>{reply}</a:Address></a:ReplyTo>"#,
            r#"<a:To s:mustUnderstand="1">{to}</a:To>"#,
            r#"</s:Header>"#,
            r#"<s:Body><d:Probe><d:Types>{types}</d:Types></d:Probe></s:Body>"#,
            r#"</s:Envelope>"#
        ),
        addressing = NS_ADDRESSING,
        discovery = NS_DISCOVERY,
        declarations = declarations,
        action = ACTION_PROBE,
        id = message_id,
        reply = REPLY_ANONYMOUS,
        to = TO_DISCOVERY,
        types = types.join(" "),
    )
}

/// Every `Envelope/Body/ProbeMatches/ProbeMatch` of a reply document.
pub fn parse_probe_matches(reply: &[u8]) -> Result<Vec<ProbeMatch>> {
    let parser = EventReader::new(BufReader::new(reply));

    let mut matches = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut current: Option<ProbeMatch> = None;
    let mut text = String::new();

    for e in parser {
        match e? {
            XmlEvent::StartElement { name, .. } => {
                path.push(name.local_name);
                text.clear();

                if is_probe_match(&path) {
                    current = Some(ProbeMatch::default());
                }
            }
            XmlEvent::Characters(chars) | XmlEvent::CData(chars) => text.push_str(&chars),
            XmlEvent::EndElement { .. } => {
                if let Some(found) = current.as_mut() {
                    match &path[..] {
                        [_, _, _, _, field] if field == "XAddrs" => {
                            found.xaddrs = text.split_whitespace().map(String::from).collect();
                        }
                        [_, _, _, _, field] if field == "Types" => {
                            found.types = text.trim().to_string();
                        }
                        [_, _, _, _, field] if field == "Scopes" => {
                            found.scopes = text.split_whitespace().map(String::from).collect();
                        }
                        [_, _, _, _, reference, address]
                            if reference == "EndpointReference" && address == "Address" =>
                        {
                            found.endpoint_reference = text.trim().to_string();
                        }
                        _ => {}
                    }
                }

                if is_probe_match(&path) {
                    matches.extend(current.take());
                }
                path.pop();
                text.clear();
            }
            _ => {}
        }
    }

    Ok(matches)
}

fn is_probe_match(path: &[String]) -> bool {
    matches!(path, [_, body, probe_matches, probe_match]
        if body == "Body" && probe_matches == "ProbeMatches" && probe_match == "ProbeMatch")
}

/// UDP socket whose multicast traffic leaves through `interface`.
///
/// `interface` is either an IPv4 address of a local interface or, on Linux,
/// an interface name such as `eth0`. An empty name leaves the choice to the
/// routing table.
pub fn bind_probe_socket(interface: &str) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;

    let local = match interface.parse::<Ipv4Addr>() {
        Ok(ip) => {
            socket.set_multicast_if_v4(&ip)?;
            ip
        }
        Err(_) => {
            if !interface.is_empty() {
                bind_to_interface(&socket, interface)?;
            }
            Ipv4Addr::UNSPECIFIED
        }
    };

    socket.bind(&SocketAddrV4::new(local, 0).into())?;
    socket.set_nonblocking(true)?;

    Ok(UdpSocket::from_std(socket.into())?)
}

#[cfg(any(target_os = "linux", target_os = "android", target_os = "fuchsia"))]
fn bind_to_interface(socket: &Socket, interface: &str) -> std::io::Result<()> {
    socket.bind_device(Some(interface.as_bytes()))
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "fuchsia")))]
fn bind_to_interface(_socket: &Socket, interface: &str) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        format!("binding to interface {interface} by name, use its IPv4 address"),
    ))
}

/// Multicasts a Probe and returns the raw replies received within the probe
/// window.
pub async fn probe(
    interface: &str,
    types: &[&str],
    namespaces: &[(&str, &str)],
    config: &Config,
) -> Result<Vec<String>> {
    let socket = bind_probe_socket(interface)?;
    let message = probe_message(types, namespaces, Uuid::new_v4());
    let destination = SocketAddr::V4(config.multicast_addr);

    for attempt in 0..config.probe_sends {
        match socket.send_to(message.as_bytes(), destination).await {
            Ok(_) => emit!(
                config.logger,
                Level::Debug,
                "[Discovery][probe] Broadcasting to discover devices on {interface}..."
            ),
            Err(e) if attempt == 0 => return Err(e.into()),
            Err(e) => emit!(
                config.logger,
                Level::Warn,
                "[Discovery][probe] Repeat probe failed: {e}"
            ),
        }
    }

    let deadline = Instant::now() + config.probe_window;
    let mut replies = Vec::new();
    let mut buf = BytesMut::with_capacity(MAX_DATAGRAM);

    loop {
        buf.clear();
        buf.reserve(MAX_DATAGRAM);

        match timeout_at(deadline, socket.recv_buf_from(&mut buf)).await {
            Ok(Ok((size, from))) => {
                emit!(
                    config.logger,
                    Level::Debug,
                    "[Discovery][probe] Received response from: {from}"
                );
                replies.push(String::from_utf8_lossy(&buf[..size]).into_owned());
            }
            Ok(Err(e)) => {
                emit!(
                    config.logger,
                    Level::Warn,
                    "[Discovery][probe] Error in response {e}"
                );
                break;
            }
            // window elapsed
            Err(_) => break,
        }
    }

    Ok(replies)
}

/// Connects to every distinct device advertised in `replies`.
///
/// All replies are parsed before anything is connected, so a single
/// malformed reply fails the whole discovery. Devices that do not answer
/// GetCapabilities are logged and left out. A match for an address that
/// already has a session is skipped; an address that failed is tried again
/// when another match advertises it.
pub async fn resolve_replies(
    replies: &[String],
    credentials: Option<&Credentials>,
    config: &Config,
    transport: Arc<dyn Transport>,
) -> Result<Vec<Device>> {
    let mut matches = Vec::new();
    for reply in replies {
        matches.extend(parse_probe_matches(reply.as_bytes())?);
    }

    let mut devices: Vec<Device> = Vec::new();

    for found in matches {
        let Some(address) = found.address() else {
            emit!(
                config.logger,
                Level::Debug,
                "[Discovery][resolve] Skipping match without usable XAddrs: {:?}",
                found.xaddrs
            );
            continue;
        };

        if devices.iter().any(|d| d.address() == address) {
            continue;
        }

        let mut params = DeviceParams::new(address.clone());
        params.credentials = credentials.cloned();
        found.apply_to(&mut params);

        match Device::with_transport(params, config.clone(), transport.clone()).await {
            Ok(device) => {
                emit!(
                    config.logger,
                    Level::Info,
                    "[Discovery][resolve] Found a new device: {address}"
                );
                devices.push(device);
            }
            Err(e) => emit!(
                config.logger,
                Level::Warn,
                "[Discovery][resolve] Skipping {address}: {e}"
            ),
        }
    }

    Ok(devices)
}

/// Finds the NetworkVideoTransmitters reachable through `interface` and
/// opens a session with each.
pub async fn discover(
    interface: &str,
    credentials: Option<&Credentials>,
    config: &Config,
) -> Result<Vec<Device>> {
    let replies = probe(interface, &[NVT_TYPE], &[NVT_NAMESPACE], config).await?;
    emit!(
        config.logger,
        Level::Info,
        "[Discovery][discover] {} replies on {interface}",
        replies.len()
    );

    let transport = Arc::new(HttpTransport::new(config.http_timeout)?);
    resolve_replies(&replies, credentials, config, transport).await
}
