pub mod endpoints;

use crate::client::{HttpTransport, SoapReply, Transport};
use crate::config::Config;
use crate::error::{OnvifError, Result};
use crate::logging::emit;
use crate::soap::{extract_body, Fault, SoapMessage, NAMESPACES};
use crate::types::device::GetCapabilities;
use crate::types::{check_pairing, Method, Operation};
use endpoints::EndpointTable;

use log::Level;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    NetworkVideoDisplay,
    NetworkVideoStorage,
    NetworkVideoAnalytics,
    NetworkVideoTransmitter,
    Doorbell,
    Unknown,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceType::NetworkVideoDisplay => "NetworkVideoDisplay",
            DeviceType::NetworkVideoStorage => "NetworkVideoStorage",
            DeviceType::NetworkVideoAnalytics => "NetworkVideoAnalytics",
            DeviceType::NetworkVideoTransmitter => "NetworkVideoTransmitter",
            DeviceType::Doorbell => "Doorbell",
            DeviceType::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Classifies a WS-Discovery `Types` string.
pub fn parse_device_type(types: &str) -> DeviceType {
    match types {
        t if t.contains("NetworkVideoTransmitter") => DeviceType::NetworkVideoTransmitter,
        t if t.contains("NetworkVideoStorage") => DeviceType::NetworkVideoStorage,
        t if t.contains("NetworkVideoAnalytics") => DeviceType::NetworkVideoAnalytics,
        t if t.contains("NetworkVideoDisplay") => DeviceType::NetworkVideoDisplay,
        t if t.contains("Doorbell") => DeviceType::Doorbell,
        _ => DeviceType::Unknown,
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// What is known about one physical device.
#[derive(Debug, Clone, Default)]
#[rustfmt::skip]
pub struct DeviceParams {
    /// `host[:port]` of the device
    pub address:       String,
    pub credentials:   Option<Credentials>,
    pub uuid:          String,
    /// Raw WS-Discovery Types
    pub types:         String,
    pub name:          String,
    pub model:         String,
    pub mac:           String,
}

impl DeviceParams {
    pub fn new(address: impl Into<String>) -> Self {
        DeviceParams {
            address: address.into(),
            ..Default::default()
        }
    }

    /// Requests are only signed when both username and password are non-empty.
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = if username.is_empty() || password.is_empty() {
            None
        } else {
            Some(Credentials {
                username: username.to_string(),
                password: password.to_string(),
            })
        };
        self
    }

    pub fn device_type(&self) -> DeviceType {
        parse_device_type(&self.types)
    }
}

/// Reduces `192.168.1.5`, `192.168.1.5:8080` or
/// `http://192.168.1.5/onvif/device_service` to `host[:port]`.
pub fn normalize_address(raw: &str) -> Result<String> {
    let raw = raw.trim();
    let invalid = || OnvifError::InvalidAddress(raw.to_string());

    let url = if raw.contains("://") {
        Url::parse(raw)
    } else {
        Url::parse(&format!("http://{raw}"))
    }
    .map_err(|_| invalid())?;

    let host = url.host_str().filter(|h| !h.is_empty()).ok_or_else(invalid)?;

    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// A session with one ONVIF device.
///
/// Built by [`Device::new`], which asks the device for its capabilities and
/// fills the endpoint table from the answer. After that every call is a
/// single SOAP round trip routed by the request's service name.
///
/// # Examples
///
/// ```no_run
/// # async fn run() -> onvif_client::Result<()> {
/// use onvif_client::{Device, DeviceParams};
/// use onvif_client::types::device::GetDeviceInformation;
///
/// let params = DeviceParams::new("192.168.1.5").with_credentials("admin", "secret");
/// let device = Device::new(params).await?;
/// let info = device.call_method(&GetDeviceInformation {}).await?;
///
/// println!("{} {}", info.manufacturer, info.model);
/// # Ok(())
/// # }
/// ```
pub struct Device {
    params: DeviceParams,
    endpoints: EndpointTable,
    transport: Arc<dyn Transport>,
    config: Config,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("params", &self.params)
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

impl Device {
    pub async fn new(params: DeviceParams) -> Result<Device> {
        Device::with_config(params, Config::default()).await
    }

    pub async fn with_config(params: DeviceParams, config: Config) -> Result<Device> {
        let transport = HttpTransport::new(config.http_timeout)?;
        Device::with_transport(params, config, Arc::new(transport)).await
    }

    /// Connects through a caller supplied transport.
    ///
    /// Any transport error or a status other than 200 on GetCapabilities means
    /// there is no ONVIF device at the address, even if the body is a
    /// perfectly good SOAP Fault.
    pub async fn with_transport(
        mut params: DeviceParams,
        config: Config,
        transport: Arc<dyn Transport>,
    ) -> Result<Device> {
        params.address = normalize_address(&params.address)?;

        let mut endpoints = EndpointTable::new(&params.address);
        endpoints.insert("device", &config.device_service_url(&params.address))?;

        let mut device = Device {
            params,
            endpoints,
            transport,
            config,
        };

        let unreachable = |reason: String| OnvifError::DeviceUnreachable {
            address: device.params.address.clone(),
            reason,
        };

        let reply = match device.call_method_raw(&GetCapabilities::all(), None).await {
            Ok(reply) if reply.status == StatusCode::OK => reply,
            Ok(reply) => return Err(unreachable(format!("HTTP {}", reply.status))),
            Err(e) => return Err(unreachable(e.to_string())),
        };

        match device.endpoints.add_from_capabilities(&reply.body) {
            Ok(services) => emit!(
                device.config.logger,
                Level::Info,
                "[Device][new] {} services: {}",
                device.params.address,
                services.join(", ")
            ),
            Err(e) => emit!(
                device.config.logger,
                Level::Warn,
                "[Device][new] {} unreadable capabilities, only device service known: {e}",
                device.params.address
            ),
        }

        Ok(device)
    }

    pub fn params(&self) -> &DeviceParams {
        &self.params
    }

    pub fn address(&self) -> &str {
        &self.params.address
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The endpoint table, service name to URL.
    pub fn get_services(&self) -> &EndpointTable {
        &self.endpoints
    }

    pub fn endpoint(&self, service: &str) -> Result<&Url> {
        self.endpoints.resolve(service)
    }

    /// Adds or replaces a service URL, host forced to the device address.
    pub fn add_endpoint(&mut self, service: &str, xaddr: &str) -> Result<()> {
        self.endpoints.insert(service, xaddr).map(|_| ())
    }

    /// Sends `method` and returns the raw reply, status untouched.
    ///
    /// The request goes to `redirect` when given, otherwise to the endpoint
    /// registered for `M::SERVICE`.
    pub async fn call_method_raw<M: Method>(
        &self,
        method: &M,
        redirect: Option<&Url>,
    ) -> Result<SoapReply> {
        let endpoint = match redirect {
            Some(url) => url.clone(),
            None => self.endpoints.resolve(M::SERVICE)?.clone(),
        };

        let body = quick_xml::se::to_string(method).map_err(OnvifError::Serialize)?;
        let mut soap = SoapMessage::from_body(&body)?;
        soap.add_root_namespaces(NAMESPACES);
        soap.add_action();
        if let Some(credentials) = &self.params.credentials {
            soap.add_ws_security(&credentials.username, &credentials.password);
        }

        emit!(
            self.config.logger,
            Level::Debug,
            "[Device][call] {} -> {endpoint}",
            M::NAME
        );

        let reply = self.transport.post(&endpoint, soap.to_string()).await?;

        emit!(
            self.config.logger,
            Level::Trace,
            "[Device][call] {} reply HTTP {}: {}",
            M::NAME,
            reply.status,
            reply.text()
        );

        Ok(reply)
    }

    /// Calls `method` and decodes the reply into `response`.
    ///
    /// `response` must be the twin of `method` (`GetFoo` / `GetFooResponse`),
    /// checked before anything is sent. A 500 carrying a SOAP Fault comes
    /// back as [`OnvifError::ProtocolFault`] with the fault reason, and
    /// `response` is left as it was.
    pub async fn call_method_into<M, R>(
        &self,
        method: &M,
        response: &mut R,
        redirect: Option<&Url>,
    ) -> Result<()>
    where
        M: Method,
        R: Operation + DeserializeOwned,
    {
        check_pairing::<M, R>()?;

        let reply = self.call_method_raw(method, redirect).await?;
        let text = reply.text();

        let body = extract_body(&text).ok_or_else(|| {
            OnvifError::MalformedResponse(format!(
                "no SOAP Body in HTTP {} reply to {}",
                reply.status,
                M::NAME
            ))
        })?;

        if let Some(reason) = Fault::reason_in(body) {
            emit!(
                self.config.logger,
                Level::Debug,
                "[Device][call] {} fault: {reason}",
                M::NAME
            );
            return Err(OnvifError::ProtocolFault(reason));
        }

        *response = quick_xml::de::from_str(body).map_err(OnvifError::Deserialize)?;
        Ok(())
    }

    /// Calls `method` and returns its declared response.
    pub async fn call_method<M: Method>(&self, method: &M) -> Result<M::Response> {
        let mut response = M::Response::default();
        self.call_method_into(method, &mut response, None).await?;
        Ok(response)
    }

    /// Like [`call_method`](Self::call_method), sent to `url` instead of the
    /// service endpoint, e.g. an event subscription address.
    pub async fn call_method_at<M: Method>(&self, method: &M, url: &Url) -> Result<M::Response> {
        let mut response = M::Response::default();
        self.call_method_into(method, &mut response, Some(url)).await?;
        Ok(response)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::device::{
        GetCapabilitiesResponse, GetDeviceInformation, GetDeviceInformationResponse,
    };
    use crate::types::event::{CreatePullPointSubscription, PullMessages};
    use crate::types::media::GetProfiles;

    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Mutex;

    pub const CAPABILITIES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope" xmlns:tds="http://www.onvif.org/ver10/device/wsdl" xmlns:tt="http://www.onvif.org/ver10/schema">
<env:Body><tds:GetCapabilitiesResponse><tds:Capabilities>
<tt:Device><tt:XAddr>http://10.0.0.1/onvif/device_service</tt:XAddr></tt:Device>
<tt:Events><tt:XAddr>http://10.0.0.1/onvif/Events</tt:XAddr></tt:Events>
<tt:Media><tt:XAddr>http://10.0.0.1/onvif/Media</tt:XAddr></tt:Media>
</tds:Capabilities></tds:GetCapabilitiesResponse></env:Body></env:Envelope>"#;

    /// Answers from a queue and records every request.
    #[derive(Default)]
    pub struct MockTransport {
        replies: Mutex<Vec<(u16, String)>>,
        pub requests: Mutex<Vec<(Url, String)>>,
    }

    impl MockTransport {
        pub fn new(replies: &[(u16, &str)]) -> Arc<Self> {
            Arc::new(MockTransport {
                replies: Mutex::new(
                    replies
                        .iter()
                        .rev()
                        .map(|(s, b)| (*s, b.to_string()))
                        .collect(),
                ),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn last_request(&self) -> (Url, String) {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn post(&self, endpoint: &Url, envelope: String) -> Result<SoapReply> {
            self.requests
                .lock()
                .unwrap()
                .push((endpoint.clone(), envelope));

            match self.replies.lock().unwrap().pop() {
                Some((status, body)) => Ok(SoapReply {
                    status: StatusCode::from_u16(status).unwrap(),
                    body: Bytes::from(body),
                }),
                None => Err(OnvifError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "no reply queued",
                ))),
            }
        }
    }

    fn envelope(body: &str) -> String {
        format!(
            r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope"><s:Body>{body}</s:Body></s:Envelope>"#
        )
    }

    async fn connected(
        params: DeviceParams,
        replies: &[(u16, &str)],
    ) -> (Device, Arc<MockTransport>) {
        let mut all = vec![(200, CAPABILITIES)];
        all.extend_from_slice(replies);
        let transport = MockTransport::new(&all);

        let device = Device::with_transport(params, Config::default(), transport.clone())
            .await
            .unwrap();
        (device, transport)
    }

    #[test]
    fn address_normalization() {
        assert_eq!(normalize_address(" 192.168.1.5 ").unwrap(), "192.168.1.5");
        assert_eq!(normalize_address("192.168.1.5:8080").unwrap(), "192.168.1.5:8080");
        assert_eq!(
            normalize_address("http://192.168.1.5:8000/onvif/device_service").unwrap(),
            "192.168.1.5:8000"
        );
        assert!(normalize_address("").is_err());
    }

    #[test]
    fn device_types() {
        assert_eq!(
            parse_device_type("dn:NetworkVideoTransmitter tds:Device"),
            DeviceType::NetworkVideoTransmitter
        );
        assert_eq!(parse_device_type("tds:Device"), DeviceType::Unknown);
        assert_eq!(DeviceType::NetworkVideoStorage.to_string(), "NetworkVideoStorage");
    }

    #[test]
    fn credentials_need_both_parts() {
        assert!(DeviceParams::new("a").with_credentials("admin", "").credentials.is_none());
        assert!(DeviceParams::new("a").with_credentials("admin", "pw").credentials.is_some());
    }

    #[tokio::test]
    async fn construction_bootstraps_and_populates() {
        let (device, transport) = connected(DeviceParams::new("192.168.1.5"), &[]).await;

        let (url, envelope) = transport.last_request();
        assert_eq!(url.as_str(), "http://192.168.1.5/onvif/device_service");
        assert!(envelope.contains("<tds:Category>All</tds:Category>"));
        assert!(!envelope.contains("UsernameToken"));

        let services = device.get_services();
        assert_eq!(services.len(), 3);
        assert_eq!(
            device.endpoint("media").unwrap().as_str(),
            "http://192.168.1.5/onvif/Media"
        );
    }

    #[tokio::test]
    async fn construction_rejects_non_200() {
        let fault = envelope("<s:Fault><s:Reason><s:Text>NotAuthorized</s:Text></s:Reason></s:Fault>");
        let transport = MockTransport::new(&[(500, &fault)]);

        let err = Device::with_transport(DeviceParams::new("192.168.1.5"), Config::default(), transport)
            .await
            .unwrap_err();
        assert!(matches!(err, OnvifError::DeviceUnreachable { .. }));
    }

    #[tokio::test]
    async fn construction_rejects_transport_errors() {
        let transport = MockTransport::new(&[]);

        let err = Device::with_transport(DeviceParams::new("192.168.1.5"), Config::default(), transport)
            .await
            .unwrap_err();
        assert!(matches!(err, OnvifError::DeviceUnreachable { .. }));
    }

    #[tokio::test]
    async fn unreadable_capabilities_keep_bootstrap() {
        let transport = MockTransport::new(&[(200, "<html>")]);

        let device =
            Device::with_transport(DeviceParams::new("192.168.1.5"), Config::default(), transport)
                .await
                .unwrap();
        assert_eq!(device.get_services().len(), 1);
        assert!(device.endpoint("device").is_ok());
    }

    #[tokio::test]
    async fn mismatched_pairing_sends_nothing() {
        let (device, transport) = connected(DeviceParams::new("192.168.1.5"), &[]).await;
        let before = transport.request_count();

        let mut wrong = GetCapabilitiesResponse::default();
        let err = device
            .call_method_into(&GetDeviceInformation {}, &mut wrong, None)
            .await
            .unwrap_err();

        assert!(matches!(err, OnvifError::InvalidPairing { .. }));
        assert_eq!(transport.request_count(), before);
    }

    #[tokio::test]
    async fn typed_call_decodes_response() {
        let info = envelope(
            "<tds:GetDeviceInformationResponse><tds:Manufacturer>Acme</tds:Manufacturer>\
             <tds:Model>C-100</tds:Model></tds:GetDeviceInformationResponse>",
        );
        let (device, transport) = connected(DeviceParams::new("192.168.1.5"), &[(200, &info)]).await;

        let resp = device.call_method(&GetDeviceInformation {}).await.unwrap();
        assert_eq!(resp.manufacturer, "Acme");
        assert_eq!(resp.model, "C-100");

        let (url, envelope) = transport.last_request();
        assert_eq!(url.path(), "/onvif/device_service");
        assert!(envelope.contains("http://www.onvif.org/ver10/device/wsdl/GetDeviceInformation</Action>"));
    }

    #[tokio::test]
    async fn fault_leaves_response_untouched() {
        let fault = "<env:Envelope xmlns:env=\"http://www.w3.org/2003/05/soap-envelope\">\
            <env:Body><env:Fault><Reason><Text>NotAuthorized</Text></Reason></env:Fault></env:Body></env:Envelope>";
        let (device, _) = connected(DeviceParams::new("192.168.1.5"), &[(500, fault)]).await;

        let mut response = GetDeviceInformationResponse {
            manufacturer: "untouched".to_string(),
            ..Default::default()
        };
        let err = device
            .call_method_into(&GetDeviceInformation {}, &mut response, None)
            .await
            .unwrap_err();

        assert_eq!(err.fault_reason(), Some("NotAuthorized"));
        assert_eq!(response.manufacturer, "untouched");
    }

    #[tokio::test]
    async fn missing_body_is_malformed() {
        let (device, _) =
            connected(DeviceParams::new("192.168.1.5"), &[(404, "<html>Not Found</html>")]).await;

        let err = device.call_method(&GetDeviceInformation {}).await.unwrap_err();
        assert!(matches!(err, OnvifError::MalformedResponse(_)));
        assert!(err.is_malformed());
    }

    #[tokio::test]
    async fn undecodable_body_surfaces_deserializer_error() {
        let bad = envelope(
            "<trt:GetProfilesResponse><trt:Profiles token=\"a\"><tt:VideoEncoderConfiguration>\
             <tt:Resolution><tt:Width>wide</tt:Width></tt:Resolution>\
             </tt:VideoEncoderConfiguration></trt:Profiles></trt:GetProfilesResponse>",
        );
        let (device, _) = connected(DeviceParams::new("192.168.1.5"), &[(200, &bad)]).await;

        let err = device.call_method(&GetProfiles {}).await.unwrap_err();
        assert!(matches!(err, OnvifError::Deserialize(_)));
    }

    #[tokio::test]
    async fn unknown_service_is_endpoint_not_found() {
        let (device, transport) = connected(DeviceParams::new("192.168.1.5"), &[]).await;
        let before = transport.request_count();

        let mut table_without_media = device;
        table_without_media.endpoints = EndpointTable::new("192.168.1.5");

        let err = table_without_media.call_method(&GetProfiles {}).await.unwrap_err();
        assert!(matches!(err, OnvifError::EndpointNotFound(_)));
        assert_eq!(transport.request_count(), before);
    }

    #[tokio::test]
    async fn fuzzy_routing_and_redirect() {
        let subscribed = envelope(
            "<tev:CreatePullPointSubscriptionResponse><tev:SubscriptionReference>\
             <wsa5:Address>http://192.168.1.5/onvif/Subscription?Idx=3</wsa5:Address>\
             </tev:SubscriptionReference></tev:CreatePullPointSubscriptionResponse>",
        );
        let pulled = envelope("<tev:PullMessagesResponse><tev:CurrentTime>now</tev:CurrentTime></tev:PullMessagesResponse>");
        let (device, transport) = connected(
            DeviceParams::new("192.168.1.5"),
            &[(200, &subscribed), (200, &pulled)],
        )
        .await;

        // "event" resolves to the "events" entry
        let sub = device
            .call_method(&CreatePullPointSubscription::default())
            .await
            .unwrap();
        assert_eq!(transport.last_request().0.path(), "/onvif/Events");

        let address = Url::parse(&sub.subscription_reference.address).unwrap();
        let msgs = device
            .call_method_at(&PullMessages::default(), &address)
            .await
            .unwrap();
        assert_eq!(msgs.current_time, "now");
        assert_eq!(transport.last_request().0.as_str(), "http://192.168.1.5/onvif/Subscription?Idx=3");
    }

    #[tokio::test]
    async fn credentials_sign_every_call() {
        let info = envelope("<tds:GetDeviceInformationResponse/>");
        let params = DeviceParams::new("192.168.1.5").with_credentials("admin", "secret");
        let (device, transport) = connected(params, &[(200, &info)]).await;

        device.call_method(&GetDeviceInformation {}).await.unwrap();
        let (_, envelope) = transport.last_request();
        assert!(envelope.contains("<wsse:Username>admin</wsse:Username>"));
        assert!(!envelope.contains("secret"));
    }

    /// Records the levels it is handed; Trace is switched off.
    #[derive(Default)]
    struct Levels(Mutex<Vec<Level>>);

    impl log::Log for Levels {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            metadata.level() < Level::Trace
        }

        fn log(&self, record: &log::Record) {
            self.0.lock().unwrap().push(record.level());
        }

        fn flush(&self) {}
    }

    #[tokio::test]
    async fn reply_dump_only_when_trace_enabled() {
        let levels = Arc::new(Levels::default());
        let config = Config::default().with_logger(levels.clone());
        let info = envelope("<tds:GetDeviceInformationResponse/>");
        let transport = MockTransport::new(&[(200, CAPABILITIES), (200, &info)]);

        let device = Device::with_transport(DeviceParams::new("192.168.1.5"), config, transport)
            .await
            .unwrap();
        device.call_method(&GetDeviceInformation {}).await.unwrap();

        let seen = levels.0.lock().unwrap();
        assert!(seen.contains(&Level::Debug));
        assert!(!seen.contains(&Level::Trace));
    }
}
