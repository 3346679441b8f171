use super::{Method, Operation};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(rename = "tds:GetCapabilities")]
pub struct GetCapabilities {
    #[serde(rename = "tds:Category")]
    pub category: String,
}

impl GetCapabilities {
    pub fn all() -> Self {
        GetCapabilities {
            category: "All".to_string(),
        }
    }
}

impl Operation for GetCapabilities {
    const SERVICE: &'static str = "device";
    const NAME: &'static str = "GetCapabilities";
}

impl Method for GetCapabilities {
    type Response = GetCapabilitiesResponse;
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetCapabilitiesResponse {
    #[serde(rename = "Capabilities", default)]
    pub capabilities: Capabilities,
}

impl Operation for GetCapabilitiesResponse {
    const SERVICE: &'static str = "device";
    const NAME: &'static str = "GetCapabilitiesResponse";
}

#[derive(Debug, Clone, Default, Deserialize)]
#[rustfmt::skip]
pub struct Capabilities {
    #[serde(rename = "Analytics", default)]  pub analytics:  Option<ServiceAddress>,
    #[serde(rename = "Device", default)]     pub device:     Option<ServiceAddress>,
    #[serde(rename = "Events", default)]     pub events:     Option<ServiceAddress>,
    #[serde(rename = "Imaging", default)]    pub imaging:    Option<ServiceAddress>,
    #[serde(rename = "Media", default)]      pub media:      Option<ServiceAddress>,
    #[serde(rename = "PTZ", default)]        pub ptz:        Option<ServiceAddress>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceAddress {
    #[serde(rename = "XAddr", default)]
    pub xaddr: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename = "tds:GetDeviceInformation")]
pub struct GetDeviceInformation {}

impl Operation for GetDeviceInformation {
    const SERVICE: &'static str = "device";
    const NAME: &'static str = "GetDeviceInformation";
}

impl Method for GetDeviceInformation {
    type Response = GetDeviceInformationResponse;
}

#[derive(Debug, Clone, Default, Deserialize)]
#[rustfmt::skip]
pub struct GetDeviceInformationResponse {
    #[serde(rename = "Manufacturer", default)]      pub manufacturer:       String,
    #[serde(rename = "Model", default)]             pub model:              String,
    #[serde(rename = "FirmwareVersion", default)]   pub firmware_version:   String,
    #[serde(rename = "SerialNumber", default)]      pub serial_number:      String,
    #[serde(rename = "HardwareId", default)]        pub hardware_id:        String,
}

impl Operation for GetDeviceInformationResponse {
    const SERVICE: &'static str = "device";
    const NAME: &'static str = "GetDeviceInformationResponse";
}

/// A summarized version of GetCapabilities, one entry per service namespace.
#[derive(Debug, Clone, Serialize)]
#[serde(rename = "tds:GetServices")]
pub struct GetServices {
    #[serde(rename = "tds:IncludeCapability")]
    pub include_capability: bool,
}

impl Operation for GetServices {
    const SERVICE: &'static str = "device";
    const NAME: &'static str = "GetServices";
}

impl Method for GetServices {
    type Response = GetServicesResponse;
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetServicesResponse {
    #[serde(rename = "Service", default)]
    pub services: Vec<Service>,
}

impl Operation for GetServicesResponse {
    const SERVICE: &'static str = "device";
    const NAME: &'static str = "GetServicesResponse";
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Service {
    #[serde(rename = "Namespace", default)]
    pub namespace: String,
    #[serde(rename = "XAddr", default)]
    pub xaddr: String,
    #[serde(rename = "Version", default)]
    pub version: Option<Version>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Version {
    #[serde(rename = "Major", default)]
    pub major: u32,
    #[serde(rename = "Minor", default)]
    pub minor: u32,
}
