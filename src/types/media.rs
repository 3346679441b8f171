use super::{Method, Operation};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename = "trt:GetProfiles")]
pub struct GetProfiles {}

impl Operation for GetProfiles {
    const SERVICE: &'static str = "media";
    const NAME: &'static str = "GetProfiles";
}

impl Method for GetProfiles {
    type Response = GetProfilesResponse;
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetProfilesResponse {
    #[serde(rename = "Profiles", default)]
    pub profiles: Vec<Profile>,
}

impl Operation for GetProfilesResponse {
    const SERVICE: &'static str = "media";
    const NAME: &'static str = "GetProfilesResponse";
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Profile {
    #[serde(rename = "@token", default)]
    pub token: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "VideoEncoderConfiguration", default)]
    pub video_encoder: Option<VideoEncoderConfiguration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoEncoderConfiguration {
    #[serde(rename = "Encoding", default)]
    pub encoding: String,
    #[serde(rename = "Resolution", default)]
    pub resolution: Option<Resolution>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Resolution {
    #[serde(rename = "Width", default)]
    pub width: u32,
    #[serde(rename = "Height", default)]
    pub height: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename = "trt:GetStreamUri")]
pub struct GetStreamUri {
    #[serde(rename = "trt:StreamSetup")]
    pub stream_setup: StreamSetup,
    #[serde(rename = "trt:ProfileToken")]
    pub profile_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamSetup {
    #[serde(rename = "tt:Stream")]
    pub stream: String,
    #[serde(rename = "tt:Transport")]
    pub transport: Transport,
}

#[derive(Debug, Clone, Serialize)]
pub struct Transport {
    #[serde(rename = "tt:Protocol")]
    pub protocol: String,
}

impl GetStreamUri {
    /// Unicast RTSP stream of the given profile.
    pub fn rtsp(profile_token: &str) -> Self {
        GetStreamUri {
            stream_setup: StreamSetup {
                stream: "RTP-Unicast".to_string(),
                transport: Transport {
                    protocol: "RTSP".to_string(),
                },
            },
            profile_token: profile_token.to_string(),
        }
    }
}

impl Operation for GetStreamUri {
    const SERVICE: &'static str = "media";
    const NAME: &'static str = "GetStreamUri";
}

impl Method for GetStreamUri {
    type Response = GetStreamUriResponse;
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetStreamUriResponse {
    #[serde(rename = "MediaUri", default)]
    pub media_uri: MediaUri,
}

impl Operation for GetStreamUriResponse {
    const SERVICE: &'static str = "media";
    const NAME: &'static str = "GetStreamUriResponse";
}

#[derive(Debug, Clone, Default, Deserialize)]
#[rustfmt::skip]
pub struct MediaUri {
    #[serde(rename = "Uri", default)]                   pub uri:                    String,
    #[serde(rename = "InvalidAfterConnect", default)]   pub invalid_after_connect:  bool,
    #[serde(rename = "InvalidAfterReboot", default)]    pub invalid_after_reboot:   bool,
    #[serde(rename = "Timeout", default)]               pub timeout:                String,
}
