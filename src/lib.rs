//! Client side of the ONVIF camera control protocol.
//!
//! Devices are found with WS-Discovery ([`discover`]) or addressed directly
//! ([`Device::new`]). A [`Device`] learns its service endpoints from
//! GetCapabilities and dispatches typed requests to them as SOAP 1.2 over HTTP,
//! signed with a WS-Security UsernameToken when credentials are set.
//!
//! ```no_run
//! # async fn run() -> onvif_client::Result<()> {
//! use onvif_client::types::media::{GetProfiles, GetStreamUri};
//! use onvif_client::{discover, Config};
//!
//! for device in discover("eth0", None, &Config::default()).await? {
//!     let profiles = device.call_method(&GetProfiles {}).await?;
//!     if let Some(profile) = profiles.profiles.first() {
//!         let uri = device.call_method(&GetStreamUri::rtsp(&profile.token)).await?;
//!         println!("{}: {}", device.address(), uri.media_uri.uri);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod device;
pub mod error;
pub mod logging;
pub mod soap;
pub mod types;

pub use client::discovery::{discover, ProbeMatch};
pub use client::{HttpTransport, SoapReply, Transport};
pub use config::Config;
pub use device::endpoints::EndpointTable;
pub use device::{Credentials, Device, DeviceParams, DeviceType};
pub use error::{OnvifError, Result};
pub use types::{Method, Operation};
