//! Typed ONVIF operations.
//!
//! A request type names the service it belongs to and its element name; the
//! dispatcher routes on the former and checks the response pairing with the
//! latter. Serialization is plain serde, element names carry the ONVIF prefix
//! (`tds:`, `trt:`, ...) on the way out and are matched by local name on the
//! way back in.

pub mod device;
pub mod event;
pub mod media;

use crate::error::{OnvifError, Result};

use serde::de::DeserializeOwned;
use serde::Serialize;

pub trait Operation {
    /// Service owning the operation, looked up in the endpoint table
    const SERVICE: &'static str;
    /// Unqualified element name, e.g. `GetCapabilities`
    const NAME: &'static str;
}

/// A request with its response twin.
pub trait Method: Operation + Serialize {
    type Response: Operation + DeserializeOwned + Default;
}

/// `Req::NAME + "Response"` must be `Resp::NAME`.
pub fn check_pairing<Req: Operation, Resp: Operation>() -> Result<()> {
    let name_matches = Resp::NAME
        .strip_suffix("Response")
        .is_some_and(|stem| stem == Req::NAME);

    if name_matches {
        Ok(())
    } else {
        Err(OnvifError::InvalidPairing {
            request: Req::NAME,
            response: Resp::NAME,
        })
    }
}
