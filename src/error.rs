use thiserror::Error;

#[derive(Error, Debug)]
pub enum OnvifError {
    #[error("{request} does not pair with {response}, expected {request}Response")]
    InvalidPairing {
        request: &'static str,
        response: &'static str,
    },

    #[error("Target endpoint service not found: {0}")]
    EndpointNotFound(String),

    #[error("Camera is not available at {address} or it does not support ONVIF services: {reason}")]
    DeviceUnreachable { address: String, reason: String },

    #[error("{0}")]
    ProtocolFault(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Deserialize(quick_xml::DeError),

    #[error("Serialization error: {0}")]
    Serialize(quick_xml::DeError),

    #[error("Request body has no root element")]
    EmptyRequest,

    #[error("XML error: {0}")]
    Xml(#[from] xml::reader::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid device address: {0}")]
    InvalidAddress(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OnvifError {
    /// True when the device answered but the body could not be understood.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            OnvifError::MalformedResponse(_) | OnvifError::Deserialize(_)
        )
    }

    /// The device's fault reason, when the call failed with a SOAP Fault.
    pub fn fault_reason(&self) -> Option<&str> {
        match self {
            OnvifError::ProtocolFault(reason) => Some(reason),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, OnvifError>;
