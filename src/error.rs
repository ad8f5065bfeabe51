use thiserror::Error;

/// Result type for Naim bridge operations
pub type Result<T> = std::result::Result<T, NaimError>;

/// Errors that can occur when talking to Naim receivers
#[derive(Error, Debug)]
pub enum NaimError {
    /// The receiver answered with a non-2xx status
    #[error("Naim receiver emitted a bad response (On: {url} - Status: {status} - Details: {message})")]
    DeviceRejected {
        url: String,
        status: u16,
        message: String,
    },

    /// The request left but no response came back
    #[error("Naim receiver did not respond, check its network address (On: {url} - Details: {message})")]
    DeviceUnreachable { url: String, message: String },

    /// The request could not be sent at all
    #[error("Other request error (On: {url} - Details: {message})")]
    Transport { url: String, message: String },

    /// Descriptor document could not be parsed
    #[error("Unable to parse device descriptor: {0}")]
    ParseFailure(String),

    /// Invalid or unexpected response body
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The discovery search could not be started
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Accessory context carries no receiver to talk to
    #[error("No receiver attached to accessory {0}")]
    MissingReceiver(String),

    /// Platform configuration is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NaimError {
    /// Log this error at the component boundary.
    pub(crate) fn report(&self) {
        match self {
            NaimError::DeviceRejected { .. }
            | NaimError::DeviceUnreachable { .. }
            | NaimError::Transport { .. } => tracing::error!("{}", self),
            _ => tracing::error!("Problem: {}", self),
        }
    }

    /// Whether the device itself answered (as opposed to a network failure)
    pub fn is_rejection(&self) -> bool {
        matches!(self, NaimError::DeviceRejected { .. })
    }
}
