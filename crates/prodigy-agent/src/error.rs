use prodigy_core::ConfigType;
use thiserror::Error;

/// A marker element that cannot be classified. The element is skipped; the
/// rest of the page is unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    #[error("data-config-type is missing from .prodigy-pricing-button-group")]
    MissingConfigType,

    #[error("data-config-type is an invalid value '{value}', supported values: {supported}")]
    InvalidConfigType { value: String, supported: String },

    #[error("data-vin is missing from {config_type} .prodigy-pricing-button-group")]
    MissingVin { config_type: ConfigType },
}

/// A frame message that looked like one of ours but could not be decoded.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("frame message '{tag}' carries no value")]
    MissingValue { tag: &'static str },

    #[error("applicant info is not valid JSON: {0}")]
    InvalidApplicant(#[source] serde_json::Error),

    #[error("structured frame message is not valid: {0}")]
    InvalidEnvelope(#[source] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AgentError {
    /// The event loop has exited, either through `shutdown` or a panic.
    #[error("agent event loop has stopped")]
    Stopped,
}
