use crate::domain::model::ProviderId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("Map is not ready for provider {provider}")]
    AdapterUnavailable { provider: ProviderId },

    #[error("No {kind} adapter registered for provider {provider}")]
    UnregisteredProvider {
        kind: &'static str,
        provider: ProviderId,
    },

    #[error("Map provider mismatch: expected {expected}, got {actual}")]
    ProviderMismatch {
        expected: ProviderId,
        actual: ProviderId,
    },

    #[error("Native map call failed: {message}")]
    NativeError { message: String },

    #[error("Invalid descriptor '{id}': {reason}")]
    InvalidDescriptor { id: String, reason: String },

    #[error("Geocoder error: {message}")]
    GeocodeError { message: String },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl GeoError {
    pub fn native(message: impl Into<String>) -> Self {
        GeoError::NativeError {
            message: message.into(),
        }
    }

    pub fn invalid_descriptor(id: &str, reason: impl Into<String>) -> Self {
        GeoError::InvalidDescriptor {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            GeoError::AdapterUnavailable { .. } => ErrorSeverity::Low,
            GeoError::HttpError(_) | GeoError::GeocodeError { .. } | GeoError::NativeError { .. } => {
                ErrorSeverity::Medium
            }
            GeoError::InvalidDescriptor { .. }
            | GeoError::ConfigError { .. }
            | GeoError::InvalidConfigValueError { .. }
            | GeoError::MissingConfigError { .. }
            | GeoError::SerializationError(_) => ErrorSeverity::High,
            GeoError::UnregisteredProvider { .. }
            | GeoError::ProviderMismatch { .. }
            | GeoError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    /// Whether the caller can retry once the map or network settles.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GeoError::AdapterUnavailable { .. }
                | GeoError::HttpError(_)
                | GeoError::GeocodeError { .. }
                | GeoError::NativeError { .. }
        )
    }

    /// Short message for terminal output, without nested error chains.
    pub fn user_friendly_message(&self) -> String {
        match self {
            GeoError::AdapterUnavailable { provider } => format!("The {} map is not ready yet", provider),
            GeoError::UnregisteredProvider { kind, provider } => {
                format!("No {} support is available for {}", kind, provider)
            }
            GeoError::HttpError(_) | GeoError::GeocodeError { .. } => "The geocoding service could not be reached".to_string(),
            GeoError::IoError(e) => format!("File error: {}", e),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            GeoError::AdapterUnavailable { .. } => "Wait for the map-ready signal before syncing",
            GeoError::UnregisteredProvider { .. } => "Register an adapter for the provider at startup",
            GeoError::ProviderMismatch { .. } => "Switch the session provider before attaching this map",
            GeoError::NativeError { .. } => "Check that the map SDK is loaded and the object is alive",
            GeoError::InvalidDescriptor { .. } => "Fix the marker or zone geometry",
            GeoError::HttpError(_) | GeoError::GeocodeError { .. } => {
                "Check network connectivity, the geocoder endpoint and the API key"
            }
            GeoError::IoError(_) => "Check the file path and permissions",
            GeoError::SerializationError(_) => "Check the JSON payload",
            GeoError::ConfigError { .. }
            | GeoError::InvalidConfigValueError { .. }
            | GeoError::MissingConfigError { .. } => "Fix the scene configuration file",
        }
    }
}

pub type Result<T> = std::result::Result<T, GeoError>;
