//! Error types and handling for the weather map application

use std::collections::HashMap;
use thiserror::Error;

/// Machine-readable classification of API failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Credentials rejected by the provider
    ApiUnauthorized,
    /// Too many requests, locally or upstream
    ApiRateLimit,
    /// Provider could not resolve the requested location
    ApiLocationNotFound,
    /// Transport failure or unexpected HTTP status
    ApiNetworkError,
    /// Body could not be decoded or reported `success: false`
    ApiInvalidResponse,
}

impl ErrorCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ApiUnauthorized => "api_unauthorized",
            ErrorCode::ApiRateLimit => "api_rate_limit",
            ErrorCode::ApiLocationNotFound => "api_location_not_found",
            ErrorCode::ApiNetworkError => "api_network_error",
            ErrorCode::ApiInvalidResponse => "api_invalid_response",
        }
    }
}

/// Main error type for the weather map application
#[derive(Error, Debug)]
pub enum WeatherMapError {
    /// Configuration-related errors, including missing credentials
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// API communication errors
    #[error("API error: {message}")]
    Api {
        message: String,
        code: ErrorCode,
        context: HashMap<String, String>,
    },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Cache operation errors
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// Map rendering errors
    #[error("Render error: {message}")]
    Render { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// General application errors
    #[error("Application error: {message}")]
    General { message: String },
}

impl WeatherMapError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new API error without extra context
    pub fn api<S: Into<String>>(message: S, code: ErrorCode) -> Self {
        Self::api_with_context(message, code, HashMap::new())
    }

    /// Create a new API error carrying diagnostic key/value pairs
    pub fn api_with_context<S: Into<String>>(
        message: S,
        code: ErrorCode,
        context: HashMap<String, String>,
    ) -> Self {
        Self::Api {
            message: message.into(),
            code,
            context,
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new cache error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create a new render error
    pub fn render<S: Into<String>>(message: S) -> Self {
        Self::Render {
            message: message.into(),
        }
    }

    /// Create a new general error
    pub fn general<S: Into<String>>(message: S) -> Self {
        Self::General {
            message: message.into(),
        }
    }

    /// API error code, if this is an API error
    #[must_use]
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            WeatherMapError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            WeatherMapError::Config { message } => format!(
                "Configuration error: {message}. Set XWEATHER_CLIENT_ID and XWEATHER_CLIENT_SECRET or check your config file."
            ),
            WeatherMapError::Api { code, message, .. } => match code {
                ErrorCode::ApiUnauthorized => {
                    "Xweather rejected the credentials. Please check your client ID and secret."
                        .to_string()
                }
                ErrorCode::ApiRateLimit => {
                    "Xweather rate limit reached. Please wait a minute and try again.".to_string()
                }
                ErrorCode::ApiLocationNotFound => {
                    "No weather data available for that location.".to_string()
                }
                ErrorCode::ApiNetworkError => {
                    "Unable to connect to Xweather. Please check your internet connection."
                        .to_string()
                }
                ErrorCode::ApiInvalidResponse => format!("Xweather returned an error: {message}"),
            },
            WeatherMapError::Validation { message } => {
                format!("Invalid input: {message}")
            }
            WeatherMapError::Cache { .. } => {
                "Cache operation failed. Try again with --no-cache.".to_string()
            }
            WeatherMapError::Render { message } => format!("Could not render the map: {message}"),
            WeatherMapError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
            WeatherMapError::General { message } => message.clone(),
        }
    }
}

impl From<tera::Error> for WeatherMapError {
    fn from(err: tera::Error) -> Self {
        WeatherMapError::render(err.to_string())
    }
}

impl From<serde_json::Error> for WeatherMapError {
    fn from(err: serde_json::Error) -> Self {
        WeatherMapError::render(format!("serialization failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_err = WeatherMapError::config("missing client id");
        assert!(matches!(config_err, WeatherMapError::Config { .. }));

        let api_err = WeatherMapError::api("connection failed", ErrorCode::ApiNetworkError);
        assert_eq!(api_err.code(), Some(ErrorCode::ApiNetworkError));

        let validation_err = WeatherMapError::validation("invalid coordinates");
        assert!(matches!(validation_err, WeatherMapError::Validation { .. }));
        assert_eq!(validation_err.code(), None);
    }

    #[test]
    fn test_user_messages() {
        let config_err = WeatherMapError::config("test");
        assert!(config_err.user_message().contains("XWEATHER_CLIENT_ID"));

        let api_err = WeatherMapError::api("test", ErrorCode::ApiNetworkError);
        assert!(api_err.user_message().contains("Unable to connect"));

        let invalid = WeatherMapError::api("invalid_location", ErrorCode::ApiInvalidResponse);
        assert!(invalid.user_message().contains("invalid_location"));

        let validation_err = WeatherMapError::validation("test input");
        assert!(validation_err.user_message().contains("test input"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: WeatherMapError = io_err.into();
        assert!(matches!(err, WeatherMapError::Io { .. }));
    }

    #[test]
    fn test_error_code_names() {
        assert_eq!(ErrorCode::ApiRateLimit.as_str(), "api_rate_limit");
        assert_eq!(ErrorCode::ApiUnauthorized.as_str(), "api_unauthorized");
    }
}
