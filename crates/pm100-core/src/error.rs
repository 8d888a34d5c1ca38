//! Error types for PM100 core.

use thiserror::Error;

/// Core error type: rejected input or an unusable configuration.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Malformed caller input, rejected before anything touches the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("Invalid hardware address '{0}': expected six colon-separated hex octets")]
    HardwareAddress(String),

    #[error("Invalid IPv4 address for {field}: '{value}'")]
    Ipv4 { field: &'static str, value: String },

    #[error("Invalid port {0}: must be within 1-65535")]
    Port(u32),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),

    #[error("Config not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_display() {
        let err = FormatError::HardwareAddress("00:11".to_string());
        assert_eq!(
            format!("{}", err),
            "Invalid hardware address '00:11': expected six colon-separated hex octets"
        );

        let err = FormatError::Ipv4 {
            field: "gateway",
            value: "1.2.3".to_string(),
        };
        assert_eq!(format!("{}", err), "Invalid IPv4 address for gateway: '1.2.3'");
    }

    #[test]
    fn test_core_error_from_format_error() {
        let err: CoreError = FormatError::Port(70000).into();
        assert!(format!("{}", err).contains("Invalid port 70000"));
        assert!(matches!(err, CoreError::Format(FormatError::Port(70000))));
    }

    #[test]
    fn test_config_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: CoreError = ConfigError::from(json_err).into();
        assert!(format!("{}", err).starts_with("Config error: Failed to parse config"));
    }
}
