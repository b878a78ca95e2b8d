use serde::Serialize;
use thiserror::Error;

/// Result type for pasture analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors that can occur while analysing a pasture image
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Image decoding failed: {message}")]
    Decode {
        message: String,
        #[source]
        source: Option<image::ImageError>,
    },

    #[error("Unsupported image format: {mime}")]
    UnsupportedFormat { mime: String },

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("Internal computation error in {stage}: {detail} (input fingerprint {fingerprint})")]
    InternalComputation {
        stage: &'static str,
        detail: String,
        fingerprint: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<image::ImageError> for AnalysisError {
    fn from(err: image::ImageError) -> Self {
        Self::Decode {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl AnalysisError {
    /// Returns true if the caller caused this error (bad bytes, bad MIME type, bad config)
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Decode { .. } | Self::UnsupportedFormat { .. } | Self::Config(_)
        )
    }

    /// Returns true if this error indicates a defect in the engine itself
    pub const fn is_defect(&self) -> bool {
        matches!(self, Self::InternalComputation { .. })
    }

    /// HTTP status an HTTP-style caller should answer with
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Decode { .. } | Self::Config(_) => 400,
            Self::UnsupportedFormat { .. } => 415,
            // Never surfaced as `Err` by the pipeline, but a caller may still map it.
            Self::DegenerateInput(_) => 422,
            Self::InternalComputation { .. } | Self::IoError(_) => 500,
        }
    }

    /// Short machine-readable error code
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "decode_error",
            Self::UnsupportedFormat { .. } => "unsupported_format",
            Self::DegenerateInput(_) => "degenerate_input",
            Self::InternalComputation { .. } => "internal_computation_error",
            Self::Config(_) => "config_error",
            Self::IoError(_) => "io_error",
        }
    }

    /// Build the structured failure body for JSON callers
    pub fn to_response(&self) -> ErrorResponse {
        let cause = std::error::Error::source(self).map(ToString::to_string);
        ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            cause,
            status: self.http_status(),
        }
    }
}

/// Structured failure returned to JSON callers
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    pub status: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_errors_are_client_errors() {
        let err = AnalysisError::Decode {
            message: "truncated".to_string(),
            source: None,
        };
        assert!(err.is_client_error());
        assert_eq!(err.http_status(), 400);

        let err = AnalysisError::UnsupportedFormat {
            mime: "text/plain".to_string(),
        };
        assert!(err.is_client_error());
        assert_eq!(err.http_status(), 415);
    }

    #[test]
    fn test_internal_errors_map_to_server_status() {
        let err = AnalysisError::InternalComputation {
            stage: "ensemble",
            detail: "NaN prediction".to_string(),
            fingerprint: "deadbeef".to_string(),
        };
        assert!(!err.is_client_error());
        assert!(err.is_defect());
        assert_eq!(err.http_status(), 500);

        let response = err.to_response();
        assert_eq!(response.error, "internal_computation_error");
        assert!(response.message.contains("deadbeef"));
        assert!(response.cause.is_none());
    }

    #[test]
    fn test_response_carries_underlying_cause() {
        let source = image::ImageError::IoError(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "unexpected end of file",
        ));
        let err = AnalysisError::from(source);
        let response = err.to_response();
        assert_eq!(response.status, 400);
        assert!(response.cause.is_some());
    }
}
