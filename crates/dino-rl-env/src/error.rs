//! Error type for the Chrome Dino environments

use thiserror::Error;

/// Errors raised while configuring or driving the game
#[derive(Error, Debug)]
pub enum DinoError {
    /// `input_mode` outside the supported set
    #[error("Unsupported input mode '{0}', type: 'one_obstacle' or 'two_obstacle'")]
    UnsupportedInputMode(String),

    /// `score_mode` outside the supported set
    #[error("Unsupported score mode '{0}', type: 'normal' or 'penalization'")]
    UnsupportedScoreMode(String),

    /// A configuration value had the wrong type or could not be parsed
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Error object returned by the WebDriver endpoint
    #[error("WebDriver error '{error}': {message}")]
    WebDriver {
        /// W3C error code, e.g. `javascript error`
        error: String,
        /// Human readable message from the driver
        message: String,
    },

    /// A script returned a value of an unexpected shape
    #[error("Unexpected script result for `{script}`: {value}")]
    UnexpectedValue {
        /// The script that was executed
        script: String,
        /// What came back
        value: serde_json::Value,
    },

    /// The driver process did not become ready in time
    #[error("chromedriver did not become ready on port {port} within {waited_ms} ms")]
    DriverStartup {
        /// Port the driver was told to listen on
        port: u16,
        /// How long we waited
        waited_ms: u64,
    },

    /// Fetching the driver binary failed
    #[error("Failed to download chromedriver: {0}")]
    Download(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Canvas could not be decoded
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Canvas payload was not valid base64
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Driver archive could not be read
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Configuration file could not be parsed
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DinoError {
    /// Whether this is the benign error a navigation to `chrome://dino` produces
    /// (the page is served as an error page, which some drivers report as a failure).
    #[must_use]
    pub fn is_navigation_interruption(&self) -> bool {
        matches!(self, Self::WebDriver { error, .. }
            if error == "unknown error" || error == "timeout" || error == "insecure certificate")
    }
}

impl From<DinoError> for dino_rl_core::RLError {
    fn from(err: DinoError) -> Self {
        dino_rl_core::RLError::Other(anyhow::Error::new(err))
    }
}

/// Result type alias for game operations
pub type Result<T> = std::result::Result<T, DinoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converts_into_core_error_without_losing_type() {
        let err: dino_rl_core::RLError = DinoError::UnsupportedInputMode("three_obstacle".into()).into();
        assert!(err.to_string().contains("three_obstacle"));

        let dino_rl_core::RLError::Other(inner) = err else {
            panic!("expected RLError::Other");
        };
        assert!(matches!(
            inner.downcast_ref::<DinoError>(),
            Some(DinoError::UnsupportedInputMode(_))
        ));
    }

    #[test]
    fn test_navigation_interruption_classification() {
        let benign = DinoError::WebDriver {
            error: "unknown error".into(),
            message: "net::ERR_DISALLOWED_URL_SCHEME".into(),
        };
        let fatal = DinoError::WebDriver {
            error: "invalid session id".into(),
            message: "session deleted".into(),
        };
        assert!(benign.is_navigation_interruption());
        assert!(!fatal.is_navigation_interruption());
    }
}
