//! Result and error types for CSS extraction.

use thiserror::Error;

/// Result type for extraction operations
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Errors that can occur while extracting CSS
///
/// Every variant is terminal for the current call: nothing is retried and no
/// partial result is returned.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The navigated page answered with an HTTP error status (>= 400)
    #[error("There was an error retrieving CSS from {url}.\n\tHTTP status code: {status_code} ({status_text})")]
    InvalidUrl {
        /// URL that was requested
        url: String,
        /// HTTP status code
        status_code: u16,
        /// HTTP status text
        status_text: String,
    },

    /// Navigation did not finish within the configured timeout
    #[error("Navigation timeout of {ms} ms exceeded")]
    NavigationTimeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// A browser override failed shape validation
    #[error("BrowserOverride is not valid. {message} https://github.com/bartveneman/extract-css-core#options")]
    InvalidOverride {
        /// What was wrong with the override
        message: String,
    },

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Page error (evaluation, CDP command, close)
    #[error("Page error: {message}")]
    Page {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExtractError {
    /// Create a page error
    #[must_use]
    pub fn page(message: impl Into<String>) -> Self {
        Self::Page {
            message: message.into(),
        }
    }

    /// Create an invalid override error
    #[must_use]
    pub fn invalid_override(message: impl Into<String>) -> Self {
        Self::InvalidOverride {
            message: message.into(),
        }
    }
}
