//! Error types for the douyin-downloader application.

use thiserror::Error;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value for '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    // Link errors
    #[error("Unrecognized link: {0}")]
    UnrecognizedLinkKind(String),

    #[error("Short link did not redirect to a content page: {0}")]
    RedirectNotFound(String),

    #[error("No valid targets to download")]
    NoValidTargets,

    // API errors
    #[error("Authentication expired: {0}")]
    AuthExpired(String),

    #[error("Upstream server error: HTTP {code}")]
    UpstreamServer { code: u16 },

    #[error("Upstream rejected request: HTTP {code}")]
    UpstreamRejected { code: u16 },

    #[error("Rate limited by upstream")]
    RateLimited,

    #[error("Unexpected upstream response: {0}")]
    UpstreamSchema(String),

    #[error("Item unavailable: {0}")]
    ItemUnavailable(String),

    // Download errors
    #[error("Download failed: {0}")]
    Download(String),

    #[error("Run cancelled")]
    Cancelled,

    // File system errors
    #[error("Invalid filename (path traversal attempt): {0}")]
    InvalidFilename(String),

    #[error("Filesystem error at {path}: {source}")]
    Filesystem {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // Ledger errors
    #[error("Ledger error: {0}")]
    Ledger(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // HTTP errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // URL parsing errors
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap an IO error with the path it happened on.
    pub fn filesystem(path: &std::path::Path, source: std::io::Error) -> Self {
        Error::Filesystem {
            path: path.display().to_string(),
            source,
        }
    }

    /// Whether the failed operation may succeed if attempted again.
    ///
    /// Connection problems, timeouts, 5xx and 429 are transient. Everything the
    /// upstream rejected on purpose (4xx, schema mismatch, missing items) is not,
    /// and neither is an expired login: retrying with the same cookies only burns
    /// quota.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
            }
            Error::UpstreamServer { .. } | Error::RateLimited => true,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Whether this error came from writing to the local filesystem.
    pub fn is_filesystem(&self) -> bool {
        matches!(self, Error::Filesystem { .. } | Error::InvalidFilename(_))
    }

    /// Process exit code for a run that ended with this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_)
            | Error::ConfigValidation { .. }
            | Error::MissingConfig(_)
            | Error::TomlParse(_)
            | Error::NoValidTargets => exit_codes::CONFIG_ERROR,
            Error::AuthExpired(_) => exit_codes::AUTH_EXPIRED,
            Error::Cancelled => exit_codes::ABORT,
            Error::UnrecognizedLinkKind(_)
            | Error::RedirectNotFound(_)
            | Error::UpstreamServer { .. }
            | Error::UpstreamRejected { .. }
            | Error::RateLimited
            | Error::UpstreamSchema(_)
            | Error::ItemUnavailable(_)
            | Error::Network(_) => exit_codes::API_ERROR,
            Error::Download(_) | Error::InvalidFilename(_) | Error::Filesystem { .. } => {
                exit_codes::DOWNLOAD_ERROR
            }
            _ => exit_codes::UNEXPECTED_ERROR,
        }
    }

    /// Whether this error must abort the whole run.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            Error::AuthExpired(_) | Error::NoValidTargets | Error::Cancelled
        )
    }
}

/// Process exit codes.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const ABORT: i32 = 1;
    pub const API_ERROR: i32 = 2;
    pub const CONFIG_ERROR: i32 = 3;
    pub const DOWNLOAD_ERROR: i32 = 4;
    pub const UNEXPECTED_ERROR: i32 = 5;
    pub const AUTH_EXPIRED: i32 = 6;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_retryable() {
        assert!(Error::UpstreamServer { code: 502 }.is_retryable());
        assert!(Error::RateLimited.is_retryable());
    }

    #[test]
    fn test_rejections_are_not_retryable() {
        assert!(!Error::UpstreamRejected { code: 404 }.is_retryable());
        assert!(!Error::UpstreamSchema("no aweme_list".into()).is_retryable());
        assert!(!Error::AuthExpired("status_code 8".into()).is_retryable());
        assert!(!Error::ItemUnavailable("123".into()).is_retryable());
    }

    #[test]
    fn test_io_retryability() {
        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(Error::Io(reset).is_retryable());

        let full = std::io::Error::new(std::io::ErrorKind::Other, "no space left");
        assert!(!Error::Io(full).is_retryable());
    }

    #[test]
    fn test_filesystem_classification() {
        let err = Error::filesystem(
            std::path::Path::new("/downloads/a.mp4"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.is_filesystem());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("/downloads/a.mp4"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::NoValidTargets.exit_code(), exit_codes::CONFIG_ERROR);
        assert_eq!(Error::AuthExpired("x".into()).exit_code(), exit_codes::AUTH_EXPIRED);
        assert_eq!(Error::Cancelled.exit_code(), exit_codes::ABORT);
        assert_eq!(
            Error::UpstreamRejected { code: 403 }.exit_code(),
            exit_codes::API_ERROR
        );
        assert_eq!(Error::Ledger("locked".into()).exit_code(), exit_codes::UNEXPECTED_ERROR);
    }

    #[test]
    fn test_run_fatal() {
        assert!(Error::AuthExpired("x".into()).is_run_fatal());
        assert!(Error::NoValidTargets.is_run_fatal());
        assert!(!Error::UpstreamSchema("x".into()).is_run_fatal());
    }
}
