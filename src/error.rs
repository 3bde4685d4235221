//! Application error types.

use std::collections::HashMap;
use std::fmt;

/// Error carried through every fallible operation of the crate.
#[derive(Debug)]
pub struct AppError {
    payload: HashMap<String, String>,
    kind: ErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed configuration
    Config,
    /// App id is not registered
    AppNotFound,
    /// Fetching or saving repository files failed
    Download,
    /// Dependency installation failed
    Install,
    /// An update is already running for the app
    UpdateInProgress,
    /// Comparing local and remote versions failed
    VersionInquiry,
    /// Supervisor is not connected
    SupervisorUnavailable,
    /// Process error
    Process,
    /// File system error
    Io,
    /// Network error
    Network,
    /// GitHub API error
    GitHub,
    /// General error
    Other,
}

impl ErrorKind {
    pub fn code(&self) -> u32 {
        match self {
            Self::Config => 1001,
            Self::AppNotFound => 1002,
            Self::Download => 2001,
            Self::Install => 2002,
            Self::UpdateInProgress => 2003,
            Self::VersionInquiry => 2004,
            Self::SupervisorUnavailable => 3001,
            Self::Process => 3002,
            Self::Io => 4001,
            Self::Network => 4002,
            Self::GitHub => 4003,
            Self::Other => 9999,
        }
    }
}

impl AppError {
    pub fn new(kind: ErrorKind, payload: HashMap<String, String>) -> Self {
        Self { payload, kind }
    }

    /// Create an error with a single "detail" key from a non-empty string,
    /// or an empty payload if the string is empty.
    fn with_detail(kind: ErrorKind, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let payload = if detail.is_empty() {
            HashMap::new()
        } else {
            HashMap::from([("detail".to_string(), detail)])
        };
        Self::new(kind, payload)
    }

    fn for_app(kind: ErrorKind, id: &str, detail: impl Into<String>) -> Self {
        let mut payload = HashMap::from([("id".to_string(), id.to_string())]);
        let detail = detail.into();
        if !detail.is_empty() {
            payload.insert("detail".to_string(), detail);
        }
        Self::new(kind, payload)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Config, message)
    }

    pub fn app_not_found(id: &str) -> Self {
        Self::for_app(ErrorKind::AppNotFound, id, "")
    }

    pub fn download(id: &str, cause: impl Into<String>) -> Self {
        Self::for_app(ErrorKind::Download, id, cause)
    }

    /// Install step exited unsuccessfully. `code` is `None` when the command
    /// was killed by a signal or could not be spawned.
    pub fn install(id: &str, code: Option<i32>, detail: impl Into<String>) -> Self {
        let mut err = Self::for_app(ErrorKind::Install, id, detail);
        let code = code.map_or_else(|| "none".to_string(), |c| c.to_string());
        err.payload.insert("code".to_string(), code);
        err
    }

    pub fn update_in_progress(id: &str) -> Self {
        Self::for_app(ErrorKind::UpdateInProgress, id, "")
    }

    pub fn version_inquiry(id: &str, cause: impl Into<String>) -> Self {
        Self::for_app(ErrorKind::VersionInquiry, id, cause)
    }

    pub fn supervisor_unavailable(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::SupervisorUnavailable, message)
    }

    pub fn process(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Process, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Io, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Network, message)
    }

    pub fn network_with_url(url: &str, detail: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Network,
            HashMap::from([
                ("url".to_string(), url.to_string()),
                ("detail".to_string(), detail.into()),
            ]),
        )
    }

    pub fn github(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::GitHub, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Other, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.payload.get(key).map(String::as_str)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.payload.is_empty() {
            write!(f, "{:?}", self.kind)
        } else {
            let mut pairs: Vec<String> = self
                .payload
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            pairs.sort();
            write!(f, "{:?}: {}", self.kind, pairs.join(", "))
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(err.to_string())
    }
}

impl From<toml::ser::Error> for AppError {
    fn from(err: toml::ser::Error) -> Self {
        Self::config(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::network(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::other(err.to_string())
    }
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, AppError>;
