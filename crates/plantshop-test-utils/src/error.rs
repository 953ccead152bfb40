use thiserror::Error;

/// Errors raised while establishing a scenario's preconditions.
///
/// Anything that a step can still assert on is returned as data instead
/// (see [`crate::response::HttpResult`]); only failures that make the rest of
/// the scenario meaningless end up here.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The login request never produced a response
    #[error("Login request to {url} failed: {reason}")]
    LoginTransport { url: String, reason: String },

    /// The target answered the login request with a non-success status
    #[error("Login as '{username}' rejected with status {status}: {body}")]
    LoginRejected {
        username: String,
        status: u16,
        body: String,
    },

    /// Login succeeded but the body carried nothing usable as a token
    #[error("Login as '{username}' returned no usable token")]
    MissingToken { username: String },

    /// Browser process, context or page could not be acquired
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    /// A fixture could not be established within the attempt budget
    #[error("Fixture '{fixture}' not established after {attempts} attempts: {reason}")]
    FixtureExhausted {
        fixture: String,
        attempts: u32,
        reason: String,
    },

    /// The target application is missing data the scenario depends on
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// A lifecycle operation was called in the wrong session state
    #[error("Session is {actual}, expected {expected}")]
    InvalidState { expected: String, actual: String },

    /// HTTP client construction error
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Errors reported by a browser backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Browsing context error: {0}")]
    Context(String),

    #[error("Page error: {0}")]
    Page(String),

    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    #[error("Timed out after {0} ms: {1}")]
    Timeout(u64, String),

    #[error("Failed to close {0}: {1}")]
    Close(String, String),
}

pub type SetupResult<T> = Result<T, SetupError>;
pub type BrowserResult<T> = Result<T, BrowserError>;
