use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("os rng error: {message}")]
    OsRng { message: String },

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid redirect uri: {0}")]
    InvalidRedirectUri(String),

    #[error("invalid client secrets: {0}")]
    InvalidClientSecrets(String),

    #[error("http status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("invalid response: {message}")]
    InvalidResponse { message: String, body: String },

    #[error("authorization denied by provider: {error}")]
    AuthorizationDenied {
        error: String,
        description: Option<String>,
    },

    #[error("missing authorization code in callback url")]
    MissingAuthorizationCode,

    #[error("missing state in callback url")]
    MissingState,

    #[error("unknown or expired state: {0}")]
    UnknownState(String),

    #[error("credential has no refresh token")]
    MissingRefreshToken,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no credential stored at {}", path.display())]
    NotFound { path: PathBuf },

    #[error("credential file {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to encode credential: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("folder id must not be empty")]
    EmptyFolderId,

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("drive api returned {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("invalid response: {message}")]
    InvalidResponse { message: String, body: String },
}

#[cfg(feature = "server")]
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    OAuth(#[from] OAuthError),
}
