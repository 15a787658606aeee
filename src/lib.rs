//! Google Drive folder listing behind an OAuth 2.0 + PKCE login.
//!
//! The library holds the authorization-code flow, the single-record
//! credential file, and the Drive listing client. With the `server` feature
//! it also provides the axum app that wires them to four HTTP routes.

mod client;
mod credential;
mod error;
mod flow;
mod listing;
mod pkce;
mod providers;
#[cfg(feature = "server")]
mod server;
mod settings;
mod store;
mod types;

pub use client::{OAuthClient, OAuthClientConfig};
pub use credential::SessionCredential;
#[cfg(feature = "server")]
pub use error::ServerError;
pub use error::{ListingError, OAuthError, StoreError};
pub use flow::FlowController;
pub use listing::{DriveLister, ResourceDescriptor, ResourceLister};
pub use pkce::PkcePair;
pub use providers::{ClientSecrets, DRIVE_READONLY_SCOPE, GoogleProvider};
#[cfg(feature = "server")]
pub use server::{
    AppError, AppState, CALLBACK_PATH, DEFAULT_BIND, DEFAULT_CLIENT_SECRETS_PATH,
    DEFAULT_ENV_FILE, DEFAULT_REDIRECT_URI, DEFAULT_TOKEN_PATH, Server, ServerConfig, router,
};
pub use settings::Settings;
pub use store::CredentialStore;
pub use types::{AuthorizationRequest, AuthorizationResponse, TokenResponse};
