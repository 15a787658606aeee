use std::path::Path;

use serde::Deserialize;
use url::Url;

use crate::OAuthError;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

// Without offline access Google never issues a refresh token.
const AUTHORIZE_PARAMS: &[(&str, &str)] = &[("access_type", "offline")];

/// Google's OAuth endpoints.
#[derive(Debug, Clone)]
pub struct GoogleProvider {
    authorize_url: String,
    token_url: String,
}

impl Default for GoogleProvider {
    fn default() -> Self {
        Self {
            authorize_url: AUTHORIZE_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
        }
    }
}

impl GoogleProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the endpoints named in a downloaded client secrets file.
    pub fn from_client_secrets(secrets: &ClientSecrets) -> Result<Self, OAuthError> {
        Url::parse(&secrets.auth_uri)?;
        Url::parse(&secrets.token_uri)?;
        Ok(Self {
            authorize_url: secrets.auth_uri.clone(),
            token_url: secrets.token_uri.clone(),
        })
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    pub fn authorize_url(&self) -> &str {
        &self.authorize_url
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    pub fn default_scope(&self) -> &str {
        DRIVE_READONLY_SCOPE
    }

    pub fn authorize_params(&self) -> impl Iterator<Item = (&'static str, &'static str)> {
        AUTHORIZE_PARAMS.iter().copied()
    }
}

/// Client identity from the JSON file the Google Cloud console hands out.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

#[derive(Deserialize)]
struct ClientSecretsFile {
    web: Option<ClientSecrets>,
    installed: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub fn from_json(json: &str) -> Result<Self, OAuthError> {
        let file: ClientSecretsFile = serde_json::from_str(json)
            .map_err(|err| OAuthError::InvalidClientSecrets(err.to_string()))?;
        file.web.or(file.installed).ok_or_else(|| {
            OAuthError::InvalidClientSecrets(
                "expected a \"web\" or \"installed\" client entry".to_string(),
            )
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, OAuthError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|err| {
            OAuthError::InvalidClientSecrets(format!("{}: {err}", path.display()))
        })?;
        Self::from_json(&json)
    }
}

fn default_auth_uri() -> String {
    AUTHORIZE_URL.to_string()
}

fn default_token_uri() -> String {
    TOKEN_URL.to_string()
}
