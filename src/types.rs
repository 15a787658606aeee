use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::OAuthError;

#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub authorization_url: String,
    pub pkce: crate::PkcePair,
    pub state: String,
    pub scope: String,
}

#[derive(Debug, Clone)]
pub struct AuthorizationResponse {
    pub code: String,
    pub state: Option<String>,
}

impl AuthorizationResponse {
    /// Parses the query of a redirect back from the provider.
    ///
    /// A provider-reported `error` takes precedence over a missing code so the
    /// caller sees why consent failed.
    pub fn from_url(callback_url: &str) -> Result<Self, OAuthError> {
        let url = Url::parse(callback_url)?;
        let mut code = None;
        let mut state = None;
        let mut error = None;
        let mut error_description = None;

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                "error_description" => error_description = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(error) = error {
            return Err(OAuthError::AuthorizationDenied {
                error,
                description: error_description,
            });
        }

        let code = code
            .filter(|code| !code.is_empty())
            .ok_or(OAuthError::MissingAuthorizationCode)?;
        Ok(Self { code, state })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub expires_in: Option<u64>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}
