use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::TokenResponse;

/// Tokens are treated as expired this long before their recorded expiry.
const EXPIRY_SKEW_SECS: i64 = 225;

/// The authenticated session persisted between requests.
///
/// Carries its own token endpoint and client identity so it can be refreshed
/// without the flow that created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredential {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub token_endpoint_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: BTreeSet<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

impl SessionCredential {
    pub fn from_token_response(
        token: TokenResponse,
        token_endpoint_uri: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        requested_scope: &str,
    ) -> Self {
        let issued_at = Utc::now();
        let scopes = split_scopes(token.scope.as_deref().unwrap_or(requested_scope));
        Self {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            token_endpoint_uri: token_endpoint_uri.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes,
            expiry: expiry_from(issued_at, token.expires_in),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry
            .is_some_and(|expiry| expiry - Duration::seconds(EXPIRY_SKEW_SECS) <= now)
    }

    /// Folds a refresh-grant response into this credential.
    ///
    /// Providers usually omit the refresh token and scope on refresh; the
    /// existing values are kept in that case.
    pub fn apply_refresh(&mut self, token: TokenResponse) {
        self.access_token = token.access_token;
        self.expiry = expiry_from(Utc::now(), token.expires_in);
        if let Some(refresh_token) = token.refresh_token {
            self.refresh_token = Some(refresh_token);
        }
        if let Some(scope) = token.scope.as_deref() {
            self.scopes = split_scopes(scope);
        }
    }

    pub fn scope_string(&self) -> String {
        self.scopes.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
    }
}

/// An `expires_in` too large to represent is treated as no expiry at all.
fn expiry_from(issued_at: DateTime<Utc>, expires_in: Option<u64>) -> Option<DateTime<Utc>> {
    expires_in
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(Duration::try_seconds)
        .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
}

fn split_scopes(scope: &str) -> BTreeSet<String> {
    scope.split_whitespace().map(str::to_string).collect()
}
