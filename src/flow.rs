//! Authorization-code lifecycle for the single configured application.
//!
//! The controller is built once at startup. Its client identity, redirect
//! target, and scopes never change; the only mutable part is the table of
//! consent requests still waiting for their callback.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::{
    AuthorizationRequest, AuthorizationResponse, ClientSecrets, GoogleProvider, OAuthClient,
    OAuthClientConfig, OAuthError, SessionCredential,
};

const DEFAULT_PENDING_TTL_SECS: i64 = 600;
const DEFAULT_MAX_PENDING: usize = 64;

#[derive(Debug, Clone)]
struct PendingAuthorization {
    code_verifier: String,
    issued_at: DateTime<Utc>,
    seq: u64,
}

#[derive(Debug)]
pub struct FlowController {
    client: OAuthClient,
    pending: Mutex<HashMap<String, PendingAuthorization>>,
    pending_ttl: Duration,
    max_pending: usize,
    issued: AtomicU64,
}

impl FlowController {
    /// Drive read-only flow with a forced consent screen on every login.
    pub fn google(
        secrets: &ClientSecrets,
        redirect_uri: impl Into<String>,
    ) -> Result<Self, OAuthError> {
        let provider = GoogleProvider::from_client_secrets(secrets)?;
        let config = OAuthClientConfig::new(secrets.client_id.clone(), redirect_uri)
            .with_client_secret(secrets.client_secret.clone())
            .with_scope(provider.default_scope().to_string())
            .with_authorize_param("prompt", "consent");
        Ok(Self::new(OAuthClient::new(provider, config)?))
    }

    pub fn new(client: OAuthClient) -> Self {
        Self {
            client,
            pending: Mutex::new(HashMap::new()),
            pending_ttl: Duration::seconds(DEFAULT_PENDING_TTL_SECS),
            max_pending: DEFAULT_MAX_PENDING,
            issued: AtomicU64::new(0),
        }
    }

    pub fn with_pending_ttl(mut self, ttl: Duration) -> Self {
        self.pending_ttl = ttl;
        self
    }

    /// Most consent requests kept waiting at once; the oldest is dropped
    /// to make room.
    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending.max(1);
        self
    }

    pub fn client(&self) -> &OAuthClient {
        &self.client
    }

    /// Builds the consent URL and remembers its state until the callback.
    pub fn initiate(&self) -> Result<AuthorizationRequest, OAuthError> {
        let request = self.client.authorization_url()?;
        let now = Utc::now();
        let mut pending = self.lock_pending();
        pending.retain(|_, entry| now - entry.issued_at <= self.pending_ttl);
        while pending.len() >= self.max_pending {
            let oldest = pending
                .iter()
                .min_by_key(|(_, entry)| entry.seq)
                .map(|(state, _)| state.clone());
            match oldest {
                Some(state) => pending.remove(&state),
                None => break,
            };
        }
        pending.insert(
            request.state.clone(),
            PendingAuthorization {
                code_verifier: request.pkce.code_verifier.clone(),
                issued_at: now,
                seq: self.issued.fetch_add(1, Ordering::Relaxed),
            },
        );
        debug!(pending = pending.len(), "issued authorization request");
        Ok(request)
    }

    /// Exchanges the code carried by `callback_url` for a session credential.
    ///
    /// The returned state must match one issued by [`initiate`](Self::initiate)
    /// that has not been used or expired.
    pub async fn complete(&self, callback_url: &str) -> Result<SessionCredential, OAuthError> {
        let response = AuthorizationResponse::from_url(callback_url)?;
        let state = response.state.clone().ok_or(OAuthError::MissingState)?;
        let pending = self.take_pending(&state)?;

        let token = self
            .client
            .exchange_code(response, &pending.code_verifier)
            .await?;

        let config = self.client.config();
        let credential = SessionCredential::from_token_response(
            token,
            self.client.provider().token_url(),
            config.client_id.clone(),
            config.client_secret.clone().unwrap_or_default(),
            self.client.scope(),
        );
        if credential.refresh_token.is_none() {
            warn!("provider did not issue a refresh token; re-login will be needed on expiry");
        }
        info!(scopes = %credential.scope_string(), "authorization complete");
        Ok(credential)
    }

    /// Refreshes the access token in place.
    pub async fn refresh(&self, credential: &mut SessionCredential) -> Result<(), OAuthError> {
        let token = self.client.refresh_credential(credential).await?;
        credential.apply_refresh(token);
        info!(expiry = ?credential.expiry, "access token refreshed");
        Ok(())
    }

    /// Refreshes only when the token is expired and can be refreshed.
    ///
    /// An expired credential without a refresh token is left as is; the
    /// downstream call then fails on authorization. Returns whether the
    /// credential changed.
    pub async fn ensure_fresh(
        &self,
        credential: &mut SessionCredential,
    ) -> Result<bool, OAuthError> {
        if !credential.is_expired() {
            return Ok(false);
        }
        if credential.refresh_token.is_none() {
            warn!("access token expired and no refresh token is stored");
            return Ok(false);
        }
        self.refresh(credential).await?;
        Ok(true)
    }

    fn take_pending(&self, state: &str) -> Result<PendingAuthorization, OAuthError> {
        let entry = self
            .lock_pending()
            .remove(state)
            .ok_or_else(|| OAuthError::UnknownState(state.to_string()))?;
        if Utc::now() - entry.issued_at > self.pending_ttl {
            return Err(OAuthError::UnknownState(state.to_string()));
        }
        Ok(entry)
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingAuthorization>> {
        // The table holds no invariants a panicking holder could break.
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
