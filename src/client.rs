use std::collections::HashMap;

use reqwest::{Client, header::ACCEPT};
use tracing::debug;
use url::Url;

use crate::{
    AuthorizationRequest, AuthorizationResponse, GoogleProvider, OAuthError, PkcePair,
    SessionCredential, TokenResponse, pkce,
};

#[derive(Debug, Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scope: Option<String>,
    pub authorize_params: Vec<(String, String)>,
}

impl OAuthClientConfig {
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: redirect_uri.into(),
            scope: None,
            authorize_params: Vec::new(),
        }
    }

    pub fn with_client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_authorize_param(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.authorize_params.push((key.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct OAuthClient {
    provider: GoogleProvider,
    config: OAuthClientConfig,
    http: Client,
}

impl OAuthClient {
    pub fn new(provider: GoogleProvider, config: OAuthClientConfig) -> Result<Self, OAuthError> {
        let http = Client::builder().build()?;
        Ok(Self {
            provider,
            config,
            http,
        })
    }

    pub fn provider(&self) -> &GoogleProvider {
        &self.provider
    }

    pub fn config(&self) -> &OAuthClientConfig {
        &self.config
    }

    pub fn scope(&self) -> &str {
        self.config
            .scope
            .as_deref()
            .unwrap_or(self.provider.default_scope())
    }

    pub fn authorization_url(&self) -> Result<AuthorizationRequest, OAuthError> {
        let pkce = PkcePair::generate()?;
        let state = pkce::generate_state()?;
        let scope = self.scope().to_string();

        let mut params: HashMap<String, String> = HashMap::new();
        for (key, value) in self.provider.authorize_params() {
            params.insert(key.to_string(), value.to_string());
        }
        for (key, value) in &self.config.authorize_params {
            params.insert(key.clone(), value.clone());
        }

        params.insert("response_type".to_string(), "code".to_string());
        params.insert("client_id".to_string(), self.config.client_id.clone());
        params.insert("redirect_uri".to_string(), self.config.redirect_uri.clone());
        params.insert("scope".to_string(), scope.clone());
        params.insert("code_challenge".to_string(), pkce.code_challenge.clone());
        params.insert("code_challenge_method".to_string(), "S256".to_string());
        params.insert("state".to_string(), state.clone());

        let mut url = Url::parse(self.provider.authorize_url())?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(&key, &value);
            }
        }

        Ok(AuthorizationRequest {
            authorization_url: url.to_string(),
            pkce,
            state,
            scope,
        })
    }

    /// Redeems an authorization code. The caller has already matched the
    /// returned state to the verifier it issued.
    pub async fn exchange_code(
        &self,
        response: AuthorizationResponse,
        code_verifier: &str,
    ) -> Result<TokenResponse, OAuthError> {
        let mut payload = HashMap::new();
        payload.insert("grant_type".to_string(), "authorization_code".to_string());
        payload.insert("code".to_string(), response.code);
        payload.insert("client_id".to_string(), self.config.client_id.clone());
        payload.insert("redirect_uri".to_string(), self.config.redirect_uri.clone());
        payload.insert("code_verifier".to_string(), code_verifier.to_string());

        if let Some(secret) = &self.config.client_secret {
            payload.insert("client_secret".to_string(), secret.clone());
        }

        self.send_token_request(self.provider.token_url(), payload)
            .await
    }

    /// Runs the refresh grant against the endpoint and client recorded in
    /// the credential.
    pub async fn refresh_credential(
        &self,
        credential: &SessionCredential,
    ) -> Result<TokenResponse, OAuthError> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or(OAuthError::MissingRefreshToken)?;

        let mut payload = HashMap::new();
        payload.insert("grant_type".to_string(), "refresh_token".to_string());
        payload.insert("refresh_token".to_string(), refresh_token.to_string());
        payload.insert("client_id".to_string(), credential.client_id.clone());
        payload.insert(
            "client_secret".to_string(),
            credential.client_secret.clone(),
        );

        self.send_token_request(&credential.token_endpoint_uri, payload)
            .await
    }

    async fn send_token_request(
        &self,
        token_url: &str,
        payload: HashMap<String, String>,
    ) -> Result<TokenResponse, OAuthError> {
        debug!(
            grant_type = payload.get("grant_type").map(String::as_str),
            "sending token request"
        );

        let response = self
            .http
            .post(token_url)
            .header(ACCEPT, "application/json")
            .form(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(OAuthError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let token = serde_json::from_str(&body).map_err(|err| OAuthError::InvalidResponse {
            message: err.to_string(),
            body,
        })?;

        Ok(token)
    }
}
