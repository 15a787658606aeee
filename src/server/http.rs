use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, RawQuery, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::{
    CredentialStore, FlowController, ListingError, OAuthError, ResourceLister, StoreError,
};

use super::target::RedirectTarget;

const WELCOME: &str = "Welcome to the Google Drive loader!";
const AUTH_COMPLETE: &str = "Authentication complete! You can now use the Google Drive API.";
const AUTHENTICATE_FIRST: &str = "You need to authenticate first. Visit /login.";

pub const CALLBACK_PATH: &str = "/auth/callback";

/// Everything a request handler needs, shared across requests.
#[derive(Clone)]
pub struct AppState {
    flow: Arc<FlowController>,
    store: Arc<CredentialStore>,
    lister: Arc<dyn ResourceLister>,
    target: RedirectTarget,
}

impl AppState {
    pub fn new(
        flow: FlowController,
        store: CredentialStore,
        lister: impl ResourceLister + 'static,
    ) -> Result<Self, OAuthError> {
        let target = RedirectTarget::parse(&flow.client().config().redirect_uri)?;
        if target.path != CALLBACK_PATH {
            warn!(
                path = %target.path,
                "redirect uri path differs from {CALLBACK_PATH}; a proxy must rewrite it"
            );
        }
        Ok(Self {
            flow: Arc::new(flow),
            store: Arc::new(store),
            lister: Arc::new(lister),
            target,
        })
    }
}

#[derive(Debug, Serialize)]
struct MessageBody {
    message: String,
}

impl MessageBody {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct LoadDocumentsParams {
    folder_id: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{}", AUTHENTICATE_FIRST)]
    MissingCredential,

    #[error("{0}")]
    InvalidQuery(String),

    #[error("failed to start authorization: {0}")]
    Authorize(#[source] OAuthError),

    #[error("authorization failed: {0}")]
    Exchange(#[source] OAuthError),

    #[error("token refresh failed, visit /login to re-authenticate: {0}")]
    Refresh(#[source] OAuthError),

    #[error("{0}")]
    Listing(#[from] ListingError),

    #[error("credential store error: {0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::MissingCredential,
            other => Self::Store(other),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidQuery(rejection.body_text())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingCredential => StatusCode::UNAUTHORIZED,
            Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Self::Exchange(OAuthError::Http(_)) | Self::Refresh(OAuthError::Http(_)) => {
                StatusCode::BAD_GATEWAY
            }
            // Google failing is not the caller's fault.
            Self::Exchange(OAuthError::HttpStatus { status, .. })
            | Self::Refresh(OAuthError::HttpStatus { status, .. })
                if *status >= 500 =>
            {
                StatusCode::BAD_GATEWAY
            }
            Self::Exchange(_) => StatusCode::BAD_REQUEST,
            Self::Refresh(_) => StatusCode::UNAUTHORIZED,
            Self::Authorize(_) | Self::Listing(_) | Self::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.to_string();
        if status.is_server_error() {
            error!(status = status.as_u16(), %detail, "request failed");
        } else {
            warn!(status = status.as_u16(), %detail, "request rejected");
        }
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/login", get(login))
        .route(CALLBACK_PATH, get(auth_callback))
        .route("/load_documents", get(load_documents))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn root() -> impl IntoResponse {
    MessageBody::new(WELCOME)
}

async fn login(State(state): State<AppState>) -> Result<Redirect, AppError> {
    let request = state.flow.initiate().map_err(AppError::Authorize)?;
    Ok(Redirect::temporary(&request.authorization_url))
}

async fn auth_callback(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<impl IntoResponse, AppError> {
    let callback_url = state
        .target
        .build_callback_url(&query.unwrap_or_default())
        .map_err(AppError::Exchange)?;

    let credential = state
        .flow
        .complete(&callback_url)
        .await
        .map_err(AppError::Exchange)?;
    state.store.save(&credential).await?;

    info!(path = %state.store.path().display(), "credential stored");
    Ok(MessageBody::new(AUTH_COMPLETE))
}

async fn load_documents(
    State(state): State<AppState>,
    query: Result<Query<LoadDocumentsParams>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(params) = query?;
    let mut credential = state.store.load().await?;

    if state
        .flow
        .ensure_fresh(&mut credential)
        .await
        .map_err(AppError::Refresh)?
    {
        state.store.save(&credential).await?;
    }

    let documents = state.lister.list(&credential, &params.folder_id).await?;
    info!(folder_id = %params.folder_id, count = documents.len(), "documents loaded");

    Ok(MessageBody::new(format!(
        "Successfully loaded {} documents!",
        documents.len()
    )))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::AppError;
    use crate::{ListingError, OAuthError, StoreError};

    #[test]
    fn errors_map_to_status_codes() {
        let missing: AppError = StoreError::NotFound {
            path: "token.json".into(),
        }
        .into();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            missing.to_string(),
            "You need to authenticate first. Visit /login."
        );

        assert_eq!(
            AppError::Exchange(OAuthError::MissingState).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Refresh(OAuthError::MissingRefreshToken).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::InvalidQuery("missing field `folder_id`".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(ListingError::EmptyFolderId).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn token_endpoint_outages_are_bad_gateway() {
        let outage = |status| OAuthError::HttpStatus {
            status,
            body: "backend error".to_string(),
        };
        assert_eq!(
            AppError::Exchange(outage(503)).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::Refresh(outage(500)).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::Exchange(outage(400)).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Refresh(outage(401)).status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
