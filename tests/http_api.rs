#![cfg(feature = "server")]

// Drives the router end to end. Google's token endpoint and the Drive API are
// stood in for by wiremock; most listing goes through a stub lister.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use chrono::{Duration, Utc};
use drive_loader::{
    AppState, ClientSecrets, CredentialStore, DRIVE_READONLY_SCOPE, DriveLister, FlowController,
    ListingError, ResourceDescriptor, ResourceLister, SessionCredential, router,
};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REDIRECT: &str = "https://if.ngrok.app/auth/callback";

// ── Fixtures ─────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct StubLister {
    count: usize,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl StubLister {
    fn returning(count: usize) -> Self {
        Self {
            count,
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceLister for StubLister {
    async fn list(
        &self,
        credential: &SessionCredential,
        folder_id: &str,
    ) -> Result<Vec<ResourceDescriptor>, ListingError> {
        self.calls
            .lock()
            .unwrap()
            .push((credential.access_token.clone(), folder_id.to_string()));
        Ok((0..self.count)
            .map(|i| ResourceDescriptor {
                id: format!("file-{i}"),
                name: format!("doc-{i}.txt"),
                mime_type: "text/plain".to_string(),
                modified_time: None,
            })
            .collect())
    }
}

struct Harness {
    app: Router,
    store: CredentialStore,
    google: MockServer,
    _dir: TempDir,
}

async fn harness(lister: impl ResourceLister + 'static) -> Harness {
    let google = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let secrets = ClientSecrets {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
        token_uri: format!("{}/token", google.uri()),
        redirect_uris: vec![REDIRECT.to_string()],
    };
    let flow = FlowController::google(&secrets, REDIRECT).unwrap();
    let store = CredentialStore::new(dir.path().join("token.json"));
    let state = AppState::new(flow, store.clone(), lister).unwrap();

    Harness {
        app: router(state),
        store,
        google,
        _dir: dir,
    }
}

impl Harness {
    async fn get(&self, uri: &str) -> Response<Body> {
        self.app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn mount_token(&self, grant: &str, body: Value) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains(format!("grant_type={grant}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.google)
            .await;
    }

    fn credential(&self, access_token: &str, refresh_token: Option<&str>) -> SessionCredential {
        SessionCredential {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(str::to_string),
            token_endpoint_uri: format!("{}/token", self.google.uri()),
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            scopes: [DRIVE_READONLY_SCOPE.to_string()].into(),
            expiry: Some(Utc::now() - Duration::minutes(10)),
        }
    }
}

async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &Response<Body>) -> Url {
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    Url::parse(location).unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn root_returns_welcome_message() {
    let h = harness(StubLister::returning(0)).await;
    let response = h.get("/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(json_body(response).await["message"].is_string());
}

#[tokio::test]
async fn login_redirects_to_consent_with_fixed_scope() {
    let h = harness(StubLister::returning(0)).await;

    let response = h.get("/login").await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let target = location(&response);
    let pairs: HashMap<_, _> = target.query_pairs().into_owned().collect();
    assert_eq!(target.host_str(), Some("accounts.google.com"));
    assert_eq!(pairs["scope"], DRIVE_READONLY_SCOPE);
    assert_eq!(pairs["prompt"], "consent");
    assert_eq!(pairs["redirect_uri"], REDIRECT);
    assert_eq!(pairs["client_id"], "client-id");
    assert!(!pairs["state"].is_empty());
}

#[tokio::test]
async fn load_documents_before_login_is_unauthorized() {
    let lister = StubLister::returning(3);
    let h = harness(lister.clone()).await;

    let response = h.get("/load_documents?folder_id=X").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await,
        json!({"detail": "You need to authenticate first. Visit /login."})
    );
    assert!(lister.calls().is_empty());
}

#[tokio::test]
async fn login_callback_then_load_documents() {
    let lister = StubLister::returning(3);
    let h = harness(lister.clone()).await;
    h.mount_token(
        "authorization_code",
        json!({"access_token": "ya29.first", "refresh_token": "1//rt", "expires_in": 3599}),
    )
    .await;

    let login = h.get("/login").await;
    let state = location(&login)
        .query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())
        .unwrap();

    let callback = h
        .get(&format!("/auth/callback?code=ABC&state={state}"))
        .await;
    assert_eq!(callback.status(), StatusCode::OK);
    assert_eq!(
        json_body(callback).await,
        json!({"message": "Authentication complete! You can now use the Google Drive API."})
    );
    assert!(h.store.path().exists());

    let response = h.get("/load_documents?folder_id=FID123").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"message": "Successfully loaded 3 documents!"})
    );
    assert_eq!(
        lister.calls(),
        vec![("ya29.first".to_string(), "FID123".to_string())]
    );
}

#[tokio::test]
async fn callback_with_unknown_state_is_rejected() {
    let h = harness(StubLister::returning(0)).await;
    h.mount_token(
        "authorization_code",
        json!({"access_token": "ya29.first", "expires_in": 3599}),
    )
    .await;
    let _ = h.get("/login").await;

    let response = h.get("/auth/callback?code=ABC&state=S").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(
        json_body(response).await["detail"]
            .as_str()
            .unwrap()
            .contains("state")
    );
    assert!(!h.store.path().exists());
}

#[tokio::test]
async fn callback_reports_token_endpoint_outage_as_bad_gateway() {
    let h = harness(StubLister::returning(0)).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend error"))
        .mount(&h.google)
        .await;

    let login = h.get("/login").await;
    let state = location(&login)
        .query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())
        .unwrap();

    let response = h
        .get(&format!("/auth/callback?code=ABC&state={state}"))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(json_body(response).await["detail"].is_string());
    assert!(!h.store.path().exists());
}

#[tokio::test]
async fn callback_with_provider_error_is_rejected() {
    let h = harness(StubLister::returning(0)).await;
    let response = h
        .get("/auth/callback?error=access_denied&state=S")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!h.store.path().exists());
}

#[tokio::test]
async fn expired_token_is_refreshed_transparently() {
    let lister = StubLister::returning(2);
    let h = harness(lister.clone()).await;
    h.mount_token(
        "refresh_token",
        json!({"access_token": "ya29.fresh", "expires_in": 3599}),
    )
    .await;
    h.store
        .save(&h.credential("ya29.stale", Some("1//rt")))
        .await
        .unwrap();

    let response = h.get("/load_documents?folder_id=FID123").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"message": "Successfully loaded 2 documents!"})
    );
    assert_eq!(lister.calls()[0].0, "ya29.fresh");

    let stored = h.store.load().await.unwrap();
    assert_eq!(stored.access_token, "ya29.fresh");
    assert_eq!(stored.refresh_token.as_deref(), Some("1//rt"));
    assert!(!stored.is_expired());
}

#[tokio::test]
async fn rejected_refresh_asks_for_login() {
    let lister = StubLister::returning(2);
    let h = harness(lister.clone()).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
        .mount(&h.google)
        .await;
    h.store
        .save(&h.credential("ya29.stale", Some("1//revoked")))
        .await
        .unwrap();

    let response = h.get("/load_documents?folder_id=FID123").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(lister.calls().is_empty());
}

#[tokio::test]
async fn expired_token_without_refresh_fails_downstream() {
    let drive = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"code": 401, "message": "Request had invalid authentication credentials."}
        })))
        .mount(&drive)
        .await;
    let lister = DriveLister::new().with_files_url(format!("{}/drive/v3/files", drive.uri()));
    let h = harness(lister).await;
    h.store
        .save(&h.credential("ya29.stale", None))
        .await
        .unwrap();

    let response = h.get("/load_documents?folder_id=FID123").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let detail = json_body(response).await["detail"].as_str().unwrap().to_string();
    assert!(detail.contains("invalid authentication credentials"));
}

#[tokio::test]
async fn load_documents_requires_folder_id() {
    let h = harness(StubLister::returning(0)).await;
    let response = h.get("/load_documents").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    let body = json_body(response).await;
    assert!(body["detail"].as_str().unwrap().contains("folder_id"));
}

#[tokio::test]
async fn cors_mirrors_origin_with_credentials() {
    let h = harness(StubLister::returning(0)).await;
    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/")
                .header(header::ORIGIN, "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
}
