mod config;
mod http;
mod target;

use tokio::net::TcpListener;
use tracing::info;

use crate::{
    ClientSecrets, CredentialStore, DriveLister, FlowController, ServerError, Settings,
};

pub use config::{
    DEFAULT_BIND, DEFAULT_CLIENT_SECRETS_PATH, DEFAULT_ENV_FILE, DEFAULT_REDIRECT_URI,
    DEFAULT_TOKEN_PATH, ServerConfig,
};
pub use http::{AppError, AppState, CALLBACK_PATH, router};

#[derive(Debug, Clone)]
pub struct Server {
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Wires the Google flow, the credential file, and the Drive lister.
    ///
    /// Fails when the client secrets file is missing or invalid.
    pub fn build_state(&self) -> Result<AppState, ServerError> {
        let secrets = ClientSecrets::load(&self.config.client_secrets_path)?;
        let flow = FlowController::google(&secrets, self.config.redirect_uri.clone())?;
        let store = CredentialStore::new(self.config.token_path.clone());
        Ok(AppState::new(flow, store, DriveLister::new())?)
    }

    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        Ok(TcpListener::bind(self.config.bind).await?)
    }

    /// Serves until Ctrl-C.
    pub async fn run(self) -> Result<(), ServerError> {
        let settings = Settings::load(&self.config.env_file);
        info!(
            openai_api_key_configured = settings.openai_api_key.is_some(),
            "settings loaded"
        );

        let state = self.build_state()?;
        let listener = self.bind().await?;
        info!(
            addr = %listener.local_addr()?,
            redirect_uri = %self.config.redirect_uri,
            token_file = %self.config.token_path.display(),
            "listening"
        );

        self.listen_with(listener, state).await
    }

    pub async fn listen_with(
        &self,
        listener: TcpListener,
        state: AppState,
    ) -> Result<(), ServerError> {
        axum::serve(listener, router(state))
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("shutting down");
            })
            .await?;
        Ok(())
    }
}
