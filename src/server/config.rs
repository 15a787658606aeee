use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_BIND: &str = "127.0.0.1:8000";
pub const DEFAULT_CLIENT_SECRETS_PATH: &str = "./auth-configs/credentials.json";
pub const DEFAULT_TOKEN_PATH: &str = "token.json";
pub const DEFAULT_REDIRECT_URI: &str = "https://if.ngrok.app/auth/callback";
pub const DEFAULT_ENV_FILE: &str = ".env";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub client_secrets_path: PathBuf,
    pub token_path: PathBuf,
    pub redirect_uri: String,
    pub env_file: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            client_secrets_path: PathBuf::from(DEFAULT_CLIENT_SECRETS_PATH),
            token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            env_file: PathBuf::from(DEFAULT_ENV_FILE),
        }
    }
}

impl ServerConfig {
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    pub fn with_client_secrets_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.client_secrets_path = path.into();
        self
    }

    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = redirect_uri.into();
        self
    }

    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = path.into();
        self
    }
}
