use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use drive_loader::{
    DEFAULT_BIND, DEFAULT_CLIENT_SECRETS_PATH, DEFAULT_ENV_FILE, DEFAULT_REDIRECT_URI,
    DEFAULT_TOKEN_PATH, Server, ServerConfig, ServerError,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "drive-loader",
    about = "Serve a Google OAuth login and list Drive folder contents over HTTP."
)]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "DRIVE_LOADER_BIND", default_value = DEFAULT_BIND)]
    bind: SocketAddr,

    /// OAuth client secrets downloaded from the Google Cloud console.
    #[arg(long, env = "DRIVE_LOADER_CLIENT_SECRETS", default_value = DEFAULT_CLIENT_SECRETS_PATH)]
    client_secrets: PathBuf,

    /// Where the authorized session is stored.
    #[arg(long, env = "DRIVE_LOADER_TOKEN_FILE", default_value = DEFAULT_TOKEN_PATH)]
    token_file: PathBuf,

    /// Public callback URL registered with Google.
    #[arg(long, env = "DRIVE_LOADER_REDIRECT_URI", default_value = DEFAULT_REDIRECT_URI)]
    redirect_uri: String,

    #[arg(long, default_value = DEFAULT_ENV_FILE)]
    env_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "drive_loader=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::default()
        .with_bind(cli.bind)
        .with_client_secrets_path(cli.client_secrets)
        .with_token_path(cli.token_file)
        .with_redirect_uri(cli.redirect_uri)
        .with_env_file(cli.env_file);

    Server::new(config).run().await
}
