use std::path::Path;

use secrecy::SecretString;
use tracing::warn;

const OPENAI_API_KEY: &str = "openai_api_key";

/// Optional process settings read from the environment, then a `.env` file.
///
/// Names match case-insensitively. Anything missing stays `None`.
#[derive(Debug, Default)]
pub struct Settings {
    pub openai_api_key: Option<SecretString>,
}

impl Settings {
    pub fn load(env_file: impl AsRef<Path>) -> Self {
        let env: Vec<(String, String)> = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        Self::from_sources(&env, &read_env_file(env_file.as_ref()))
    }

    /// Earlier sources win.
    pub fn from_sources(env: &[(String, String)], file: &[(String, String)]) -> Self {
        Self {
            openai_api_key: lookup(OPENAI_API_KEY, env)
                .or_else(|| lookup(OPENAI_API_KEY, file))
                .map(SecretString::new),
        }
    }
}

fn lookup(name: &str, source: &[(String, String)]) -> Option<String> {
    source
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.clone())
}

fn read_env_file(path: &Path) -> Vec<(String, String)> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(err) if err.not_found() => return Vec::new(),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unreadable env file");
            return Vec::new();
        }
    };

    iter.filter_map(|item| match item {
        Ok(pair) => Some(pair),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "skipping malformed env file entry");
            None
        }
    })
    .collect()
}
