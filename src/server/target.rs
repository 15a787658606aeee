use url::Url;

use crate::OAuthError;

/// The public redirect URI the provider sends the browser back to.
///
/// The server usually sits behind a tunnel or proxy, so the callback URL is
/// rebuilt from this rather than from the request's own host.
#[derive(Debug, Clone)]
pub(crate) struct RedirectTarget {
    pub(crate) scheme: String,
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) path: String,
}

impl RedirectTarget {
    pub(crate) fn parse(redirect_uri: &str) -> Result<Self, OAuthError> {
        let url = Url::parse(redirect_uri)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(OAuthError::InvalidRedirectUri(
                "redirect uri must use http or https scheme".to_string(),
            ));
        }

        let host = url.host_str().ok_or_else(|| {
            OAuthError::InvalidRedirectUri("redirect uri is missing host".to_string())
        })?;

        let port = url.port_or_known_default().ok_or_else(|| {
            OAuthError::InvalidRedirectUri("redirect uri is missing port".to_string())
        })?;

        Ok(Self {
            scheme: url.scheme().to_string(),
            host: host.to_string(),
            port,
            path: url.path().to_string(),
        })
    }

    pub(crate) fn build_callback_url(&self, query: &str) -> Result<String, OAuthError> {
        let mut url = Url::parse(&format!("{}://{}{}", self.scheme, self.host, self.path))?;
        // Known default ports are dropped by `Url` on their own.
        url.set_port(Some(self.port))
            .map_err(|_| OAuthError::InvalidRedirectUri(format!("invalid port {}", self.port)))?;

        if !query.is_empty() {
            url.set_query(Some(query));
        }
        Ok(url.to_string())
    }
}
