//! Immutable configuration handed to each engine component at construction.

use secrecy::SecretString;
use std::time::Duration;

pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 10 * 60;
pub const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: i64 = 15 * 60;
pub const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
pub const DEFAULT_PERSISTENCE_TIMEOUT_SECONDS: u64 = 5;
pub const DEFAULT_PROVIDER_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_SESSION_SWEEP_SECONDS: u64 = 60;

/// Upper bound accepted for any credential lifetime on the command line.
pub const MAX_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

/// HS256 keys shorter than this are rejected at startup.
pub const MIN_SIGNING_KEY_BYTES: usize = 32;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    signing_key: SecretString,
    session_ttl_seconds: i64,
    access_token_ttl_seconds: i64,
    refresh_token_ttl_seconds: i64,
    persistence_timeout: Duration,
    provider_timeout: Duration,
    session_sweep_interval: Duration,
}

impl AuthConfig {
    #[must_use]
    pub fn new(signing_key: SecretString) -> Self {
        Self {
            signing_key,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            access_token_ttl_seconds: DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
            refresh_token_ttl_seconds: DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
            persistence_timeout: Duration::from_secs(DEFAULT_PERSISTENCE_TIMEOUT_SECONDS),
            provider_timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECONDS),
            session_sweep_interval: Duration::from_secs(DEFAULT_SESSION_SWEEP_SECONDS),
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_access_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_persistence_timeout(mut self, timeout: Duration) -> Self {
        self.persistence_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_session_sweep_interval(mut self, interval: Duration) -> Self {
        self.session_sweep_interval = interval;
        self
    }

    #[must_use]
    pub fn signing_key(&self) -> &SecretString {
        &self.signing_key
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_seconds
    }

    #[must_use]
    pub fn refresh_token_ttl_seconds(&self) -> i64 {
        self.refresh_token_ttl_seconds
    }

    #[must_use]
    pub fn persistence_timeout(&self) -> Duration {
        self.persistence_timeout
    }

    #[must_use]
    pub fn provider_timeout(&self) -> Duration {
        self.provider_timeout
    }

    #[must_use]
    pub fn session_sweep_interval(&self) -> Duration {
        self.session_sweep_interval
    }
}

pub const GITHUB_PROVIDER: &str = "github";
pub const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
pub const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
pub const GITHUB_API_URL: &str = "https://api.github.com";
pub const GITHUB_SCOPES: &str = "read:user user:email";

/// OAuth application registered with GitHub.
#[derive(Clone, Debug)]
pub struct GitHubConfig {
    client_id: String,
    client_secret: SecretString,
    redirect_uri: String,
    authorize_url: String,
    token_url: String,
    api_url: String,
    scopes: String,
}

impl GitHubConfig {
    #[must_use]
    pub fn new(client_id: String, client_secret: SecretString, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            authorize_url: GITHUB_AUTHORIZE_URL.to_string(),
            token_url: GITHUB_TOKEN_URL.to_string(),
            api_url: GITHUB_API_URL.to_string(),
            scopes: GITHUB_SCOPES.to_string(),
        }
    }

    #[must_use]
    pub fn with_authorize_url(mut self, url: String) -> Self {
        self.authorize_url = url;
        self
    }

    #[must_use]
    pub fn with_token_url(mut self, url: String) -> Self {
        self.token_url = url;
        self
    }

    #[must_use]
    pub fn with_api_url(mut self, url: String) -> Self {
        self.api_url = url;
        self
    }

    #[must_use]
    pub fn with_scopes(mut self, scopes: String) -> Self {
        self.scopes = scopes;
        self
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn client_secret(&self) -> &SecretString {
        &self.client_secret
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    #[must_use]
    pub fn authorize_url(&self) -> &str {
        &self.authorize_url
    }

    #[must_use]
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    #[must_use]
    pub fn api_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }

    #[must_use]
    pub fn scopes(&self) -> &str {
        &self.scopes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn defaults_match_credential_windows() {
        let config = AuthConfig::new(SecretString::from("k".repeat(32)));
        assert_eq!(config.session_ttl_seconds(), 600);
        assert_eq!(config.access_token_ttl_seconds(), 900);
        assert_eq!(config.refresh_token_ttl_seconds(), 604_800);
        assert_eq!(config.persistence_timeout(), Duration::from_secs(5));
        assert_eq!(config.provider_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn builder_overrides() {
        let config = AuthConfig::new(SecretString::from("k".repeat(32)))
            .with_session_ttl_seconds(30)
            .with_access_token_ttl_seconds(60)
            .with_refresh_token_ttl_seconds(120)
            .with_persistence_timeout(Duration::from_millis(250))
            .with_provider_timeout(Duration::from_secs(2))
            .with_session_sweep_interval(Duration::from_secs(15));
        assert_eq!(config.session_ttl_seconds(), 30);
        assert_eq!(config.access_token_ttl_seconds(), 60);
        assert_eq!(config.refresh_token_ttl_seconds(), 120);
        assert_eq!(config.persistence_timeout(), Duration::from_millis(250));
        assert_eq!(config.provider_timeout(), Duration::from_secs(2));
        assert_eq!(config.session_sweep_interval(), Duration::from_secs(15));
    }

    #[test]
    fn debug_does_not_leak_secrets() {
        let config = AuthConfig::new(SecretString::from("super-secret-signing-key-material"));
        assert!(!format!("{config:?}").contains("super-secret"));

        let github = GitHubConfig::new(
            "client".into(),
            SecretString::from("github-client-secret"),
            "https://sigil.dev/callback".into(),
        );
        assert!(!format!("{github:?}").contains("github-client-secret"));
        assert_eq!(github.client_secret().expose_secret(), "github-client-secret");
    }

    #[test]
    fn github_defaults() {
        let github = GitHubConfig::new(
            "client".into(),
            SecretString::from("secret"),
            "https://sigil.dev/callback".into(),
        )
        .with_api_url("http://127.0.0.1:9000/".into());
        assert_eq!(github.authorize_url(), GITHUB_AUTHORIZE_URL);
        assert_eq!(github.token_url(), GITHUB_TOKEN_URL);
        assert_eq!(github.api_url(), "http://127.0.0.1:9000");
        assert_eq!(github.scopes(), "read:user user:email");
    }
}
