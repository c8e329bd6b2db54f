use crate::{
    api,
    auth::{AuthConfig, AuthService, GitHubConfig, SystemClock},
    cli::telemetry,
    provider::{GitHubProvider, ProviderRegistry},
    store::{memory::MemoryStore, postgres::PgStore, Store},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub signing_key: SecretString,
    pub session_ttl_seconds: i64,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub persistence_timeout_seconds: u64,
    pub provider_timeout_seconds: u64,
    pub session_sweep_seconds: u64,
    pub github_client_id: String,
    pub github_client_secret: SecretString,
    pub github_redirect_uri: String,
    pub github_authorize_url: String,
    pub github_token_url: String,
    pub github_api_url: String,
    pub github_scopes: String,
}

impl Args {
    fn auth_config(&self) -> AuthConfig {
        AuthConfig::new(self.signing_key.clone())
            .with_session_ttl_seconds(self.session_ttl_seconds)
            .with_access_token_ttl_seconds(self.access_token_ttl_seconds)
            .with_refresh_token_ttl_seconds(self.refresh_token_ttl_seconds)
            .with_persistence_timeout(Duration::from_secs(self.persistence_timeout_seconds))
            .with_provider_timeout(Duration::from_secs(self.provider_timeout_seconds))
            .with_session_sweep_interval(Duration::from_secs(self.session_sweep_seconds))
    }

    fn github_config(&self) -> GitHubConfig {
        GitHubConfig::new(
            self.github_client_id.clone(),
            self.github_client_secret.clone(),
            self.github_redirect_uri.clone(),
        )
        .with_authorize_url(self.github_authorize_url.clone())
        .with_token_url(self.github_token_url.clone())
        .with_api_url(self.github_api_url.clone())
        .with_scopes(self.github_scopes.clone())
    }
}

async fn open_store(dsn: Option<&str>) -> Result<Arc<dyn Store>> {
    match dsn {
        Some(dsn) => {
            let store = PgStore::connect(dsn).await?;
            store.migrate().await.context("Failed to apply schema")?;
            info!("using postgres store");
            Ok(Arc::new(store))
        }
        None => {
            warn!("no --dsn given, state is kept in memory and lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the store or provider cannot be set up, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let config = args.auth_config();

    let github = GitHubProvider::new(args.github_config(), config.provider_timeout())
        .context("Failed to build GitHub client")?;
    let providers = ProviderRegistry::new().with_provider(Arc::new(github));

    let store = open_store(args.dsn.as_deref()).await?;

    let service = Arc::new(AuthService::new(
        store,
        providers,
        &config,
        Arc::new(SystemClock),
    ));

    let result = api::new(args.port, service, config.session_sweep_interval()).await;

    telemetry::shutdown_tracer();

    result
}
