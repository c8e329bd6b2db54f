use super::{ExternalProfile, IdentityProvider, ProviderError, ProviderToken};
use crate::auth::{config::GITHUB_PROVIDER, pkce::CODE_CHALLENGE_METHOD, GitHubConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header::ACCEPT, Client};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

const TOKEN_ENDPOINT: &str = "github token endpoint";
const USER_ENDPOINT: &str = "github user endpoint";
const EMAILS_ENDPOINT: &str = "github emails endpoint";
const GITHUB_JSON: &str = "application/vnd.github+json";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: Option<i64>,
    login: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    verified: bool,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Primary address first, then any verified one, then whatever comes first.
fn choose_email(emails: Vec<GitHubEmail>) -> Option<String> {
    let pick = emails
        .iter()
        .position(|e| e.primary)
        .or_else(|| emails.iter().position(|e| e.verified))
        .or_else(|| (!emails.is_empty()).then_some(0))?;
    emails
        .into_iter()
        .nth(pick)
        .map(|e| e.email)
        .filter(|email| !email.trim().is_empty())
}

pub struct GitHubProvider {
    config: GitHubConfig,
    authorize_url: Url,
    http: Client,
}

impl GitHubProvider {
    /// # Errors
    /// Returns an error if the authorize URL is invalid or the HTTP client cannot be built.
    pub fn new(config: GitHubConfig, timeout: Duration) -> Result<Self> {
        let authorize_url = Url::parse(config.authorize_url())
            .with_context(|| format!("Invalid GitHub authorize URL: {}", config.authorize_url()))?;

        let http = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to build GitHub HTTP client")?;

        Ok(Self {
            config,
            authorize_url,
            http,
        })
    }

    fn ensure_success(
        response: reqwest::Response,
        endpoint: &'static str,
    ) -> Result<reqwest::Response, ProviderError> {
        if response.status().is_success() {
            return Ok(response);
        }
        Err(ProviderError::Status {
            endpoint,
            status: response.status().as_u16(),
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        access_token: &SecretString,
        endpoint: &'static str,
    ) -> Result<T, ProviderError> {
        let response = self
            .http
            .get(format!("{}{path}", self.config.api_url()))
            .bearer_auth(access_token.expose_secret())
            .header(ACCEPT, GITHUB_JSON)
            .send()
            .await
            .map_err(|source| ProviderError::Http { endpoint, source })?;

        let response = Self::ensure_success(response, endpoint)?;
        response.json::<T>().await.map_err(|err| ProviderError::Decode {
            endpoint,
            detail: err.to_string(),
        })
    }
}

#[async_trait]
impl IdentityProvider for GitHubProvider {
    fn name(&self) -> &str {
        GITHUB_PROVIDER
    }

    fn redirect_uri(&self) -> &str {
        self.config.redirect_uri()
    }

    fn authorization_url(&self, state: &str, code_challenge: &str) -> String {
        let mut url = self.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", self.config.client_id())
            .append_pair("redirect_uri", self.config.redirect_uri())
            .append_pair("state", state)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", CODE_CHALLENGE_METHOD)
            .append_pair("scope", self.config.scopes());
        url.into()
    }

    #[instrument(skip_all, fields(provider = GITHUB_PROVIDER))]
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<ProviderToken, ProviderError> {
        let params = [
            ("client_id", self.config.client_id()),
            ("client_secret", self.config.client_secret().expose_secret()),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri()),
            ("code_verifier", code_verifier),
        ];

        let response = self
            .http
            .post(self.config.token_url())
            .header(ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|source| ProviderError::Http {
                endpoint: TOKEN_ENDPOINT,
                source,
            })?;

        let response = Self::ensure_success(response, TOKEN_ENDPOINT)?;
        let body: TokenResponse = response.json().await.map_err(|err| ProviderError::Decode {
            endpoint: TOKEN_ENDPOINT,
            detail: err.to_string(),
        })?;

        // GitHub reports OAuth failures (bad_verification_code, ...) with HTTP 200.
        if let Some(error) = body.error {
            let reason = match body.error_description {
                Some(description) => format!("{error}: {description}"),
                None => error,
            };
            return Err(ProviderError::Rejected {
                endpoint: TOKEN_ENDPOINT,
                reason,
            });
        }

        let access_token = non_empty(body.access_token).ok_or_else(|| ProviderError::Decode {
            endpoint: TOKEN_ENDPOINT,
            detail: "missing access_token".to_string(),
        })?;

        debug!("exchanged authorization code");

        Ok(ProviderToken {
            access_token: SecretString::from(access_token),
            token_type: body.token_type,
            scope: body.scope,
        })
    }

    #[instrument(skip_all, fields(provider = GITHUB_PROVIDER))]
    async fn fetch_profile(
        &self,
        access_token: &SecretString,
    ) -> Result<ExternalProfile, ProviderError> {
        let user: GitHubUser = self.get_json("/user", access_token, USER_ENDPOINT).await?;
        let id = user.id.ok_or(ProviderError::MissingIdentity("id"))?;

        Ok(ExternalProfile {
            provider_user_id: id.to_string(),
            email: non_empty(user.email),
            username: non_empty(user.login),
            avatar_url: non_empty(user.avatar_url),
        })
    }

    #[instrument(skip_all, fields(provider = GITHUB_PROVIDER))]
    async fn fetch_verified_email(
        &self,
        access_token: &SecretString,
    ) -> Result<Option<String>, ProviderError> {
        let emails: Vec<GitHubEmail> = self
            .get_json("/user/emails", access_token, EMAILS_ENDPOINT)
            .await?;
        Ok(choose_email(emails))
    }
}
