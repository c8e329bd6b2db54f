//! Scriptable provider for engine tests.

use super::{ExternalProfile, IdentityProvider, ProviderError, ProviderToken};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};
use std::time::Duration;

pub(crate) struct FakeProvider {
    name: String,
    profile: Mutex<ExternalProfile>,
    fallback_email: Option<String>,
    fail_exchange: bool,
    exchange_delay: Option<Duration>,
    pub(crate) exchanges: AtomicUsize,
    pub(crate) profile_fetches: AtomicUsize,
    pub(crate) email_fetches: AtomicUsize,
    pub(crate) last_verifier: Mutex<Option<String>>,
}

impl FakeProvider {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            profile: Mutex::new(ExternalProfile {
                provider_user_id: "583231".into(),
                email: Some("octocat@github.com".into()),
                username: Some("octocat".into()),
                avatar_url: Some("https://avatars.example/u/583231".into()),
            }),
            fallback_email: None,
            fail_exchange: false,
            exchange_delay: None,
            exchanges: AtomicUsize::new(0),
            profile_fetches: AtomicUsize::new(0),
            email_fetches: AtomicUsize::new(0),
            last_verifier: Mutex::new(None),
        }
    }

    pub(crate) fn with_profile(self, profile: ExternalProfile) -> Self {
        if let Ok(mut current) = self.profile.lock() {
            *current = profile;
        }
        self
    }

    pub(crate) fn with_fallback_email(mut self, email: Option<&str>) -> Self {
        self.fallback_email = email.map(str::to_string);
        self
    }

    pub(crate) fn failing_exchange(mut self) -> Self {
        self.fail_exchange = true;
        self
    }

    pub(crate) fn with_exchange_delay(mut self, delay: Duration) -> Self {
        self.exchange_delay = Some(delay);
        self
    }

    pub(crate) fn set_username(&self, username: &str) {
        if let Ok(mut current) = self.profile.lock() {
            current.username = Some(username.to_string());
        }
    }

    pub(crate) fn exchange_count(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn redirect_uri(&self) -> &str {
        "https://sigil.test/callback"
    }

    fn authorization_url(&self, state: &str, code_challenge: &str) -> String {
        format!(
            "https://idp.test/authorize?state={state}&code_challenge={code_challenge}&code_challenge_method=S256"
        )
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<ProviderToken, ProviderError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.exchange_delay {
            tokio::time::sleep(delay).await;
        }
        if let Ok(mut last) = self.last_verifier.lock() {
            *last = Some(code_verifier.to_string());
        }
        if self.fail_exchange {
            return Err(ProviderError::Rejected {
                endpoint: "fake token endpoint",
                reason: "bad_verification_code".into(),
            });
        }
        Ok(ProviderToken {
            access_token: SecretString::from(format!("idp-token-for-{code}")),
            token_type: Some("bearer".into()),
            scope: None,
        })
    }

    async fn fetch_profile(
        &self,
        access_token: &SecretString,
    ) -> Result<ExternalProfile, ProviderError> {
        self.profile_fetches.fetch_add(1, Ordering::SeqCst);
        if !access_token.expose_secret().starts_with("idp-token-for-") {
            return Err(ProviderError::Status {
                endpoint: "fake user endpoint",
                status: 401,
            });
        }
        self.profile
            .lock()
            .map(|profile| profile.clone())
            .map_err(|_| ProviderError::MissingIdentity("profile"))
    }

    async fn fetch_verified_email(
        &self,
        _access_token: &SecretString,
    ) -> Result<Option<String>, ProviderError> {
        self.email_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.fallback_email.clone())
    }
}
