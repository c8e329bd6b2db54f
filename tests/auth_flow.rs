use anyhow::Result;
use secrecy::SecretString;
use serde_json::json;
use sigil::{
    auth::{AuthConfig, AuthService, ErrorKind, GitHubConfig, ManualClock},
    provider::{GitHubProvider, ProviderRegistry},
    store::memory::MemoryStore,
};
use std::{net::TcpListener, sync::Arc, time::Duration};
use url::Url;
use wiremock::{
    matchers::{body_string_contains, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

const SIGNING_KEY: &str = "integration-signing-key-0123456789";
const START: i64 = 1_700_000_000;

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

struct Harness {
    service: AuthService<MemoryStore>,
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
}

fn harness(github_base: &str) -> Result<Harness> {
    let github = GitHubConfig::new(
        "client-abc".into(),
        SecretString::from("client-secret"),
        "https://sigil.test/v1/auth/callback".into(),
    )
    .with_token_url(format!("{github_base}/login/oauth/access_token"))
    .with_api_url(github_base.to_string());

    let registry = ProviderRegistry::new().with_provider(Arc::new(GitHubProvider::new(
        github,
        Duration::from_secs(5),
    )?));

    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(START));
    let config = AuthConfig::new(SecretString::from(SIGNING_KEY));
    let service = AuthService::new(store.clone(), registry, &config, clock.clone());

    Ok(Harness {
        service,
        store,
        clock,
    })
}

async fn mount_github(server: &MockServer, email: Option<&str>) {
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .and(body_string_contains("code=the-code"))
        .and(body_string_contains("code_verifier="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "gho_integration",
            "token_type": "bearer",
            "scope": "read:user,user:email"
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header("authorization", "Bearer gho_integration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 583_231,
            "login": "octocat",
            "email": email,
            "avatar_url": "https://avatars.githubusercontent.com/u/583231"
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/user/emails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "email": "noreply@users.github.com", "primary": false, "verified": true },
            { "email": "octocat@github.com", "primary": true, "verified": true }
        ])))
        .mount(server)
        .await;
}

fn state_of(redirect_url: &str) -> Result<String> {
    Url::parse(redirect_url)?
        .query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| anyhow::anyhow!("redirect url carries no state"))
}

#[tokio::test]
async fn github_login_refresh_and_logout() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    mount_github(&server, Some("octocat@github.com")).await;
    let h = harness(&server.uri())?;

    let initiated = h.service.initiate_oauth("github").await?;
    let redirect = Url::parse(&initiated.redirect_url)?;
    assert_eq!(redirect.host_str(), Some("github.com"));
    let state = state_of(&initiated.redirect_url)?;
    assert_eq!(h.store.session_count().await, 1);

    let login = h
        .service
        .handle_oauth_callback("github", "the-code", &state)
        .await?;
    assert_eq!(login.user.email, "octocat@github.com");
    assert_eq!(login.user.username.as_deref(), Some("octocat"));
    assert_eq!(h.store.session_count().await, 0);

    let profile = h.service.validate_token(&login.access_token).await?;
    assert_eq!(profile, login.user);

    h.clock.advance(60);
    let pair = h.service.refresh_token(&login.refresh_token).await?;
    assert_ne!(pair.refresh_token, login.refresh_token);

    let replay = h.service.refresh_token(&login.refresh_token).await;
    assert_eq!(
        replay.err().map(|e| e.kind()),
        Some(ErrorKind::RefreshTokenRevoked)
    );

    let logout = h.service.logout(&pair.access_token).await?;
    assert!(logout.success);
    let after_logout = h.service.refresh_token(&pair.refresh_token).await;
    assert_eq!(
        after_logout.err().map(|e| e.kind()),
        Some(ErrorKind::RefreshTokenRevoked)
    );

    let records = h.store.refresh_tokens_for_user(login.user.id).await;
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|record| record.is_revoked()));
    Ok(())
}

#[tokio::test]
async fn callback_falls_back_to_primary_email() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    mount_github(&server, None).await;
    let h = harness(&server.uri())?;

    let initiated = h.service.initiate_oauth("github").await?;
    let state = state_of(&initiated.redirect_url)?;
    let login = h
        .service
        .handle_oauth_callback("github", "the-code", &state)
        .await?;
    assert_eq!(login.user.email, "octocat@github.com");
    Ok(())
}

#[tokio::test]
async fn second_login_reuses_the_user() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    mount_github(&server, Some("octocat@github.com")).await;
    let h = harness(&server.uri())?;

    let mut ids = Vec::new();
    for _ in 0..2 {
        let initiated = h.service.initiate_oauth("github").await?;
        let state = state_of(&initiated.redirect_url)?;
        let login = h
            .service
            .handle_oauth_callback("github", "the-code", &state)
            .await?;
        ids.push(login.user.id);
    }
    assert_eq!(ids[0], ids[1]);
    assert_eq!(h.store.refresh_tokens_for_user(ids[0]).await.len(), 2);
    Ok(())
}

#[tokio::test]
async fn rejected_code_spends_the_session() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "bad_verification_code",
            "error_description": "The code passed is incorrect or expired."
        })))
        .mount(&server)
        .await;
    let h = harness(&server.uri())?;

    let initiated = h.service.initiate_oauth("github").await?;
    let state = state_of(&initiated.redirect_url)?;

    let first = h
        .service
        .handle_oauth_callback("github", "stale", &state)
        .await;
    assert_eq!(first.err().map(|e| e.kind()), Some(ErrorKind::ExchangeFailed));

    let retry = h
        .service
        .handle_oauth_callback("github", "stale", &state)
        .await;
    assert_eq!(retry.err().map(|e| e.kind()), Some(ErrorKind::SessionNotFound));
    Ok(())
}

#[tokio::test]
async fn github_outage_is_profile_failure() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "gho_integration",
            "token_type": "bearer"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let h = harness(&server.uri())?;

    let initiated = h.service.initiate_oauth("github").await?;
    let state = state_of(&initiated.redirect_url)?;
    let result = h
        .service
        .handle_oauth_callback("github", "the-code", &state)
        .await;
    assert_eq!(
        result.err().map(|e| e.kind()),
        Some(ErrorKind::ProfileFetchFailed)
    );
    Ok(())
}

#[tokio::test]
async fn access_token_expires_with_the_clock() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    mount_github(&server, Some("octocat@github.com")).await;
    let h = harness(&server.uri())?;

    let initiated = h.service.initiate_oauth("github").await?;
    let state = state_of(&initiated.redirect_url)?;
    let login = h
        .service
        .handle_oauth_callback("github", "the-code", &state)
        .await?;

    h.clock.advance(15 * 60);
    assert!(h.service.validate_token(&login.access_token).await.is_ok());

    h.clock.advance(1);
    let expired = h.service.validate_token(&login.access_token).await;
    assert_eq!(expired.err().map(|e| e.kind()), Some(ErrorKind::TokenExpired));

    // The refresh token outlives the access token.
    let pair = h.service.refresh_token(&login.refresh_token).await?;
    assert!(h.service.validate_token(&pair.access_token).await.is_ok());
    Ok(())
}
