//! Map parsed arguments to the action the binary runs.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, github, ARG_DSN, ARG_PORT};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches.get_one::<String>(ARG_DSN).cloned();

    let auth_opts = auth::Options::parse(matches)?;
    let github_opts = github::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        signing_key: auth_opts.signing_key,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        access_token_ttl_seconds: auth_opts.access_token_ttl_seconds,
        refresh_token_ttl_seconds: auth_opts.refresh_token_ttl_seconds,
        persistence_timeout_seconds: auth_opts.persistence_timeout_seconds,
        provider_timeout_seconds: auth_opts.provider_timeout_seconds,
        session_sweep_seconds: auth_opts.session_sweep_seconds,
        github_client_id: github_opts.client_id,
        github_client_secret: github_opts.client_secret,
        github_redirect_uri: github_opts.redirect_uri,
        github_authorize_url: github_opts.authorize_url,
        github_token_url: github_opts.token_url,
        github_api_url: github_opts.api_url,
        github_scopes: github_opts.scopes,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_server_action() {
        temp_env::with_vars(
            [
                ("SIGIL_SIGNING_KEY", Some("0123456789abcdef0123456789abcdef")),
                ("SIGIL_GITHUB_CLIENT_ID", Some("Iv1.abc")),
                ("SIGIL_GITHUB_CLIENT_SECRET", Some("shh")),
                ("SIGIL_GITHUB_REDIRECT_URI", Some("https://sigil.dev/callback")),
                ("SIGIL_DSN", None),
                ("SIGIL_ACCESS_TOKEN_TTL_SECONDS", Some("300")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["sigil"]);
                let action = handler(&matches);
                assert!(action.is_ok());
                if let Ok(Action::Server(args)) = action {
                    assert_eq!(args.dsn, None);
                    assert_eq!(args.access_token_ttl_seconds, 300);
                    assert_eq!(args.github_redirect_uri, "https://sigil.dev/callback");
                    assert!(!format!("{args:?}").contains("0123456789abcdef"));
                }
            },
        );
    }
}
