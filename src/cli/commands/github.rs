//! GitHub OAuth application settings.

use crate::auth::config::{GITHUB_API_URL, GITHUB_AUTHORIZE_URL, GITHUB_SCOPES, GITHUB_TOKEN_URL};
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_GITHUB_CLIENT_ID: &str = "github-client-id";
pub const ARG_GITHUB_CLIENT_SECRET: &str = "github-client-secret";
pub const ARG_GITHUB_REDIRECT_URI: &str = "github-redirect-uri";
pub const ARG_GITHUB_AUTHORIZE_URL: &str = "github-authorize-url";
pub const ARG_GITHUB_TOKEN_URL: &str = "github-token-url";
pub const ARG_GITHUB_API_URL: &str = "github-api-url";
pub const ARG_GITHUB_SCOPES: &str = "github-scopes";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_GITHUB_CLIENT_ID)
                .long(ARG_GITHUB_CLIENT_ID)
                .help("GitHub OAuth app client id")
                .env("SIGIL_GITHUB_CLIENT_ID")
                .required(true),
        )
        .arg(
            Arg::new(ARG_GITHUB_CLIENT_SECRET)
                .long(ARG_GITHUB_CLIENT_SECRET)
                .help("GitHub OAuth app client secret")
                .env("SIGIL_GITHUB_CLIENT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_GITHUB_REDIRECT_URI)
                .long(ARG_GITHUB_REDIRECT_URI)
                .help("Callback URL registered with the GitHub OAuth app")
                .env("SIGIL_GITHUB_REDIRECT_URI")
                .required(true),
        )
        .arg(
            Arg::new(ARG_GITHUB_AUTHORIZE_URL)
                .long(ARG_GITHUB_AUTHORIZE_URL)
                .help("Authorization endpoint")
                .env("SIGIL_GITHUB_AUTHORIZE_URL")
                .default_value(GITHUB_AUTHORIZE_URL),
        )
        .arg(
            Arg::new(ARG_GITHUB_TOKEN_URL)
                .long(ARG_GITHUB_TOKEN_URL)
                .help("Token endpoint")
                .env("SIGIL_GITHUB_TOKEN_URL")
                .default_value(GITHUB_TOKEN_URL),
        )
        .arg(
            Arg::new(ARG_GITHUB_API_URL)
                .long(ARG_GITHUB_API_URL)
                .help("REST API base URL")
                .env("SIGIL_GITHUB_API_URL")
                .default_value(GITHUB_API_URL),
        )
        .arg(
            Arg::new(ARG_GITHUB_SCOPES)
                .long(ARG_GITHUB_SCOPES)
                .help("Space separated OAuth scopes")
                .env("SIGIL_GITHUB_SCOPES")
                .default_value(GITHUB_SCOPES),
        )
}

#[derive(Debug)]
pub struct Options {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: String,
    pub authorize_url: String,
    pub token_url: String,
    pub api_url: String,
    pub scopes: String,
}

impl Options {
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let get = |name: &str| -> Result<String> {
            matches
                .get_one::<String>(name)
                .cloned()
                .with_context(|| format!("missing required argument: --{name}"))
        };

        Ok(Self {
            client_id: get(ARG_GITHUB_CLIENT_ID)?,
            client_secret: SecretString::from(get(ARG_GITHUB_CLIENT_SECRET)?),
            redirect_uri: get(ARG_GITHUB_REDIRECT_URI)?,
            authorize_url: get(ARG_GITHUB_AUTHORIZE_URL)?,
            token_url: get(ARG_GITHUB_TOKEN_URL)?,
            api_url: get(ARG_GITHUB_API_URL)?,
            scopes: get(ARG_GITHUB_SCOPES)?,
        })
    }
}
