//! Engine flags: signing key, credential lifetimes and deadlines.

use crate::auth::config::{MAX_TTL_SECONDS, MIN_SIGNING_KEY_BYTES};
use anyhow::{Context, Result};
use clap::{builder::ValueParser, Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SIGNING_KEY: &str = "signing-key";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_ACCESS_TOKEN_TTL_SECONDS: &str = "access-token-ttl-seconds";
pub const ARG_REFRESH_TOKEN_TTL_SECONDS: &str = "refresh-token-ttl-seconds";
pub const ARG_PERSISTENCE_TIMEOUT_SECONDS: &str = "persistence-timeout-seconds";
pub const ARG_PROVIDER_TIMEOUT_SECONDS: &str = "provider-timeout-seconds";
pub const ARG_SESSION_SWEEP_SECONDS: &str = "session-sweep-seconds";

#[must_use]
pub fn validator_signing_key() -> ValueParser {
    ValueParser::from(move |key: &str| -> std::result::Result<String, String> {
        if key.len() < MIN_SIGNING_KEY_BYTES {
            return Err(format!(
                "signing key must be at least {MIN_SIGNING_KEY_BYTES} bytes"
            ));
        }
        Ok(key.to_string())
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_key_args(command);
    let command = with_ttl_args(command);
    with_deadline_args(command)
}

fn with_key_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_SIGNING_KEY)
            .long(ARG_SIGNING_KEY)
            .help("HS256 key shared with every service that verifies access tokens")
            .env("SIGIL_SIGNING_KEY")
            .hide_env_values(true)
            .required(true)
            .value_parser(validator_signing_key()),
    )
}

fn with_ttl_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Lifetime of a pending OAuth session in seconds")
                .env("SIGIL_SESSION_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL_SECONDS)
                .long(ARG_ACCESS_TOKEN_TTL_SECONDS)
                .help("Access token TTL in seconds")
                .env("SIGIL_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_TTL_SECONDS)
                .long(ARG_REFRESH_TOKEN_TTL_SECONDS)
                .help("Refresh token TTL in seconds")
                .env("SIGIL_REFRESH_TOKEN_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TTL_SECONDS)),
        )
}

fn with_deadline_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PERSISTENCE_TIMEOUT_SECONDS)
                .long(ARG_PERSISTENCE_TIMEOUT_SECONDS)
                .help("Deadline for each store call in seconds")
                .env("SIGIL_PERSISTENCE_TIMEOUT_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_PROVIDER_TIMEOUT_SECONDS)
                .long(ARG_PROVIDER_TIMEOUT_SECONDS)
                .help("Deadline for each identity provider call in seconds")
                .env("SIGIL_PROVIDER_TIMEOUT_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_SESSION_SWEEP_SECONDS)
                .long(ARG_SESSION_SWEEP_SECONDS)
                .help("Interval between expired session sweeps in seconds")
                .env("SIGIL_SESSION_SWEEP_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub signing_key: SecretString,
    pub session_ttl_seconds: i64,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub persistence_timeout_seconds: u64,
    pub provider_timeout_seconds: u64,
    pub session_sweep_seconds: u64,
}

impl Options {
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let signing_key = matches
            .get_one::<String>(ARG_SIGNING_KEY)
            .cloned()
            .map(SecretString::from)
            .context("missing required argument: --signing-key")?;

        Ok(Self {
            signing_key,
            session_ttl_seconds: get_i64(matches, ARG_SESSION_TTL_SECONDS)?,
            access_token_ttl_seconds: get_i64(matches, ARG_ACCESS_TOKEN_TTL_SECONDS)?,
            refresh_token_ttl_seconds: get_i64(matches, ARG_REFRESH_TOKEN_TTL_SECONDS)?,
            persistence_timeout_seconds: get_u64(matches, ARG_PERSISTENCE_TIMEOUT_SECONDS)?,
            provider_timeout_seconds: get_u64(matches, ARG_PROVIDER_TIMEOUT_SECONDS)?,
            session_sweep_seconds: get_u64(matches, ARG_SESSION_SWEEP_SECONDS)?,
        })
    }
}

fn get_i64(matches: &ArgMatches, name: &str) -> Result<i64> {
    matches
        .get_one::<i64>(name)
        .copied()
        .with_context(|| format!("missing required argument: --{name}"))
}

fn get_u64(matches: &ArgMatches, name: &str) -> Result<u64> {
    matches
        .get_one::<u64>(name)
        .copied()
        .with_context(|| format!("missing required argument: --{name}"))
}
