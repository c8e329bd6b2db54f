use clap::{builder::ValueParser, Arg, Command};

pub const ARG_VERBOSITY: &str = "verbosity";

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("SIGIL_LOG_LEVEL")
            .global(true)
            .action(clap::ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(value: &str) -> Result<u8, clap::Error> {
        temp_env::with_var("SIGIL_LOG_LEVEL", Some(value), || {
            let matches = with_args(Command::new("sigil")).try_get_matches_from(vec!["sigil"])?;
            Ok(matches.get_one::<u8>(ARG_VERBOSITY).copied().unwrap_or(0))
        })
    }

    #[test]
    fn accepts_names_and_numbers() -> Result<(), clap::Error> {
        assert_eq!(parse("debug")?, 3);
        assert_eq!(parse("WARN")?, 1);
        assert_eq!(parse("5")?, 5);
        Ok(())
    }

    #[test]
    fn rejects_unknown_levels() {
        assert!(parse("loud").is_err());
        assert!(parse("6").is_err());
    }
}
