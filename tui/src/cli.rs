//! Command-line arguments

use std::path::PathBuf;

use clap::Parser;
use furiabot_core::ConfigOverrides;

/// FuriaBot - terminal chat with the FURIA agent service
#[derive(Parser, Debug)]
#[command(name = "furiabot-tui")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Agent service base URL (overrides config and environment)
    #[arg(short = 'u', long, value_name = "URL")]
    pub api_url: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "FURIABOT_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Where saved credentials live
    #[arg(long, value_name = "FILE")]
    pub credentials: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG wins when unset
    #[arg(short = 'l', long, env = "FURIABOT_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log file path
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Send one message, print the streamed reply and exit
    #[arg(long, value_name = "MESSAGE")]
    pub once: Option<String>,

    /// Continue this conversation in --once mode instead of starting one
    #[arg(long, value_name = "ID", requires = "once")]
    pub session: Option<String>,
}

impl Args {
    /// Config values given on the command line
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(url) = &self.api_url {
            overrides = overrides.with_api_url(url.clone());
        }
        if let Some(path) = &self.credentials {
            overrides = overrides.with_credentials_path(path.clone());
        }
        overrides
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use furiabot_core::{ClientConfig, ConfigSource};

    #[test]
    fn test_parse_once_with_session() {
        let args = Args::try_parse_from([
            "furiabot-tui",
            "--once",
            "Quando joga a FURIA?",
            "--session",
            "s1",
        ])
        .unwrap();
        assert_eq!(args.once.as_deref(), Some("Quando joga a FURIA?"));
        assert_eq!(args.session.as_deref(), Some("s1"));
    }

    #[test]
    fn test_session_requires_once() {
        assert!(Args::try_parse_from(["furiabot-tui", "--session", "s1"]).is_err());
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let args = Args::try_parse_from([
            "furiabot-tui",
            "--api-url",
            "https://bot.furia.gg/",
            "--credentials",
            "/tmp/creds.json",
        ])
        .unwrap();
        let mut config = ClientConfig::default();

        args.overrides().apply(&mut config).unwrap();

        assert_eq!(config.api_url, "https://bot.furia.gg");
        assert_eq!(config.credentials_path, PathBuf::from("/tmp/creds.json"));
        assert_eq!(config.source(), ConfigSource::Cli);
    }

    #[test]
    fn test_no_flags_leave_config_alone() {
        let args = Args::try_parse_from(["furiabot-tui"]).unwrap();
        let mut config = ClientConfig::default();
        args.overrides().apply(&mut config).unwrap();
        assert_eq!(config.source(), ConfigSource::Default);
    }
}
