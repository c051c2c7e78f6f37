use std::ffi::OsString;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::Secret;
use serde::Deserialize;
use strum::Display;
use thiserror::Error;

use crate::dispatch::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Setting {
    Domain,
    ApiKey,
    RetryCount,
    Timeout,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid environment: {0}")]
    Environment(#[from] envy::Error),
    #[error("{0} not specified")]
    Missing(Setting),
    #[error("{0} must be greater than zero")]
    Invalid(Setting),
    #[error("failed to read {setting} from the terminal: {source}")]
    Prompt {
        setting: Setting,
        #[source]
        source: io::Error,
    },
}

/// Raw process environment, after `.env` has been applied.
#[derive(Deserialize, Debug)]
pub struct Environment {
    pub domain: Option<String>,
    pub api_key: Option<String>,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_roles_file")]
    pub roles_file: PathBuf,
    #[serde(default = "default_phrases_file")]
    pub phrases_file: PathBuf,
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    5
}

fn default_timeout() -> u64 {
    60
}

fn default_roles_file() -> PathBuf {
    PathBuf::from("roles.txt")
}

fn default_phrases_file() -> PathBuf {
    PathBuf::from("phrases.txt")
}

/// Log destination from the raw `LOG_FILE` value. Read on its own so that
/// logging is up before the rest of the environment is parsed.
pub fn log_file(value: Option<OsString>) -> PathBuf {
    value
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("gaia_bot.log"))
}

impl Environment {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::from_iter(vars)?)
    }
}

/// Fully resolved settings for one run.
#[derive(Debug)]
pub struct Settings {
    pub domain: String,
    pub api_key: Secret<String>,
    pub retry: RetryPolicy,
    pub timeout: Duration,
    pub roles_file: PathBuf,
    pub phrases_file: PathBuf,
}

impl Settings {
    /// Fills in missing credentials through `prompt` and validates the rest.
    pub fn resolve<P>(environment: Environment, mut prompt: P) -> Result<Self, ConfigError>
    where
        P: FnMut(&str) -> io::Result<String>,
    {
        let domain = require(
            environment.domain,
            Setting::Domain,
            "Enter domain name (e.g., mydomain.gaia.domains): ",
            &mut prompt,
        )?;
        let api_key = require(
            environment.api_key,
            Setting::ApiKey,
            "Enter your API key: ",
            &mut prompt,
        )?;

        if environment.retry_count == 0 {
            return Err(ConfigError::Invalid(Setting::RetryCount));
        }
        if environment.timeout == 0 {
            return Err(ConfigError::Invalid(Setting::Timeout));
        }

        Ok(Self {
            domain,
            api_key: Secret::new(api_key),
            retry: RetryPolicy {
                attempts: environment.retry_count,
                delay: Duration::from_secs(environment.retry_delay),
            },
            timeout: Duration::from_secs(environment.timeout),
            roles_file: environment.roles_file,
            phrases_file: environment.phrases_file,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("https://{}/v1/chat/completions", self.domain)
    }
}

fn require<P>(
    value: Option<String>,
    setting: Setting,
    question: &str,
    prompt: &mut P,
) -> Result<String, ConfigError>
where
    P: FnMut(&str) -> io::Result<String>,
{
    let value = match value.filter(|v| !v.trim().is_empty()) {
        Some(value) => value,
        None => prompt(question).map_err(|source| ConfigError::Prompt { setting, source })?,
    };

    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Missing(setting));
    }
    Ok(value.to_owned())
}

/// Asks on stdout and reads one line from stdin.
pub fn terminal_prompt(question: &str) -> io::Result<String> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(question.as_bytes())?;
    stdout.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn environment(vars: &[(&str, &str)]) -> Environment {
        Environment::from_vars(vars.iter().map(|(k, v)| (k.to_string(), v.to_string()))).unwrap()
    }

    fn no_prompt(question: &str) -> io::Result<String> {
        panic!("unexpected prompt: {question}")
    }

    #[test]
    fn defaults_apply() {
        let settings = Settings::resolve(
            environment(&[("DOMAIN", "node.gaia.domains"), ("API_KEY", "secret")]),
            no_prompt,
        )
        .unwrap();

        assert_eq!(settings.domain, "node.gaia.domains");
        assert_eq!(settings.api_key.expose_secret(), "secret");
        assert_eq!(
            settings.retry,
            RetryPolicy {
                attempts: 3,
                delay: Duration::from_secs(5)
            }
        );
        assert_eq!(settings.timeout, Duration::from_secs(60));
        assert_eq!(settings.roles_file, PathBuf::from("roles.txt"));
        assert_eq!(settings.phrases_file, PathBuf::from("phrases.txt"));
        assert_eq!(
            settings.endpoint(),
            "https://node.gaia.domains/v1/chat/completions"
        );
    }

    #[test]
    fn overrides_are_read() {
        let env = environment(&[
            ("DOMAIN", "d"),
            ("API_KEY", "k"),
            ("RETRY_COUNT", "7"),
            ("RETRY_DELAY", "0"),
            ("TIMEOUT", "15"),
            ("ROLES_FILE", "data/roles.txt"),
            ("LOG_FILE", "/tmp/bot.log"),
        ]);

        let settings = Settings::resolve(env, no_prompt).unwrap();

        assert_eq!(settings.retry.attempts, 7);
        assert_eq!(settings.retry.delay, Duration::ZERO);
        assert_eq!(settings.timeout, Duration::from_secs(15));
        assert_eq!(settings.roles_file, PathBuf::from("data/roles.txt"));
    }

    #[test]
    fn malformed_number_is_config_error() {
        let err = Environment::from_vars([("RETRY_COUNT".to_owned(), "three".to_owned())])
            .unwrap_err();

        assert!(matches!(err, ConfigError::Environment(_)));
        assert!(err.to_string().starts_with("invalid environment"));
    }

    #[test]
    fn log_file_defaults_when_unset_or_blank() {
        assert_eq!(log_file(None), PathBuf::from("gaia_bot.log"));
        assert_eq!(log_file(Some(OsString::new())), PathBuf::from("gaia_bot.log"));
        assert_eq!(
            log_file(Some(OsString::from("/tmp/bot.log"))),
            PathBuf::from("/tmp/bot.log")
        );
    }

    #[test]
    fn prompts_for_missing_credentials() {
        let mut asked = Vec::new();
        let settings = Settings::resolve(environment(&[("API_KEY", "  ")]), |question| {
            asked.push(question.to_owned());
            Ok(format!("  answer{}\n", asked.len()))
        })
        .unwrap();

        assert_eq!(asked.len(), 2);
        assert!(asked[0].starts_with("Enter domain name"));
        assert_eq!(asked[1], "Enter your API key: ");
        assert_eq!(settings.domain, "answer1");
        assert_eq!(settings.api_key.expose_secret(), "answer2");
    }

    #[test]
    fn blank_answer_is_missing() {
        let err = Settings::resolve(environment(&[("API_KEY", "k")]), |_| Ok("\n".into()))
            .unwrap_err();

        assert!(matches!(err, ConfigError::Missing(Setting::Domain)));
        assert_eq!(err.to_string(), "DOMAIN not specified");
    }

    #[test]
    fn zero_retry_count_is_rejected() {
        let err = Settings::resolve(
            environment(&[("DOMAIN", "d"), ("API_KEY", "k"), ("RETRY_COUNT", "0")]),
            no_prompt,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid(Setting::RetryCount)));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = Settings::resolve(
            environment(&[("DOMAIN", "d"), ("API_KEY", "k"), ("TIMEOUT", "0")]),
            no_prompt,
        )
        .unwrap_err();

        assert_eq!(err.to_string(), "TIMEOUT must be greater than zero");
    }

    #[test]
    fn api_key_is_redacted() {
        let settings = Settings::resolve(
            environment(&[("DOMAIN", "d"), ("API_KEY", "hunter2")]),
            no_prompt,
        )
        .unwrap();

        assert!(!format!("{settings:?}").contains("hunter2"));
    }
}
