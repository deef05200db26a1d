use std::path::{Path, PathBuf};

use secrecy::SecretString;

use crate::ConfigError;

/// The file consulted when no configuration path is given.
pub const DEFAULT_CONFIG_FILE: &str = "policychat.toml";

const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_LOG_LEVEL: &str = "warn";

/// Complete, validated configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Where and how to reach the policy API.
    pub ranger: RangerConfig,
    /// How to reach the language model.
    pub classifier: ClassifierConfig,
    /// Log verbosity.
    pub logging: LoggingConfig,
}

/// Connection settings for the Ranger policy API.
#[derive(Clone, Debug)]
pub struct RangerConfig {
    /// The policy endpoint, e.g. `https://ranger:6182/service/public/v2/api/policy`.
    pub url: String,
    /// The users endpoint; derived from `url`'s host when absent.
    pub users_url: Option<String>,
    /// Basic-auth user.
    pub username: String,
    /// Basic-auth password.
    pub password: SecretString,
    /// Verify the server's certificate.  Only an explicit opt-out disables this.
    pub verify_tls: bool,
}

/// Settings for the intent classifier.
#[derive(Clone, Debug)]
pub struct ClassifierConfig {
    /// Anthropic API key; when absent the client falls back to `ANTHROPIC_API_KEY`.
    pub api_key: Option<SecretString>,
    /// Token budget for a classification.
    pub max_tokens: u32,
}

/// Logging settings.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// A `tracing` filter directive such as `info` or `policychat=debug`.
    pub level: String,
}

/// Values given on the command line; these win over every other layer.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    /// Policy endpoint.
    pub url: Option<String>,
    /// Basic-auth user.
    pub username: Option<String>,
    /// Disable certificate verification.
    pub insecure: bool,
    /// Log filter.
    pub log_level: Option<String>,
}

/// Where to load configuration from.
#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    /// An explicit configuration file; it must exist.
    pub config_path: Option<PathBuf>,
    /// Command-line overrides.
    pub overrides: Overrides,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    ranger: RangerPatch,
    #[serde(default)]
    classifier: ClassifierPatch,
    #[serde(default)]
    logging: LoggingPatch,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct RangerPatch {
    url: Option<String>,
    users_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    verify_tls: Option<bool>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ClassifierPatch {
    api_key: Option<String>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct LoggingPatch {
    level: Option<String>,
}

impl Config {
    /// Load configuration from file, process environment, and overrides.
    pub fn load(options: &LoadOptions) -> Result<Self, ConfigError> {
        Self::load_with(options, |key| std::env::var(key).ok())
    }

    /// Load configuration, reading environment variables through `env`.
    ///
    /// Layers apply in order: the file (explicit path, else [`DEFAULT_CONFIG_FILE`] if present),
    /// then the environment, then `options.overrides`.
    pub fn load_with(
        options: &LoadOptions,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut file = match &options.config_path {
            Some(path) => read_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                read_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => FileConfig::default(),
        };
        apply_env(&mut file, &env)?;
        apply_overrides(&mut file, &options.overrides);
        finish(file)
    }

    /// Parse configuration from TOML text without consulting the environment.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        finish(parse_file("<inline>", text)?)
    }
}

fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let display = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: display.clone(),
        source,
    })?;
    parse_file(&display, &text)
}

fn parse_file(path: &str, text: &str) -> Result<FileConfig, ConfigError> {
    toml::from_str(text).map_err(|err| ConfigError::ParseFile {
        path: path.to_string(),
        message: err.to_string(),
    })
}

fn apply_env(
    file: &mut FileConfig,
    env: &impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(url) = env("POLICYCHAT_RANGER_URL") {
        file.ranger.url = Some(url);
    }
    if let Some(users_url) = env("POLICYCHAT_RANGER_USERS_URL") {
        file.ranger.users_url = Some(users_url);
    }
    if let Some(username) = env("POLICYCHAT_RANGER_USERNAME") {
        file.ranger.username = Some(username);
    }
    if let Some(password) = env("POLICYCHAT_RANGER_PASSWORD") {
        file.ranger.password = Some(password);
    }
    if let Some(verify) = env("POLICYCHAT_VERIFY_TLS") {
        file.ranger.verify_tls = Some(parse_bool("POLICYCHAT_VERIFY_TLS", &verify)?);
    }
    if let Some(max_tokens) = env("POLICYCHAT_MAX_TOKENS") {
        let parsed = max_tokens
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidOverride {
                key: "POLICYCHAT_MAX_TOKENS".to_string(),
                value: max_tokens.clone(),
            })?;
        file.classifier.max_tokens = Some(parsed);
    }
    if file.classifier.api_key.is_none() {
        file.classifier.api_key = env("ANTHROPIC_API_KEY");
    }
    if let Some(level) = env("POLICYCHAT_LOG_LEVEL") {
        file.logging.level = Some(level);
    }
    Ok(())
}

fn apply_overrides(file: &mut FileConfig, overrides: &Overrides) {
    if let Some(url) = &overrides.url {
        file.ranger.url = Some(url.clone());
    }
    if let Some(username) = &overrides.username {
        file.ranger.username = Some(username.clone());
    }
    if overrides.insecure {
        file.ranger.verify_tls = Some(false);
    }
    if let Some(level) = &overrides.log_level {
        file.logging.level = Some(level.clone());
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidOverride {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn required(value: Option<String>, setting: &str, env: &str) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| {
            ConfigError::missing(
                setting,
                format!("set `{setting}` in {DEFAULT_CONFIG_FILE} or export {env}"),
            )
        })
}

fn finish(file: FileConfig) -> Result<Config, ConfigError> {
    let url = required(file.ranger.url, "ranger.url", "POLICYCHAT_RANGER_URL")?;
    let username = required(
        file.ranger.username,
        "ranger.username",
        "POLICYCHAT_RANGER_USERNAME",
    )?;
    let password = required(
        file.ranger.password,
        "ranger.password",
        "POLICYCHAT_RANGER_PASSWORD",
    )?;
    Ok(Config {
        ranger: RangerConfig {
            url,
            users_url: file.ranger.users_url.filter(|u| !u.trim().is_empty()),
            username,
            password: SecretString::from(password),
            verify_tls: file.ranger.verify_tls.unwrap_or(true),
        },
        classifier: ClassifierConfig {
            api_key: file.classifier.api_key.map(SecretString::from),
            max_tokens: file.classifier.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        },
        logging: LoggingConfig {
            level: file
                .logging
                .level
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        },
    })
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////
