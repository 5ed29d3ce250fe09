use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::extractor::{DEFAULT_PLACEHOLDER, ExtractorConfig};
use crate::menu::{MenuEntry, default_menu};

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// A required environment variable is absent or empty.
    MissingEnv(String),
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::MissingEnv(name) => {
                write!(f, "required environment variable {name} is not set")
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::MissingEnv(_) | Self::Validation(_) => None,
        }
    }
}

/// User-visible reply strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Replies {
    /// Shown whenever nothing usable came back. Also used by the extractor.
    pub placeholder: String,
    /// Shown on network failure or timeout.
    pub network_apology: String,
    /// Prefix for non-2xx replies, the status code is appended.
    pub api_error_prefix: String,
}

impl Default for Replies {
    fn default() -> Self {
        Self {
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            network_apology: "Сорян твин, сеть легла 😅".to_string(),
            api_error_prefix: "Ошибка твин😅".to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct ConfigFile {
    /// Chat-completions endpoint.
    api_url: String,
    model: String,
    /// Persona system prompt sent with every request.
    persona: String,
    temperature: f32,
    max_tokens: u32,
    /// Upper bound for one remote call, in seconds.
    timeout_secs: u64,
    /// /start greeting shown above the mode keyboard.
    greeting: String,
    input_placeholder: String,
    menu: Vec<MenuEntry>,
    replies: Replies,
    extractor: ExtractorConfig,
    /// Directory for state files (logs). Defaults to current directory.
    data_dir: Option<String>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            api_url: "https://api.intelligence.io.solutions/api/v1/chat/completions".to_string(),
            model: "deepseek-ai/DeepSeek-R1-0528".to_string(),
            persona: "Ты грубоватый, дерзкий чат-бот. Отвечай коротко, с сарказмом, \
                      можешь использовать тупые смайлы 🤣😅👌. \
                      Не используй теги <think> и не показывай ход рассуждений. \
                      Сразу пиши готовый ответ, максимально кратко, не трать токены."
                .to_string(),
            temperature: 0.7,
            max_tokens: 350,
            timeout_secs: 90,
            greeting: "Здарова, я дерзкий бот 🤣 Выбирай режим".to_string(),
            input_placeholder: "Выбери режим общения".to_string(),
            menu: default_menu(),
            replies: Replies::default(),
            extractor: ExtractorConfig::default(),
            data_dir: None,
        }
    }
}

/// Required secrets, environment only so they never end up in the config file.
pub struct Secrets {
    pub telegram_bot_token: String,
    pub llm_api_key: String,
}

impl Secrets {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            telegram_bot_token: require_env("BOT_TOKEN")?,
            llm_api_key: require_env("AI_API_KEY")?,
        })
    }
}

fn require_env(name: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnv(name.to_string())),
    }
}

pub struct Config {
    pub telegram_bot_token: String,
    pub llm_api_key: String,
    pub api_url: String,
    pub model: String,
    pub persona: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub greeting: String,
    pub input_placeholder: String,
    pub menu: Vec<MenuEntry>,
    pub replies: Replies,
    pub extractor: ExtractorConfig,
    pub data_dir: PathBuf,
}

impl Config {
    /// Load settings from an optional JSON file, secrets from `secrets`.
    /// Without a file every setting falls back to its default.
    pub fn load<P: AsRef<Path>>(path: Option<P>, secrets: Secrets) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => {
                let path = path.as_ref().to_path_buf();
                let content = std::fs::read_to_string(&path)
                    .map_err(|e| ConfigError::ReadFile { path: path.clone(), source: e })?;
                serde_json::from_str(&content)
                    .map_err(|e| ConfigError::ParseJson { path: path.clone(), source: e })?
            }
            None => ConfigFile::default(),
        };
        Self::build(file, secrets)
    }

    fn build(file: ConfigFile, secrets: Secrets) -> Result<Self, ConfigError> {
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = secrets.telegram_bot_token.split(':').collect();
        if token_parts.len() != 2
            || token_parts[0].parse::<u64>().is_err()
            || token_parts[1].is_empty()
        {
            return Err(ConfigError::Validation(
                "BOT_TOKEN appears invalid (expected format: 123456789:ABCdefGHI...)".into(),
            ));
        }

        if file.replies.placeholder.trim().is_empty() {
            return Err(ConfigError::Validation(
                "replies.placeholder must be non-empty".into(),
            ));
        }
        if file.max_tokens == 0 {
            return Err(ConfigError::Validation("max_tokens must be positive".into()));
        }
        if file.extractor.open_tag.is_empty() || file.extractor.close_tag.is_empty() {
            return Err(ConfigError::Validation(
                "extractor delimiter tags must be non-empty".into(),
            ));
        }

        // Single placeholder for every failure path, extractor included.
        let mut extractor = file.extractor;
        extractor.placeholder = file.replies.placeholder.clone();

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            telegram_bot_token: secrets.telegram_bot_token,
            llm_api_key: secrets.llm_api_key,
            api_url: file.api_url,
            model: file.model,
            persona: file.persona,
            temperature: file.temperature,
            max_tokens: file.max_tokens,
            timeout_secs: file.timeout_secs,
            greeting: file.greeting,
            input_placeholder: file.input_placeholder,
            menu: file.menu,
            replies: file.replies,
            extractor,
            data_dir,
        })
    }
}
