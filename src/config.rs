//! Configuration loader and validator for the storefront bot.
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use teloxide::types::{ChatId, Recipient};
use thiserror::Error;

/// Environment variable that overrides `telegram.bot_token`.
pub const BOT_TOKEN_ENV: &str = "BOT_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub telegram: Telegram,
    pub store: Store,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub catalog_path: String,
    /// Seconds before an unanswered phone prompt is forgotten. 0 disables expiry.
    #[serde(default)]
    pub pending_order_ttl_seconds: u64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_max_results() -> usize {
    10
}

/// Telegram bot settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Telegram {
    pub bot_token: String,
    /// `@username` of a channel or numeric chat id that receives orders.
    pub admin_chat: String,
}

/// Store identity shown to customers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Store {
    pub name: String,
    pub payment_link: String,
    pub support_phone: String,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "تومان".to_string()
}

impl App {
    pub fn catalog_path(&self) -> PathBuf {
        PathBuf::from(&self.catalog_path)
    }

    pub fn pending_order_ttl(&self) -> Option<chrono::Duration> {
        match self.pending_order_ttl_seconds {
            0 => None,
            secs => Some(chrono::Duration::seconds(secs as i64)),
        }
    }
}

impl Telegram {
    /// Destination for order notifications. Validated by `load`.
    pub fn admin_recipient(&self) -> Result<Recipient, ConfigError> {
        parse_recipient(&self.admin_chat)
            .ok_or(ConfigError::Invalid("telegram.admin_chat must be @username or a chat id"))
    }
}

impl Store {
    pub fn payment_url(&self) -> Result<Url, ConfigError> {
        parse_http_url(&self.payment_link)
            .ok_or(ConfigError::Invalid("store.payment_link must be an http(s) URL"))
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
/// - `BOT_TOKEN` in the environment replaces `telegram.bot_token`.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let mut cfg: Config = serde_yaml::from_str(&content)?;
    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok());
    validate(&cfg)?;
    Ok(cfg)
}

fn apply_env_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(token) = lookup(BOT_TOKEN_ENV).filter(|t| !t.trim().is_empty()) {
        cfg.telegram.bot_token = token;
    }
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.catalog_path.trim().is_empty() {
        return Err(ConfigError::Invalid("app.catalog_path must be non-empty"));
    }
    if cfg.app.max_results == 0 {
        return Err(ConfigError::Invalid("app.max_results must be > 0"));
    }

    if cfg.telegram.bot_token.trim().is_empty() {
        return Err(ConfigError::Invalid("telegram.bot_token must be non-empty"));
    }
    cfg.telegram.admin_recipient()?;

    if cfg.store.name.trim().is_empty() {
        return Err(ConfigError::Invalid("store.name must be non-empty"));
    }
    if cfg.store.support_phone.trim().is_empty() {
        return Err(ConfigError::Invalid("store.support_phone must be non-empty"));
    }
    if cfg.store.currency.trim().is_empty() {
        return Err(ConfigError::Invalid("store.currency must be non-empty"));
    }
    cfg.store.payment_url()?;

    Ok(())
}

fn parse_recipient(raw: &str) -> Option<Recipient> {
    let raw = raw.trim();
    if let Some(name) = raw.strip_prefix('@') {
        let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        return valid.then(|| Recipient::ChannelUsername(raw.to_string()));
    }
    raw.parse::<i64>().ok().map(|id| Recipient::Id(ChatId(id)))
}

/// Absolute http(s) URL, or None.
pub fn parse_http_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// Returns the example YAML content.
pub fn example() -> &'static str {
    r#"app:
  catalog_path: "./data/products.xlsx"
  pending_order_ttl_seconds: 0
  max_results: 10

telegram:
  bot_token: "YOUR_TELEGRAM_BOT_TOKEN"
  admin_chat: "@Dadgar1987"

store:
  name: "فروشگاه لوازم خانگی آتروپات"
  payment_link: "https://zarinp.al/atropatshop.ir"
  support_phone: "09305069257"
  currency: "تومان"
"#
}
