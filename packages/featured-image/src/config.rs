use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use secrecy::{ExposeSecret, SecretBox};

// =============================================================================
// Secrets
// =============================================================================

/// A string that never shows up in logs or debug output.
pub struct SecretString(SecretBox<str>);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(Box::from(value.into().as_str())))
    }

    /// Only call this when actually sending the secret somewhere.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl Default for SecretString {
    fn default() -> Self {
        Self::new("")
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// =============================================================================
// Generation settings
// =============================================================================

pub const DEFAULT_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_CATEGORY: &str = "stirile-zilei";
pub const DEFAULT_ASPECT_RATIO: &str = "16:9";
pub const DEFAULT_MAX_URLS: usize = 3;
pub const MAX_URLS_LIMIT: usize = 20;
pub const DEFAULT_FILENAME: &str = "stirile_zilei_{date}";
pub const DEFAULT_PROMPT: &str = "Make a stylish image that is to be used for a blog post. \
The blog post is part of a category called 'ȘTIRILE ZILEI' (today's news). \
A good starting point would be a newspaper on a desk, with today's date and a headline of \
'ȘTIRILE ZILEI'. Grab search result images for these urls: {urls} --";

pub const ASPECT_RATIOS: [&str; 10] = [
    "1:1", "2:3", "3:2", "3:4", "4:3", "4:5", "5:4", "9:16", "16:9", "21:9",
];

/// Prefix for the environment variables that seed the settings.
pub const SETTINGS_ENV_PREFIX: &str = "FEATURED_IMAGE_";

/// Keys accepted by [`Settings::set`].
pub const SETTING_KEYS: [&str; 10] = [
    "api_key",
    "model",
    "category",
    "aspect_ratio",
    "prompt",
    "ignored_domains",
    "max_urls",
    "randomize_urls",
    "filename",
    "debug",
];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("unknown setting '{0}'")]
    UnknownKey(String),
}

/// Operator-facing generation settings.
///
/// Values are sanitized when written, so a snapshot is always valid to use.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: SecretString,
    pub model: String,
    /// Category slug that opts posts in
    pub category: String,
    pub aspect_ratio: String,
    /// Prompt template; `{urls}` is replaced with the selected links
    pub prompt: String,
    /// One domain rule per line
    pub ignored_domains: String,
    /// 0 means no limit
    pub max_urls: usize,
    pub randomize_urls: bool,
    /// Filename template with `{date}`, `{post_id}` and `{timestamp}`
    pub filename: String,
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: SecretString::default(),
            model: DEFAULT_MODEL.to_string(),
            category: DEFAULT_CATEGORY.to_string(),
            aspect_ratio: DEFAULT_ASPECT_RATIO.to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
            ignored_domains: String::new(),
            max_urls: DEFAULT_MAX_URLS,
            randomize_urls: false,
            filename: DEFAULT_FILENAME.to_string(),
            debug: true,
        }
    }
}

impl Settings {
    /// Defaults overridden by any `FEATURED_IMAGE_*` variables that are set.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        for key in SETTING_KEYS {
            let var = format!("{}{}", SETTINGS_ENV_PREFIX, key.to_uppercase());
            if let Ok(value) = env::var(&var) {
                // Keys come from SETTING_KEYS, so this cannot be unknown.
                let _ = settings.set(key, &value);
            }
        }
        settings
    }

    /// Sanitize and store one value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        match key {
            "api_key" => self.api_key = SecretString::new(value.trim()),
            "model" => self.model = sanitize_text(value),
            "category" => self.category = sanitize_text(value),
            "aspect_ratio" => self.aspect_ratio = sanitize_aspect_ratio(value),
            "prompt" => self.prompt = value.to_string(),
            "ignored_domains" => self.ignored_domains = sanitize_ignored_domains(value),
            "max_urls" => self.max_urls = sanitize_max_urls(value),
            "randomize_urls" => self.randomize_urls = sanitize_flag(value),
            "filename" => self.filename = sanitize_text(value),
            "debug" => self.debug = sanitize_flag(value),
            other => return Err(SettingsError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    /// String form of a value. The API key is never returned.
    pub fn get(&self, key: &str) -> Result<String, SettingsError> {
        let flag = |on: bool| if on { "1" } else { "0" }.to_string();
        Ok(match key {
            "api_key" => {
                if self.has_api_key() {
                    "[REDACTED]".to_string()
                } else {
                    String::new()
                }
            }
            "model" => self.model.clone(),
            "category" => self.category.clone(),
            "aspect_ratio" => self.aspect_ratio.clone(),
            "prompt" => self.prompt.clone(),
            "ignored_domains" => self.ignored_domains.clone(),
            "max_urls" => self.max_urls.to_string(),
            "randomize_urls" => flag(self.randomize_urls),
            "filename" => self.filename.clone(),
            "debug" => flag(self.debug),
            other => return Err(SettingsError::UnknownKey(other.to_string())),
        })
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Filename template, falling back to the default when blank.
    pub fn filename_template(&self) -> &str {
        if self.filename.is_empty() {
            DEFAULT_FILENAME
        } else {
            &self.filename
        }
    }
}

/// Trim and drop control characters.
fn sanitize_text(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

fn sanitize_aspect_ratio(value: &str) -> String {
    let value = value.trim();
    if ASPECT_RATIOS.contains(&value) {
        value.to_string()
    } else {
        DEFAULT_ASPECT_RATIO.to_string()
    }
}

/// Leading integer of the value (`"3.7"` is 3), saturating, clamped to the limit.
fn sanitize_max_urls(value: &str) -> usize {
    let value = value.trim();
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };
    let magnitude = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0usize, |n, d| {
            n.saturating_mul(10).saturating_add(usize::from(d - b'0'))
        });

    if negative {
        0
    } else {
        magnitude.min(MAX_URLS_LIMIT)
    }
}

fn sanitize_flag(value: &str) -> bool {
    value == "1"
}

fn sanitize_ignored_domains(value: &str) -> String {
    value
        .lines()
        .map(|line| {
            let line = line.trim();
            let lower = line.to_ascii_lowercase();
            let line = if lower.starts_with("https://") {
                &line[8..]
            } else if lower.starts_with("http://") {
                &line[7..]
            } else {
                line
            };
            sanitize_text(line.trim_end_matches('/'))
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Shared, runtime-updatable settings. Readers take a snapshot per run.
#[derive(Debug, Default)]
pub struct SettingsStore {
    inner: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: RwLock::new(settings),
        }
    }

    pub fn snapshot(&self) -> Settings {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.set(key, value)
    }

    pub fn debug_enabled(&self) -> bool {
        match self.inner.read() {
            Ok(guard) => guard.debug,
            Err(poisoned) => poisoned.into_inner().debug,
        }
    }
}

// =============================================================================
// Service configuration
// =============================================================================

/// Process configuration loaded from environment variables
#[derive(Clone)]
pub struct Config {
    pub port: u16,
    /// Media root, post snapshot and diagnostic log live here
    pub data_dir: PathBuf,
    pub gemini_base_url: String,
    pub gemini_timeout: Duration,
    /// Bearer token -> operator name
    pub operator_tokens: HashMap<String, String>,
    /// Operators allowed to edit every post
    pub admin_operators: Vec<String>,
    pub webhook_secret: Option<String>,
    pub nonce_secret: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("data_dir", &self.data_dir)
            .field("gemini_base_url", &self.gemini_base_url)
            .field("gemini_timeout", &self.gemini_timeout)
            .field("operators", &self.operator_tokens.len())
            .field("admin_operators", &self.admin_operators)
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            data_dir: env::var("DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string())
                .into(),
            gemini_base_url: env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| gemini_client::DEFAULT_BASE_URL.to_string()),
            gemini_timeout: Duration::from_secs(
                env::var("GEMINI_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "120".to_string())
                    .parse()
                    .context("GEMINI_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            operator_tokens: parse_operator_tokens(
                &env::var("OPERATOR_TOKENS").unwrap_or_default(),
            )?,
            admin_operators: parse_list(&env::var("ADMIN_OPERATORS").unwrap_or_default()),
            webhook_secret: env::var("WEBHOOK_SECRET").ok().filter(|s| !s.is_empty()),
            nonce_secret: env::var("NONCE_SECRET")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        })
    }

    pub fn media_dir(&self) -> PathBuf {
        self.data_dir.join("media")
    }

    pub fn posts_file(&self) -> PathBuf {
        self.data_dir.join("posts.json")
    }

    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("featured-image-debug.log")
    }
}

/// Parse `name=token,name2=token2` into a token -> name map.
pub fn parse_operator_tokens(raw: &str) -> Result<HashMap<String, String>> {
    let mut tokens = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, token) = entry
            .split_once('=')
            .with_context(|| format!("OPERATOR_TOKENS entry '{}' must be name=token", name_only(entry)))?;
        let (name, token) = (name.trim(), token.trim());
        anyhow::ensure!(
            !name.is_empty() && !token.is_empty(),
            "OPERATOR_TOKENS entries need both a name and a token"
        );
        tokens.insert(token.to_string(), name.to_string());
    }
    Ok(tokens)
}

// Keeps tokens out of error messages.
fn name_only(entry: &str) -> &str {
    entry.split('=').next().unwrap_or_default()
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
