use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DigestError;
use crate::types::Category;

/// Top-level configuration loaded from `.techdigest.toml`.
///
/// Supports layered resolution: CLI flags > config file > defaults.
///
/// # Examples
///
/// ```
/// use techdigest_core::DigestConfig;
///
/// let config = DigestConfig::default();
/// assert_eq!(config.classifier.batch_size, 10);
/// assert!(config.categories.is_empty());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DigestConfig {
    /// Classification behavior.
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// Model provider settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Ordered category definitions (display order).
    #[serde(default)]
    pub categories: Vec<Category>,
}

#[derive(Deserialize)]
struct CategoriesFile {
    #[serde(default)]
    categories: Vec<Category>,
}

impl DigestConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// A relative `classifier.categories_file` is resolved against the
    /// directory containing `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::FileNotFound`] if `path` does not exist,
    /// [`DigestError::Toml`] on invalid TOML, and [`DigestError::Config`] if
    /// the settings fail validation.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            return Err(DigestError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;

        if let Some(file) = config.classifier.categories_file.clone() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            config.merge_categories_file(&base.join(file))?;
        }
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::Toml`] if parsing fails, or
    /// [`DigestError::Config`] if a tunable is out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use techdigest_core::DigestConfig;
    ///
    /// let toml = r#"
    /// [classifier]
    /// batch_size = 4
    ///
    /// [[categories]]
    /// name = "ML"
    /// keywords = ["transformer", "gpt"]
    /// "#;
    /// let config = DigestConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.classifier.batch_size, 4);
    /// assert_eq!(config.categories[0].keywords.len(), 2);
    /// ```
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn merge_categories_file(&mut self, path: &Path) -> crate::Result<()> {
        if !self.categories.is_empty() {
            return Err(DigestError::Config(format!(
                "categories are defined inline and in {}; keep only one",
                path.display()
            )));
        }
        if !path.exists() {
            return Err(DigestError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let file: CategoriesFile = toml::from_str(&content)?;
        self.categories = file.categories;
        Ok(())
    }

    /// Check tunables that serde cannot express.
    ///
    /// Category definitions are validated separately when the registry is built.
    pub fn validate(&self) -> crate::Result<()> {
        if self.classifier.batch_size == 0 {
            return Err(DigestError::Config(
                "classifier.batch_size must be at least 1".into(),
            ));
        }
        if self.classifier.summary_chars == 0 {
            return Err(DigestError::Config(
                "classifier.summary_chars must be at least 1".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(DigestError::Config(format!(
                "llm.temperature must be between 0 and 2, got {}",
                self.llm.temperature
            )));
        }
        Ok(())
    }
}

/// Classification behavior configuration.
///
/// # Examples
///
/// ```
/// use techdigest_core::ClassifierConfig;
///
/// let config = ClassifierConfig::default();
/// assert!(config.use_model);
/// assert!(config.fallback_to_keywords);
/// assert_eq!(config.catch_all, "Other");
/// assert_eq!(config.max_retries, 0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Query the model provider at all (default: true).
    #[serde(default = "default_true")]
    pub use_model: bool,
    /// Keyword-classify articles the model could not resolve (default: true).
    #[serde(default = "default_true")]
    pub fallback_to_keywords: bool,
    /// Articles per provider request (default: 10).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Name of the catch-all category (default: `"Other"`).
    #[serde(default = "default_catch_all")]
    pub catch_all: String,
    /// Extra attempts for a batch that failed at the transport level (default: 0).
    #[serde(default)]
    pub max_retries: u32,
    /// Initial backoff between attempts, doubled each time (default: 1000).
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Summary characters sent to the model per article (default: 200).
    #[serde(default = "default_summary_chars")]
    pub summary_chars: usize,
    /// Separate TOML file holding the `[[categories]]` list.
    pub categories_file: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_batch_size() -> usize {
    10
}

fn default_catch_all() -> String {
    "Other".into()
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_summary_chars() -> usize {
    200
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            use_model: true,
            fallback_to_keywords: true,
            batch_size: default_batch_size(),
            catch_all: default_catch_all(),
            max_retries: 0,
            retry_delay_ms: default_retry_delay_ms(),
            summary_chars: default_summary_chars(),
            categories_file: None,
        }
    }
}

/// Supported classification providers.
///
/// OpenRouter, GitHub Models and OpenAI share the chat-completions request
/// schema; Anthropic uses its own messages schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenRouter,
    #[serde(alias = "github-models")]
    Github,
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    /// Endpoint used when `llm.base_url` is not set.
    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::OpenRouter => "https://openrouter.ai/api/v1",
            ProviderKind::Github => "https://models.inference.ai.azure.com",
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com",
        }
    }

    /// Environment variable holding the API key when `llm.api_key_env` is not set.
    pub fn default_api_key_env(self) -> &'static str {
        match self {
            ProviderKind::OpenRouter => "OPENROUTER_API_KEY",
            ProviderKind::Github => "GITHUB_TOKEN",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::OpenRouter => write!(f, "openrouter"),
            ProviderKind::Github => write!(f, "github"),
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Anthropic => write!(f, "anthropic"),
        }
    }
}

/// Model provider configuration.
///
/// # Examples
///
/// ```
/// use techdigest_core::{LlmConfig, ProviderKind};
///
/// let config = LlmConfig::default();
/// assert_eq!(config.provider, ProviderKind::OpenRouter);
/// assert_eq!(config.base_url(), "https://openrouter.ai/api/v1");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider (`"openrouter"`, `"github"`, `"openai"`, `"anthropic"`).
    #[serde(default)]
    pub provider: ProviderKind,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// Inline API key; prefer `api_key_env` for anything shared.
    pub api_key: Option<String>,
    /// Environment variable to read the API key from.
    pub api_key_env: Option<String>,
    /// Custom base URL for API requests.
    pub base_url: Option<String>,
    /// Completion token limit per request (default: 500).
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature (default: 0.3).
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Per-request timeout in seconds (default: 60).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}

fn default_max_tokens() -> u32 {
    500
}

fn default_temperature() -> f32 {
    0.3
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: default_model(),
            api_key: None,
            api_key_env: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Configured base URL without a trailing slash, or the provider default.
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .map(|u| u.trim_end_matches('/'))
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    /// Name of the environment variable that holds the API key.
    pub fn api_key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or_else(|| self.provider.default_api_key_env())
    }

    /// Resolve the API key: inline value first, then `lookup(api_key_env)`.
    ///
    /// `lookup` is usually `|k| std::env::var(k).ok()`; tests pass a closure.
    ///
    /// # Examples
    ///
    /// ```
    /// use techdigest_core::LlmConfig;
    ///
    /// let config = LlmConfig::default();
    /// let key = config.resolve_api_key(|name| {
    ///     (name == "OPENROUTER_API_KEY").then(|| "sk-test".to_string())
    /// });
    /// assert_eq!(key.as_deref(), Some("sk-test"));
    /// ```
    pub fn resolve_api_key(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| lookup(self.api_key_env()).filter(|k| !k.trim().is_empty()))
    }
}
