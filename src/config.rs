use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub http_server: HttpServerConfig,
}

/// Storage and process-wide settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// When set, snapshots are written to this JSON file instead of SQLite.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            snapshot_path: None,
            log_level: default_log_level(),
        }
    }
}

/// Entity/relationship extraction settings
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    /// Optional TOML/YAML pattern table replacing the built-in one.
    #[serde(default)]
    pub patterns_path: Option<PathBuf>,
    #[serde(default = "default_context_radius")]
    pub context_radius: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            patterns_path: None,
            context_radius: default_context_radius(),
        }
    }
}

/// Query execution limits
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_semantic_limit")]
    pub semantic_limit: usize,
    #[serde(default = "default_temporal_limit")]
    pub temporal_limit: usize,
    /// Semantic results below this confidence trigger spatial/relational broadening.
    #[serde(default = "default_broaden_below")]
    pub broaden_below: f32,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            semantic_limit: default_semantic_limit(),
            temporal_limit: default_temporal_limit(),
            broaden_below: default_broaden_below(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

/// Response synthesis settings
#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisConfig {
    #[serde(default = "default_escalation_threshold")]
    pub escalation_threshold: f32,
    #[serde(default = "default_faq_min_score")]
    pub faq_min_score: f32,
    #[serde(default = "default_max_faq_matches")]
    pub max_faq_matches: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            escalation_threshold: default_escalation_threshold(),
            faq_min_score: default_faq_min_score(),
            max_faq_matches: default_max_faq_matches(),
        }
    }
}

/// Hosted LLM enhancement settings
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub enabled: bool,
    /// `openai` (chat completions compatible) or `gemini`.
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Overrides the provider's public endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_llm_provider(),
            model: default_llm_model(),
            endpoint: None,
            api_key_env: default_llm_api_key_env(),
            timeout_secs: default_llm_timeout_secs(),
            system_prompt: default_system_prompt(),
        }
    }
}

/// Content ingestion settings
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    #[serde(default)]
    pub content_folder: Option<PathBuf>,
    #[serde(default)]
    pub faq_path: Option<PathBuf>,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            content_folder: None,
            faq_path: None,
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            port: default_http_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("mosdac.db")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_context_radius() -> usize {
    100
}

fn default_semantic_limit() -> usize {
    50
}

fn default_temporal_limit() -> usize {
    20
}

fn default_broaden_below() -> f32 {
    0.6
}

fn default_cache_capacity() -> usize {
    256
}

fn default_escalation_threshold() -> f32 {
    0.3
}

fn default_faq_min_score() -> f32 {
    0.3
}

fn default_max_faq_matches() -> usize {
    3
}

fn default_llm_provider() -> String {
    "gemini".to_string()
}

fn default_llm_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_llm_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    15
}

fn default_system_prompt() -> String {
    "You are an assistant for the MOSDAC (Meteorological and Oceanographic Satellite Data \
     Archival Centre) portal. Answer concisely and professionally, using only the grounding \
     context provided, and focus on satellite data, oceanography and meteorology."
        .to_string()
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_http_port() -> u16 {
    8080
}

fn default_allowed_origins() -> Vec<String> {
    vec![]
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in MOSDAC_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();

        let config_path = std::env::var("MOSDAC_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        Self::from_path(&config_path)
    }

    /// Load and validate configuration from an explicit path
    pub fn from_path(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.extraction.context_radius == 0 {
            anyhow::bail!("extraction.context_radius must be greater than 0");
        }

        if self.query.semantic_limit == 0 || self.query.temporal_limit == 0 {
            anyhow::bail!("query.semantic_limit and query.temporal_limit must be greater than 0");
        }

        for (name, value) in [
            ("query.broaden_below", self.query.broaden_below),
            ("synthesis.escalation_threshold", self.synthesis.escalation_threshold),
            ("synthesis.faq_min_score", self.synthesis.faq_min_score),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{} must be between 0.0 and 1.0", name);
            }
        }

        if self.llm.enabled {
            if !matches!(self.llm.provider.as_str(), "openai" | "gemini") {
                anyhow::bail!(
                    "llm.provider must be \"openai\" or \"gemini\", got \"{}\"",
                    self.llm.provider
                );
            }
            std::env::var(&self.llm.api_key_env).with_context(|| {
                format!(
                    "Environment variable {} not set. Set it in your .env file or disable [llm].",
                    self.llm.api_key_env
                )
            })?;
            if self.llm.timeout_secs == 0 {
                anyhow::bail!("llm.timeout_secs must be greater than 0");
            }
        }

        if let Some(folder) = &self.ingest.content_folder {
            if folder.exists() && !folder.is_dir() {
                anyhow::bail!(
                    "ingest.content_folder must be a directory, not a file: {}",
                    folder.display()
                );
            }
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.app.db_path
    }
}
