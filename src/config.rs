use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::errors::LoiLibreError;
use crate::errors::Result;

/// Prefix for environment overrides, e.g. `LOILIBRE__LLM__API_KEY`
pub const ENV_PREFIX: &str = "LOILIBRE";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub backtrace: bool,
    #[serde(default = "default_log_directory")]
    pub directory: String,
}

fn default_log_directory() -> String {
    "logs".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model name, or deployment name when `api_version` is set
    pub model: String,
    /// Azure-style deployments take an `api-version` query parameter
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default = "default_reformulation_max_tokens")]
    pub reformulation_max_tokens: u32,
    #[serde(default = "default_answer_max_tokens")]
    pub answer_max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

pub(crate) fn default_reformulation_max_tokens() -> u32 {
    128
}

pub(crate) fn default_answer_max_tokens() -> u32 {
    1024
}

fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    /// `openai` or `ollama`
    pub provider: String,
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
}

/// Where passages come from at serve time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalBackend {
    /// Precomputed embedding index loaded from disk
    Index,
    /// Remote index service
    Http,
}

/// Similarity metric the index was built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Similarity {
    Dot,
    Cosine,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub backend: RetrievalBackend,
    #[serde(default = "default_index_path")]
    pub index_path: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_similarity")]
    pub similarity: Similarity,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    /// Number of raw hits requested from the retriever before filtering
    #[serde(default = "default_max_k")]
    pub max_k: usize,
    #[serde(default = "default_k_summary")]
    pub k_summary: usize,
    #[serde(default = "default_k_total")]
    pub k_total: usize,
    #[serde(default = "default_summary_report_types")]
    pub summary_report_types: Vec<String>,
    /// Selector name (as sent by the caller) -> `source` metadata tag
    #[serde(default = "default_sources")]
    pub sources: HashMap<String, String>,
}

fn default_index_path() -> String {
    "data/loilibre_index.json".to_string()
}

fn default_similarity() -> Similarity {
    Similarity::Dot
}

pub(crate) fn default_threshold() -> f32 {
    0.555
}

pub(crate) fn default_max_k() -> usize {
    100
}

pub(crate) fn default_k_summary() -> usize {
    3
}

pub(crate) fn default_k_total() -> usize {
    10
}

pub(crate) fn default_summary_report_types() -> Vec<String> {
    vec!["SPM".to_string(), "TS".to_string()]
}

pub(crate) fn default_sources() -> HashMap<String, String> {
    HashMap::from([
        ("code civil".to_string(), "codecivil".to_string()),
        ("ipbes".to_string(), "IPBES".to_string()),
    ])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Admission cap on chat requests in flight
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    #[serde(default)]
    pub enable_cors: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

pub(crate) fn default_max_concurrent_requests() -> usize {
    16
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_concurrent_requests: default_max_concurrent_requests(),
            enable_cors: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationLogConfig {
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    #[serde(default = "default_conversation_directory")]
    pub directory: String,
}

fn default_log_enabled() -> bool {
    true
}

fn default_conversation_directory() -> String {
    "conversation_logs".to_string()
}

impl Default for ConversationLogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            directory: default_conversation_directory(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub llm: LlmConfig,
    pub embeddings: EmbeddingsConfig,
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub conversation_log: ConversationLogConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file, with `LOILIBRE__SECTION__KEY`
    /// environment variables taking precedence over file values
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text without environment overrides
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default config file path
    pub fn load() -> Result<Self> {
        // Try to load from config.toml first, then fall back to config.example.toml
        if Path::new("config.toml").exists() {
            Self::from_file("config.toml")
        } else if Path::new("config.example.toml").exists() {
            tracing::warn!(
                "Using config.example.toml. Please create config.toml for production use."
            );
            Self::from_file("config.example.toml")
        } else {
            Err(LoiLibreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No config file found. Please create config.toml or config.example.toml",
            )))
        }
    }

    /// Reject settings the pipeline cannot honour
    pub fn validate(&self) -> Result<()> {
        let retrieval = &self.retrieval;
        if retrieval.k_total == 0 {
            return Err(LoiLibreError::ConfigError(
                "retrieval.k_total must be positive".to_string(),
            ));
        }
        if retrieval.max_k <= retrieval.k_total {
            return Err(LoiLibreError::ConfigError(format!(
                "retrieval.max_k ({}) must be greater than retrieval.k_total ({})",
                retrieval.max_k, retrieval.k_total
            )));
        }
        if !retrieval.threshold.is_finite() {
            return Err(LoiLibreError::ConfigError(
                "retrieval.threshold must be a finite number".to_string(),
            ));
        }
        if retrieval.backend == RetrievalBackend::Http && retrieval.endpoint.is_none() {
            return Err(LoiLibreError::ConfigError(
                "retrieval.endpoint is required for the http backend".to_string(),
            ));
        }
        let mut selectors: Vec<String> =
            retrieval.sources.keys().map(|k| k.trim().to_lowercase()).collect();
        selectors.sort();
        if let Some(pair) = selectors.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(LoiLibreError::ConfigError(format!(
                "retrieval.sources has selectors that differ only by case: {:?}",
                pair[0]
            )));
        }
        if self.server.max_concurrent_requests == 0 {
            return Err(LoiLibreError::ConfigError(
                "server.max_concurrent_requests must be positive".to_string(),
            ));
        }
        self.embeddings
            .provider
            .parse::<crate::embeddings::EmbeddingProvider>()?;
        Ok(())
    }

    /// Get LLM endpoint
    pub fn llm_endpoint(&self) -> &str {
        &self.llm.endpoint
    }

    /// Get LLM model
    pub fn llm_model(&self) -> &str {
        &self.llm.model
    }

    /// Get default similarity threshold
    pub fn threshold(&self) -> f32 {
        self.retrieval.threshold
    }

    /// Get address the API server binds to
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                backtrace: true,
                directory: default_log_directory(),
            },
            llm: LlmConfig {
                endpoint: "http://localhost:11434/v1".to_string(),
                api_key: None,
                model: "mistral".to_string(),
                api_version: None,
                reformulation_max_tokens: default_reformulation_max_tokens(),
                answer_max_tokens: default_answer_max_tokens(),
                temperature: 0.0,
                timeout_secs: default_timeout_secs(),
            },
            embeddings: EmbeddingsConfig {
                provider: "ollama".to_string(),
                endpoint: "http://localhost:11434".to_string(),
                api_key: None,
                model: "multi-qa-mpnet-base-dot-v1".to_string(),
            },
            retrieval: RetrievalConfig {
                backend: RetrievalBackend::Index,
                index_path: default_index_path(),
                endpoint: None,
                similarity: default_similarity(),
                threshold: default_threshold(),
                max_k: default_max_k(),
                k_summary: default_k_summary(),
                k_total: default_k_total(),
                summary_report_types: default_summary_report_types(),
                sources: default_sources(),
            },
            server: ServerConfig::default(),
            conversation_log: ConversationLogConfig::default(),
        }
    }
}
