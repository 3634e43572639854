use std::env;

use crate::error::EngineError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Endpoint and credentials
    pub ollama: OllamaConfig,
    /// Model and sampling parameters
    pub generation: GenerationConfig,
    /// Loop budgets and termination policy
    pub engine: EngineConfig,
    /// Log level and format
    pub logging: LoggingConfig,
    /// HTTP client settings
    pub request: RequestConfig,
}

/// Ollama endpoint configuration
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Bearer token for the endpoint
    pub api_key: String,
    /// Base URL, e.g. `https://ollama.com`
    pub host: String,
}

/// Per-request generation parameters
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Model identifier
    pub model: String,
    /// Sampling temperature
    pub temperature: f64,
    /// Token budget per generation
    pub num_predict: u32,
}

/// Reasoning loop budgets and termination policy
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum committed reasoning steps per session
    pub max_depth: u32,
    /// Candidate continuations per step
    pub max_width: u32,
    /// Solved-sentinel pattern searched for in generated text
    pub sentinel: String,
    /// Whether sentinel matching ignores case
    pub sentinel_case_insensitive: bool,
    /// Safety bound on article continuation rounds
    pub synthesis_max_rounds: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    /// Human-readable output
    Pretty,
    /// Structured JSON lines
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Connection establishment budget; generations themselves are unbounded
    pub connect_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, EngineError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let ollama = OllamaConfig {
            api_key: env::var("OLLAMA_API_KEY").map_err(|_| EngineError::Config {
                message: "OLLAMA_API_KEY is required".to_string(),
            })?,
            host: env::var("OLLAMA_HOST").unwrap_or_else(|_| "https://ollama.com".to_string()),
        };

        let generation = GenerationConfig {
            model: env::var("REASONING_MODEL")
                .unwrap_or_else(|_| GenerationConfig::default().model),
            temperature: env::var("GENERATION_TEMPERATURE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.01),
            num_predict: env::var("GENERATION_NUM_PREDICT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100_000),
        };

        let engine = EngineConfig {
            max_depth: env::var("REASONING_MAX_DEPTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8),
            max_width: env::var("REASONING_MAX_WIDTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            sentinel: env::var("SOLVED_SENTINEL")
                .unwrap_or_else(|_| "Solved the problem".to_string()),
            sentinel_case_insensitive: env::var("SENTINEL_CASE_INSENSITIVE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),
            synthesis_max_rounds: env::var("SYNTHESIS_MAX_ROUNDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(4),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            connect_timeout_ms: env::var("CONNECT_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10_000),
        };

        Ok(Config {
            ollama,
            generation,
            engine,
            logging,
            request,
        })
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "deepseek-v3.1:671b-cloud".to_string(),
            temperature: 0.01,
            num_predict: 100_000,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: 8,
            max_width: 3,
            sentinel: "Solved the problem".to_string(),
            sentinel_case_insensitive: false,
            synthesis_max_rounds: 4,
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
        }
    }
}
