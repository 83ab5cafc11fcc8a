//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `VULNRAG_*` environment variables.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_CANDIDATE_LIMIT, DEFAULT_COLLECTION_NAME, DEFAULT_EMBEDDING_DIM,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_GENERATION_MODEL, DEFAULT_GENERATION_TIMEOUT_SECS,
    DEFAULT_OLLAMA_URL, DEFAULT_QDRANT_URL, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SELECT_K,
    LAMBDA_BALANCED,
};
use crate::retrieval::SelectionParams;

/// Server configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `VULNRAG_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port. Default: `8080`.
    pub port: u16,

    /// IP address to bind to. Default: `127.0.0.1`.
    pub bind_addr: IpAddr,

    /// Directory holding `history.json` and `chats.json`. Default: `./.data`.
    pub data_path: PathBuf,

    /// Ollama base URL used for embeddings. Default: `http://localhost:11434`.
    pub ollama_url: String,

    pub embedding_model: String,

    /// Model name passed to the generation client.
    pub generation_model: String,

    /// Expected embedding dimension. Default: `768`.
    pub embedding_dim: usize,

    /// Qdrant endpoint URL. Default: `http://localhost:6334`.
    pub qdrant_url: String,

    pub collection_name: String,

    /// Candidates fetched from the store per query. Default: `100`.
    pub candidate_limit: u64,

    /// Records kept after MMR selection. Default: `20`.
    pub select_k: usize,

    /// Relevance/diversity trade-off in `[0, 1]`. Default: `0.5`.
    pub lambda: f32,

    /// Timeout for the embedding and similarity-store calls. Default: `30`.
    pub request_timeout_secs: u64,

    /// Overall deadline for one generation stream. Default: `300`.
    pub generation_timeout_secs: u64,

    /// Allow any origin in CORS responses. Default: `false`.
    pub cors_allow_any: bool,

    /// Origins allowed (with credentials) when `cors_allow_any` is off.
    /// Default: `http://localhost:3000`.
    pub cors_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            data_path: PathBuf::from("./.data"),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            collection_name: DEFAULT_COLLECTION_NAME.to_string(),
            candidate_limit: DEFAULT_CANDIDATE_LIMIT,
            select_k: DEFAULT_SELECT_K,
            lambda: LAMBDA_BALANCED,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            generation_timeout_secs: DEFAULT_GENERATION_TIMEOUT_SECS,
            cors_allow_any: false,
            cors_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

impl Config {
    const ENV_PORT: &'static str = "VULNRAG_PORT";
    const ENV_BIND_ADDR: &'static str = "VULNRAG_BIND_ADDR";
    const ENV_DATA_PATH: &'static str = "VULNRAG_DATA_PATH";
    const ENV_OLLAMA_URL: &'static str = "VULNRAG_OLLAMA_URL";
    const ENV_EMBEDDING_MODEL: &'static str = "VULNRAG_EMBEDDING_MODEL";
    const ENV_GENERATION_MODEL: &'static str = "VULNRAG_GENERATION_MODEL";
    const ENV_EMBEDDING_DIM: &'static str = "VULNRAG_EMBEDDING_DIM";
    const ENV_QDRANT_URL: &'static str = "VULNRAG_QDRANT_URL";
    const ENV_COLLECTION_NAME: &'static str = "VULNRAG_COLLECTION";
    const ENV_CANDIDATE_LIMIT: &'static str = "VULNRAG_CANDIDATE_LIMIT";
    const ENV_SELECT_K: &'static str = "VULNRAG_SELECT_K";
    const ENV_LAMBDA: &'static str = "VULNRAG_LAMBDA";
    const ENV_REQUEST_TIMEOUT: &'static str = "VULNRAG_REQUEST_TIMEOUT_SECS";
    const ENV_GENERATION_TIMEOUT: &'static str = "VULNRAG_GENERATION_TIMEOUT_SECS";
    const ENV_CORS_ALLOW_ANY: &'static str = "VULNRAG_CORS_ALLOW_ANY";
    const ENV_CORS_ORIGINS: &'static str = "VULNRAG_CORS_ORIGINS";

    /// Loads configuration from environment variables (falling back to defaults).
    ///
    /// A variable that is set but unparseable is an error, never a silent default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            port: Self::parse_port_from_env(defaults.port)?,
            bind_addr: Self::parse_bind_addr_from_env(defaults.bind_addr)?,
            data_path: Self::parse_path_from_env(Self::ENV_DATA_PATH, defaults.data_path),
            ollama_url: Self::parse_string_from_env(Self::ENV_OLLAMA_URL, defaults.ollama_url),
            embedding_model: Self::parse_string_from_env(
                Self::ENV_EMBEDDING_MODEL,
                defaults.embedding_model,
            ),
            generation_model: Self::parse_string_from_env(
                Self::ENV_GENERATION_MODEL,
                defaults.generation_model,
            ),
            embedding_dim: Self::parse_number_from_env(
                Self::ENV_EMBEDDING_DIM,
                defaults.embedding_dim,
            )?,
            qdrant_url: Self::parse_string_from_env(Self::ENV_QDRANT_URL, defaults.qdrant_url),
            collection_name: Self::parse_string_from_env(
                Self::ENV_COLLECTION_NAME,
                defaults.collection_name,
            ),
            candidate_limit: Self::parse_number_from_env(
                Self::ENV_CANDIDATE_LIMIT,
                defaults.candidate_limit,
            )?,
            select_k: Self::parse_number_from_env(Self::ENV_SELECT_K, defaults.select_k)?,
            lambda: Self::parse_number_from_env(Self::ENV_LAMBDA, defaults.lambda)?,
            request_timeout_secs: Self::parse_number_from_env(
                Self::ENV_REQUEST_TIMEOUT,
                defaults.request_timeout_secs,
            )?,
            generation_timeout_secs: Self::parse_number_from_env(
                Self::ENV_GENERATION_TIMEOUT,
                defaults.generation_timeout_secs,
            )?,
            cors_allow_any: Self::parse_bool_from_env(
                Self::ENV_CORS_ALLOW_ANY,
                defaults.cors_allow_any,
            )?,
            cors_origins: Self::parse_list_from_env(Self::ENV_CORS_ORIGINS, defaults.cors_origins),
        })
    }

    /// Validates ranges and paths (does not create directories).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_path.exists() && !self.data_path.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: self.data_path.clone(),
            });
        }

        if self.embedding_dim == 0 {
            return Err(ConfigError::OutOfRange {
                name: Self::ENV_EMBEDDING_DIM,
                reason: "must be at least 1".to_string(),
            });
        }
        if self.candidate_limit == 0 {
            return Err(ConfigError::OutOfRange {
                name: Self::ENV_CANDIDATE_LIMIT,
                reason: "must be at least 1".to_string(),
            });
        }
        if self.request_timeout_secs == 0 || self.generation_timeout_secs == 0 {
            return Err(ConfigError::OutOfRange {
                name: Self::ENV_REQUEST_TIMEOUT,
                reason: "timeouts must be at least 1 second".to_string(),
            });
        }

        self.selection_params()?;
        Ok(())
    }

    /// Returns `"{bind_addr}:{port}"` (useful for logging/binding).
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    /// MMR parameters from `select_k` and `lambda`.
    pub fn selection_params(&self) -> Result<SelectionParams, ConfigError> {
        SelectionParams::new(self.select_k, self.lambda).map_err(|e| ConfigError::OutOfRange {
            name: if self.select_k == 0 {
                Self::ENV_SELECT_K
            } else {
                Self::ENV_LAMBDA
            },
            reason: e.to_string(),
        })
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or(default)
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(default)
    }

    /// Comma-separated list; blank items are dropped and an empty list keeps the default.
    fn parse_list_from_env(var_name: &str, default: Vec<String>) -> Vec<String> {
        let items: Vec<String> = env::var(var_name)
            .ok()
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        if items.is_empty() { default } else { items }
    }

    fn parse_number_from_env<T>(var_name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(var_name) {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidNumber {
                    name: var_name,
                    value,
                    reason: e.to_string(),
                }),
            Err(_) => Ok(default),
        }
    }

    fn parse_bool_from_env(var_name: &'static str, default: bool) -> Result<bool, ConfigError> {
        match env::var(var_name) {
            Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidBool {
                    name: var_name,
                    value,
                }),
            },
            Err(_) => Ok(default),
        }
    }
}
