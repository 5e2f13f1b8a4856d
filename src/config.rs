//! TOML configuration with environment overrides.
//!
//! Every section is optional; a missing section falls back to the defaults
//! below. After parsing, a handful of environment variables (API key, upload
//! limits, model names, port) override the file so the server can be
//! configured the same way in a container as on a laptop.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Upper bound for `embedding.max_retries`.
pub const MAX_EMBEDDING_ATTEMPTS: u32 = 10;

/// Secret used when neither the config file nor `BIZDESK_SECRET_KEY` set one.
pub const DEFAULT_SECRET_KEY: &str = "a_very_secret_default_key";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/bizdesk.sqlite"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorStoreConfig {
    #[serde(default = "default_vector_path")]
    pub path: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            path: default_vector_path(),
            collection: default_collection(),
        }
    }
}

fn default_vector_path() -> PathBuf {
    PathBuf::from("./data/vectors.sqlite")
}
fn default_collection() -> String {
    "business_docs_collection".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub secret_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            secret_key: None,
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:5000".to_string()
}

impl ServerConfig {
    pub fn secret_key(&self) -> &str {
        self.secret_key.as_deref().unwrap_or(DEFAULT_SECRET_KEY)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

fn default_max_bytes() -> usize {
    16 * 1024 * 1024
}
fn default_allowed_extensions() -> Vec<String> {
    ["pdf", "doc", "docx", "txt", "csv"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Total attempts per text when the API answers 429.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    1000
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Characters of document text sent to the FAQ and extraction prompts.
    #[serde(default = "default_document_char_limit")]
    pub document_char_limit: usize,
    /// Characters of assembled RAG context placed in the system prompt.
    #[serde(default = "default_context_char_limit")]
    pub context_char_limit: usize,
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_chat_model(),
            temperature: default_temperature(),
            document_char_limit: default_document_char_limit(),
            context_char_limit: default_context_char_limit(),
            assistant_name: default_assistant_name(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_chat_model() -> String {
    "gpt-4o".to_string()
}
fn default_temperature() -> f32 {
    0.5
}
fn default_document_char_limit() -> usize {
    8000
}
fn default_context_char_limit() -> usize {
    12000
}
fn default_assistant_name() -> String {
    "FashBot".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenAiConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Usually left unset in the file and supplied through `OPENAI_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
        }
    }
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

/// Read, parse, apply environment overrides and validate.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    apply_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;

    Ok(config)
}

/// Apply environment-style overrides using `lookup` to resolve variables.
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = lookup("OPENAI_API_KEY").filter(|v| !v.trim().is_empty()) {
        config.openai.api_key = Some(key);
    }
    if let Some(secret) = lookup("BIZDESK_SECRET_KEY").filter(|v| !v.is_empty()) {
        config.server.secret_key = Some(secret);
    }
    if let Some(raw) = lookup("BIZDESK_MAX_UPLOAD_BYTES") {
        config.upload.max_bytes = raw
            .trim()
            .parse()
            .with_context(|| format!("BIZDESK_MAX_UPLOAD_BYTES is not a number: {}", raw))?;
    }
    if let Some(raw) = lookup("BIZDESK_ALLOWED_EXTENSIONS") {
        config.upload.allowed_extensions = raw
            .split(',')
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
    }
    if let Some(model) = lookup("OPENAI_EMBEDDING_MODEL").filter(|v| !v.is_empty()) {
        config.embedding.model = model;
    }
    if let Some(model) = lookup("OPENAI_CHAT_MODEL").filter(|v| !v.is_empty()) {
        config.llm.model = model;
    }
    if let Some(port) = lookup("PORT") {
        let port: u16 = port
            .trim()
            .parse()
            .with_context(|| format!("PORT is not a valid port: {}", port))?;
        config.server.bind = format!("0.0.0.0:{}", port);
    }
    Ok(())
}

pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        bail!("chunking.chunk_overlap must be smaller than chunking.chunk_size");
    }

    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }

    if config.upload.max_bytes == 0 {
        bail!("upload.max_bytes must be > 0");
    }
    if config.upload.allowed_extensions.is_empty() {
        bail!("upload.allowed_extensions must not be empty");
    }

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        bail!("llm.temperature must be in [0.0, 2.0]");
    }

    for (section, provider) in [
        ("embedding", config.embedding.provider.as_str()),
        ("llm", config.llm.provider.as_str()),
    ] {
        match provider {
            "disabled" => {}
            "openai" => {
                if config.openai.api_key.is_none() {
                    bail!(
                        "{}.provider is 'openai' but no API key is configured. Set OPENAI_API_KEY.",
                        section
                    );
                }
            }
            other => bail!(
                "Unknown {} provider: '{}'. Must be openai or disabled.",
                section,
                other
            ),
        }
    }

    if config.embedding.is_enabled() && config.embedding.max_retries == 0 {
        bail!("embedding.max_retries must be >= 1");
    }
    if config.embedding.max_retries > MAX_EMBEDDING_ATTEMPTS {
        bail!(
            "embedding.max_retries must be <= {}",
            MAX_EMBEDDING_ATTEMPTS
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 50);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.upload.max_bytes, 16 * 1024 * 1024);
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.vector_store.collection, "business_docs_collection");
        assert_eq!(config.server.secret_key(), DEFAULT_SECRET_KEY);
    }

    #[test]
    fn test_openai_requires_key() {
        let config: Config = toml::from_str("").unwrap();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_disabled_providers_validate_without_key() {
        let config: Config = toml::from_str(
            r#"
            [embedding]
            provider = "disabled"
            [llm]
            provider = "disabled"
            "#,
        )
        .unwrap();
        validate(&config).unwrap();
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        apply_overrides(
            &mut config,
            lookup_from(&[
                ("OPENAI_API_KEY", "sk-test"),
                ("BIZDESK_MAX_UPLOAD_BYTES", "1024"),
                ("BIZDESK_ALLOWED_EXTENSIONS", "PDF, .txt"),
                ("OPENAI_CHAT_MODEL", "gpt-3.5-turbo"),
                ("OPENAI_EMBEDDING_MODEL", "text-embedding-3-large"),
                ("BIZDESK_SECRET_KEY", "from-env"),
                ("PORT", "8080"),
            ]),
        )
        .unwrap();

        assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.upload.max_bytes, 1024);
        assert_eq!(config.upload.allowed_extensions, vec!["pdf", "txt"]);
        assert_eq!(config.llm.model, "gpt-3.5-turbo");
        assert_eq!(config.embedding.model, "text-embedding-3-large");
        assert_eq!(config.server.secret_key(), "from-env");
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        validate(&config).unwrap();
    }

    #[test]
    fn test_bad_numeric_override_errors() {
        let mut config = Config::default();
        let err = apply_overrides(
            &mut config,
            lookup_from(&[("BIZDESK_MAX_UPLOAD_BYTES", "lots")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("BIZDESK_MAX_UPLOAD_BYTES"));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let mut config = Config::default();
        config.openai.api_key = Some("k".to_string());
        config.chunking.chunk_overlap = 500;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_max_retries_bounded() {
        let mut config = Config::default();
        config.openai.api_key = Some("k".to_string());
        config.embedding.max_retries = 40;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("embedding.max_retries"));

        config.embedding.max_retries = MAX_EMBEDDING_ATTEMPTS;
        validate(&config).unwrap();
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let mut config = Config::default();
        config.openai.api_key = Some("k".to_string());
        config.llm.provider = "anthropic-magic".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("Unknown llm provider"));
    }
}
