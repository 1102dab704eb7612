use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::Error;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MindloopConfig {
    pub runtime: RuntimeConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub judges: JudgeConfig,
    pub persona: PersonaConfig,
    pub memory: MemoryConfig,
    pub safety: SafetyConfig,
    pub debate: DebateConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RuntimeConfig {
    pub cycles: usize,
    pub seed: i64,
    pub log_level: String,
    /// Run the curation debate over the memory pool every N cycles (0 = only at the end).
    pub curate_every: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    pub index_path: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `hash` (deterministic, no model files) or `local` (ONNX Runtime).
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
    /// Output dimension of the `hash` provider.
    pub dim: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct JudgeConfig {
    /// `stub` (offline, echoes prompts) or `http` (OpenAI-compatible chat completions).
    pub backend: String,
    pub endpoint: String,
    pub persona_model: String,
    pub neutral_model: String,
    /// Name of the environment variable holding the API key, if any.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PersonaConfig {
    pub name: String,
    pub system: String,
    pub neutral_system: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MemoryConfig {
    pub recall_k: usize,
    pub alpha: f64,
    pub keyword_ceiling: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SafetyConfig {
    pub veto_risk: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DebateConfig {
    pub rounds: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cycles: 10,
            seed: 42,
            log_level: "info".into(),
            curate_every: 0,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let dir = default_mindloop_dir();
        Self {
            db_path: dir.join("meta.sqlite3").to_string_lossy().into_owned(),
            index_path: dir.join("vectors.idx").to_string_lossy().into_owned(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_mindloop_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "hash".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir,
            dim: 384,
            timeout_secs: 30,
        }
    }
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            backend: "stub".into(),
            endpoint: "http://127.0.0.1:4891/v1/chat/completions".into(),
            persona_model: "mooded-b".into(),
            neutral_model: "neutral-a".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            timeout_secs: 60,
            temperature: 0.6,
            top_p: 0.95,
            max_tokens: 1024,
        }
    }
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: "Analytical".into(),
            system: "You are Analytical: precise, evidence-driven, and concise.".into(),
            neutral_system: String::new(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            recall_k: 8,
            alpha: 0.7,
            keyword_ceiling: 200,
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self { veto_risk: 0.6 }
    }
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self { rounds: 3 }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl JudgeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Returns `~/.mindloop/`
pub fn default_mindloop_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mindloop")
}

/// Returns the default config file path: `~/.mindloop/config.toml`
pub fn default_config_path() -> PathBuf {
    default_mindloop_dir().join("config.toml")
}

impl MindloopConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, apply env var overrides, and validate.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            MindloopConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides (MINDLOOP_DB, MINDLOOP_INDEX, MINDLOOP_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MINDLOOP_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("MINDLOOP_INDEX") {
            self.storage.index_path = val;
        }
        if let Ok(val) = std::env::var("MINDLOOP_LOG_LEVEL") {
            self.runtime.log_level = val;
        }
    }

    /// Reject settings the engines cannot run with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.storage.db_path.trim().is_empty() {
            return Err(Error::config("storage.db_path must be set"));
        }
        if self.storage.index_path.trim().is_empty() {
            return Err(Error::config("storage.index_path must be set"));
        }
        if self.debate.rounds < 1 {
            return Err(Error::config("debate.rounds must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.memory.alpha) {
            return Err(Error::config("memory.alpha must be between 0.0 and 1.0"));
        }
        if !(0.0..=1.0).contains(&self.safety.veto_risk) {
            return Err(Error::config("safety.veto_risk must be between 0.0 and 1.0"));
        }
        if self.judges.timeout_secs == 0 || self.embedding.timeout_secs == 0 {
            return Err(Error::config("timeouts must be at least one second"));
        }
        if self.embedding.provider == "hash" && self.embedding.dim == 0 {
            return Err(Error::config("embedding.dim must be positive"));
        }
        Ok(())
    }

    /// FNV-1a digest of the effective settings rendered as TOML, stored on each
    /// cycle row. `None` if the settings cannot be rendered.
    pub fn fingerprint(&self) -> Option<String> {
        let rendered = toml::to_string(self)
            .inspect_err(|e| tracing::warn!(error = %e, "cannot render config for fingerprint"))
            .ok()?;
        Some(format!("{:016x}", crate::embedding::hash::fnv1a(rendered.as_bytes())))
    }

    /// Loop settings for [`crate::cycle::MindLoop`].
    pub fn loop_settings(&self) -> crate::cycle::LoopSettings {
        crate::cycle::LoopSettings {
            seed: self.runtime.seed,
            veto_risk: self.safety.veto_risk,
            recall: crate::memory::RecallParams {
                k: self.memory.recall_k,
                alpha: self.memory.alpha,
                keyword_ceiling: self.memory.keyword_ceiling,
            },
            embed_timeout: self.embedding.timeout(),
            curate_every: self.runtime.curate_every,
            config_hash: self.fingerprint(),
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    /// Resolve the vector index path, expanding `~` if needed.
    pub fn resolved_index_path(&self) -> PathBuf {
        expand_tilde(&self.storage.index_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = MindloopConfig::default();
        assert_eq!(config.runtime.log_level, "info");
        assert_eq!(config.memory.recall_k, 8);
        assert!((config.memory.alpha - 0.7).abs() < 1e-12);
        assert!((config.safety.veto_risk - 0.6).abs() < 1e-12);
        assert_eq!(config.debate.rounds, 3);
        assert!(config.storage.db_path.ends_with("meta.sqlite3"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[runtime]
log_level = "debug"
cycles = 3

[storage]
db_path = "/tmp/test.sqlite3"
index_path = "/tmp/test.idx"

[memory]
alpha = 0.5
"#;
        let config: MindloopConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.runtime.log_level, "debug");
        assert_eq!(config.runtime.cycles, 3);
        assert_eq!(config.storage.db_path, "/tmp/test.sqlite3");
        assert!((config.memory.alpha - 0.5).abs() < 1e-12);
        // defaults still apply for unset fields
        assert_eq!(config.memory.keyword_ceiling, 200);
        assert_eq!(config.judges.backend, "stub");
    }

    #[test]
    fn zero_rounds_is_a_config_error() {
        let mut config = MindloopConfig::default();
        config.debate.rounds = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn out_of_range_alpha_and_veto_are_rejected() {
        let mut config = MindloopConfig::default();
        config.memory.alpha = 1.5;
        assert!(config.validate().is_err());

        let mut config = MindloopConfig::default();
        config.safety.veto_risk = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_store_path_is_rejected() {
        let mut config = MindloopConfig::default();
        config.storage.index_path = "  ".into();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn fingerprint_tracks_settings() {
        let a = MindloopConfig::default();
        let mut b = MindloopConfig::default();
        assert_eq!(a.fingerprint(), b.fingerprint());
        let digest = a.fingerprint().unwrap();
        assert_eq!(digest.len(), 16);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        b.safety.veto_risk = 0.5;
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(b.loop_settings().config_hash, b.fingerprint());
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = MindloopConfig::default();
        std::env::set_var("MINDLOOP_DB", "/tmp/override.sqlite3");
        std::env::set_var("MINDLOOP_INDEX", "/tmp/override.idx");
        std::env::set_var("MINDLOOP_LOG_LEVEL", "trace");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "/tmp/override.sqlite3");
        assert_eq!(config.storage.index_path, "/tmp/override.idx");
        assert_eq!(config.runtime.log_level, "trace");

        std::env::remove_var("MINDLOOP_DB");
        std::env::remove_var("MINDLOOP_INDEX");
        std::env::remove_var("MINDLOOP_LOG_LEVEL");
    }
}
