// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";

fn default_daily_limit() -> u32 {
    20
}
fn default_max_tokens() -> u32 {
    4000
}

/// One OpenAI-compatible chat-completions endpoint in the fallback chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// "groq" | "openrouter" | "openai" | anything else with a compatible API
    pub name: String,
    /// e.g. "https://api.groq.com/openai/v1"
    pub base_url: String,
    pub model: String,
    /// "ENV" means: read from `<NAME>_API_KEY`. May hold several comma-separated keys.
    #[serde(default)]
    pub api_key: String,
    /// Resolved keys, filled by `load_from_file`.
    #[serde(skip)]
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub enabled: bool,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    /// Real calls allowed per UTC day. Over the limit the gate fails open.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            providers: Vec::new(),
            daily_limit: default_daily_limit(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl AiConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> anyhow::Result<Self> {
        let mut cfg: AiConfig = serde_json::from_str(data)?;

        for p in &mut cfg.providers {
            p.name = p.name.trim().to_lowercase();
            p.base_url = p.base_url.trim().trim_end_matches('/').to_string();

            // Resolve api key if "ENV"; a missing env var just leaves the provider keyless.
            let raw = if p.api_key.trim().eq_ignore_ascii_case("env") {
                let var = format!("{}_API_KEY", p.name.to_uppercase().replace('-', "_"));
                env::var(var).unwrap_or_default()
            } else {
                p.api_key.clone()
            };
            p.keys = split_keys(&raw);
        }

        if cfg.daily_limit == 0 {
            cfg.daily_limit = default_daily_limit();
        }

        Ok(cfg)
    }

    /// Load `config/ai.json`; a missing or broken file means AI is disabled.
    pub fn load_default() -> Self {
        match Self::load_from_file(DEFAULT_AI_CONFIG_PATH) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::debug!(error = %e, "no usable AI config, validator disabled");
                Self::default()
            }
        }
    }

    pub fn has_keys(&self) -> bool {
        self.providers.iter().any(|p| !p.keys.is_empty())
    }
}

/// "k1, k2,,k3" → ["k1", "k2", "k3"]
pub fn split_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}
