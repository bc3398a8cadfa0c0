use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub generation: GenerationConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub model: String,
    pub endpoint: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// TrueType font embedded in PDF exports. Must cover Hangul.
    pub font_path: PathBuf,
    pub font_size: f32,
    pub output_dir: PathBuf,
    pub report_label: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            font_path: PathBuf::from("NanumGothic.ttf"),
            font_size: 12.0,
            output_dir: PathBuf::from("."),
            report_label: "자율활동세특".to_string(),
        }
    }
}

impl AppConfig {
    /// Reads a TOML config file, or returns defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn api_key(&self) -> anyhow::Result<String> {
        std::env::var(&self.generation.api_key_env).with_context(|| {
            format!(
                "{} must be set to an API key for the text-generation service",
                self.generation.api_key_env
            )
        })
    }
}
