//! Inference backend configuration.

use folio_core::defaults;
use tracing::info;

/// Configuration for the Ollama-backed collaborators.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `OLLAMA_BASE` / `OLLAMA_URL` | `http://127.0.0.1:11434` | Ollama endpoint |
/// | `FOLIO_VISION_MODEL` | `qwen3-vl:8b` | Vision model for page OCR |
/// | `FOLIO_ANALYSIS_MODEL` | `gpt-oss:20b` | Generation model for analysis |
/// | `FOLIO_EXTRACT_TIMEOUT_SECS` | `120` | Extraction request timeout |
/// | `FOLIO_ANALYZE_TIMEOUT_SECS` | `60` | Analysis request timeout |
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub base_url: String,
    pub vision_model: String,
    pub analysis_model: String,
    pub extract_timeout_secs: u64,
    pub analyze_timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::OLLAMA_URL.to_string(),
            vision_model: defaults::VISION_MODEL.to_string(),
            analysis_model: defaults::ANALYSIS_MODEL.to_string(),
            extract_timeout_secs: defaults::EXTRACT_TIMEOUT_SECS,
            analyze_timeout_secs: defaults::ANALYZE_TIMEOUT_SECS,
        }
    }
}

impl InferenceConfig {
    /// Create config from environment variables (with defaults).
    pub fn from_env() -> Self {
        let base_url = std::env::var("OLLAMA_BASE")
            .or_else(|_| std::env::var("OLLAMA_URL"))
            .unwrap_or_else(|_| defaults::OLLAMA_URL.to_string());

        let vision_model = std::env::var("FOLIO_VISION_MODEL")
            .unwrap_or_else(|_| defaults::VISION_MODEL.to_string());

        let analysis_model = std::env::var("FOLIO_ANALYSIS_MODEL")
            .unwrap_or_else(|_| defaults::ANALYSIS_MODEL.to_string());

        let extract_timeout_secs = std::env::var("FOLIO_EXTRACT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::EXTRACT_TIMEOUT_SECS);

        let analyze_timeout_secs = std::env::var("FOLIO_ANALYZE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::ANALYZE_TIMEOUT_SECS);

        let config = Self {
            base_url,
            vision_model,
            analysis_model,
            extract_timeout_secs,
            analyze_timeout_secs,
        };

        info!(
            subsystem = "inference",
            component = "config",
            base_url = %config.base_url,
            vision_model = %config.vision_model,
            analysis_model = %config.analysis_model,
            "Loaded inference configuration"
        );
        config
    }

    /// Set the vision model.
    pub fn with_vision_model(mut self, model: impl Into<String>) -> Self {
        self.vision_model = model.into();
        self
    }

    /// Set the analysis model.
    pub fn with_analysis_model(mut self, model: impl Into<String>) -> Self {
        self.analysis_model = model.into();
        self
    }

    /// Set the Ollama base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = InferenceConfig::default();
        assert_eq!(config.base_url, defaults::OLLAMA_URL);
        assert_eq!(config.vision_model, defaults::VISION_MODEL);
        assert_eq!(config.analysis_model, defaults::ANALYSIS_MODEL);
        assert_eq!(config.extract_timeout_secs, 120);
        assert_eq!(config.analyze_timeout_secs, 60);
    }

    #[test]
    fn test_builder_overrides() {
        let config = InferenceConfig::default()
            .with_base_url("http://gpu-box:11434")
            .with_vision_model("llava")
            .with_analysis_model("llama3");

        assert_eq!(config.base_url, "http://gpu-box:11434");
        assert_eq!(config.vision_model, "llava");
        assert_eq!(config.analysis_model, "llama3");
    }
}
