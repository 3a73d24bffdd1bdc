//! Ollama vision-model text extraction backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use folio_core::{defaults, Error, ExtractedText, Result, TextExtractor};

use crate::config::InferenceConfig;

/// Prompt steering the vision model into verbatim transcription.
const EXTRACTION_PROMPT: &str = "You are a transcription system. Extract all text from this \
handwritten journal page exactly as written, preserving line breaks. Return only the extracted \
text, with no commentary. If the page contains no readable text, return an empty response.";

/// Ollama-based text extractor (e.g., qwen3-vl, llava).
pub struct OllamaTextExtractor {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    images: Vec<String>, // base64 encoded
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaTextExtractor {
    /// Create an extractor from configuration.
    pub fn new(config: &InferenceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            model: config.vision_model.clone(),
            timeout_secs: config.extract_timeout_secs,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> Self {
        Self::new(&InferenceConfig::from_env())
    }
}

#[async_trait]
impl TextExtractor for OllamaTextExtractor {
    async fn extract(&self, image: &[u8]) -> Result<ExtractedText> {
        use base64::Engine;
        let start = Instant::now();
        let image_b64 = base64::engine::general_purpose::STANDARD.encode(image);

        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: EXTRACTION_PROMPT.to_string(),
            images: vec![image_b64],
            stream: false,
        };

        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .timeout(Duration::from_secs(self.timeout_secs))
            .send()
            .await
            .map_err(|e| Error::Extraction(format!("vision request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Extraction(format!(
                "vision API returned {}: {}",
                status, body
            )));
        }

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Extraction(format!("failed to parse vision response: {}", e)))?;

        let text = result.response.trim().to_string();
        debug!(
            subsystem = "inference",
            component = "extract",
            model = %self.model,
            text_len = text.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Extraction response received"
        );

        // Vision LLMs expose no per-word confidence; a fixed high value
        // stands in.
        Ok(ExtractedText {
            text,
            confidence: defaults::VISION_EXTRACTION_CONFIDENCE,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extractor_construction() {
        let config = InferenceConfig::default().with_vision_model("llava");
        let extractor = OllamaTextExtractor::new(&config);
        assert_eq!(extractor.name(), "llava");
        assert_eq!(extractor.base_url, defaults::OLLAMA_URL);
        assert_eq!(extractor.timeout_secs, defaults::EXTRACT_TIMEOUT_SECS);
    }

    #[test]
    fn test_generate_request_serialization() {
        let req = GenerateRequest {
            model: "llava".to_string(),
            prompt: "extract".to_string(),
            images: vec!["aGVsbG8=".to_string()],
            stream: false,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["model"], "llava");
        assert_eq!(json["stream"], false);
        assert_eq!(json["images"][0], "aGVsbG8=");
    }

    #[cfg(feature = "integration")]
    #[tokio::test]
    async fn test_live_health_check() {
        let extractor = OllamaTextExtractor::from_env();
        assert!(extractor.health_check().await.unwrap());
    }
}
