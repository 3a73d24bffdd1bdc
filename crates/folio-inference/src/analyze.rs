//! Ollama generation-model analysis backend.
//!
//! Produces themes, tags, and a sentiment breakdown for one transcribed
//! entry. The model is asked for strict JSON via the chat API's format
//! option; the raw payload is then validated and clamped before it becomes
//! an [`AnalysisResult`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use folio_core::defaults::{MAX_ANALYSIS_TAGS, MAX_ANALYSIS_THEMES};
use folio_core::{AnalysisResult, Analyzer, Error, Result, Sentiment, Theme};

use crate::config::InferenceConfig;

const ANALYSIS_SYSTEM_PROMPT: &str = "You are a JSON generator. Analyze journal text and return \
structured data. Keep theme descriptions brief and tags concise.";

/// Ollama-based analyzer.
pub struct OllamaAnalyzer {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    format: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    think: Option<bool>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

/// Loosely-typed model output, firmed up by [`OllamaAnalyzer::validate`].
#[derive(Debug, Default, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    themes: Vec<RawTheme>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    sentiment: Option<RawSentiment>,
}

#[derive(Debug, Deserialize)]
struct RawTheme {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    confidence: i64,
}

#[derive(Debug, Deserialize)]
struct RawSentiment {
    #[serde(default)]
    positive: i64,
    #[serde(default)]
    neutral: i64,
    #[serde(default)]
    concern: i64,
    #[serde(default)]
    overall: String,
}

impl OllamaAnalyzer {
    /// Create an analyzer from configuration.
    pub fn new(config: &InferenceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            model: config.analysis_model.clone(),
            timeout_secs: config.analyze_timeout_secs,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> Self {
        Self::new(&InferenceConfig::from_env())
    }

    fn user_prompt(text: &str) -> String {
        format!(
            "Transcript: {}\n\nReturn {{ \"themes\": [{{\"title\", \"description\", \
             \"confidence\" 0-100}}, at most {}], \"tags\": [at most {}], \
             \"sentiment\": {{\"positive\", \"neutral\", \"concern\" summing to 100, \
             \"overall\"}} }}",
            text, MAX_ANALYSIS_THEMES, MAX_ANALYSIS_TAGS
        )
    }

    /// Clamp and normalize raw model output into an AnalysisResult.
    fn validate(raw: RawAnalysis) -> AnalysisResult {
        let themes = raw
            .themes
            .into_iter()
            .filter(|t| !t.title.trim().is_empty())
            .take(MAX_ANALYSIS_THEMES)
            .map(|t| Theme {
                title: t.title.trim().to_string(),
                description: t.description.trim().to_string(),
                confidence: t.confidence.clamp(0, 100) as i32,
            })
            .collect();

        let tags = raw
            .tags
            .into_iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .take(MAX_ANALYSIS_TAGS)
            .collect();

        let sentiment = match raw.sentiment {
            Some(s) => Self::normalize_sentiment(s),
            None => Sentiment::neutral(),
        };

        AnalysisResult {
            themes,
            tags,
            sentiment,
        }
    }

    /// Force the breakdown to sum to exactly 100, rounding drift onto the
    /// neutral bucket.
    fn normalize_sentiment(raw: RawSentiment) -> Sentiment {
        let positive = raw.positive.clamp(0, 100) as i32;
        let neutral = raw.neutral.clamp(0, 100) as i32;
        let concern = raw.concern.clamp(0, 100) as i32;
        let sum = positive + neutral + concern;

        if sum == 0 {
            return Sentiment::neutral();
        }

        let positive = positive * 100 / sum;
        let concern = concern * 100 / sum;
        let neutral = 100 - positive - concern;

        let overall = if raw.overall.trim().is_empty() {
            let max = positive.max(neutral).max(concern);
            if max == positive {
                "positive".to_string()
            } else if max == concern {
                "concern".to_string()
            } else {
                "neutral".to_string()
            }
        } else {
            raw.overall.trim().to_lowercase()
        };

        Sentiment {
            positive,
            neutral,
            concern,
            overall,
        }
    }
}

#[async_trait]
impl Analyzer for OllamaAnalyzer {
    async fn analyze(&self, text: &str) -> Result<AnalysisResult> {
        let start = Instant::now();

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: ANALYSIS_SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Self::user_prompt(text),
                },
            ],
            stream: false,
            format: serde_json::Value::String("json".to_string()),
            // Thinking models leak reasoning into /api/generate output; the
            // chat API with think=false keeps the payload parseable.
            think: Some(false),
        };

        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .timeout(Duration::from_secs(self.timeout_secs))
            .send()
            .await
            .map_err(|e| Error::Analysis(format!("analysis request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Analysis(format!(
                "analysis API returned {}: {}",
                status, body
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Analysis(format!("failed to parse chat response: {}", e)))?;

        let raw: RawAnalysis = serde_json::from_str(&chat.message.content).map_err(|e| {
            warn!(
                subsystem = "inference",
                component = "analyze",
                model = %self.model,
                error = %e,
                "Model returned non-JSON analysis payload"
            );
            Error::Analysis(format!("model returned invalid JSON: {}", e))
        })?;

        let result = Self::validate(raw);
        debug!(
            subsystem = "inference",
            component = "analyze",
            model = %self.model,
            theme_count = result.themes.len(),
            tag_count = result.tags.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Analysis complete"
        );
        Ok(result)
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
    fn test_validate_clamps_and_truncates() {
        let raw = RawAnalysis {
            themes: (0..6)
                .map(|i| RawTheme {
                    title: format!("theme {}", i),
                    description: "desc".to_string(),
                    confidence: 150,
                })
                .collect(),
            tags: (0..9).map(|i| format!("Tag{}", i)).collect(),
            sentiment: Some(RawSentiment {
                positive: 60,
                neutral: 30,
                concern: 10,
                overall: "Positive".to_string(),
            }),
        };

        let result = OllamaAnalyzer::validate(raw);
        assert_eq!(result.themes.len(), MAX_ANALYSIS_THEMES);
        assert!(result.themes.iter().all(|t| t.confidence == 100));
        assert_eq!(result.tags.len(), MAX_ANALYSIS_TAGS);
        assert!(result.tags.iter().all(|t| t.starts_with("tag")));
        assert_eq!(result.sentiment.overall, "positive");
    }

    #[test]
    fn test_validate_drops_untitled_themes() {
        let raw = RawAnalysis {
            themes: vec![
                RawTheme {
                    title: "  ".to_string(),
                    description: "x".to_string(),
                    confidence: 50,
                },
                RawTheme {
                    title: "Real theme".to_string(),
                    description: "x".to_string(),
                    confidence: 50,
                },
            ],
            tags: vec![],
            sentiment: None,
        };

        let result = OllamaAnalyzer::validate(raw);
        assert_eq!(result.themes.len(), 1);
        assert_eq!(result.themes[0].title, "Real theme");
        assert_eq!(result.sentiment, Sentiment::neutral());
    }

    #[test]
    fn test_normalize_sentiment_rescales_to_100() {
        let s = OllamaAnalyzer::normalize_sentiment(RawSentiment {
            positive: 50,
            neutral: 50,
            concern: 50,
            overall: String::new(),
        });
        assert_eq!(s.positive + s.neutral + s.concern, 100);
    }

    #[test]
    fn test_normalize_sentiment_zero_sum_falls_back_to_neutral() {
        let s = OllamaAnalyzer::normalize_sentiment(RawSentiment {
            positive: 0,
            neutral: 0,
            concern: 0,
            overall: String::new(),
        });
        assert_eq!(s, Sentiment::neutral());
    }

    #[test]
    fn test_normalize_sentiment_infers_overall_label() {
        let s = OllamaAnalyzer::normalize_sentiment(RawSentiment {
            positive: 10,
            neutral: 20,
            concern: 70,
            overall: String::new(),
        });
        assert_eq!(s.overall, "concern");
    }

    #[test]
    fn test_raw_analysis_parses_partial_payload() {
        // Missing fields default instead of failing the whole analysis.
        let raw: RawAnalysis =
            serde_json::from_str(r#"{"tags": ["run", "morning"]}"#).unwrap();
        assert!(raw.themes.is_empty());
        assert_eq!(raw.tags.len(), 2);
        assert!(raw.sentiment.is_none());
    }

    #[test]
    fn test_user_prompt_mentions_limits() {
        let prompt = OllamaAnalyzer::user_prompt("went running");
        assert!(prompt.contains("went running"));
        assert!(prompt.contains(&MAX_ANALYSIS_THEMES.to_string()));
        assert!(prompt.contains(&MAX_ANALYSIS_TAGS.to_string()));
    }
}
