use serde::Deserialize;
use tracing::debug;

use crate::analysis::{AiAnalysis, AnalysisProvider};
use crate::error::{Error, Result};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Structured-output client for the Gemini REST API. One `generateContent`
/// request per title, constrained to a fixed JSON schema so the response
/// text parses straight into `AiAnalysis`.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

#[derive(Deserialize, Default)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Default)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize, Default)]
struct Part {
    #[serde(default)]
    text: String,
}

impl GenerateContentResponse {
    fn text(&self) -> &str {
        self.candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .unwrap_or("")
    }
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("zenith/0.1")
                .build()
                .expect("Failed to create HTTP client"),
            api_key,
            model,
        }
    }
}

#[async_trait::async_trait]
impl AnalysisProvider for GeminiClient {
    async fn analyze(&self, title: &str) -> Result<AiAnalysis> {
        let url = format!("{}/{}:generateContent", GEMINI_API_BASE, self.model);

        let prompt = format!(
            "Analyze the anime titled \"{}\". Provide a short summary, \
             3 reasons why someone should watch it, and an expert rating out of 10.",
            title
        );

        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "summary": {
                            "type": "STRING",
                            "description": "A 2-sentence summary of the plot."
                        },
                        "whyWatch": {
                            "type": "STRING",
                            "description": "Bullet points of why to watch."
                        },
                        "rating": {
                            "type": "STRING",
                            "description": "Numerical rating like 8.5/10."
                        }
                    },
                    "required": ["summary", "whyWatch", "rating"]
                }
            }
        });

        debug!(model = %self.model, title, "Requesting analysis");

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Analysis(format!(
                "Gemini API error: {}",
                response.status()
            )));
        }

        let resp: GenerateContentResponse = response.json().await?;
        Ok(AiAnalysis::from_model_text(resp.text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_text_reads_first_part() {
        let resp: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "{\"summary\": \"Plot.\"}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(resp.text(), r#"{"summary": "Plot."}"#);

        let analysis = AiAnalysis::from_model_text(resp.text());
        assert_eq!(analysis.summary, "Plot.");
    }

    #[test]
    fn empty_response_yields_empty_text() {
        let resp: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(resp.text(), "");
        assert!(AiAnalysis::from_model_text(resp.text()).is_empty());
    }
}
