use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod gemini;

pub use gemini::GeminiClient;

/// AI-generated synopsis for a title. Produced once per selection and never
/// persisted. A default (all-empty) value is the degraded result for
/// malformed model output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiAnalysis {
    #[serde(default)]
    pub summary: String,
    #[serde(default, rename = "whyWatch")]
    pub why_watch: String,
    #[serde(default)]
    pub rating: String,
}

impl AiAnalysis {
    /// Parse the model's text output. Anything that is not the expected
    /// JSON object degrades to the empty analysis rather than an error.
    pub fn from_model_text(text: &str) -> Self {
        serde_json::from_str(text).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.summary.is_empty() && self.why_watch.is_empty() && self.rating.is_empty()
    }
}

#[async_trait::async_trait]
pub trait AnalysisProvider {
    async fn analyze(&self, title: &str) -> Result<AiAnalysis>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_output() {
        let text = r#"{"summary": "A ninja story.", "whyWatch": "- Fights\n- Lore\n- Music", "rating": "8.5/10"}"#;
        let analysis = AiAnalysis::from_model_text(text);
        assert_eq!(analysis.summary, "A ninja story.");
        assert_eq!(analysis.rating, "8.5/10");
        assert!(!analysis.is_empty());
    }

    #[test]
    fn malformed_output_degrades_to_empty() {
        for text in ["", "not json", "[1, 2]", r#"{"summary": 42}"#] {
            let analysis = AiAnalysis::from_model_text(text);
            assert!(analysis.is_empty());
        }
    }

    #[test]
    fn partial_output_keeps_present_fields() {
        let analysis = AiAnalysis::from_model_text(r#"{"summary": "Plot."}"#);
        assert_eq!(analysis.summary, "Plot.");
        assert!(analysis.why_watch.is_empty());
        assert!(!analysis.is_empty());
    }
}
