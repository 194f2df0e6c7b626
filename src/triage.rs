//! LLM-backed urgency triage.
//!
//! Sends the patient's free-text visit reason to a local Ollama model
//! and expects a JSON object `{"urgency": n}` with n in 1–10. The
//! classifier is an optional collaborator: on timeout, connection
//! failure, bad JSON, or when disabled, registration proceeds with
//! [`DEFAULT_URGENCY`]. It never blocks registration beyond the
//! configured timeout and never returns an error.

use serde::{Deserialize, Serialize};

use crate::config::Settings;

/// Fallback when the classifier is unavailable or unparseable.
pub const DEFAULT_URGENCY: i64 = 5;

const SYSTEM_PROMPT: &str = "You are a medical triage assistant. You output only valid JSON.";

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    system: &'a str,
    stream: bool,
    format: &'a str,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct UrgencyVerdict {
    urgency: i64,
}

/// Ollama HTTP client rating visit reasons on a 1–10 urgency scale.
pub struct UrgencyClassifier {
    client: reqwest::Client,
    base_url: String,
    model: String,
    enabled: bool,
}

impl UrgencyClassifier {
    pub fn new(settings: &Settings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(settings.triage_timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: settings.ollama_url.trim_end_matches('/').to_string(),
            model: settings.triage_model.clone(),
            enabled: settings.triage_enabled,
        }
    }

    /// A classifier that always answers [`DEFAULT_URGENCY`] (tests,
    /// deployments without a model).
    pub fn disabled() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: String::new(),
            model: String::new(),
            enabled: false,
        }
    }

    /// Rate a visit reason. Infallible by design: any failure downgrades
    /// to the default with a warning.
    pub async fn classify(&self, reason: &str) -> i64 {
        if !self.enabled {
            return DEFAULT_URGENCY;
        }
        match self.try_classify(reason).await {
            Ok(urgency) => urgency.clamp(1, 10),
            Err(e) => {
                tracing::warn!(error = %e, "Urgency triage failed, using default");
                DEFAULT_URGENCY
            }
        }
    }

    async fn try_classify(&self, reason: &str) -> Result<i64, String> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model: &self.model,
            prompt: triage_prompt(reason),
            system: SYSTEM_PROMPT,
            stream: false,
            format: "json",
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    "request timed out".to_string()
                } else if e.is_connect() {
                    format!("cannot reach {}", self.base_url)
                } else {
                    e.to_string()
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("model server returned {status}"));
        }

        let generated: OllamaGenerateResponse =
            response.json().await.map_err(|e| e.to_string())?;
        let verdict: UrgencyVerdict = serde_json::from_str(generated.response.trim())
            .map_err(|e| format!("unparseable verdict: {e}"))?;
        Ok(verdict.urgency)
    }
}

fn triage_prompt(reason: &str) -> String {
    format!(
        "Evaluate the following patient's reason for visit and determine its \
         medical urgency on a scale of 1 to 10.\n\
         1 means mild/routine (e.g., general checkup, mild cold).\n\
         5 means moderate (e.g., flu symptoms, minor cuts).\n\
         10 means severe/emergency (e.g., severe chest pain, heavy bleeding, \
         difficulty breathing).\n\n\
         Patient Reason: \"{reason}\"\n\n\
         Respond ONLY with a raw JSON object with a single key \"urgency\" \
         containing the integer score. Example: {{\"urgency\": 8}}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_classifier_answers_default() {
        let classifier = UrgencyClassifier::disabled();
        assert_eq!(classifier.classify("severe chest pain").await, DEFAULT_URGENCY);
    }

    #[tokio::test]
    async fn unreachable_server_falls_back_to_default() {
        let settings = Settings {
            ollama_url: "http://127.0.0.1:1".into(),
            triage_enabled: true,
            triage_timeout: std::time::Duration::from_millis(500),
            ..Settings::from_env()
        };
        let classifier = UrgencyClassifier::new(&settings);
        assert_eq!(classifier.classify("fever").await, DEFAULT_URGENCY);
    }

    #[test]
    fn prompt_embeds_reason() {
        let prompt = triage_prompt("broken arm");
        assert!(prompt.contains("broken arm"));
        assert!(prompt.contains("urgency"));
    }

    #[test]
    fn verdict_parses_and_clamps_shape() {
        let verdict: UrgencyVerdict = serde_json::from_str(r#"{"urgency": 8}"#).unwrap();
        assert_eq!(verdict.urgency, 8);
    }
}
