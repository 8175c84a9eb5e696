//! Gemini `generateContent` client.

use super::{ImageAttachment, LlmError, TextModel};
use crate::config::{GEMINI_MODEL, LLM_MAX_OUTPUT_TOKENS, LLM_TEMPERATURE, LLM_TIMEOUT_SECS};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client as HttpClient;
use serde_json::{json, Value};
use std::time::Duration;

/// Production `TextModel` backed by the Gemini REST API.
///
/// Owns its `reqwest` client; the key is passed per call so the dispatcher
/// can rotate credentials without rebuilding the client.
pub struct GeminiModel {
    http_client: HttpClient,
    model: &'static str,
}

impl GeminiModel {
    #[must_use]
    pub fn new() -> Self {
        let timeout = Duration::from_secs(LLM_TIMEOUT_SECS);
        Self {
            http_client: HttpClient::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| HttpClient::new()),
            model: GEMINI_MODEL,
        }
    }
}

impl Default for GeminiModel {
    fn default() -> Self {
        Self::new()
    }
}

fn build_body(system_prompt: &str, prompt: &str, image: Option<&ImageAttachment>) -> Value {
    let mut parts = vec![json!({ "text": prompt })];
    if let Some(image) = image {
        parts.push(json!({
            "inline_data": {
                "mime_type": image.mime_type,
                "data": BASE64.encode(&image.bytes)
            }
        }));
    }

    json!({
        "contents": [{ "role": "user", "parts": parts }],
        "system_instruction": { "parts": [{ "text": system_prompt }] },
        "generationConfig": {
            "temperature": LLM_TEMPERATURE,
            "maxOutputTokens": LLM_MAX_OUTPUT_TOKENS
        }
    })
}

/// Keeps provider error bodies readable in logs.
fn truncate_error(text: &str) -> String {
    if text.chars().count() > 500 {
        let prefix: String = text.chars().take(500).collect();
        format!("{prefix}... (truncated)")
    } else {
        text.to_string()
    }
}

#[async_trait]
impl TextModel for GeminiModel {
    async fn generate(
        &self,
        api_key: &str,
        system_prompt: &str,
        prompt: &str,
        image: Option<&ImageAttachment>,
    ) -> Result<String, LlmError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, api_key
        );

        let body = build_body(system_prompt, prompt, image);

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!(
                "Gemini API error: {status} - {}",
                truncate_error(&error_text)
            )));
        }

        let res_json: Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        res_json["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| {
                LlmError::InvalidResponse(
                    "missing candidates[0].content.parts[0].text".to_string(),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_text_only() {
        let body = build_body("системный промпт", "реши уравнение", None);
        assert_eq!(body["contents"][0]["parts"][0]["text"], "реши уравнение");
        assert_eq!(
            body["system_instruction"]["parts"][0]["text"],
            "системный промпт"
        );
        assert!(body["contents"][0]["parts"].get(1).is_none());
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 4096);
    }

    #[test]
    fn test_body_with_image() {
        let image = ImageAttachment {
            bytes: vec![0xFF, 0xD8, 0xFF],
            mime_type: "image/jpeg".to_string(),
        };
        let body = build_body("s", "реши задачу с фото", Some(&image));
        let inline = &body["contents"][0]["parts"][1]["inline_data"];
        assert_eq!(inline["mime_type"], "image/jpeg");
        assert_eq!(inline["data"], BASE64.encode([0xFF, 0xD8, 0xFF]));
    }

    #[test]
    fn test_truncate_error_long_body() {
        let long = "э".repeat(600);
        let truncated = truncate_error(&long);
        assert!(truncated.ends_with("(truncated)"));
        assert!(truncated.chars().count() < 520);
        assert_eq!(truncate_error("короткая ошибка"), "короткая ошибка");
    }
}
