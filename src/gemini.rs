//! Minimal Google Gemini client (`models/{model}:generateContent`) returning JSON text.

use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::errors::{GatewayError, GatewayResult};

#[derive(Clone)]
pub struct Gemini {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

impl Gemini {
  /// Construct the client if we find GEMINI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url = std::env::var("GEMINI_BASE_URL")
      .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".into());
    let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, model })
  }

  /// Single-shot generation with `responseMimeType: application/json`.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model))]
  pub async fn generate_json(&self, system: &str, user: &str, temperature: f32) -> GatewayResult<String> {
    let url = format!(
      "{}/v1beta/models/{}:generateContent",
      self.base_url.trim_end_matches('/'),
      self.model
    );
    let body = json!({
      "systemInstruction": { "parts": [{ "text": system }] },
      "contents": [{ "role": "user", "parts": [{ "text": user }] }],
      "generationConfig": {
        "responseMimeType": "application/json",
        "temperature": temperature,
      }
    });

    let start = Instant::now();
    let resp = self
      .client
      .post(&url)
      .header("x-goog-api-key", &self.api_key)
      .json(&body)
      .send()
      .await?;

    let status = resp.status();
    if !status.is_success() {
      let error_body = resp
        .text()
        .await
        .unwrap_or_else(|_| "Could not read error body".to_string());
      return Err(GatewayError::ApiError { status: status.as_u16(), body: error_body });
    }

    let response_json: Value = resp.json().await?;
    let text = extract_text(&response_json)?;
    info!(elapsed = ?start.elapsed(), bytes = text.len(), "Gemini response received");
    Ok(text)
  }
}

fn extract_text(response_json: &Value) -> GatewayResult<String> {
  if let Some(error) = response_json.get("error") {
    return Err(GatewayError::UnexpectedResponse(error.to_string()));
  }

  let output = response_json
    .get("candidates")
    .and_then(|c| c.get(0))
    .and_then(|c| c.get("content"))
    .and_then(|c| c.get("parts"))
    .and_then(|p| p.get(0))
    .and_then(|p| p.get("text"))
    .and_then(|t| t.as_str())
    .ok_or_else(|| GatewayError::UnexpectedResponse(crate::util::trunc_for_log(&response_json.to_string(), 200)))?;

  if output.trim().is_empty() {
    return Err(GatewayError::EmptyResponse);
  }
  Ok(output.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn extracts_first_candidate_text() {
    let v = json!({ "candidates": [{ "content": { "parts": [{ "text": "{\"score\":3}" }] } }] });
    assert_eq!(extract_text(&v).unwrap(), "{\"score\":3}");
  }

  #[test]
  fn error_and_empty_payloads_are_rejected() {
    let err = json!({ "error": { "code": 429, "message": "quota" } });
    assert!(matches!(extract_text(&err), Err(GatewayError::UnexpectedResponse(_))));

    let empty = json!({ "candidates": [{ "content": { "parts": [{ "text": "  " }] } }] });
    assert!(matches!(extract_text(&empty), Err(GatewayError::EmptyResponse)));

    assert!(extract_text(&json!({ "candidates": [] })).is_err());
  }
}
