use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::credential::{ApiKey, OpenAiSettings};
use crate::error::EscalationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub history: Vec<HistoryMessage>,
    pub user_message: String,
}

#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    api_key: ApiKey,
    model: String,
    endpoint: String,
    temperature: f32,
}

impl OpenAiClient {
    pub fn new(settings: &OpenAiSettings, api_key: ApiKey) -> Result<Self, EscalationError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_key,
            model: settings.model.clone(),
            endpoint: format!("{}/v1/responses", settings.base_url.trim_end_matches('/')),
            temperature: settings.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn complete(&self, request: &CompletionRequest) -> Result<String, EscalationError> {
        let payload = build_payload(&self.model, self.temperature, request);

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(EscalationError::Rejected(status.as_u16()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EscalationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|error| EscalationError::Decode(error.to_string()))?;

        extract_output_text(&body)
            .filter(|value| !value.trim().is_empty())
            .ok_or(EscalationError::EmptyOutput)
    }
}

pub fn build_payload(model: &str, temperature: f32, request: &CompletionRequest) -> serde_json::Value {
    let mut input = Vec::with_capacity(request.history.len() + 2);
    input.push(serde_json::json!({
        "role": "system",
        "content": request.system_prompt,
    }));
    for message in &request.history {
        input.push(serde_json::json!({
            "role": message.role,
            "content": message.text,
        }));
    }
    input.push(serde_json::json!({
        "role": "user",
        "content": request.user_message,
    }));

    serde_json::json!({
        "model": model,
        "temperature": temperature,
        "input": input,
    })
}

pub fn extract_output_text(payload: &serde_json::Value) -> Option<String> {
    if let Some(value) = payload.get("output_text").and_then(|value| value.as_str()) {
        return Some(value.to_string());
    }

    let chunks = payload
        .get("output")?
        .as_array()?
        .iter()
        .filter_map(|item| item.get("content").and_then(|value| value.as_array()))
        .flatten()
        .filter(|content| content.get("type").and_then(|value| value.as_str()) == Some("output_text"))
        .filter_map(|content| content.get("text").and_then(|value| value.as_str()))
        .map(ToString::to_string)
        .collect::<Vec<_>>();

    if chunks.is_empty() {
        None
    } else {
        Some(chunks.join("\n\n"))
    }
}
