// src/services/llm_service.rs
use crate::config::Config;
use crate::errors::ZenError;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Instant;

/// Media attached inline to a request.
#[derive(Debug, Clone)]
pub struct InlineData {
    pub mime_type: &'static str,
    pub data: Vec<u8>,
}

/// A schema-constrained generation request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub system_instruction: Option<String>,
    pub prompt: String,
    pub inline: Option<InlineData>,
    pub schema: Value,
}

/// The hosted model, seen as two opaque calls.
#[async_trait]
pub trait InferenceEndpoint: Send + Sync {
    /// Returns the JSON text of the reply, unvalidated.
    async fn generate_json(&self, request: &GenerateRequest) -> Result<String, ZenError>;

    /// Returns base64-encoded 16-bit PCM speech for `text`.
    async fn synthesize_speech(&self, text: &str) -> Result<String, ZenError>;
}

pub struct LLMService {
    api_key: String,
    base_url: String,
    model: String,
    tts_model: String,
    voice: String,
    client: Client,
}

impl LLMService {
    pub fn new(config: &Config) -> Result<Self, ZenError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ZenError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            tts_model: config.tts_model.clone(),
            voice: config.voice.clone(),
            client,
        })
    }

    async fn post(&self, model: &str, body: &Value) -> Result<Value, ZenError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ZenError::Endpoint(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ZenError::Endpoint(format!(
                "Gemini error ({}): {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ZenError::Endpoint(format!("Failed to parse Gemini response: {}", e)))
    }
}

#[async_trait]
impl InferenceEndpoint for LLMService {
    async fn generate_json(&self, request: &GenerateRequest) -> Result<String, ZenError> {
        let start = Instant::now();
        let result = self.post(&self.model, &generate_body(request)).await?;
        log::debug!(
            "Gemini {} replied in {}ms",
            self.model,
            start.elapsed().as_millis()
        );
        reply_text(&result)
    }

    async fn synthesize_speech(&self, text: &str) -> Result<String, ZenError> {
        let result = self
            .post(&self.tts_model, &speech_body(text, &self.voice))
            .await?;
        reply_audio(&result)
    }
}

fn generate_body(request: &GenerateRequest) -> Value {
    let mut parts = Vec::new();
    if let Some(inline) = &request.inline {
        parts.push(json!({
            "inlineData": {
                "mimeType": inline.mime_type,
                "data": general_purpose::STANDARD.encode(&inline.data)
            }
        }));
    }
    parts.push(json!({ "text": request.prompt }));

    let mut body = json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": request.schema
        }
    });

    if let Some(instruction) = &request.system_instruction {
        body["systemInstruction"] = json!({ "parts": [{ "text": instruction }] });
    }

    body
}

fn speech_body(text: &str, voice: &str) -> Value {
    json!({
        "contents": [{ "role": "user", "parts": [{ "text": text }] }],
        "generationConfig": {
            "responseModalities": ["AUDIO"],
            "speechConfig": {
                "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": voice } }
            }
        }
    })
}

fn reply_text(result: &Value) -> Result<String, ZenError> {
    let parts = result["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| ZenError::Schema("No content in Gemini response".to_string()))?;

    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    if text.trim().is_empty() {
        return Err(ZenError::Schema("Gemini returned an empty reply".to_string()));
    }
    Ok(text)
}

fn reply_audio(result: &Value) -> Result<String, ZenError> {
    result["candidates"][0]["content"]["parts"][0]["inlineData"]["data"]
        .as_str()
        .filter(|data| !data.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ZenError::Endpoint("No audio generated".to_string()))
}
