use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

pub const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";
pub const GEMINI_TEXT_MODEL: &str = "gemini-2.5-pro";

/// Text generation backend.
///
/// `Ok(None)` means the provider answered but produced no text. Callers treat
/// that as a soft failure, distinct from a transport or API error.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Option<String>>;

    fn model_version(&self) -> &str;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Content {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InlineData {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Candidate {
    pub content: Option<Content>,
}

impl GenerateResponse {
    pub(crate) fn into_parts(self) -> Vec<Part> {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts)
            .unwrap_or_default()
    }
}

pub(crate) fn user_content(text: String) -> Content {
    Content {
        role: Some("user".to_string()),
        parts: vec![Part {
            text: Some(text),
            inline_data: None,
        }],
    }
}

/// Shared plumbing for calls against the Gemini `generateContent` endpoint.
pub(crate) struct GeminiHttp {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiHttp {
    pub(crate) fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub(crate) async fn generate_content(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> std::result::Result<GenerateResponse, String> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(format!("HTTP {}: {}", status, error_text));
        }

        response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| format!("malformed response: {}", e))
    }
}

pub struct GeminiTextGenerator {
    http: GeminiHttp,
    model: String,
}

impl GeminiTextGenerator {
    pub fn new(api_key: String, base_url: String, model: String) -> Result<Self> {
        let http = GeminiHttp::new(api_key, base_url, Duration::from_secs(120))?;
        Ok(Self { http, model })
    }
}

#[async_trait]
impl TextGenerator for GeminiTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<Option<String>> {
        let request = GenerateRequest {
            contents: vec![user_content(prompt.to_string())],
            generation_config: Some(serde_json::json!({ "responseMimeType": "text/plain" })),
        };

        let response = self
            .http
            .generate_content(&self.model, &request)
            .await
            .map_err(AppError::GenerationApi)?;

        let text = response
            .into_parts()
            .into_iter()
            .filter_map(|part| part.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(text))
    }

    fn model_version(&self) -> &str {
        &self.model
    }
}

/// Offline generator used when mock mode is configured.
pub struct FakeTextGenerator;

#[async_trait]
impl TextGenerator for FakeTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<Option<String>> {
        let urls: Vec<&str> = prompt
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with("http://") || line.starts_with("https://"))
            .collect();

        let text = if prompt.contains("Speaker1") {
            let mut script = String::from("Speaker1: Welcome to today's reading digest.\n");
            for (i, url) in urls.iter().enumerate() {
                script.push_str(&format!("Speaker2: Item {} comes from {}.\n", i + 1, url));
            }
            script.push_str("Speaker1: That's all for today.");
            script
        } else {
            format!("[mock summary] {}", urls.join(", "))
        };
        Ok(Some(text))
    }

    fn model_version(&self) -> &str {
        "mock"
    }
}
