use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;

use crate::ai::{user_content, GeminiHttp, GenerateRequest};
use crate::error::{AppError, Result};

use super::storage::{audio_object_key, AudioStorage};
use super::wav::encode_audio;

pub const GEMINI_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const SPEAKERS: [&str; 2] = ["Speaker1", "Speaker2"];

/// Text-to-speech backend.
///
/// Returns one storage locator per audio artifact produced. An empty list is
/// a valid, if degenerate, result.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, script: &str, identifier: &str, user_id: i64)
        -> Result<Vec<String>>;
}

pub struct GeminiSpeechSynthesizer {
    http: GeminiHttp,
    model: String,
    voices: [String; 2],
    storage: Arc<dyn AudioStorage>,
}

impl GeminiSpeechSynthesizer {
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        voices: [String; 2],
        storage: Arc<dyn AudioStorage>,
    ) -> Result<Self> {
        // Audio responses are large and slow; allow far more time than text.
        let http = GeminiHttp::new(api_key, base_url, Duration::from_secs(600))?;
        Ok(Self {
            http,
            model,
            voices,
            storage,
        })
    }

    fn request(&self, script: &str) -> GenerateRequest {
        let speaker_configs: Vec<_> = SPEAKERS
            .iter()
            .zip(self.voices.iter())
            .map(|(speaker, voice)| {
                json!({
                    "speaker": speaker,
                    "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": voice } }
                })
            })
            .collect();

        GenerateRequest {
            contents: vec![user_content(format!(
                "Read aloud in a warm, welcoming tone\n{}",
                script
            ))],
            generation_config: Some(json!({
                "temperature": 1,
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "multiSpeakerVoiceConfig": { "speakerVoiceConfigs": speaker_configs }
                }
            })),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for GeminiSpeechSynthesizer {
    async fn synthesize(
        &self,
        script: &str,
        identifier: &str,
        user_id: i64,
    ) -> Result<Vec<String>> {
        let response = self
            .http
            .generate_content(&self.model, &self.request(script))
            .await
            .map_err(AppError::SpeechApi)?;

        let mut locators = Vec::new();
        for part in response.into_parts() {
            let Some(inline) = part.inline_data else {
                if let Some(text) = part.text {
                    tracing::debug!("Speech response text part: {}", text);
                }
                continue;
            };

            let raw = BASE64.decode(inline.data.as_bytes())?;
            let audio = encode_audio(raw, &inline.mime_type)?;
            let key = audio_object_key(user_id, identifier, locators.len(), audio.extension);
            let locator = self.storage.put(&key, audio.bytes).await?;
            tracing::info!("Saved speech artifact {}", locator);
            locators.push(locator);
        }

        Ok(locators)
    }
}

/// Offline synthesizer: stores a short silent clip per call.
pub struct FakeSpeechSynthesizer {
    storage: Arc<dyn AudioStorage>,
}

impl FakeSpeechSynthesizer {
    const SILENT_SAMPLES: usize = 6_000;

    pub fn new(storage: Arc<dyn AudioStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeechSynthesizer {
    async fn synthesize(
        &self,
        script: &str,
        identifier: &str,
        user_id: i64,
    ) -> Result<Vec<String>> {
        tracing::debug!("Mock speech for {} characters of script", script.len());

        let silence = vec![0u8; Self::SILENT_SAMPLES * 2];
        let audio = encode_audio(silence, "audio/L16;codec=pcm;rate=24000")?;
        let key = audio_object_key(user_id, identifier, 0, audio.extension);
        let locator = self.storage.put(&key, audio.bytes).await?;
        Ok(vec![locator])
    }
}
