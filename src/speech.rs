//! Speech synthesis for tutor replies.
//!
//! Replies are reduced to speakable text, then sent to the Google Cloud
//! text-to-speech REST API with the persona's voice settings. Playback is
//! left to the caller; audio is returned as bytes or written to a file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::blackboard::ResponseParser;
use crate::config::TtsSettings;
use crate::error::{Error, Result, UpstreamKind};
use crate::persona::VoiceSettings;

const SERVICE: &str = "google-tts";

/// Largest pitch shift the API accepts, in semitones.
const MAX_SEMITONES: f32 = 20.0;

/// Reduce a raw reply to text suitable for speaking.
///
/// Blackboard markup and markdown emphasis are removed, heading markers are
/// dropped and whitespace is collapsed to single spaces.
pub fn speech_text(raw: &str, max_depth: usize) -> String {
    let plain = match ResponseParser::parse(raw, max_depth) {
        Ok(parsed) => parsed.plain_text,
        Err(_) => raw.to_string(),
    };

    let mut out = String::with_capacity(plain.len());
    for line in plain.lines() {
        let line = line.trim_start().trim_start_matches('#');
        let line = line.replace("**", "").replace("__", "");
        for word in line.split_whitespace() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(word);
        }
    }
    out
}

/// Convert a pitch multiplier (1.0 = unchanged) to semitones.
pub fn pitch_semitones(pitch: f32) -> f32 {
    if pitch <= 0.0 {
        return -MAX_SEMITONES;
    }
    (12.0 * pitch.log2()).clamp(-MAX_SEMITONES, MAX_SEMITONES)
}

/// File extension for an API audio encoding.
pub fn audio_extension(encoding: &str) -> &'static str {
    match encoding.to_ascii_uppercase().as_str() {
        "LINEAR16" => "wav",
        "OGG_OPUS" => "ogg",
        "MULAW" | "ALAW" => "wav",
        _ => "mp3",
    }
}

// ─────────────────────────────────────────────────────────────────
// Request/response types
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig<'a>,
}

#[derive(Debug, Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig<'a> {
    audio_encoding: &'a str,
    speaking_rate: f32,
    pitch: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

// ─────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────

pub struct SpeechClient {
    settings: TtsSettings,
    client: Client,
}

impl SpeechClient {
    pub fn new(settings: TtsSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(Error::upstream(
                SERVICE,
                UpstreamKind::Auth,
                None,
                "no API key configured",
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { settings, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/text:synthesize",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    fn request<'a>(&'a self, text: &'a str, voice: &VoiceSettings) -> SynthesizeRequest<'a> {
        SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: &self.settings.language_code,
                name: &self.settings.voice_name,
            },
            audio_config: AudioConfig {
                audio_encoding: &self.settings.audio_encoding,
                speaking_rate: voice.rate,
                pitch: pitch_semitones(voice.pitch),
            },
        }
    }

    /// Synthesize already-cleaned text; returns encoded audio bytes.
    pub async fn synthesize(&self, text: &str, voice: &VoiceSettings) -> Result<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(Error::validation("text", "nothing to speak"));
        }

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.settings.api_key.as_str())])
            .json(&self.request(text, voice))
            .send()
            .await
            .map_err(|e| Error::upstream(SERVICE, UpstreamKind::Network, None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let kind = match status.as_u16() {
                401 | 403 => UpstreamKind::Auth,
                429 => UpstreamKind::RateLimited,
                s if s >= 500 => UpstreamKind::Server,
                _ => UpstreamKind::InvalidResponse,
            };
            let message: String = body.chars().take(200).collect();
            return Err(Error::upstream(SERVICE, kind, Some(status.as_u16()), message));
        }

        let parsed: SynthesizeResponse = response.json().await.map_err(|e| {
            Error::upstream(SERVICE, UpstreamKind::InvalidResponse, None, e.to_string())
        })?;
        let audio = decode_audio(&parsed.audio_content)?;

        debug!(chars = text.len(), bytes = audio.len(), "Speech synthesized");
        Ok(audio)
    }

    /// Synthesize and write the audio under `dir`; returns the file path.
    pub async fn synthesize_to_file(
        &self,
        text: &str,
        voice: &VoiceSettings,
        dir: &Path,
    ) -> Result<PathBuf> {
        let audio = self.synthesize(text, voice).await?;

        std::fs::create_dir_all(dir).map_err(|e| Error::IoWrite {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = dir.join(format!(
            "{}.{}",
            Uuid::new_v4(),
            audio_extension(&self.settings.audio_encoding)
        ));
        std::fs::write(&path, &audio).map_err(|e| Error::IoWrite {
            path: path.clone(),
            source: e,
        })?;

        info!(path = %path.display(), bytes = audio.len(), "Audio saved");
        Ok(path)
    }
}

fn decode_audio(content: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(content.trim())
        .map_err(|e| {
            Error::upstream(
                SERVICE,
                UpstreamKind::InvalidResponse,
                None,
                format!("audio is not valid base64: {}", e),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speech_text_strips_markup() {
        let raw = "## Newton\n\n[red]**Force**[/red] equals   $m a$.\n[circle]Remember[/circle] it!";
        assert_eq!(speech_text(raw, 16), "Newton Force equals m a. Remember it!");
    }

    #[test]
    fn test_speech_text_keeps_unparseable_reply() {
        let raw = "[red]".repeat(3) + "deep";
        assert_eq!(speech_text(&raw, 2), raw);
    }

    #[test]
    fn test_pitch_semitones() {
        assert_eq!(pitch_semitones(1.0), 0.0);
        assert!((pitch_semitones(2.0) - 12.0).abs() < 1e-4);
        assert!((pitch_semitones(0.5) + 12.0).abs() < 1e-4);
        assert_eq!(pitch_semitones(0.0), -20.0);
    }

    #[test]
    fn test_request_body() {
        let client = SpeechClient::new(TtsSettings {
            api_key: "k".to_string(),
            ..Default::default()
        })
        .unwrap();
        let voice = VoiceSettings {
            rate: 1.2,
            pitch: 1.0,
            autoplay: true,
        };
        let body = serde_json::to_value(client.request("hello", &voice)).unwrap();
        assert_eq!(body["input"]["text"], "hello");
        assert_eq!(body["voice"]["languageCode"], "ko-KR");
        assert_eq!(body["voice"]["name"], "ko-KR-Standard-A");
        assert_eq!(body["audioConfig"]["audioEncoding"], "MP3");
        assert_eq!(body["audioConfig"]["pitch"], 0.0);
        assert_eq!(
            client.endpoint(),
            "https://texttospeech.googleapis.com/v1/text:synthesize"
        );
    }

    #[test]
    fn test_decode_audio() {
        assert_eq!(decode_audio("aGVsbG8=").unwrap(), b"hello");
        assert!(decode_audio("***").is_err());
    }

    #[test]
    fn test_missing_key() {
        assert!(SpeechClient::new(TtsSettings::default()).is_err());
        assert_eq!(audio_extension("linear16"), "wav");
        assert_eq!(audio_extension("MP3"), "mp3");
    }
}
