//! Voice note handling: authenticated download plus Whisper transcription.
//!
//! Failures here are non-fatal to the pipeline: the turn continues with a
//! placeholder text and the inbound is still logged as audio.

use serde::Deserialize;
use siembra_core::error::SiembraError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::meta;

const DOWNLOAD_TIMEOUT_SECS: u64 = 30;
const WHISPER_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
/// Spanish hint for the speech-to-text model.
const LANGUAGE_HINT: &str = "es";

/// Result of a successful transcription.
#[derive(Debug, Clone)]
pub struct Transcription {
    pub transcript: String,
    /// Content-addressed path of the retained audio artifact.
    pub local_path: String,
}

#[derive(Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Downloads provider-hosted audio and transcribes it.
pub struct Transcriber {
    client: reqwest::Client,
    audio_dir: PathBuf,
    whisper_api_key: String,
    /// (account_sid, auth_token) for external-provider media downloads.
    twilio_auth: Option<(String, String)>,
    /// (access_token, api_version) for platform media resolution.
    meta_auth: Option<(String, String)>,
}

impl Transcriber {
    pub fn new(
        audio_dir: impl Into<PathBuf>,
        whisper_api_key: String,
        twilio_auth: Option<(String, String)>,
        meta_auth: Option<(String, String)>,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
            audio_dir: audio_dir.into(),
            whisper_api_key,
            twilio_auth,
            meta_auth,
        }
    }

    /// Download and transcribe one voice note.
    ///
    /// Either `audio_source_url` (external provider, authenticated download)
    /// or `media_id` (platform provider, URL resolved first) must be given.
    pub async fn process(
        &self,
        audio_source_url: Option<&str>,
        media_id: &str,
    ) -> Result<Transcription, SiembraError> {
        let bytes = self.download(audio_source_url, media_id).await?;
        let local_path = self.persist(media_id, &bytes).await?;
        let transcript = self.transcribe(&bytes).await?;

        info!(
            "transcribed {} bytes of audio ({media_id}): {} chars",
            bytes.len(),
            transcript.len()
        );

        Ok(Transcription {
            transcript,
            local_path,
        })
    }

    async fn download(
        &self,
        audio_source_url: Option<&str>,
        media_id: &str,
    ) -> Result<Vec<u8>, SiembraError> {
        let (url, bearer) = match audio_source_url {
            Some(url) => (url.to_string(), None),
            None => {
                let (token, api_version) = self.meta_auth.as_ref().ok_or_else(|| {
                    SiembraError::AudioDownload(
                        "no source url and platform credentials missing".into(),
                    )
                })?;
                let resolved =
                    meta::resolve_media_url(&self.client, token, api_version, media_id).await?;
                (resolved, Some(token.clone()))
            }
        };

        debug!("downloading audio {media_id}");

        let mut req = self.client.get(&url);
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        } else if let Some((sid, token)) = &self.twilio_auth {
            req = req.basic_auth(sid, Some(token));
        }

        let resp = req
            .send()
            .await
            .map_err(|e| SiembraError::AudioDownload(format!("download failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(SiembraError::AudioDownload(format!(
                "download returned {}",
                resp.status()
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| SiembraError::AudioDownload(format!("download body failed: {e}")))?;

        Ok(bytes.to_vec())
    }

    /// Write the artifact under a path derived from the media id.
    async fn persist(&self, media_id: &str, bytes: &[u8]) -> Result<String, SiembraError> {
        tokio::fs::create_dir_all(&self.audio_dir)
            .await
            .map_err(|e| SiembraError::AudioDownload(format!("audio dir unavailable: {e}")))?;

        let path = artifact_path(&self.audio_dir, media_id);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| SiembraError::AudioDownload(format!("audio write failed: {e}")))?;

        Ok(path.to_string_lossy().to_string())
    }

    async fn transcribe(&self, bytes: &[u8]) -> Result<String, SiembraError> {
        if self.whisper_api_key.is_empty() {
            return Err(SiembraError::Transcription("no whisper api key".into()));
        }

        let part = reqwest::multipart::Part::bytes(bytes.to_vec())
            .file_name("voice.ogg")
            .mime_str("audio/ogg")
            .map_err(|e| SiembraError::Transcription(format!("mime error: {e}")))?;

        let form = reqwest::multipart::Form::new()
            .text("model", "whisper-1")
            .text("language", LANGUAGE_HINT)
            .part("file", part);

        let resp = self
            .client
            .post(WHISPER_URL)
            .bearer_auth(&self.whisper_api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SiembraError::Transcription(format!("whisper request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SiembraError::Transcription(format!(
                "whisper returned {status}: {body}"
            )));
        }

        let parsed: WhisperResponse = resp
            .json()
            .await
            .map_err(|e| SiembraError::Transcription(format!("whisper parse failed: {e}")))?;

        Ok(parsed.text)
    }
}

/// Content-addressed artifact path: `audio_dir / media_id.ogg`.
fn artifact_path(audio_dir: &Path, media_id: &str) -> PathBuf {
    // Media ids come from the provider; keep only safe characters.
    let safe: String = media_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    audio_dir.join(format!("{safe}.ogg"))
}
