//! Backend services consumed by the feedback pipeline and playback.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use hound::{SampleFormat, WavSpec, WavWriter};
use log::debug;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::Value;

use crate::capture::AudioArtifact;
use crate::error::ApiError;
use crate::model::{grade_level_from_value, CoachingResult, EvaluationResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluateRequest {
    pub target: String,
    pub transcript: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoachRequest {
    pub target: String,
    pub transcript: String,
    pub misreads: Vec<String>,
    pub grade_level: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submission {
    pub assignment_id: i64,
    pub accuracy: f64,
    pub words_missed: Vec<String>,
    pub submitted: bool,
}

#[async_trait]
pub trait FeedbackApi: Send + Sync {
    async fn transcribe(&self, audio: &AudioArtifact) -> Result<String, ApiError>;

    async fn evaluate(&self, request: &EvaluateRequest) -> Result<EvaluationResult, ApiError>;

    async fn submit(&self, submission: &Submission) -> Result<(), ApiError>;

    /// `Ok(None)` when the assignment exists but carries no grade level.
    async fn grade_level(&self, assignment_id: i64) -> Result<Option<u32>, ApiError>;

    async fn coach(&self, request: &CoachRequest) -> Result<CoachingResult, ApiError>;

    /// Synthesized speech for `text`, as an encoded audio payload.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ApiError>;
}

/// JSON-over-HTTP client for the reading server.
#[derive(Debug, Clone)]
pub struct HttpFeedbackApi {
    client: Client,
    base_url: String,
}

impl HttpFeedbackApi {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|source| ApiError::Transport {
            endpoint: base_url.to_string(),
            source,
        })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Value, ApiError> {
        let url = self.url(path);
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                endpoint: path.to_string(),
                source,
            })?;
        read_json(path, response).await
    }
}

async fn ensure_success(path: &str, response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(ApiError::Status {
        endpoint: path.to_string(),
        status: status.as_u16(),
        body,
    })
}

async fn read_json(path: &str, response: Response) -> Result<Value, ApiError> {
    let response = ensure_success(path, response).await?;
    response.json::<Value>().await.map_err(|e| ApiError::Decode {
        endpoint: path.to_string(),
        reason: e.to_string(),
    })
}

/// Wraps the captured PCM in a WAV container for upload.
pub fn artifact_to_wav(audio: &AudioArtifact) -> Result<Vec<u8>, ApiError> {
    let spec = WavSpec {
        channels: audio.format.channels.max(1),
        sample_rate: audio.format.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            WavWriter::new(&mut cursor, spec).map_err(|e| ApiError::Audio(e.to_string()))?;
        for chunk in audio.pcm.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([chunk[0], chunk[1]]))
                .map_err(|e| ApiError::Audio(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| ApiError::Audio(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}

#[async_trait]
impl FeedbackApi for HttpFeedbackApi {
    async fn transcribe(&self, audio: &AudioArtifact) -> Result<String, ApiError> {
        const PATH: &str = "/api/transcribe";

        let part = Part::bytes(artifact_to_wav(audio)?)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| ApiError::Audio(e.to_string()))?;
        let form = Form::new().part("audio", part);

        let response = self
            .client
            .post(self.url(PATH))
            .multipart(form)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                endpoint: PATH.to_string(),
                source,
            })?;
        let body = read_json(PATH, response).await?;

        Ok(body
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    async fn evaluate(&self, request: &EvaluateRequest) -> Result<EvaluationResult, ApiError> {
        let body = self.post_json("/api/evaluate", request).await?;
        Ok(EvaluationResult::from_value(&body))
    }

    async fn submit(&self, submission: &Submission) -> Result<(), ApiError> {
        const PATH: &str = "/api/submissions";
        let response = self
            .client
            .post(self.url(PATH))
            .json(submission)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                endpoint: PATH.to_string(),
                source,
            })?;
        ensure_success(PATH, response).await?;
        Ok(())
    }

    async fn grade_level(&self, assignment_id: i64) -> Result<Option<u32>, ApiError> {
        let path = format!("/api/assignments/{}", assignment_id);
        let response = self
            .client
            .get(self.url(&path))
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                endpoint: path.clone(),
                source,
            })?;
        let body = read_json(&path, response).await?;
        Ok(grade_level_from_value(&body))
    }

    async fn coach(&self, request: &CoachRequest) -> Result<CoachingResult, ApiError> {
        let body = self.post_json("/api/coach", request).await?;
        Ok(CoachingResult::from_value(&body))
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ApiError> {
        const PATH: &str = "/api/tts";
        let response = self
            .client
            .post(self.url(PATH))
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                endpoint: PATH.to_string(),
                source,
            })?;
        let response = ensure_success(PATH, response).await?;
        let bytes = response.bytes().await.map_err(|e| ApiError::Decode {
            endpoint: PATH.to_string(),
            reason: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}
