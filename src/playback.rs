//! Text-to-speech playback shared by the passage and feedback buttons.

use std::io::Cursor;
use std::sync::Arc;

use log::{debug, info, warn};
use rodio::OutputStreamBuilder;

use crate::api::FeedbackApi;
use crate::error::PlaybackError;

/// Plays an encoded audio payload to completion. Blocking.
pub trait AudioSink: Send + Sync {
    fn play(&self, audio: Vec<u8>) -> Result<(), PlaybackError>;
}

/// Default output device through `rodio`.
#[derive(Debug, Clone, Copy)]
pub struct RodioSink {
    volume: f32,
}

impl RodioSink {
    pub fn new(volume: f32) -> Self {
        Self {
            volume: volume.clamp(0.0, 1.0),
        }
    }
}

impl Default for RodioSink {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl AudioSink for RodioSink {
    fn play(&self, audio: Vec<u8>) -> Result<(), PlaybackError> {
        let stream_handle = OutputStreamBuilder::from_default_device()
            .map_err(|e| PlaybackError::Output(format!("no audio output: {}", e)))?
            .open_stream()
            .map_err(|e| PlaybackError::Output(format!("failed to open audio stream: {}", e)))?;

        let sink = rodio::play(stream_handle.mixer(), Cursor::new(audio))
            .map_err(|e| PlaybackError::Output(format!("failed to play audio: {}", e)))?;
        sink.set_volume(self.volume);
        sink.sleep_until_end();
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum PlaybackSource {
    #[strum(serialize = "passage")]
    Passage,
    #[strum(serialize = "feedback")]
    Feedback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Played,
    Skipped,
}

/// Requests speech for some text and plays it as soon as it arrives.
#[derive(Clone)]
pub struct PlaybackTrigger {
    api: Arc<dyn FeedbackApi>,
    sink: Arc<dyn AudioSink>,
}

impl PlaybackTrigger {
    pub fn new(api: Arc<dyn FeedbackApi>, sink: Arc<dyn AudioSink>) -> Self {
        Self { api, sink }
    }

    /// Never fails: synthesis and output errors are logged and the playback
    /// is skipped.
    pub async fn speak(&self, source: PlaybackSource, text: &str) -> PlaybackOutcome {
        match self.try_speak(text).await {
            Ok(PlaybackOutcome::Skipped) => {
                info!("no {} text to read, skipping playback", source);
                PlaybackOutcome::Skipped
            }
            Ok(outcome) => {
                debug!("{} playback finished", source);
                outcome
            }
            Err(e) => {
                warn!("{} playback skipped: {}", source, e);
                PlaybackOutcome::Skipped
            }
        }
    }

    async fn try_speak(&self, text: &str) -> Result<PlaybackOutcome, PlaybackError> {
        if text.trim().is_empty() {
            return Ok(PlaybackOutcome::Skipped);
        }
        let audio = self.api.synthesize(text).await?;

        let sink = Arc::clone(&self.sink);
        tokio::task::spawn_blocking(move || sink.play(audio))
            .await
            .map_err(|e| PlaybackError::Output(e.to_string()))??;
        Ok(PlaybackOutcome::Played)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Sink that keeps every payload instead of playing it.
    #[derive(Default)]
    pub struct RecordingSink {
        pub played: Mutex<Vec<Vec<u8>>>,
        pub fail: bool,
    }

    impl AudioSink for RecordingSink {
        fn play(&self, audio: Vec<u8>) -> Result<(), PlaybackError> {
            if self.fail {
                return Err(PlaybackError::Output("device busy".into()));
            }
            self.played.lock().unwrap().push(audio);
            Ok(())
        }
    }
}
