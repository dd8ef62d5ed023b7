//! Capture controller: runs the audio recorder and the live recognizer for
//! one reading attempt and folds their events into a single state.

pub mod recognizer;
pub mod recorder;

use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::alignment::mark_words_as_read;
use crate::error::CaptureError;
use crate::passage::Passage;

/// Monotonic id of a recording attempt. Producer events carry the id of the
/// attempt that started them so late events from an earlier attempt can be
/// told apart.
pub type AttemptId = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// A chunk of 16-bit little-endian PCM from the recorder.
    AudioFragment { attempt: AttemptId, bytes: Vec<u8> },
    /// The recorder has flushed its last fragment.
    RecorderStopped { attempt: AttemptId },
    Recognition {
        attempt: AttemptId,
        text: String,
        is_final: bool,
    },
    RecognizerError { attempt: AttemptId, message: String },
}

impl CaptureEvent {
    pub fn attempt(&self) -> AttemptId {
        match self {
            CaptureEvent::AudioFragment { attempt, .. }
            | CaptureEvent::RecorderStopped { attempt }
            | CaptureEvent::Recognition { attempt, .. }
            | CaptureEvent::RecognizerError { attempt, .. } => *attempt,
        }
    }
}

/// Where producers post their events. Cheap to clone and usable from any thread.
#[derive(Clone)]
pub struct CaptureSink(Arc<dyn Fn(CaptureEvent) + Send + Sync>);

impl CaptureSink {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(CaptureEvent) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn send(&self, event: CaptureEvent) {
        (self.0)(event)
    }
}

impl fmt::Debug for CaptureSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CaptureSink")
    }
}

/// Layout of the PCM the recorder produces. Samples are always signed 16-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
        }
    }
}

/// Every fragment of one attempt, in arrival order, as a single buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioArtifact {
    pub format: AudioFormat,
    pub pcm: Vec<u8>,
}

impl AudioArtifact {
    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        let bytes_per_sec =
            self.format.sample_rate as f64 * self.format.channels.max(1) as f64 * 2.0;
        if bytes_per_sec == 0.0 {
            return 0.0;
        }
        self.pcm.len() as f64 / bytes_per_sec
    }
}

pub trait AudioRecorder: Send {
    /// Acquires the input device and begins posting fragments. Device or
    /// permission failures are reported here, before any event is sent.
    fn start(&mut self, attempt: AttemptId, sink: CaptureSink) -> Result<AudioFormat, CaptureError>;

    /// Requests a stop. Completion arrives later as
    /// [`CaptureEvent::RecorderStopped`].
    fn stop(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionOptions {
    pub language: String,
    pub continuous: bool,
    pub interim_results: bool,
    pub max_alternatives: u8,
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            continuous: true,
            interim_results: true,
            max_alternatives: 1,
        }
    }
}

pub trait SpeechRecognizer: Send {
    fn start(
        &mut self,
        attempt: AttemptId,
        sink: CaptureSink,
        options: &RecognitionOptions,
    ) -> Result<(), CaptureError>;

    fn stop(&mut self) -> Result<(), CaptureError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum CaptureState {
    Idle,
    Recording,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started(AttemptId),
    NothingToRead,
}

/// Producer state for the live attempt.
#[derive(Debug)]
pub struct CaptureSession {
    pub attempt: AttemptId,
    pub recording: bool,
    pub recognition_active: bool,
    pub audio_chunks: Vec<Vec<u8>>,
    /// Finalized recognizer output for this attempt.
    pub transcript: String,
    pub format: AudioFormat,
}

impl CaptureSession {
    fn new(attempt: AttemptId, format: AudioFormat) -> Self {
        Self {
            attempt,
            recording: true,
            recognition_active: false,
            audio_chunks: Vec::new(),
            transcript: String::new(),
            format,
        }
    }

    fn into_artifact(self) -> AudioArtifact {
        AudioArtifact {
            format: self.format,
            pcm: self.audio_chunks.concat(),
        }
    }
}

pub struct CaptureController {
    state: CaptureState,
    session: Option<CaptureSession>,
    passage: Passage,
    recorder: Box<dyn AudioRecorder>,
    recognizer: Option<Box<dyn SpeechRecognizer>>,
    options: RecognitionOptions,
    last_attempt: AttemptId,
}

impl CaptureController {
    /// `recognizer` is `None` when the runtime has no speech recognition; the
    /// controller then records without live highlighting.
    pub fn new(
        passage: Passage,
        recorder: Box<dyn AudioRecorder>,
        recognizer: Option<Box<dyn SpeechRecognizer>>,
        options: RecognitionOptions,
    ) -> Self {
        Self {
            state: CaptureState::Idle,
            session: None,
            passage,
            recorder,
            recognizer,
            options,
            last_attempt: 0,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn passage(&self) -> &Passage {
        &self.passage
    }

    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    pub fn supports_recognition(&self) -> bool {
        self.recognizer.is_some()
    }

    pub fn transcript(&self) -> &str {
        self.session.as_ref().map_or("", |s| s.transcript.as_str())
    }

    /// Swaps in a different passage. Only allowed while idle.
    pub fn replace_passage(&mut self, text: impl Into<String>) -> bool {
        if self.state != CaptureState::Idle {
            return false;
        }
        self.passage.replace(text);
        true
    }

    pub fn start(&mut self, sink: CaptureSink) -> Result<StartOutcome, CaptureError> {
        match self.state {
            CaptureState::Processing => return Err(CaptureError::Busy),
            CaptureState::Recording => {
                warn!("start requested mid-recording, abandoning current attempt");
                self.abandon();
            }
            CaptureState::Idle => {}
        }

        if self.passage.is_empty() {
            info!("no passage loaded, nothing to record");
            return Ok(StartOutcome::NothingToRead);
        }

        self.passage.reset();
        self.passage.tokenize();

        self.last_attempt += 1;
        let attempt = self.last_attempt;

        let format = self.recorder.start(attempt, sink.clone())?;
        let mut session = CaptureSession::new(attempt, format);

        if let Some(recognizer) = self.recognizer.as_mut() {
            match recognizer.start(attempt, sink, &self.options) {
                Ok(()) => session.recognition_active = true,
                Err(e) => warn!("continuing without live highlighting: {}", e),
            }
        } else {
            debug!("speech recognition unsupported, recording only");
        }

        info!(
            "attempt {} recording at {} Hz ({} words)",
            attempt,
            format.sample_rate,
            self.passage.units().len()
        );
        self.session = Some(session);
        self.state = CaptureState::Recording;
        Ok(StartOutcome::Started(attempt))
    }

    /// Stops both producers. Returns false when there was nothing to stop.
    pub fn stop(&mut self) -> bool {
        if self.state != CaptureState::Recording {
            return false;
        }
        self.stop_recognition();
        self.recorder.stop();
        self.state = CaptureState::Processing;
        true
    }

    /// Applies one producer event. Returns the assembled audio once the
    /// recorder has finished, at which point the controller is `Processing`.
    pub fn handle_event(&mut self, event: CaptureEvent) -> Option<AudioArtifact> {
        let Some(session) = self.session.as_mut() else {
            debug!("dropping capture event with no live session");
            return None;
        };
        if event.attempt() != session.attempt {
            debug!("dropping stale event from attempt {}", event.attempt());
            return None;
        }

        match event {
            CaptureEvent::AudioFragment { bytes, .. } => {
                if session.recording {
                    session.audio_chunks.push(bytes);
                }
                None
            }
            CaptureEvent::Recognition { text, is_final, .. } => {
                if !is_final || !session.recognition_active {
                    return None;
                }
                session.transcript.push_str(&text);
                session.transcript.push(' ');
                let marked = mark_words_as_read(&session.transcript, self.passage.units_mut());
                if marked > 0 {
                    debug!(
                        "{} more words read ({}/{})",
                        marked,
                        self.passage.read_count(),
                        self.passage.units().len()
                    );
                }
                None
            }
            CaptureEvent::RecognizerError { message, .. } => {
                warn!("speech recognition error: {}", message);
                None
            }
            CaptureEvent::RecorderStopped { .. } => {
                if self.state == CaptureState::Recording {
                    warn!("recorder stopped on its own, finishing the attempt");
                    self.stop_recognition();
                    self.state = CaptureState::Processing;
                }
                let mut session = self.session.take()?;
                session.recording = false;
                let artifact = session.into_artifact();
                info!(
                    "attempt {} captured {:.1}s of audio",
                    self.last_attempt,
                    artifact.duration_secs()
                );
                Some(artifact)
            }
        }
    }

    /// Called once feedback processing for the attempt has ended.
    pub fn finish(&mut self) {
        if self.state == CaptureState::Processing {
            self.session = None;
            self.state = CaptureState::Idle;
        }
    }

    fn stop_recognition(&mut self) {
        if let Some(session) = self.session.as_mut() {
            if !session.recognition_active {
                return;
            }
            session.recognition_active = false;
        }
        if let Some(recognizer) = self.recognizer.as_mut() {
            if let Err(e) = recognizer.stop() {
                debug!("ignoring recognizer stop error: {}", e);
            }
        }
    }

    fn abandon(&mut self) {
        self.stop_recognition();
        self.recorder.stop();
        self.session = None;
        self.state = CaptureState::Idle;
    }
}
