use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, info};

use super::{AttemptId, CaptureEvent, CaptureSink, RecognitionOptions, SpeechRecognizer};
use crate::error::CaptureError;

/// Recognizer that "hears" a fixed script, one phrase per line.
///
/// Each phrase is emitted as an interim result (its first half) followed by a
/// final result, `interval` apart, the way a continuous recognizer reports
/// speech. Useful for demos and for exercising live highlighting without a
/// speech engine.
pub struct ScriptedRecognizer {
    phrases: Vec<String>,
    interval: Duration,
    running: Option<Arc<AtomicBool>>,
}

impl ScriptedRecognizer {
    pub fn new(phrases: Vec<String>, interval: Duration) -> Self {
        Self {
            phrases,
            interval,
            running: None,
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P, interval: Duration) -> io::Result<Self> {
        let phrases = fs::read_to_string(path)?
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect();
        Ok(Self::new(phrases, interval))
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn start(
        &mut self,
        attempt: AttemptId,
        sink: CaptureSink,
        options: &RecognitionOptions,
    ) -> Result<(), CaptureError> {
        let _ = self.stop();

        let running = Arc::new(AtomicBool::new(true));
        self.running = Some(running.clone());

        let phrases = self.phrases.clone();
        let interval = self.interval;
        let interim = options.interim_results;
        info!(
            "scripted recognition started ({} phrases, {})",
            phrases.len(),
            options.language
        );

        thread::Builder::new()
            .name("readalong-recognizer".into())
            .spawn(move || {
                for phrase in phrases {
                    if interim {
                        thread::sleep(interval / 2);
                        if !running.load(Ordering::SeqCst) {
                            break;
                        }
                        let words: Vec<&str> = phrase.split_whitespace().collect();
                        let partial = words[..words.len().div_ceil(2)].join(" ");
                        sink.send(CaptureEvent::Recognition {
                            attempt,
                            text: partial,
                            is_final: false,
                        });
                    }

                    thread::sleep(interval / 2);
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    sink.send(CaptureEvent::Recognition {
                        attempt,
                        text: phrase,
                        is_final: true,
                    });
                }
                debug!("scripted recognition for attempt {} finished", attempt);
            })
            .map_err(|e| CaptureError::Recognizer(e.to_string()))?;

        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        match self.running.take() {
            Some(running) => {
                running.store(false, Ordering::SeqCst);
                Ok(())
            }
            None => Err(CaptureError::Recognizer("not running".into())),
        }
    }
}
