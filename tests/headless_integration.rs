use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use readalong::api::{CoachRequest, EvaluateRequest, FeedbackApi, Submission};
use readalong::app::{App, Services};
use readalong::capture::recognizer::ScriptedRecognizer;
use readalong::capture::{
    AttemptId, AudioArtifact, AudioFormat, AudioRecorder, CaptureController, CaptureEvent,
    CaptureSink, CaptureState, RecognitionOptions,
};
use readalong::context::PracticeContext;
use readalong::error::{ApiError, CaptureError, PlaybackError};
use readalong::feedback;
use readalong::library::Library;
use readalong::model::{CoachingResult, EvaluationResult, Tip, WordFeedback, WordStatus};
use readalong::passage::Passage;
use readalong::pipeline::{FeedbackPipeline, PipelineUpdate, TranscribeFailurePolicy};
use readalong::playback::{AudioSink, PlaybackTrigger};
use readalong::runtime::{AppEvent, ChannelEventSource, EventSender, FixedTicker, Runner};

const PASSAGE: &str = "the quick brown fox jumps";

/// Recorder that produces one fragment per attempt and flushes it on stop.
#[derive(Default)]
struct LoopbackRecorder {
    live: Option<(AttemptId, CaptureSink)>,
}

impl AudioRecorder for LoopbackRecorder {
    fn start(&mut self, attempt: AttemptId, sink: CaptureSink) -> Result<AudioFormat, CaptureError> {
        sink.send(CaptureEvent::AudioFragment {
            attempt,
            bytes: vec![0, 1, 2, 3],
        });
        self.live = Some((attempt, sink));
        Ok(AudioFormat::default())
    }

    fn stop(&mut self) {
        if let Some((attempt, sink)) = self.live.take() {
            sink.send(CaptureEvent::AudioFragment {
                attempt,
                bytes: vec![4, 5],
            });
            sink.send(CaptureEvent::RecorderStopped { attempt });
        }
    }
}

/// In-memory reading server.
#[derive(Default)]
struct ReadingServer {
    calls: Mutex<Vec<String>>,
    uploads: Mutex<Vec<AudioArtifact>>,
    evaluations: Mutex<Vec<EvaluateRequest>>,
    submissions: Mutex<Vec<Submission>>,
}

impl ReadingServer {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedbackApi for ReadingServer {
    async fn transcribe(&self, audio: &AudioArtifact) -> Result<String, ApiError> {
        self.calls.lock().unwrap().push("transcribe".into());
        self.uploads.lock().unwrap().push(audio.clone());
        Ok("the quick brown fox".into())
    }

    async fn evaluate(&self, request: &EvaluateRequest) -> Result<EvaluationResult, ApiError> {
        self.calls.lock().unwrap().push("evaluate".into());
        self.evaluations.lock().unwrap().push(request.clone());
        let spoken: Vec<&str> = request.transcript.split_whitespace().collect();
        let words = request
            .target
            .split_whitespace()
            .map(|w| WordFeedback {
                word: w.to_string(),
                status: if spoken.contains(&w) {
                    WordStatus::Correct
                } else {
                    WordStatus::Misread
                },
            })
            .collect();
        Ok(EvaluationResult {
            accuracy: 80.0,
            words,
        })
    }

    async fn submit(&self, submission: &Submission) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push("submit".into());
        self.submissions.lock().unwrap().push(submission.clone());
        Ok(())
    }

    async fn grade_level(&self, _assignment_id: i64) -> Result<Option<u32>, ApiError> {
        self.calls.lock().unwrap().push("grade".into());
        Ok(Some(2))
    }

    async fn coach(&self, request: &CoachRequest) -> Result<CoachingResult, ApiError> {
        self.calls.lock().unwrap().push("coach".into());
        Ok(CoachingResult {
            encouragement: Some("Nice reading!".into()),
            tips: Some(
                request
                    .misreads
                    .iter()
                    .map(|w| Tip {
                        word: w.clone(),
                        tip: "Try it slowly.".into(),
                    })
                    .collect(),
            ),
            questions: None,
        })
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ApiError> {
        Ok(text.as_bytes().to_vec())
    }
}

struct Silent;

impl AudioSink for Silent {
    fn play(&self, _audio: Vec<u8>) -> Result<(), PlaybackError> {
        Ok(())
    }
}

struct Session {
    app: App,
    runner: Runner<ChannelEventSource, FixedTicker>,
    sender: EventSender,
    server: Arc<ReadingServer>,
    _rt: tokio::runtime::Runtime,
}

fn session(assignment_id: Option<i64>) -> Session {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();
    let server = Arc::new(ReadingServer::default());
    let api: Arc<dyn FeedbackApi> = server.clone();
    let services = Services {
        api: api.clone(),
        playback: PlaybackTrigger::new(api, Arc::new(Silent)),
        policy: TranscribeFailurePolicy::Continue,
        runtime: rt.handle().clone(),
    };

    let recognizer = ScriptedRecognizer::new(
        vec!["the quick brown".into(), "fox jumps".into()],
        Duration::from_millis(10),
    );
    let controller = CaptureController::new(
        Passage::new(PASSAGE),
        Box::new(LoopbackRecorder::default()),
        Some(Box::new(recognizer)),
        RecognitionOptions::default(),
    );

    let (source, sender) = ChannelEventSource::new();
    let app = App::new(
        controller,
        PracticeContext::new(PASSAGE).with_assignment(assignment_id),
        Library::default(),
        services,
        sender.clone(),
    );
    Session {
        app,
        runner: Runner::new(source, FixedTicker::new(Duration::from_millis(5))),
        sender,
        server,
        _rt: rt,
    }
}

impl Session {
    fn press(&self, c: char) {
        self.sender
            .send(AppEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)));
    }

    fn drive_until(&mut self, mut done: impl FnMut(&App) -> bool) {
        for _ in 0..1000u32 {
            if done(&self.app) {
                return;
            }
            let ev = self.runner.step();
            self.app.handle_event(ev);
        }
        panic!("session did not reach the expected state");
    }
}

// Headless run of a whole attempt: keys, live highlighting from the
// recognizer, recorder flush, and the feedback pipeline.
#[test]
fn headless_reading_attempt_completes() {
    let mut s = session(Some(42));

    s.press('r');
    s.drive_until(|app| app.state() == CaptureState::Recording);
    s.drive_until(|app| app.controller().passage().read_count() == 5);

    s.press('s');
    s.drive_until(|app| app.state() == CaptureState::Idle);

    let view = s.app.feedback();
    assert_eq!(view.status, feedback::DONE);
    assert_eq!(view.transcript, "the quick brown fox");
    assert_eq!(view.accuracy_line(), "Accuracy: 80%");
    assert_eq!(view.tip_lines(), vec!["jumps: Try it slowly."]);
    assert_eq!(view.question_lines(), vec![feedback::NO_QUESTIONS]);

    let uploads = s.server.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].pcm, vec![0, 1, 2, 3, 4, 5]);

    assert_eq!(s.server.evaluations.lock().unwrap()[0].target, PASSAGE);

    let submissions = s.server.submissions.lock().unwrap();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].assignment_id, 42);
    assert_eq!(submissions[0].accuracy, 80.0);
    assert_eq!(submissions[0].words_missed, vec!["jumps"]);
    assert!(!submissions[0].submitted);
}

#[test]
fn headless_attempt_without_assignment_skips_submission() {
    let mut s = session(None);

    s.press('r');
    s.drive_until(|app| app.state() == CaptureState::Recording);
    s.press('s');
    s.drive_until(|app| app.state() == CaptureState::Idle);

    let calls = s.server.calls();
    assert_eq!(calls.first().map(String::as_str), Some("transcribe"));
    assert!(calls.contains(&"coach".to_string()));
    assert!(!calls.contains(&"submit".to_string()));
    assert!(!calls.contains(&"grade".to_string()));
}

#[test]
fn headless_restart_after_done_clears_highlighting() {
    let mut s = session(None);

    s.press('r');
    s.drive_until(|app| app.controller().passage().read_count() == 5);
    s.press('s');
    s.drive_until(|app| app.state() == CaptureState::Idle);

    assert_eq!(s.app.controller().passage().read_count(), 5);

    // Apply the key directly so no recognizer result can land first.
    s.app.start();
    assert_eq!(s.app.state(), CaptureState::Recording);
    assert_eq!(s.app.controller().passage().read_count(), 0);
    assert_eq!(s.app.feedback().status, feedback::RECORDING);
    assert!(!s.app.feedback().has_results());
}

#[tokio::test]
async fn pipeline_scores_the_quick_brown_fox() {
    let server = ReadingServer::default();
    let ctx = PracticeContext::new(PASSAGE).with_assignment(Some(42));
    let audio = AudioArtifact {
        format: AudioFormat::default(),
        pcm: vec![0; 320],
    };

    let mut updates = Vec::new();
    let report = FeedbackPipeline::new(&server, TranscribeFailurePolicy::Continue)
        .run(&ctx, &audio, |u| updates.push(u))
        .await;

    let evaluation = report.evaluation.unwrap();
    assert_eq!(evaluation.accuracy, 80.0);
    assert_eq!(evaluation.misread_words(), vec!["jumps"]);
    assert_eq!(server.calls()[..2], ["transcribe", "evaluate"]);
    assert!(matches!(updates[0], PipelineUpdate::Transcribed(_)));

    let submissions = server.submissions.lock().unwrap();
    assert_eq!(submissions[0].assignment_id, 42);
    assert_eq!(submissions[0].words_missed, vec!["jumps"]);
}
