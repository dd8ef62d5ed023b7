//! The practice session: owns the capture controller and the feedback render
//! state, and reacts to every [`AppEvent`] on the event loop.

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use log::{debug, info, warn};
use tokio::runtime::Handle;

use crate::api::FeedbackApi;
use crate::capture::{
    AttemptId, AudioArtifact, CaptureController, CaptureEvent, CaptureState, StartOutcome,
};
use crate::context::PracticeContext;
use crate::error::CaptureError;
use crate::feedback::{self, FeedbackView};
use crate::library::Library;
use crate::pipeline::{FeedbackPipeline, PipelineUpdate, TranscribeFailurePolicy};
use crate::playback::{PlaybackSource, PlaybackTrigger};
use crate::runtime::{AppEvent, EventSender};

/// Services the session hands background work to.
#[derive(Clone)]
pub struct Services {
    pub api: Arc<dyn FeedbackApi>,
    pub playback: PlaybackTrigger,
    pub policy: TranscribeFailurePolicy,
    pub runtime: Handle,
}

pub struct App {
    controller: CaptureController,
    feedback: FeedbackView,
    context: PracticeContext,
    library: Library,
    services: Services,
    events: EventSender,
    /// Attempt whose feedback is currently being produced.
    processing: Option<AttemptId>,
    playing: Option<PlaybackSource>,
    should_quit: bool,
}

impl App {
    pub fn new(
        controller: CaptureController,
        context: PracticeContext,
        library: Library,
        services: Services,
        events: EventSender,
    ) -> Self {
        let mut view = FeedbackView::new();
        if controller.passage().is_empty() {
            view.set_status(feedback::NO_PASSAGE);
        }
        Self {
            controller,
            feedback: view,
            context,
            library,
            services,
            events,
            processing: None,
            playing: None,
            should_quit: false,
        }
    }

    pub fn controller(&self) -> &CaptureController {
        &self.controller
    }

    pub fn feedback(&self) -> &FeedbackView {
        &self.feedback
    }

    pub fn context(&self) -> &PracticeContext {
        &self.context
    }

    pub fn state(&self) -> CaptureState {
        self.controller.state()
    }

    pub fn playing(&self) -> Option<PlaybackSource> {
        self.playing
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Applies one event. Returns true when the screen needs redrawing.
    pub fn handle_event(&mut self, event: AppEvent) -> bool {
        match event {
            AppEvent::Tick => false,
            AppEvent::Resize => true,
            AppEvent::Key(key) => {
                self.on_key(key);
                true
            }
            AppEvent::Capture(event) => self.on_capture(event),
            AppEvent::Pipeline { attempt, update } => self.on_pipeline(attempt, update),
            AppEvent::Playback { source, outcome } => {
                debug!("{} playback ended: {:?}", source, outcome);
                if self.playing == Some(source) {
                    self.playing = None;
                }
                true
            }
        }
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit();
            return;
        }
        match key.code {
            KeyCode::Esc => self.quit(),
            KeyCode::Char('r') | KeyCode::Enter => self.start(),
            KeyCode::Char('s') | KeyCode::Char(' ') => self.stop(),
            KeyCode::Char('p') => self.play_passage(),
            KeyCode::Char('f') => self.play_feedback(),
            KeyCode::Char('n') => self.next_passage(),
            _ => {}
        }
    }

    pub fn start(&mut self) {
        match self.controller.start(self.events.capture_sink()) {
            Ok(StartOutcome::Started(attempt)) => {
                debug!("attempt {} started", attempt);
                self.processing = None;
                self.feedback.begin_attempt();
            }
            Ok(StartOutcome::NothingToRead) => self.feedback.set_status(feedback::NO_PASSAGE),
            Err(CaptureError::Busy) => info!("still processing, start ignored"),
            Err(e) => {
                warn!("could not start recording: {}", e);
                self.feedback.set_status(format!("Could not start recording: {}", e));
            }
        }
    }

    pub fn stop(&mut self) {
        if self.controller.stop() {
            self.feedback.set_status(feedback::PROCESSING);
        }
    }

    fn on_capture(&mut self, event: CaptureEvent) -> bool {
        let attempt = event.attempt();
        let redraw = matches!(event, CaptureEvent::Recognition { is_final: true, .. })
            || matches!(event, CaptureEvent::RecorderStopped { .. });
        if let Some(artifact) = self.controller.handle_event(event) {
            self.feedback.set_status(feedback::PROCESSING);
            self.spawn_pipeline(attempt, artifact);
        }
        redraw
    }

    fn spawn_pipeline(&mut self, attempt: AttemptId, artifact: AudioArtifact) {
        self.processing = Some(attempt);

        // The reference is the stored passage text, never the annotated render.
        let mut ctx = self.context.clone();
        ctx.passage_text = self.controller.passage().text().to_string();

        let api = Arc::clone(&self.services.api);
        let policy = self.services.policy;
        let events = self.events.clone();
        self.services.runtime.spawn(async move {
            let pipeline = FeedbackPipeline::new(api.as_ref(), policy);
            pipeline
                .run(&ctx, &artifact, |update| {
                    events.send(AppEvent::Pipeline { attempt, update });
                })
                .await;
        });
    }

    fn on_pipeline(&mut self, attempt: AttemptId, update: PipelineUpdate) -> bool {
        if self.processing != Some(attempt) {
            debug!("dropping pipeline update for attempt {}", attempt);
            return false;
        }
        self.feedback.apply(&update);
        if let PipelineUpdate::Finished(outcome) = update {
            info!("attempt {} finished: {:?}", attempt, outcome);
            self.processing = None;
            self.controller.finish();
        }
        true
    }

    pub fn play_passage(&mut self) {
        let text = self.controller.passage().text().to_string();
        if text.is_empty() {
            self.feedback.set_status(feedback::NO_PASSAGE);
            return;
        }
        self.spawn_playback(PlaybackSource::Passage, text);
    }

    pub fn play_feedback(&mut self) {
        let text = self.feedback.encouragement().to_string();
        self.spawn_playback(PlaybackSource::Feedback, text);
    }

    fn spawn_playback(&mut self, source: PlaybackSource, text: String) {
        if let Some(current) = self.playing {
            info!("{} playback already running, ignoring {}", current, source);
            return;
        }
        self.playing = Some(source);

        let trigger = self.services.playback.clone();
        let events = self.events.clone();
        self.services.runtime.spawn(async move {
            let outcome = trigger.speak(source, &text).await;
            events.send(AppEvent::Playback { source, outcome });
        });
    }

    /// Loads another bundled passage. Only while idle.
    pub fn next_passage(&mut self) {
        if self.controller.state() != CaptureState::Idle {
            return;
        }
        let Some(entry) = self.library.another(self.controller.passage().text()).cloned() else {
            info!("no bundled passages to switch to");
            return;
        };
        if self.controller.replace_passage(entry.text.clone()) {
            if self.context.assignment_id.take().is_some() {
                info!("left the assignment passage, submissions disabled");
            }
            self.context.passage_text = entry.text;
            self.context.title = Some(entry.title);
            self.feedback = FeedbackView::new();
        }
    }

    fn quit(&mut self) {
        if self.controller.state() == CaptureState::Recording {
            self.controller.stop();
        }
        self.should_quit = true;
    }
}
