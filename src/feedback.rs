//! Render state for the feedback panels and the status line.

use itertools::Itertools;

use crate::model::{CoachingResult, EvaluationResult, WordFeedback};
use crate::pipeline::{PipelineOutcome, PipelineUpdate, Stage};

pub const NO_PASSAGE: &str = "No passage to read.";
pub const RECORDING: &str = "Recording…";
pub const PROCESSING: &str = "Processing…";
pub const DONE: &str = "Done!";

pub const NO_ENCOURAGEMENT: &str = "No feedback available.";
pub const NO_TIPS: &str = "No tips for this reading.";
pub const NO_QUESTIONS: &str = "No questions available.";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackView {
    pub status: String,
    pub transcript: String,
    pub evaluation: Option<EvaluationResult>,
    pub coaching: Option<CoachingResult>,
    /// Stages that failed during the current attempt.
    pub failed: Vec<Stage>,
}

impl FeedbackView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears every panel for a fresh attempt.
    pub fn begin_attempt(&mut self) {
        *self = Self {
            status: RECORDING.to_string(),
            ..Self::default()
        };
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn apply(&mut self, update: &PipelineUpdate) {
        match update {
            PipelineUpdate::Transcribed(text) => self.transcript = text.clone(),
            PipelineUpdate::Evaluated(evaluation) => self.evaluation = Some(evaluation.clone()),
            PipelineUpdate::Coached(coaching) => self.coaching = Some(coaching.clone()),
            PipelineUpdate::StageFailed { stage, .. } => {
                self.failed.push(*stage);
                self.status = format!("{} failed.", stage_label(*stage));
            }
            PipelineUpdate::Finished(PipelineOutcome::Completed) => {
                self.status = self.done_status();
            }
            // Keep the failure message from the stage that stopped the run.
            PipelineUpdate::Finished(PipelineOutcome::Aborted(_)) => {}
        }
    }

    /// "Done!", naming any stage that failed along the way.
    fn done_status(&self) -> String {
        if self.failed.is_empty() {
            return DONE.to_string();
        }
        let failed = self
            .failed
            .iter()
            .map(|s| format!("{} failed", stage_label(*s).to_lowercase()))
            .join(", ");
        format!("{} ({})", DONE, failed)
    }

    pub fn accuracy_line(&self) -> String {
        let accuracy = self.evaluation.as_ref().map_or(0.0, |e| e.accuracy);
        format!("Accuracy: {}%", accuracy)
    }

    pub fn words(&self) -> &[WordFeedback] {
        self.evaluation
            .as_ref()
            .map(|e| e.words.as_slice())
            .unwrap_or_default()
    }

    pub fn has_results(&self) -> bool {
        self.evaluation.is_some() || self.coaching.is_some()
    }

    /// Text read aloud by feedback playback. Empty when there is nothing to say.
    pub fn encouragement(&self) -> &str {
        self.coaching
            .as_ref()
            .and_then(|c| c.encouragement.as_deref())
            .unwrap_or("")
    }

    pub fn encouragement_line(&self) -> String {
        match self.encouragement() {
            "" => NO_ENCOURAGEMENT.to_string(),
            text => text.to_string(),
        }
    }

    pub fn tip_lines(&self) -> Vec<String> {
        let tips = self.coaching.as_ref().and_then(|c| c.tips.as_ref());
        match tips {
            Some(tips) if !tips.is_empty() => tips
                .iter()
                .map(|t| format!("{}: {}", t.word, t.tip))
                .collect(),
            _ => vec![NO_TIPS.to_string()],
        }
    }

    pub fn question_lines(&self) -> Vec<String> {
        let questions = self.coaching.as_ref().and_then(|c| c.questions.as_ref());
        match questions {
            Some(questions) if !questions.is_empty() => questions
                .iter()
                .enumerate()
                .map(|(i, q)| format!("{}. {}", i + 1, q))
                .collect(),
            _ => vec![NO_QUESTIONS.to_string()],
        }
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Transcribe => "Transcription",
        Stage::Evaluate => "Scoring",
        Stage::Coach => "Coaching",
    }
}
