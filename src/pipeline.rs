//! Post-recording feedback: transcribe, evaluate, persist, coach.
//!
//! Stages run strictly in order; each one starts only after the previous
//! stage's response is in. Failures are contained per stage and reported as
//! [`PipelineUpdate`]s so the render state can follow along.

use std::str::FromStr;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::api::{CoachRequest, EvaluateRequest, FeedbackApi, Submission};
use crate::capture::AudioArtifact;
use crate::context::PracticeContext;
use crate::model::{CoachingResult, EvaluationResult};

/// What to do when the transcription stage fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TranscribeFailurePolicy {
    /// Score and coach an empty transcript.
    #[default]
    Continue,
    /// Stop the pipeline after reporting the failure.
    Abort,
}

impl FromStr for TranscribeFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "continue" => Ok(Self::Continue),
            "abort" => Ok(Self::Abort),
            other => Err(format!("unknown transcribe failure policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Stage {
    Transcribe,
    Evaluate,
    Coach,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineUpdate {
    Transcribed(String),
    Evaluated(EvaluationResult),
    Coached(CoachingResult),
    StageFailed { stage: Stage, message: String },
    Finished(PipelineOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    Completed,
    /// An essential stage failed and nothing after it could run.
    Aborted(Stage),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineReport {
    pub transcript: Option<String>,
    pub evaluation: Option<EvaluationResult>,
    pub coaching: Option<CoachingResult>,
}

pub struct FeedbackPipeline<'a> {
    api: &'a dyn FeedbackApi,
    policy: TranscribeFailurePolicy,
}

impl<'a> FeedbackPipeline<'a> {
    pub fn new(api: &'a dyn FeedbackApi, policy: TranscribeFailurePolicy) -> Self {
        Self { api, policy }
    }

    /// Runs every stage for one attempt, calling `on_update` after each.
    /// The last update is always [`PipelineUpdate::Finished`].
    pub async fn run<F>(
        &self,
        ctx: &PracticeContext,
        audio: &AudioArtifact,
        mut on_update: F,
    ) -> PipelineReport
    where
        F: FnMut(PipelineUpdate) + Send,
    {
        let mut report = PipelineReport::default();

        let transcript = match self.api.transcribe(audio).await {
            Ok(text) => text,
            Err(e) => {
                error!("transcription failed: {}", e);
                on_update(PipelineUpdate::StageFailed {
                    stage: Stage::Transcribe,
                    message: e.to_string(),
                });
                if self.policy == TranscribeFailurePolicy::Abort {
                    on_update(PipelineUpdate::Finished(PipelineOutcome::Aborted(
                        Stage::Transcribe,
                    )));
                    return report;
                }
                String::new()
            }
        };
        debug!("transcript: {:?}", transcript);
        report.transcript = Some(transcript.clone());
        on_update(PipelineUpdate::Transcribed(transcript.clone()));

        let evaluate = EvaluateRequest {
            target: ctx.passage_text.clone(),
            transcript: transcript.clone(),
        };
        let evaluation = match self.api.evaluate(&evaluate).await {
            Ok(evaluation) => evaluation,
            Err(e) => {
                error!("evaluation failed: {}", e);
                on_update(PipelineUpdate::StageFailed {
                    stage: Stage::Evaluate,
                    message: e.to_string(),
                });
                on_update(PipelineUpdate::Finished(PipelineOutcome::Aborted(
                    Stage::Evaluate,
                )));
                return report;
            }
        };
        info!(
            "accuracy {} with {} words scored",
            evaluation.accuracy,
            evaluation.words.len()
        );
        on_update(PipelineUpdate::Evaluated(evaluation.clone()));

        let misreads = evaluation.misread_words();

        self.persist(ctx, &evaluation, &misreads).await;

        let grade_level = self.resolve_grade_level(ctx).await;
        let request = CoachRequest {
            target: ctx.passage_text.clone(),
            transcript,
            misreads,
            grade_level,
        };
        let coaching = self.api.coach(&request).await;

        match coaching {
            Ok(coaching) => {
                on_update(PipelineUpdate::Coached(coaching.clone()));
                report.coaching = Some(coaching);
            }
            Err(e) => {
                warn!("coaching failed: {}", e);
                on_update(PipelineUpdate::StageFailed {
                    stage: Stage::Coach,
                    message: e.to_string(),
                });
            }
        }

        report.evaluation = Some(evaluation);
        on_update(PipelineUpdate::Finished(PipelineOutcome::Completed));
        report
    }

    async fn persist(&self, ctx: &PracticeContext, evaluation: &EvaluationResult, misreads: &[String]) {
        let Some(assignment_id) = ctx.assignment_id else {
            debug!("no assignment, skipping submission");
            return;
        };
        let submission = Submission {
            assignment_id,
            accuracy: evaluation.accuracy,
            words_missed: misreads.to_vec(),
            submitted: false,
        };
        match self.api.submit(&submission).await {
            Ok(()) => info!("saved submission for assignment {}", assignment_id),
            Err(e) => error!("error saving submission data: {}", e),
        }
    }

    async fn resolve_grade_level(&self, ctx: &PracticeContext) -> Option<u32> {
        let assignment_id = ctx.assignment_id?;
        match self.api.grade_level(assignment_id).await {
            Ok(level) => level,
            Err(e) => {
                warn!("could not load grade level for assignment {}: {}", assignment_id, e);
                None
            }
        }
    }
}
