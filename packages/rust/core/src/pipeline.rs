//! Multi-step workflow: text → summary → bullets → questions.
//!
//! The workflow is a linear state machine. Each state knows which prompt to
//! send next and how to absorb the model's output; [`run_workflow`] drives it
//! through the gateway one call at a time. Any gateway failure aborts the run
//! and discards everything produced so far.

use tracing::{debug, info, instrument, warn};

use minilangflow_shared::{Result, WorkflowResult};

use crate::gateway::ModelGateway;
use crate::templates;

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// One model call of the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowStep {
    Summarize,
    Bullets,
    Questions,
}

impl WorkflowStep {
    /// Steps in execution order.
    pub const ALL: [WorkflowStep; 3] = [Self::Summarize, Self::Bullets, Self::Questions];

    /// Short name used in diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summarize => "summarize",
            Self::Bullets => "bullets",
            Self::Questions => "questions",
        }
    }

    /// 1-based position in [`WorkflowStep::ALL`].
    pub fn number(&self) -> usize {
        match self {
            Self::Summarize => 1,
            Self::Bullets => 2,
            Self::Questions => 3,
        }
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Accumulated outputs before the workflow completes.
///
/// `INIT → SUMMARIZED → BULLETED`; absorbing the questions output from
/// `BULLETED` assembles the final [`WorkflowResult`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Init { text: String },
    Summarized { summary: String },
    Bulleted { summary: String, bullets: String },
}

/// Outcome of absorbing one step's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Next(PipelineState),
    Done(WorkflowResult),
}

impl PipelineState {
    /// Starting state for `text`.
    pub fn new(text: impl Into<String>) -> Self {
        Self::Init { text: text.into() }
    }

    /// Name of the current state.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::Summarized { .. } => "summarized",
            Self::Bulleted { .. } => "bulleted",
        }
    }

    /// Step whose output this state is waiting for.
    pub fn next_step(&self) -> WorkflowStep {
        match self {
            Self::Init { .. } => WorkflowStep::Summarize,
            Self::Summarized { .. } => WorkflowStep::Bullets,
            Self::Bulleted { .. } => WorkflowStep::Questions,
        }
    }

    /// Prompt for [`PipelineState::next_step`], built from the accumulated outputs.
    pub fn prompt(&self) -> String {
        match self {
            Self::Init { text } => templates::workflow_summary_prompt(text),
            Self::Summarized { summary } => templates::bullets_prompt(summary),
            Self::Bulleted { summary, bullets } => templates::questions_prompt(summary, bullets),
        }
    }

    /// Absorb the model output for the pending step.
    pub fn advance(self, output: String) -> Transition {
        match self {
            Self::Init { .. } => Transition::Next(Self::Summarized { summary: output }),
            Self::Summarized { summary } => Transition::Next(Self::Bulleted {
                summary,
                bullets: output,
            }),
            Self::Bulleted { summary, bullets } => Transition::Done(WorkflowResult {
                summary,
                bullets,
                questions: output,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Progress trait
// ---------------------------------------------------------------------------

/// Progress callback for workflow runs.
pub trait WorkflowProgress: Send + Sync {
    /// Called before the step's gateway call is issued.
    fn step_started(&self, step: WorkflowStep);
    /// Called once the step's output has been absorbed.
    fn step_finished(&self, step: WorkflowStep);
}

/// No-op workflow progress.
pub struct SilentWorkflowProgress;

impl WorkflowProgress for SilentWorkflowProgress {
    fn step_started(&self, _step: WorkflowStep) {}
    fn step_finished(&self, _step: WorkflowStep) {}
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Run the full workflow for `text`.
///
/// Issues exactly three sequential gateway calls on success. The first
/// failure is returned unchanged and no partial result escapes.
#[instrument(skip_all, fields(text_chars = text.chars().count()))]
pub async fn run_workflow(
    gateway: &dyn ModelGateway,
    text: &str,
    progress: &dyn WorkflowProgress,
) -> Result<WorkflowResult> {
    let mut state = PipelineState::new(text);

    loop {
        let step = state.next_step();
        progress.step_started(step);
        debug!(stage = state.stage(), step = step.as_str(), "workflow step started");

        let output = gateway.generate(&state.prompt()).await.inspect_err(|e| {
            warn!(stage = state.stage(), step = step.as_str(), error = %e, "workflow aborted");
        })?;

        progress.step_finished(step);

        match state.advance(output) {
            Transition::Next(next) => state = next,
            Transition::Done(result) => {
                info!("workflow complete");
                return Ok(result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use minilangflow_shared::FlowError;

    use super::*;
    use crate::testing::ScriptedGateway;

    /// Records progress callbacks in order.
    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<String>>,
    }

    impl WorkflowProgress for RecordingProgress {
        fn step_started(&self, step: WorkflowStep) {
            self.events.lock().unwrap().push(format!("start:{}", step.as_str()));
        }
        fn step_finished(&self, step: WorkflowStep) {
            self.events.lock().unwrap().push(format!("finish:{}", step.as_str()));
        }
    }

    const WORKFLOW_SUMMARY: &str = "Tu es un assistant IA.\nRésume";

    fn scripted() -> ScriptedGateway {
        ScriptedGateway::new()
            .reply(WORKFLOW_SUMMARY, "SUMMARY")
            .reply("À partir du résumé", "- BULLETS")
            .reply("À partir du contenu", "QUESTIONS")
    }

    #[test]
    fn states_advance_linearly() {
        let state = PipelineState::new("texte");
        assert_eq!(state.stage(), "init");
        assert_eq!(state.next_step(), WorkflowStep::Summarize);

        let Transition::Next(state) = state.advance("S".into()) else {
            panic!("expected next state");
        };
        assert_eq!(state.stage(), "summarized");
        assert!(state.prompt().contains('S'));

        let Transition::Next(state) = state.advance("B".into()) else {
            panic!("expected next state");
        };
        assert_eq!(state.stage(), "bulleted");
        assert_eq!(state.next_step(), WorkflowStep::Questions);

        assert_eq!(
            state.advance("Q".into()),
            Transition::Done(WorkflowResult {
                summary: "S".into(),
                bullets: "B".into(),
                questions: "Q".into(),
            })
        );
    }

    #[test]
    fn step_numbers_follow_order() {
        let numbers: Vec<usize> = WorkflowStep::ALL.iter().map(|s| s.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn runs_three_calls_in_order() {
        let gateway = scripted();
        let progress = RecordingProgress::default();

        let result = run_workflow(&gateway, "Le chat dort.", &progress).await.unwrap();
        assert_eq!(
            result,
            WorkflowResult {
                summary: "SUMMARY".into(),
                bullets: "- BULLETS".into(),
                questions: "QUESTIONS".into(),
            }
        );

        let prompts = gateway.prompts();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].contains("Le chat dort."));
        assert!(prompts[0].contains("en gardant les informations clés"));
        assert!(prompts[1].contains("SUMMARY"));
        assert!(prompts[2].contains("SUMMARY"));
        assert!(prompts[2].contains("- BULLETS"));

        assert_eq!(
            *progress.events.lock().unwrap(),
            vec![
                "start:summarize",
                "finish:summarize",
                "start:bullets",
                "finish:bullets",
                "start:questions",
                "finish:questions",
            ]
        );
    }

    #[tokio::test]
    async fn second_call_failure_aborts_without_partial_result() {
        let gateway = scripted().fail_at(2);

        let err = run_workflow(&gateway, "texte", &SilentWorkflowProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Gateway(_)));
        assert_eq!(gateway.call_count(), 2);
    }

    #[tokio::test]
    async fn first_call_failure_stops_immediately() {
        let gateway = scripted().fail_at(1);
        let progress = RecordingProgress::default();

        assert!(run_workflow(&gateway, "texte", &progress).await.is_err());
        assert_eq!(gateway.call_count(), 1);
        assert_eq!(*progress.events.lock().unwrap(), vec!["start:summarize"]);
    }
}
