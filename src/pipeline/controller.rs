use std::{path::Path, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::{transition, Effect, Event, ExecutionRecord, Limits, PipelineState, Reporter};
use crate::{
    codegen::CodeSynthesizer,
    config::{Config, PipelineSettings},
    dataset::{read_csv, Dataset},
    error::{PipelineError, SandboxError},
    execution::CodeRunner,
    llm::TextGenerator,
    planner::{plan, Plan},
    profile::{profile as profile_dataset, Profile},
};

/// Structured result of one run. Fatal errors end up here too, with
/// `success == false`; the run itself never panics or propagates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub success: bool,
    pub report: String,
    pub plan: Plan,
    pub execution_results: Vec<ExecutionRecord>,
    pub profile: Option<Profile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub steps: usize,
}

impl AnalysisOutcome {
    fn from_state(state: PipelineState) -> Self {
        Self {
            success: state.error.is_none(),
            report: state.report,
            plan: state.plan,
            execution_results: state.log,
            profile: state.profile,
            error: state.error,
            steps: state.steps,
        }
    }

    pub fn failure(err: &PipelineError) -> Self {
        Self {
            success: false,
            report: String::new(),
            plan: Plan::default(),
            execution_results: Vec::new(),
            profile: None,
            error: Some(err.to_string()),
            steps: 0,
        }
    }

    /// Figures across all attempts, in log order.
    pub fn figure_count(&self) -> usize {
        self.execution_results.iter().map(|r| r.attempt.figures.len()).sum()
    }
}

/// Reads the input file. Anything unreadable or malformed is a fatal input
/// error.
pub fn load_dataset(path: &Path) -> Result<Dataset, PipelineError> {
    read_csv(path).map_err(|e| PipelineError::Input(format!("{}: {e}", path.display())))
}

pub struct Controller {
    synthesizer: CodeSynthesizer,
    reporter: Reporter,
    runner: Arc<dyn CodeRunner>,
    settings: PipelineSettings,
}

impl Controller {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        runner: Arc<dyn CodeRunner>,
        cfg: &Config,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            synthesizer: CodeSynthesizer::new(generator.clone(), cfg),
            reporter: Reporter::new(generator, cfg),
            runner,
            settings,
        }
    }

    pub async fn run(&self, dataset: &Dataset) -> AnalysisOutcome {
        let limits = Limits {
            retry_limit: self.settings.retry_limit,
            step_limit: self.settings.step_limit,
        };
        let mut state = PipelineState::new(limits);
        let mut event = Event::Start;
        info!(
            rows = dataset.row_count(),
            columns = dataset.column_count(),
            max_tasks = self.settings.max_tasks,
            retry_limit = limits.retry_limit,
            "analysis started"
        );

        loop {
            let from = state.stage;
            let (next, effect) = transition(state, event);
            state = next;
            debug!(from = %from, to = %state.stage, step = state.steps, "transition");

            event = match effect {
                Effect::Finish => {
                    info!(
                        steps = state.steps,
                        attempts = state.log.len(),
                        "analysis finished"
                    );
                    return AnalysisOutcome::from_state(state);
                }
                Effect::Abort(err) => {
                    error!(error = %err, stage = %from, "analysis aborted");
                    return AnalysisOutcome::from_state(state);
                }
                effect => self
                    .perform(effect, &state, dataset)
                    .await
                    .unwrap_or_else(Event::Failed),
            };
        }
    }

    async fn perform(
        &self,
        effect: Effect,
        state: &PipelineState,
        dataset: &Dataset,
    ) -> Result<Event, PipelineError> {
        let profile = move || {
            state.profile.as_ref().ok_or_else(|| PipelineError::InvalidTransition {
                stage: state.stage.to_string(),
                event: "profile missing".into(),
            })
        };

        let event = match effect {
            Effect::Profile => {
                let p = profile_dataset(dataset);
                info!(rows = p.shape.0, columns = p.shape.1, "dataset profiled");
                Event::Profiled(p)
            }
            Effect::Plan => {
                let plan = plan(profile()?, self.settings.max_tasks);
                let kinds: Vec<&str> = plan.iter().map(|t| t.task_type.as_str()).collect();
                info!(tasks = ?kinds, "analysis planned");
                Event::Planned(plan)
            }
            Effect::Synthesize { task } => {
                info!(
                    task = state.cursor + 1,
                    of = state.plan.len(),
                    description = %task.description,
                    "synthesizing code"
                );
                let baseline = self.synthesizer.synthesize(&task);
                Event::CodeReady(self.synthesizer.enhance(&task, profile()?, &baseline).await)
            }
            Effect::Execute { code, task } => {
                let attempt = self
                    .runner
                    .execute(&code, dataset, &task)
                    .await
                    .map_err(host_failure)?;
                if attempt.success {
                    info!(task = state.cursor + 1, figures = attempt.figures.len(), "execution succeeded");
                } else {
                    warn!(
                        task = state.cursor + 1,
                        consecutive_errors = state.consecutive_errors,
                        error = %attempt.error,
                        "execution failed"
                    );
                }
                Event::Executed(attempt)
            }
            Effect::Revise { code, error } => {
                info!(task = state.cursor + 1, attempt = state.consecutive_errors, "revising code");
                Event::Revised(self.synthesizer.revise(&code, &error, profile()?).await)
            }
            Effect::Advance => Event::Advanced,
            Effect::Report { digest } => {
                info!(entries = digest.len(), "requesting report");
                Event::Reported(self.reporter.request_report(profile()?, &digest).await)
            }
            Effect::Review { report } => Event::Reviewed(self.reporter.review_report(&report).await),
            Effect::Finish | Effect::Abort(_) => {
                return Err(PipelineError::InvalidTransition {
                    stage: state.stage.to_string(),
                    event: "terminal effect".into(),
                })
            }
        };
        Ok(event)
    }
}

fn host_failure(err: SandboxError) -> PipelineError {
    match err {
        SandboxError::DatasetCopy(msg) => PipelineError::DatasetCopy(msg),
        other => PipelineError::Sandbox(other),
    }
}
