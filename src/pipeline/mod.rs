//! The analysis pipeline as an explicit state machine.
//!
//! [`transition`] is pure: it takes the owned [`PipelineState`] and the event
//! the controller just observed, and returns the next state together with the
//! single [`Effect`] the controller must perform next. All I/O lives in
//! [`controller::Controller`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    error::PipelineError,
    execution::ExecutionAttempt,
    planner::{Plan, Task},
    profile::Profile,
};

pub mod controller;
pub mod report;

pub use controller::{load_dataset, AnalysisOutcome, Controller};
pub use report::{digest, DigestEntry, Reporter, REPORT_FALLBACK};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Profiling,
    Planning,
    Synthesizing,
    Executing,
    Revising,
    Advancing,
    Reporting,
    Reviewing,
    Done,
    Aborted,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Profiling => "profiling",
            Stage::Planning => "planning",
            Stage::Synthesizing => "synthesizing",
            Stage::Executing => "executing",
            Stage::Revising => "revising",
            Stage::Advancing => "advancing",
            Stage::Reporting => "reporting",
            Stage::Reviewing => "reviewing",
            Stage::Done => "done",
            Stage::Aborted => "aborted",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Aborted)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run-wide bounds, fixed when the state is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub retry_limit: u32,
    pub step_limit: usize,
}

/// One entry of the append-only execution log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub task_index: usize,
    pub task: Task,
    #[serde(flatten)]
    pub attempt: ExecutionAttempt,
}

#[derive(Debug, Clone)]
pub struct PipelineState {
    pub stage: Stage,
    pub limits: Limits,
    pub profile: Option<Profile>,
    pub plan: Plan,
    pub cursor: usize,
    /// Code for the current task; replaced by each successful revision.
    pub code: String,
    pub consecutive_errors: u32,
    pub log: Vec<ExecutionRecord>,
    pub report: String,
    pub steps: usize,
    pub error: Option<String>,
}

impl PipelineState {
    pub fn new(limits: Limits) -> Self {
        Self {
            stage: Stage::Profiling,
            limits,
            profile: None,
            plan: Plan::default(),
            cursor: 0,
            code: String::new(),
            consecutive_errors: 0,
            log: Vec::new(),
            report: String::new(),
            steps: 0,
            error: None,
        }
    }

    pub fn current_task(&self) -> Option<&Task> {
        self.plan.get(self.cursor)
    }
}

#[derive(Debug)]
pub enum Event {
    Start,
    Profiled(Profile),
    Planned(Plan),
    CodeReady(String),
    Executed(ExecutionAttempt),
    /// `None` when no revision could be obtained; the failing code is kept.
    Revised(Option<String>),
    Advanced,
    Reported(String),
    Reviewed(String),
    Failed(PipelineError),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Start => "start",
            Event::Profiled(_) => "profiled",
            Event::Planned(_) => "planned",
            Event::CodeReady(_) => "code_ready",
            Event::Executed(_) => "executed",
            Event::Revised(_) => "revised",
            Event::Advanced => "advanced",
            Event::Reported(_) => "reported",
            Event::Reviewed(_) => "reviewed",
            Event::Failed(_) => "failed",
        }
    }
}

#[derive(Debug)]
pub enum Effect {
    Profile,
    Plan,
    Synthesize { task: Task },
    Execute { code: String, task: Task },
    Revise { code: String, error: String },
    Advance,
    Report { digest: Vec<DigestEntry> },
    Review { report: String },
    Finish,
    Abort(PipelineError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Retry,
    Advance,
}

/// Retry or move on, given the last attempt and the number of failures
/// already sent back for revision on this task.
pub fn decide(attempt: &ExecutionAttempt, consecutive_errors: u32, retry_limit: u32) -> Decision {
    if !attempt.success && consecutive_errors < retry_limit {
        Decision::Retry
    } else {
        Decision::Advance
    }
}

pub fn transition(mut state: PipelineState, event: Event) -> (PipelineState, Effect) {
    if state.stage.is_terminal() {
        return invalid(state, &event);
    }

    state.steps += 1;
    if state.steps > state.limits.step_limit {
        let limit = state.limits.step_limit;
        return abort(state, PipelineError::StepBudgetExceeded { limit });
    }

    match (state.stage, event) {
        (_, Event::Failed(err)) => abort(state, err),

        (Stage::Profiling, Event::Start) => (state, Effect::Profile),

        (Stage::Profiling, Event::Profiled(profile)) => {
            state.profile = Some(profile);
            state.stage = Stage::Planning;
            (state, Effect::Plan)
        }

        (Stage::Planning, Event::Planned(plan)) => {
            state.plan = plan;
            state.cursor = 0;
            state.consecutive_errors = 0;
            next_task(state)
        }

        (Stage::Synthesizing, Event::CodeReady(code)) => {
            state.code = code;
            execute_current(state)
        }

        (Stage::Executing, Event::Executed(attempt)) => {
            let decision = decide(&attempt, state.consecutive_errors, state.limits.retry_limit);
            if attempt.success {
                state.consecutive_errors = 0;
            }
            let error = attempt.error.clone();
            let Some(task) = state.current_task().cloned() else {
                return invalid(state, &Event::Executed(attempt));
            };
            state.log.push(ExecutionRecord {
                task_index: state.cursor,
                task,
                attempt,
            });
            match decision {
                Decision::Retry => {
                    state.consecutive_errors += 1;
                    state.stage = Stage::Revising;
                    let code = state.code.clone();
                    (state, Effect::Revise { code, error })
                }
                Decision::Advance => {
                    state.stage = Stage::Advancing;
                    (state, Effect::Advance)
                }
            }
        }

        (Stage::Revising, Event::Revised(code)) => {
            if let Some(code) = code {
                state.code = code;
            }
            execute_current(state)
        }

        (Stage::Advancing, Event::Advanced) => {
            state.cursor += 1;
            state.consecutive_errors = 0;
            next_task(state)
        }

        (Stage::Reporting, Event::Reported(report)) => {
            state.report = report;
            state.stage = Stage::Reviewing;
            let report = state.report.clone();
            (state, Effect::Review { report })
        }

        (Stage::Reviewing, Event::Reviewed(report)) => {
            state.report = report;
            state.stage = Stage::Done;
            (state, Effect::Finish)
        }

        (_, event) => invalid(state, &event),
    }
}

/// Synthesize the task under the cursor, or report once the plan is exhausted.
fn next_task(mut state: PipelineState) -> (PipelineState, Effect) {
    match state.current_task().cloned() {
        Some(task) => {
            state.stage = Stage::Synthesizing;
            state.code.clear();
            (state, Effect::Synthesize { task })
        }
        None => {
            state.stage = Stage::Reporting;
            let digest = digest(&state.log);
            (state, Effect::Report { digest })
        }
    }
}

fn execute_current(mut state: PipelineState) -> (PipelineState, Effect) {
    match state.current_task().cloned() {
        Some(task) => {
            state.stage = Stage::Executing;
            let code = state.code.clone();
            (state, Effect::Execute { code, task })
        }
        None => {
            let stage = state.stage.to_string();
            abort(
                state,
                PipelineError::InvalidTransition {
                    stage,
                    event: "execute without a task".into(),
                },
            )
        }
    }
}

fn invalid(state: PipelineState, event: &Event) -> (PipelineState, Effect) {
    let err = PipelineError::InvalidTransition {
        stage: state.stage.to_string(),
        event: event.name().to_string(),
    };
    abort(state, err)
}

fn abort(mut state: PipelineState, err: PipelineError) -> (PipelineState, Effect) {
    state.stage = Stage::Aborted;
    state.error = Some(err.to_string());
    (state, Effect::Abort(err))
}
