use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use eda_agent::{
    codegen::baseline_code,
    config::{Config, PipelineSettings},
    dataset::{from_csv_reader, Dataset},
    error::{LlmError, SandboxError},
    execution::{CodeRunner, ExecutionAttempt},
    llm::{OfflineGenerator, TextGenerator},
    pipeline::{AnalysisOutcome, Controller, REPORT_FALLBACK},
    planner::{Task, TaskType},
};

/// Scripted executor: pops one verdict per call, succeeding once the script
/// runs out.
#[derive(Default)]
struct ScriptedRunner {
    verdicts: Mutex<VecDeque<bool>>,
    always_fail: bool,
    host_error: Option<fn() -> SandboxError>,
    codes: Mutex<Vec<(TaskType, String)>>,
}

impl ScriptedRunner {
    fn script(verdicts: &[bool]) -> Self {
        Self {
            verdicts: Mutex::new(verdicts.iter().copied().collect()),
            ..Default::default()
        }
    }

    fn failing() -> Self {
        Self {
            always_fail: true,
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.codes.lock().unwrap().len()
    }
}

#[async_trait]
impl CodeRunner for ScriptedRunner {
    async fn execute(
        &self,
        code: &str,
        _dataset: &Dataset,
        task: &Task,
    ) -> Result<ExecutionAttempt, SandboxError> {
        if let Some(make) = self.host_error {
            return Err(make());
        }
        self.codes.lock().unwrap().push((task.task_type, code.to_string()));
        let ok = !self.always_fail && self.verdicts.lock().unwrap().pop_front().unwrap_or(true);
        Ok(if ok {
            ExecutionAttempt::succeeded(code, format!("ran {}", task.task_type), vec![], task, 1000)
        } else {
            ExecutionAttempt::failed(code, "ValueError: scripted failure", "Traceback ...")
        })
    }
}

/// Answers each kind of request with a fixed text.
struct RoleAwareGenerator;

#[async_trait]
impl TextGenerator for RoleAwareGenerator {
    async fn generate(&self, _system: &str, user: &str) -> Result<String, LlmError> {
        Ok(if user.starts_with("Analysis task:") {
            "Here you go:\n```python\nfig = enhanced()\n```".into()
        } else if user.starts_with("Code that failed:") {
            "fig = revised()".into()
        } else if user.starts_with("Report to review:") {
            "REVIEWED REPORT".into()
        } else {
            "DRAFT REPORT".into()
        })
    }
}

fn numeric_dataset() -> Dataset {
    from_csv_reader("a,b,c\n1,2.5,3\n4,5.5,6\n7,8.5,9\n".as_bytes()).unwrap()
}

fn settings(retry_limit: u32, max_tasks: usize) -> PipelineSettings {
    PipelineSettings {
        retry_limit,
        max_tasks,
        ..PipelineSettings::default()
    }
}

async fn run_with(
    generator: Arc<dyn TextGenerator>,
    runner: Arc<ScriptedRunner>,
    settings: PipelineSettings,
) -> AnalysisOutcome {
    let controller = Controller::new(generator, runner, &Config::default(), settings);
    controller.run(&numeric_dataset()).await
}

fn entries_for(outcome: &AnalysisOutcome, index: usize) -> Vec<&ExecutionAttempt> {
    outcome
        .execution_results
        .iter()
        .filter(|r| r.task_index == index)
        .map(|r| &r.attempt)
        .collect()
}

#[tokio::test]
async fn always_failing_tasks_are_abandoned_not_the_run() {
    let runner = Arc::new(ScriptedRunner::failing());
    let out = run_with(Arc::new(OfflineGenerator), runner.clone(), settings(3, 2)).await;

    assert!(out.success, "{:?}", out.error);
    assert_eq!(runner.calls(), 2 * 4);
    assert_eq!(entries_for(&out, 0).len(), 4);
    assert_eq!(entries_for(&out, 1).len(), 4);
    assert!(out.execution_results.iter().all(|r| !r.attempt.success));
    assert_eq!(out.report, REPORT_FALLBACK);
}

#[tokio::test]
async fn success_on_third_attempt_advances_once() {
    let runner = Arc::new(ScriptedRunner::script(&[false, false, true]));
    let out = run_with(Arc::new(OfflineGenerator), runner.clone(), settings(3, 5)).await;

    assert!(out.success);
    let first = entries_for(&out, 0);
    assert_eq!(first.len(), 3);
    assert!(first[2].success);
    assert!(!first[0].success && !first[1].success);
    for i in 1..5 {
        assert_eq!(entries_for(&out, i).len(), 1, "task {i}");
    }
    assert_eq!(out.execution_results.len(), 3 + 4);
}

#[tokio::test]
async fn failure_streak_does_not_carry_into_next_task() {
    // task 0 exhausts its single revision; task 1 still gets one
    let runner = Arc::new(ScriptedRunner::script(&[false, false, false, true]));
    let out = run_with(Arc::new(OfflineGenerator), runner, settings(1, 2)).await;

    assert_eq!(entries_for(&out, 0).len(), 2);
    let second = entries_for(&out, 1);
    assert_eq!(second.len(), 2);
    assert!(second[1].success);
}

#[tokio::test]
async fn offline_run_uses_baseline_code_and_keeps_it_on_retry() {
    let runner = Arc::new(ScriptedRunner::script(&[false]));
    let out = run_with(Arc::new(OfflineGenerator), runner.clone(), settings(3, 5)).await;

    let codes = runner.codes.lock().unwrap().clone();
    let first_task = out.plan.get(0).unwrap();
    assert_eq!(codes[0].1, baseline_code(first_task));
    assert_eq!(codes[1].1, codes[0].1);
    let kinds: Vec<TaskType> = out.plan.iter().map(|t| t.task_type).collect();
    assert_eq!(
        kinds,
        vec![
            TaskType::BasicInfo,
            TaskType::Histogram,
            TaskType::Histogram,
            TaskType::Histogram,
            TaskType::CorrelationMatrix
        ]
    );
}

#[tokio::test]
async fn collaborator_output_flows_through_every_stage() {
    let runner = Arc::new(ScriptedRunner::script(&[false]));
    let out = run_with(Arc::new(RoleAwareGenerator), runner.clone(), settings(3, 2)).await;

    let codes = runner.codes.lock().unwrap().clone();
    assert_eq!(codes[0].1, "fig = enhanced()");
    assert_eq!(codes[1].1, "fig = revised()");
    assert_eq!(out.report, "REVIEWED REPORT");
    assert!(out.success);
}

#[tokio::test]
async fn step_ceiling_aborts_with_structured_failure() {
    let runner = Arc::new(ScriptedRunner::failing());
    let mut s = settings(3, 5);
    s.step_limit = 10;
    let out = run_with(Arc::new(OfflineGenerator), runner, s).await;

    assert!(!out.success);
    assert!(out.error.as_deref().unwrap().contains("Step budget of 10"));
    assert_eq!(out.steps, 11);
    assert!(out.profile.is_some());
}

#[tokio::test]
async fn host_failures_abort_the_run() {
    let runner = Arc::new(ScriptedRunner {
        host_error: Some(|| SandboxError::Bootstrap("pandas/numpy unavailable".into())),
        ..Default::default()
    });
    let out = run_with(Arc::new(OfflineGenerator), runner, settings(3, 5)).await;
    assert!(!out.success);
    assert!(out.error.unwrap().contains("pandas/numpy unavailable"));
    assert!(out.execution_results.is_empty());

    let runner = Arc::new(ScriptedRunner {
        host_error: Some(|| SandboxError::DatasetCopy("out of memory".into())),
        ..Default::default()
    });
    let out = run_with(Arc::new(OfflineGenerator), runner, settings(3, 5)).await;
    assert!(out.error.unwrap().starts_with("Dataset copy could not be created"));
}

#[tokio::test]
async fn empty_dataset_still_produces_a_full_plan() {
    let runner = Arc::new(ScriptedRunner::default());
    let controller = Controller::new(
        Arc::new(OfflineGenerator),
        runner.clone(),
        &Config::default(),
        settings(3, 5),
    );
    let out = controller.run(&Dataset::default()).await;
    assert!(out.success);
    assert_eq!(out.plan.len(), 5);
    assert!(out.plan.iter().all(|t| t.task_type == TaskType::BasicInfo));
    assert_eq!(runner.calls(), 5);
}
