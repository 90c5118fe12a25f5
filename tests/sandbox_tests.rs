//! Runs the real interpreter. Each test returns early when `python3` with the
//! needed packages is not installed.

use std::{process::Command, time::Duration};

use eda_agent::{
    config::SandboxSettings,
    dataset::{from_csv_reader, Dataset},
    error::SandboxError,
    execution::{ArtifactKind, CodeRunner, PythonSandbox},
    planner::Task,
};

fn python_has(modules: &str) -> bool {
    Command::new("python3")
        .args(["-c", &format!("import {modules}")])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn sandbox() -> PythonSandbox {
    PythonSandbox::new(SandboxSettings {
        timeout: Duration::from_secs(30),
        ..SandboxSettings::default()
    })
}

fn dataset() -> Dataset {
    from_csv_reader("a,b,city\n1,2.5,Tokyo\n2,,Osaka\n3,4.5,Tokyo\n".as_bytes()).unwrap()
}

#[tokio::test]
async fn prints_are_captured_and_bindings_reported() {
    if !python_has("pandas, numpy") {
        return;
    }
    let code = "n = len(df)\ntotal = int(df['a'].sum())\nprint('rows', n)";
    let a = sandbox().execute(code, &dataset(), &Task::basic_info()).await.unwrap();
    assert!(a.success, "{}", a.error);
    assert_eq!(a.stdout.trim(), "rows 3");
    assert_eq!(a.variables["n"], "3");
    assert_eq!(a.variables["total"], "6");
    assert!(!a.variables.contains_key("df"));
    assert_eq!(a.artifact, ArtifactKind::Text);
    assert!(a.notice.is_none());
}

#[tokio::test]
async fn mutations_do_not_leak_between_calls() {
    if !python_has("pandas, numpy") {
        return;
    }
    let ds = dataset();
    let sb = sandbox();
    let task = Task::basic_info();
    let mutate = "df['a'] = 100\ndf.drop(columns=['b'], inplace=True)";
    assert!(sb.execute(mutate, &ds, &task).await.unwrap().success);
    let check = "print(int(df['a'].sum()), list(df.columns))";
    let a = sb.execute(check, &ds, &task).await.unwrap();
    assert_eq!(a.stdout.trim(), "6 ['a', 'b', 'city']");
    assert_eq!(ds, dataset());
}

#[tokio::test]
async fn names_outside_the_allow_list_fail_as_task_errors() {
    if !python_has("pandas, numpy") {
        return;
    }
    let sb = sandbox();
    let task = Task::basic_info();
    for (code, kind) in [
        ("open('/etc/passwd').read()", "NameError"),
        ("import os\nos.listdir('/')", "ImportError"),
        ("__import__('subprocess')", "ImportError"),
        ("eval('1 + 1')", "NameError"),
    ] {
        let a = sb.execute(code, &dataset(), &task).await.unwrap();
        assert!(!a.success, "{code} should fail");
        assert!(a.error.starts_with(kind), "{code}: {}", a.error);
    }
}

#[tokio::test]
async fn failure_reports_error_text_and_stderr_channel() {
    if !python_has("pandas, numpy") {
        return;
    }
    let code = "print('visible')\nraise ValueError('bad column')";
    let a = sandbox().execute(code, &dataset(), &Task::basic_info()).await.unwrap();
    assert!(!a.success);
    assert_eq!(a.error, "ValueError: bad column");
    assert!(!a.stdout.contains("visible"));
    assert!(a.figures.is_empty() && a.variables.is_empty());
}

#[tokio::test]
async fn plotly_figures_are_detected() {
    if !python_has("pandas, numpy, plotly") {
        return;
    }
    let code = "fig = px.histogram(df, x='a')\nlabel = 'hist'";
    let a = sandbox().execute(code, &dataset(), &Task::histogram("a")).await.unwrap();
    assert!(a.success, "{}", a.error);
    assert_eq!(a.figures.len(), 1);
    assert_eq!(a.figures[0].name, "fig");
    assert!(a.figures[0].kind.to_lowercase().contains("plotly"));
    assert!(a.figures[0].spec.get("data").is_some());
    assert_eq!(a.variables["label"], "hist");
    assert_eq!(a.artifact, ArtifactKind::Figure);
}

#[tokio::test]
async fn chart_export_with_nan_keeps_the_attempt() {
    if !python_has("pandas, numpy") {
        return;
    }
    let code = "Chart = type('Chart', (), {'data': [1], 'show': lambda self: None,\n    \
                'to_dict': lambda self: {'y': [float('nan')]}})\nfig = Chart()\nprint('built')";
    let a = sandbox().execute(code, &dataset(), &Task::histogram("a")).await.unwrap();
    assert!(a.success, "{}", a.error);
    assert_eq!(a.stdout.trim(), "built");
    let fig = a.figures.iter().find(|f| f.name == "fig").unwrap();
    assert!(fig.spec.is_null());
}

#[tokio::test]
async fn chart_task_without_figure_is_flagged() {
    if !python_has("pandas, numpy") {
        return;
    }
    let a = sandbox()
        .execute("counts = df['city'].value_counts()", &dataset(), &Task::bar_chart("city"))
        .await
        .unwrap();
    assert!(a.success);
    assert!(a.figures.is_empty());
    assert!(a.notice.unwrap().contains("counts"));
}

#[tokio::test]
async fn runaway_code_times_out() {
    if !python_has("pandas, numpy") {
        return;
    }
    let sb = PythonSandbox::new(SandboxSettings {
        timeout: Duration::from_secs(2),
        ..SandboxSettings::default()
    });
    let a = sb.execute("while True:\n    pass", &dataset(), &Task::basic_info()).await.unwrap();
    assert!(!a.success);
    assert!(a.error.contains("timed out after 2s"));
}

#[tokio::test]
async fn missing_interpreter_is_fatal() {
    let sb = PythonSandbox::new(SandboxSettings {
        python: "no-such-python-interpreter".into(),
        ..SandboxSettings::default()
    });
    let err = sb.execute("x = 1", &dataset(), &Task::basic_info()).await.unwrap_err();
    assert!(matches!(err, SandboxError::Spawn { .. }));
}
