//! Printers: text and markdown (termimad), plus the Markdown renderings of
//! previews, plans and run outcomes they print.

use std::fmt::Write as _;

use owo_colors::OwoColorize;
use termimad::MadSkin;

use crate::{
    dataset::Dataset,
    pipeline::AnalysisOutcome,
    planner::Plan,
};

/// Rows shown in the data preview.
pub const PREVIEW_ROWS: usize = 10;

pub struct TextPrinter {
    pub color: Option<&'static str>,
}

impl TextPrinter {
    pub fn print(&self, text: &str) {
        if let Some(c) = self.color {
            match c {
                "green" => println!("{}", text.green()),
                "cyan" => println!("{}", text.cyan()),
                "red" => println!("{}", text.red()),
                "yellow" => println!("{}", text.yellow()),
                _ => println!("{}", text),
            }
        } else {
            println!("{}", text);
        }
    }
}

pub struct MarkdownPrinter {
    pub skin: MadSkin,
}

impl Default for MarkdownPrinter {
    fn default() -> Self {
        Self {
            skin: MadSkin::default(),
        }
    }
}

impl MarkdownPrinter {
    pub fn print(&self, text: &str) {
        self.skin.print_text(text);
        println!();
    }
}

/// Prints Markdown through termimad, or verbatim when `md` is off.
pub fn print_markdown(text: &str, md: bool) {
    if md {
        MarkdownPrinter::default().print(text);
    } else {
        TextPrinter { color: None }.print(text);
    }
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

pub fn preview_markdown(dataset: &Dataset) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "## Data preview\n");
    let _ = writeln!(out, "- Rows: {}", dataset.row_count());
    let _ = writeln!(out, "- Columns: {}", dataset.column_count());
    let _ = writeln!(out, "- Missing values: {}\n", dataset.total_nulls());
    if dataset.column_count() == 0 {
        return out;
    }

    let names: Vec<String> = dataset.column_names().iter().map(|n| cell(n)).collect();
    let _ = writeln!(out, "|{}|", names.join("|"));
    let _ = writeln!(out, "|{}|", vec!["-"; names.len()].join("|"));
    for row in dataset.head(PREVIEW_ROWS) {
        let cells: Vec<String> = row.iter().map(|v| cell(&v.render())).collect();
        let _ = writeln!(out, "|{}|", cells.join("|"));
    }
    out
}

pub fn plan_markdown(plan: &Plan) -> String {
    let mut out = String::from("## Analysis plan\n\n");
    for (i, task) in plan.iter().enumerate() {
        let _ = writeln!(out, "{}. `{}` {}", i + 1, task.task_type, task.description);
    }
    out
}

/// Per-task result blocks, in execution order, final attempt per task.
pub fn results_markdown(outcome: &AnalysisOutcome) -> String {
    let mut out = String::from("## Analysis results\n\n");
    for (i, task) in outcome.plan.iter().enumerate() {
        let attempts: Vec<_> = outcome
            .execution_results
            .iter()
            .filter(|r| r.task_index == i)
            .collect();
        let Some(last) = attempts.last() else {
            let _ = writeln!(out, "### Task {}: {}\n\nNot executed.\n", i + 1, task.description);
            continue;
        };
        let a = &last.attempt;
        let status = if a.success { "success" } else { "failed" };
        let _ = writeln!(out, "### Task {}: {}\n", i + 1, task.description);
        let _ = writeln!(
            out,
            "- Status: {status} after {} attempt(s)\n- Figures: {}",
            attempts.len(),
            a.figures.len()
        );
        if let Some(notice) = &a.notice {
            let _ = writeln!(out, "- Note: {notice}");
        }
        if !a.success {
            let _ = writeln!(out, "- Error: `{}`", cell(&a.error));
        }
        if !a.code.trim().is_empty() {
            let _ = writeln!(out, "\n```python\n{}\n```", a.code.trim_end());
        }
        if !a.stdout.trim().is_empty() {
            let _ = writeln!(out, "\n```\n{}\n```", a.stdout.trim_end());
        }
        out.push('\n');
    }
    out
}

pub fn print_outcome(outcome: &AnalysisOutcome, md: bool) {
    if !outcome.success {
        let err = outcome.error.as_deref().unwrap_or("unknown error");
        TextPrinter { color: Some("red") }.print(&format!("Analysis failed: {err}"));
        if outcome.execution_results.is_empty() {
            return;
        }
    }

    print_markdown(&results_markdown(outcome), md);
    if !outcome.report.is_empty() {
        print_markdown(&format!("## Report\n\n{}", outcome.report), md);
    }

    let summary = format!(
        "{} task(s), {} attempt(s), {} figure(s), {} step(s)",
        outcome.plan.len(),
        outcome.execution_results.len(),
        outcome.figure_count(),
        outcome.steps
    );
    let color = if outcome.success { "green" } else { "yellow" };
    TextPrinter { color: Some(color) }.print(&summary);
}
