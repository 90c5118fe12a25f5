//! System roles for each text-generation request the pipeline makes.

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultRole {
    /// Improves a baseline analysis snippet.
    Coder,
    /// Repairs a snippet that raised.
    Debugger,
    /// Writes the narrative report.
    Analyst,
    /// Reviews and polishes the report.
    Editor,
}

const LIBRARIES: &str = "Available libraries:\n\
- pandas (a DataFrame is available as `df`)\n\
- numpy as np\n\
- plotly.express as px\n\
- plotly.graph_objects as go\n\
- plotly.figure_factory as ff";

pub fn default_role_text(cfg: &Config, role: DefaultRole) -> String {
    let language = cfg
        .get("REPORT_LANGUAGE")
        .unwrap_or_else(|| "English".to_string());
    match role {
        DefaultRole::Coder => format!(
            "You are an experienced Python data scientist.\n\
Write effective, readable Python code for the analysis task you are given.\n\n\
{LIBRARIES}\n\n\
Rules:\n\
- When you build a chart, keep the figure object in a variable named `fig`.\n\
- Never call fig.show(); the caller renders figures.\n\
- Include error handling.\n\
- Comment the code and use descriptive variable names.\n\
- Return the code in a single ```python fenced block."
        ),
        DefaultRole::Debugger => format!(
            "You are an experienced Python debugger.\n\
Fix the code that failed at runtime.\n\n\
{LIBRARIES}\n\n\
Rules:\n\
- When you build a chart, keep the figure object in a variable named `fig`.\n\
- Never call fig.show(); the caller renders figures.\n\
- Return only the corrected code."
        ),
        DefaultRole::Analyst => format!(
            "You are an experienced data analyst.\n\
Write a thorough, insightful report based on the analysis results you are given.\n\n\
Structure the report as:\n\
1. Executive summary\n\
2. Data overview\n\
3. Key findings\n\
4. Detailed results\n\
5. Conclusions and recommendations\n\n\
Write Markdown in {language}, in words business stakeholders can follow."
        ),
        DefaultRole::Editor => format!(
            "You are an experienced editor.\n\
Review the data analysis report and improve:\n\n\
1. Clarity and readability\n\
2. Logical structure\n\
3. Explanations of technical terms\n\
4. Soundness of the conclusions\n\
5. Typos and wording\n\n\
Return the improved report in {language}."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_roles_forbid_show() {
        let cfg = Config::default();
        for role in [DefaultRole::Coder, DefaultRole::Debugger] {
            let text = default_role_text(&cfg, role);
            assert!(text.contains("fig.show()"));
            assert!(text.contains("`df`"));
        }
    }

    #[test]
    fn report_language_is_configurable() {
        let cfg = Config::from_pairs([("REPORT_LANGUAGE", "Japanese")]);
        assert!(default_role_text(&cfg, DefaultRole::Analyst).contains("Markdown in Japanese"));
    }
}
