use std::{
    collections::HashMap,
    env,
    fs,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    time::Duration,
};

use directories::BaseDirs;

use crate::planner::DEFAULT_MAX_TASKS;

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Default for Config {
    /// Built-in defaults only; no rc file is read.
    fn default() -> Self {
        Self {
            inner: default_map(),
            config_path: default_config_path(),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let config_path = default_config_path();
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Self {
        let mut map = default_map();

        // Read .edarc if exists
        if config_path.exists() {
            if let Ok(file) = fs::File::open(config_path) {
                let reader = BufReader::new(file);
                for line in reader.lines().map_while(Result::ok) {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    if let Some((k, v)) = line.split_once('=') {
                        map.insert(k.trim().to_string(), v.trim().to_string());
                    }
                }
            }
        }

        // Overlay environment variables (take precedence)
        for (k, v) in env::vars() {
            if is_config_key(&k) {
                map.insert(k, v);
            }
        }

        Self {
            inner: map,
            config_path: config_path.to_path_buf(),
        }
    }

    /// Defaults overlaid with explicit pairs, ignoring the rc file.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut cfg = Self::default();
        for (k, v) in pairs {
            cfg.inner.insert(k.to_string(), v.to_string());
        }
        cfg
    }

    pub fn get(&self, key: &str) -> Option<String> {
        // ENV first
        if let Ok(v) = env::var(key) {
            return Some(v);
        }
        self.inner.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.parse::<usize>().ok())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.parse::<u64>().ok())
    }

    pub fn get_f32(&self, key: &str) -> Option<f32> {
        self.get(key).and_then(|v| v.parse::<f32>().ok())
    }
}

/// Typed run configuration for one analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Plan length; also the cap the controller consumes.
    pub max_tasks: usize,
    /// Revisions allowed per task after its first failed attempt.
    pub retry_limit: u32,
    /// Ceiling on state-machine transitions for one run.
    pub step_limit: usize,
    pub sandbox: SandboxSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SandboxSettings {
    pub python: String,
    pub timeout: Duration,
    pub cpu_seconds: u64,
    pub memory_mb: u64,
    /// Characters kept from each non-figure binding's repr.
    pub variable_repr_limit: usize,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            python: "python3".into(),
            timeout: Duration::from_secs(60),
            cpu_seconds: 30,
            memory_mb: 2048,
            variable_repr_limit: 1000,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_tasks: DEFAULT_MAX_TASKS,
            retry_limit: 3,
            step_limit: 100,
            sandbox: SandboxSettings::default(),
        }
    }
}

impl PipelineSettings {
    pub fn from_config(cfg: &Config) -> Self {
        let d = Self::default();
        let sd = SandboxSettings::default();
        Self {
            max_tasks: cfg.get_usize("MAX_TASKS").unwrap_or(d.max_tasks),
            retry_limit: cfg
                .get("MAX_RETRIES")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(d.retry_limit),
            step_limit: cfg.get_usize("RECURSION_LIMIT").unwrap_or(d.step_limit),
            sandbox: SandboxSettings {
                python: cfg.get("PYTHON_BIN").unwrap_or(sd.python),
                timeout: cfg
                    .get_u64("EXEC_TIMEOUT")
                    .map(Duration::from_secs)
                    .unwrap_or(sd.timeout),
                cpu_seconds: cfg.get_u64("EXEC_CPU_SECONDS").unwrap_or(sd.cpu_seconds),
                memory_mb: cfg.get_u64("EXEC_MEMORY_MB").unwrap_or(sd.memory_mb),
                variable_repr_limit: cfg
                    .get_usize("VARIABLE_REPR_LIMIT")
                    .unwrap_or(sd.variable_repr_limit),
            },
        }
    }
}

fn is_config_key(k: &str) -> bool {
    // Accept known keys or EDA_*/OPENAI_* for forward-compat
    const KEYS: &[&str] = &[
        "OPENAI_API_KEY",
        "API_BASE_URL",
        "REQUEST_TIMEOUT",
        "DEFAULT_MODEL",
        "TEMPERATURE",
        "PYTHON_BIN",
        "MAX_TASKS",
        "MAX_RETRIES",
        "RECURSION_LIMIT",
        "EXEC_TIMEOUT",
        "EXEC_CPU_SECONDS",
        "EXEC_MEMORY_MB",
        "VARIABLE_REPR_LIMIT",
        "REPORT_LANGUAGE",
        "PRETTIFY_MARKDOWN",
    ];

    KEYS.contains(&k) || k.starts_with("EDA_") || k.starts_with("OPENAI_")
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    base.join("eda_agent").join(".edarc")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();

    // Numbers
    m.insert("REQUEST_TIMEOUT".into(), "60".into());
    m.insert("MAX_TASKS".into(), DEFAULT_MAX_TASKS.to_string());
    m.insert("MAX_RETRIES".into(), "3".into());
    m.insert("RECURSION_LIMIT".into(), "100".into());
    m.insert("EXEC_TIMEOUT".into(), "60".into());
    m.insert("EXEC_CPU_SECONDS".into(), "30".into());
    m.insert("EXEC_MEMORY_MB".into(), "2048".into());
    m.insert("VARIABLE_REPR_LIMIT".into(), "1000".into());
    m.insert("TEMPERATURE".into(), "0.1".into());

    // Strings
    m.insert("DEFAULT_MODEL".into(), "gpt-4.1".into());
    m.insert("API_BASE_URL".into(), "default".into());
    m.insert("PYTHON_BIN".into(), "python3".into());
    m.insert("REPORT_LANGUAGE".into(), "English".into());

    // Bools as strings
    m.insert("PRETTIFY_MARKDOWN".into(), "true".into());

    m
}
