use std::path::PathBuf;
use std::time::Duration;

use super::task::TaskName;

/// One external process launch, fully resolved at fire time.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    pub task: TaskName,
    /// Human label for logs, e.g. `simulate 2025-06-09`.
    pub label: String,
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Added to the inherited environment. Always carries `PYTHONPATH=<cwd>`
    /// so job scripts can import project modules.
    pub env: Vec<(String, String)>,
    /// Running longer than this produces a stall warning.
    pub stall_after: Duration,
}

impl JobSpec {
    pub fn new(task: TaskName, label: impl Into<String>, program: &str, cwd: PathBuf) -> Self {
        Self {
            task,
            label: label.into(),
            program: program.to_string(),
            args: Vec::new(),
            env: vec![("PYTHONPATH".to_string(), cwd.display().to_string())],
            cwd,
            stall_after: task.stall_after(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.env.retain(|(k, _)| *k != key);
        self.env.push((key, value.into()));
        self
    }

    /// Command line as it would be typed, for log lines.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
