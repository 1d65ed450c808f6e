use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use dashmap::DashMap;
use serde::Serialize;
use tracing::info;

use crate::config::{stall_thresholds, Config};

use super::jobs::JobSpec;

// ---------------------------------------------------------------------------
// TaskName
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskName {
    Simulate,
    Log,
    Snapshot,
    /// Long-running watchers kept alive rather than fired on a timer.
    Monitor,
}

impl TaskName {
    /// Evaluation order within a tick.
    pub const ORDER: [TaskName; 3] = [TaskName::Simulate, TaskName::Log, TaskName::Snapshot];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskName::Simulate => "simulate",
            TaskName::Log => "log",
            TaskName::Snapshot => "snapshot",
            TaskName::Monitor => "monitor",
        }
    }

    pub fn stall_after(&self) -> Duration {
        match self {
            TaskName::Simulate => Duration::from_secs(stall_thresholds::SIMULATE),
            TaskName::Log => Duration::from_secs(stall_thresholds::LOG),
            TaskName::Snapshot => Duration::from_secs(stall_thresholds::SNAPSHOT),
            TaskName::Monitor => Duration::MAX,
        }
    }
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TaskAction
// ---------------------------------------------------------------------------

/// Parameters of the external job a task launches. Paths are relative to the
/// job working directory unless absolute.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskAction {
    Simulate {
        export_folder: PathBuf,
        edge_threshold: f64,
    },
    Log {
        eval_root: PathBuf,
        min_ev: f64,
        output_dir: PathBuf,
        odds_path: Option<PathBuf>,
    },
    /// The generator always writes `backtest/market_snapshot_<stamp>.json`
    /// under the working directory.
    Snapshot { odds_path: Option<PathBuf> },
}

// ---------------------------------------------------------------------------
// ScheduledTask
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub name: TaskName,
    pub interval: Duration,
    pub last_fired: Option<DateTime<Local>>,
    pub fire_count: u64,
    pub last_error: Option<String>,
    pub action: TaskAction,
}

impl ScheduledTask {
    pub fn new(name: TaskName, interval: Duration, action: TaskAction) -> Self {
        Self {
            name,
            interval,
            last_fired: None,
            fire_count: 0,
            last_error: None,
            action,
        }
    }

    /// The three tasks in evaluation order, parameterised from config.
    pub fn from_config(cfg: &Config) -> Vec<ScheduledTask> {
        vec![
            ScheduledTask::new(
                TaskName::Simulate,
                cfg.sim_interval,
                TaskAction::Simulate {
                    export_folder: cfg.sim_dir.clone(),
                    edge_threshold: cfg.edge_threshold,
                },
            ),
            ScheduledTask::new(
                TaskName::Log,
                cfg.log_interval,
                TaskAction::Log {
                    eval_root: cfg.sim_dir.clone(),
                    min_ev: cfg.job_min_ev,
                    output_dir: cfg.log_dir.clone(),
                    odds_path: cfg.odds_path.clone(),
                },
            ),
            ScheduledTask::new(
                TaskName::Snapshot,
                cfg.snapshot_interval,
                TaskAction::Snapshot {
                    odds_path: cfg.odds_path.clone(),
                },
            ),
        ]
    }

    /// Never-fired tasks are due immediately. A clock that went backwards
    /// counts as zero elapsed.
    pub fn is_due(&self, now: DateTime<Local>) -> bool {
        match self.last_fired {
            None => true,
            Some(last) => elapsed(last, now) >= self.interval,
        }
    }

    /// Time left until the task is due (zero when due).
    pub fn due_in(&self, now: DateTime<Local>) -> Duration {
        match self.last_fired {
            None => Duration::ZERO,
            Some(last) => self.interval.saturating_sub(elapsed(last, now)),
        }
    }

    /// Record a firing. Called once the launch was issued, whatever its result.
    pub fn mark_fired(&mut self, now: DateTime<Local>, error: Option<String>) {
        self.last_fired = Some(now);
        self.fire_count += 1;
        self.last_error = error;
    }

    /// Jobs for this firing. Target dates come from `now`, so a firing after
    /// midnight picks up the new day.
    pub fn jobs(&self, now: DateTime<Local>, python: &str, cwd: &Path) -> Vec<JobSpec> {
        let [today, tomorrow] = target_dates(now);
        match &self.action {
            TaskAction::Simulate {
                export_folder,
                edge_threshold,
            } => [today, tomorrow]
                .into_iter()
                .map(|date| {
                    JobSpec::new(self.name, format!("simulate {date}"), python, cwd.to_path_buf())
                        .arg("cli/full_slate_runner.py")
                        .arg(date.clone())
                        .arg(format!("--export-folder={}", export_folder.display()))
                        .arg(format!("--edge-threshold={edge_threshold}"))
                })
                .collect(),

            TaskAction::Log {
                eval_root,
                min_ev,
                output_dir,
                odds_path,
            } => {
                let mut jobs = Vec::with_capacity(2);
                for (i, date) in [today, tomorrow].into_iter().enumerate() {
                    let eval_folder = eval_root.join(&date);
                    if i == 1 && !has_json_files(&resolve(cwd, &eval_folder)) {
                        info!(
                            task = %self.name,
                            "[SCHED] no simulation output for {date} yet; skipping its log job"
                        );
                        continue;
                    }
                    let mut job =
                        JobSpec::new(self.name, format!("log {date}"), python, cwd.to_path_buf())
                            .arg("cli/log_betting_evals.py")
                            .arg(format!("--eval-folder={}", eval_folder.display()));
                    if let Some(odds) = odds_path {
                        job = job.arg(format!("--odds-path={}", odds.display()));
                    }
                    jobs.push(
                        job.arg(format!("--min-ev={min_ev}"))
                            .arg(format!("--output-dir={}", output_dir.display())),
                    );
                }
                jobs
            }

            TaskAction::Snapshot { odds_path } => {
                let mut job = JobSpec::new(self.name, "snapshot", python, cwd.to_path_buf())
                    .arg("core/unified_snapshot_generator.py");
                // Without --odds-path the generator picks up the newest odds file itself.
                if let Some(odds) = odds_path {
                    job = job.arg("--odds-path").arg(odds.display().to_string());
                }
                vec![job.arg("--date").arg(format!("{today},{tomorrow}"))]
            }
        }
    }

    pub fn view(&self, now: DateTime<Local>) -> TaskView {
        TaskView {
            name: self.name,
            interval_secs: self.interval.as_secs(),
            last_fired: self.last_fired,
            fire_count: self.fire_count,
            last_error: self.last_error.clone(),
            next_due_secs: self.due_in(now).as_secs(),
        }
    }
}

/// Published copy of a task's state, read by the status API.
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    pub name: TaskName,
    pub interval_secs: u64,
    pub last_fired: Option<DateTime<Local>>,
    pub fire_count: u64,
    pub last_error: Option<String>,
    pub next_due_secs: u64,
}

pub type TaskBoard = DashMap<TaskName, TaskView>;

/// Today and tomorrow in the local calendar, as `YYYY-MM-DD`.
pub fn target_dates(now: DateTime<Local>) -> [String; 2] {
    let today = now.date_naive();
    let tomorrow = today.succ_opt().unwrap_or(today);
    [
        today.format("%Y-%m-%d").to_string(),
        tomorrow.format("%Y-%m-%d").to_string(),
    ]
}

fn elapsed(last: DateTime<Local>, now: DateTime<Local>) -> Duration {
    (now - last).to_std().unwrap_or(Duration::ZERO)
}

fn resolve(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

fn has_json_files(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .any(|e| e.path().extension().is_some_and(|ext| ext == "json"))
        })
        .unwrap_or(false)
}
