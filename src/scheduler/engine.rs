use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::api::health::HealthState;
use crate::config::Config;

use super::launcher::JobLauncher;
use super::monitor::{supervise, KeepAlive};
use super::registry::JobRegistry;
use super::task::{ScheduledTask, TaskBoard, TaskName};

/// Single polling loop over the independently-timed tasks.
pub struct Scheduler {
    tasks: Vec<ScheduledTask>,
    monitors: Vec<KeepAlive>,
    launcher: Arc<dyn JobLauncher>,
    registry: Option<Arc<JobRegistry>>,
    board: Arc<TaskBoard>,
    health: Arc<HealthState>,
    python: String,
    cwd: PathBuf,
    tick: Duration,
}

impl Scheduler {
    pub fn new(
        tasks: Vec<ScheduledTask>,
        launcher: Arc<dyn JobLauncher>,
        python: impl Into<String>,
        cwd: PathBuf,
        tick: Duration,
    ) -> Self {
        Self {
            tasks,
            monitors: Vec::new(),
            launcher,
            registry: None,
            board: Arc::new(TaskBoard::new()),
            health: Arc::new(HealthState::new()),
            python: python.into(),
            cwd,
            tick,
        }
    }

    pub fn from_config(cfg: &Config, launcher: Arc<dyn JobLauncher>) -> Self {
        Self::new(
            ScheduledTask::from_config(cfg),
            launcher,
            cfg.python.clone(),
            cfg.project_root.clone(),
            cfg.tick,
        )
        .with_monitors(&cfg.monitor_scripts)
    }

    /// Scripts to keep running alongside the timed tasks.
    pub fn with_monitors(mut self, scripts: &[String]) -> Self {
        self.monitors = scripts.iter().map(|s| KeepAlive::new(s)).collect();
        self
    }

    /// Poll this registry before every tick.
    pub fn with_registry(mut self, registry: Arc<JobRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_health(mut self, health: Arc<HealthState>) -> Self {
        self.health = health;
        self
    }

    /// Shared task state for the status API.
    pub fn board(&self) -> Arc<TaskBoard> {
        Arc::clone(&self.board)
    }

    #[cfg(test)]
    pub fn tasks(&self) -> &[ScheduledTask] {
        &self.tasks
    }

    #[cfg(test)]
    pub fn monitors(&self) -> &[KeepAlive] {
        &self.monitors
    }

    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "[SCHED] started: tick {}s, tasks [{}]",
            self.tick.as_secs(),
            self.tasks
                .iter()
                .map(|t| format!("{} every {}s", t.name, t.interval.as_secs()))
                .collect::<Vec<_>>()
                .join(", "),
        );
        if !self.monitors.is_empty() {
            info!(
                "[SCHED] keeping alive [{}]",
                self.monitors.iter().map(|m| m.label.as_str()).collect::<Vec<_>>().join(", "),
            );
        }

        loop {
            interval.tick().await;
            self.run_once(Local::now());
        }
    }

    /// One loop iteration: poll jobs, restart exited monitors, fire due
    /// tasks, publish state.
    pub fn run_once(&mut self, now: DateTime<Local>) -> Vec<TaskName> {
        let finished = self.registry.as_ref().map(|r| r.reap()).unwrap_or_default();
        supervise(&mut self.monitors, &finished, self.launcher.as_ref(), &self.python, &self.cwd);
        let fired = self.tick(now);
        self.health.record_tick(now);
        self.log_status(now, &fired);
        fired
    }

    /// Fire every due task in evaluation order. `last_fired` moves to `now`
    /// as soon as the launches are issued, even if one failed to start.
    pub fn tick(&mut self, now: DateTime<Local>) -> Vec<TaskName> {
        let mut fired = Vec::new();

        for task in self.tasks.iter_mut() {
            if !task.is_due(now) {
                continue;
            }

            let jobs = task.jobs(now, &self.python, &self.cwd);
            let mut failure = None;
            for job in &jobs {
                match self.launcher.launch(job) {
                    Ok(pid) => info!(
                        task = %task.name,
                        pid = ?pid,
                        "[SCHED] launched {}",
                        job.label,
                    ),
                    Err(e) => {
                        error!(task = %task.name, "[SCHED] failed to launch {}: {e}", job.label);
                        failure = Some(e.to_string());
                    }
                }
            }

            task.mark_fired(now, failure);
            fired.push(task.name);
        }

        for task in &self.tasks {
            self.board.insert(task.name, task.view(now));
        }
        fired
    }

    fn log_status(&self, now: DateTime<Local>, fired: &[TaskName]) {
        let waiting = self
            .tasks
            .iter()
            .filter(|t| !fired.contains(&t.name))
            .map(|t| format!("{} in {}s", t.name, t.due_in(now).as_secs()))
            .collect::<Vec<_>>()
            .join(", ");
        let jobs = self.registry.as_ref().map(|r| r.len()).unwrap_or(0);
        debug!(
            "[SCHED] tick: fired [{}] next [{waiting}] running jobs {jobs}",
            fired.iter().map(TaskName::as_str).collect::<Vec<_>>().join(", "),
        );
    }
}
