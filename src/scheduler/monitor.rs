//! Keep-alive supervision for long-running watcher scripts.
//!
//! Unlike timed tasks, a monitor is launched once and relaunched only after
//! the job registry reports that it exited.

use std::path::Path;

use tracing::{error, info, warn};

use super::jobs::JobSpec;
use super::launcher::JobLauncher;
use super::registry::FinishedJob;
use super::task::TaskName;

#[derive(Debug, Clone, PartialEq)]
pub struct KeepAlive {
    /// File stem of the script; also the job label.
    pub label: String,
    pub script: String,
    pub running: bool,
    /// Relaunches after an exit (the first start is not counted).
    pub restarts: u64,
    pub last_exit: Option<i32>,
}

impl KeepAlive {
    pub fn new(script: &str) -> Self {
        let label = Path::new(script)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| script.to_string());
        Self {
            label,
            script: script.to_string(),
            running: false,
            restarts: 0,
            last_exit: None,
        }
    }

    pub fn job(&self, python: &str, cwd: &Path) -> JobSpec {
        JobSpec::new(TaskName::Monitor, self.label.clone(), python, cwd.to_path_buf()).arg(self.script.clone())
    }
}

/// Mark monitors whose process exited, then (re)launch every monitor that is
/// not running. A failed launch is retried on the next call. Returns the
/// labels that were started.
pub fn supervise(
    monitors: &mut [KeepAlive],
    finished: &[FinishedJob],
    launcher: &dyn JobLauncher,
    python: &str,
    cwd: &Path,
) -> Vec<String> {
    for done in finished.iter().filter(|f| f.task == TaskName::Monitor) {
        if let Some(m) = monitors.iter_mut().find(|m| m.label == done.label) {
            m.running = false;
            m.last_exit = done.exit_code;
            warn!(
                task = %TaskName::Monitor,
                exit_code = ?done.exit_code,
                "[MONITOR] {} exited after {:.0}s; restarting",
                m.label,
                done.runtime.as_secs_f64(),
            );
        }
    }

    let mut started = Vec::new();
    for m in monitors.iter_mut().filter(|m| !m.running) {
        match launcher.launch(&m.job(python, cwd)) {
            Ok(pid) => {
                if m.last_exit.is_some() {
                    m.restarts += 1;
                }
                m.running = true;
                info!(task = %TaskName::Monitor, pid = ?pid, "[MONITOR] launched {}", m.label);
                started.push(m.label.clone());
            }
            Err(e) => error!(task = %TaskName::Monitor, "[MONITOR] failed to launch {}: {e}", m.label),
        }
    }
    started
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, Result};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct CountingLauncher {
        launched: Mutex<Vec<JobSpec>>,
        fail: Mutex<bool>,
    }

    impl JobLauncher for CountingLauncher {
        fn launch(&self, job: &JobSpec) -> Result<Option<u32>> {
            if *self.fail.lock().unwrap() {
                return Err(AppError::Launch(format!("{}: not found", job.label)));
            }
            self.launched.lock().unwrap().push(job.clone());
            Ok(Some(7))
        }
    }

    fn exited(label: &str, code: i32) -> FinishedJob {
        FinishedJob {
            task: TaskName::Monitor,
            label: label.to_string(),
            exit_code: Some(code),
            runtime: Duration::from_secs(90),
        }
    }

    fn monitors() -> Vec<KeepAlive> {
        ["cli/closing_odds_monitor.py", "cli/monitor_early_bets.py"]
            .into_iter()
            .map(KeepAlive::new)
            .collect()
    }

    #[test]
    fn label_is_the_script_stem() {
        let m = KeepAlive::new("cli/closing_odds_monitor.py");
        assert_eq!(m.label, "closing_odds_monitor");
        let job = m.job("python3", Path::new("/srv"));
        assert_eq!(job.task, TaskName::Monitor);
        assert_eq!(job.args, vec!["cli/closing_odds_monitor.py"]);
    }

    #[test]
    fn monitors_start_once_and_restart_after_exit() {
        let launcher = CountingLauncher::default();
        let mut set = monitors();
        let cwd = Path::new(".");

        let started = supervise(&mut set, &[], &launcher, "python3", cwd);
        assert_eq!(started, vec!["closing_odds_monitor", "monitor_early_bets"]);
        assert!(supervise(&mut set, &[], &launcher, "python3", cwd).is_empty());

        // Exits of other tasks are ignored.
        let other = FinishedJob { task: TaskName::Log, ..exited("closing_odds_monitor", 0) };
        assert!(supervise(&mut set, &[other], &launcher, "python3", cwd).is_empty());

        let started = supervise(&mut set, &[exited("monitor_early_bets", 1)], &launcher, "python3", cwd);
        assert_eq!(started, vec!["monitor_early_bets"]);
        assert_eq!(set[1].restarts, 1);
        assert_eq!(set[1].last_exit, Some(1));
        assert_eq!(set[0].restarts, 0);
        assert_eq!(launcher.launched.lock().unwrap().len(), 3);
    }

    #[test]
    fn failed_launch_is_retried_next_call() {
        let launcher = CountingLauncher::default();
        *launcher.fail.lock().unwrap() = true;
        let mut set = monitors();

        assert!(supervise(&mut set, &[], &launcher, "python3", Path::new(".")).is_empty());
        assert!(set.iter().all(|m| !m.running));

        *launcher.fail.lock().unwrap() = false;
        assert_eq!(supervise(&mut set, &[], &launcher, "python3", Path::new(".")).len(), 2);
        assert!(set.iter().all(|m| m.running));
    }
}
