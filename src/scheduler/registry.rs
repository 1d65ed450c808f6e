//! Bounded table of launched external processes.
//!
//! Launches are fire-and-forget: the registry never waits on a child. It is
//! polled once per scheduler tick to log exits and stalls. When full, the
//! oldest entry is dropped from tracking; the process itself keeps running.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use dashmap::DashMap;
use serde::Serialize;
use tokio::process::Child;
use tracing::{info, warn};

use super::jobs::JobSpec;
use super::task::TaskName;

struct TrackedJob {
    task: TaskName,
    label: String,
    pid: Option<u32>,
    started: Instant,
    started_at: DateTime<Local>,
    stall_after: Duration,
    stall_warned: bool,
    child: Child,
}

/// Serializable view of a running job.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub id: u64,
    pub task: TaskName,
    pub label: String,
    pub pid: Option<u32>,
    pub started_at: DateTime<Local>,
    pub running_secs: u64,
}

/// A job that exited since the previous poll.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedJob {
    pub task: TaskName,
    pub label: String,
    pub exit_code: Option<i32>,
    pub runtime: Duration,
}

pub struct JobRegistry {
    jobs: DashMap<u64, TrackedJob>,
    next_id: AtomicU64,
    capacity: usize,
}

impl JobRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            jobs: DashMap::new(),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Start tracking `child`. Returns the registry id.
    pub fn track(&self, job: &JobSpec, child: Child) -> u64 {
        while self.jobs.len() >= self.capacity {
            // Monitors are only released when nothing else is left.
            let oldest = self
                .jobs
                .iter()
                .filter(|e| e.task != TaskName::Monitor)
                .map(|e| *e.key())
                .min()
                .or_else(|| self.jobs.iter().map(|e| *e.key()).min());
            let Some(oldest) = oldest else {
                break;
            };
            if let Some((_, evicted)) = self.jobs.remove(&oldest) {
                warn!(
                    task = %evicted.task,
                    pid = ?evicted.pid,
                    "[JOBS] registry full; no longer tracking {}",
                    evicted.label,
                );
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let pid = child.id();
        info!(task = %job.task, pid = ?pid, "[JOBS] tracking {} ({})", job.label, job.command_line());
        self.jobs.insert(
            id,
            TrackedJob {
                task: job.task,
                label: job.label.clone(),
                pid,
                started: Instant::now(),
                started_at: Local::now(),
                stall_after: job.stall_after,
                stall_warned: false,
                child,
            },
        );
        id
    }

    /// Poll every child without blocking. Exited jobs are logged and removed;
    /// jobs past their stall threshold are warned about once.
    pub fn reap(&self) -> Vec<FinishedJob> {
        let mut finished = Vec::new();
        let mut done = Vec::new();

        for mut entry in self.jobs.iter_mut() {
            let id = *entry.key();
            let job = entry.value_mut();
            let runtime = job.started.elapsed();
            match job.child.try_wait() {
                Ok(Some(status)) => {
                    let exit_code = status.code();
                    if status.success() {
                        info!(
                            task = %job.task,
                            pid = ?job.pid,
                            "[JOBS] {} finished in {:.0}s",
                            job.label,
                            runtime.as_secs_f64(),
                        );
                    } else {
                        warn!(
                            task = %job.task,
                            pid = ?job.pid,
                            exit_code = ?exit_code,
                            "[JOBS] {} exited with {status} after {:.0}s",
                            job.label,
                            runtime.as_secs_f64(),
                        );
                    }
                    finished.push(FinishedJob {
                        task: job.task,
                        label: job.label.clone(),
                        exit_code,
                        runtime,
                    });
                    done.push(id);
                }
                Ok(None) => {
                    if should_warn_stall(runtime, job.stall_after, job.stall_warned) {
                        job.stall_warned = true;
                        warn!(
                            task = %job.task,
                            pid = ?job.pid,
                            "[JOBS] {} still running after {}m (threshold {}m)",
                            job.label,
                            runtime.as_secs() / 60,
                            job.stall_after.as_secs() / 60,
                        );
                    }
                }
                Err(e) => {
                    warn!(task = %job.task, pid = ?job.pid, "[JOBS] cannot poll {}: {e}; dropping", job.label);
                    done.push(id);
                }
            }
        }

        for id in done {
            self.jobs.remove(&id);
        }
        finished
    }

    /// Running jobs, oldest first.
    pub fn views(&self) -> Vec<JobView> {
        let mut views: Vec<JobView> = self
            .jobs
            .iter()
            .map(|e| JobView {
                id: *e.key(),
                task: e.task,
                label: e.label.clone(),
                pid: e.pid,
                started_at: e.started_at,
                running_secs: e.started.elapsed().as_secs(),
            })
            .collect();
        views.sort_by_key(|v| v.id);
        views
    }
}

fn should_warn_stall(runtime: Duration, stall_after: Duration, already_warned: bool) -> bool {
    !already_warned && runtime >= stall_after
}
