use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;

use crate::error::{AppError, Result};

use super::jobs::JobSpec;
use super::registry::JobRegistry;

/// Starts an external job without waiting for it. Returns the pid if known.
pub trait JobLauncher: Send + Sync {
    fn launch(&self, job: &JobSpec) -> Result<Option<u32>>;
}

/// Spawns real processes and hands the child to the registry.
pub struct ProcessLauncher {
    registry: Arc<JobRegistry>,
}

impl ProcessLauncher {
    pub fn new(registry: Arc<JobRegistry>) -> Self {
        Self { registry }
    }
}

impl JobLauncher for ProcessLauncher {
    fn launch(&self, job: &JobSpec) -> Result<Option<u32>> {
        let child = Command::new(&job.program)
            .args(&job.args)
            .current_dir(&job.cwd)
            .envs(job.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| AppError::Launch(format!("{}: {e}", job.label)))?;
        let pid = child.id();
        self.registry.track(job, child);
        Ok(pid)
    }
}
