//! Periodic launcher for the external simulate/log/snapshot jobs, plus
//! keep-alive supervision of the monitor scripts.

pub mod engine;
pub mod jobs;
pub mod launcher;
pub mod monitor;
pub mod registry;
pub mod task;

pub use engine::Scheduler;
pub use launcher::ProcessLauncher;
pub use registry::{JobRegistry, JobView};
pub use task::{TaskBoard, TaskName, TaskView};
