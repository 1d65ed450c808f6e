use clap::Parser;

/// Everything else comes from the environment (see `Config::from_env`).
#[derive(Parser, Debug)]
#[command(
    name = "dispatcher",
    version,
    about = "Runs the simulate/log/snapshot jobs on a timer and posts betting digests to a webhook"
)]
pub struct Cli {
    /// Force debug logging (overrides LOG_LEVEL)
    #[arg(long)]
    pub debug: bool,

    /// Run one scheduler tick and one dispatch cycle, then exit (monitors are not started)
    #[arg(long)]
    pub once: bool,

    /// Do not start the status API
    #[arg(long)]
    pub no_api: bool,
}
