use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "overseer", version, about = "Collect query results now, evaluate alert rules later")]
pub struct Args {
    /// Config file; defaults to ./overseer.toml when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute the selected queries and cache their results under the job ID.
    Run(RunArgs),
    /// Evaluate the job's cached results and dispatch the resulting alerts.
    Eval(EvalArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    #[arg(long, env = "OVERSEER_JOB_ID")]
    pub job_id: String,

    /// Directory tree of `.sql` query files.
    #[arg(short = 'd', long, env = "OVERSEER_QUERY_DIR")]
    pub query_dir: PathBuf,

    /// Run tasks carrying this tag. Repeatable or comma-separated.
    #[arg(
        short = 't',
        long = "tag",
        env = "OVERSEER_TASK_TAG",
        value_delimiter = ','
    )]
    pub tags: Vec<String>,

    /// Run the task with this ID. Repeatable or comma-separated.
    #[arg(short = 'i', long = "id", env = "OVERSEER_TASK_ID", value_delimiter = ',')]
    pub ids: Vec<String>,

    /// Drop the job's cached results before running.
    #[arg(long)]
    pub reset: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct EvalArgs {
    #[arg(long, env = "OVERSEER_JOB_ID")]
    pub job_id: String,
}
