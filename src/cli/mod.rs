use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser)]
#[command(name = "agent-workflows")]
#[command(about = "Durable, resumable agent workflows with human approval checkpoints")]
#[command(long_about = "Runs multi-step agent workflows whose progress is stored on disk. \
                       A run can pause for a human decision and be resumed later, from any process. \
                       Start with 'agent-workflows workflows' to see what can be run.")]
pub struct Cli {
    /// Configuration file (defaults to ./agent-workflows.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding workflow state files
    #[arg(long, global = true, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Team roster JSON used for routing
    #[arg(long, global = true, value_name = "PATH")]
    pub roster: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Print results as JSON instead of a summary
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a workflow run and drive it until it pauses or finishes
    Start {
        /// Workflow type, e.g. dispatcher or pm-copilot
        workflow_type: String,
        /// Team that owns the run
        #[arg(long)]
        team: String,
        /// Agent acting on behalf of the team
        #[arg(long)]
        agent: Option<String>,
        /// Input document as inline JSON
        #[arg(long, conflicts_with = "input_file")]
        input: Option<String>,
        /// Input document read from a JSON file
        #[arg(long, value_name = "PATH")]
        input_file: Option<PathBuf>,
        /// Only create the run; do not execute any step
        #[arg(long)]
        no_run: bool,
    },
    /// Answer the pending approval of a paused run and continue it
    Resume {
        /// Workflow run id
        id: String,
        /// Who is deciding
        #[arg(long)]
        reviewer: String,
        /// Reject instead of approve
        #[arg(long)]
        reject: bool,
        /// Comment recorded with the decision (required when rejecting)
        #[arg(long)]
        comment: Option<String>,
        /// The reviewer is an AI agent rather than a person
        #[arg(long)]
        ai_agent: bool,
        /// Extra decision fields as a JSON object, e.g. '{"assignee": "m-2"}'
        #[arg(long)]
        data: Option<String>,
    },
    /// Show one workflow run
    Status {
        /// Workflow run id
        id: String,
    },
    /// List stored workflow runs
    List {
        /// Only runs with this status (running, paused, completed, failed)
        #[arg(long)]
        status: Option<String>,
        /// Only runs owned by this team
        #[arg(long)]
        team: Option<String>,
    },
    /// Rank a team's members for a piece of work
    Route {
        #[arg(long)]
        team: String,
        /// Required skills, comma separated
        #[arg(long, value_delimiter = ',')]
        skills: Vec<String>,
        /// Estimated hours of work
        #[arg(long)]
        hours: f64,
    },
    /// Jump a running workflow forward so STEP runs next
    SkipTo {
        id: String,
        step: String,
        /// Continue running after the jump
        #[arg(long)]
        run: bool,
    },
    /// Re-run the step a workflow stopped on after a failure
    Redrive {
        id: String,
    },
    /// List the built-in workflow types and their steps
    Workflows,
}
