use anyhow::Result;
use clap::Parser;

use agent_workflows::cli::commands::recover::{RedriveCommand, SkipToCommand};
use agent_workflows::cli::commands::resume::ResumeCommand;
use agent_workflows::cli::commands::route::RouteCommand;
use agent_workflows::cli::commands::start::StartCommand;
use agent_workflows::cli::commands::status::{ListCommand, StatusCommand};
use agent_workflows::cli::commands::workflows::WorkflowsCommand;
use agent_workflows::cli::commands::CommandContext;
use agent_workflows::cli::{Cli, Commands};
use agent_workflows::config::AgentWorkflowsConfig;
use agent_workflows::state::OwnerContext;
use agent_workflows::telemetry::init_telemetry;

fn main() -> Result<()> {
    let cli = Cli::parse();

    AgentWorkflowsConfig::load_env_file()?;
    let mut config = AgentWorkflowsConfig::load(cli.config.as_deref())?;
    if cli.json_logs {
        config.observability.json = true;
    }
    init_telemetry(&config.observability)?;

    let ctx = CommandContext::new(config, cli.state_dir, cli.roster, cli.json);

    tokio::runtime::Runtime::new()?.block_on(async { run_command(cli.command, &ctx).await })
}

async fn run_command(command: Commands, ctx: &CommandContext) -> Result<()> {
    match command {
        Commands::Start {
            workflow_type,
            team,
            agent,
            input,
            input_file,
            no_run,
        } => {
            let mut owner = OwnerContext::team(team);
            if let Some(agent) = agent {
                owner = owner.with_agent(agent);
            }
            StartCommand::new(workflow_type, owner)
                .with_input(input, input_file)
                .with_run(!no_run)
                .execute(ctx)
                .await
        }
        Commands::Resume {
            id,
            reviewer,
            reject,
            comment,
            ai_agent,
            data,
        } => {
            let mut command = ResumeCommand::new(id, reviewer);
            command.reject = reject;
            command.comment = comment;
            command.ai_agent = ai_agent;
            command.data = data;
            command.execute(ctx).await
        }
        Commands::Status { id } => StatusCommand::new(id).execute(ctx).await,
        Commands::List { status, team } => ListCommand::new(status, team).execute(ctx).await,
        Commands::Route {
            team,
            skills,
            hours,
        } => RouteCommand::new(team, skills, hours).execute(ctx).await,
        Commands::SkipTo { id, step, run } => SkipToCommand::new(id, step, run).execute(ctx).await,
        Commands::Redrive { id } => RedriveCommand::new(id).execute(ctx).await,
        Commands::Workflows => WorkflowsCommand.execute(ctx).await,
    }
}
