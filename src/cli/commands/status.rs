use anyhow::{bail, Result};

use super::CommandContext;
use crate::state::WorkflowStatus;

pub struct StatusCommand {
    pub id: String,
}

impl StatusCommand {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let engine = ctx.engine().await?;
        let state = engine.load(&self.id).await?;
        ctx.print_state(&state)
    }
}

pub struct ListCommand {
    pub status: Option<String>,
    pub team: Option<String>,
}

impl ListCommand {
    pub fn new(status: Option<String>, team: Option<String>) -> Self {
        Self { status, team }
    }

    fn status_filter(&self) -> Result<Option<WorkflowStatus>> {
        let Some(raw) = &self.status else {
            return Ok(None);
        };
        let status = match raw.trim().to_lowercase().as_str() {
            "running" => WorkflowStatus::Running,
            "paused" => WorkflowStatus::Paused,
            "completed" => WorkflowStatus::Completed,
            "failed" => WorkflowStatus::Failed,
            other => bail!("unknown status '{other}'"),
        };
        Ok(Some(status))
    }

    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let status = self.status_filter()?;
        let engine = ctx.engine().await?;

        let runs: Vec<_> = engine
            .store()
            .list()
            .await?
            .into_iter()
            .filter(|s| status.map_or(true, |wanted| s.status == wanted))
            .filter(|s| self.team.as_deref().map_or(true, |team| s.team_id == team))
            .collect();

        if ctx.json {
            println!("{}", serde_json::to_string_pretty(&runs)?);
            return Ok(());
        }

        if runs.is_empty() {
            println!("📋 No workflow runs found");
            return Ok(());
        }
        println!("📋 {} workflow run(s):", runs.len());
        for run in &runs {
            println!(
                "   {}  {:<10} {:<10} {:<12} {}",
                run.id, run.workflow_type, run.status, run.team_id, run.current_node
            );
        }
        Ok(())
    }
}
