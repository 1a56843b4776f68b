use anyhow::Result;

use super::CommandContext;

/// Move a run forward past steps that should not execute.
pub struct SkipToCommand {
    pub id: String,
    pub step: String,
    pub run: bool,
}

impl SkipToCommand {
    pub fn new(id: impl Into<String>, step: impl Into<String>, run: bool) -> Self {
        Self {
            id: id.into(),
            step: step.into(),
            run,
        }
    }

    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let engine = ctx.engine().await?;
        let state = engine.load(&self.id).await?;

        let state = engine.skip_to(&state, &self.step).await?;
        let state = if self.run { engine.run(state).await? } else { state };

        ctx.print_state(&state)
    }
}

/// Re-run the step a run failed on.
pub struct RedriveCommand {
    pub id: String,
}

impl RedriveCommand {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let engine = ctx.engine().await?;
        let state = engine.load(&self.id).await?;
        let state = engine.redrive(&state).await?;
        ctx.print_state(&state)
    }
}
