use anyhow::{Context, Result};
use std::path::PathBuf;

use super::{parse_object, CommandContext};
use crate::state::{OwnerContext, StateData};

pub struct StartCommand {
    pub workflow_type: String,
    pub owner: OwnerContext,
    pub input: Option<String>,
    pub input_file: Option<PathBuf>,
    pub run: bool,
}

impl StartCommand {
    pub fn new(workflow_type: impl Into<String>, owner: OwnerContext) -> Self {
        Self {
            workflow_type: workflow_type.into(),
            owner,
            input: None,
            input_file: None,
            run: true,
        }
    }

    pub fn with_input(mut self, input: Option<String>, input_file: Option<PathBuf>) -> Self {
        self.input = input;
        self.input_file = input_file;
        self
    }

    pub fn with_run(mut self, run: bool) -> Self {
        self.run = run;
        self
    }

    async fn read_input(&self) -> Result<StateData> {
        if let Some(raw) = &self.input {
            return parse_object(raw, "--input");
        }
        if let Some(path) = &self.input_file {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            return parse_object(&raw, "--input-file");
        }
        Ok(StateData::new())
    }

    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let input = self.read_input().await?;
        let engine = ctx.engine().await?;

        let state = engine.start(&self.workflow_type, input, &self.owner).await?;
        let state = if self.run { engine.run(state).await? } else { state };

        ctx.print_state(&state)
    }
}
