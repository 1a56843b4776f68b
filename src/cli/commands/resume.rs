use anyhow::Result;

use super::{parse_object, CommandContext};
use crate::workflow::ApprovalDecision;

pub struct ResumeCommand {
    pub id: String,
    pub reviewer: String,
    pub reject: bool,
    pub comment: Option<String>,
    pub ai_agent: bool,
    pub data: Option<String>,
}

impl ResumeCommand {
    pub fn new(id: impl Into<String>, reviewer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reviewer: reviewer.into(),
            reject: false,
            comment: None,
            ai_agent: false,
            data: None,
        }
    }

    fn decision(&self) -> Result<ApprovalDecision> {
        let mut decision = ApprovalDecision::approve(&self.reviewer);
        decision.approved = !self.reject;
        decision.comment = self.comment.clone();
        if self.ai_agent {
            decision = decision.by_ai_agent();
        }
        if let Some(raw) = &self.data {
            decision.data = parse_object(raw, "--data")?;
        }
        Ok(decision)
    }

    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let decision = self.decision()?;
        let engine = ctx.engine().await?;

        let state = engine.load(&self.id).await?;
        let state = engine.resume_with_decision(&state, &decision).await?;

        ctx.print_state(&state)
    }
}
