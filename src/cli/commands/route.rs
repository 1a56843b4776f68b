use anyhow::Result;

use super::CommandContext;
use crate::routing::{RoutingScorer, WorkRequirements};

pub struct RouteCommand {
    pub team: String,
    pub requirements: WorkRequirements,
}

impl RouteCommand {
    pub fn new(team: impl Into<String>, skills: Vec<String>, hours: f64) -> Self {
        Self {
            team: team.into(),
            requirements: WorkRequirements::new(skills, hours),
        }
    }

    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let scorer = RoutingScorer::new(ctx.roster().await?);
        let ranked = scorer.calculate_routing(&self.team, &self.requirements).await?;

        if ctx.json {
            println!("{}", serde_json::to_string_pretty(&ranked)?);
            return Ok(());
        }

        println!(
            "🔀 Routing for team {} ({} skill(s), {}h):",
            self.team,
            self.requirements.required_skills.len(),
            self.requirements.estimated_hours
        );
        for (rank, candidate) in ranked.iter().enumerate() {
            println!(
                "{} {}. {} combined {:.2} (skills {:.2}, capacity {:.2})",
                if candidate.is_top_candidate { "⭐" } else { "  " },
                rank + 1,
                candidate.member_id,
                candidate.combined_score,
                candidate.skill_score,
                candidate.capacity_score,
            );
            println!("      {}", candidate.reasoning.summary);
        }
        Ok(())
    }
}
