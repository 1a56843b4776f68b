//! Routing scorer: ranks team members for a piece of work by skill match and
//! free capacity. The scoring functions are pure; [`RoutingScorer`] only adds
//! the roster lookup.

pub mod capacity;
pub mod ranking;
pub mod roster;
pub mod skills;

pub use capacity::{score_capacity, CapacityBreakdown, LOW_HEADROOM_PENALTY, LOW_HEADROOM_RATIO};
pub use ranking::{
    combine_scores, rank_candidates, score_member, score_members, RoutingCandidate,
    RoutingReasoning, WorkRequirements, CAPACITY_WEIGHT, SKILL_WEIGHT, TOP_CANDIDATE_RATIO,
};
pub use roster::{MemberSkill, Proficiency, RosterError, StaticRoster, TeamMember, TeamRoster};
pub use skills::{normalize_skill, score_skills, SkillBreakdown, SkillMatch};

#[cfg(any(test, feature = "testing"))]
pub use roster::MockTeamRoster;

use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("Roster error: {0}")]
    Roster(#[from] RosterError),

    #[error("Invalid work requirements: {reason}")]
    InvalidRequirements { reason: String },
}

/// Scores are reported with two decimals.
pub(crate) fn round_score(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Clone)]
pub struct RoutingScorer {
    roster: Arc<dyn TeamRoster>,
}

impl RoutingScorer {
    pub fn new(roster: Arc<dyn TeamRoster>) -> Self {
        Self { roster }
    }

    /// Skill breakdown per member id.
    pub async fn calculate_skill_scores(
        &self,
        team_id: &str,
        required_skills: &[String],
    ) -> Result<BTreeMap<String, SkillBreakdown>, RoutingError> {
        let members = self.roster.members(team_id).await?;
        Ok(members
            .iter()
            .map(|member| (member.member_id.clone(), score_skills(member, required_skills)))
            .collect())
    }

    /// Capacity breakdown per member id.
    pub async fn calculate_capacity_scores(
        &self,
        team_id: &str,
        estimated_hours: f64,
    ) -> Result<BTreeMap<String, CapacityBreakdown>, RoutingError> {
        validate_estimate(estimated_hours)?;
        let members = self.roster.members(team_id).await?;
        Ok(members
            .iter()
            .map(|member| (member.member_id.clone(), score_capacity(member, estimated_hours)))
            .collect())
    }

    /// Every member of the team, ranked best first.
    pub async fn calculate_routing(
        &self,
        team_id: &str,
        requirements: &WorkRequirements,
    ) -> Result<Vec<RoutingCandidate>, RoutingError> {
        validate_estimate(requirements.estimated_hours)?;
        let members = self.roster.members(team_id).await?;
        debug!(team_id = %team_id, members = members.len(), "Scoring routing candidates");

        let ranked = score_members(&members, requirements);
        if let Some(best) = ranked.first() {
            info!(
                team_id = %team_id,
                candidates = ranked.len(),
                top_member = %best.member_id,
                top_score = best.combined_score,
                "Routing calculated"
            );
        }
        Ok(ranked)
    }
}

fn validate_estimate(estimated_hours: f64) -> Result<(), RoutingError> {
    if estimated_hours.is_finite() {
        Ok(())
    } else {
        Err(RoutingError::InvalidRequirements {
            reason: format!("estimated hours must be a finite number, got {estimated_hours}"),
        })
    }
}
