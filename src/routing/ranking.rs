use serde::{Deserialize, Serialize};

use super::capacity::{score_capacity, CapacityBreakdown};
use super::roster::TeamMember;
use super::round_score;
use super::skills::{score_skills, SkillBreakdown};

pub const SKILL_WEIGHT: f64 = 0.5;
pub const CAPACITY_WEIGHT: f64 = 0.5;

/// Candidates scoring at least this share of the best score are flagged top.
pub const TOP_CANDIDATE_RATIO: f64 = 0.9;

/// What the scorer needs to know about a piece of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkRequirements {
    #[serde(default)]
    pub required_skills: Vec<String>,
    pub estimated_hours: f64,
}

impl WorkRequirements {
    pub fn new<I, S>(required_skills: I, estimated_hours: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required_skills: required_skills.into_iter().map(Into::into).collect(),
            estimated_hours,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingReasoning {
    pub skills: SkillBreakdown,
    pub capacity: CapacityBreakdown,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingCandidate {
    pub member_id: String,
    pub name: String,
    pub skill_score: f64,
    pub capacity_score: f64,
    pub combined_score: f64,
    pub is_top_candidate: bool,
    pub reasoning: RoutingReasoning,
}

pub fn combine_scores(skill_score: f64, capacity_score: f64) -> f64 {
    round_score(skill_score * SKILL_WEIGHT + capacity_score * CAPACITY_WEIGHT)
}

/// Score one member. `is_top_candidate` is settled later by [`rank_candidates`].
pub fn score_member(member: &TeamMember, requirements: &WorkRequirements) -> RoutingCandidate {
    let skills = score_skills(member, &requirements.required_skills);
    let capacity = score_capacity(member, requirements.estimated_hours);
    let combined_score = combine_scores(skills.score, capacity.score);

    let summary = format!(
        "matched {}/{} skills, {:.1}h available for {:.1}h estimate{}",
        skills.matched.len(),
        skills.required_count,
        capacity.available_hours,
        capacity.estimated_hours,
        if capacity.penalty_applied {
            ", low headroom penalty"
        } else {
            ""
        }
    );

    RoutingCandidate {
        member_id: member.member_id.clone(),
        name: member.name.clone(),
        skill_score: skills.score,
        capacity_score: capacity.score,
        combined_score,
        is_top_candidate: false,
        reasoning: RoutingReasoning {
            skills,
            capacity,
            summary,
        },
    }
}

/// Sort best first (ties by member id) and flag every candidate within
/// [`TOP_CANDIDATE_RATIO`] of the best.
pub fn rank_candidates(mut candidates: Vec<RoutingCandidate>) -> Vec<RoutingCandidate> {
    candidates.sort_by(|a, b| {
        b.combined_score
            .total_cmp(&a.combined_score)
            .then_with(|| a.member_id.cmp(&b.member_id))
    });

    let threshold = candidates
        .first()
        .map(|best| best.combined_score * TOP_CANDIDATE_RATIO)
        .unwrap_or(0.0);
    for candidate in &mut candidates {
        candidate.is_top_candidate = candidate.combined_score >= threshold;
    }
    candidates
}

pub fn score_members(members: &[TeamMember], requirements: &WorkRequirements) -> Vec<RoutingCandidate> {
    rank_candidates(
        members
            .iter()
            .map(|member| score_member(member, requirements))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::roster::Proficiency;

    #[test]
    fn test_combined_score_is_even_split() {
        assert_eq!(combine_scores(100.0, 50.0), 75.0);
        assert_eq!(combine_scores(40.0, 90.0), 65.0);
        assert_eq!(combine_scores(33.33, 66.67), 50.0);
    }

    #[test]
    fn test_ranking_order_and_top_flags() {
        let members = vec![
            TeamMember::new("m-basic", 40.0).with_skill("Laravel", Proficiency::Basic),
            TeamMember::new("m-adv", 40.0).with_skill("Laravel", Proficiency::Advanced),
            TeamMember::new("m-int", 40.0).with_skill("Laravel", Proficiency::Intermediate),
        ];
        let ranked = score_members(&members, &WorkRequirements::new(["Laravel"], 8.0));

        let order: Vec<&str> = ranked.iter().map(|c| c.member_id.as_str()).collect();
        assert_eq!(order, vec!["m-adv", "m-int", "m-basic"]);
        // roughly 100, 83 and 67 against a threshold of 90
        assert!(ranked[0].is_top_candidate);
        assert!(!ranked[1].is_top_candidate);
        assert!(!ranked[2].is_top_candidate);
    }

    #[test]
    fn test_ties_break_by_member_id() {
        let members = vec![TeamMember::new("b", 40.0), TeamMember::new("a", 40.0)];
        let ranked = score_members(&members, &WorkRequirements::new(Vec::<String>::new(), 4.0));

        assert_eq!(ranked[0].member_id, "a");
        assert!(ranked.iter().all(|c| c.is_top_candidate));
    }

    #[test]
    fn test_all_zero_scores_are_all_top() {
        let members = vec![
            TeamMember::new("a", 0.0),
            TeamMember::new("b", 40.0).with_workload(40.0),
        ];
        let ranked = score_members(&members, &WorkRequirements::new(["Go"], 4.0));
        assert!(ranked.iter().all(|c| c.combined_score == 0.0 && c.is_top_candidate));
    }

    #[test]
    fn test_reasoning_mentions_penalty() {
        let member = TeamMember::new("m", 40.0).with_workload(38.0);
        let candidate = score_member(&member, &WorkRequirements::new(["Go"], 1.0));
        assert!(candidate.reasoning.capacity.penalty_applied);
        assert!(candidate.reasoning.summary.contains("low headroom penalty"));
    }
}
