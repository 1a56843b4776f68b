// Property-based tests for routing scores
// Checks the combined-score, penalty and top-candidate laws over random teams

use agent_workflows::routing::{
    combine_scores, score_capacity, score_members, Proficiency, TeamMember, WorkRequirements,
    LOW_HEADROOM_PENALTY, LOW_HEADROOM_RATIO, TOP_CANDIDATE_RATIO,
};
use proptest::prelude::*;
use proptest_derive::Arbitrary;

#[derive(Debug, Clone, Arbitrary)]
struct MemberConfig {
    #[proptest(strategy = "0u32..=60")]
    capacity: u32,
    #[proptest(strategy = "0u32..=80")]
    workload: u32,
    #[proptest(strategy = "prop::collection::vec((skill_strategy(), 1u8..=3), 0..4)")]
    skills: Vec<(String, u8)>,
}

fn skill_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Laravel".to_string()),
        Just("rust".to_string()),
        Just("Kubernetes".to_string()),
        Just("design".to_string()),
    ]
}

fn build_team(configs: &[MemberConfig]) -> Vec<TeamMember> {
    configs
        .iter()
        .enumerate()
        .map(|(index, config)| {
            let member = TeamMember::new(format!("m-{index:02}"), config.capacity as f64)
                .with_workload(config.workload as f64);
            config.skills.iter().fold(member, |member, (skill, level)| {
                let proficiency = Proficiency::try_from(*level).unwrap();
                member.with_skill(skill.clone(), proficiency)
            })
        })
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

proptest! {
    #[test]
    fn prop_scores_stay_in_bounds(
        configs in prop::collection::vec(any::<MemberConfig>(), 1..8),
        required in prop::collection::vec(skill_strategy(), 0..4),
        hours in 0.0f64..40.0,
    ) {
        let team = build_team(&configs);
        let ranked = score_members(&team, &WorkRequirements::new(required, hours));

        prop_assert_eq!(ranked.len(), team.len());
        for candidate in &ranked {
            for score in [candidate.skill_score, candidate.capacity_score, candidate.combined_score] {
                prop_assert!((0.0..=100.0).contains(&score), "score out of range: {}", score);
            }
        }
    }

    #[test]
    fn prop_combined_score_law(
        configs in prop::collection::vec(any::<MemberConfig>(), 1..8),
        required in prop::collection::vec(skill_strategy(), 0..4),
        hours in 0.0f64..40.0,
    ) {
        let team = build_team(&configs);
        for candidate in score_members(&team, &WorkRequirements::new(required, hours)) {
            let expected = round2(0.5 * candidate.skill_score + 0.5 * candidate.capacity_score);
            prop_assert!((candidate.combined_score - expected).abs() < 1e-9);
            prop_assert_eq!(
                candidate.combined_score,
                combine_scores(candidate.skill_score, candidate.capacity_score)
            );
        }
    }

    #[test]
    fn prop_top_candidate_law(
        configs in prop::collection::vec(any::<MemberConfig>(), 1..8),
        required in prop::collection::vec(skill_strategy(), 0..4),
        hours in 0.0f64..40.0,
    ) {
        let team = build_team(&configs);
        let ranked = score_members(&team, &WorkRequirements::new(required, hours));
        let max = ranked
            .iter()
            .map(|c| c.combined_score)
            .fold(f64::MIN, f64::max);

        prop_assert!(ranked[0].is_top_candidate);
        for pair in ranked.windows(2) {
            prop_assert!(pair[0].combined_score >= pair[1].combined_score);
        }
        for candidate in &ranked {
            prop_assert_eq!(
                candidate.is_top_candidate,
                candidate.combined_score >= max * TOP_CANDIDATE_RATIO
            );
        }
    }

    #[test]
    fn prop_low_headroom_halves_capacity_score(
        config in any::<MemberConfig>(),
        hours in 0.0f64..40.0,
    ) {
        let member = &build_team(&[config])[0];
        let capacity = score_capacity(member, hours);
        let penalized = capacity.capacity_hours <= 0.0
            || capacity.available_hours / capacity.capacity_hours < LOW_HEADROOM_RATIO;

        prop_assert_eq!(capacity.penalty_applied, penalized);
        if penalized {
            prop_assert_eq!(capacity.score, capacity.base_score * LOW_HEADROOM_PENALTY);
        } else {
            prop_assert_eq!(capacity.score, capacity.base_score);
        }
    }
}
