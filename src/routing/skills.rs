use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::roster::{Proficiency, TeamMember};
use super::round_score;

/// Canonical form used to compare skill names.
pub fn normalize_skill(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillMatch {
    pub skill: String,
    pub proficiency: Proficiency,
    pub weight: f64,
}

/// How a member's skills line up against a required set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillBreakdown {
    pub required_count: usize,
    pub matched: Vec<SkillMatch>,
    pub missing: Vec<String>,
    pub score: f64,
}

/// Score 0..=100: the mean proficiency weight over the required skills,
/// with a missing skill weighing 0. Blank and repeated requirements count once.
pub fn score_skills(member: &TeamMember, required: &[String]) -> SkillBreakdown {
    let mut held: HashMap<String, Proficiency> = HashMap::new();
    for skill in &member.skills {
        let entry = held.entry(normalize_skill(&skill.name)).or_insert(skill.proficiency);
        *entry = (*entry).max(skill.proficiency);
    }

    let mut seen = Vec::new();
    let mut matched = Vec::new();
    let mut missing = Vec::new();
    for name in required {
        let key = normalize_skill(name);
        if key.is_empty() || seen.contains(&key) {
            continue;
        }
        match held.get(&key) {
            Some(proficiency) => matched.push(SkillMatch {
                skill: name.trim().to_string(),
                proficiency: *proficiency,
                weight: proficiency.weight(),
            }),
            None => missing.push(name.trim().to_string()),
        }
        seen.push(key);
    }

    let required_count = seen.len();
    let score = if required_count == 0 {
        0.0
    } else {
        let total: f64 = matched.iter().map(|m| m.weight).sum();
        round_score(total / required_count as f64 * 100.0)
    };

    SkillBreakdown {
        required_count,
        matched,
        missing,
        score,
    }
}
