use serde::{Deserialize, Serialize};

use super::roster::TeamMember;
use super::round_score;

/// Below this share of free capacity a member is considered nearly full.
pub const LOW_HEADROOM_RATIO: f64 = 0.2;

/// Multiplier applied to the capacity score of a nearly full member.
pub const LOW_HEADROOM_PENALTY: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityBreakdown {
    pub capacity_hours: f64,
    pub workload_hours: f64,
    pub available_hours: f64,
    pub estimated_hours: f64,
    /// `available / capacity`, 0 when the member has no capacity
    pub headroom_ratio: f64,
    pub base_score: f64,
    pub penalty_applied: bool,
    pub score: f64,
}

/// Score 0..=100 for how well the member's free hours cover the estimate.
pub fn score_capacity(member: &TeamMember, estimated_hours: f64) -> CapacityBreakdown {
    let capacity = member.capacity_hours_per_week;
    let available = member.available_hours();

    let base_score = round_score(if estimated_hours > 0.0 {
        (available / estimated_hours).min(1.0) * 100.0
    } else if available > 0.0 {
        100.0
    } else {
        0.0
    });

    let headroom_ratio = if capacity > 0.0 { available / capacity } else { 0.0 };
    let penalty_applied = capacity <= 0.0 || headroom_ratio < LOW_HEADROOM_RATIO;
    // Halved after rounding so a penalized score is exactly half the base.
    let score = if penalty_applied {
        base_score * LOW_HEADROOM_PENALTY
    } else {
        base_score
    };

    CapacityBreakdown {
        capacity_hours: capacity,
        workload_hours: member.current_workload_hours,
        available_hours: available,
        estimated_hours,
        headroom_ratio: round_score(headroom_ratio),
        base_score,
        penalty_applied,
        score,
    }
}
