use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("Team not found: {team_id}")]
    TeamNotFound { team_id: String },

    #[error("Roster unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Roster parse error: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// How well a member knows a skill. Stored as the numbers 1 to 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Proficiency {
    Basic = 1,
    Intermediate = 2,
    Advanced = 3,
}

impl Proficiency {
    pub fn level(self) -> u8 {
        self as u8
    }

    /// Contribution of one held skill to the skill score, in `(0, 1]`.
    pub fn weight(self) -> f64 {
        f64::from(self.level()) / 3.0
    }
}

impl TryFrom<u8> for Proficiency {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            1 => Ok(Proficiency::Basic),
            2 => Ok(Proficiency::Intermediate),
            3 => Ok(Proficiency::Advanced),
            other => Err(format!("proficiency must be 1, 2 or 3, got {other}")),
        }
    }
}

impl From<Proficiency> for u8 {
    fn from(proficiency: Proficiency) -> Self {
        proficiency.level()
    }
}

impl fmt::Display for Proficiency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Proficiency::Basic => "basic",
            Proficiency::Intermediate => "intermediate",
            Proficiency::Advanced => "advanced",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberSkill {
    pub name: String,
    pub proficiency: Proficiency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub member_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub skills: Vec<MemberSkill>,
    pub capacity_hours_per_week: f64,
    #[serde(default)]
    pub current_workload_hours: f64,
}

impl TeamMember {
    pub fn new(member_id: impl Into<String>, capacity_hours_per_week: f64) -> Self {
        let member_id = member_id.into();
        Self {
            name: member_id.clone(),
            member_id,
            skills: Vec::new(),
            capacity_hours_per_week,
            current_workload_hours: 0.0,
        }
    }

    pub fn with_skill(mut self, name: impl Into<String>, proficiency: Proficiency) -> Self {
        self.skills.push(MemberSkill {
            name: name.into(),
            proficiency,
        });
        self
    }

    pub fn with_workload(mut self, hours: f64) -> Self {
        self.current_workload_hours = hours;
        self
    }

    /// Unclaimed hours this week, never negative.
    pub fn available_hours(&self) -> f64 {
        (self.capacity_hours_per_week - self.current_workload_hours).max(0.0)
    }
}

/// Source of team membership, skills and workload.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TeamRoster: Send + Sync {
    async fn members(&self, team_id: &str) -> Result<Vec<TeamMember>, RosterError>;
}

/// Roster held in memory, usually read from a JSON file shaped
/// `{"team-id": [member, ...]}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct StaticRoster {
    teams: HashMap<String, Vec<TeamMember>>,
}

impl StaticRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_team(mut self, team_id: impl Into<String>, members: Vec<TeamMember>) -> Self {
        self.teams.insert(team_id.into(), members);
        self
    }

    pub fn from_json(json: &str) -> Result<Self, RosterError> {
        Ok(serde_json::from_str(json)?)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RosterError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let roster = Self::from_json(&content)?;
        debug!(path = %path.display(), teams = roster.teams.len(), "Loaded team roster");
        Ok(roster)
    }
}

#[async_trait]
impl TeamRoster for StaticRoster {
    async fn members(&self, team_id: &str) -> Result<Vec<TeamMember>, RosterError> {
        self.teams
            .get(team_id)
            .cloned()
            .ok_or_else(|| RosterError::TeamNotFound {
                team_id: team_id.to_string(),
            })
    }
}
