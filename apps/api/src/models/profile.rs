use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A skill claimed by a candidate, self-assessed on a 1–5 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub level: i32,
}

/// A skill a posting asks for. `weight` scales its contribution to the score,
/// `min_level` is a hard gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementSkill {
    pub name: String,
    pub weight: i32,
    pub min_level: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub id: String,
    /// `None` when the candidate never filled in a skill list. An empty list
    /// is a real (if unfortunate) answer and is scored as all gaps.
    #[serde(default)]
    pub skills: Option<Vec<Skill>>,
    pub cgpa: f64,
    pub project_count: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub id: Uuid,
    pub title: String,
    pub required_skills: Vec<RequirementSkill>,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}
