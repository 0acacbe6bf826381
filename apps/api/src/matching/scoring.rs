//! Weighted skill fit of one candidate against one posting.
//!
//! Default: `WeightedSkillScorer` (pure, deterministic, no I/O).
//!
//! `AppState` holds an `Arc<dyn MatchScorer>` so ranking and recommendation
//! code never names a concrete scorer.

use serde::{Deserialize, Serialize};

use crate::models::profile::{CandidateProfile, Posting, RequirementSkill, Skill};

/// Highest level a skill can be rated at. Also the multiplier for the
/// best possible score of a requirement.
pub const MAX_SKILL_LEVEL: i32 = 5;

/// Fixed bonus for candidates with a lower GPA but real project experience.
pub const FAIRNESS_BOOST: i32 = 5;
pub const FAIRNESS_CGPA_CEILING: f64 = 7.0;
pub const FAIRNESS_MIN_PROJECTS: i32 = 2;

// ────────────────────────────────────────────────────────────────────────────
// Output data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkillStatus {
    Matched,
    Gap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillBreakdown {
    pub skill: String,
    pub status: SkillStatus,
}

/// Derived per request, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub skill_score: i32,
    pub fairness_boost: i32,
    pub final_score: i32,
    pub breakdown: Vec<SkillBreakdown>,
    pub gaps: Vec<String>,
}

impl ScoreResult {
    /// The defined result when there is nothing to compare.
    pub fn zero() -> Self {
        Self {
            skill_score: 0,
            fairness_boost: 0,
            final_score: 0,
            breakdown: vec![],
            gaps: vec![],
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// Scores a candidate against a posting. CPU-bound; implementations must not
/// perform I/O.
pub trait MatchScorer: Send + Sync {
    fn score(&self, candidate: &CandidateProfile, posting: &Posting) -> ScoreResult;
}

/// Level × weight per satisfied requirement, minus the weight per gap, plus
/// the fairness boost.
pub struct WeightedSkillScorer;

impl MatchScorer for WeightedSkillScorer {
    fn score(&self, candidate: &CandidateProfile, posting: &Posting) -> ScoreResult {
        compute_match_score(candidate, posting)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Core algorithm
// ────────────────────────────────────────────────────────────────────────────

pub fn compute_match_score(candidate: &CandidateProfile, posting: &Posting) -> ScoreResult {
    let Some(skills) = candidate.skills.as_deref() else {
        return ScoreResult::zero();
    };
    if posting.required_skills.is_empty() {
        return ScoreResult::zero();
    }

    let mut skill_score = 0;
    let mut breakdown = Vec::with_capacity(posting.required_skills.len());
    let mut gaps = Vec::new();

    for requirement in &posting.required_skills {
        let status = match find_skill(skills, requirement) {
            Some(skill) if skill.level >= requirement.min_level => {
                skill_score += skill.level * requirement.weight;
                SkillStatus::Matched
            }
            _ => {
                skill_score -= requirement.weight;
                gaps.push(requirement.name.clone());
                SkillStatus::Gap
            }
        };
        breakdown.push(SkillBreakdown {
            skill: requirement.name.clone(),
            status,
        });
    }

    let fairness_boost = fairness_boost(candidate);

    ScoreResult {
        skill_score,
        fairness_boost,
        final_score: skill_score + fairness_boost,
        breakdown,
        gaps,
    }
}

/// First candidate skill whose name matches the requirement, ignoring case.
fn find_skill<'a>(skills: &'a [Skill], requirement: &RequirementSkill) -> Option<&'a Skill> {
    let wanted = requirement.name.to_lowercase();
    skills.iter().find(|s| s.name.to_lowercase() == wanted)
}

fn fairness_boost(candidate: &CandidateProfile) -> i32 {
    if candidate.cgpa < FAIRNESS_CGPA_CEILING && candidate.project_count >= FAIRNESS_MIN_PROJECTS {
        FAIRNESS_BOOST
    } else {
        0
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn candidate(skills: Option<Vec<(&str, i32)>>, cgpa: f64, project_count: i32) -> CandidateProfile {
        CandidateProfile {
            id: "c1".to_string(),
            skills: skills.map(|list| {
                list.into_iter()
                    .map(|(name, level)| Skill {
                        name: name.to_string(),
                        level,
                    })
                    .collect()
            }),
            cgpa,
            project_count,
        }
    }

    fn posting(requirements: Vec<(&str, i32, i32)>) -> Posting {
        Posting {
            id: Uuid::new_v4(),
            title: "Backend Intern".to_string(),
            required_skills: requirements
                .into_iter()
                .map(|(name, weight, min_level)| RequirementSkill {
                    name: name.to_string(),
                    weight,
                    min_level,
                })
                .collect(),
            owner_id: "r1".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_matched_skill_scores_level_times_weight() {
        let result = compute_match_score(
            &candidate(Some(vec![("Python", 4)]), 8.0, 0),
            &posting(vec![("Python", 3, 3)]),
        );
        assert_eq!(result.skill_score, 12);
        assert_eq!(result.final_score, 12);
        assert_eq!(result.breakdown[0].status, SkillStatus::Matched);
        assert!(result.gaps.is_empty());
    }

    #[test]
    fn test_name_match_ignores_case() {
        let result = compute_match_score(
            &candidate(Some(vec![("python", 4)]), 8.0, 0),
            &posting(vec![("PYTHON", 1, 1)]),
        );
        assert_eq!(result.breakdown[0].status, SkillStatus::Matched);
        assert_eq!(result.skill_score, 4);
    }

    #[test]
    fn test_level_below_minimum_is_a_gap() {
        let result = compute_match_score(
            &candidate(Some(vec![("Rust", 2)]), 8.0, 0),
            &posting(vec![("Rust", 4, 3)]),
        );
        assert_eq!(result.skill_score, -4);
        assert_eq!(result.gaps, vec!["Rust".to_string()]);
        assert_eq!(result.breakdown[0].status, SkillStatus::Gap);
    }

    #[test]
    fn test_empty_skill_list_scores_all_gaps_with_boost() {
        let result = compute_match_score(
            &candidate(Some(vec![]), 6.5, 3),
            &posting(vec![("Go", 2, 2)]),
        );
        assert_eq!(result.skill_score, -2);
        assert_eq!(result.fairness_boost, 5);
        assert_eq!(result.final_score, 3);
        assert_eq!(result.gaps, vec!["Go".to_string()]);
    }

    #[test]
    fn test_absent_skills_returns_zero() {
        let result = compute_match_score(&candidate(None, 6.0, 4), &posting(vec![("Go", 2, 2)]));
        assert_eq!(result, ScoreResult::zero());
    }

    #[test]
    fn test_no_requirements_returns_zero() {
        let result = compute_match_score(&candidate(Some(vec![("Go", 5)]), 6.0, 4), &posting(vec![]));
        assert_eq!(result, ScoreResult::zero());
        assert_eq!(result.final_score, result.fairness_boost);
    }

    #[test]
    fn test_fairness_boost_needs_both_conditions() {
        let req = posting(vec![("Go", 1, 1)]);
        let skills = Some(vec![("Go", 1)]);
        assert_eq!(compute_match_score(&candidate(skills.clone(), 6.9, 2), &req).fairness_boost, 5);
        assert_eq!(compute_match_score(&candidate(skills.clone(), 7.0, 2), &req).fairness_boost, 0);
        assert_eq!(compute_match_score(&candidate(skills, 6.0, 1), &req).fairness_boost, 0);
    }

    #[test]
    fn test_breakdown_follows_requirement_order() {
        let result = compute_match_score(
            &candidate(Some(vec![("SQL", 3), ("Docker", 5)]), 8.0, 0),
            &posting(vec![("Docker", 2, 4), ("Kubernetes", 3, 1), ("SQL", 1, 3)]),
        );
        let skills: Vec<_> = result.breakdown.iter().map(|b| b.skill.as_str()).collect();
        assert_eq!(skills, vec!["Docker", "Kubernetes", "SQL"]);
        // 5*2 - 3 + 3*1
        assert_eq!(result.skill_score, 10);
        assert_eq!(result.gaps, vec!["Kubernetes".to_string()]);
    }

    #[test]
    fn test_scorer_trait_delegates_to_algorithm() {
        let c = candidate(Some(vec![("Python", 4)]), 8.0, 0);
        let p = posting(vec![("Python", 3, 3)]);
        assert_eq!(WeightedSkillScorer.score(&c, &p), compute_match_score(&c, &p));
    }
}
