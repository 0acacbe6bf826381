use crate::matching::scoring::MAX_SKILL_LEVEL;
use crate::models::profile::{RequirementSkill, Skill};

const MIN_LEVEL: i32 = 1;

/// Checks a posting before it is written. Returns every problem found, not
/// just the first, so a form can show them all at once.
pub fn validate_posting(title: &str, required_skills: &[RequirementSkill]) -> Vec<String> {
    let mut problems = Vec::new();

    if title.trim().is_empty() {
        problems.push("title cannot be empty".to_string());
    }
    if required_skills.is_empty() {
        problems.push("at least one required skill is needed".to_string());
    }

    for (index, requirement) in required_skills.iter().enumerate() {
        if requirement.name.trim().is_empty() {
            problems.push(format!("required_skills[{index}]: name cannot be empty"));
        }
        if !in_level_range(requirement.weight) {
            problems.push(format!(
                "required_skills[{index}]: weight must be between {MIN_LEVEL} and {MAX_SKILL_LEVEL}"
            ));
        }
        if !in_level_range(requirement.min_level) {
            problems.push(format!(
                "required_skills[{index}]: min_level must be between {MIN_LEVEL} and {MAX_SKILL_LEVEL}"
            ));
        }
    }

    problems
}

pub fn validate_profile(skills: &[Skill], cgpa: f64, project_count: i32) -> Vec<String> {
    let mut problems = Vec::new();

    for (index, skill) in skills.iter().enumerate() {
        if skill.name.trim().is_empty() {
            problems.push(format!("skills[{index}]: name cannot be empty"));
        }
        if !in_level_range(skill.level) {
            problems.push(format!(
                "skills[{index}]: level must be between {MIN_LEVEL} and {MAX_SKILL_LEVEL}"
            ));
        }
    }
    if !cgpa.is_finite() || cgpa < 0.0 {
        problems.push("cgpa must be a non-negative number".to_string());
    }
    if project_count < 0 {
        problems.push("project_count cannot be negative".to_string());
    }

    problems
}

fn in_level_range(value: i32) -> bool {
    (MIN_LEVEL..=MAX_SKILL_LEVEL).contains(&value)
}
