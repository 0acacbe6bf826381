use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::directory::validation::{validate_posting, validate_profile};
use crate::errors::AppError;
use crate::models::chat::ShortlistRecord;
use crate::models::profile::{CandidateProfile, Posting, RequirementSkill, Skill};
use crate::store::{with_read_retry, DirectoryStore, RetryPolicy};

pub const SHORTLISTED: &str = "shortlisted";

#[derive(Debug, Clone, Deserialize)]
pub struct SaveProfileRequest {
    #[serde(default)]
    pub skills: Option<Vec<Skill>>,
    pub cgpa: f64,
    #[serde(default)]
    pub project_count: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePostingRequest {
    pub title: String,
    pub required_skills: Vec<RequirementSkill>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShortlistRequest {
    pub candidate_id: String,
    pub posting_id: Uuid,
}

/// Saves the candidate's own profile, replacing any earlier version.
pub async fn save_profile(
    store: &dyn DirectoryStore,
    candidate_id: &str,
    request: SaveProfileRequest,
) -> Result<CandidateProfile, AppError> {
    let problems = validate_profile(
        request.skills.as_deref().unwrap_or_default(),
        request.cgpa,
        request.project_count,
    );
    if !problems.is_empty() {
        return Err(AppError::Validation(problems.join("; ")));
    }

    let profile = CandidateProfile {
        id: candidate_id.to_string(),
        skills: request.skills.map(|skills| {
            skills
                .into_iter()
                .map(|s| Skill {
                    name: s.name.trim().to_string(),
                    level: s.level,
                })
                .collect()
        }),
        cgpa: request.cgpa,
        project_count: request.project_count,
    };
    store.upsert_profile(&profile).await?;
    info!("Saved profile for candidate {candidate_id}");
    Ok(profile)
}

pub async fn create_posting(
    store: &dyn DirectoryStore,
    owner_id: &str,
    request: CreatePostingRequest,
) -> Result<Posting, AppError> {
    let problems = validate_posting(&request.title, &request.required_skills);
    if !problems.is_empty() {
        return Err(AppError::Validation(problems.join("; ")));
    }

    let posting = Posting {
        id: Uuid::new_v4(),
        title: request.title.trim().to_string(),
        required_skills: request
            .required_skills
            .into_iter()
            .map(|r| RequirementSkill {
                name: r.name.trim().to_string(),
                ..r
            })
            .collect(),
        owner_id: owner_id.to_string(),
        created_at: Utc::now(),
    };
    store.insert_posting(&posting).await?;
    info!(
        "Created posting {} ({} requirements) for recruiter {owner_id}",
        posting.id,
        posting.required_skills.len()
    );
    Ok(posting)
}

/// Looks up a candidate referenced by a recruiter action. Blank ids are a
/// validation error; ids with no saved profile are `NotFound`.
pub async fn require_candidate(
    store: &dyn DirectoryStore,
    retry: &RetryPolicy,
    candidate_id: &str,
) -> Result<CandidateProfile, AppError> {
    if candidate_id.is_empty() {
        return Err(AppError::Validation("candidate_id cannot be empty".to_string()));
    }
    with_read_retry(retry, move || store.fetch_profile(candidate_id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Candidate {candidate_id} not found")))
}

/// Records that `recruiter_id` shortlisted a candidate for one of their own
/// postings. Each call appends a record.
pub async fn shortlist(
    store: &dyn DirectoryStore,
    retry: &RetryPolicy,
    recruiter_id: &str,
    request: ShortlistRequest,
) -> Result<ShortlistRecord, AppError> {
    let candidate_id = request.candidate_id.trim();
    let posting = store
        .fetch_posting(request.posting_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Posting {} not found", request.posting_id)))?;
    if posting.owner_id != recruiter_id {
        return Err(AppError::Forbidden);
    }
    require_candidate(store, retry, candidate_id).await?;

    let record = ShortlistRecord {
        id: Uuid::new_v4(),
        recruiter_id: recruiter_id.to_string(),
        candidate_id: candidate_id.to_string(),
        posting_id: posting.id,
        status: SHORTLISTED.to_string(),
        created_at: Utc::now(),
    };
    store.insert_shortlist(&record).await?;
    info!(
        "Recruiter {recruiter_id} shortlisted {candidate_id} for posting {}",
        posting.id
    );
    Ok(record)
}
