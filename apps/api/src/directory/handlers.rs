use axum::{extract::State, http::StatusCode, Json};

use crate::directory::service::{
    create_posting, save_profile, shortlist, CreatePostingRequest, SaveProfileRequest,
    ShortlistRequest,
};
use crate::errors::AppError;
use crate::identity::CurrentUser;
use crate::models::chat::ShortlistRecord;
use crate::models::profile::{CandidateProfile, Posting};
use crate::models::user::Role;
use crate::state::AppState;
use crate::store::with_read_retry;

/// PUT /api/v1/profile
pub async fn handle_save_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<SaveProfileRequest>,
) -> Result<Json<CandidateProfile>, AppError> {
    user.require(Role::Student)?;
    let profile = save_profile(state.directory.as_ref(), &user.id, request).await?;
    Ok(Json(profile))
}

/// GET /api/v1/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<CandidateProfile>, AppError> {
    user.require(Role::Student)?;
    let directory = state.directory.as_ref();
    let candidate_id = user.id.as_str();
    let profile = with_read_retry(&state.retry_policy(), move || {
        directory.fetch_profile(candidate_id)
    })
    .await?
    .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;
    Ok(Json(profile))
}

/// POST /api/v1/postings
pub async fn handle_create_posting(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreatePostingRequest>,
) -> Result<(StatusCode, Json<Posting>), AppError> {
    user.require(Role::Recruiter)?;
    let posting = create_posting(state.directory.as_ref(), &user.id, request).await?;
    Ok((StatusCode::CREATED, Json(posting)))
}

/// GET /api/v1/postings
///
/// Newest first. Open to both roles.
pub async fn handle_list_postings(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<Vec<Posting>>, AppError> {
    let directory = state.directory.as_ref();
    let postings = with_read_retry(&state.retry_policy(), move || directory.list_postings()).await?;
    Ok(Json(postings))
}

/// POST /api/v1/shortlists
pub async fn handle_shortlist(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ShortlistRequest>,
) -> Result<(StatusCode, Json<ShortlistRecord>), AppError> {
    user.require(Role::Recruiter)?;
    let record = shortlist(
        state.directory.as_ref(),
        &state.retry_policy(),
        &user.id,
        request,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(record)))
}
