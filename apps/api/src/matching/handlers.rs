use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::identity::CurrentUser;
use crate::matching::ranking::{rank_candidates, recommend_postings, Ranking, RecommendedPosting};
use crate::models::user::Role;
use crate::state::AppState;
use crate::store::with_read_retry;

/// GET /api/v1/postings/:id/ranking
pub async fn handle_rank_posting(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(posting_id): Path<Uuid>,
) -> Result<Json<Ranking>, AppError> {
    user.require(Role::Recruiter)?;

    let retry = state.retry_policy();
    let directory = state.directory.as_ref();
    let posting = with_read_retry(&retry, move || directory.fetch_posting(posting_id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Posting {posting_id} not found")))?;
    let pool = with_read_retry(&retry, move || directory.list_profiles()).await?;

    let ranking = rank_candidates(state.scorer.as_ref(), pool, &posting);
    info!(
        "Ranked {} candidates for posting {posting_id}",
        ranking.candidates.len()
    );
    Ok(Json(ranking))
}

/// GET /api/v1/recommendations
pub async fn handle_recommendations(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<RecommendedPosting>>, AppError> {
    user.require(Role::Student)?;

    let retry = state.retry_policy();
    let directory = state.directory.as_ref();
    let candidate_id = user.id.as_str();
    let candidate = with_read_retry(&retry, move || directory.fetch_profile(candidate_id))
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found; save it first".to_string()))?;
    let postings = with_read_retry(&retry, move || directory.list_postings()).await?;

    Ok(Json(recommend_postings(
        state.scorer.as_ref(),
        &candidate,
        postings,
    )))
}
