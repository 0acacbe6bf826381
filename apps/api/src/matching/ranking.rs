//! Ranking: scores a candidate pool for one posting, normalises
//! to a percentage and sorts. Also the reverse view: one candidate against
//! every open posting.

use serde::Serialize;
use uuid::Uuid;

use crate::matching::scoring::{MatchScorer, ScoreResult, MAX_SKILL_LEVEL};
use crate::models::profile::{CandidateProfile, Posting};

#[derive(Debug, Clone, Serialize)]
pub struct RankedCandidate {
    pub rank: usize,
    pub candidate: CandidateProfile,
    pub score: ScoreResult,
    pub percentage: f64,
    pub fully_matched: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolAnalytics {
    pub average_percentage: f64,
    pub top_percentage: f64,
    pub pool_size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Ranking {
    pub posting_id: Uuid,
    pub candidates: Vec<RankedCandidate>,
    /// Omitted for an empty pool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analytics: Option<PoolAnalytics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendedPosting {
    pub posting: Posting,
    pub final_score: i32,
    pub percentage: f64,
    pub gaps: Vec<String>,
}

/// Best achievable score for a posting. Never zero, so it is always safe to
/// divide by.
pub fn max_possible_score(posting: &Posting) -> i32 {
    let total: i32 = posting
        .required_skills
        .iter()
        .map(|r| r.weight * MAX_SKILL_LEVEL)
        .sum();
    if total > 0 {
        total
    } else {
        1
    }
}

/// `final_score` as a share of `max_score`, one decimal, floored at 0.
pub fn to_percentage(final_score: i32, max_score: i32) -> f64 {
    round_one_decimal(final_score as f64 / max_score as f64 * 100.0).max(0.0)
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Ranks the pool by `final_score`, highest first. Equal scores keep pool
/// order.
pub fn rank_candidates(
    scorer: &dyn MatchScorer,
    pool: Vec<CandidateProfile>,
    posting: &Posting,
) -> Ranking {
    let max_score = max_possible_score(posting);

    let mut candidates: Vec<RankedCandidate> = pool
        .into_iter()
        .map(|candidate| {
            let score = scorer.score(&candidate, posting);
            RankedCandidate {
                rank: 0,
                percentage: to_percentage(score.final_score, max_score),
                fully_matched: score.gaps.is_empty(),
                candidate,
                score,
            }
        })
        .collect();

    // Vec::sort_by is stable.
    candidates.sort_by(|a, b| b.score.final_score.cmp(&a.score.final_score));
    for (index, entry) in candidates.iter_mut().enumerate() {
        entry.rank = index + 1;
    }

    let analytics = pool_analytics(&candidates);

    Ranking {
        posting_id: posting.id,
        candidates,
        analytics,
    }
}

pub fn pool_analytics(ranked: &[RankedCandidate]) -> Option<PoolAnalytics> {
    let top = ranked.first()?;
    let total: f64 = ranked.iter().map(|c| c.percentage).sum();
    Some(PoolAnalytics {
        average_percentage: round_one_decimal(total / ranked.len() as f64),
        top_percentage: top.percentage,
        pool_size: ranked.len(),
    })
}

/// Scores one candidate against every posting, best percentage first.
pub fn recommend_postings(
    scorer: &dyn MatchScorer,
    candidate: &CandidateProfile,
    postings: Vec<Posting>,
) -> Vec<RecommendedPosting> {
    let mut recommended: Vec<RecommendedPosting> = postings
        .into_iter()
        .map(|posting| {
            let score = scorer.score(candidate, &posting);
            RecommendedPosting {
                percentage: to_percentage(score.final_score, max_possible_score(&posting)),
                final_score: score.final_score,
                gaps: score.gaps,
                posting,
            }
        })
        .collect();

    recommended.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));
    recommended
}
