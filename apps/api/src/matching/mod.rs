// Matching engine: per-pair skill scoring and pool ranking.
// Pure computation; handlers load inputs from the store and call in.

pub mod handlers;
pub mod ranking;
pub mod scoring;
