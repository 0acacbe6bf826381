use serde::{Deserialize, Serialize};

/// Coarse role supplied by the identity provider alongside the user id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Recruiter,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Role::Student),
            "recruiter" => Some(Role::Recruiter),
            _ => None,
        }
    }
}
