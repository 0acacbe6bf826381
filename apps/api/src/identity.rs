//! Caller identity, as asserted by the upstream identity provider.
//!
//! Handlers take a `CurrentUser` argument and pass its id explicitly into
//! every core call; nothing reads identity from ambient state.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::errors::AppError;
use crate::models::user::Role;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn require(&self, role: Role) -> Result<(), AppError> {
        if self.role == role {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header_value(parts, USER_ID_HEADER).ok_or(AppError::Unauthorized)?;
        let role = header_value(parts, USER_ROLE_HEADER)
            .and_then(Role::parse)
            .ok_or(AppError::Unauthorized)?;

        Ok(CurrentUser {
            id: id.to_string(),
            role,
        })
    }
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(headers: &[(&str, &str)]) -> Result<CurrentUser, AppError> {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        CurrentUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_extracts_id_and_role() {
        let user = extract(&[(USER_ID_HEADER, "r1"), (USER_ROLE_HEADER, "recruiter")])
            .await
            .unwrap();
        assert_eq!(user.id, "r1");
        assert_eq!(user.role, Role::Recruiter);
    }

    #[tokio::test]
    async fn test_missing_headers_are_unauthorized() {
        assert!(matches!(extract(&[]).await, Err(AppError::Unauthorized)));
        assert!(matches!(
            extract(&[(USER_ID_HEADER, "r1")]).await,
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            extract(&[(USER_ID_HEADER, "  "), (USER_ROLE_HEADER, "student")]).await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_unknown_role_is_unauthorized() {
        assert!(matches!(
            extract(&[(USER_ID_HEADER, "u1"), (USER_ROLE_HEADER, "admin")]).await,
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn test_require_role() {
        let user = CurrentUser {
            id: "c1".to_string(),
            role: Role::Student,
        };
        assert!(user.require(Role::Student).is_ok());
        assert!(matches!(user.require(Role::Recruiter), Err(AppError::Forbidden)));
    }
}
