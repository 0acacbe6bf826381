pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::chat::handlers as chat;
use crate::directory::handlers as directory;
use crate::matching::handlers as matching;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Directory
        .route(
            "/api/v1/profile",
            get(directory::handle_get_profile).put(directory::handle_save_profile),
        )
        .route(
            "/api/v1/postings",
            get(directory::handle_list_postings).post(directory::handle_create_posting),
        )
        .route("/api/v1/shortlists", post(directory::handle_shortlist))
        // Matching
        .route(
            "/api/v1/postings/:id/ranking",
            get(matching::handle_rank_posting),
        )
        .route(
            "/api/v1/recommendations",
            get(matching::handle_recommendations),
        )
        // Conversations
        .route(
            "/api/v1/conversations",
            get(chat::handle_list_conversations).post(chat::handle_open_conversation),
        )
        .route(
            "/api/v1/conversations/:id/messages",
            get(chat::handle_get_messages).post(chat::handle_send_message),
        )
        .route("/api/v1/conversations/:id/live", get(chat::handle_live))
        .route("/api/v1/notifications", get(chat::handle_notifications))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::identity::{USER_ID_HEADER, USER_ROLE_HEADER};

    const RECRUITER: (&str, &str) = ("rec-1", "recruiter");
    const STUDENT: (&str, &str) = ("stu-1", "student");

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        user: Option<(&str, &str)>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some((id, role)) = user {
            builder = builder
                .header(USER_ID_HEADER, id)
                .header(USER_ROLE_HEADER, role);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn app() -> Router {
        build_router(AppState::in_memory())
    }

    async fn create_posting(app: &Router) -> String {
        let (status, posting) = call(
            app,
            "POST",
            "/api/v1/postings",
            Some(RECRUITER),
            Some(json!({
                "title": "Backend intern",
                "required_skills": [
                    {"name": "Rust", "weight": 3, "min_level": 2},
                    {"name": "SQL", "weight": 2, "min_level": 3}
                ]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        posting["id"].as_str().unwrap().to_string()
    }

    async fn save_profile(app: &Router, student_id: &str) {
        let (status, _) = call(
            app,
            "PUT",
            "/api/v1/profile",
            Some((student_id, "student")),
            Some(json!({"skills": [{"name": "Rust", "level": 3}], "cgpa": 7.2})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(&app(), "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "match-api");
    }

    #[tokio::test]
    async fn test_missing_identity_is_unauthorized() {
        let (status, body) = call(&app(), "GET", "/api/v1/conversations", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_students_cannot_create_postings() {
        let (status, _) = call(
            &app(),
            "POST",
            "/api/v1/postings",
            Some(STUDENT),
            Some(json!({"title": "x", "required_skills": []})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_invalid_posting_is_bad_request() {
        let (status, body) = call(
            &app(),
            "POST",
            "/api/v1/postings",
            Some(RECRUITER),
            Some(json!({"title": " ", "required_skills": []})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["retryable"], false);
    }

    #[tokio::test]
    async fn test_ranking_and_recommendations() {
        let app = app();
        let posting_id = create_posting(&app).await;

        let (status, _) = call(
            &app,
            "PUT",
            "/api/v1/profile",
            Some(STUDENT),
            Some(json!({
                "skills": [{"name": "rust", "level": 4}, {"name": "SQL", "level": 3}],
                "cgpa": 8.1,
                "project_count": 2
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        call(
            &app,
            "PUT",
            "/api/v1/profile",
            Some(("stu-2", "student")),
            Some(json!({
                "skills": [{"name": "Rust", "level": 1}],
                "cgpa": 6.5,
                "project_count": 3
            })),
        )
        .await;

        let (status, ranking) = call(
            &app,
            "GET",
            &format!("/api/v1/postings/{posting_id}/ranking"),
            Some(RECRUITER),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let candidates = ranking["candidates"].as_array().unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0]["candidate"]["id"], "stu-1");
        assert_eq!(candidates[0]["rank"], 1);
        // 3*4 + 2*3 = 18 of a possible 25.
        assert_eq!(candidates[0]["percentage"], 72.0);
        assert_eq!(candidates[0]["fully_matched"], true);
        assert_eq!(ranking["analytics"]["pool_size"], 2);

        let (status, recommended) =
            call(&app, "GET", "/api/v1/recommendations", Some(STUDENT), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(recommended[0]["posting"]["id"], posting_id.as_str());
        assert_eq!(recommended[0]["percentage"], 72.0);
    }

    #[tokio::test]
    async fn test_ranking_unknown_posting_is_not_found() {
        let (status, _) = call(
            &app(),
            "GET",
            &format!("/api/v1/postings/{}/ranking", uuid::Uuid::new_v4()),
            Some(RECRUITER),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_conversation_flow() {
        let app = app();
        let posting_id = create_posting(&app).await;
        save_profile(&app, STUDENT.0).await;
        let open = json!({"candidate_id": STUDENT.0, "posting_id": posting_id});

        let (status, first) = call(
            &app,
            "POST",
            "/api/v1/conversations",
            Some(RECRUITER),
            Some(open.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, second) = call(
            &app,
            "POST",
            "/api/v1/conversations",
            Some(RECRUITER),
            Some(open),
        )
        .await;
        assert_eq!(first["id"], second["id"]);
        let conversation_id = first["id"].as_str().unwrap().to_string();
        let messages_uri = format!("/api/v1/conversations/{conversation_id}/messages");

        for text in ["hello", "are you free tomorrow?"] {
            let (status, _) = call(
                &app,
                "POST",
                &messages_uri,
                Some(RECRUITER),
                Some(json!({ "text": text })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, notifications) =
            call(&app, "GET", "/api/v1/notifications", Some(STUDENT), None).await;
        assert_eq!(notifications["unread_count"], 2);

        let (status, snapshot) = call(&app, "GET", &messages_uri, Some(STUDENT), None).await;
        assert_eq!(status, StatusCode::OK);
        let messages = snapshot["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["text"], "hello");
        assert_eq!(messages[1]["text"], "are you free tomorrow?");

        let (_, notifications) =
            call(&app, "GET", "/api/v1/notifications", Some(STUDENT), None).await;
        assert_eq!(notifications["unread_count"], 0);

        let (_, listed) = call(&app, "GET", "/api/v1/conversations", Some(STUDENT), None).await;
        assert_eq!(listed[0]["last_message"], "are you free tomorrow?");

        let (status, _) = call(
            &app,
            "GET",
            &messages_uri,
            Some(("stu-2", "student")),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_conversation_for_unknown_posting_is_not_found() {
        let (status, _) = call(
            &app(),
            "POST",
            "/api/v1/conversations",
            Some(RECRUITER),
            Some(json!({"candidate_id": "stu-1", "posting_id": uuid::Uuid::new_v4()})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_shortlist_shows_up_in_student_notifications() {
        let app = app();
        let posting_id = create_posting(&app).await;
        save_profile(&app, STUDENT.0).await;

        let (status, record) = call(
            &app,
            "POST",
            "/api/v1/shortlists",
            Some(RECRUITER),
            Some(json!({"candidate_id": STUDENT.0, "posting_id": posting_id})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(record["status"], "shortlisted");

        let (_, notifications) =
            call(&app, "GET", "/api/v1/notifications", Some(STUDENT), None).await;
        assert_eq!(notifications["shortlists"][0]["posting_id"], posting_id.as_str());
    }

    #[tokio::test]
    async fn test_unknown_candidate_is_not_found_and_writes_nothing() {
        let app = app();
        let posting_id = create_posting(&app).await;
        let body = json!({"candidate_id": "no-such-candidate", "posting_id": posting_id});

        let (status, error) = call(
            &app,
            "POST",
            "/api/v1/conversations",
            Some(RECRUITER),
            Some(body.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error["error"]["code"], "NOT_FOUND");
        let (_, listed) = call(&app, "GET", "/api/v1/conversations", Some(RECRUITER), None).await;
        assert_eq!(listed, json!([]));

        let (status, _) = call(&app, "POST", "/api/v1/shortlists", Some(RECRUITER), Some(body)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, notifications) = call(
            &app,
            "GET",
            "/api/v1/notifications",
            Some(("no-such-candidate", "student")),
            None,
        )
        .await;
        assert_eq!(notifications["shortlists"], json!([]));
    }
}
