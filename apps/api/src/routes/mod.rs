pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post, put},
    Router,
};

use crate::state::AppState;
use crate::{applications, jobs, messaging, notifications, realtime, resume, users};

/// Room for multipart framing and the `user_id` field on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health::health_handler))
        // Users
        .route("/api/v1/users", post(users::handlers::handle_create_user))
        .route(
            "/api/v1/users/:id",
            get(users::handlers::handle_get_user).patch(users::handlers::handle_update_profile),
        )
        // Jobs
        .route(
            "/api/v1/jobs",
            post(jobs::handlers::handle_create_job).get(jobs::handlers::handle_list_jobs),
        )
        .route(
            "/api/v1/jobs/:id",
            get(jobs::handlers::handle_get_job).patch(jobs::handlers::handle_update_job),
        )
        .route("/api/v1/jobs/:id/close", post(jobs::handlers::handle_close_job))
        .route(
            "/api/v1/jobs/:id/applications",
            get(applications::handlers::handle_list_for_job),
        )
        // Applications
        .route(
            "/api/v1/applications",
            post(applications::handlers::handle_apply)
                .get(applications::handlers::handle_list_for_applicant),
        )
        .route(
            "/api/v1/applications/:id",
            get(applications::handlers::handle_get),
        )
        .route(
            "/api/v1/applications/:id/status",
            patch(applications::handlers::handle_update_status),
        )
        .route(
            "/api/v1/applications/:id/withdraw",
            post(applications::handlers::handle_withdraw),
        )
        // Messaging
        .route(
            "/api/v1/conversations",
            post(messaging::handlers::handle_start_conversation)
                .get(messaging::handlers::handle_list_conversations),
        )
        .route(
            "/api/v1/conversations/:id/messages",
            get(messaging::handlers::handle_list_messages)
                .post(messaging::handlers::handle_send_message),
        )
        .route(
            "/api/v1/conversations/:id/read",
            post(messaging::handlers::handle_mark_read),
        )
        // Notifications
        .route(
            "/api/v1/notifications",
            get(notifications::handlers::handle_list),
        )
        .route(
            "/api/v1/notifications/unread-count",
            get(notifications::handlers::handle_unread_count),
        )
        .route(
            "/api/v1/notifications/read-all",
            post(notifications::handlers::handle_mark_all_read),
        )
        .route(
            "/api/v1/notifications/:id/read",
            post(notifications::handlers::handle_mark_read),
        )
        .route(
            "/api/v1/notifications/:id",
            delete(notifications::handlers::handle_delete),
        )
        // Resumes
        .route(
            "/api/v1/resumes",
            post(resume::handlers::handle_upload).get(resume::handlers::handle_list),
        )
        .route(
            "/api/v1/resumes/parse-text",
            post(resume::handlers::handle_parse_text),
        )
        .route(
            "/api/v1/resumes/enhance",
            post(resume::handlers::handle_enhance),
        )
        .route("/api/v1/resumes/match", post(resume::handlers::handle_match))
        .route(
            "/api/v1/resumes/:id",
            get(resume::handlers::handle_get).delete(resume::handlers::handle_delete),
        )
        .route(
            "/api/v1/resumes/:id/parsed",
            put(resume::handlers::handle_update_parsed),
        )
        // Realtime
        .route("/api/v1/events", get(realtime::handlers::handle_events))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::config::Config;
    use crate::llm_client::GeminiClient;
    use crate::realtime::RealtimeHub;
    use crate::resume::cache::MatchCache;
    use crate::resume::extraction::native::NativeStage;
    use crate::resume::extraction::ExtractionPipeline;
    use crate::resume::matching::KeywordMatchScorer;

    const BOUNDARY: &str = "jobnexus-test-boundary";

    /// State whose backing services are never reached by the requests under test.
    fn test_state(config: Config) -> AppState {
        let db = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("test", "test", None, None, "test"))
            .endpoint_url(&config.s3_endpoint)
            .build();
        let redis = redis::Client::open("redis://127.0.0.1:1/").unwrap();

        AppState {
            db,
            s3: aws_sdk_s3::Client::from_conf(s3_config),
            llm: GeminiClient::with_base_url("test-key".into(), "http://127.0.0.1:1".into())
                .unwrap(),
            match_scorer: Arc::new(KeywordMatchScorer),
            match_cache: MatchCache::new(redis, 60),
            extraction: Arc::new(ExtractionPipeline::new(vec![Box::new(NativeStage)])),
            realtime: RealtimeHub::default(),
            config,
        }
    }

    fn app() -> Router {
        build_router(test_state(Config::for_tests()))
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn upload_request(user_id: Uuid, file_name: &str, file: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"user_id\"\r\n\r\n{user_id}\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(file);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/v1/resumes")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "jobnexus-api");
    }

    #[tokio::test]
    async fn test_parse_text_rejects_blank_text() {
        let (status, body) = send(
            app(),
            json_request("POST", "/api/v1/resumes/parse-text", json!({"text": " \n "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_match_requires_a_resume_source() {
        let (status, _) = send(
            app(),
            json_request(
                "POST",
                "/api/v1/resumes/match",
                json!({"job_description": "Rust engineer"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_inline_match_scores_without_storage() {
        let (status, body) = send(
            app(),
            json_request(
                "POST",
                "/api/v1/resumes/match",
                json!({
                    "parsed": {
                        "full_name": "Jane Doe",
                        "skills": ["Rust", "PostgreSQL"],
                        "experience": [{"title": "Backend Engineer", "company": "Acme"}]
                    },
                    "job_description": "Backend engineer with Rust and PostgreSQL"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["scorer_backend"], "keyword");
        let matched: Vec<String> =
            serde_json::from_value(body["matched_skills"].clone()).unwrap();
        assert!(matched.iter().any(|s| s.eq_ignore_ascii_case("rust")));
    }

    #[tokio::test]
    async fn test_unusable_inline_resume_is_unprocessable() {
        let (status, _) = send(
            app(),
            json_request(
                "POST",
                "/api/v1/resumes/match",
                json!({"parsed": {"email": "not-an-email"}, "job_description": "Rust"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_corrections_are_validated_before_storage() {
        let uri = format!("/api/v1/resumes/{}/parsed", Uuid::new_v4());
        let (status, body) = send(
            app(),
            json_request(
                "PUT",
                &uri,
                json!({"user_id": Uuid::new_v4(), "parsed": {"summary": "  "}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "UNPROCESSABLE_ENTITY");
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_file() {
        let (status, _) = send(app(), upload_request(Uuid::new_v4(), "cv.pdf", b"")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_rejects_unknown_type() {
        let (status, body) = send(
            app(),
            upload_request(Uuid::new_v4(), "tool.exe", b"MZ\x90\x00\x03\x00\x00\x00"),
        )
        .await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body["error"]["code"], "UNSUPPORTED_MEDIA_TYPE");
    }

    #[tokio::test]
    async fn test_upload_over_configured_limit() {
        let mut config = Config::for_tests();
        config.max_upload_bytes = 16;
        let router = build_router(test_state(config));
        let (status, _) = send(
            router,
            upload_request(Uuid::new_v4(), "cv.txt", &[b'a'; 64]),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_upload_requires_user_id() {
        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"cv.txt\"\r\n\r\nJane Doe\r\n--{BOUNDARY}--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/resumes")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("user_id"));
    }

    #[tokio::test]
    async fn test_cannot_message_yourself() {
        let me = Uuid::new_v4();
        let (status, _) = send(
            app(),
            json_request(
                "POST",
                "/api/v1/conversations",
                json!({"user_id": me, "other_user_id": me}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_blank_message_rejected() {
        let uri = format!("/api/v1/conversations/{}/messages", Uuid::new_v4());
        let (status, _) = send(
            app(),
            json_request("POST", &uri, json!({"sender_id": Uuid::new_v4(), "body": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_cover_letter_rejected() {
        let (status, _) = send(
            app(),
            json_request(
                "POST",
                "/api/v1/applications",
                json!({
                    "job_id": Uuid::new_v4(),
                    "applicant_id": Uuid::new_v4(),
                    "cover_letter": "x".repeat(10_001)
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
