use std::net::SocketAddr;

use axum::Router;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::state::AppState;
use crate::{feedback, health, meals, summaries};

pub fn build_app(state: AppState) -> Router {
    let request_timeout = state.config.request_timeout;
    Router::new()
        .merge(health::router())
        .merge(meals::router())
        .merge(summaries::router())
        .merge(feedback::router())
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::OllamaConfig;
    use crate::feedback::OllamaCoach;
    use crate::state::test_support::TestState;

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    fn post_log(owner: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/foodlogs")
            .header("content-type", "application/json")
            .header("x-owner-id", owner)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(owner: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("x-owner-id", owner)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn root_and_health_answer() {
        let t = TestState::new();
        let app = build_app(t.state.clone());

        let (status, body) = send(&app, Request::get("/").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].is_string());

        let (status, body) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["store"]["status"], "healthy");
    }

    #[tokio::test]
    async fn health_is_503_when_store_is_down() {
        let t = TestState::new();
        t.store.set_failing(true);
        let app = build_app(t.state.clone());
        let (status, body) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unreachable");
    }

    #[tokio::test]
    async fn missing_owner_is_401() {
        let t = TestState::new();
        let app = build_app(t.state.clone());
        let req = Request::get("/summaries/daily?date=2024-03-10").body(Body::empty()).unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["kind"], "missing_owner");
    }

    #[tokio::test]
    async fn banana_logged_in_new_york_lands_in_its_local_day() {
        let t = TestState::new();
        let app = build_app(t.state.clone());

        let (status, created) = send(
            &app,
            post_log("alice", json!({
                "food_name": "banana",
                "quantity": 1,
                "timestamp": "2024-03-10T09:00:00-05:00"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["logged_at"], "2024-03-10T14:00:00Z");
        assert_eq!(created["nutrition_source"], "fdc");

        let (status, summary) = send(
            &app,
            get("alice", "/summaries/daily?date=2024-03-10&tz=America/New_York"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["count"], 1);
        assert_eq!(summary["totals"]["calories"], 89.0);
        assert_eq!(summary["window"]["start"], "2024-03-10T05:00:00Z");
        assert_eq!(summary["window"]["end"], "2024-03-11T04:00:00Z");
        assert_eq!(summary["top_foods"][0]["food_name"], "banana");

        let (_, other) = send(
            &app,
            get("bob", "/summaries/daily?date=2024-03-10&tz=America/New_York"),
        )
        .await;
        assert_eq!(other["count"], 0);
    }

    #[tokio::test]
    async fn created_entry_is_listed_for_its_day() {
        let t = TestState::new();
        let app = build_app(t.state.clone());
        send(
            &app,
            post_log("alice", json!({
                "food": "oatmeal",
                "portion": 2,
                "timestamp": "2024-05-01T08:00:00Z",
                "nutrition": { "calories": 150, "protein_g": 5, "fat_g": 3, "carbs_g": 27 }
            })),
        )
        .await;

        let (status, list) = send(&app, get("alice", "/foodlogs?date=2024-05-01")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["items"].as_array().map(Vec::len), Some(1));
        assert_eq!(list["items"][0]["food_name"], "oatmeal");
        assert_eq!(list["items"][0]["nutrition_source"], "manual");
        assert_eq!(t.lookup.calls(), 0);

        let (_, list) = send(&app, get("alice", "/foodlogs?date=2024-05-02")).await;
        assert_eq!(list["items"].as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn negative_calories_are_rejected_without_a_write() {
        let t = TestState::new();
        let app = build_app(t.state.clone());
        let (status, body) = send(
            &app,
            post_log("alice", json!({
                "food_name": "toast",
                "quantity": 1,
                "nutrition": { "calories": -5, "protein_g": 0, "fat_g": 0, "carbs_g": 0 }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "validation_error");
        assert_eq!(t.store.len(), 0);
    }

    #[tokio::test]
    async fn mistyped_body_uses_the_error_envelope() {
        let t = TestState::new();
        let app = build_app(t.state.clone());
        let (status, body) = send(
            &app,
            post_log("alice", json!({ "food_name": "banana", "quantity": "two" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "validation_error");
        assert!(body["error"]["message"].as_str().unwrap().contains("quantity"));
        assert_eq!(t.store.len(), 0);
        assert_eq!(t.lookup.calls(), 0);
    }

    #[tokio::test]
    async fn missing_query_parameter_uses_the_error_envelope() {
        let t = TestState::new();
        let app = build_app(t.state.clone());
        for uri in ["/summaries/daily?tz=UTC", "/feedback/weekly", "/summaries/monthly?year=2024"] {
            let (status, body) = send(&app, get("alice", uri)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["error"]["kind"], "validation_error", "{uri}");
        }
        let (status, body) = send(&app, get("alice", "/foodlogs?limit=lots")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "validation_error");
    }

    #[tokio::test]
    async fn empty_week_summarizes_to_zero() {
        let t = TestState::new();
        let app = build_app(t.state.clone());
        let (status, body) = send(&app, get("alice", "/summaries/weekly?start_date=2024-03-27")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);
        assert_eq!(body["totals"]["calories"], 0.0);
        assert!(body["averages"].is_null());
        assert_eq!(body["start_date"], "2024-03-25");
    }

    #[tokio::test]
    async fn bad_period_parameters_are_400() {
        let t = TestState::new();
        let app = build_app(t.state.clone());
        let (status, _) = send(&app, get("alice", "/summaries/monthly?year=2024&month=13")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, get("alice", "/summaries/yearly?year=1850")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) =
            send(&app, get("alice", "/summaries/daily?date=2024-03-10&tz=Mars/Base")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "validation_error");
    }

    #[tokio::test]
    async fn feedback_is_attached_to_the_summary() {
        let t = TestState::new();
        let app = build_app(t.state.clone());
        let (status, body) = send(&app, get("alice", "/feedback/daily?date=2024-03-10")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["feedback"], "Keep it up.");
        assert_eq!(body["feedback_status"], "ok");
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn feedback_timeout_still_returns_the_summary() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;
        let coach = OllamaCoach::new(&OllamaConfig {
            base_url: server.uri(),
            model: "mistral:latest".into(),
            timeout: Duration::from_millis(100),
        })
        .unwrap();
        let t = TestState::new().with_coach(Arc::new(coach));
        let app = build_app(t.state.clone());

        send(
            &app,
            post_log("alice", json!({
                "food_name": "banana",
                "quantity": 1,
                "timestamp": "2024-03-06T12:00:00Z"
            })),
        )
        .await;

        let (status, body) = send(&app, get("alice", "/feedback/weekly?date=2024-03-06")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["feedback"], "unavailable");
        assert_eq!(body["feedback_status"], "unavailable");
        assert_eq!(body["count"], 1);
    }
}
