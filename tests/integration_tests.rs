use async_trait::async_trait;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

use yt_sentiment::backend::{SentimentLabel, Verdict};
use yt_sentiment::pipeline::{BackendIndicator, LoadingStage, BACKEND_UNREACHABLE};
use yt_sentiment::router::{spawn_context, ContextHandler, PageContext};
use yt_sentiment::{
    AnalysisResult, Backend, BackendError, Config, ConfigBuilder, ContextKind, HealthStatus, PopupSession,
    Request, Response, UiState, VideoReference,
};

const WATCH_PAGE: &str = "https://x.test/watch?v=abcdEFGH123";

/// Requests received by the fake backend
#[derive(Clone, Default)]
struct Recorded {
    analyze_bodies: Arc<Mutex<Vec<Value>>>,
}

/// Serve `app` on an ephemeral port and return its base address
async fn spawn_backend(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A fake analysis backend answering `/analyze` with a fixed status and body
async fn fake_backend(health: StatusCode, status: StatusCode, body: Value) -> (String, Recorded) {
    let recorded = Recorded::default();
    let app = Router::new()
        .route("/health", get(move || async move { (health, Json(json!({"status": "ok"}))) }))
        .route(
            "/analyze",
            post(move |State(recorded): State<Recorded>, Json(request): Json<Value>| {
                let body = body.clone();
                async move {
                    recorded.analyze_bodies.lock().await.push(request);
                    (status, Json(body)).into_response()
                }
            }),
        )
        .with_state(recorded.clone());

    (spawn_backend(app).await, recorded)
}

/// A base address nothing listens on
async fn closed_backend() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

fn config_for(base_url: &str) -> Config {
    ConfigBuilder::new()
        .with_backend_url(base_url)
        .with_health_timeout(2)
        .with_analyze_timeout(5)
        .with_router_timeout_ms(1000)
        .build()
}

fn scenario_payload() -> Value {
    json!({
        "title": "Half guard sweeps",
        "totalComments": 100,
        "positiveCount": 60,
        "neutralCount": 30,
        "negativeCount": 10,
        "positivePct": 60.0,
        "neutralPct": 30.0,
        "negativePct": 10.0,
        "sentimentLabel": "positive",
        "averageScore": 0.42,
        "keyInsights": ["sweep", "underhook"],
        "verdict": "yes",
        "verdictReason": "Most viewers found this video helpful and valuable.",
        "topPositiveComments": ["Finally understood the old school sweep"],
        "topNegativeComments": ["Audio is quiet"]
    })
}

async fn open(base_url: &str, address: &str) -> PopupSession {
    PopupSession::open(&config_for(base_url), PageContext::new(address))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_unreachable_backend_ends_in_error() {
    let session = open(&closed_backend().await, WATCH_PAGE).await;
    let controller = session.controller();

    controller.start().await.unwrap();
    let state = controller.wait_for_terminal().await.unwrap();

    assert_eq!(state, UiState::error(BACKEND_UNREACHABLE));
    assert_eq!(controller.indicator(), BackendIndicator::Offline);
    let run = controller.active_run().unwrap();
    assert_eq!(run.video.unwrap().id(), "abcdEFGH123");

    session.close().await;
}

#[tokio::test]
async fn test_unhealthy_status_counts_as_unreachable() {
    let (base_url, recorded) =
        fake_backend(StatusCode::SERVICE_UNAVAILABLE, StatusCode::OK, scenario_payload()).await;
    let session = open(&base_url, WATCH_PAGE).await;

    session.controller().start().await.unwrap();
    let state = session.controller().wait_for_terminal().await.unwrap();

    assert_eq!(state, UiState::error(BACKEND_UNREACHABLE));
    assert!(recorded.analyze_bodies.lock().await.is_empty());
    session.close().await;
}

#[tokio::test]
async fn test_homepage_is_not_applicable() {
    let (base_url, recorded) = fake_backend(StatusCode::OK, StatusCode::OK, scenario_payload()).await;
    let session = open(&base_url, "https://x.test/").await;

    session.controller().start().await.unwrap();
    let state = session.controller().wait_for_terminal().await.unwrap();

    assert_eq!(state, UiState::NotApplicable);
    assert!(recorded.analyze_bodies.lock().await.is_empty());
    session.close().await;
}

#[tokio::test]
async fn test_indicator_check_on_page_without_video() {
    let (base_url, _recorded) = fake_backend(StatusCode::OK, StatusCode::OK, scenario_payload()).await;
    let session = open(&base_url, "https://x.test/").await;
    let controller = session.controller();

    controller.start().await.unwrap();
    assert_eq!(controller.wait_for_terminal().await.unwrap(), UiState::NotApplicable);
    assert_eq!(controller.indicator(), BackendIndicator::Unknown);

    assert_eq!(controller.check_backend().await.unwrap(), BackendIndicator::Online);
    assert_eq!(controller.indicator(), BackendIndicator::Online);
    assert_eq!(controller.state(), UiState::NotApplicable);
    session.close().await;
}

#[tokio::test]
async fn test_indicator_check_against_closed_backend() {
    let session = open(&closed_backend().await, "https://x.test/").await;

    assert_eq!(session.controller().check_backend().await.unwrap(), BackendIndicator::Offline);
    assert_eq!(session.controller().state(), UiState::Idle);
    session.close().await;
}

#[tokio::test]
async fn test_successful_analysis_surfaces_fields_unchanged() {
    let (base_url, recorded) = fake_backend(StatusCode::OK, StatusCode::OK, scenario_payload()).await;
    let session = open(&base_url, WATCH_PAGE).await;

    session.controller().start().await.unwrap();
    let state = session.controller().wait_for_terminal().await.unwrap();

    let UiState::Results { result } = state else {
        panic!("expected results, got {:?}", state);
    };
    assert_eq!(result.title, "Half guard sweeps");
    assert_eq!(result.total_comments, 100);
    assert_eq!(result.positive_count, 60);
    assert_eq!(result.neutral_count, 30);
    assert_eq!(result.negative_count, 10);
    assert_eq!(result.sentiment_label, SentimentLabel::Positive);
    assert_eq!(result.average_score, 0.42);
    assert_eq!(result.verdict, Verdict::Yes);
    assert_eq!(result.key_insights, vec!["sweep", "underhook"]);
    assert_eq!(
        result.positive_count + result.neutral_count + result.negative_count,
        result.total_comments
    );

    let bodies = recorded.analyze_bodies.lock().await;
    assert_eq!(bodies.as_slice(), &[json!({"videoId": "abcdEFGH123"})]);
    assert_eq!(session.controller().indicator(), BackendIndicator::Online);

    drop(bodies);
    session.close().await;
}

#[tokio::test]
async fn test_backend_error_message_is_shown() {
    let (base_url, _recorded) = fake_backend(
        StatusCode::OK,
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({"error": "model unavailable"}),
    )
    .await;
    let session = open(&base_url, WATCH_PAGE).await;

    session.controller().start().await.unwrap();
    let state = session.controller().wait_for_terminal().await.unwrap();

    assert_eq!(state, UiState::error("model unavailable"));
    session.close().await;
}

#[tokio::test]
async fn test_error_without_message_falls_back_to_status() {
    let (base_url, _recorded) = fake_backend(StatusCode::OK, StatusCode::BAD_GATEWAY, json!({})).await;
    let session = open(&base_url, WATCH_PAGE).await;

    session.controller().start().await.unwrap();
    let state = session.controller().wait_for_terminal().await.unwrap();

    assert_eq!(state, UiState::error("Server error 502"));
    session.close().await;
}

#[tokio::test]
async fn test_incomplete_payload_is_an_error() {
    let (base_url, _recorded) =
        fake_backend(StatusCode::OK, StatusCode::OK, json!({"totalComments": 3})).await;
    let session = open(&base_url, WATCH_PAGE).await;

    session.controller().start().await.unwrap();
    let state = session.controller().wait_for_terminal().await.unwrap();

    match state {
        UiState::Error { message } => assert!(message.contains("missing fields"), "{}", message),
        other => panic!("expected error, got {:?}", other),
    }
    session.close().await;
}

#[tokio::test]
async fn test_server_message_on_success_status_is_shown() {
    let (base_url, _recorded) =
        fake_backend(StatusCode::OK, StatusCode::OK, json!({"error": "quota exceeded"})).await;
    let session = open(&base_url, WATCH_PAGE).await;

    session.controller().start().await.unwrap();
    let state = session.controller().wait_for_terminal().await.unwrap();

    assert_eq!(state, UiState::error("quota exceeded"));
    session.close().await;
}

#[tokio::test]
async fn test_retry_reuses_video_and_is_idempotent() {
    let (base_url, recorded) = fake_backend(
        StatusCode::OK,
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({"error": "model unavailable"}),
    )
    .await;
    let session = open(&base_url, WATCH_PAGE).await;
    let controller = session.controller();

    controller.start().await.unwrap();
    let first = controller.wait_for_terminal().await.unwrap();

    // Leaving the video page must not affect a retry
    session.page().navigate("https://x.test/").await;

    let mut terminal_states = vec![first];
    for _ in 0..2 {
        assert!(controller.retry().await.unwrap().is_some());
        terminal_states.push(controller.wait_for_terminal().await.unwrap());
    }

    assert!(terminal_states.iter().all(|state| *state == UiState::error("model unavailable")));
    let bodies = recorded.analyze_bodies.lock().await;
    assert_eq!(bodies.len(), 3);
    assert!(bodies.iter().all(|body| body["videoId"] == "abcdEFGH123"));

    drop(bodies);
    session.close().await;
}

#[tokio::test]
async fn test_reanalyze_after_results() {
    let (base_url, recorded) = fake_backend(StatusCode::OK, StatusCode::OK, scenario_payload()).await;
    let session = open(&base_url, WATCH_PAGE).await;
    let controller = session.controller();

    controller.start().await.unwrap();
    let first = controller.wait_for_terminal().await.unwrap();

    // Retry is only for errors
    assert_eq!(controller.retry().await.unwrap(), None);

    assert!(controller.reanalyze().await.unwrap().is_some());
    let second = controller.wait_for_terminal().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(recorded.analyze_bodies.lock().await.len(), 2);
    session.close().await;
}

#[tokio::test]
async fn test_missing_page_context_is_not_applicable() {
    let (base_url, _recorded) = fake_backend(StatusCode::OK, StatusCode::OK, scenario_payload()).await;
    let session = open(&base_url, WATCH_PAGE).await;
    session.router().unregister(ContextKind::Page).await;

    session.controller().start().await.unwrap();
    let state = session.controller().wait_for_terminal().await.unwrap();

    assert_eq!(state, UiState::NotApplicable);
    session.close().await;
}

/// Page that never answers
struct SilentPage;

#[async_trait]
impl ContextHandler for SilentPage {
    async fn handle(&self, _request: Request) -> Option<Response> {
        std::future::pending::<()>().await;
        None
    }
}

#[tokio::test]
async fn test_page_context_timeout_is_not_applicable() {
    let (base_url, recorded) = fake_backend(StatusCode::OK, StatusCode::OK, scenario_payload()).await;
    let config = ConfigBuilder::new()
        .with_backend_url(&base_url)
        .with_router_timeout_ms(100)
        .build();
    let session = PopupSession::open(&config, PageContext::new(WATCH_PAGE)).await.unwrap();
    let silent = spawn_context(ContextKind::Page, SilentPage, 4);
    session.router().register(ContextKind::Page, &silent).await;

    session.controller().start().await.unwrap();
    let state = session.controller().wait_for_terminal().await.unwrap();

    assert_eq!(state, UiState::NotApplicable);
    assert!(recorded.analyze_bodies.lock().await.is_empty());
    silent.shutdown().await;
    session.close().await;
}

#[tokio::test]
async fn test_background_ping() {
    let session = open(&closed_backend().await, WATCH_PAGE).await;
    assert!(session.controller().ping_background().await);

    session.router().unregister(ContextKind::Background).await;
    assert!(!session.controller().ping_background().await);
    session.close().await;
}

#[test]
fn test_page_context_answers_video_request() {
    tokio_test::block_on(async {
        let page = PageContext::new("https://www.youtube.com/shorts/abcdEFGH123");
        let response = page.handle(Request::GetVideoId).await;
        assert_eq!(response, Some(Response::video_id(Some("abcdEFGH123".to_string()))));
    });
}

/// Backend whose first analysis blocks until released; later ones fail fast
struct GatedBackend {
    gate: Notify,
    analyze_calls: AtomicUsize,
}

fn gated_result() -> AnalysisResult {
    AnalysisResult {
        title: "Superseded".to_string(),
        total_comments: 1,
        sentiment_label: SentimentLabel::Neutral,
        average_score: 0.0,
        positive_pct: 0.0,
        neutral_pct: 100.0,
        negative_pct: 0.0,
        positive_count: 0,
        neutral_count: 1,
        negative_count: 0,
        key_insights: vec![],
        verdict: Verdict::Maybe,
        verdict_reason: String::new(),
        top_positive_comments: vec![],
        top_negative_comments: vec![],
    }
}

#[async_trait]
impl Backend for GatedBackend {
    async fn probe_health(&self) -> HealthStatus {
        HealthStatus::Reachable
    }

    async fn analyze(&self, _video: &VideoReference) -> Result<AnalysisResult, BackendError> {
        if self.analyze_calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.gate.notified().await;
            Ok(gated_result())
        } else {
            Err(BackendError::Status {
                status: 500,
                message: "second run failed".to_string(),
            })
        }
    }
}

#[tokio::test]
async fn test_late_response_of_superseded_run_is_ignored() {
    let backend = Arc::new(GatedBackend {
        gate: Notify::new(),
        analyze_calls: AtomicUsize::new(0),
    });
    let session = PopupSession::with_backend(
        &config_for("http://127.0.0.1:9"),
        PageContext::new(WATCH_PAGE),
        backend.clone(),
    )
    .await;
    let controller = session.controller();

    // Run A parks in the analyze step
    let run_a = controller.start().await.unwrap();
    let mut states = controller.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        states.wait_for(|state| *state == UiState::loading(LoadingStage::Analyzing)),
    )
    .await
    .unwrap()
    .unwrap();

    // Run B supersedes it and settles first
    let run_b = controller.start().await.unwrap();
    assert!(run_b > run_a);
    let state_b = controller.wait_for_terminal().await.unwrap();
    assert_eq!(state_b, UiState::error("second run failed"));

    // Release A and wait until its outcome has been seen and dropped
    backend.gate.notify_one();
    tokio::time::timeout(Duration::from_secs(5), async {
        while controller.discarded_outcomes() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(controller.state(), state_b);
    assert_eq!(controller.active_run().unwrap().id, run_b);
    session.close().await;
}
