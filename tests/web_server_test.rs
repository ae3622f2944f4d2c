use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use intake::constants::{GREETING, MAX_TOKENS, PLACEHOLDER_PROMPT, VOICE_INPUT_UNSUPPORTED};
use intake::web_server::{build_router, AppState};
use intake::{GatewayConfig, SessionController, SpeechCapabilities};
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn controller(base_url: String) -> SessionController {
    let config = GatewayConfig {
        base_url,
        model: "test-model".to_string(),
        api_key: "sk-test".to_string(),
        max_tokens: MAX_TOKENS,
    };
    SessionController::new(config, SpeechCapabilities::none())
}

fn test_server(controller: SessionController) -> (TestServer, tempfile::TempDir) {
    let static_dir = tempfile::tempdir().unwrap();
    std::fs::write(static_dir.path().join("app.js"), "// app").unwrap();
    let app = build_router(AppState::new(controller, None), static_dir.path().to_path_buf());
    (TestServer::new(app).unwrap(), static_dir)
}

/// Starts a session whose opening question is `opening`.
async fn session_opening_with(server: &MockServer, opening: &str) -> SessionController {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains(GREETING))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": opening } }]
        })))
        .mount(server)
        .await;
    let controller = controller(server.uri());
    controller.start().await;
    controller
}

#[tokio::test]
async fn index_shows_placeholder_before_handshake() {
    let (server, _static_dir) = test_server(controller("http://127.0.0.1:1".to_string()));
    let response = server.get("/").await;
    response.assert_status_ok();
    let html = response.text();
    assert!(html.contains("I&#x27;m ready to help") || html.contains(PLACEHOLDER_PROMPT));
    assert!(html.contains("chat-input"));
}

#[tokio::test]
async fn session_endpoint_returns_view_json() {
    let (server, _static_dir) = test_server(controller("http://127.0.0.1:1".to_string()));
    let view: Value = server.get("/api/session").await.json();
    assert_eq!(view["mode"], "free_text");
    assert_eq!(view["prompt"], PLACEHOLDER_PROMPT);
    assert_eq!(view["pending"], false);
    assert_eq!(view["severity_options"].as_array().unwrap().len(), 5);
    assert_eq!(view["feeling_options"].as_array().unwrap().len(), 8);
}

#[tokio::test]
async fn scale_question_renders_severity_grid_without_text_box() {
    let mock = MockServer::start().await;
    let controller = session_opening_with(&mock, "On a scale of 1 to 5, how severe is the pain right now? 📉").await;
    let (server, _static_dir) = test_server(controller);

    let html = server.get("/").await.text();
    assert!(html.contains("Severity Level (1-5)"));
    assert!(html.contains("rated 1/5 (Mild)"));
    assert!(html.contains("rated 5/5 (Severe)"));
    assert!(!html.contains("chat-input"));
}

#[tokio::test]
async fn feeling_question_renders_chips_and_text_box() {
    let mock = MockServer::start().await;
    let controller = session_opening_with(&mock, "In one word, how does this make you feel? 💭").await;
    let (server, _static_dir) = test_server(controller);

    let html = server.get("/").await.text();
    assert!(html.contains("Overwhelmed 🤯"));
    assert!(html.contains("Hopeful 🙂"));
    assert!(html.contains("chat-input"));
}

#[tokio::test]
async fn summary_renders_care_plan_card() {
    let mock = MockServer::start().await;
    let summary = "All set!\n```json\n{\"domain\": \"NDIS\", \"problem\": \"Plan review\", \"duration\": \"1 year\", \"notes\": \"Needs home modifications\", \"recommended_specialist\": {\"name\": \"Mark Thompson\", \"role\": \"Occupational Therapist\", \"image\": \"https://images.unsplash.com/photo-1612349317150-e413f6a5b16d\"}}\n```";
    let controller = session_opening_with(&mock, summary).await;
    let (server, _static_dir) = test_server(controller);

    let html = server.get("/").await.text();
    assert!(html.contains("Care Plan"));
    assert!(html.contains("Mark Thompson"));
    assert!(html.contains("Occupational Therapist"));
    assert!(html.contains("Needs home modifications"));
    let (card, _transcript) = html.split_once("class=\"transcript\"").unwrap();
    assert!(!card.contains("<dt>Severity</dt>"));
}

#[tokio::test]
async fn summary_turn_in_transcript_shows_patient_summary() {
    let mock = MockServer::start().await;
    let summary = "Here is your plan.\n```json\n{\"domain\": \"Physical\", \"complaint\": \"Knee pain\", \"severity\": \"3/5\", \"duration\": \"2 weeks\", \"impact\": \"Cannot climb stairs\"}\n```";
    let controller = session_opening_with(&mock, summary).await;
    let (server, _static_dir) = test_server(controller);

    let html = server.get("/").await.text();
    assert!(html.contains("Patient Summary"));
    assert!(html.contains("Knee pain"));
    assert!(html.contains("Cannot climb stairs"));
    assert!(!html.contains("```json"));
}

#[tokio::test]
async fn malformed_summary_renders_as_text() {
    let mock = MockServer::start().await;
    let controller = session_opening_with(&mock, "```json {domain: Physical} ```").await;
    let (server, _static_dir) = test_server(controller);

    let html = server.get("/").await.text();
    assert!(html.contains("{domain: Physical}"));
    assert!(!html.contains("Care Plan"));
}

#[tokio::test]
async fn posted_answer_is_processed_in_background() {
    let mock = MockServer::start().await;
    let controller = session_opening_with(&mock, "What brings you here today?").await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Knee pain"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "How long have you felt this way?" } }]
        })))
        .mount(&mock)
        .await;
    let (server, _static_dir) = test_server(controller);

    let response = server.post("/send").form(&[("text", "Knee pain")]).await;
    response.assert_status(StatusCode::SEE_OTHER);

    let mut view: Value = server.get("/api/session").await.json();
    for _ in 0..100 {
        if view["turns"].as_array().unwrap().len() == 3 && view["pending"] == false {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        view = server.get("/api/session").await.json();
    }
    assert_eq!(view["turns"].as_array().unwrap().len(), 3);
    assert_eq!(view["turns"][1]["sender"], "user");
    assert_eq!(view["mode"], "free_text");
}

#[tokio::test]
async fn voice_without_capability_shows_notice() {
    let (server, _static_dir) = test_server(controller("http://127.0.0.1:1".to_string()));
    server.post("/voice/listen").await.assert_status(StatusCode::SEE_OTHER);

    let html = server.get("/").await.text();
    assert!(html.contains(VOICE_INPUT_UNSUPPORTED));

    server.post("/dismiss").await.assert_status(StatusCode::SEE_OTHER);
    assert!(!server.get("/").await.text().contains(VOICE_INPUT_UNSUPPORTED));
}

#[tokio::test]
async fn static_files_are_served_and_missing_ones_404() {
    let (server, _static_dir) = test_server(controller("http://127.0.0.1:1".to_string()));
    server.get("/static/app.js").await.assert_status_ok();
    server.get("/static/missing.css").await.assert_status(StatusCode::NOT_FOUND);
}

#[test_log::test(tokio::test)]
async fn templates_dir_overrides_built_in_page() {
    let templates = tempfile::tempdir().unwrap();
    std::fs::write(
        templates.path().join("index.html"),
        "<p id=\"custom\">{{ view.prompt }} / {{ view.mode }}</p>",
    )
    .unwrap();

    let controller = controller("http://127.0.0.1:1".to_string());
    let app = build_router(
        AppState::new(controller, Some(templates.path().to_path_buf())),
        templates.path().to_path_buf(),
    );
    let server = TestServer::new(app).unwrap();

    let html = server.get("/").await.text();
    assert!(html.starts_with("<p id=\"custom\">"));
    assert!(html.contains("free_text"));
}
