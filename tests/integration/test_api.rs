//! HTTP integration tests for the Mini C backend.
//!
//! These tests start the real router on an ephemeral port and talk to it
//! with `reqwest`. None of them need a C compiler: the assistant is a
//! canned stand-in and the compiler is either missing on purpose or never
//! reached.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use minic_pipeline::{Pipeline, PipelineConfig};
use minic_server::{
    create_router, AnalysisRequest, AppState, Assistant, Config, DisabledAssistant, Indicator,
    LlmErrorKind, MinicError, NullIndicator, Result, EMPTY_SOURCE_FEEDBACK, SERVER_ERROR_FEEDBACK,
};
use tokio::net::TcpListener;

/// Assistant that answers every request with fixed text.
struct CannedAssistant {
    analysis: &'static str,
    fix: Option<&'static str>,
}

#[async_trait]
impl Assistant for CannedAssistant {
    async fn analyze(&self, _request: &AnalysisRequest<'_>) -> Result<String> {
        Ok(self.analysis.to_string())
    }

    async fn fix_code(&self, _source: &str) -> Result<String> {
        self.fix
            .map(ToString::to_string)
            .ok_or_else(|| MinicError::llm_api_error(LlmErrorKind::RateLimit, "quota exhausted"))
    }
}

/// Path to the fixtures directory.
fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

/// Starts a server and returns its base URL.
async fn spawn_server(assistant: Arc<dyn Assistant>, indicator: Arc<dyn Indicator>) -> String {
    let pipeline = Pipeline::new(PipelineConfig {
        compiler: "/nonexistent/minic-integration-cc".to_string(),
        ..Default::default()
    })
    .expect("pipeline config is valid");

    let router = create_router(AppState::new(pipeline, assistant, indicator));
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("listener has an address");

    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("test server failed");
    });

    format!("http://{addr}")
}

async fn default_server() -> String {
    spawn_server(
        Arc::new(CannedAssistant {
            analysis: "Error Type: Syntax",
            fix: Some("int main(){return 0;}"),
        }),
        Arc::new(NullIndicator),
    )
    .await
}

/// Tests that the bundled sample config loads and validates.
#[test]
fn test_sample_config_loads() {
    let config = Config::load_from_file(&fixture_path().join("minic.json"))
        .expect("Failed to load config");

    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.port, 5055);
    assert_eq!(config.compiler.run_timeout_secs, 2);
    assert_eq!(config.compiler.build_timeout_secs, 30);
    assert!(!config.assistant.enabled);
    assert!(!config.indicator.enabled);

    let pipeline = config.pipeline_config();
    assert_eq!(pipeline.compiler_flags, vec!["-Wall", "-Wformat"]);
}

#[tokio::test]
async fn test_banner_in_simulation_mode() {
    let base = default_server().await;

    let body = reqwest::get(format!("{base}/"))
        .await
        .expect("request failed")
        .text()
        .await
        .expect("body is text");

    assert_eq!(
        body,
        "Mini C Compiler Backend Running ✅ | Arduino: Simulation Mode"
    );
}

#[tokio::test]
async fn test_indicator_status_when_disconnected() {
    let base = default_server().await;

    let json: serde_json::Value = reqwest::get(format!("{base}/arduino/status"))
        .await
        .expect("request failed")
        .json()
        .await
        .expect("body is JSON");

    assert_eq!(json, serde_json::json!({ "connected": false, "port": null }));
}

#[tokio::test]
async fn test_compile_empty_source() {
    let base = default_server().await;

    let response = reqwest::Client::new()
        .post(format!("{base}/compile"))
        .json(&serde_json::json!({ "source_code": "   " }))
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let json: serde_json::Value = response.json().await.expect("body is JSON");
    assert_eq!(json["status"], "error");
    assert_eq!(json["compiler_output"], "Error: Empty source code");
    assert_eq!(json["llm_feedback"], EMPTY_SOURCE_FEEDBACK);
    assert_eq!(json["program_output"], "");
    assert_eq!(json["corrected_code"], "");
}

#[tokio::test]
async fn test_compile_local_fault_is_server_error() {
    let base = default_server().await;

    let response = reqwest::Client::new()
        .post(format!("{base}/compile"))
        .json(&serde_json::json!({ "source_code": "int main(){return 0;}" }))
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let json: serde_json::Value = response.json().await.expect("body is JSON");
    assert_eq!(json["status"], "error");
    assert!(json["compiler_output"]
        .as_str()
        .unwrap_or_default()
        .starts_with("Server error: "));
    assert_eq!(json["llm_feedback"], SERVER_ERROR_FEEDBACK);
}

#[tokio::test]
async fn test_compile_malformed_body_is_rejected() {
    let base = default_server().await;

    let response = reqwest::Client::new()
        .post(format!("{base}/compile"))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .expect("request failed");

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_fix_round_trip() {
    let base = default_server().await;

    let json: serde_json::Value = reqwest::Client::new()
        .post(format!("{base}/fix"))
        .json(&serde_json::json!({ "source_code": "int main(){return 0}" }))
        .send()
        .await
        .expect("request failed")
        .json()
        .await
        .expect("body is JSON");

    assert_eq!(json["corrected_code"], "int main(){return 0;}");
    assert_eq!(json["explanation"], "Error Type: Syntax");
}

#[tokio::test]
async fn test_fix_collaborator_failure() {
    let base = spawn_server(
        Arc::new(CannedAssistant {
            analysis: "unused",
            fix: None,
        }),
        Arc::new(NullIndicator),
    )
    .await;

    let response = reqwest::Client::new()
        .post(format!("{base}/fix"))
        .json(&serde_json::json!({ "source_code": "int x" }))
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let json: serde_json::Value = response.json().await.expect("body is JSON");
    assert!(json["explanation"]
        .as_str()
        .unwrap_or_default()
        .contains("quota exhausted"));
}

#[tokio::test]
async fn test_fix_without_configured_assistant() {
    let base = spawn_server(
        Arc::new(DisabledAssistant::new("GEMINI_API_KEY is not set", "GEMINI_API_KEY")),
        Arc::new(NullIndicator),
    )
    .await;

    let response = reqwest::Client::new()
        .post(format!("{base}/fix"))
        .json(&serde_json::json!({ "source_code": "int main(){}" }))
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let json: serde_json::Value = response.json().await.expect("body is JSON");
    assert!(json["explanation"]
        .as_str()
        .unwrap_or_default()
        .contains("GEMINI_API_KEY"));
}
