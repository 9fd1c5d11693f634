//! End-to-end classification tests against the system C compiler.
//!
//! Every test needs `gcc` on `PATH` and skips itself (with a note on
//! stderr) when it is missing.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use minic_pipeline::{Pipeline, PipelineConfig, Status, TIMEOUT_MESSAGE};
use minic_server::{
    create_router, AppState, DisabledAssistant, NullIndicator, SUCCESS_FEEDBACK,
};
use tokio::net::TcpListener;

const RUN_TIMEOUT: Duration = Duration::from_secs(2);

fn gcc_available() -> bool {
    let found = std::process::Command::new("gcc")
        .arg("--version")
        .output()
        .is_ok_and(|output| output.status.success());
    if !found {
        eprintln!("gcc not found on PATH, skipping");
    }
    found
}

fn program(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures/programs")
        .join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {e}", path.display()))
}

fn pipeline() -> Pipeline {
    Pipeline::new(PipelineConfig {
        run_timeout: RUN_TIMEOUT,
        ..Default::default()
    })
    .expect("default pipeline config is valid")
}

#[tokio::test]
async fn test_minimal_program_succeeds() {
    if !gcc_available() {
        return;
    }

    let verdict = pipeline()
        .compile_and_run(&program("success.c"))
        .await
        .expect("pipeline failed");

    assert_eq!(verdict.status(), Status::Success);
    assert_eq!(verdict.compiler_message(), "Compilation successful");
    assert_eq!(verdict.program_output(), "");
}

#[tokio::test]
async fn test_program_output_is_captured() {
    if !gcc_available() {
        return;
    }

    let verdict = pipeline()
        .compile_and_run(&program("hello.c"))
        .await
        .expect("pipeline failed");

    assert_eq!(verdict.status(), Status::Success);
    assert_eq!(verdict.program_output(), "Hello, Mini C!");
}

#[tokio::test]
async fn test_missing_semicolon_is_syntax() {
    if !gcc_available() {
        return;
    }

    let verdict = pipeline()
        .compile_and_run(&program("syntax.c"))
        .await
        .expect("pipeline failed");

    assert_eq!(verdict.status(), Status::Syntax);
    assert!(
        verdict.compiler_message().contains("error"),
        "compiler message: {}",
        verdict.compiler_message()
    );
    assert_eq!(verdict.program_output(), "");
}

#[tokio::test]
async fn test_abort_is_runtime() {
    if !gcc_available() {
        return;
    }

    let verdict = pipeline()
        .compile_and_run(&program("abort.c"))
        .await
        .expect("pipeline failed");

    assert_eq!(verdict.status(), Status::Runtime);
    assert!(verdict.program_output().contains("about to fail"));
    assert!(
        verdict.program_output().contains("SIGABRT"),
        "program output: {}",
        verdict.program_output()
    );
}

#[tokio::test]
async fn test_format_mismatch_is_semantic() {
    if !gcc_available() {
        return;
    }

    let verdict = pipeline()
        .compile_and_run(&program("format.c"))
        .await
        .expect("pipeline failed");

    assert_eq!(verdict.status(), Status::Semantic);
    assert!(verdict.compiler_message().contains("format"));
}

#[tokio::test]
async fn test_infinite_loop_times_out() {
    if !gcc_available() {
        return;
    }

    let started = Instant::now();
    let verdict = pipeline()
        .compile_and_run(&program("infinite.c"))
        .await
        .expect("pipeline failed");
    let elapsed = started.elapsed();

    assert_eq!(verdict.status(), Status::Runtime);
    assert_eq!(verdict.program_output(), TIMEOUT_MESSAGE);
    assert!(elapsed >= RUN_TIMEOUT, "returned early: {elapsed:?}");
    assert!(
        elapsed < RUN_TIMEOUT + Duration::from_secs(20),
        "returned late: {elapsed:?}"
    );
}

#[tokio::test]
async fn test_concurrent_submissions_are_independent() {
    if !gcc_available() {
        return;
    }

    let pipeline = pipeline();
    let hello = program("hello.c");
    let syntax = program("syntax.c");

    let (a, b) = tokio::join!(
        pipeline.compile_and_run(&hello),
        pipeline.compile_and_run(&syntax)
    );

    assert_eq!(a.expect("pipeline failed").status(), Status::Success);
    assert_eq!(b.expect("pipeline failed").status(), Status::Syntax);
}

#[tokio::test]
async fn test_compile_over_http() {
    if !gcc_available() {
        return;
    }

    let state = AppState::new(
        pipeline(),
        Arc::new(DisabledAssistant::new("offline", "GEMINI_API_KEY")),
        Arc::new(NullIndicator),
    );
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("listener has an address");
    tokio::spawn(async move {
        axum::serve(listener, create_router(state))
            .await
            .expect("test server failed");
    });

    let client = reqwest::Client::new();

    let ok: serde_json::Value = client
        .post(format!("http://{addr}/compile"))
        .json(&serde_json::json!({ "source_code": program("hello.c") }))
        .send()
        .await
        .expect("request failed")
        .json()
        .await
        .expect("body is JSON");
    assert_eq!(ok["status"], "success");
    assert_eq!(ok["program_output"], "Hello, Mini C!");
    assert_eq!(ok["llm_feedback"], SUCCESS_FEEDBACK);

    let broken: serde_json::Value = client
        .post(format!("http://{addr}/compile"))
        .json(&serde_json::json!({ "source_code": program("syntax.c") }))
        .send()
        .await
        .expect("request failed")
        .json()
        .await
        .expect("body is JSON");
    assert_eq!(broken["status"], "syntax");
    assert!(broken["llm_feedback"]
        .as_str()
        .unwrap_or_default()
        .starts_with("LLM analysis unavailable:"));
    assert_eq!(broken["corrected_code"], "");
}
