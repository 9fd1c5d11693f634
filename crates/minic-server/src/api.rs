//! HTTP API for the Mini C backend.
//!
//! # Endpoints
//!
//! - `GET /` - Liveness banner
//! - `POST /compile` - Compile, run and classify a submission
//! - `POST /fix` - Ask the assistant for a corrected version of a submission
//! - `GET /arduino/status` - Indicator board connection state
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use minic_pipeline::{Pipeline, PipelineConfig};
//! use minic_server::{create_router, AppState, DisabledAssistant, NullIndicator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let state = AppState::new(
//!     Pipeline::new(PipelineConfig::default())?,
//!     Arc::new(DisabledAssistant::new("offline", "GEMINI_API_KEY")),
//!     Arc::new(NullIndicator),
//! );
//!
//! let router = create_router(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//! axum::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use minic_pipeline::{Pipeline, Status, Verdict};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::assistant::{AnalysisRequest, Assistant, Feedback};
use crate::error::MinicError;
use crate::indicator::{Indicator, IndicatorLink, IndicatorSignal};

/// Feedback sent with an empty submission.
pub const EMPTY_SOURCE_FEEDBACK: &str = "Please provide valid C code to compile.";

/// Feedback sent when a local fault aborted the pipeline.
pub const SERVER_ERROR_FEEDBACK: &str = "An unexpected server error occurred. Please try again.";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for `POST /compile` and `POST /fix`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceRequest {
    /// The C source. A missing field counts as empty.
    #[serde(default)]
    pub source_code: String,
}

/// Response body for `POST /compile`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileResponse {
    /// Compiler diagnostics or a fixed message.
    pub compiler_output: String,
    /// What the program printed.
    pub program_output: String,
    /// Outcome classification.
    pub status: Status,
    /// Explanation from the assistant (or a fixed message).
    pub llm_feedback: String,
    /// Suggested corrected source; empty when there is none.
    pub corrected_code: String,
}

impl CompileResponse {
    fn from_verdict(verdict: &Verdict, feedback: Feedback) -> Self {
        Self {
            compiler_output: verdict.compiler_message().to_string(),
            program_output: verdict.program_output().to_string(),
            status: verdict.status(),
            llm_feedback: feedback.llm_feedback,
            corrected_code: feedback.corrected_code,
        }
    }

    fn error(compiler_output: impl Into<String>, llm_feedback: impl Into<String>) -> Self {
        Self {
            compiler_output: compiler_output.into(),
            program_output: String::new(),
            status: Status::Error,
            llm_feedback: llm_feedback.into(),
            corrected_code: String::new(),
        }
    }
}

/// Response body for `POST /fix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixResponse {
    /// Suggested corrected source.
    pub corrected_code: String,
    /// What the assistant found.
    pub explanation: String,
}

/// Response body for `GET /arduino/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorStatus {
    /// Whether a board is attached.
    pub connected: bool,
    /// The board's serial port, if attached.
    pub port: Option<String>,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
///
/// The collaborators are injected so that a missing assistant or board is
/// a null object rather than a flag checked in every handler.
#[derive(Clone)]
pub struct AppState {
    /// The compile-and-classify pipeline.
    pub pipeline: Pipeline,
    /// Feedback collaborator.
    pub assistant: Arc<dyn Assistant>,
    /// Indicator collaborator, behind its delivery worker.
    pub indicator: IndicatorLink,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("pipeline", &self.pipeline)
            .field("assistant_available", &self.assistant.is_available())
            .field("indicator", &self.indicator.address())
            .finish()
    }
}

impl AppState {
    /// Creates the state from its parts and starts the indicator worker.
    ///
    /// Must be called within a Tokio runtime.
    #[must_use]
    pub fn new(
        pipeline: Pipeline,
        assistant: Arc<dyn Assistant>,
        indicator: Arc<dyn Indicator>,
    ) -> Self {
        Self {
            pipeline,
            assistant,
            indicator: IndicatorLink::spawn(indicator),
        }
    }

    fn signal(&self, signal: IndicatorSignal) {
        self.indicator.send(signal);
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all endpoints, CORS and request tracing.
pub fn create_router(state: AppState) -> Router {
    // The frontend is served from a different origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_banner))
        .route("/compile", post(handle_compile))
        .route("/fix", post(handle_fix))
        .route("/arduino/status", get(handle_indicator_status))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `GET /`.
async fn handle_banner(State(state): State<Arc<AppState>>) -> String {
    let mode = if state.indicator.is_connected() {
        "Connected"
    } else {
        "Simulation Mode"
    };
    format!("Mini C Compiler Backend Running ✅ | Arduino: {mode}")
}

/// Handler for `POST /compile`.
///
/// Classification outcomes are 200 responses; only a local pipeline fault
/// yields a 500. Every path sends one indicator signal.
async fn handle_compile(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SourceRequest>,
) -> (StatusCode, Json<CompileResponse>) {
    let source = request.source_code.trim();

    if source.is_empty() {
        info!("Rejected empty submission");
        state.signal(IndicatorSignal::Off);
        let verdict = Verdict::empty_input();
        return (
            StatusCode::OK,
            Json(CompileResponse::error(
                verdict.compiler_message(),
                EMPTY_SOURCE_FEEDBACK,
            )),
        );
    }

    let verdict = match state.pipeline.compile_and_run(source).await {
        Ok(verdict) => verdict,
        Err(e) => {
            let err = MinicError::from(e);
            error!(error = %err, transient = err.is_transient(), "Pipeline failed");
            state.signal(IndicatorSignal::Off);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CompileResponse::error(
                    format!("Server error: {err}"),
                    SERVER_ERROR_FEEDBACK,
                )),
            );
        }
    };

    state.signal(verdict.status().into());
    let feedback = Feedback::gather(state.assistant.as_ref(), &verdict, source).await;

    info!(
        status = %verdict.status(),
        has_fix = !feedback.corrected_code.is_empty(),
        "Compile request handled"
    );

    (
        StatusCode::OK,
        Json(CompileResponse::from_verdict(&verdict, feedback)),
    )
}

/// Handler for `POST /fix`.
///
/// Requests a corrected version and an explanation concurrently. Unlike
/// `/compile`, assistant failures are reported as a 500.
async fn handle_fix(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SourceRequest>,
) -> (StatusCode, Json<FixResponse>) {
    let source = request.source_code.trim();

    if source.is_empty() {
        return (
            StatusCode::OK,
            Json(FixResponse {
                corrected_code: String::new(),
                explanation: "No source code provided".to_string(),
            }),
        );
    }

    let analysis = AnalysisRequest {
        compiler_output: "",
        program_output: "",
        source,
    };
    let (fix, explanation) = tokio::join!(
        state.assistant.fix_code(source),
        state.assistant.analyze(&analysis)
    );

    match fix.and_then(|fix| explanation.map(|explanation| (fix, explanation))) {
        Ok((corrected_code, explanation)) => {
            let explanation = if explanation.trim().is_empty() {
                "No issues detected".to_string()
            } else {
                explanation
            };
            info!(has_fix = !corrected_code.is_empty(), "Fix request handled");
            (
                StatusCode::OK,
                Json(FixResponse {
                    corrected_code,
                    explanation,
                }),
            )
        }
        Err(e) => {
            warn!(error = %e, transient = e.is_transient(), "Fix request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(FixResponse {
                    corrected_code: String::new(),
                    explanation: format!("Error: {e}"),
                }),
            )
        }
    }
}

/// Handler for `GET /arduino/status`.
async fn handle_indicator_status(State(state): State<Arc<AppState>>) -> Json<IndicatorStatus> {
    let port = state.indicator.address();
    Json(IndicatorStatus {
        connected: port.is_some(),
        port,
    })
}
