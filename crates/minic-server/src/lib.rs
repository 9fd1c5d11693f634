//! Mini C Backend
//!
//! HTTP surface over the compile pipeline, plus the two optional
//! collaborators: the feedback assistant and the indicator board.

pub mod api;
pub mod assistant;
pub mod config;
pub mod error;
pub mod indicator;

pub use api::{
    create_router, AppState, CompileResponse, FixResponse, IndicatorStatus, SourceRequest,
    EMPTY_SOURCE_FEEDBACK, SERVER_ERROR_FEEDBACK,
};
pub use assistant::{
    AnalysisRequest, Assistant, DisabledAssistant, Feedback, GeminiAssistant, EMPTY_FEEDBACK,
    SUCCESS_FEEDBACK,
};
pub use config::{AssistantConfig, CompilerConfig, Config, IndicatorConfig, LlmProvider};
pub use error::{LlmErrorKind, MinicError, Result};
pub use indicator::{
    connect, connect_or_null, Indicator, IndicatorLink, IndicatorSignal, NullIndicator,
    SerialIndicator,
};
