//! Generative-text feedback for compiled submissions.
//!
//! The assistant explains what went wrong with a submission and proposes a
//! corrected version. It is an external collaborator: every failure here is
//! turned into placeholder text by [`Feedback::gather`] and never fails the
//! request that asked for it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use minic_pipeline::Verdict;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::AssistantConfig;
use crate::error::{LlmErrorKind, MinicError, Result};

/// Feedback sent when the submission compiled and ran cleanly.
pub const SUCCESS_FEEDBACK: &str = "✅ Code compiled and executed successfully!";

/// Feedback sent when the assistant answered with nothing.
pub const EMPTY_FEEDBACK: &str = "Error detected but no specific feedback available.";

/// Inputs for an analysis request.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a> {
    /// What the compiler reported.
    pub compiler_output: &'a str,
    /// What the program printed, if it ran.
    pub program_output: &'a str,
    /// The submitted source.
    pub source: &'a str,
}

/// A generative-text service that explains and fixes C code.
#[async_trait]
pub trait Assistant: Send + Sync {
    /// Explains the error in a submission.
    async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<String>;

    /// Returns a corrected version of `source`.
    async fn fix_code(&self, source: &str) -> Result<String>;

    /// Whether requests can succeed at all.
    fn is_available(&self) -> bool {
        true
    }
}

/// Builds the analysis prompt.
#[must_use]
pub fn analysis_prompt(request: &AnalysisRequest<'_>) -> String {
    format!(
        "You are an intelligent debugging assistant for a Mini C Compiler.\n\
         The compiler produced this output:\n\
         \n\
         --- Compiler Output ---\n\
         {compiler}\n\
         \n\
         --- Program Output ---\n\
         {program}\n\
         \n\
         --- Source Code ---\n\
         {source}\n\
         \n\
         Please:\n\
         1. Identify the error type (Syntax, Semantic, Runtime, or Success).\n\
         2. Give a clear explanation for a beginner in compiler design.\n\
         3. Suggest how to fix the issue.\n\
         \n\
         Format the output exactly as:\n\
         Error Type: <type>\n\
         Explanation: <explanation>\n\
         Fix Suggestion: <suggestion>\n",
        compiler = request.compiler_output,
        program = request.program_output,
        source = request.source,
    )
}

/// Builds the code-fix prompt.
#[must_use]
pub fn fix_prompt(source: &str) -> String {
    format!("Fix this C code, keep logic same. Return ONLY corrected code:\n\n{source}")
}

/// Removes a Markdown code fence wrapped around model output.
///
/// ```
/// use minic_server::assistant::strip_code_fences;
///
/// assert_eq!(strip_code_fences("```c\nint x;\n```"), "int x;");
/// assert_eq!(strip_code_fences("int x;"), "int x;");
/// ```
#[must_use]
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "c") on the opening line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

// ============================================================================
// Gemini
// ============================================================================

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, all parts joined.
    fn into_text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Assistant backed by the Gemini `generateContent` API.
#[derive(Debug, Clone)]
pub struct GeminiAssistant {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiAssistant {
    /// Creates a client for the configured model.
    pub fn new(config: &AssistantConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                MinicError::llm_api_error(
                    LlmErrorKind::Other,
                    format!("failed to build HTTP client: {e}"),
                )
            })?;
        let endpoint = format!(
            "{}/models/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            config.model
        );

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.into(),
        })
    }

    /// The URL requests are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }]
        });

        debug!(endpoint = %self.endpoint, prompt_len = prompt.len(), "Requesting completion");

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| MinicError::llm_api_error(LlmErrorKind::Network, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MinicError::llm_api_error(
                LlmErrorKind::from_status(status.as_u16()),
                format!("HTTP {status}: {body}"),
            ));
        }

        let payload: GenerateContentResponse = response.json().await.map_err(|e| {
            MinicError::llm_api_error(LlmErrorKind::Other, format!("invalid response body: {e}"))
        })?;
        Ok(payload.into_text())
    }
}

#[async_trait]
impl Assistant for GeminiAssistant {
    async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<String> {
        let text = self.generate(&analysis_prompt(request)).await?;
        Ok(text.trim().to_string())
    }

    async fn fix_code(&self, source: &str) -> Result<String> {
        let text = self.generate(&fix_prompt(source)).await?;
        Ok(strip_code_fences(&text).to_string())
    }
}

// ============================================================================
// Disabled
// ============================================================================

/// Stand-in used when no service is configured; every request fails with
/// [`MinicError::AssistantNotConfigured`].
#[derive(Debug, Clone)]
pub struct DisabledAssistant {
    reason: String,
    api_key_env: String,
}

impl DisabledAssistant {
    /// Creates a disabled assistant with the reason it is disabled.
    #[must_use]
    pub fn new(reason: impl Into<String>, api_key_env: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            api_key_env: api_key_env.into(),
        }
    }

    fn error(&self) -> MinicError {
        MinicError::assistant_not_configured(&self.reason, &self.api_key_env)
    }
}

#[async_trait]
impl Assistant for DisabledAssistant {
    async fn analyze(&self, _request: &AnalysisRequest<'_>) -> Result<String> {
        Err(self.error())
    }

    async fn fix_code(&self, _source: &str) -> Result<String> {
        Err(self.error())
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Builds the assistant described by `config`.
///
/// Falls back to a [`DisabledAssistant`] when the assistant is switched off,
/// the API key variable is unset, or the client cannot be built.
#[must_use]
pub fn from_config(config: &AssistantConfig) -> Arc<dyn Assistant> {
    if !config.enabled {
        info!("Assistant disabled in configuration");
        return Arc::new(DisabledAssistant::new(
            "assistant disabled in configuration",
            &config.api_key_env,
        ));
    }

    let Some(api_key) = config.api_key() else {
        warn!(
            api_key_env = %config.api_key_env,
            "No API key found, assistant feedback unavailable"
        );
        return Arc::new(DisabledAssistant::new(
            format!("{} is not set", config.api_key_env),
            &config.api_key_env,
        ));
    };

    match GeminiAssistant::new(config, api_key) {
        Ok(assistant) => {
            info!(model = %config.model, "Assistant ready");
            Arc::new(assistant)
        }
        Err(e) => {
            warn!(error = %e, "Failed to create assistant client");
            Arc::new(DisabledAssistant::new(e.to_string(), &config.api_key_env))
        }
    }
}

// ============================================================================
// Feedback
// ============================================================================

/// Feedback attached to a compile response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    /// Explanation of the outcome.
    pub llm_feedback: String,
    /// Suggested corrected source (empty when there is none).
    pub corrected_code: String,
}

impl Feedback {
    /// Gathers feedback for a verdict.
    ///
    /// Successful submissions get a fixed message without contacting the
    /// assistant. Otherwise the analysis and the fix are requested
    /// concurrently; failures degrade to placeholder text. A suggested fix
    /// identical to the submission is dropped.
    pub async fn gather(assistant: &dyn Assistant, verdict: &Verdict, source: &str) -> Self {
        if verdict.status().is_success() {
            return Self {
                llm_feedback: SUCCESS_FEEDBACK.to_string(),
                corrected_code: String::new(),
            };
        }

        let request = AnalysisRequest {
            compiler_output: verdict.compiler_message(),
            program_output: verdict.program_output(),
            source,
        };
        let (analysis, fix) = tokio::join!(assistant.analyze(&request), assistant.fix_code(source));

        let llm_feedback = match analysis {
            Ok(text) if text.trim().is_empty() => EMPTY_FEEDBACK.to_string(),
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, transient = e.is_transient(), "Assistant analysis failed");
                format!("LLM analysis unavailable: {e}")
            }
        };

        let corrected_code = match fix {
            Ok(code) if code.trim().is_empty() || code.trim() == source.trim() => String::new(),
            Ok(code) => code,
            Err(e) => {
                warn!(error = %e, transient = e.is_transient(), "Assistant code fix failed");
                String::new()
            }
        };

        Self {
            llm_feedback,
            corrected_code,
        }
    }
}
