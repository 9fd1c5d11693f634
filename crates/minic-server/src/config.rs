//! Configuration types for the Mini C backend.
//!
//! Configuration is read from `minic.json` (camelCase keys). Every field has
//! a default, so a missing file or a partial file is fine. API keys are never
//! stored in the file; only the name of the environment variable that holds
//! the key is.

use std::path::{Path, PathBuf};
use std::time::Duration;

use minic_pipeline::{Pipeline, PipelineConfig, DEFAULT_WARNING_PATTERNS};
use serde::{Deserialize, Serialize};

use crate::error::{MinicError, Result};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "minic.json";

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    5000
}

fn default_compiler_program() -> String {
    "gcc".to_string()
}

fn default_compiler_flags() -> Vec<String> {
    vec!["-Wall".to_string(), "-Wformat".to_string()]
}

/// Default upper bound on a single build, in seconds.
const fn default_build_timeout() -> u64 {
    30
}

/// Default upper bound on a single program run, in seconds.
const fn default_run_timeout() -> u64 {
    5
}

const fn default_max_output_bytes() -> usize {
    minic_pipeline::DEFAULT_OUTPUT_LIMIT
}

fn default_warning_patterns() -> Vec<String> {
    DEFAULT_WARNING_PATTERNS
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

const fn default_assistant_timeout() -> u64 {
    60
}

/// Serial ports tried for the indicator board, in order.
fn default_candidates() -> Vec<String> {
    ["/dev/ttyUSB1", "/dev/ttyACM0", "COM3", "COM4", "COM5"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

const fn default_baud_rate() -> u32 {
    9600
}

/// The board resets when the port opens; writes before it is ready are lost.
const fn default_settle_millis() -> u64 {
    2000
}

const fn default_true() -> bool {
    true
}

/// Main configuration for the Mini C backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Address the HTTP server binds to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the HTTP server listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Toolchain and classification settings.
    #[serde(default)]
    pub compiler: CompilerConfig,

    /// Generative-text service settings.
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Indicator board settings.
    #[serde(default)]
    pub indicator: IndicatorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            compiler: CompilerConfig::default(),
            assistant: AssistantConfig::default(),
            indicator: IndicatorConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `minic.json` in the current directory. If not found,
    /// returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is invalid.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            MinicError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `minic.json` in a specific directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `MinicError::ConfigParseError` if the file cannot be read or
    /// contains invalid JSON, and `MinicError::ConfigValidationError` if
    /// the values are out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(MinicError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| MinicError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `MinicError::ConfigValidationError` if any check fails.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(MinicError::config_validation(
                "port must be greater than 0",
                "Set port to a free TCP port in your minic.json (default 5000)",
            ));
        }

        if self.compiler.program.trim().is_empty() {
            return Err(MinicError::config_validation(
                "compiler.program must not be empty",
                "Set compiler.program to a C compiler on PATH, e.g. \"gcc\" or \"cc\"",
            ));
        }

        if self.compiler.build_timeout_secs == 0 {
            return Err(MinicError::config_validation(
                "compiler.buildTimeoutSecs must be greater than 0",
                "Set compiler.buildTimeoutSecs to at least 1 second in your minic.json",
            ));
        }

        if self.compiler.run_timeout_secs == 0 {
            return Err(MinicError::config_validation(
                "compiler.runTimeoutSecs must be greater than 0",
                "Set compiler.runTimeoutSecs to at least 1 second in your minic.json",
            ));
        }

        if self.compiler.max_output_bytes == 0 {
            return Err(MinicError::config_validation(
                "compiler.maxOutputBytes must be greater than 0",
                "Set compiler.maxOutputBytes to the bytes kept per output stream (default 65536)",
            ));
        }

        if self.compiler.warning_patterns.is_empty()
            || self
                .compiler
                .warning_patterns
                .iter()
                .any(|p| p.trim().is_empty())
        {
            return Err(MinicError::config_validation(
                "compiler.warningPatterns must be a non-empty list of non-blank strings",
                "Remove blank entries from compiler.warningPatterns, or delete the key to use the defaults",
            ));
        }

        if self.assistant.model.trim().is_empty() {
            return Err(MinicError::config_validation(
                "assistant.model must not be empty",
                "Set assistant.model to a model name, e.g. \"gemini-2.0-flash\"",
            ));
        }

        if self.assistant.timeout_secs == 0 {
            return Err(MinicError::config_validation(
                "assistant.timeoutSecs must be greater than 0",
                "Set assistant.timeoutSecs to at least 1 second in your minic.json",
            ));
        }

        if self.indicator.baud_rate == 0 {
            return Err(MinicError::config_validation(
                "indicator.baudRate must be greater than 0",
                "Set indicator.baudRate to the board's serial speed (default 9600)",
            ));
        }

        Ok(())
    }

    /// Settings for the compile-and-classify pipeline.
    #[must_use]
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            compiler: self.compiler.program.clone(),
            compiler_flags: self.compiler.flags.clone(),
            build_timeout: Duration::from_secs(self.compiler.build_timeout_secs),
            run_timeout: Duration::from_secs(self.compiler.run_timeout_secs),
            warning_patterns: self.compiler.warning_patterns.clone(),
            output_limit: self.compiler.max_output_bytes,
            work_dir: self.compiler.work_dir.clone(),
        }
    }

    /// Builds the pipeline described by the `compiler` section.
    ///
    /// # Errors
    ///
    /// Returns `MinicError::Pipeline` if the warning patterns cannot be compiled.
    pub fn build_pipeline(&self) -> Result<Pipeline> {
        Ok(Pipeline::new(self.pipeline_config())?)
    }
}

/// Toolchain and classification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerConfig {
    /// Compiler program, resolved through `PATH`.
    #[serde(default = "default_compiler_program")]
    pub program: String,

    /// Flags passed before the source file.
    #[serde(default = "default_compiler_flags")]
    pub flags: Vec<String>,

    /// Upper bound on a single build, in seconds.
    #[serde(default = "default_build_timeout")]
    pub build_timeout_secs: u64,

    /// Upper bound on a single program run, in seconds.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,

    /// Literal, case-insensitive substrings that mark a diagnostic as semantic.
    #[serde(default = "default_warning_patterns")]
    pub warning_patterns: Vec<String>,

    /// Bytes kept from each of the program's output streams.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    /// Parent directory for per-request workspaces (system temp dir if unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            program: default_compiler_program(),
            flags: default_compiler_flags(),
            build_timeout_secs: default_build_timeout(),
            run_timeout_secs: default_run_timeout(),
            warning_patterns: default_warning_patterns(),
            max_output_bytes: default_max_output_bytes(),
            work_dir: None,
        }
    }
}

/// Supported generative-text providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LlmProvider {
    /// Google Gemini (default).
    #[default]
    Gemini,
}

impl LlmProvider {
    /// Parses a string into an `LlmProvider`, case-insensitively.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gemini" => Some(Self::Gemini),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for LlmProvider {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid LLM provider '{s}': expected 'gemini'"
            ))
        })
    }
}

impl Serialize for LlmProvider {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Gemini => serializer.serialize_str("gemini"),
        }
    }
}

/// Generative-text service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantConfig {
    /// Whether feedback is requested at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Which service to talk to.
    #[serde(default)]
    pub provider: LlmProvider,

    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// API base URL (without the `/models/...` suffix).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_assistant_timeout")]
    pub timeout_secs: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            provider: LlmProvider::default(),
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_assistant_timeout(),
        }
    }
}

impl AssistantConfig {
    /// Reads the API key from the configured environment variable.
    ///
    /// Returns `None` when the variable is unset or blank.
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

/// Indicator board settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorConfig {
    /// Whether to look for the board at startup.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Serial ports to try, in order.
    #[serde(default = "default_candidates")]
    pub candidates: Vec<String>,

    /// Serial line speed.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Delay after opening the port before the board accepts writes.
    #[serde(default = "default_settle_millis")]
    pub settle_millis: u64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            candidates: default_candidates(),
            baud_rate: default_baud_rate(),
            settle_millis: default_settle_millis(),
        }
    }
}
