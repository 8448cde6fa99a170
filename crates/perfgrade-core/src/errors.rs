use std::path::PathBuf;
use thiserror::Error;

/// Fieldless classification of a [`BenchError`], used for exit-code mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchErrorKind {
    Configuration,
    SpecResolution,
    BaseUrlResolution,
    ReportFormat,
    ThresholdViolation,
    PluginLoad,
    Hook,
    Executor,
    Io,
}

impl BenchErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::SpecResolution => "spec_resolution",
            Self::BaseUrlResolution => "base_url_resolution",
            Self::ReportFormat => "report_format",
            Self::ThresholdViolation => "threshold_violation",
            Self::PluginLoad => "plugin_load",
            Self::Hook => "hook",
            Self::Executor => "executor",
            Self::Io => "io",
        }
    }
}

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("config error: {0}")]
    Configuration(String),

    #[error("spec resolution failed: {0}")]
    SpecResolution(String),

    #[error("base URL resolution failed: {0}")]
    BaseUrlResolution(String),

    #[error("report format error: {message}{}", line.map(|l| format!(" (line {l})")).unwrap_or_default())]
    ReportFormat { message: String, line: Option<usize> },

    #[error("threshold violation at {endpoint}: {message}")]
    ThresholdViolation { endpoint: String, message: String },

    #[error("failed to load plugin {}: {message}", path.display())]
    PluginLoad { path: PathBuf, message: String },

    #[error("{hook} hook failed: {message}")]
    Hook { hook: &'static str, message: String },

    #[error("load test for {endpoint} failed: {message}")]
    Executor { endpoint: String, message: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BenchError {
    pub fn config(detail: impl Into<String>) -> Self {
        Self::Configuration(detail.into())
    }

    pub fn report_format(message: impl Into<String>) -> Self {
        Self::ReportFormat {
            message: message.into(),
            line: None,
        }
    }

    pub fn report_format_at(message: impl Into<String>, line: usize) -> Self {
        Self::ReportFormat {
            message: message.into(),
            line: Some(line),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> BenchErrorKind {
        match self {
            Self::Configuration(_) => BenchErrorKind::Configuration,
            Self::SpecResolution(_) => BenchErrorKind::SpecResolution,
            Self::BaseUrlResolution(_) => BenchErrorKind::BaseUrlResolution,
            Self::ReportFormat { .. } => BenchErrorKind::ReportFormat,
            Self::ThresholdViolation { .. } => BenchErrorKind::ThresholdViolation,
            Self::PluginLoad { .. } => BenchErrorKind::PluginLoad,
            Self::Hook { .. } => BenchErrorKind::Hook,
            Self::Executor { .. } => BenchErrorKind::Executor,
            Self::Io { .. } => BenchErrorKind::Io,
        }
    }

    /// Only plugin discovery failures are recoverable; everything else aborts the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::PluginLoad { .. })
    }
}

pub type Result<T, E = BenchError> = std::result::Result<T, E>;
