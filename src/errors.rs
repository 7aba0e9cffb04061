// errors.rs
use crate::config::ConfigError;
use crate::scraping::ScraperError;
use crate::telemetry::TelemetryError;
use std::fmt;

/// Failures that escape every per-page and per-listing guard. The
/// orchestrator turns each one into a single failed outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    InvalidRequest(String),
    Scraper(ScraperError),
    Panicked(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::InvalidRequest(msg) => write!(f, "Invalid request: {msg}"),
            PipelineError::Scraper(err) => write!(f, "{err}"),
            PipelineError::Panicked(msg) => write!(f, "Unexpected failure: {msg}"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Scraper(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ScraperError> for PipelineError {
    fn from(err: ScraperError) -> Self {
        PipelineError::Scraper(err)
    }
}

/// Errors surfaced by the command line binary.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Pipeline(PipelineError),
    Export(String),
    Io(std::io::Error),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "Configuration error: {err}"),
            AppError::Telemetry(err) => write!(f, "Logging setup failed: {err}"),
            AppError::Pipeline(err) => write!(f, "{err}"),
            AppError::Export(msg) => write!(f, "Export failed: {msg}"),
            AppError::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Pipeline(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Export(_) => None,
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<TelemetryError> for AppError {
    fn from(err: TelemetryError) -> Self {
        AppError::Telemetry(err)
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::Pipeline(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err)
    }
}
