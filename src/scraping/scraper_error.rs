use std::error::Error;
use std::fmt;

/// Failure of a single fetch unit (one results page or one detail page).
/// Callers inside the collector/enricher recover from every variant except
/// `Pool`, which means the worker threads could not be started at all.
#[derive(Debug, Clone, PartialEq)]
pub enum ScraperError {
    Browser(String),
    Navigation(String),
    Timeout(String),
    HtmlParse(String),
    UnexpectedShape(String),
    Pool(String),
}

impl fmt::Display for ScraperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScraperError::Browser(msg) => write!(f, "Browser session error: {msg}"),
            ScraperError::Navigation(msg) => write!(f, "Navigation failed: {msg}"),
            ScraperError::Timeout(msg) => write!(f, "Timed out: {msg}"),
            ScraperError::HtmlParse(msg) => write!(f, "HTML parse error: {msg}"),
            ScraperError::UnexpectedShape(msg) => write!(f, "Unexpected markup: {msg}"),
            ScraperError::Pool(msg) => write!(f, "Worker pool error: {msg}"),
        }
    }
}

impl Error for ScraperError {}
