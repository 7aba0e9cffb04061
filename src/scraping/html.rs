use crate::scraping::ScraperError;
use regex::Regex;
use scraper::{ElementRef, Selector};

pub fn selector(css: &str) -> Result<Selector, ScraperError> {
    Selector::parse(css).map_err(|e| ScraperError::HtmlParse(format!("selector `{css}`: {e}")))
}

pub fn pattern(re: &str) -> Result<Regex, ScraperError> {
    Regex::new(re).map_err(|e| ScraperError::HtmlParse(format!("pattern `{re}`: {e}")))
}

/// Text of an element with every text node trimmed and joined, empty nodes
/// dropped.
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("")
}

/// Trimmed text of the first match, if it has any.
pub fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

/// True when the element only holds text (no child elements).
pub fn is_leaf(element: ElementRef<'_>) -> bool {
    element.children().all(|child| child.value().is_text())
}
