//! Frontend extraction fallback.
//!
//! Runs only when a fetched transcript carries the extraction sentinel:
//! the server found nothing usable, so the client scans the rendered page
//! instead. The page is reached through the `Document` trait so the
//! cascade is testable without a real page behind it.

use tracing::debug;

use crate::resolver::normalize;

/// Read-only view of the rendered page.
pub trait Document {
    /// Visible text of the first element matching `selector`.
    fn select_text(&self, selector: &str) -> Option<String>;
    /// Visible text of the whole page body.
    fn body_text(&self) -> String;
}

/// Known content-container selectors, most theme-specific first, most
/// generic last.
const CONTAINER_SELECTORS: [&str; 9] = [
    ".entry-content",
    ".post-content",
    ".article-content",
    ".td-post-content",
    ".single-content",
    ".page-content",
    "article",
    "main",
    "#content",
];

/// Line-level boilerplate markers: a body-text line containing one of
/// these is navigation or legal chrome, not content.
const BOILERPLATE_MARKERS: [&str; 8] = [
    "skip to content",
    "all rights reserved",
    "copyright ©",
    "privacy policy",
    "cookie policy",
    "terms of service",
    "subscribe to our newsletter",
    "share this:",
];

/// Recover spoken text from the rendered page. Strategy order: an
/// explicitly configured selector, the known container cascade, then the
/// page body with boilerplate lines removed. `None` is terminal: the
/// caller surfaces EmptyContent.
pub fn extract_page_text(
    doc: &dyn Document,
    configured_selector: Option<&str>,
    min_chars: usize,
) -> Option<String> {
    if let Some(selector) = configured_selector {
        if let Some(text) = usable_text(doc.select_text(selector), min_chars) {
            debug!("Extracted text via configured selector {selector}");
            return Some(text);
        }
    }

    for selector in CONTAINER_SELECTORS {
        if let Some(text) = usable_text(doc.select_text(selector), min_chars) {
            debug!("Extracted text via container selector {selector}");
            return Some(text);
        }
    }

    let body = strip_boilerplate(&doc.body_text());
    usable_text(Some(body), min_chars)
}

fn usable_text(candidate: Option<String>, min_chars: usize) -> Option<String> {
    let text = normalize(&candidate?);
    if text.chars().count() >= min_chars {
        Some(text)
    } else {
        None
    }
}

fn strip_boilerplate(body: &str) -> String {
    body.lines()
        .filter(|line| {
            let lowered = line.to_lowercase();
            !BOILERPLATE_MARKERS.iter().any(|m| lowered.contains(m))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
