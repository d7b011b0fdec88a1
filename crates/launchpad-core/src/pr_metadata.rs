//! Pull-request metadata extraction.
//!
//! The CI job hands the launcher the PR title, body and URL as free text.
//! Identifiers and release notes are pulled out of that text with the fixed
//! patterns below:
//!
//! - `project_build_id=<digits>` anywhere in the body
//! - `fid=<digits>` anywhere in the body (target folder)
//! - release notes: title text after `release :`, body text before `**Visual diff`

use launchpad_client::RemoteId;
use regex::Regex;
use std::sync::OnceLock;

use crate::error::{LaunchError, Result};

/// Body marker after which everything is generated noise (screenshots etc.)
pub const VISUAL_DIFF_MARKER: &str = "**Visual diff";

fn build_id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bproject_build_id=(\d+)").expect("valid regex"))
}

fn folder_id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bfid=(\d+)").expect("valid regex"))
}

fn release_title_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\brelease\s*:\s*(.*)").expect("valid regex"))
}

fn heading_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*#{1,6}\s*(.*)$").expect("valid regex"))
}

fn api_pr_url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(https?)://api\.([^/]+)/repos/([^/]+)/([^/]+)/pulls/(\d+)(.*)$")
            .expect("valid regex")
    })
}

/// Pull-request context as provided by the CI environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrMetadata {
    pub title: String,
    pub body: String,
    /// API URL of the pull request, as CI reports it
    pub url: String,
    pub author: String,
    pub reviewer: String,
}

impl PrMetadata {
    /// Build id the PR asks to deploy
    pub fn project_build_id(&self) -> Result<RemoteId> {
        capture_id(build_id_pattern(), &self.body, "project_build_id")
    }

    /// Target folder id
    pub fn folder_id(&self) -> Result<RemoteId> {
        capture_id(folder_id_pattern(), &self.body, "fid")
    }

    /// Browser URL of the pull request
    pub fn web_url(&self) -> String {
        normalize_pr_url(&self.url)
    }

    /// Human-readable deployment description, if the PR carries any notes
    pub fn release_description(&self) -> Option<String> {
        let parts: Vec<String> = [
            release_notes_from_title(&self.title),
            release_notes_from_body(&self.body),
        ]
        .into_iter()
        .flatten()
        .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(". "))
        }
    }
}

fn capture_id(pattern: &Regex, text: &str, field: &str) -> Result<RemoteId> {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| RemoteId::new(m.as_str()))
        .ok_or_else(|| LaunchError::MissingPattern {
            field: field.to_string(),
        })
}

/// Text after the `release :` marker in a PR title.
pub fn release_notes_from_title(title: &str) -> Option<String> {
    release_title_pattern()
        .captures(title)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Body text before the visual-diff marker, flattened to one line.
///
/// Headings and blank-line-separated paragraphs become `. `-separated
/// sentences; lines carrying launcher identifiers are dropped.
pub fn release_notes_from_body(body: &str) -> Option<String> {
    let notes = body.split(VISUAL_DIFF_MARKER).next().unwrap_or_default();

    fn flush(paragraph: &mut Vec<&str>, segments: &mut Vec<String>) {
        if !paragraph.is_empty() {
            segments.push(paragraph.join(" "));
            paragraph.clear();
        }
    }

    let mut segments: Vec<String> = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();

    for line in notes.lines() {
        let line = line.trim();
        if line.is_empty() {
            flush(&mut paragraph, &mut segments);
        } else if let Some(heading) = heading_pattern().captures(line).and_then(|c| c.get(1)) {
            flush(&mut paragraph, &mut segments);
            segments.push(heading.as_str().to_string());
        } else if build_id_pattern().is_match(line) || folder_id_pattern().is_match(line) {
            continue;
        } else {
            paragraph.push(line);
        }
    }
    flush(&mut paragraph, &mut segments);

    let sentences: Vec<&str> = segments
        .iter()
        .map(|s| s.trim().trim_end_matches('.').trim_end())
        .filter(|s| !s.is_empty())
        .collect();

    if sentences.is_empty() {
        None
    } else {
        Some(sentences.join(". "))
    }
}

/// Rewrite a pull-request API URL into its browser URL.
///
/// `https://api.github.com/repos/o/r/pulls/5` becomes
/// `https://github.com/o/r/pull/5`. Anything that is not an API pull URL is
/// returned unchanged, so applying this twice equals applying it once.
pub fn normalize_pr_url(url: &str) -> String {
    let url = url.trim();
    match api_pr_url_pattern().captures(url) {
        Some(c) => format!("{}://{}/{}/{}/pull/{}{}", &c[1], &c[2], &c[3], &c[4], &c[5], &c[6]),
        None => url.to_string(),
    }
}
