//! Free-text normalization and screening applied before anything is persisted.
//!
//! The SQL checks are a heuristic layered on top of parameterized queries, never a
//! replacement for them.

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::Config;
use crate::error::FieldError;

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
    static ref HTML_TAG: Regex = Regex::new(r"(?s)<!--.*?-->|</?[A-Za-z!/][^>]*>").unwrap();
    static ref SQL_PATTERNS: Vec<Regex> = [
        r"(?i)\b(SELECT|INSERT|UPDATE|DELETE|DROP|CREATE|ALTER|EXEC|EXECUTE)\b.*\b(FROM|INTO|WHERE|TABLE)\b",
        r"(?i)(--|;)\s*(SELECT|INSERT|UPDATE|DELETE|DROP)",
        r"(?i)\bOR\b\s+\d+\s*=\s*\d+",
        r"(?i)\bAND\b\s+\d+\s*=\s*\d+",
        r"(?i)'\s*(OR|AND)\s+'",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect();
}

/// Characters that are never accepted in free text.
pub const DISALLOWED_CHARS: [char; 6] = ['<', '>', '{', '}', '[', ']'];

/// Sanitizer settings, normally taken from [`Config`].
#[derive(Debug, Clone)]
pub struct Sanitizer {
    strip_html: bool,
    check_sql: bool,
    forbidden_words: Vec<String>,
}

impl Sanitizer {
    pub fn new(strip_html: bool, check_sql: bool, forbidden_words: Vec<String>) -> Self {
        Self {
            strip_html,
            check_sql,
            forbidden_words: forbidden_words
                .into_iter()
                .map(|w| w.trim().to_string())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.enable_html_sanitization,
            config.enable_sql_sanitization,
            config.forbidden_words.clone(),
        )
    }

    /// Trims, collapses whitespace runs to one space and, when enabled, strips markup.
    pub fn sanitize(&self, text: &str) -> String {
        let normalized = normalize_whitespace(text);
        if self.strip_html {
            normalize_whitespace(&strip_html(&normalized))
        } else {
            normalized
        }
    }

    pub fn looks_like_injection(&self, text: &str) -> bool {
        if !self.check_sql {
            return false;
        }
        let hit = SQL_PATTERNS.iter().any(|pattern| pattern.is_match(text));
        if hit {
            log::warn!(
                "Potential SQL injection detected: {}",
                text.chars().take(100).collect::<String>()
            );
        }
        hit
    }

    /// Configured words found in `text`, compared case-insensitively as substrings.
    pub fn contains_forbidden_word(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let found: Vec<String> = self
            .forbidden_words
            .iter()
            .filter(|word| lowered.contains(&word.to_lowercase()))
            .cloned()
            .collect();
        if !found.is_empty() {
            log::warn!("Forbidden words found: {:?}", found);
        }
        found
    }

    /// Runs the full field policy and returns the sanitized value.
    ///
    /// `label` is the human name used in messages ("Title", "Description", "Name").
    /// Whitespace normalization alone never causes a rejection; only markup removal does.
    pub fn clean_field(&self, field: &str, label: &str, text: &str) -> Result<String, FieldError> {
        let normalized = normalize_whitespace(text);
        let sanitized = self.sanitize(text);

        if sanitized.is_empty() {
            return Err(FieldError::new(
                field,
                format!("{} cannot be empty after sanitization", label),
            ));
        }
        if self.strip_html && sanitized != normalized {
            log::warn!(
                "HTML content rejected in {}: {:?}",
                field,
                normalized.chars().take(50).collect::<String>()
            );
            return Err(FieldError::new(
                field,
                format!("{} contains forbidden HTML tags or special characters", label),
            ));
        }
        if sanitized.contains(&DISALLOWED_CHARS[..]) {
            return Err(FieldError::new(
                field,
                format!("{} contains forbidden special characters", label),
            ));
        }
        if self.looks_like_injection(&sanitized) {
            return Err(FieldError::new(
                field,
                format!("{} contains invalid characters or patterns", label),
            ));
        }
        let forbidden = self.contains_forbidden_word(&sanitized);
        if !forbidden.is_empty() {
            return Err(FieldError::new(
                field,
                format!("{} contains forbidden words: {}", label, forbidden.join(", ")),
            ));
        }

        Ok(sanitized)
    }
}

fn normalize_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text.trim(), " ").into_owned()
}

fn strip_html(text: &str) -> String {
    HTML_TAG.replace_all(text, "").into_owned()
}
