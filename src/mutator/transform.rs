// src/mutator/transform.rs
// =============================================================================
// Content transforms: pure functions from (old file text, parameter) to new
// file text.
//
// The mutator does not care what a transform does. Bumping the LOOT version
// condition and rewriting a moved URL are both just FileTransforms, and so is
// any closure with the right signature.
// =============================================================================

use regex::{NoExpand, Regex};
use std::sync::OnceLock;

use crate::checker::extract_urls;
use crate::error::TransformError;

/// A pure edit of one file's text.
///
/// Implementations must not have side effects. Returning the content
/// unchanged is allowed; the caller still commits it.
pub trait FileTransform: Send + Sync {
    fn apply(&self, content: &str, parameter: &str) -> Result<String, TransformError>;
}

// Plain functions and closures are transforms that never fail
impl<F> FileTransform for F
where
    F: Fn(&str, &str) -> String + Send + Sync,
{
    fn apply(&self, content: &str, parameter: &str) -> Result<String, TransformError> {
        Ok(self(content, parameter))
    }
}

fn version_condition() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"version\("LOOT", "[\d.]+", <\)"#).expect("version condition pattern is valid")
    })
}

fn dotted_version() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d+(\.\d+)*$").expect("dotted version pattern is valid"))
}

/// Rewrites the `version("LOOT", "x.y.z", <)` condition used by the
/// masterlist's "a new LOOT release is available" message.
///
/// The parameter is the new version. Only the first condition is touched.
#[derive(Debug, Clone, Copy, Default)]
pub struct LootVersionCondition;

impl FileTransform for LootVersionCondition {
    fn apply(&self, content: &str, parameter: &str) -> Result<String, TransformError> {
        if !dotted_version().is_match(parameter) {
            return Err(TransformError::InvalidParameter {
                parameter: parameter.to_string(),
                reason: "expected a dotted numeric version such as 0.15.0".to_string(),
            });
        }

        if !version_condition().is_match(content) {
            tracing::warn!("no LOOT version condition found, content left unchanged");
            return Ok(content.to_string());
        }

        let replacement = format!(r#"version("LOOT", "{}", <)"#, parameter);
        Ok(version_condition()
            .replacen(content, 1, NoExpand(&replacement))
            .into_owned())
    }
}

/// Replaces every occurrence of the URL `from` with the parameter.
///
/// Only whole URLs are replaced: a longer URL that merely starts with `from`
/// (`.../mod2`, `...?page=2`) is left alone.
///
/// Used to point masterlist entries at a link's final location after the
/// link checker reported a redirect.
#[derive(Debug, Clone)]
pub struct UrlRewrite {
    pub from: String,
}

impl UrlRewrite {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

impl FileTransform for UrlRewrite {
    fn apply(&self, content: &str, parameter: &str) -> Result<String, TransformError> {
        if self.from.is_empty() {
            return Err(TransformError::InvalidParameter {
                parameter: parameter.to_string(),
                reason: "URL to replace is empty".to_string(),
            });
        }
        if parameter.chars().any(char::is_whitespace) || parameter.is_empty() {
            return Err(TransformError::InvalidParameter {
                parameter: parameter.to_string(),
                reason: "replacement URL must be a single non-empty token".to_string(),
            });
        }
        let mut from_urls = extract_urls(&self.from);
        match (from_urls.next(), from_urls.next()) {
            (Some(only), None) if only.url == self.from => {}
            _ => {
                return Err(TransformError::InvalidParameter {
                    parameter: self.from.clone(),
                    reason: "URL to replace must be a single scheme://... URL".to_string(),
                })
            }
        }

        let mut rewritten = String::with_capacity(content.len());
        let mut copied = 0;
        for found in extract_urls(content).filter(|m| m.url == self.from) {
            rewritten.push_str(&content[copied..found.start]);
            rewritten.push_str(parameter);
            copied = found.start + found.url.len();
        }
        rewritten.push_str(&content[copied..]);
        Ok(rewritten)
    }
}
