// src/checker/extract.rs
// =============================================================================
// This module finds URLs in arbitrary text (masterlist YAML, markdown, ...).
//
// A URL here is any "scheme://..." token: a scheme, "://", then everything up
// to whitespace or a closing bracket/quote. Trailing sentence punctuation is
// not part of the URL. Non-HTTP schemes are extracted too; the prober decides
// what to do with them.
//
// Rust concepts:
// - Iterators: extract_urls returns a lazy iterator, not a Vec
// - Lifetimes: each match borrows from the scanned text
// =============================================================================

use regex::Regex;
use std::sync::OnceLock;

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"[A-Za-z][A-Za-z0-9+.\-]*://[^\s<>"'`)\]}]+"#).expect("URL pattern is valid")
    })
}

// Characters that end a sentence rather than a URL
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?'];

/// One URL found in a text, with its byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlMatch<'t> {
    pub url: &'t str,
    pub start: usize,
}

/// Lazy iterator over the URLs of a text, in order of occurrence.
///
/// Cloning it gives an independent iterator from the same position, so a
/// scan can be restarted with `extract_urls(text)` or `.clone()`.
#[derive(Debug, Clone)]
pub struct UrlMatches<'t> {
    text: &'t str,
    pos: usize,
}

impl<'t> Iterator for UrlMatches<'t> {
    type Item = UrlMatch<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let found = url_pattern().find_at(self.text, self.pos)?;
            self.pos = found.end();

            let url = found.as_str().trim_end_matches(TRAILING_PUNCTUATION);
            // "https://." style leftovers have nothing after the scheme
            if url.ends_with("://") {
                continue;
            }
            return Some(UrlMatch {
                url,
                start: found.start(),
            });
        }
    }
}

// Scans `text` for URLs
//
// Example:
//   "see https://a.example/x and http://b.example"
//   -> ["https://a.example/x", "http://b.example"]
//
// Duplicates are reported every time they occur.
pub fn extract_urls(text: &str) -> UrlMatches<'_> {
    UrlMatches { text, pos: 0 }
}
