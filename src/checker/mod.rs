// src/checker/mod.rs
// =============================================================================
// This module contains all link checking logic.
//
// Submodules:
// - extract: Finds scheme://... URLs in any text
// - http: Probes URLs and classifies the answers
//
// This file (mod.rs) is the module root - it ties everything together and
// exports the public API that other parts of our application can use.
// =============================================================================

// Declare submodules (tells Rust to include these files)
mod extract;
mod http;

// Re-export public items from submodules
// This lets users write `checker::LinkChecker` instead of
// `checker::http::LinkChecker`
pub use extract::{extract_urls, UrlMatch, UrlMatches};
pub use http::{LinkCheckResult, LinkChecker, ProbeFailure, ProbeResult};

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why is extraction separate from probing?
//    - Extraction is pure and fast, so it is tested without any network
//    - Probing needs a runtime and a client, so it lives behind LinkChecker
//
// 2. Why does extract_urls return an iterator instead of a Vec?
//    - check_all can start building probe futures while still scanning
//    - Callers that want a Vec just .collect() it
// -----------------------------------------------------------------------------
