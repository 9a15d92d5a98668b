// src/github/mod.rs
// =============================================================================
// This module is the remote side of the tool: the object store the mutator
// works against.
//
// Submodules:
// - types: repository handle, object hashes, trees and blobs
// - client: the ObjectStore trait and its GitHub REST implementation
// - memory: an in-memory ObjectStore for tests
// =============================================================================

mod client;
#[cfg(test)]
pub mod memory;
mod types;

pub use client::{GithubClient, ObjectStore};
pub use types::{
    BlobContent, BlobHash, CommitHash, NewTreeEntry, RepositoryHandle, RepositoryMetadata, Tree,
    TreeHash,
};
