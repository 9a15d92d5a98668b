// src/error.rs
// =============================================================================
// Error types shared by the GitHub client, the content mutator and transforms.
//
// Layers:
// - StoreError: what the remote object store said (404, 422, network, ...)
// - MutationError: what went wrong from the point of view of one operation
//   on one repository (branch missing, file missing, ref taken, ...)
// - TransactionError: a MutationError plus how far an update_file got
//
// The binary glue (main.rs) turns all of these into anyhow errors or
// report lines, so every variant carries the repository and target name.
// =============================================================================

use thiserror::Error;

use crate::mutator::TxnState;

/// Failures reported by an ObjectStore implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed object (repository, ref, tree, blob) does not exist.
    #[error("{what} not found")]
    NotFound { what: String },

    /// The object to be created already exists (e.g. a ref name collision).
    #[error("{what} already exists")]
    AlreadyExists { what: String },

    /// The store understood the request but refused it.
    #[error("rejected with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Network-level failure: DNS, connection, TLS, timeout.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response did not have the expected shape.
    #[error("malformed response: {detail}")]
    Malformed { detail: String },
}

/// Failures of a single ContentMutator operation.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error("could not look up repository {repository}: {source}")]
    Lookup {
        repository: String,
        #[source]
        source: StoreError,
    },

    #[error("branch \"{branch}\" not found in {repository}")]
    BranchNotFound { repository: String, branch: String },

    #[error("{path} not found in tree of commit {commit} in {repository}")]
    FileNotFound {
        repository: String,
        path: String,
        commit: String,
    },

    /// The path is absent, but the store only listed part of the tree.
    #[error("{path} not found in the truncated tree listing of commit {commit} in {repository}")]
    TruncatedTree {
        repository: String,
        path: String,
        commit: String,
    },

    #[error("branch \"{branch}\" already exists in {repository}")]
    AlreadyExists { repository: String, branch: String },

    #[error("{operation} rejected by {repository}: {message}")]
    RemoteRejected {
        repository: String,
        operation: &'static str,
        message: String,
    },

    #[error("{operation} failed for {repository}: {source}")]
    Transport {
        repository: String,
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("blob {blob} in {repository} is not text: {reason}")]
    Undecodable {
        repository: String,
        blob: String,
        reason: String,
    },

    #[error("transform of {path} failed: {source}")]
    Transform {
        path: String,
        #[source]
        source: TransformError,
    },
}

/// An update_file transaction that stopped before advancing the branch.
///
/// `reached` is the last state the transaction completed; the step after it
/// is the one that failed.
#[derive(Debug, Error)]
#[error("updating {path} in {repository} failed after {reached}: {source}")]
pub struct TransactionError {
    pub repository: String,
    pub path: String,
    pub reached: TxnState,
    #[source]
    pub source: MutationError,
}

/// A transform refused to produce new content.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("invalid parameter \"{parameter}\": {reason}")]
    InvalidParameter { parameter: String, reason: String },
}
