// src/mutator/transaction.rs
// =============================================================================
// The read-modify-write transaction behind ContentMutator::update_file.
//
// The store has no "edit a file" call, so one edit is nine dependent remote
// steps. Each completed step moves the transaction to the next TxnState:
//
//   Start -> BranchResolved -> TreeFetched -> BlobLocated -> ContentFetched
//         -> Transformed -> BlobCreated -> TreeCreated -> CommitCreated
//         -> RefAdvanced
//
// Any failing step stops the transaction and reports the last state reached.
// Only the final step touches a ref, so a failure leaves at most some
// unreferenced blob/tree/commit objects behind for the store to collect.
//
// Every step after the first uses the parent commit captured at the start.
// If someone else moves the branch in between, the final ref update is sent
// as a non-forced update and the store decides; nothing here retries.
// =============================================================================

use std::fmt;

use super::transform::FileTransform;
use super::ContentMutator;
use crate::error::{MutationError, TransactionError};
use crate::github::{CommitHash, NewTreeEntry, ObjectStore};

/// Progress of one update_file transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Start,
    BranchResolved,
    TreeFetched,
    BlobLocated,
    ContentFetched,
    Transformed,
    BlobCreated,
    TreeCreated,
    CommitCreated,
    RefAdvanced,
}

impl fmt::Display for TxnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TxnState::Start => "start",
            TxnState::BranchResolved => "branch resolved",
            TxnState::TreeFetched => "tree fetched",
            TxnState::BlobLocated => "blob located",
            TxnState::ContentFetched => "content fetched",
            TxnState::Transformed => "transformed",
            TxnState::BlobCreated => "blob created",
            TxnState::TreeCreated => "tree created",
            TxnState::CommitCreated => "commit created",
            TxnState::RefAdvanced => "ref advanced",
        };
        f.write_str(name)
    }
}

pub(super) struct UpdateFile<'m, 'a, S: ?Sized> {
    mutator: &'m ContentMutator<'a, S>,
    path: &'m str,
    state: TxnState,
}

impl<'m, 'a, S: ObjectStore + ?Sized> UpdateFile<'m, 'a, S> {
    pub(super) fn new(mutator: &'m ContentMutator<'a, S>, path: &'m str) -> Self {
        Self {
            mutator,
            path,
            state: TxnState::Start,
        }
    }

    fn advance(&mut self, next: TxnState) {
        tracing::debug!(
            repo = %self.mutator.repository(),
            path = self.path,
            from = %self.state,
            to = %next,
            "update step"
        );
        self.state = next;
    }

    fn fail(&self, source: MutationError) -> TransactionError {
        TransactionError {
            repository: self.mutator.repository().to_string(),
            path: self.path.to_string(),
            reached: self.state,
            source,
        }
    }

    pub(super) async fn run(
        mut self,
        message: &str,
        transform: &dyn FileTransform,
        parameter: &str,
    ) -> Result<CommitHash, TransactionError> {
        let mutator = self.mutator;

        let branch = mutator.default_branch().await.map_err(|e| self.fail(e))?;
        let parent = mutator.branch_head(&branch).await.map_err(|e| self.fail(e))?;
        self.advance(TxnState::BranchResolved);

        let tree = mutator.fetch_tree(&parent).await.map_err(|e| self.fail(e))?;
        self.advance(TxnState::TreeFetched);

        let blob = mutator
            .locate_blob(&tree, self.path, &parent)
            .map_err(|e| self.fail(e))?;
        self.advance(TxnState::BlobLocated);

        let content = mutator.blob_text(&blob).await.map_err(|e| self.fail(e))?;
        self.advance(TxnState::ContentFetched);

        let new_content = transform.apply(&content, parameter).map_err(|source| {
            self.fail(MutationError::Transform {
                path: self.path.to_string(),
                source,
            })
        })?;
        if new_content == content {
            tracing::warn!(repo = %mutator.repository(), path = self.path, "transform left content unchanged");
        }
        self.advance(TxnState::Transformed);

        let new_blob = mutator.create_blob(&new_content).await.map_err(|e| self.fail(e))?;
        self.advance(TxnState::BlobCreated);

        let overlay = [NewTreeEntry::file(self.path, new_blob)];
        let new_tree = mutator
            .create_tree(&tree.hash, &overlay)
            .await
            .map_err(|e| self.fail(e))?;
        self.advance(TxnState::TreeCreated);

        let commit = mutator
            .create_commit(message, &new_tree, &parent)
            .await
            .map_err(|e| self.fail(e))?;
        self.advance(TxnState::CommitCreated);

        mutator
            .advance_branch(&branch, &commit)
            .await
            .map_err(|e| self.fail(e))?;
        self.advance(TxnState::RefAdvanced);

        tracing::info!(
            repo = %mutator.repository(),
            path = self.path,
            branch = %branch,
            %commit,
            "file updated"
        );
        Ok(commit)
    }
}
