// src/mutator/mod.rs
// =============================================================================
// This module changes repository state through the remote object store.
//
// Operations (all scoped to one repository):
// - default_branch / set_default_branch
// - branch_head
// - create_branch / create_branch_from_default
// - fetch_file: read one file at the default branch head
// - update_file: read-modify-write of one file as a new commit
//
// Submodules:
// - transaction: the step-by-step update_file state machine
// - transform: pure content edits that update_file applies
//
// Every remote call goes through a small wrapper here that turns the store's
// StoreError into a MutationError naming the repository and the operation.
// =============================================================================

mod transaction;
mod transform;

pub use transaction::TxnState;
pub use transform::{FileTransform, LootVersionCondition, UrlRewrite};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{MutationError, StoreError, TransactionError};
use crate::github::{
    BlobContent, BlobHash, CommitHash, NewTreeEntry, ObjectStore, RepositoryHandle,
    RepositoryMetadata, Tree, TreeHash,
};
use transaction::UpdateFile;

/// One file as it exists at a branch head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    pub branch: String,
    pub commit: CommitHash,
    pub content: String,
}

/// Performs branch and file operations against one repository.
pub struct ContentMutator<'a, S: ?Sized> {
    store: &'a S,
    repo: &'a RepositoryHandle,
}

impl<'a, S: ObjectStore + ?Sized> ContentMutator<'a, S> {
    pub fn new(store: &'a S, repo: &'a RepositoryHandle) -> Self {
        Self { store, repo }
    }

    pub fn repository(&self) -> &RepositoryHandle {
        self.repo
    }

    // Generic StoreError -> MutationError mapping
    //
    // Callers that can say something more specific (missing branch, taken
    // branch name) match those cases before falling back to this.
    fn store_error(&self, operation: &'static str, err: StoreError) -> MutationError {
        let repository = self.repo.to_string();
        match err {
            StoreError::Rejected { status, message } => MutationError::RemoteRejected {
                repository,
                operation,
                message: format!("HTTP {}: {}", status, message),
            },
            err @ (StoreError::NotFound { .. } | StoreError::AlreadyExists { .. }) => {
                MutationError::RemoteRejected {
                    repository,
                    operation,
                    message: err.to_string(),
                }
            }
            source @ (StoreError::Transport(_) | StoreError::Malformed { .. }) => MutationError::Transport {
                repository,
                operation,
                source,
            },
        }
    }

    /// Name of the repository's default branch.
    pub async fn default_branch(&self) -> Result<String, MutationError> {
        let metadata = self
            .store
            .fetch_repository(self.repo)
            .await
            .map_err(|source| MutationError::Lookup {
                repository: self.repo.to_string(),
                source,
            })?;
        Ok(metadata.default_branch)
    }

    /// Makes `name` the default branch.
    ///
    /// The branch is not checked here; the store rejects unknown names.
    pub async fn set_default_branch(&self, name: &str) -> Result<(), MutationError> {
        let metadata = RepositoryMetadata {
            default_branch: name.to_string(),
        };
        self.store
            .update_repository(self.repo, &metadata)
            .await
            .map_err(|e| self.store_error("set default branch", e))?;
        tracing::info!(repo = %self.repo, branch = name, "default branch set");
        Ok(())
    }

    /// Commit hash the branch currently points at.
    pub async fn branch_head(&self, branch: &str) -> Result<CommitHash, MutationError> {
        match self.store.fetch_ref(self.repo, branch).await {
            Ok(hash) => Ok(hash),
            Err(StoreError::NotFound { .. }) => Err(MutationError::BranchNotFound {
                repository: self.repo.to_string(),
                branch: branch.to_string(),
            }),
            Err(e) => Err(self.store_error("fetch branch head", e)),
        }
    }

    /// Creates `new_branch` pointing at the head of `source_branch`.
    ///
    /// Returns the shared commit hash. A taken name fails with
    /// AlreadyExists and the existing ref is left alone.
    pub async fn create_branch(&self, source_branch: &str, new_branch: &str) -> Result<CommitHash, MutationError> {
        let head = self.branch_head(source_branch).await?;

        match self.store.create_ref(self.repo, new_branch, &head).await {
            Ok(()) => {
                tracing::info!(
                    repo = %self.repo,
                    branch = new_branch,
                    from = source_branch,
                    commit = %head,
                    "branch created"
                );
                Ok(head)
            }
            Err(StoreError::AlreadyExists { .. }) => Err(MutationError::AlreadyExists {
                repository: self.repo.to_string(),
                branch: new_branch.to_string(),
            }),
            Err(e) => Err(self.store_error("create branch", e)),
        }
    }

    /// Creates `new_branch` from the current default branch.
    pub async fn create_branch_from_default(&self, new_branch: &str) -> Result<CommitHash, MutationError> {
        let source = self.default_branch().await?;
        self.create_branch(&source, new_branch).await
    }

    /// Reads `filename` at the head of the default branch.
    pub async fn fetch_file(&self, filename: &str) -> Result<FileSnapshot, MutationError> {
        let branch = self.default_branch().await?;
        let commit = self.branch_head(&branch).await?;
        let tree = self.fetch_tree(&commit).await?;
        let blob = self.locate_blob(&tree, filename, &commit)?;
        let content = self.blob_text(&blob).await?;

        Ok(FileSnapshot {
            branch,
            commit,
            content,
        })
    }

    /// Replaces `filename` on the default branch with
    /// `transform(current content, parameter)` as one new commit.
    ///
    /// Returns the new commit hash. On failure no ref has moved.
    pub async fn update_file(
        &self,
        filename: &str,
        commit_message: &str,
        transform: &dyn FileTransform,
        parameter: &str,
    ) -> Result<CommitHash, TransactionError> {
        UpdateFile::new(self, filename)
            .run(commit_message, transform, parameter)
            .await
    }

    async fn fetch_tree(&self, commit: &CommitHash) -> Result<Tree, MutationError> {
        self.store
            .fetch_tree(self.repo, commit)
            .await
            .map_err(|e| self.store_error("fetch tree", e))
    }

    // Finds the blob for `path`; a truncated listing is not proof of absence
    fn locate_blob(&self, tree: &Tree, path: &str, commit: &CommitHash) -> Result<BlobHash, MutationError> {
        tree.blob_for(path).ok_or_else(|| {
            let repository = self.repo.to_string();
            let path = path.to_string();
            let commit = commit.to_string();
            if tree.truncated {
                MutationError::TruncatedTree {
                    repository,
                    path,
                    commit,
                }
            } else {
                MutationError::FileNotFound {
                    repository,
                    path,
                    commit,
                }
            }
        })
    }

    // Fetches a blob and decodes it as UTF-8 text
    async fn blob_text(&self, blob: &BlobHash) -> Result<String, MutationError> {
        let payload = self
            .store
            .fetch_blob(self.repo, blob)
            .await
            .map_err(|e| self.store_error("fetch blob", e))?;

        decode_blob(&payload).map_err(|reason| MutationError::Undecodable {
            repository: self.repo.to_string(),
            blob: blob.to_string(),
            reason,
        })
    }

    async fn create_blob(&self, content: &str) -> Result<BlobHash, MutationError> {
        self.store
            .create_blob(self.repo, content)
            .await
            .map_err(|e| self.store_error("create blob", e))
    }

    async fn create_tree(&self, base: &TreeHash, entries: &[NewTreeEntry]) -> Result<TreeHash, MutationError> {
        self.store
            .create_tree(self.repo, base, entries)
            .await
            .map_err(|e| self.store_error("create tree", e))
    }

    // Commits `tree` with exactly one parent
    async fn create_commit(
        &self,
        message: &str,
        tree: &TreeHash,
        parent: &CommitHash,
    ) -> Result<CommitHash, MutationError> {
        self.store
            .create_commit(self.repo, message, tree, std::slice::from_ref(parent))
            .await
            .map_err(|e| self.store_error("create commit", e))
    }

    async fn advance_branch(&self, branch: &str, commit: &CommitHash) -> Result<(), MutationError> {
        match self.store.update_ref(self.repo, branch, commit).await {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound { .. }) => Err(MutationError::BranchNotFound {
                repository: self.repo.to_string(),
                branch: branch.to_string(),
            }),
            Err(e) => Err(self.store_error("update branch", e)),
        }
    }
}

// Turns a blob payload into text
//
// The API sends base64 wrapped at 60 columns; newlines are not part of the
// data. Non-UTF-8 (binary) files are refused.
fn decode_blob(payload: &BlobContent) -> Result<String, String> {
    let bytes = match payload.encoding.as_str() {
        "base64" => {
            let compact: String = payload.content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            STANDARD.decode(compact).map_err(|e| format!("invalid base64: {}", e))?
        }
        "utf-8" | "utf8" => payload.content.clone().into_bytes(),
        other => return Err(format!("unsupported encoding \"{}\"", other)),
    };
    String::from_utf8(bytes).map_err(|_| "content is not valid UTF-8".to_string())
}
