// src/github/types.rs
// =============================================================================
// Plain data types describing a remote repository and its git objects.
//
// Hashes are opaque strings handed out by the store. They get separate
// newtypes so a tree hash can never be passed where a commit hash belongs.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

// Identifies one remote repository (owner + name)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryHandle {
    pub owner: String,
    pub name: String,
}

impl RepositoryHandle {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepositoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

// Generates a transparent String newtype for one kind of object hash
macro_rules! object_hash {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

object_hash!(
    /// Hash of a commit object.
    CommitHash
);
object_hash!(
    /// Hash of a tree object.
    TreeHash
);
object_hash!(
    /// Hash of a blob object.
    BlobHash
);

/// Repository metadata we read and write (only the default branch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryMetadata {
    pub default_branch: String,
}

/// One entry of a fetched tree.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: String,
}

impl TreeEntry {
    pub fn is_blob(&self) -> bool {
        self.kind == "blob"
    }
}

/// The file state of one commit.
///
/// `truncated` is set when the store returned only part of the listing, so a
/// missing path may still exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    pub hash: TreeHash,
    pub entries: Vec<TreeEntry>,
    pub truncated: bool,
}

impl Tree {
    // Looks up the blob stored at `path`, ignoring sub-tree entries
    pub fn blob_for(&self, path: &str) -> Option<BlobHash> {
        self.entries
            .iter()
            .find(|entry| entry.is_blob() && entry.path == path)
            .map(|entry| BlobHash(entry.sha.clone()))
    }
}

/// An entry to overlay on a base tree when creating a new tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTreeEntry {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: BlobHash,
}

impl NewTreeEntry {
    // A regular (non-executable) file entry
    pub fn file(path: impl Into<String>, blob: BlobHash) -> Self {
        Self {
            path: path.into(),
            mode: "100644".to_string(),
            kind: "blob".to_string(),
            sha: blob,
        }
    }
}

/// Raw blob payload as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BlobContent {
    pub content: String,
    pub encoding: String,
}
