// src/github/memory.rs
// =============================================================================
// In-memory ObjectStore used by the mutator tests.
//
// It keeps a single repository's refs, trees, blobs and commits in maps,
// hands out sequential hashes ("blob-3", "tree-2", ...) and can be told to
// fail a specific call, so tests can check what happens when a step of an
// update breaks halfway through.
//
// Like GitHub with force=false, update_ref only accepts fast-forwards. A test
// can also have another writer push to a branch right after a given call.
// =============================================================================

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use super::client::ObjectStore;
use super::types::{
    BlobContent, BlobHash, CommitHash, NewTreeEntry, RepositoryHandle, RepositoryMetadata, Tree,
    TreeEntry, TreeHash,
};
use crate::error::StoreError;

// Names of the remote calls, for failure injection and call logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    FetchRepository,
    UpdateRepository,
    FetchRef,
    CreateRef,
    UpdateRef,
    FetchTree,
    FetchBlob,
    CreateBlob,
    CreateTree,
    CreateCommit,
}

#[derive(Debug, Clone)]
pub struct StoredCommit {
    pub tree: TreeHash,
    pub parents: Vec<CommitHash>,
    pub message: String,
}

#[derive(Default)]
struct State {
    default_branch: String,
    refs: HashMap<String, CommitHash>,
    commits: HashMap<CommitHash, StoredCommit>,
    trees: HashMap<TreeHash, BTreeMap<String, BlobHash>>,
    blobs: HashMap<BlobHash, Vec<u8>>,
    next_id: usize,
    calls: Vec<Call>,
    fail_on: Option<Call>,
    push_after: Option<(Call, String)>,
    truncated_listings: bool,
    created_commits: Vec<CommitHash>,
}

impl State {
    fn fresh_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn enter(&mut self, call: Call) -> Result<(), StoreError> {
        let trigger_hit = matches!(&self.push_after, Some((after, _)) if self.calls.last() == Some(after));
        if trigger_hit {
            if let Some((_, branch)) = self.push_after.take() {
                self.concurrent_push(&branch);
            }
        }

        self.calls.push(call);
        if self.fail_on == Some(call) {
            return Err(StoreError::Rejected {
                status: 500,
                message: format!("injected failure in {:?}", call),
            });
        }
        Ok(())
    }

    // Another writer commits on `branch` (same tree, new commit on top)
    fn concurrent_push(&mut self, branch: &str) {
        let head = self.refs[branch].clone();
        let tree = self.commits[&head].tree.clone();
        let commit = CommitHash(self.fresh_id("commit"));
        self.commits.insert(
            commit.clone(),
            StoredCommit {
                tree,
                parents: vec![head],
                message: "concurrent push".to_string(),
            },
        );
        self.refs.insert(branch.to_string(), commit);
    }

    // True if `ancestor` is `commit` or reachable through its parents
    fn descends_from(&self, commit: &CommitHash, ancestor: &CommitHash) -> bool {
        let mut pending = vec![commit.clone()];
        while let Some(current) = pending.pop() {
            if &current == ancestor {
                return true;
            }
            if let Some(stored) = self.commits.get(&current) {
                pending.extend(stored.parents.iter().cloned());
            }
        }
        false
    }
}

pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    // A repository with one commit on `branch` holding the given files
    pub fn with_files(branch: &str, files: &[(&str, &str)]) -> Self {
        let mut state = State {
            default_branch: branch.to_string(),
            ..State::default()
        };

        let mut tree = BTreeMap::new();
        for (path, content) in files {
            let blob = BlobHash(state.fresh_id("blob"));
            state.blobs.insert(blob.clone(), content.as_bytes().to_vec());
            tree.insert(path.to_string(), blob);
        }
        let tree_hash = TreeHash(state.fresh_id("tree"));
        state.trees.insert(tree_hash.clone(), tree);

        let commit = CommitHash(state.fresh_id("commit"));
        state.commits.insert(
            commit.clone(),
            StoredCommit {
                tree: tree_hash,
                parents: Vec::new(),
                message: "initial".to_string(),
            },
        );
        state.refs.insert(branch.to_string(), commit);

        Self {
            state: Mutex::new(state),
        }
    }

    pub fn fail_on(&self, call: Call) {
        self.state.lock().unwrap().fail_on = Some(call);
    }

    // Right after the next `call` completes, another writer pushes to `branch`
    pub fn push_after(&self, call: Call, branch: &str) {
        self.state.lock().unwrap().push_after = Some((call, branch.to_string()));
    }

    // Tree listings come back empty and flagged as truncated
    pub fn truncate_listings(&self) {
        self.state.lock().unwrap().truncated_listings = true;
    }

    // Commits made through create_commit, oldest first
    pub fn created_commits(&self) -> Vec<CommitHash> {
        self.state.lock().unwrap().created_commits.clone()
    }

    pub fn insert_blob_bytes(&self, path: &str, bytes: &[u8]) {
        let mut state = self.state.lock().unwrap();
        let blob = BlobHash(state.fresh_id("blob"));
        state.blobs.insert(blob.clone(), bytes.to_vec());
        let branch = state.default_branch.clone();
        let head = state.refs[&branch].clone();
        let tree = state.commits[&head].tree.clone();
        state.trees.get_mut(&tree).unwrap().insert(path.to_string(), blob);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn ref_target(&self, branch: &str) -> Option<CommitHash> {
        self.state.lock().unwrap().refs.get(branch).cloned()
    }

    pub fn default_branch(&self) -> String {
        self.state.lock().unwrap().default_branch.clone()
    }

    pub fn commit(&self, hash: &CommitHash) -> StoredCommit {
        self.state.lock().unwrap().commits[hash].clone()
    }

    // Path -> blob mapping of the tree a commit points at
    pub fn tree_of(&self, hash: &CommitHash) -> BTreeMap<String, BlobHash> {
        let state = self.state.lock().unwrap();
        let tree = &state.commits[hash].tree;
        state.trees[tree].clone()
    }

    pub fn file_at(&self, hash: &CommitHash, path: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        let tree = &state.commits[hash].tree;
        let blob = state.trees[tree].get(path)?;
        String::from_utf8(state.blobs[blob].clone()).ok()
    }

    pub fn object_counts(&self) -> (usize, usize, usize) {
        let state = self.state.lock().unwrap();
        (state.blobs.len(), state.trees.len(), state.commits.len())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn fetch_repository(&self, _repo: &RepositoryHandle) -> Result<RepositoryMetadata, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.enter(Call::FetchRepository)?;
        Ok(RepositoryMetadata {
            default_branch: state.default_branch.clone(),
        })
    }

    async fn update_repository(
        &self,
        _repo: &RepositoryHandle,
        metadata: &RepositoryMetadata,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.enter(Call::UpdateRepository)?;
        if !state.refs.contains_key(&metadata.default_branch) {
            return Err(StoreError::Rejected {
                status: 422,
                message: "Validation Failed".to_string(),
            });
        }
        state.default_branch = metadata.default_branch.clone();
        Ok(())
    }

    async fn fetch_ref(&self, _repo: &RepositoryHandle, branch: &str) -> Result<CommitHash, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.enter(Call::FetchRef)?;
        state.refs.get(branch).cloned().ok_or_else(|| StoreError::NotFound {
            what: format!("ref heads/{}", branch),
        })
    }

    async fn create_ref(
        &self,
        _repo: &RepositoryHandle,
        branch: &str,
        target: &CommitHash,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.enter(Call::CreateRef)?;
        if state.refs.contains_key(branch) {
            return Err(StoreError::AlreadyExists {
                what: format!("ref heads/{}", branch),
            });
        }
        state.refs.insert(branch.to_string(), target.clone());
        Ok(())
    }

    async fn update_ref(
        &self,
        _repo: &RepositoryHandle,
        branch: &str,
        target: &CommitHash,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.enter(Call::UpdateRef)?;
        let head = state.refs.get(branch).cloned().ok_or_else(|| StoreError::NotFound {
            what: format!("ref heads/{}", branch),
        })?;
        if !state.descends_from(target, &head) {
            return Err(StoreError::Rejected {
                status: 422,
                message: "Update is not a fast forward".to_string(),
            });
        }
        state.refs.insert(branch.to_string(), target.clone());
        Ok(())
    }

    async fn fetch_tree(&self, _repo: &RepositoryHandle, commit: &CommitHash) -> Result<Tree, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.enter(Call::FetchTree)?;
        let stored = state.commits.get(commit).ok_or_else(|| StoreError::NotFound {
            what: format!("commit {}", commit),
        })?;
        if state.truncated_listings {
            return Ok(Tree {
                hash: stored.tree.clone(),
                entries: Vec::new(),
                truncated: true,
            });
        }
        let entries = state.trees[&stored.tree]
            .iter()
            .map(|(path, blob)| TreeEntry {
                path: path.clone(),
                mode: "100644".to_string(),
                kind: "blob".to_string(),
                sha: blob.0.clone(),
            })
            .collect();
        Ok(Tree {
            hash: stored.tree.clone(),
            entries,
            truncated: false,
        })
    }

    async fn fetch_blob(&self, _repo: &RepositoryHandle, blob: &BlobHash) -> Result<BlobContent, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.enter(Call::FetchBlob)?;
        let bytes = state.blobs.get(blob).ok_or_else(|| StoreError::NotFound {
            what: format!("blob {}", blob),
        })?;
        // Wrap at 60 columns like the real API does
        let encoded = STANDARD.encode(bytes);
        let wrapped: Vec<String> = encoded
            .as_bytes()
            .chunks(60)
            .map(|chunk| String::from_utf8_lossy(chunk).to_string())
            .collect();
        Ok(BlobContent {
            content: wrapped.join("\n"),
            encoding: "base64".to_string(),
        })
    }

    async fn create_blob(&self, _repo: &RepositoryHandle, content: &str) -> Result<BlobHash, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.enter(Call::CreateBlob)?;
        let blob = BlobHash(state.fresh_id("blob"));
        state.blobs.insert(blob.clone(), content.as_bytes().to_vec());
        Ok(blob)
    }

    async fn create_tree(
        &self,
        _repo: &RepositoryHandle,
        base: &TreeHash,
        entries: &[NewTreeEntry],
    ) -> Result<TreeHash, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.enter(Call::CreateTree)?;
        let mut tree = state.trees.get(base).cloned().ok_or_else(|| StoreError::NotFound {
            what: format!("tree {}", base),
        })?;
        for entry in entries {
            tree.insert(entry.path.clone(), entry.sha.clone());
        }
        let hash = TreeHash(state.fresh_id("tree"));
        state.trees.insert(hash.clone(), tree);
        Ok(hash)
    }

    async fn create_commit(
        &self,
        _repo: &RepositoryHandle,
        message: &str,
        tree: &TreeHash,
        parents: &[CommitHash],
    ) -> Result<CommitHash, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.enter(Call::CreateCommit)?;
        let hash = CommitHash(state.fresh_id("commit"));
        state.commits.insert(
            hash.clone(),
            StoredCommit {
                tree: tree.clone(),
                parents: parents.to_vec(),
                message: message.to_string(),
            },
        );
        state.created_commits.push(hash.clone());
        Ok(hash)
    }
}
