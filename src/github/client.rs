// src/github/client.rs
// =============================================================================
// This module talks to the remote object store.
//
// The ObjectStore trait is the narrow interface the mutator needs: repository
// metadata, refs, trees, blobs and commits. GithubClient implements it on top
// of the GitHub REST "git data" endpoints:
//
//   GET   /repos/{owner}/{repo}                      -> default branch
//   PATCH /repos/{owner}/{repo}                      <- default branch
//   GET   /repos/{owner}/{repo}/git/ref/heads/{b}    -> branch head
//   POST  /repos/{owner}/{repo}/git/refs             <- new branch
//   PATCH /repos/{owner}/{repo}/git/refs/heads/{b}   <- move branch
//   GET   /repos/{owner}/{repo}/git/trees/{sha}      -> tree entries
//   GET   /repos/{owner}/{repo}/git/blobs/{sha}      -> base64 content
//   POST  /repos/{owner}/{repo}/git/blobs|trees|commits
//
// There is no "edit a file" endpoint, which is why the mutator has to
// assemble blob -> tree -> commit -> ref itself.
// =============================================================================

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

use super::types::{
    BlobContent, BlobHash, CommitHash, NewTreeEntry, RepositoryHandle, RepositoryMetadata, Tree,
    TreeEntry, TreeHash,
};
use crate::error::StoreError;

/// Remote content-addressable store holding one or more repositories.
///
/// Every method is a single remote call. Implementations must not retry or
/// combine calls; sequencing is the caller's job.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn fetch_repository(&self, repo: &RepositoryHandle) -> Result<RepositoryMetadata, StoreError>;

    async fn update_repository(
        &self,
        repo: &RepositoryHandle,
        metadata: &RepositoryMetadata,
    ) -> Result<(), StoreError>;

    async fn fetch_ref(&self, repo: &RepositoryHandle, branch: &str) -> Result<CommitHash, StoreError>;

    async fn create_ref(
        &self,
        repo: &RepositoryHandle,
        branch: &str,
        target: &CommitHash,
    ) -> Result<(), StoreError>;

    async fn update_ref(
        &self,
        repo: &RepositoryHandle,
        branch: &str,
        target: &CommitHash,
    ) -> Result<(), StoreError>;

    async fn fetch_tree(&self, repo: &RepositoryHandle, commit: &CommitHash) -> Result<Tree, StoreError>;

    async fn fetch_blob(&self, repo: &RepositoryHandle, blob: &BlobHash) -> Result<BlobContent, StoreError>;

    async fn create_blob(&self, repo: &RepositoryHandle, content: &str) -> Result<BlobHash, StoreError>;

    async fn create_tree(
        &self,
        repo: &RepositoryHandle,
        base: &TreeHash,
        entries: &[NewTreeEntry],
    ) -> Result<TreeHash, StoreError>;

    async fn create_commit(
        &self,
        repo: &RepositoryHandle,
        message: &str,
        tree: &TreeHash,
        parents: &[CommitHash],
    ) -> Result<CommitHash, StoreError>;
}

// Response shapes we care about; everything else in the JSON is ignored
#[derive(Deserialize)]
struct RepoResponse {
    default_branch: String,
}

#[derive(Deserialize)]
struct RefResponse {
    object: RefObject,
}

#[derive(Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Deserialize)]
struct TreeResponse {
    sha: String,
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct ShaResponse {
    sha: String,
}

#[derive(Deserialize)]
struct ApiMessage {
    message: String,
}

/// ObjectStore backed by the GitHub REST API.
#[derive(Clone)]
pub struct GithubClient {
    http: Client,
    api_url: Url,
}

impl GithubClient {
    // Builds a client authenticated with a personal access token
    //
    // Parameters:
    //   api_url: API root, normally https://api.github.com
    //   token: personal access token with repo scope
    pub fn new(api_url: &str, token: &str) -> Result<Self> {
        let parsed = Url::parse(api_url).map_err(|e| anyhow!("Invalid API URL '{}': {}", api_url, e))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(anyhow!("API URL must be http(s): {}", api_url));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        let mut auth = HeaderValue::from_str(&format!("token {}", token))
            .map_err(|_| anyhow!("Token contains characters not allowed in a header"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = Client::builder()
            .user_agent(concat!("lomad/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { http, api_url: parsed })
    }

    // Builds /repos/{owner}/{repo}/{segments...} under the API root
    //
    // Each segment is percent-encoded, so a branch named "fix#1" cannot end
    // the path early. Branch names are split on '/' first ("feature/x" is two
    // segments of the ref path, as GitHub expects).
    fn endpoint(&self, repo: &RepositoryHandle, segments: &[&str]) -> Url {
        let mut url = self.api_url.clone();
        // `new` only accepts http(s) roots, which always have a path
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .extend(["repos", repo.owner.as_str(), repo.name.as_str()])
                .extend(segments);
        }
        url
    }

    // Sends a request and decodes a successful JSON body
    //
    // `what` names the addressed object for NotFound / AlreadyExists errors
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: String) -> Result<T, StoreError> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return response.json::<T>().await.map_err(|e| StoreError::Malformed {
                detail: format!("{}: {}", what, e),
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status, what, &body))
    }
}

// Maps a non-success status to a StoreError
//
// GitHub reports ref collisions as 422 "Reference already exists" and most
// validation problems as 422 "Validation Failed", so the message decides.
fn classify_failure(status: StatusCode, what: String, body: &str) -> StoreError {
    let message = serde_json::from_str::<ApiMessage>(body)
        .map(|m| m.message)
        .unwrap_or_else(|_| body.trim().to_string());

    match status {
        StatusCode::NOT_FOUND => StoreError::NotFound { what },
        StatusCode::UNPROCESSABLE_ENTITY if message.to_lowercase().contains("already exists") => {
            StoreError::AlreadyExists { what }
        }
        _ => StoreError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl ObjectStore for GithubClient {
    async fn fetch_repository(&self, repo: &RepositoryHandle) -> Result<RepositoryMetadata, StoreError> {
        tracing::debug!(%repo, "fetching repository metadata");
        let response: RepoResponse = self
            .send(self.http.get(self.endpoint(repo, &[])), format!("repository {}", repo))
            .await?;
        Ok(RepositoryMetadata {
            default_branch: response.default_branch,
        })
    }

    async fn update_repository(
        &self,
        repo: &RepositoryHandle,
        metadata: &RepositoryMetadata,
    ) -> Result<(), StoreError> {
        tracing::debug!(%repo, default_branch = %metadata.default_branch, "updating repository metadata");
        let body = json!({
            "name": repo.name,
            "default_branch": metadata.default_branch,
        });
        let _: IgnoredAny = self
            .send(self.http.patch(self.endpoint(repo, &[])).json(&body), format!("repository {}", repo))
            .await?;
        Ok(())
    }

    async fn fetch_ref(&self, repo: &RepositoryHandle, branch: &str) -> Result<CommitHash, StoreError> {
        tracing::debug!(%repo, branch, "fetching ref");
        let mut segments = vec!["git", "ref", "heads"];
        segments.extend(branch.split('/'));
        let url = self.endpoint(repo, &segments);
        let response: RefResponse = self
            .send(self.http.get(url), format!("ref heads/{} in {}", branch, repo))
            .await?;
        Ok(CommitHash(response.object.sha))
    }

    async fn create_ref(
        &self,
        repo: &RepositoryHandle,
        branch: &str,
        target: &CommitHash,
    ) -> Result<(), StoreError> {
        tracing::debug!(%repo, branch, %target, "creating ref");
        let body = json!({
            "ref": format!("refs/heads/{}", branch),
            "sha": target,
        });
        let _: IgnoredAny = self
            .send(
                self.http.post(self.endpoint(repo, &["git", "refs"])).json(&body),
                format!("ref heads/{} in {}", branch, repo),
            )
            .await?;
        Ok(())
    }

    async fn update_ref(
        &self,
        repo: &RepositoryHandle,
        branch: &str,
        target: &CommitHash,
    ) -> Result<(), StoreError> {
        tracing::debug!(%repo, branch, %target, "updating ref");
        // force=false: the store rejects the move unless it is a fast-forward
        let body = json!({ "sha": target, "force": false });
        let mut segments = vec!["git", "refs", "heads"];
        segments.extend(branch.split('/'));
        let url = self.endpoint(repo, &segments);
        let _: IgnoredAny = self
            .send(self.http.patch(url).json(&body), format!("ref heads/{} in {}", branch, repo))
            .await?;
        Ok(())
    }

    async fn fetch_tree(&self, repo: &RepositoryHandle, commit: &CommitHash) -> Result<Tree, StoreError> {
        tracing::debug!(%repo, %commit, "fetching tree");
        let mut url = self.endpoint(repo, &["git", "trees", commit.0.as_str()]);
        url.query_pairs_mut().append_pair("recursive", "1");
        let response: TreeResponse = self
            .send(self.http.get(url), format!("tree of {} in {}", commit, repo))
            .await?;
        if response.truncated {
            tracing::warn!(%repo, %commit, "tree listing was truncated by the API");
        }
        Ok(Tree {
            hash: TreeHash(response.sha),
            entries: response.tree,
            truncated: response.truncated,
        })
    }

    async fn fetch_blob(&self, repo: &RepositoryHandle, blob: &BlobHash) -> Result<BlobContent, StoreError> {
        tracing::debug!(%repo, %blob, "fetching blob");
        let url = self.endpoint(repo, &["git", "blobs", blob.0.as_str()]);
        self.send(self.http.get(url), format!("blob {} in {}", blob, repo)).await
    }

    async fn create_blob(&self, repo: &RepositoryHandle, content: &str) -> Result<BlobHash, StoreError> {
        tracing::debug!(%repo, bytes = content.len(), "creating blob");
        let body = json!({ "content": content, "encoding": "utf-8" });
        let response: ShaResponse = self
            .send(
                self.http.post(self.endpoint(repo, &["git", "blobs"])).json(&body),
                format!("blob in {}", repo),
            )
            .await?;
        Ok(BlobHash(response.sha))
    }

    async fn create_tree(
        &self,
        repo: &RepositoryHandle,
        base: &TreeHash,
        entries: &[NewTreeEntry],
    ) -> Result<TreeHash, StoreError> {
        tracing::debug!(%repo, %base, entries = entries.len(), "creating tree");
        let body = json!({ "base_tree": base, "tree": entries });
        let response: ShaResponse = self
            .send(
                self.http.post(self.endpoint(repo, &["git", "trees"])).json(&body),
                format!("tree in {}", repo),
            )
            .await?;
        Ok(TreeHash(response.sha))
    }

    async fn create_commit(
        &self,
        repo: &RepositoryHandle,
        message: &str,
        tree: &TreeHash,
        parents: &[CommitHash],
    ) -> Result<CommitHash, StoreError> {
        tracing::debug!(%repo, %tree, "creating commit");
        let body = json!({ "message": message, "tree": tree, "parents": parents });
        let response: ShaResponse = self
            .send(
                self.http.post(self.endpoint(repo, &["git", "commits"])).json(&body),
                format!("commit in {}", repo),
            )
            .await?;
        Ok(CommitHash(response.sha))
    }
}
