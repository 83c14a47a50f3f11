//! GitHub Git Data API client: blob/tree/commit/ref primitives used by the
//! push pipeline, repository discovery, the empty-repository Contents-API
//! fallback, and the codeload archive download used by clone.

use base64::Engine;
use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};

use crate::internal::config::Config;
use crate::internal::errors::GyattError;
use crate::internal::protocol::http::{HttpPool, HttpRequest, HttpResponse};

const API_BASE: &str = "https://api.github.com";
const CODELOAD_BASE: &str = "https://codeload.github.com";
const ACCEPT_HEADER: &str = "application/vnd.github.v3+json";

/// Paths never uploaded to the forge regardless of the ignore file.
pub const SYSTEM_DENY_LIST: &[&str] = &[
    ".gyatt",
    ".git",
    ".idea",
    ".vscode",
    ".DS_Store",
    "Thumbs.db",
];

static REPO_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https?://github\.com/|git@github\.com:)([^/]+)/([^/]+?)(?:\.git)?/?$")
        .unwrap()
});

// ---- wire types ----------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RepoInfo {
    pub full_name: String,
    pub default_branch: String,
    #[serde(default)]
    pub private: bool,
}

#[derive(Debug, Deserialize)]
pub struct BranchInfo {
    pub name: String,
}

#[derive(Debug, Serialize)]
struct CreateBlobRequest<'a> {
    content: &'a str,
    encoding: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct BlobReference {
    pub sha: String,
}

#[derive(Debug, Serialize)]
pub struct CreateTreeEntry {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub sha: String,
}

#[derive(Debug, Serialize)]
struct CreateTreeRequest {
    tree: Vec<CreateTreeEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    base_tree: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TreeResponse {
    pub sha: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
    pub date: String,
}

#[derive(Debug, Serialize)]
struct CreateCommitRequest {
    message: String,
    tree: String,
    parents: Vec<String>,
    author: CommitAuthor,
    committer: CommitAuthor,
}

#[derive(Debug, Deserialize)]
pub struct TreeReference {
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub struct GitCommitResponse {
    pub sha: String,
    pub tree: TreeReference,
}

#[derive(Debug, Deserialize)]
pub struct GitObject {
    pub sha: String,
    #[serde(rename = "type")]
    pub object_type: String,
}

#[derive(Debug, Deserialize)]
pub struct GitReference {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub object: GitObject,
}

#[derive(Debug, Serialize)]
struct CreateRefRequest<'a> {
    #[serde(rename = "ref")]
    ref_name: String,
    sha: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateRefRequest<'a> {
    sha: &'a str,
    force: bool,
}

#[derive(Debug, Serialize)]
struct CreateRepoRequest<'a> {
    name: &'a str,
    private: bool,
    auto_init: bool,
}

#[derive(Debug, Serialize)]
struct CreateContentsRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
}

// ---- client --------------------------------------------------------------

pub struct GithubClient {
    /// `owner/name`
    repo: String,
    token: Option<String>,
    api_base: String,
}

impl GithubClient {
    /// Parse an `https://github.com/owner/repo(.git)` or
    /// `git@github.com:owner/repo` remote URL. The API endpoint can be
    /// overridden with `[github] api = <url>` in the config.
    pub fn from_url(url: &str) -> Result<GithubClient, GyattError> {
        let caps = REPO_URL_RE
            .captures(url.trim())
            .ok_or_else(|| GyattError::BadFormat(format!("github remote url '{url}'")))?;
        let repo = format!("{}/{}", &caps[1], &caps[2]);
        let api_base = match Config::get("github", None, "api") {
            Ok(Some(api)) => api.trim_end_matches('/').to_string(),
            _ => API_BASE.to_string(),
        };
        Ok(GithubClient {
            repo,
            token: Config::github_token()?,
            api_base,
        })
    }

    pub fn repo_name(&self) -> &str {
        &self.repo
    }

    pub fn short_name(&self) -> &str {
        self.repo.rsplit('/').next().unwrap_or(&self.repo)
    }

    fn require_token(&self) -> Result<&str, GyattError> {
        self.token.as_deref().ok_or(GyattError::AuthRequired)
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("Accept".to_string(), ACCEPT_HEADER.to_string())];
        if let Some(token) = &self.token {
            headers.push(("Authorization".to_string(), format!("token {token}")));
        }
        headers
    }

    fn api(&self, path: &str) -> String {
        format!("{}/repos/{}{path}", self.api_base, self.repo)
    }

    async fn send(&self, mut req: HttpRequest) -> Result<HttpResponse, GyattError> {
        req.headers.extend(self.headers());
        HttpPool::global().request(req).await
    }

    fn remote_error(step: &'static str, response: &HttpResponse) -> GyattError {
        GyattError::RemoteError {
            step,
            status: response.status.as_u16(),
            body: response.body_string(),
        }
    }

    /// `GET /repos/{r}`; `None` on 404.
    pub async fn repo_info(&self) -> Result<Option<RepoInfo>, GyattError> {
        let response = self
            .send(HttpRequest::new(Method::GET, self.api("")))
            .await?;
        match response.status {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(GyattError::AuthRequired),
            s if s.is_success() => Ok(Some(response.json()?)),
            _ => Err(Self::remote_error("repository lookup", &response)),
        }
    }

    pub async fn list_branches(&self) -> Result<Vec<BranchInfo>, GyattError> {
        let response = self
            .send(HttpRequest::new(Method::GET, self.api("/branches")))
            .await?;
        if !response.is_success() {
            return Err(Self::remote_error("branch listing", &response));
        }
        response.json()
    }

    /// `GET /repos/{r}/git/ref/heads/{b}`; `None` when the ref is absent.
    pub async fn get_ref(&self, branch: &str) -> Result<Option<GitReference>, GyattError> {
        let response = self
            .send(HttpRequest::new(
                Method::GET,
                self.api(&format!("/git/ref/heads/{branch}")),
            ))
            .await?;
        match response.status {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(response.json()?)),
            _ => Err(Self::remote_error("ref lookup", &response)),
        }
    }

    pub async fn get_commit(&self, sha: &str) -> Result<GitCommitResponse, GyattError> {
        let response = self
            .send(HttpRequest::new(
                Method::GET,
                self.api(&format!("/git/commits/{sha}")),
            ))
            .await?;
        if !response.is_success() {
            return Err(Self::remote_error("commit lookup", &response));
        }
        response.json()
    }

    /// Upload blobs through the bounded-parallel batch. Outcomes keep input
    /// order; each is the created blob sha or the per-file error.
    pub async fn create_blobs(
        &self,
        contents: Vec<Vec<u8>>,
    ) -> Result<Vec<Result<String, GyattError>>, GyattError> {
        self.require_token()?;
        let bodies: Vec<Bytes> = contents
            .iter()
            .map(|content| {
                let request = CreateBlobRequest {
                    content: &base64::engine::general_purpose::STANDARD.encode(content),
                    encoding: "base64",
                };
                Bytes::from(serde_json::to_vec(&request).unwrap_or_default())
            })
            .collect();

        let mut headers = self.headers();
        headers.push(("Content-Type".to_string(), "application/json".to_string()));
        let responses = HttpPool::global()
            .batch_post(&self.api("/git/blobs"), &headers, bodies)
            .await;

        Ok(responses
            .into_iter()
            .map(|outcome| {
                let response = outcome?;
                if !response.is_success() {
                    return Err(Self::remote_error("blob creation", &response));
                }
                let blob: BlobReference = response.json()?;
                Ok(blob.sha)
            })
            .collect())
    }

    pub async fn create_tree(
        &self,
        entries: Vec<CreateTreeEntry>,
        base_tree: Option<String>,
    ) -> Result<String, GyattError> {
        self.require_token()?;
        let body = serde_json::to_vec(&CreateTreeRequest {
            tree: entries,
            base_tree,
        })
        .map_err(|e| GyattError::BadFormat(e.to_string()))?;
        let response = self
            .send(
                HttpRequest::new(Method::POST, self.api("/git/trees"))
                    .header("Content-Type", "application/json")
                    .body(body),
            )
            .await?;
        if !response.is_success() {
            return Err(Self::remote_error("tree creation", &response));
        }
        let tree: TreeResponse = response.json()?;
        Ok(tree.sha)
    }

    pub async fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parents: Vec<String>,
        author: CommitAuthor,
        committer: CommitAuthor,
    ) -> Result<String, GyattError> {
        self.require_token()?;
        let body = serde_json::to_vec(&CreateCommitRequest {
            message: message.to_string(),
            tree: tree.to_string(),
            parents,
            author,
            committer,
        })
        .map_err(|e| GyattError::BadFormat(e.to_string()))?;
        let response = self
            .send(
                HttpRequest::new(Method::POST, self.api("/git/commits"))
                    .header("Content-Type", "application/json")
                    .body(body),
            )
            .await?;
        if !response.is_success() {
            return Err(Self::remote_error("commit creation", &response));
        }
        let commit: GitCommitResponse = response.json()?;
        Ok(commit.sha)
    }

    /// PATCH the existing ref or POST a new one.
    pub async fn update_ref(
        &self,
        branch: &str,
        sha: &str,
        ref_exists: bool,
    ) -> Result<(), GyattError> {
        self.require_token()?;
        let response = if ref_exists {
            let body = serde_json::to_vec(&UpdateRefRequest { sha, force: false })
                .map_err(|e| GyattError::BadFormat(e.to_string()))?;
            self.send(
                HttpRequest::new(
                    Method::PATCH,
                    self.api(&format!("/git/refs/heads/{branch}")),
                )
                .header("Content-Type", "application/json")
                .body(body),
            )
            .await?
        } else {
            let body = serde_json::to_vec(&CreateRefRequest {
                ref_name: format!("refs/heads/{branch}"),
                sha,
            })
            .map_err(|e| GyattError::BadFormat(e.to_string()))?;
            self.send(
                HttpRequest::new(Method::POST, self.api("/git/refs"))
                    .header("Content-Type", "application/json")
                    .body(body),
            )
            .await?
        };
        if !response.is_success() {
            return Err(Self::remote_error("ref update", &response));
        }
        Ok(())
    }

    /// Create the repository itself (first push to a missing repo).
    pub async fn create_repo(&self) -> Result<(), GyattError> {
        self.require_token()?;
        let body = serde_json::to_vec(&CreateRepoRequest {
            name: self.short_name(),
            private: false,
            auto_init: false,
        })
        .map_err(|e| GyattError::BadFormat(e.to_string()))?;
        let mut req = HttpRequest::new(Method::POST, format!("{}/user/repos", self.api_base))
            .header("Content-Type", "application/json")
            .body(body);
        req.headers.extend(self.headers());
        let response = HttpPool::global().request(req).await?;
        if !response.is_success() {
            return Err(Self::remote_error("repository creation", &response));
        }
        Ok(())
    }

    /// Contents-API fallback for an empty repository: create one file, which
    /// creates the initial commit on `branch`.
    pub async fn create_initial_file(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        branch: &str,
    ) -> Result<(), GyattError> {
        self.require_token()?;
        let body = serde_json::to_vec(&CreateContentsRequest {
            message,
            content: base64::engine::general_purpose::STANDARD.encode(content),
            branch,
        })
        .map_err(|e| GyattError::BadFormat(e.to_string()))?;
        let response = self
            .send(
                HttpRequest::new(Method::PUT, self.api(&format!("/contents/{path}")))
                    .header("Content-Type", "application/json")
                    .body(body),
            )
            .await?;
        if !response.is_success() {
            return Err(Self::remote_error("contents bootstrap", &response));
        }
        Ok(())
    }

    /// Download a branch archive from codeload; `None` on 404.
    pub async fn download_tarball(&self, branch: &str) -> Result<Option<Bytes>, GyattError> {
        let url = format!("{CODELOAD_BASE}/{}/tar.gz/refs/heads/{branch}", self.repo);
        let mut req = HttpRequest::new(Method::GET, url);
        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("token {token}"));
        }
        let response = HttpPool::global().request(req).await?;
        match response.status {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(response.body)),
            _ => Err(Self::remote_error("archive download", &response)),
        }
    }
}
