// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote object store over the GitHub repository contents API.
//!
//! Every file write is a commit. Updates and deletes need the current blob
//! sha, so both look the file up first.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use vaultline_core::{RemoteObjectStore, SyncCredentials, VaultlineError};

const API_VERSION: &str = "2022-11-28";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct GithubObjectStore {
    client: reqwest::Client,
    base_url: String,
    owner: String,
    repo: String,
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    name: String,
    sha: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct PutRequest<'a> {
    message: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    message: String,
    sha: &'a str,
}

#[derive(Deserialize)]
struct CommitResponse {
    commit: CommitRef,
}

#[derive(Deserialize)]
struct CommitRef {
    sha: String,
}

impl GithubObjectStore {
    /// `api_base_url` is usually `https://api.github.com`.
    pub fn new(api_base_url: &str, credentials: &SyncCredentials) -> Result<Self, VaultlineError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!(
            "Bearer {}",
            credentials.token.expose_secret()
        ))
        .map_err(|e| VaultlineError::Config(format!("invalid access token: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("vaultline"));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| VaultlineError::Sync {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: api_base_url.trim_end_matches('/').to_string(),
            owner: credentials.owner.clone(),
            repo: credentials.repo.clone(),
        })
    }

    fn repo_url(&self) -> String {
        format!("{}/repos/{}/{}", self.base_url, self.owner, self.repo)
    }

    fn contents_url(&self, path: &str) -> String {
        format!("{}/contents/{}", self.repo_url(), path.trim_matches('/'))
    }

    async fn get_contents(&self, path: &str) -> Result<Option<reqwest::Response>, VaultlineError> {
        let response = self
            .client
            .get(self.contents_url(path))
            .send()
            .await
            .map_err(request_error)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response)),
            status => Err(status_error(response, status).await),
        }
    }

    async fn lookup_file(&self, path: &str) -> Result<Option<ContentEntry>, VaultlineError> {
        let Some(response) = self.get_contents(path).await? else {
            return Ok(None);
        };
        let entry: ContentEntry = response.json().await.map_err(decode_error)?;
        if entry.kind != "file" {
            return Err(VaultlineError::Remote {
                message: format!("{path} is a {}, not a file", entry.kind),
                status: None,
            });
        }
        Ok(Some(entry))
    }
}

#[async_trait]
impl RemoteObjectStore for GithubObjectStore {
    async fn upload_file(&self, path: &str, bytes: &[u8]) -> Result<String, VaultlineError> {
        let existing = self.lookup_file(path).await?;
        let body = PutRequest {
            message: format!("vaultline: update {path}"),
            content: STANDARD.encode(bytes),
            sha: existing.as_ref().map(|e| e.sha.as_str()),
        };
        let response = self
            .client
            .put(self.contents_url(path))
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(response, status).await);
        }
        let commit: CommitResponse = response.json().await.map_err(decode_error)?;
        debug!(path, commit = %commit.commit.sha, "uploaded file");
        Ok(commit.commit.sha)
    }

    async fn download_file(&self, path: &str) -> Result<Option<Vec<u8>>, VaultlineError> {
        let Some(entry) = self.lookup_file(path).await? else {
            return Ok(None);
        };
        let encoded: String = entry
            .content
            .unwrap_or_default()
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        STANDARD
            .decode(encoded)
            .map(Some)
            .map_err(|e| VaultlineError::Remote {
                message: format!("invalid base64 content at {path}: {e}"),
                status: None,
            })
    }

    async fn list_files(&self, dir: &str) -> Result<Vec<String>, VaultlineError> {
        let Some(response) = self.get_contents(dir).await? else {
            return Ok(Vec::new());
        };
        let entries: Vec<ContentEntry> = response.json().await.map_err(decode_error)?;
        let mut names: Vec<String> = entries
            .into_iter()
            .filter(|e| e.kind == "file")
            .map(|e| e.name)
            .collect();
        names.sort();
        Ok(names)
    }

    async fn delete_file(&self, path: &str) -> Result<(), VaultlineError> {
        let Some(existing) = self.lookup_file(path).await? else {
            return Ok(());
        };
        let body = DeleteRequest {
            message: format!("vaultline: delete {path}"),
            sha: &existing.sha,
        };
        let response = self
            .client
            .delete(self.contents_url(path))
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(status_error(response, status).await)
        }
    }

    async fn verify_repository(&self) -> Result<bool, VaultlineError> {
        let response = self
            .client
            .get(self.repo_url())
            .send()
            .await
            .map_err(request_error)?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(false),
            status => Err(status_error(response, status).await),
        }
    }
}

fn request_error(e: reqwest::Error) -> VaultlineError {
    VaultlineError::Remote {
        message: format!("request failed: {e}"),
        status: e.status().map(|s| s.as_u16()),
    }
}

fn decode_error(e: reqwest::Error) -> VaultlineError {
    VaultlineError::Remote {
        message: format!("unexpected response body: {e}"),
        status: None,
    }
}

async fn status_error(response: reqwest::Response, status: StatusCode) -> VaultlineError {
    let body = response.text().await.unwrap_or_default();
    VaultlineError::Remote {
        message: format!("remote returned {status}: {}", body.trim()),
        status: Some(status.as_u16()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> GithubObjectStore {
        let credentials = SyncCredentials {
            token: SecretString::from("ghp_test".to_string()),
            owner: "alice".to_string(),
            repo: "vault".to_string(),
        };
        GithubObjectStore::new(&server.uri(), &credentials).unwrap()
    }

    #[tokio::test]
    async fn download_decodes_wrapped_base64() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/alice/vault/contents/vault/a.json"))
            .and(header("authorization", "Bearer ghp_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "a.json",
                "sha": "abc",
                "type": "file",
                "content": "aGVs\nbG8=\n"
            })))
            .mount(&server)
            .await;

        let bytes = store(&server).download_file("vault/a.json").await.unwrap();
        assert_eq!(bytes.as_deref(), Some(b"hello".as_slice()));
    }

    #[tokio::test]
    async fn download_missing_file_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert_eq!(store(&server).download_file("vault/nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn upload_of_existing_file_sends_its_sha() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/alice/vault/contents/vault/a.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "a.json", "sha": "old-sha", "type": "file", "content": ""
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/repos/alice/vault/contents/vault/a.json"))
            .and(body_partial_json(serde_json::json!({
                "sha": "old-sha",
                "content": "aGk="
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": { "sha": "new-blob" },
                "commit": { "sha": "commit-1" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let commit = store(&server).upload_file("vault/a.json", b"hi").await.unwrap();
        assert_eq!(commit, "commit-1");
    }

    #[tokio::test]
    async fn list_returns_sorted_file_names_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/alice/vault/contents/vault"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "name": "b.json", "sha": "2", "type": "file" },
                { "name": "nested", "sha": "3", "type": "dir" },
                { "name": "a.json", "sha": "1", "type": "file" }
            ])))
            .mount(&server)
            .await;

        let names = store(&server).list_files("vault").await.unwrap();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }

    #[tokio::test]
    async fn list_of_missing_directory_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(store(&server).list_files("vault").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_of_missing_file_is_a_no_op() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        store(&server).delete_file("vault/gone.json").await.unwrap();
    }

    #[tokio::test]
    async fn verify_repository_maps_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/alice/vault"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;
        assert!(store(&server).verify_repository().await.unwrap());

        let missing = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&missing)
            .await;
        assert!(!store(&missing).verify_repository().await.unwrap());
    }

    #[tokio::test]
    async fn server_errors_carry_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("kaboom"))
            .mount(&server)
            .await;

        let err = store(&server).download_file("vault/a.json").await.unwrap_err();
        assert!(matches!(
            err,
            VaultlineError::Remote {
                status: Some(500),
                ..
            }
        ));
    }
}
