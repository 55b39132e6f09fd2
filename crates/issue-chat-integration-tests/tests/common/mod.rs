//! Common test utilities for issue-chat integration tests
//!
//! This module provides:
//! - Client construction against a mock GitHub server
//! - JSON fixtures for REST and GraphQL responses
//! - A token store that fails on demand

use async_trait::async_trait;
use issue_chat_core::{
    ChatClient, ClientConfig, Credential, RepositoryRef, StorageError, TokenStore,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use wiremock::MockServer;

pub const OWNER: &str = "octo";
pub const REPO: &str = "chat";

/// Path under the mock server for a repository resource.
#[allow(dead_code)]
pub fn repo_path(suffix: &str) -> String {
    format!("/repos/{}/{}{}", OWNER, REPO, suffix)
}

// ============================================================================
// Clients
// ============================================================================

/// Client pointed at `server`, optionally with a token.
#[allow(dead_code)]
pub fn client(server: &MockServer, prefer_graphql: bool, token: Option<&str>) -> ChatClient {
    let mut builder = ChatClient::builder().config(
        ClientConfig::default()
            .with_api_url(server.uri())
            .with_repository(RepositoryRef::new(OWNER, REPO))
            .with_prefer_graphql(prefer_graphql),
    );
    if let Some(token) = token {
        builder = builder.token(Credential::new(token));
    }
    builder.build().expect("client should build")
}

// ============================================================================
// Fixtures
// ============================================================================

/// REST issue record.
#[allow(dead_code)]
pub fn issue_json(number: u64, title: &str, labels: &[&str]) -> Value {
    json!({
        "id": 1000 + number,
        "number": number,
        "title": title,
        "body": "Welcome",
        "state": "open",
        "comments": 1,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-02T00:00:00Z",
        "user": {"login": "octocat", "id": 1, "avatar_url": "https://avatars/1"},
        "labels": labels
            .iter()
            .map(|name| json!({"name": name, "color": "0e8a16", "description": null}))
            .collect::<Vec<_>>(),
        "html_url": format!("https://github.com/octo/chat/issues/{}", number)
    })
}

/// REST pull request record; listed by the issues endpoint but never a room.
#[allow(dead_code)]
pub fn pull_request_json(number: u64, labels: &[&str]) -> Value {
    let mut value = issue_json(number, "A pull request", labels);
    value["pull_request"] = json!({"url": "https://api.github.com/pulls/1"});
    value
}

/// REST comment record.
#[allow(dead_code)]
pub fn comment_json(id: u64, body: &str, author_id: u64) -> Value {
    json!({
        "id": id,
        "body": body,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z",
        "user": {"login": format!("user{}", author_id), "id": author_id, "avatar_url": ""},
        "html_url": format!("https://github.com/octo/chat/issues/1#issuecomment-{}", id)
    })
}

/// GraphQL response carrying only errors.
#[allow(dead_code)]
pub fn graphql_errors(message: &str, error_type: &str) -> Value {
    json!({
        "data": null,
        "errors": [{"type": error_type, "message": message, "path": ["repository", "issue"]}]
    })
}

/// GraphQL response for a room matching [`issue_json`] with the `chat` label.
#[allow(dead_code)]
pub fn graphql_issue(number: u64, title: &str) -> Value {
    json!({
        "data": {
            "repository": {
                "issue": {
                    "databaseId": 1000 + number,
                    "id": "I_kwDOA",
                    "number": number,
                    "title": title,
                    "body": "Welcome",
                    "state": "OPEN",
                    "createdAt": "2024-01-01T00:00:00Z",
                    "updatedAt": "2024-01-02T00:00:00Z",
                    "url": format!("https://github.com/octo/chat/issues/{}", number),
                    "author": {"login": "octocat", "avatarUrl": "https://avatars/1", "databaseId": 1},
                    "labels": {"nodes": [{"name": "chat", "color": "0e8a16", "description": null}]},
                    "comments": {"totalCount": 1}
                }
            }
        }
    })
}

/// User record for `GET /user`.
#[allow(dead_code)]
pub fn user_json(id: u64, login: &str) -> Value {
    json!({
        "id": id,
        "login": login,
        "name": null,
        "avatar_url": "",
        "html_url": format!("https://github.com/{}", login)
    })
}

// ============================================================================
// Token store
// ============================================================================

/// Token store whose writes can be made to fail.
#[derive(Default)]
#[allow(dead_code)]
pub struct FlakyTokenStore {
    fail_writes: AtomicBool,
    token: std::sync::Mutex<Option<Credential>>,
}

#[allow(dead_code)]
impl FlakyTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn stored(&self) -> Option<Credential> {
        self.token.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io {
                path: "memory".to_string(),
                message: "disk full".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TokenStore for FlakyTokenStore {
    async fn load(&self) -> Result<Option<Credential>, StorageError> {
        Ok(self.stored())
    }

    async fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        self.check()?;
        *self.token.lock().unwrap() = Some(credential.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.check()?;
        *self.token.lock().unwrap() = None;
        Ok(())
    }
}
