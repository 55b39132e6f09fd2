//! End-to-end tests for the `issue-chat` binary against a mock GitHub API.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Command isolated from the user's own configuration and token.
fn issue_chat(home: &TempDir, api_url: &str) -> Command {
    let mut cmd = Command::cargo_bin("issue-chat").unwrap();
    cmd.env_clear()
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("ISSUE_CHAT__GITHUB__API_URL", api_url)
        .env("ISSUE_CHAT__GITHUB__PREFER_GRAPHQL", "false")
        .env(
            "ISSUE_CHAT__GITHUB__TOKEN_FILE",
            home.path().join("token").display().to_string(),
        );
    cmd
}

fn issue_json(number: u64, title: &str, labels: &[&str]) -> Value {
    json!({
        "id": number * 100,
        "number": number,
        "title": title,
        "body": null,
        "state": "open",
        "comments": 0,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z",
        "user": {"login": "octocat", "id": 1, "avatar_url": ""},
        "labels": labels.iter().map(|l| json!({"name": l})).collect::<Vec<_>>(),
        "html_url": format!("https://github.com/octo/chat/issues/{}", number)
    })
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    issue_chat(&home, "http://127.0.0.1:1")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("rooms"))
        .stdout(predicate::str::contains("messages"))
        .stdout(predicate::str::contains("watch"));
}

#[test]
fn test_completions_need_no_configuration() {
    let home = TempDir::new().unwrap();
    issue_chat(&home, "not a url")
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("issue-chat"));
}

#[test]
fn test_missing_repository_is_configuration_error() {
    let home = TempDir::new().unwrap();
    issue_chat(&home, "http://127.0.0.1:1")
        .args(["rooms", "list"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("chat.repository"));
}

#[test]
fn test_send_without_login_fails_locally() {
    let home = TempDir::new().unwrap();
    issue_chat(&home, "http://127.0.0.1:1")
        .args(["--repo", "octo/chat", "messages", "send", "1", "hello"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Not logged in"));
}

#[tokio::test]
async fn test_rooms_list_filters_by_marker_label() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/chat/issues"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            issue_json(3, "General", &["chat"]),
            issue_json(2, "Bug report", &["bug"]),
            issue_json(1, "Random", &["Chat", "fun"]),
        ])))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let output = issue_chat(&home, &server.uri())
        .args(["--repo", "octo/chat", "--format", "json", "rooms", "list"])
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let rooms: Vec<Value> = serde_json::from_slice(&output.stdout).unwrap();
    let numbers: Vec<u64> = rooms.iter().map(|r| r["number"].as_u64().unwrap()).collect();
    assert_eq!(numbers, vec![3, 1]);
}

#[tokio::test]
async fn test_login_then_whoami() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header("Authorization", "Bearer ghp_cli"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "login": "octocat",
            "name": "The Octocat"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"full_name": "octo/chat"})))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    issue_chat(&home, &server.uri())
        .args(["--repo", "octo/chat", "login", "--token", "ghp_cli"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged in as octocat"));

    let stored = std::fs::read_to_string(home.path().join("token")).unwrap();
    assert_eq!(stored, "ghp_cli");

    issue_chat(&home, &server.uri())
        .args(["--repo", "octo/chat", "whoami"])
        .assert()
        .success()
        .stdout(predicate::str::contains("octocat (The Octocat)"))
        .stdout(predicate::str::contains("access to octo/chat: yes"));

    issue_chat(&home, &server.uri())
        .arg("logout")
        .assert()
        .success();
    assert!(!home.path().join("token").exists());
}

#[tokio::test]
async fn test_rejected_login_exits_with_api_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    issue_chat(&home, &server.uri())
        .args(["--repo", "octo/chat", "login", "--token", "ghp_bad"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("log in again"));
    assert!(!home.path().join("token").exists());
}

#[test]
fn test_logout_honours_json_format() {
    let home = TempDir::new().unwrap();
    std::fs::write(home.path().join("token"), "ghp_cli").unwrap();

    let output = issue_chat(&home, "http://127.0.0.1:1")
        .args(["--format", "json", "logout"])
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let body: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body, json!({"logged_out": true}));
    assert!(!home.path().join("token").exists());
}
