//! Tests for chat room operations.

use super::*;
use crate::client::ClientConfig;
use crate::models::RepositoryRef;
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, prefer_graphql: bool) -> ChatClient {
    ChatClient::builder()
        .config(
            ClientConfig::default()
                .with_api_url(server.uri())
                .with_repository(RepositoryRef::new("octo", "chat"))
                .with_prefer_graphql(prefer_graphql),
        )
        .token(Credential::new("ghp_test"))
        .build()
        .unwrap()
}

fn issue_json(number: u64, labels: &[&str]) -> Value {
    json!({
        "id": 1000 + number,
        "number": number,
        "title": format!("Room {}", number),
        "body": "Welcome",
        "state": "open",
        "comments": 2,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-02T00:00:00Z",
        "user": {"login": "octocat", "id": 1, "avatar_url": "https://avatars/1"},
        "labels": labels.iter().map(|name| json!({"id": 7, "name": name, "color": "0e8a16"})).collect::<Vec<_>>(),
        "html_url": format!("https://github.com/octo/chat/issues/{}", number)
    })
}

fn comment_json(id: u64, body: &str) -> Value {
    json!({
        "id": id,
        "body": body,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z",
        "user": {"login": "octocat", "id": 1, "avatar_url": ""},
        "html_url": format!("https://github.com/octo/chat/issues/42#issuecomment-{}", id)
    })
}

fn graphql_issue(number: u64) -> Value {
    json!({
        "data": {
            "repository": {
                "issue": {
                    "databaseId": 1000 + number,
                    "id": "I_kwDO",
                    "number": number,
                    "title": format!("Room {}", number),
                    "body": "Welcome",
                    "state": "OPEN",
                    "createdAt": "2024-01-01T00:00:00Z",
                    "updatedAt": "2024-01-02T00:00:00Z",
                    "url": format!("https://github.com/octo/chat/issues/{}", number),
                    "author": {"login": "octocat", "avatarUrl": "https://avatars/1", "databaseId": 1},
                    "labels": {"nodes": [{"name": "chat", "color": "0e8a16"}]},
                    "comments": {
                        "totalCount": 2,
                        "nodes": [
                            {
                                "databaseId": 1,
                                "id": "IC_1",
                                "body": "first",
                                "createdAt": "2024-01-01T00:00:00Z",
                                "updatedAt": "2024-01-01T00:00:00Z",
                                "url": "u1",
                                "author": {"login": "octocat", "avatarUrl": "", "databaseId": 1}
                            }
                        ]
                    }
                }
            }
        }
    })
}

mod labels {
    use super::*;

    /// Verify the marker label is appended once and caller labels are kept.
    #[test]
    fn test_with_marker_label() {
        assert_eq!(with_marker_label(&[], "chat"), vec!["chat".to_string()]);
        assert_eq!(
            with_marker_label(&["team".to_string(), "Chat".to_string()], "chat"),
            vec!["team".to_string(), "Chat".to_string()]
        );
        assert_eq!(
            with_marker_label(&["team".to_string(), "team".to_string(), " ".to_string()], "chat"),
            vec!["team".to_string(), "chat".to_string()]
        );
    }

    /// Verify the issue filter drops unlabeled issues and pull requests, keeping order.
    #[test]
    fn test_rooms_from_issues() {
        let mut pr = issue_json(3, &["chat"]);
        pr["pull_request"] = json!({"url": "https://api.github.com/repos/octo/chat/pulls/3"});

        let rooms = rooms_from_issues(
            vec![
                issue_json(5, &["chat"]),
                issue_json(4, &["bug"]),
                pr,
                issue_json(2, &["help", "chat"]),
            ],
            "chat",
        )
        .unwrap();

        let numbers: Vec<u64> = rooms.iter().map(|r| r.number.as_u64()).collect();
        assert_eq!(numbers, vec![5, 2]);
    }

    /// Verify title and body limits.
    #[test]
    fn test_room_validation() {
        assert!(validate_title("General").is_ok());
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"x".repeat(100)).is_ok());
        assert!(validate_title(&"x".repeat(101)).is_err());
        assert!(validate_body(&"y".repeat(1000)).is_ok());
        assert!(validate_body(&"y".repeat(1001)).is_err());
        assert!(validate_room_number(RoomNumber::new(0)).is_err());
    }
}

mod list {
    use super::*;

    /// Verify the list keeps only labeled rooms in upstream order.
    #[tokio::test]
    async fn test_list_filters_by_marker_label() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/chat/issues"))
            .and(query_param("labels", "chat"))
            .and(query_param("state", "open"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                issue_json(9, &["chat"]),
                issue_json(8, &["question"]),
                issue_json(7, &["chat", "team"]),
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server, true);
        let rooms = client.list_chat_rooms(&RoomQuery::default()).await.unwrap();

        let numbers: Vec<u64> = rooms.iter().map(|r| r.number.as_u64()).collect();
        assert_eq!(numbers, vec![9, 7]);
    }

    /// Verify a repeated list is served from cache.
    #[tokio::test]
    async fn test_list_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/chat/issues"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([issue_json(1, &["chat"])])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, true);
        client.list_chat_rooms(&RoomQuery::default()).await.unwrap();
        let second = client.list_chat_rooms(&RoomQuery::default()).await.unwrap();
        assert_eq!(second.len(), 1);
    }

    /// Verify creating a room invalidates the cached list.
    #[tokio::test]
    async fn test_create_invalidates_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/chat/issues"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([issue_json(1, &["chat"])])))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/octo/chat/issues"))
            .respond_with(ResponseTemplate::new(201).set_body_json(issue_json(2, &["chat"])))
            .mount(&server)
            .await;

        let client = client_for(&server, true);
        client.list_chat_rooms(&RoomQuery::default()).await.unwrap();
        client.create_chat_room(&NewRoom::new("Room 2")).await.unwrap();
        client.list_chat_rooms(&RoomQuery::default()).await.unwrap();
    }
}

mod get {
    use super::*;

    /// Verify the GraphQL path serves the room without touching REST.
    #[tokio::test]
    async fn test_get_room_via_graphql() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(graphql_issue(42)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/chat/issues/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(issue_json(42, &["chat"])))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, true);
        let room = client.get_chat_room(RoomNumber::new(42)).await.unwrap();

        assert_eq!(room.number, RoomNumber::new(42));
        assert_eq!(room.id, 1042);
        assert!(room.has_label("chat"));
    }

    /// Verify a GraphQL errors body falls back to REST with the same room shape.
    #[tokio::test]
    async fn test_graphql_errors_fall_back_to_rest() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [{"message": "Resource not accessible by integration"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/chat/issues/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(issue_json(42, &["chat"])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, true);
        let room = client.get_chat_room(RoomNumber::new(42)).await.unwrap();

        let expected: ChatRoom = serde_json::from_value(issue_json(42, &["chat"])).unwrap();
        assert_eq!(room, expected);
    }

    /// Verify disabling GraphQL sends only REST requests.
    #[tokio::test]
    async fn test_graphql_disabled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(graphql_issue(42)))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/chat/issues/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(issue_json(42, &["chat"])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, false);
        let room = client.get_chat_room(RoomNumber::new(42)).await.unwrap();
        assert_eq!(room.id, 1042);
    }

    /// Verify a REST 404 after GraphQL failure propagates and room_exists reports false.
    #[tokio::test]
    async fn test_missing_room() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"repository": {"issue": null}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/chat/issues/404"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, true);
        let err = client.get_chat_room(RoomNumber::new(404)).await.unwrap_err();
        assert!(err.as_api().is_some_and(ApiError::is_not_found));
        assert!(matches!(
            err,
            ChatError::Api(ApiError::HttpError { status: 404, .. })
        ));

        assert!(!client.room_exists(RoomNumber::new(404)).await.unwrap());
    }

    /// Verify the thread comes from one GraphQL call.
    #[tokio::test]
    async fn test_thread_via_graphql() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(graphql_issue(42)))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, true);
        let thread = client.get_room_thread(RoomNumber::new(42)).await.unwrap();

        assert_eq!(thread.room.number, RoomNumber::new(42));
        assert_eq!(thread.messages.len(), 1);
        assert_eq!(thread.messages[0].body, "first");
    }

    /// Verify the REST thread fetches room and messages.
    #[tokio::test]
    async fn test_thread_via_rest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/chat/issues/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(issue_json(42, &["chat"])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/chat/issues/42/comments"))
            .and(query_param("per_page", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                comment_json(1, "a"),
                comment_json(2, "b"),
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server, false);
        let thread = client.get_room_thread(RoomNumber::new(42)).await.unwrap();

        assert_eq!(thread.room.title, "Room 42");
        let bodies: Vec<&str> = thread.messages.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["a", "b"]);
    }
}

mod write {
    use super::*;

    /// Verify create sends the marker label alongside caller labels.
    #[tokio::test]
    async fn test_create_adds_marker_label() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/octo/chat/issues"))
            .and(body_json(json!({
                "title": "General",
                "body": "Say hi",
                "labels": ["team", "chat"]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(issue_json(10, &["team", "chat"])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, true);
        let room = client
            .create_chat_room(&NewRoom::new("General").with_body("Say hi").with_label("team"))
            .await
            .unwrap();
        assert_eq!(room.number, RoomNumber::new(10));
    }

    /// Verify creating without a token fails before any request.
    #[tokio::test]
    async fn test_create_requires_token() {
        let server = MockServer::start().await;
        let client = client_for(&server, true);
        client.set_token(None);

        let err = client
            .create_chat_room(&NewRoom::new("General"))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    /// Verify an over-long title is rejected locally.
    #[tokio::test]
    async fn test_create_rejects_long_title() {
        let server = MockServer::start().await;
        let client = client_for(&server, true);

        let err = client
            .create_chat_room(&NewRoom::new("x".repeat(101)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChatError::Validation(ValidationError::OutOfRange { .. })
        ));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    /// Verify an update with a label set keeps the marker label, and one
    /// without leaves labels untouched.
    #[tokio::test]
    async fn test_update_label_handling() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/repos/octo/chat/issues/5"))
            .and(body_json(json!({"labels": ["team", "chat"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(issue_json(5, &["team", "chat"])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/repos/octo/chat/issues/5"))
            .and(body_json(json!({"title": "Renamed"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(issue_json(5, &["chat"])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, true);
        client
            .update_chat_room(
                RoomNumber::new(5),
                &RoomUpdate {
                    labels: Some(vec!["team".to_string()]),
                    ..RoomUpdate::default()
                },
            )
            .await
            .unwrap();
        client
            .update_chat_room(
                RoomNumber::new(5),
                &RoomUpdate {
                    title: Some("Renamed".to_string()),
                    ..RoomUpdate::default()
                },
            )
            .await
            .unwrap();
    }

    /// Verify close sends the closed state and invalidates the cached room.
    #[tokio::test]
    async fn test_close_invalidates_room() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/chat/issues/5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(issue_json(5, &["chat"])))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/repos/octo/chat/issues/5"))
            .and(body_json(json!({"state": "closed"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(issue_json(5, &["chat"])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, false);
        client.get_chat_room(RoomNumber::new(5)).await.unwrap();
        client.get_chat_room(RoomNumber::new(5)).await.unwrap();
        client.close_chat_room(RoomNumber::new(5)).await.unwrap();
        client.get_chat_room(RoomNumber::new(5)).await.unwrap();
    }

    /// Verify an existing marker label is reused.
    #[tokio::test]
    async fn test_ensure_marker_label_existing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/chat/labels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "name": "bug", "color": "d73a4a"},
                {"id": 2, "name": "Chat", "color": "0e8a16"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/octo/chat/labels"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, true);
        let label = client.ensure_marker_label().await.unwrap();
        assert_eq!(label.id, Some(2));
    }

    /// Verify a missing marker label is created with the chat color.
    #[tokio::test]
    async fn test_ensure_marker_label_creates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/chat/labels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/octo/chat/labels"))
            .and(body_json(json!({
                "name": "chat",
                "color": "0e8a16",
                "description": "Chat room"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 3, "name": "chat", "color": "0e8a16", "description": "Chat room"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, true);
        let label = client.ensure_marker_label().await.unwrap();
        assert_eq!(label.name, "chat");
    }
}
