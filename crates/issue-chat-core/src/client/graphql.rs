//! GraphQL queries for room reads and normalization into the REST record shapes.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::models::{
    Author, ChatMessage, ChatRoom, CommentId, Label, RepositoryRef, RoomNumber, RoomState,
    RoomThread, UserId,
};

const ISSUE_FIELDS: &str = r#"
      databaseId
      id
      number
      title
      body
      state
      createdAt
      updatedAt
      url
      author { login avatarUrl ... on User { databaseId } }
      labels(first: 20) { nodes { name color description } }"#;

const COMMENT_FIELDS: &str = r#"
          databaseId
          id
          body
          createdAt
          updatedAt
          url
          author { login avatarUrl ... on User { databaseId } }"#;

/// Query for a single room.
pub(crate) fn room_query() -> String {
    format!(
        r#"query ChatRoom($owner: String!, $name: String!, $number: Int!) {{
  repository(owner: $owner, name: $name) {{
    issue(number: $number) {{{fields}
      comments {{ totalCount }}
    }}
  }}
}}"#,
        fields = ISSUE_FIELDS
    )
}

/// Query for a room together with its first page of comments.
pub(crate) fn thread_query() -> String {
    format!(
        r#"query ChatRoomThread($owner: String!, $name: String!, $number: Int!, $perPage: Int!) {{
  repository(owner: $owner, name: $name) {{
    issue(number: $number) {{{fields}
      comments(first: $perPage) {{
        totalCount
        nodes {{{comment_fields}
        }}
      }}
    }}
  }}
}}"#,
        fields = ISSUE_FIELDS,
        comment_fields = COMMENT_FIELDS
    )
}

pub(crate) fn room_variables(repository: &RepositoryRef, number: RoomNumber) -> Value {
    json!({
        "owner": repository.owner(),
        "name": repository.name(),
        "number": number.as_u64(),
    })
}

pub(crate) fn thread_variables(
    repository: &RepositoryRef,
    number: RoomNumber,
    per_page: u32,
) -> Value {
    json!({
        "owner": repository.owner(),
        "name": repository.name(),
        "number": number.as_u64(),
        "perPage": per_page,
    })
}

// ============================================================================
// Response shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct Data {
    repository: Option<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
struct RepositoryNode {
    issue: Option<IssueNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueNode {
    database_id: Option<u64>,
    id: Option<String>,
    number: u64,
    title: String,
    body: Option<String>,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    url: String,
    author: Option<AuthorNode>,
    #[serde(default)]
    labels: Option<Connection<LabelNode>>,
    comments: CommentConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorNode {
    login: String,
    #[serde(default)]
    avatar_url: String,
    #[serde(default)]
    database_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LabelNode {
    name: String,
    #[serde(default)]
    color: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Connection<T> {
    #[serde(default = "Vec::new")]
    nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentConnection {
    total_count: u64,
    #[serde(default)]
    nodes: Vec<CommentNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentNode {
    database_id: Option<u64>,
    id: Option<String>,
    body: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    url: String,
    author: Option<AuthorNode>,
}

// ============================================================================
// Normalization
// ============================================================================

/// Numeric id for a node: `databaseId`, else a numeric node id, else a value
/// synthesized from the clock and the node's position so a batch never collides.
pub(crate) fn resolve_id(
    database_id: Option<u64>,
    node_id: Option<&str>,
    index: usize,
    now_millis: i64,
) -> u64 {
    database_id
        .or_else(|| node_id.and_then(|id| id.parse::<u64>().ok()))
        .unwrap_or_else(|| (now_millis.max(0) as u64) * 1000 + index as u64)
}

fn author_from(node: Option<AuthorNode>) -> Author {
    match node {
        Some(node) => Author {
            id: node.database_id.map(UserId::new),
            login: node.login,
            avatar_url: node.avatar_url,
        },
        // Deleted accounts come back as a null author.
        None => Author {
            id: None,
            login: "ghost".to_string(),
            avatar_url: String::new(),
        },
    }
}

fn state_from(state: &str) -> RoomState {
    if state.eq_ignore_ascii_case("closed") {
        RoomState::Closed
    } else {
        RoomState::Open
    }
}

fn issue_node(data: Value, number: RoomNumber) -> Result<IssueNode, ApiError> {
    let data: Data = serde_json::from_value(data)?;
    data.repository
        .and_then(|repository| repository.issue)
        .ok_or_else(|| ApiError::GraphQl {
            message: format!("Issue {} not found", number),
            not_found: true,
        })
}

fn room_from(node: IssueNode, now_millis: i64) -> (ChatRoom, Vec<CommentNode>) {
    let labels = node
        .labels
        .map(|connection| connection.nodes)
        .unwrap_or_default()
        .into_iter()
        .map(|label| Label {
            id: None,
            name: label.name,
            description: label.description,
            color: label.color,
        })
        .collect();

    let room = ChatRoom {
        id: resolve_id(node.database_id, node.id.as_deref(), 0, now_millis),
        number: RoomNumber::new(node.number),
        title: node.title,
        body: node.body,
        state: state_from(&node.state),
        comment_count: node.comments.total_count,
        created_at: node.created_at,
        updated_at: node.updated_at,
        author: author_from(node.author),
        labels,
        html_url: node.url,
    };

    (room, node.comments.nodes)
}

fn message_from(node: CommentNode, index: usize, now_millis: i64) -> ChatMessage {
    ChatMessage {
        id: CommentId::new(resolve_id(
            node.database_id,
            node.id.as_deref(),
            index,
            now_millis,
        )),
        body: node.body,
        created_at: node.created_at,
        updated_at: node.updated_at,
        author: author_from(node.author),
        html_url: node.url,
    }
}

/// Normalize the `data` of a room query.
pub(crate) fn parse_room(data: Value, number: RoomNumber) -> Result<ChatRoom, ApiError> {
    let node = issue_node(data, number)?;
    let (room, _) = room_from(node, Utc::now().timestamp_millis());
    Ok(room)
}

/// Normalize the `data` of a thread query.
pub(crate) fn parse_thread(data: Value, number: RoomNumber) -> Result<RoomThread, ApiError> {
    let node = issue_node(data, number)?;
    let now_millis = Utc::now().timestamp_millis();
    let (room, comments) = room_from(node, now_millis);
    let messages = comments
        .into_iter()
        .enumerate()
        .map(|(index, comment)| message_from(comment, index, now_millis))
        .collect();

    Ok(RoomThread { room, messages })
}

#[cfg(test)]
#[path = "graphql_tests.rs"]
mod tests;
