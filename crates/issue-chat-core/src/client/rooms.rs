//! Chat room operations: issues carrying the marker label.

use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument};

use super::cache::Operation;
use super::executor::with_query;
use super::fallback::FallbackChain;
use super::{graphql, ChatClient, MAX_BODY_LENGTH, MAX_TITLE_LENGTH};
use crate::credentials::Credential;
use crate::error::{ApiError, ChatError, ChatResult, ValidationError};
use crate::models::{
    ChatRoom, Label, MessageQuery, NewRoom, RoomNumber, RoomQuery, RoomState, RoomThread,
    RoomUpdate,
};

/// Color given to a newly created marker label.
pub const MARKER_LABEL_COLOR: &str = "0e8a16";

#[derive(Debug, Serialize)]
struct CreateIssueBody<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
    labels: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
struct UpdateIssueBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<RoomState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct CreateLabelBody<'a> {
    name: &'a str,
    color: &'a str,
    description: &'a str,
}

/// Parameters identifying a room list in the cache.
#[derive(Serialize)]
struct RoomListParams<'a> {
    label: &'a str,
    #[serde(flatten)]
    query: &'a RoomQuery,
}

/// Caller labels plus the marker label, added when absent and never removed.
pub(crate) fn with_marker_label(labels: &[String], marker: &str) -> Vec<String> {
    let mut result: Vec<String> = Vec::with_capacity(labels.len() + 1);
    for label in labels {
        let label = label.trim();
        if !label.is_empty() && !result.iter().any(|l| l.eq_ignore_ascii_case(label)) {
            result.push(label.to_string());
        }
    }
    if !result.iter().any(|l| l.eq_ignore_ascii_case(marker)) {
        result.push(marker.to_string());
    }
    result
}

pub(crate) fn validate_room_number(number: RoomNumber) -> Result<(), ValidationError> {
    if number.as_u64() == 0 {
        return Err(ValidationError::InvalidFormat {
            field: "room".to_string(),
            message: "must be a positive issue number".to_string(),
        });
    }
    Ok(())
}

pub(crate) fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::required("title"));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ValidationError::too_long("title", MAX_TITLE_LENGTH));
    }
    Ok(())
}

pub(crate) fn validate_body(body: &str) -> Result<(), ValidationError> {
    if body.chars().count() > MAX_BODY_LENGTH {
        return Err(ValidationError::too_long("body", MAX_BODY_LENGTH));
    }
    Ok(())
}

/// Keep chat rooms from an issue listing, in upstream order.
///
/// The issues endpoint also returns pull requests; those are never rooms.
pub(crate) fn rooms_from_issues(
    issues: Vec<Value>,
    marker: &str,
) -> Result<Vec<ChatRoom>, ApiError> {
    let mut rooms = Vec::with_capacity(issues.len());
    for issue in issues {
        if issue.get("pull_request").is_some_and(|pr| !pr.is_null()) {
            continue;
        }
        let room: ChatRoom = serde_json::from_value(issue)?;
        if room.has_label(marker) {
            rooms.push(room);
        }
    }
    Ok(rooms)
}

impl ChatClient {
    // ========================================================================
    // Reads
    // ========================================================================

    /// List chat rooms: issues carrying the marker label, in the order GitHub
    /// returns them.
    ///
    /// Cached for the room-list TTL.
    #[instrument(skip(self), fields(repository = %self.repository()))]
    pub async fn list_chat_rooms(&self, query: &RoomQuery) -> ChatResult<Vec<ChatRoom>> {
        let params = RoomListParams {
            label: self.marker_label(),
            query,
        };
        let key = self.cache_key(Operation::Rooms, None, &params);

        let client = self.clone();
        let query = query.clone();
        let rooms = self
            .read(key, true, async move { client.fetch_rooms(&query).await })
            .await?;
        Ok(rooms)
    }

    /// Get a single room by issue number.
    ///
    /// Tries GraphQL first when enabled and falls back to REST on any GraphQL
    /// failure. Cached for the room-detail TTL.
    ///
    /// # Errors
    ///
    /// Returns the REST error when both paths fail; a missing room is a 404
    /// `ApiError::HttpError`.
    #[instrument(skip(self), fields(repository = %self.repository()))]
    pub async fn get_chat_room(&self, number: RoomNumber) -> ChatResult<ChatRoom> {
        validate_room_number(number)?;
        let key = self.cache_key(Operation::Room, Some(number), &());

        let client = self.clone();
        let room = self
            .read(key, true, async move { client.fetch_room(number).await })
            .await?;
        Ok(room)
    }

    /// Get a room and its first page of messages in one round trip when
    /// GraphQL is available, or two REST calls otherwise.
    #[instrument(skip(self), fields(repository = %self.repository()))]
    pub async fn get_room_thread(&self, number: RoomNumber) -> ChatResult<RoomThread> {
        validate_room_number(number)?;
        let per_page = self.config().messages_per_page;
        let key = self.cache_key(Operation::RoomThread, Some(number), &per_page);

        let client = self.clone();
        let thread = self
            .read(key, true, async move {
                client.fetch_room_thread(number, per_page).await
            })
            .await?;
        Ok(thread)
    }

    /// Whether a room with this number exists.
    pub async fn room_exists(&self, number: RoomNumber) -> ChatResult<bool> {
        match self.get_chat_room(number).await {
            Ok(_) => Ok(true),
            Err(ChatError::Api(e)) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Open a new chat room. The marker label is always applied.
    #[instrument(skip(self, room), fields(repository = %self.repository()))]
    pub async fn create_chat_room(&self, room: &NewRoom) -> ChatResult<ChatRoom> {
        let token = self.require_token()?;
        validate_title(&room.title)?;
        if let Some(body) = &room.body {
            validate_body(body)?;
        }

        let request = CreateIssueBody {
            title: room.title.trim(),
            body: room.body.as_deref(),
            labels: with_marker_label(&room.labels, self.marker_label()),
        };
        let path = format!("{}/issues", self.repo_path());
        let created: ChatRoom = self.executor().post(&path, &request, Some(&token)).await?;

        self.invalidate(Operation::Rooms, None);
        info!(room = %created.number, "Created chat room");
        Ok(created)
    }

    /// Change a room's title, description, state or labels.
    ///
    /// A replacement label set always keeps the marker label.
    #[instrument(skip(self, update), fields(repository = %self.repository()))]
    pub async fn update_chat_room(
        &self,
        number: RoomNumber,
        update: &RoomUpdate,
    ) -> ChatResult<ChatRoom> {
        let token = self.require_token()?;
        validate_room_number(number)?;
        if let Some(title) = &update.title {
            validate_title(title)?;
        }
        if let Some(body) = &update.body {
            validate_body(body)?;
        }

        let request = UpdateIssueBody {
            title: update.title.as_deref().map(str::trim),
            body: update.body.as_deref(),
            state: update.state,
            labels: update
                .labels
                .as_ref()
                .map(|labels| with_marker_label(labels, self.marker_label())),
        };
        let path = format!("{}/issues/{}", self.repo_path(), number.as_u64());
        let updated: ChatRoom = self.executor().patch(&path, &request, Some(&token)).await?;

        self.invalidate(Operation::Rooms, None);
        self.invalidate(Operation::Room, Some(number));
        self.invalidate(Operation::RoomThread, Some(number));
        info!(room = %number, "Updated chat room");
        Ok(updated)
    }

    /// Close a room.
    pub async fn close_chat_room(&self, number: RoomNumber) -> ChatResult<ChatRoom> {
        let update = RoomUpdate {
            state: Some(RoomState::Closed),
            ..RoomUpdate::default()
        };
        self.update_chat_room(number, &update).await
    }

    /// Make sure the marker label exists in the repository, creating it when
    /// absent.
    #[instrument(skip(self), fields(repository = %self.repository()))]
    pub async fn ensure_marker_label(&self) -> ChatResult<Label> {
        let token = self.require_token()?;
        let marker = self.marker_label();
        let path = format!("{}/labels", self.repo_path());

        let labels: Vec<Label> = self
            .executor()
            .get(&with_query(&path, &[("per_page", "100".to_string())]), Some(&token))
            .await?;
        if let Some(existing) = labels
            .into_iter()
            .find(|label| label.name.eq_ignore_ascii_case(marker))
        {
            return Ok(existing);
        }

        let request = CreateLabelBody {
            name: marker,
            color: MARKER_LABEL_COLOR,
            description: "Chat room",
        };
        let created: Label = self.executor().post(&path, &request, Some(&token)).await?;
        info!(label = %created.name, "Created marker label");
        Ok(created)
    }

    // ========================================================================
    // Fetch strategies
    // ========================================================================

    async fn fetch_rooms(&self, query: &RoomQuery) -> Result<Vec<ChatRoom>, ApiError> {
        let mut pairs = vec![
            ("labels", self.marker_label().to_string()),
            ("state", query.state.as_str().to_string()),
        ];
        if let Some(per_page) = query.per_page {
            pairs.push(("per_page", per_page.to_string()));
        }
        if let Some(page) = query.page {
            pairs.push(("page", page.to_string()));
        }

        let path = with_query(&format!("{}/issues", self.repo_path()), &pairs);
        let token = self.token();
        let issues: Vec<Value> = self.executor().get(&path, token.as_ref()).await?;
        rooms_from_issues(issues, self.marker_label())
    }

    async fn fetch_room(&self, number: RoomNumber) -> Result<ChatRoom, ApiError> {
        let token = self.token();
        FallbackChain::new("get_chat_room")
            .then_if(self.config().prefer_graphql, "graphql", || {
                self.fetch_room_graphql(number, token.clone()).boxed()
            })
            .then("rest", self.fetch_room_rest(number, token.clone()).boxed())
            .run()
            .await
    }

    async fn fetch_room_graphql(
        &self,
        number: RoomNumber,
        token: Option<Credential>,
    ) -> Result<ChatRoom, ApiError> {
        let variables = graphql::room_variables(self.repository(), number);
        let data = self
            .executor()
            .graphql(&graphql::room_query(), &variables, token.as_ref())
            .await?;
        graphql::parse_room(data, number)
    }

    pub(crate) async fn fetch_room_rest(
        &self,
        number: RoomNumber,
        token: Option<Credential>,
    ) -> Result<ChatRoom, ApiError> {
        let path = format!("{}/issues/{}", self.repo_path(), number.as_u64());
        self.executor().get(&path, token.as_ref()).await
    }

    async fn fetch_room_thread(
        &self,
        number: RoomNumber,
        per_page: u32,
    ) -> Result<RoomThread, ApiError> {
        let token = self.token();
        FallbackChain::new("get_room_thread")
            .then_if(self.config().prefer_graphql, "graphql", || {
                let token = token.clone();
                async move {
                    let variables = graphql::thread_variables(self.repository(), number, per_page);
                    let data = self
                        .executor()
                        .graphql(&graphql::thread_query(), &variables, token.as_ref())
                        .await?;
                    graphql::parse_thread(data, number)
                }
                .boxed()
            })
            .then(
                "rest",
                async move {
                    let query = MessageQuery {
                        per_page: Some(per_page),
                        ..MessageQuery::default()
                    };
                    let (room, messages) = futures::try_join!(
                        self.fetch_room_rest(number, token.clone()),
                        self.fetch_messages_rest(number, &query, token.clone()),
                    )?;
                    Ok(RoomThread { room, messages })
                }
                .boxed(),
            )
            .run()
            .await
    }
}

#[cfg(test)]
#[path = "rooms_tests.rs"]
mod tests;
