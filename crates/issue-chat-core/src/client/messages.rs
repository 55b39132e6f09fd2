//! Chat message operations: comments on a room's issue.

use serde::Serialize;
use tracing::{info, instrument};

use super::cache::Operation;
use super::executor::with_query;
use super::rooms::validate_room_number;
use super::ChatClient;
use crate::credentials::Credential;
use crate::error::{ApiError, ChatResult, ValidationError};
use crate::models::{ChatMessage, CommentId, MessageQuery, RoomNumber};

/// Largest comment body GitHub accepts.
pub const MAX_MESSAGE_LENGTH: usize = 65_536;

#[derive(Debug, Serialize)]
struct CommentBody<'a> {
    body: &'a str,
}

pub(crate) fn validate_content(content: &str) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::required("content"));
    }
    if content.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(ValidationError::too_long("content", MAX_MESSAGE_LENGTH));
    }
    Ok(())
}

impl ChatClient {
    /// List messages in a room, oldest first.
    ///
    /// Unset page size falls back to the configured default. Queries with a
    /// `since` cursor always go to the network; other queries are cached for
    /// the message-list TTL.
    #[instrument(skip(self), fields(repository = %self.repository()))]
    pub async fn list_messages(
        &self,
        number: RoomNumber,
        query: &MessageQuery,
    ) -> ChatResult<Vec<ChatMessage>> {
        validate_room_number(number)?;

        let query = MessageQuery {
            per_page: Some(query.per_page.unwrap_or(self.config().messages_per_page)),
            ..query.clone()
        };
        let cacheable = query.since.is_none();
        let key = self.cache_key(Operation::Messages, Some(number), &query);

        let client = self.clone();
        let messages = self
            .read(key, cacheable, async move {
                let token = client.token();
                client.fetch_messages_rest(number, &query, token).await
            })
            .await?;
        Ok(messages)
    }

    /// Post a message to a room.
    ///
    /// # Errors
    ///
    /// Fails with a validation error, before any request is sent, when no
    /// token is set or the content is blank.
    #[instrument(skip(self, content), fields(repository = %self.repository()))]
    pub async fn send_message(
        &self,
        number: RoomNumber,
        content: &str,
    ) -> ChatResult<ChatMessage> {
        let token = self.require_token()?;
        validate_room_number(number)?;
        validate_content(content)?;

        let path = format!("{}/issues/{}/comments", self.repo_path(), number.as_u64());
        let message: ChatMessage = self
            .executor()
            .post(&path, &CommentBody { body: content }, Some(&token))
            .await?;

        self.invalidate(Operation::Messages, Some(number));
        self.invalidate(Operation::RoomThread, Some(number));
        info!(room = %number, message = %message.id, "Sent message");
        Ok(message)
    }

    /// Replace a message's content.
    ///
    /// The owning room is unknown from the comment id alone, so message lists
    /// of every room are invalidated.
    #[instrument(skip(self, content), fields(repository = %self.repository()))]
    pub async fn edit_message(&self, id: CommentId, content: &str) -> ChatResult<ChatMessage> {
        let token = self.require_token()?;
        validate_content(content)?;

        let path = format!("{}/issues/comments/{}", self.repo_path(), id.as_u64());
        let message: ChatMessage = self
            .executor()
            .patch(&path, &CommentBody { body: content }, Some(&token))
            .await?;

        self.invalidate(Operation::Messages, None);
        self.invalidate(Operation::RoomThread, None);
        info!(message = %id, "Edited message");
        Ok(message)
    }

    /// Delete a message. Message lists of every room are invalidated.
    #[instrument(skip(self), fields(repository = %self.repository()))]
    pub async fn delete_message(&self, id: CommentId) -> ChatResult<()> {
        let token = self.require_token()?;

        let path = format!("{}/issues/comments/{}", self.repo_path(), id.as_u64());
        self.executor().delete(&path, Some(&token)).await?;

        self.invalidate(Operation::Messages, None);
        self.invalidate(Operation::RoomThread, None);
        info!(message = %id, "Deleted message");
        Ok(())
    }

    pub(crate) async fn fetch_messages_rest(
        &self,
        number: RoomNumber,
        query: &MessageQuery,
        token: Option<Credential>,
    ) -> Result<Vec<ChatMessage>, ApiError> {
        let mut pairs = Vec::new();
        if let Some(per_page) = query.per_page {
            pairs.push(("per_page", per_page.to_string()));
        }
        if let Some(page) = query.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(since) = query.since {
            pairs.push((
                "since",
                since.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            ));
        }

        let path = with_query(
            &format!("{}/issues/{}/comments", self.repo_path(), number.as_u64()),
            &pairs,
        );
        self.executor().get(&path, token.as_ref()).await
    }
}

#[cfg(test)]
#[path = "messages_tests.rs"]
mod tests;
