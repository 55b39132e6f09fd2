//! Chat domain records.
//!
//! Rooms are GitHub issues carrying the marker label and messages are the
//! comments on those issues. Records deserialize directly from the REST shapes;
//! the GraphQL path normalizes into the same types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ============================================================================
// Identifiers
// ============================================================================

/// User identifier used by GitHub API.
///
/// This numeric ID uniquely identifies a user and remains stable even if the
/// login changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(u64);

impl UserId {
    /// Create a new user ID.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw u64 value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issue number of a chat room within its repository.
///
/// # Examples
///
/// ```
/// use issue_chat_core::RoomNumber;
///
/// let room: RoomNumber = "42".parse().unwrap();
/// assert_eq!(room.as_u64(), 42);
/// assert_eq!(room.to_string(), "#42");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomNumber(u64);

impl RoomNumber {
    /// Create a new room number.
    pub fn new(number: u64) -> Self {
        Self(number)
    }

    /// Get the raw u64 value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RoomNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl FromStr for RoomNumber {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let number = s
            .trim_start_matches('#')
            .parse::<u64>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "room".to_string(),
                message: "must be a positive issue number".to_string(),
            })?;
        Ok(Self::new(number))
    }
}

/// Comment identifier of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommentId(u64);

impl CommentId {
    /// Create a new comment ID.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw u64 value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CommentId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>()
            .ok()
            .filter(|id| *id > 0)
            .map(Self::new)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "message_id".to_string(),
                message: "must be a positive integer".to_string(),
            })
    }
}

/// Repository holding the chat rooms, written `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRef {
    owner: String,
    name: String,
}

impl RepositoryRef {
    /// Create a repository reference.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Get repository owner name.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Get repository name without owner.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepositoryRef {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidFormat {
            field: "repository".to_string(),
            message: format!("expected 'owner/name', got '{}'", s),
        };

        let (owner, name) = s.split_once('/').ok_or_else(invalid)?;
        let owner = owner.trim();
        let name = name.trim();
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(invalid());
        }
        Ok(Self::new(owner, name))
    }
}

// ============================================================================
// Records
// ============================================================================

/// Authenticated GitHub user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub html_url: String,
}

/// Author of a room or message.
///
/// The GraphQL path cannot always supply a numeric id, so it is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub id: Option<UserId>,
    pub login: String,
    #[serde(default)]
    pub avatar_url: String,
}

/// Issue label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    /// Numeric label id; GraphQL responses do not carry one.
    #[serde(default)]
    pub id: Option<u64>,

    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// 6-digit hex color without the leading '#'
    #[serde(default)]
    pub color: String,
}

/// Issue state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomState {
    Open,
    Closed,
}

impl RoomState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for RoomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoomState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(ValidationError::InvalidFormat {
                field: "state".to_string(),
                message: format!("expected open or closed, got '{}'", other),
            }),
        }
    }
}

/// A chat room: an issue tagged with the marker label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRoom {
    /// Unique issue identifier
    pub id: u64,

    /// Issue number (repository-specific)
    pub number: RoomNumber,

    pub title: String,

    #[serde(default)]
    pub body: Option<String>,

    pub state: RoomState,

    /// Number of messages in the room
    #[serde(alias = "comments", default)]
    pub comment_count: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(alias = "user")]
    pub author: Author,

    #[serde(default)]
    pub labels: Vec<Label>,

    #[serde(default)]
    pub html_url: String,
}

impl ChatRoom {
    /// Whether the room carries the given label. GitHub label names are
    /// case-insensitive.
    pub fn has_label(&self, name: &str) -> bool {
        self.labels
            .iter()
            .any(|label| label.name.eq_ignore_ascii_case(name))
    }

    pub fn is_open(&self) -> bool {
        self.state == RoomState::Open
    }
}

/// A chat message: a comment on the room's issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: CommentId,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(alias = "user")]
    pub author: Author,

    #[serde(default)]
    pub html_url: String,
}

impl ChatMessage {
    /// A message counts as edited once its update time moves past creation.
    pub fn is_edited(&self) -> bool {
        self.updated_at != self.created_at
    }
}

/// Room detail together with its first page of messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomThread {
    pub room: ChatRoom,
    pub messages: Vec<ChatMessage>,
}

/// Whether the current user wrote a message.
///
/// `Unknown` is reported whenever either side lacks a user id, so callers can
/// hide edit affordances instead of guessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Ownership {
    Own,
    Other,
    Unknown,
}

impl Ownership {
    /// Compare a message author against the current user.
    ///
    /// # Examples
    ///
    /// ```
    /// use issue_chat_core::{Author, Ownership, UserId};
    ///
    /// let author = Author { id: None, login: "ghost".to_string(), avatar_url: String::new() };
    /// assert_eq!(Ownership::of(&author, Some(UserId::new(7))), Ownership::Unknown);
    /// ```
    pub fn of(author: &Author, current_user: Option<UserId>) -> Self {
        match (author.id, current_user) {
            (Some(author_id), Some(user_id)) if author_id == user_id => Self::Own,
            (Some(_), Some(_)) => Self::Other,
            _ => Self::Unknown,
        }
    }

    /// Only messages known to be the user's own may be edited or deleted.
    pub fn can_modify(&self) -> bool {
        matches!(self, Self::Own)
    }
}

// ============================================================================
// Queries and write requests
// ============================================================================

/// Which rooms to list by state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStateFilter {
    #[default]
    Open,
    Closed,
    All,
}

impl RoomStateFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::All => "all",
        }
    }
}

impl FromStr for RoomStateFilter {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            "all" => Ok(Self::All),
            other => Err(ValidationError::InvalidFormat {
                field: "state".to_string(),
                message: format!("expected open, closed or all, got '{}'", other),
            }),
        }
    }
}

/// Parameters for listing rooms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoomQuery {
    pub state: RoomStateFilter,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// Parameters for listing messages in a room.
///
/// A `since` cursor asks for incremental data and is never served from cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MessageQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl MessageQuery {
    /// Messages updated at or after `since`.
    pub fn since(since: DateTime<Utc>) -> Self {
        Self {
            since: Some(since),
            ..Self::default()
        }
    }
}

/// Request to open a new chat room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoom {
    pub title: String,
    pub body: Option<String>,
    /// Extra labels; the marker label is always added.
    pub labels: Vec<String>,
}

impl NewRoom {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: None,
            labels: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }
}

/// Changes to apply to an existing room. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    pub state: Option<RoomState>,
    /// Replacement label set; the marker label is kept regardless.
    pub labels: Option<Vec<String>>,
}

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;
