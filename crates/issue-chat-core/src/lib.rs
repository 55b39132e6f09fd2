//! # Issue Chat Core
//!
//! Chat rooms and messages backed by the issues and comments of a GitHub
//! repository.
//!
//! An issue carrying the marker label (`chat` by default) is a chat room; its
//! comments are the messages. [`ChatClient`] performs the reads and writes:
//!
//! - reads are cached per operation with a time-to-live,
//! - concurrent identical reads share one network call,
//! - room reads try GraphQL first and fall back to REST,
//! - writes invalidate the cached reads they affect.
//!
//! [`ChatSession`] adds the credential lifecycle on top, plus a debounced
//! refresh and a background poller that publish a live message feed.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use issue_chat_core::{
//!     ChatClient, ChatSession, ClientConfig, FileTokenStore, RepositoryRef, RoomNumber,
//!     SessionConfig,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ChatClient::builder()
//!     .config(ClientConfig::default().with_repository(RepositoryRef::new("octo", "chat")))
//!     .build()?;
//! let store = Arc::new(FileTokenStore::default_location()?);
//!
//! let session = ChatSession::restore(client, store, SessionConfig::default()).await?;
//! let mut feed = session.subscribe();
//! session.load_messages(RoomNumber::new(42)).await?;
//! session.start_realtime_updates(RoomNumber::new(42));
//!
//! while feed.changed().await.is_ok() {
//!     for message in &feed.borrow().messages {
//!         println!("{}: {}", message.author.login, message.body);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod credentials;
pub mod error;
pub mod models;
pub mod schedule;
pub mod session;

pub use client::{ChatClient, ChatClientBuilder, ClientConfig, ClientConfigBuilder};
pub use credentials::{Credential, FileTokenStore, MemoryTokenStore, TokenStore};
pub use error::{ApiError, ChatError, ChatResult, StorageError, ValidationError};
pub use models::{
    Author, ChatMessage, ChatRoom, CommentId, Label, MessageQuery, NewRoom, Ownership,
    RepositoryRef, RoomNumber, RoomQuery, RoomState, RoomStateFilter, RoomThread, RoomUpdate,
    User, UserId,
};
pub use session::{ChatSession, MessageFeed, SessionConfig};
