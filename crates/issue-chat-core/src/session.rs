//! Signed-in chat session: credential lifecycle, the current user, and a live
//! message feed for one room.
//!
//! A [`ChatSession`] wraps a [`ChatClient`] and a [`TokenStore`]. The stored
//! token is the only persisted state; the current user is fetched from it on
//! [`ChatSession::restore`]. Message lists are published through a
//! `tokio::sync::watch` channel so any number of views can follow the feed.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::client::{ChatClient, Operation};
use crate::credentials::{Credential, TokenStore};
use crate::error::{ChatError, ChatResult};
use crate::models::{ChatMessage, CommentId, MessageQuery, Ownership, RoomNumber, User};
use crate::schedule::{Debouncer, Poller};

/// Timer settings for a chat session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Interval between background message polls
    pub poll_interval: Duration,
    /// Quiet period before a requested refresh runs
    pub refresh_debounce: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            refresh_debounce: Duration::from_millis(300),
        }
    }
}

impl SessionConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_refresh_debounce(mut self, delay: Duration) -> Self {
        self.refresh_debounce = delay;
        self
    }
}

// ============================================================================
// Message feed
// ============================================================================

/// Latest known messages of the room being followed.
#[derive(Debug, Clone, Default)]
pub struct MessageFeed {
    /// Room the messages belong to; `None` before anything was loaded
    pub room: Option<RoomNumber>,
    /// Messages ordered by creation time
    pub messages: Vec<ChatMessage>,
    /// Failure of the most recent fetch, cleared by the next success
    pub last_error: Option<ChatError>,
}

impl MessageFeed {
    /// Replace the feed with a full message list for `room`.
    pub fn replace(&mut self, room: RoomNumber, mut messages: Vec<ChatMessage>) {
        messages.sort_by_key(|m| m.created_at);
        self.room = Some(room);
        self.messages = messages;
        self.last_error = None;
    }

    /// Insert or update messages by id, keeping creation order.
    ///
    /// Returns `true` if anything changed.
    pub fn merge(&mut self, incoming: Vec<ChatMessage>) -> bool {
        let mut changed = self.last_error.take().is_some();
        for message in incoming {
            match self.messages.iter_mut().find(|m| m.id == message.id) {
                Some(existing) if *existing == message => {}
                Some(existing) => {
                    *existing = message;
                    changed = true;
                }
                None => {
                    self.messages.push(message);
                    changed = true;
                }
            }
        }
        if changed {
            self.messages.sort_by_key(|m| m.created_at);
        }
        changed
    }

    /// Drop a message by id. Returns `true` if it was present.
    pub fn remove(&mut self, id: CommentId) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| m.id != id);
        self.messages.len() != before
    }

    /// Most recent update time across the feed, used as the poll cursor.
    pub fn latest_update(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.messages.iter().map(|m| m.updated_at).max()
    }

    pub fn is_for(&self, room: RoomNumber) -> bool {
        self.room == Some(room)
    }
}

type FeedSender = Arc<watch::Sender<MessageFeed>>;

// ============================================================================
// Session
// ============================================================================

/// A chat session bound to one client and one credential store.
pub struct ChatSession {
    client: ChatClient,
    store: Arc<dyn TokenStore>,
    config: SessionConfig,
    current_user: RwLock<Option<User>>,
    feed: FeedSender,
    poller: Poller,
    polled_room: Mutex<Option<RoomNumber>>,
    debouncer: Debouncer,
}

impl ChatSession {
    /// Create a signed-out session.
    pub fn new(client: ChatClient, store: Arc<dyn TokenStore>, config: SessionConfig) -> Self {
        let (feed, _) = watch::channel(MessageFeed::default());
        Self {
            poller: Poller::new(config.poll_interval),
            debouncer: Debouncer::new(config.refresh_debounce),
            client,
            store,
            config,
            current_user: RwLock::new(None),
            feed: Arc::new(feed),
            polled_room: Mutex::new(None),
        }
    }

    /// Create a session and sign in with the stored credential, if any.
    ///
    /// A stored credential that GitHub rejects with 401 is deleted. Any other
    /// failure leaves it in place and the session signed out of user details,
    /// so a flaky network does not log the user out.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Storage` if the store cannot be read or cleared.
    #[instrument(skip_all, fields(repository = %client.repository()))]
    pub async fn restore(
        client: ChatClient,
        store: Arc<dyn TokenStore>,
        config: SessionConfig,
    ) -> ChatResult<Self> {
        let session = Self::new(client, store, config);

        let Some(token) = session.store.load().await? else {
            debug!("No stored credential");
            return Ok(session);
        };

        session.client.set_token(Some(token));
        match session.client.get_current_user().await {
            Ok(user) => {
                info!(user = %user.login, "Restored session");
                session.set_current_user(Some(user));
            }
            Err(ChatError::Api(e)) if e.status() == Some(401) => {
                warn!("Stored credential was rejected; removing it");
                session.client.set_token(None);
                session.store.clear().await?;
            }
            Err(e) => {
                warn!(error = %e, "Could not verify stored credential");
            }
        }

        Ok(session)
    }

    pub fn client(&self) -> &ChatClient {
        &self.client
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Credential lifecycle
    // ------------------------------------------------------------------------

    /// Sign in with a token.
    ///
    /// The token is checked against `GET /user` before it is stored. On
    /// failure the previous credential stays in effect.
    #[instrument(skip_all, fields(repository = %self.client.repository()))]
    pub async fn login(&self, credential: Credential) -> ChatResult<User> {
        credential.validate()?;

        let previous = self.client.token();
        self.client.set_token(Some(credential.clone()));
        self.client.clear_cache();

        let result = async {
            let user = self.client.get_current_user().await?;
            self.store.save(&credential).await?;
            Ok::<_, ChatError>(user)
        }
        .await;

        match result {
            Ok(user) => {
                info!(user = %user.login, "Logged in");
                self.set_current_user(Some(user.clone()));
                Ok(user)
            }
            Err(e) => {
                warn!(error = %e, "Login failed");
                self.client.set_token(previous);
                Err(e)
            }
        }
    }

    /// Sign out: stop timers, forget the user, and delete the stored token.
    #[instrument(skip_all, fields(repository = %self.client.repository()))]
    pub async fn logout(&self) -> ChatResult<()> {
        self.dispose();
        self.client.set_token(None);
        self.client.clear_cache();
        self.set_current_user(None);
        self.feed.send_replace(MessageFeed::default());
        self.store.clear().await?;
        info!("Logged out");
        Ok(())
    }

    pub fn current_user(&self) -> Option<User> {
        self.current_user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Whether the signed-in user wrote `message`.
    pub fn ownership(&self, message: &ChatMessage) -> Ownership {
        let user_id = self
            .current_user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|u| u.id);
        Ownership::of(&message.author, user_id)
    }

    fn set_current_user(&self, user: Option<User>) {
        *self
            .current_user
            .write()
            .unwrap_or_else(PoisonError::into_inner) = user;
    }

    // ------------------------------------------------------------------------
    // Message feed
    // ------------------------------------------------------------------------

    /// Follow the message feed.
    pub fn subscribe(&self) -> watch::Receiver<MessageFeed> {
        self.feed.subscribe()
    }

    /// Snapshot of the current feed.
    pub fn feed(&self) -> MessageFeed {
        self.feed.borrow().clone()
    }

    /// Fetch a room's messages now and publish them.
    #[instrument(skip(self), fields(repository = %self.client.repository()))]
    pub async fn load_messages(&self, room: RoomNumber) -> ChatResult<Vec<ChatMessage>> {
        fetch_and_publish(&self.client, &self.feed, room).await
    }

    /// Ask for a fresh copy of a room's messages.
    ///
    /// Requests within the debounce window collapse into one fetch for the
    /// most recently requested room. The room's cached list is bypassed.
    pub fn refresh_messages(&self, room: RoomNumber) {
        let client = self.client.clone();
        let feed = Arc::clone(&self.feed);
        self.debouncer.schedule(async move {
            client.invalidate(Operation::Messages, Some(room));
            let _ = fetch_and_publish(&client, &feed, room).await;
        });
    }

    /// Post a message and add it to the feed if it shows that room.
    #[instrument(skip(self, content), fields(repository = %self.client.repository()))]
    pub async fn send_message(&self, room: RoomNumber, content: &str) -> ChatResult<ChatMessage> {
        let message = self.client.send_message(room, content).await?;
        let sent = message.clone();
        self.feed.send_if_modified(|feed| feed.is_for(room) && feed.merge(vec![sent]));
        Ok(message)
    }

    /// Edit a message and update it in the feed.
    #[instrument(skip(self, content), fields(repository = %self.client.repository()))]
    pub async fn edit_message(&self, id: CommentId, content: &str) -> ChatResult<ChatMessage> {
        let message = self.client.edit_message(id, content).await?;
        let edited = message.clone();
        self.feed.send_if_modified(|feed| {
            feed.messages.iter().any(|m| m.id == id) && feed.merge(vec![edited])
        });
        Ok(message)
    }

    /// Delete a message and drop it from the feed.
    #[instrument(skip(self), fields(repository = %self.client.repository()))]
    pub async fn delete_message(&self, id: CommentId) -> ChatResult<()> {
        self.client.delete_message(id).await?;
        self.feed.send_if_modified(|feed| feed.remove(id));
        Ok(())
    }

    /// Poll a room for new and edited messages in the background.
    ///
    /// Each poll asks only for messages updated since the newest one in the
    /// feed and merges them in. Deletions by other users show up on the next
    /// full load. Returns `false` if that room is already being polled;
    /// polling a different room replaces the previous one.
    pub fn start_realtime_updates(&self, room: RoomNumber) -> bool {
        let mut polled_room = self
            .polled_room
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if self.poller.is_running() {
            if *polled_room == Some(room) {
                return false;
            }
            self.poller.stop();
        }

        let client = self.client.clone();
        let feed = Arc::clone(&self.feed);
        let started = self.poller.start(move || {
            let client = client.clone();
            let feed = Arc::clone(&feed);
            async move { poll_once(&client, &feed, room).await }
        });

        if started {
            info!(room = %room, interval = ?self.config.poll_interval, "Started realtime updates");
            *polled_room = Some(room);
        }
        started
    }

    pub fn stop_realtime_updates(&self) {
        if self.poller.stop() {
            info!("Stopped realtime updates");
        }
        *self
            .polled_room
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    /// Stop background polling and drop any pending refresh.
    pub fn dispose(&self) {
        self.stop_realtime_updates();
        self.debouncer.cancel();
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("client", &self.client)
            .field("config", &self.config)
            .field("authenticated", &self.is_authenticated())
            .field("poller", &self.poller)
            .field("debouncer", &self.debouncer)
            .finish()
    }
}

async fn fetch_and_publish(
    client: &ChatClient,
    feed: &FeedSender,
    room: RoomNumber,
) -> ChatResult<Vec<ChatMessage>> {
    match client.list_messages(room, &MessageQuery::default()).await {
        Ok(messages) => {
            debug!(room = %room, count = messages.len(), "Publishing messages");
            feed.send_modify(|f| f.replace(room, messages.clone()));
            Ok(messages)
        }
        Err(e) => {
            warn!(room = %room, error = %e, "Failed to load messages");
            let error = e.clone();
            feed.send_modify(|f| {
                if !f.is_for(room) {
                    f.room = Some(room);
                    f.messages.clear();
                }
                f.last_error = Some(error);
            });
            Err(e)
        }
    }
}

async fn poll_once(client: &ChatClient, feed: &FeedSender, room: RoomNumber) {
    let since = {
        let current = feed.borrow();
        if current.is_for(room) {
            current.latest_update()
        } else {
            None
        }
    };

    let Some(since) = since else {
        client.invalidate(Operation::Messages, Some(room));
        let _ = fetch_and_publish(client, feed, room).await;
        return;
    };

    match client.list_messages(room, &MessageQuery::since(since)).await {
        Ok(messages) => {
            feed.send_if_modified(|f| f.is_for(room) && f.merge(messages));
        }
        Err(e) => {
            warn!(room = %room, error = %e, "Message poll failed");
            feed.send_modify(|f| f.last_error = Some(e));
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
