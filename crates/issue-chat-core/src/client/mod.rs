//! GitHub data client for chat rooms and messages.
//!
//! [`ChatClient`] owns the response cache and the in-flight registry; clones
//! share both. Reads go cache, then in-flight registry, then network. Writes
//! go straight to the network and invalidate the cached reads they affect.

mod cache;
mod executor;
mod fallback;
mod graphql;
mod inflight;
mod messages;
mod rooms;
mod user;

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tracing::debug;

use crate::credentials::Credential;
use crate::error::{ApiError, ValidationError};
use crate::models::{RepositoryRef, RoomNumber};

pub use cache::{
    CacheKey, CacheTtlPolicy, Epoch, Operation, Payload, PayloadKind, ResponseCache,
};
pub use executor::RequestExecutor;
pub use fallback::{FallbackChain, Strategy};
pub use inflight::InFlightRegistry;

/// Default GitHub REST API base URL.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Default label marking an issue as a chat room.
pub const DEFAULT_MARKER_LABEL: &str = "chat";

/// Maximum room title length in characters.
pub const MAX_TITLE_LENGTH: usize = 100;

/// Maximum room description length in characters.
pub const MAX_BODY_LENGTH: usize = 1000;

/// Configuration for chat client behavior.
///
/// # Examples
///
/// ```
/// use issue_chat_core::client::ClientConfig;
/// use issue_chat_core::RepositoryRef;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_repository(RepositoryRef::new("octo", "chat"))
///     .with_timeout(Duration::from_secs(10))
///     .with_prefer_graphql(false);
///
/// assert_eq!(config.graphql_endpoint(), "https://api.github.com/graphql");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// GitHub REST API base URL
    pub api_url: String,
    /// GraphQL endpoint; derived from `api_url` when unset
    pub graphql_url: Option<String>,
    /// User agent string for API requests (required by GitHub)
    pub user_agent: String,
    /// Request timeout duration
    pub timeout: Duration,
    /// Repository whose issues are the chat rooms
    pub repository: Option<RepositoryRef>,
    /// Label that designates an issue as a chat room
    pub marker_label: String,
    /// Try GraphQL before REST for room reads
    pub prefer_graphql: bool,
    /// Page size for message lists
    pub messages_per_page: u32,
    /// Cache lifetimes per read family
    pub cache_ttl: CacheTtlPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            graphql_url: None,
            user_agent: format!("issue-chat/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(30),
            repository: None,
            marker_label: DEFAULT_MARKER_LABEL.to_string(),
            prefer_graphql: true,
            messages_per_page: 100,
            cache_ttl: CacheTtlPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Create a new builder for client configuration.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// GraphQL endpoint in effect.
    pub fn graphql_endpoint(&self) -> String {
        self.graphql_url
            .clone()
            .unwrap_or_else(|| format!("{}/graphql", self.api_url.trim_end_matches('/')))
    }

    /// Set the GitHub API base URL.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Set the GraphQL endpoint.
    pub fn with_graphql_url(mut self, url: impl Into<String>) -> Self {
        self.graphql_url = Some(url.into());
        self
    }

    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the chat repository.
    pub fn with_repository(mut self, repository: RepositoryRef) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Set the marker label.
    pub fn with_marker_label(mut self, label: impl Into<String>) -> Self {
        self.marker_label = label.into();
        self
    }

    /// Enable or disable the GraphQL read path.
    pub fn with_prefer_graphql(mut self, prefer: bool) -> Self {
        self.prefer_graphql = prefer;
        self
    }

    /// Set the message page size.
    pub fn with_messages_per_page(mut self, per_page: u32) -> Self {
        self.messages_per_page = per_page;
        self
    }

    /// Set the cache lifetimes.
    pub fn with_cache_ttl(mut self, cache_ttl: CacheTtlPolicy) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    fn validate(&self) -> Result<RepositoryRef, ApiError> {
        let repository = self
            .repository
            .clone()
            .ok_or_else(|| ApiError::Configuration {
                message: "No chat repository configured".to_string(),
            })?;

        url::Url::parse(&self.api_url).map_err(|e| ApiError::Configuration {
            message: format!("Invalid API URL '{}': {}", self.api_url, e),
        })?;

        if self.marker_label.trim().is_empty() {
            return Err(ApiError::Configuration {
                message: "Marker label must not be empty".to_string(),
            });
        }

        if !(1..=100).contains(&self.messages_per_page) {
            return Err(ApiError::Configuration {
                message: format!(
                    "messages_per_page must be between 1 and 100, got {}",
                    self.messages_per_page
                ),
            });
        }

        Ok(repository)
    }
}

/// Builder for constructing `ClientConfig` instances.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new configuration builder with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the GitHub API base URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    /// Set the GraphQL endpoint.
    pub fn graphql_url(mut self, url: impl Into<String>) -> Self {
        self.config.graphql_url = Some(url.into());
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the chat repository.
    pub fn repository(mut self, repository: RepositoryRef) -> Self {
        self.config.repository = Some(repository);
        self
    }

    /// Set the marker label.
    pub fn marker_label(mut self, label: impl Into<String>) -> Self {
        self.config.marker_label = label.into();
        self
    }

    /// Enable or disable the GraphQL read path.
    pub fn prefer_graphql(mut self, prefer: bool) -> Self {
        self.config.prefer_graphql = prefer;
        self
    }

    /// Set the message page size.
    pub fn messages_per_page(mut self, per_page: u32) -> Self {
        self.config.messages_per_page = per_page;
        self
    }

    /// Set the cache lifetimes.
    pub fn cache_ttl(mut self, cache_ttl: CacheTtlPolicy) -> Self {
        self.config.cache_ttl = cache_ttl;
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

// ============================================================================
// Client
// ============================================================================

struct ClientInner {
    config: ClientConfig,
    repository: RepositoryRef,
    executor: RequestExecutor,
    cache: ResponseCache,
    in_flight: InFlightRegistry,
    token: RwLock<Option<Credential>>,
}

/// Chat client over a GitHub repository's issues and comments.
///
/// # Examples
///
/// ```no_run
/// # use issue_chat_core::client::{ChatClient, ClientConfig};
/// # use issue_chat_core::{Credential, RepositoryRef, RoomNumber};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ChatClient::builder()
///     .config(ClientConfig::default().with_repository(RepositoryRef::new("octo", "chat")))
///     .token(Credential::new("ghp_example"))
///     .build()?;
///
/// let room = client.get_chat_room(RoomNumber::new(42)).await?;
/// client.send_message(room.number, "hello").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<ClientInner>,
}

impl ChatClient {
    /// Create a new builder for constructing a chat client.
    pub fn builder() -> ChatClientBuilder {
        ChatClientBuilder::new()
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Repository holding the chat rooms.
    pub fn repository(&self) -> &RepositoryRef {
        &self.inner.repository
    }

    /// Label that marks an issue as a chat room.
    pub fn marker_label(&self) -> &str {
        &self.inner.config.marker_label
    }

    /// Response cache shared by all clones.
    pub fn cache(&self) -> &ResponseCache {
        &self.inner.cache
    }

    /// Number of reads currently waiting on the network.
    pub fn pending_requests(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// Current credential, if any.
    pub fn token(&self) -> Option<Credential> {
        self.inner
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the credential used for subsequent requests.
    ///
    /// The cached current user belongs to the old credential and is dropped.
    pub fn set_token(&self, token: Option<Credential>) {
        *self
            .inner
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token.filter(|t| !t.is_blank());
        self.invalidate(Operation::CurrentUser, None);
    }

    /// Whether a credential is set.
    pub fn has_token(&self) -> bool {
        self.token().is_some()
    }

    /// Drop every cached response and detach every pending read.
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
        self.inner.in_flight.forget_where(|_| true);
    }

    pub(crate) fn executor(&self) -> &RequestExecutor {
        &self.inner.executor
    }

    /// Token required for writes; checked before any network call.
    pub(crate) fn require_token(&self) -> Result<Credential, ValidationError> {
        self.token().ok_or_else(|| ValidationError::required("token"))
    }

    pub(crate) fn repo_path(&self) -> String {
        format!(
            "/repos/{}/{}",
            self.inner.repository.owner(),
            self.inner.repository.name()
        )
    }

    pub(crate) fn cache_key<P: serde::Serialize + ?Sized>(
        &self,
        operation: Operation,
        room: Option<RoomNumber>,
        params: &P,
    ) -> CacheKey {
        CacheKey::new(operation, &self.inner.repository, room, params)
    }

    /// Drop a read family from the cache and detach its pending reads, so
    /// the next read of that family goes to the network.
    pub(crate) fn invalidate(&self, operation: Operation, room: Option<RoomNumber>) {
        self.inner.cache.invalidate(operation, room);
        self.inner
            .in_flight
            .forget_where(|key| cache::matches_family(key, operation, room));
    }

    /// Serve a read from cache, or join or start the network call for `key`.
    ///
    /// With `cacheable` false the cache is neither consulted nor filled, but
    /// concurrent identical calls are still de-duplicated.
    pub(crate) async fn read<T, F>(
        &self,
        key: CacheKey,
        cacheable: bool,
        fetch: F,
    ) -> Result<T, ApiError>
    where
        T: PayloadKind,
        F: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let ttl = cacheable.then(|| self.inner.config.cache_ttl.ttl_for(key.operation()));

        if ttl.is_some() {
            if let Some(payload) = self.inner.cache.get(&key) {
                return cache::expect_payload(payload);
            }
        }

        // Taken before the call starts so a write landing mid-flight wins.
        let epoch = self.inner.cache.epoch(&key);

        let cache = self.inner.cache.clone();
        let cache_key = key.clone();
        let payload = self
            .inner
            .in_flight
            .run(key, async move {
                let payload = fetch.await?.into_payload();
                if let Some(ttl) = ttl {
                    if cache.set_if_current(cache_key.clone(), payload.clone(), ttl, epoch) {
                        debug!(key = %cache_key, ttl = ?ttl, "Caching response");
                    }
                }
                Ok(payload)
            })
            .await?;

        cache::expect_payload(payload)
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("repository", &self.inner.repository)
            .field("api_url", &self.inner.config.api_url)
            .field("has_token", &self.has_token())
            .finish()
    }
}

/// Builder for constructing `ChatClient` instances.
#[derive(Debug, Default)]
pub struct ChatClientBuilder {
    config: ClientConfig,
    token: Option<Credential>,
}

impl ChatClientBuilder {
    /// Create a new client builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the client configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the initial credential.
    pub fn token(mut self, token: Credential) -> Self {
        self.token = Some(token);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Configuration` if no repository is set, the API URL
    /// is invalid, or the HTTP client cannot be created.
    pub fn build(self) -> Result<ChatClient, ApiError> {
        let repository = self.config.validate()?;
        let executor = RequestExecutor::new(
            &self.config.api_url,
            &self.config.graphql_endpoint(),
            &self.config.user_agent,
            self.config.timeout,
        )?;

        let client = ChatClient {
            inner: Arc::new(ClientInner {
                config: self.config,
                repository,
                executor,
                cache: ResponseCache::new(),
                in_flight: InFlightRegistry::new(),
                token: RwLock::new(None),
            }),
        };
        client.set_token(self.token);
        Ok(client)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
