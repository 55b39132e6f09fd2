//! TTL response cache for read operations.
//!
//! Entries expire lazily: a lookup that finds an expired entry removes it and
//! reports a miss. Writes invalidate whole operation families.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use crate::error::ApiError;
use crate::models::{ChatMessage, ChatRoom, RepositoryRef, RoomNumber, RoomThread, User};

// ============================================================================
// Keys
// ============================================================================

/// Read operation families that can be cached and invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CurrentUser,
    Room,
    Rooms,
    Messages,
    RoomThread,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CurrentUser => "current_user",
            Self::Room => "room",
            Self::Rooms => "rooms",
            Self::Messages => "messages",
            Self::RoomThread => "room_thread",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a logical read request.
///
/// Used both as the cache key and as the in-flight de-duplication key, so two
/// requests that differ only in parameter field order collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    operation: Operation,
    repository: String,
    room: Option<RoomNumber>,
    params: String,
}

impl CacheKey {
    /// Build a key from an operation, its scope, and its parameters.
    pub fn new<P: Serialize + ?Sized>(
        operation: Operation,
        repository: &RepositoryRef,
        room: Option<RoomNumber>,
        params: &P,
    ) -> Self {
        Self {
            operation,
            repository: repository.to_string(),
            room,
            params: canonical_params(params),
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn room(&self) -> Option<RoomNumber> {
        self.room
    }

    pub fn params(&self) -> &str {
        &self.params
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.operation, self.repository)?;
        if let Some(room) = self.room {
            write!(f, ":{}", room.as_u64())?;
        }
        write!(f, ":{}", self.params)
    }
}

/// Serialize parameters with object keys sorted at every level.
pub(crate) fn canonical_params<P: Serialize + ?Sized>(params: &P) -> String {
    let value = serde_json::to_value(params).unwrap_or(Value::Null);
    let mut out = String::new();
    write_canonical(&value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// Typed value held by the cache and shared between de-duplicated callers.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    User(User),
    Room(ChatRoom),
    Rooms(Vec<ChatRoom>),
    Messages(Vec<ChatMessage>),
    RoomThread(RoomThread),
}

/// Conversion between a read result and its payload variant.
pub trait PayloadKind: Sized {
    fn into_payload(self) -> Payload;
    fn from_payload(payload: Payload) -> Option<Self>;
}

macro_rules! payload_kind {
    ($ty:ty, $variant:ident) => {
        impl PayloadKind for $ty {
            fn into_payload(self) -> Payload {
                Payload::$variant(self)
            }

            fn from_payload(payload: Payload) -> Option<Self> {
                match payload {
                    Payload::$variant(value) => Some(value),
                    _ => None,
                }
            }
        }
    };
}

payload_kind!(User, User);
payload_kind!(ChatRoom, Room);
payload_kind!(Vec<ChatRoom>, Rooms);
payload_kind!(Vec<ChatMessage>, Messages);
payload_kind!(RoomThread, RoomThread);

/// Unwrap a payload into the expected record type.
pub(crate) fn expect_payload<T: PayloadKind>(payload: Payload) -> Result<T, ApiError> {
    T::from_payload(payload).ok_or_else(|| ApiError::Json {
        message: "Cached payload has an unexpected shape".to_string(),
    })
}

// ============================================================================
// Cache
// ============================================================================

/// Time-to-live for each cached read family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtlPolicy {
    pub user: Duration,
    pub room: Duration,
    pub messages: Duration,
    pub rooms: Duration,
}

impl Default for CacheTtlPolicy {
    fn default() -> Self {
        Self {
            user: Duration::from_secs(10 * 60),
            room: Duration::from_secs(5 * 60),
            messages: Duration::from_secs(60),
            rooms: Duration::from_secs(5 * 60),
        }
    }
}

impl CacheTtlPolicy {
    /// TTL applied to an operation family.
    pub fn ttl_for(&self, operation: Operation) -> Duration {
        match operation {
            Operation::CurrentUser => self.user,
            Operation::Room => self.room,
            Operation::Rooms => self.rooms,
            Operation::Messages | Operation::RoomThread => self.messages,
        }
    }
}

struct CacheEntry {
    payload: Payload,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_valid(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) <= self.ttl
    }
}

/// Invalidation counters observed before a fetch started.
///
/// A response fetched under an older epoch may predate a write and is not
/// stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch {
    global: u64,
    family: u64,
    room: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    global_epoch: u64,
    epochs: HashMap<(Operation, Option<RoomNumber>), u64>,
}

impl CacheState {
    fn epoch(&self, key: &CacheKey) -> Epoch {
        let counter = |room: Option<RoomNumber>| {
            self.epochs
                .get(&(key.operation, room))
                .copied()
                .unwrap_or(0)
        };
        Epoch {
            global: self.global_epoch,
            family: counter(None),
            room: key.room.map_or(0, |room| counter(Some(room))),
        }
    }

    fn bump(&mut self, operation: Operation, room: Option<RoomNumber>) {
        *self.epochs.entry((operation, room)).or_insert(0) += 1;
    }
}

/// In-memory TTL cache keyed by [`CacheKey`].
///
/// Cheap to clone; clones share the same entries.
#[derive(Clone, Default)]
pub struct ResponseCache {
    state: Arc<RwLock<CacheState>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached payload if present and unexpired. Expired entries are removed.
    pub fn get(&self, key: &CacheKey) -> Option<Payload> {
        let now = Instant::now();
        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            match state.entries.get(key) {
                None => {
                    debug!(key = %key, "Cache miss");
                    return None;
                }
                Some(entry) if entry.is_valid(now) => {
                    debug!(key = %key, "Cache hit");
                    return Some(entry.payload.clone());
                }
                Some(_) => {}
            }
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.entries.get(key).is_some_and(|entry| !entry.is_valid(now)) {
            state.entries.remove(key);
            debug!(key = %key, "Cache entry expired");
        }
        None
    }

    /// Store a payload, replacing any existing entry for the key.
    pub fn set(&self, key: CacheKey, payload: Payload, ttl: Duration) {
        let entry = CacheEntry {
            payload,
            stored_at: Instant::now(),
            ttl,
        };
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .insert(key, entry);
    }

    /// Current invalidation epoch for `key`. Take it before starting a fetch.
    pub fn epoch(&self, key: &CacheKey) -> Epoch {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .epoch(key)
    }

    /// Store a payload only if nothing covering `key` was invalidated since
    /// `epoch` was taken. Returns whether the payload was stored.
    pub fn set_if_current(
        &self,
        key: CacheKey,
        payload: Payload,
        ttl: Duration,
        epoch: Epoch,
    ) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.epoch(&key) != epoch {
            debug!(key = %key, "Dropping response invalidated while in flight");
            return false;
        }

        let entry = CacheEntry {
            payload,
            stored_at: Instant::now(),
            ttl,
        };
        state.entries.insert(key, entry);
        true
    }

    /// Remove every entry of an operation family, optionally narrowed to one
    /// room. Returns how many entries were removed.
    ///
    /// Responses still in flight for the family are not stored afterwards.
    pub fn invalidate(&self, operation: Operation, room: Option<RoomNumber>) -> usize {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let before = state.entries.len();
        state.entries.retain(|key, _| !matches_family(key, operation, room));
        state.bump(operation, room);
        let removed = before - state.entries.len();

        debug!(operation = %operation, room = ?room, removed, "Invalidated cache family");
        removed
    }

    /// Remove everything, including responses still in flight.
    pub fn clear(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.entries.clear();
        state.global_epoch += 1;
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Whether `key` belongs to the family `operation`, narrowed to `room` if set.
pub(crate) fn matches_family(
    key: &CacheKey,
    operation: Operation,
    room: Option<RoomNumber>,
) -> bool {
    key.operation == operation && room.map_or(true, |room| key.room == Some(room))
}

impl fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
