// src/session.rs

use crate::model::{PendingAuthorization, Principal};
use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use sha2::{Digest, Sha512};
use std::fmt;
use std::time::{Duration, Instant};
use tower_sessions::cookie::time::OffsetDateTime;
use tower_sessions::cookie::Key;
use tower_sessions::session::{Error as SessionError, Id, Record};
use tower_sessions::session_store;
use tower_sessions::{Session, SessionStore};
use tracing::debug;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "lighthouse.sid";

/// Session key holding the authenticated [`Principal`].
const PRINCIPAL_KEY: &str = "principal";
/// Session key holding the in-flight [`PendingAuthorization`].
const PENDING_KEY: &str = "oidc.pending";

/// How long a session that never completed a login is kept.
pub const PENDING_SESSION_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Per-record lifetime: signed-in sessions live for the idle timeout, while
/// sessions holding only a pending authorization expire after
/// [`PENDING_SESSION_TIMEOUT`]. Every access restarts the clock.
struct SessionExpiry {
    idle_timeout: Duration,
    pending_timeout: Duration,
}

impl SessionExpiry {
    fn new(idle_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            pending_timeout: PENDING_SESSION_TIMEOUT.min(idle_timeout),
        }
    }

    fn time_to_idle(&self, record: &Record) -> Duration {
        if record.data.contains_key(PRINCIPAL_KEY) {
            self.idle_timeout
        } else {
            self.pending_timeout
        }
    }
}

impl Expiry<Id, Record> for SessionExpiry {
    fn expire_after_create(
        &self,
        _id: &Id,
        record: &Record,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(self.time_to_idle(record))
    }

    fn expire_after_read(
        &self,
        _id: &Id,
        record: &Record,
        _read_at: Instant,
        _duration_until_expiry: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        Some(self.time_to_idle(record))
    }

    fn expire_after_update(
        &self,
        _id: &Id,
        record: &Record,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(self.time_to_idle(record))
    }
}

/// An in-process session store backed by a `moka` cache.
///
/// Records are kept verbatim until they go idle or are evicted once
/// `max_sessions` is exceeded. Everything is lost on restart.
#[derive(Clone)]
pub struct MokaSessionStore {
    records: Cache<Id, Record>,
}

// Records hold access tokens; only the size is printed.
impl fmt::Debug for MokaSessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MokaSessionStore")
            .field("entries", &self.records.entry_count())
            .finish()
    }
}

impl MokaSessionStore {
    pub fn new(idle_timeout: Duration, max_sessions: u64) -> Self {
        let records = Cache::builder()
            .max_capacity(max_sessions)
            .expire_after(SessionExpiry::new(idle_timeout))
            .build();
        Self { records }
    }
}

#[async_trait]
impl SessionStore for MokaSessionStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        while self.records.contains_key(&record.id) {
            record.id = Id::default();
        }
        self.records.insert(record.id, record.clone()).await;
        Ok(())
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        self.records.insert(record.id, record.clone()).await;
        Ok(())
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let record = self.records.get(session_id).await;
        Ok(record.filter(|record| record.expiry_date > OffsetDateTime::now_utc()))
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        self.records.invalidate(session_id).await;
        Ok(())
    }
}

/// Derives the 64-byte cookie signing key from the configured secret.
pub fn cookie_key(secret: &str) -> Key {
    Key::from(Sha512::digest(secret.as_bytes()).as_slice())
}

/// Returns the principal stored in the session, if any.
pub async fn load_principal(session: &Session) -> Result<Option<Principal>, SessionError> {
    session.get::<Principal>(PRINCIPAL_KEY).await
}

/// Stores a freshly authenticated principal.
///
/// The session id is cycled first so an id issued before login cannot be
/// reused to ride the authenticated session.
pub async fn establish(session: &Session, principal: &Principal) -> Result<(), SessionError> {
    session.cycle_id().await?;
    session.insert(PRINCIPAL_KEY, principal).await?;
    debug!("Principal stored in session");
    Ok(())
}

pub async fn clear_principal(session: &Session) -> Result<(), SessionError> {
    session.remove::<Principal>(PRINCIPAL_KEY).await?;
    Ok(())
}

pub async fn store_pending(
    session: &Session,
    pending: &PendingAuthorization,
) -> Result<(), SessionError> {
    session.insert(PENDING_KEY, pending).await
}

/// Removes and returns the pending authorization. A pending authorization
/// is good for exactly one callback.
pub async fn take_pending(
    session: &Session,
) -> Result<Option<PendingAuthorization>, SessionError> {
    session.remove::<PendingAuthorization>(PENDING_KEY).await
}
