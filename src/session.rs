use crate::pager::TicketPager;
use lru::LruCache;
use parking_lot::Mutex;
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

pub const MAX_SESSION_COUNT: usize = 4096;
const SESSION_ID_LEN: usize = 48;

/// Per-browser state: the session's position in the ticket listing.
///
/// The pager sits behind an async mutex so concurrent requests of one session
/// move the cursor one at a time.
pub struct SessionSlot {
    pager: AsyncMutex<TicketPager>,
}

impl SessionSlot {
    pub fn new(pager: TicketPager) -> Self {
        Self {
            pager: AsyncMutex::new(pager),
        }
    }

    pub fn pager(&self) -> &AsyncMutex<TicketPager> {
        &self.pager
    }
}

/// In-memory session table; the least recently used session is evicted
/// once the table is full.
pub struct SessionStore {
    slots: Mutex<LruCache<String, Arc<SessionSlot>>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_capacity(MAX_SESSION_COUNT)
    }
}

impl SessionStore {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            slots: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a session and mark it as recently used.
    pub fn get(&self, session_id: &str) -> Option<Arc<SessionSlot>> {
        self.slots.lock().get(session_id).cloned()
    }

    /// Start a new session around `pager` and return its id.
    pub fn create(&self, pager: TicketPager) -> (String, Arc<SessionSlot>) {
        let slot = Arc::new(SessionSlot::new(pager));
        let mut guard = self.slots.lock();
        let session_id = loop {
            let candidate = generate_session_id();
            if !guard.contains(&candidate) {
                break candidate;
            }
        };
        if let Some((evicted, _)) = guard.push(session_id.clone(), slot.clone()) {
            if evicted != session_id {
                debug!(sessions = guard.len(), "evicted least recently used session");
            }
        }
        (session_id, slot)
    }
}

pub fn generate_session_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zendesk::{ZendeskClient, ZendeskConfig};

    fn pager() -> TicketPager {
        let config = ZendeskConfig::new("acme", "agent@acme.test", "token").unwrap();
        TicketPager::new(ZendeskClient::new(config), 25)
    }

    #[test]
    fn session_ids_are_long_and_alphanumeric() {
        let id = generate_session_id();
        assert_eq!(id.len(), SESSION_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, generate_session_id());
    }

    #[test]
    fn created_sessions_can_be_found() {
        let store = SessionStore::default();
        let (id, slot) = store.create(pager());
        let found = store.get(&id).unwrap();
        assert!(Arc::ptr_eq(&slot, &found));
        assert!(store.get("unknown").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn least_recently_used_session_is_evicted() {
        let store = SessionStore::with_capacity(2);
        let (first, _) = store.create(pager());
        let (second, _) = store.create(pager());
        assert!(store.get(&first).is_some());

        let (third, _) = store.create(pager());
        assert_eq!(store.len(), 2);
        assert!(store.get(&second).is_none());
        assert!(store.get(&first).is_some());
        assert!(store.get(&third).is_some());
    }
}
