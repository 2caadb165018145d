use crate::controller::TicketRef;
use crate::model::{TicketEnvelope, TicketWithPeople, User, UserEnvelope};
use crate::zendesk::{UpstreamError, ZendeskClient};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

const USER_CACHE_CAPACITY: usize = 512;

/// Fetches single tickets with their requester and assignee profiles.
///
/// User profiles are shared by many tickets, so successful lookups are kept
/// in a small LRU cache shared by every clone of this value.
#[derive(Clone)]
pub struct TicketDetails {
    client: ZendeskClient,
    users: Arc<Mutex<LruCache<u64, User>>>,
}

impl TicketDetails {
    pub fn new(client: ZendeskClient) -> Self {
        let capacity = NonZeroUsize::new(USER_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            client,
            users: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Fetch the ticket behind `ticket` and the people attached to it.
    /// Any failed lookup fails the whole call.
    pub async fn get_ticket(&self, ticket: &TicketRef) -> Result<TicketWithPeople, UpstreamError> {
        let envelope: TicketEnvelope = self.client.get_json(ticket.as_str()).await?;
        let ticket = envelope.ticket;
        let requester = match ticket.requester_id {
            Some(id) => Some(self.user(id).await?),
            None => None,
        };
        let assignee = match ticket.assignee_id {
            Some(id) => Some(self.user(id).await?),
            None => None,
        };
        Ok(TicketWithPeople {
            ticket,
            requester,
            assignee,
        })
    }

    pub async fn user(&self, user_id: u64) -> Result<User, UpstreamError> {
        let cached = self.users.lock().get(&user_id).cloned();
        if let Some(user) = cached {
            debug!(user_id, "user cache hit");
            return Ok(user);
        }
        let url = self.client.config().user_url(user_id);
        let envelope: UserEnvelope = self.client.get_json(&url).await?;
        self.users.lock().put(user_id, envelope.user.clone());
        Ok(envelope.user)
    }
}
