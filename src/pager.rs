//! Cursor over the batches of a Zendesk account's ticket listing.

use crate::controller::Direction;
use crate::model::{Ticket, TicketPage};
use crate::zendesk::{UpstreamError, ZendeskClient};
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_PAGE_SIZE: usize = 25;
/// Upper bound Zendesk accepts for `page[size]`.
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum PagerError {
    #[error("no {} batch is linked from the current one", .0.label())]
    NoLink(Direction),
    #[error("the {} batch is empty", .0.label())]
    EmptyBatch(Direction),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Tracks the `current`, `next` and `prev` batch URLs of one listing session.
///
/// Cursors only move after a batch was fetched successfully and contained at
/// least one ticket; every failure leaves them exactly as they were.
#[derive(Debug, Clone)]
pub struct TicketPager {
    client: ZendeskClient,
    page_size: usize,
    current: String,
    next: Option<String>,
    prev: Option<String>,
}

impl TicketPager {
    pub fn new(client: ZendeskClient, page_size: usize) -> Self {
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let current = client.config().tickets_url(page_size);
        Self {
            client,
            page_size,
            current,
            next: None,
            prev: None,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn current_url(&self) -> &str {
        &self.current
    }

    pub fn link(&self, direction: Direction) -> Option<&str> {
        match direction {
            Direction::Next => self.next.as_deref(),
            Direction::Prev => self.prev.as_deref(),
        }
    }

    /// Fetch the batch the cursor points at and refresh both neighbour links.
    pub async fn current_batch(&mut self) -> Result<Vec<Ticket>, PagerError> {
        let page: TicketPage = self.client.get_json(&self.current).await?;
        self.next = non_empty(page.links.next);
        self.prev = non_empty(page.links.prev);
        debug!(
            tickets = page.tickets.len(),
            has_next = self.next.is_some(),
            has_prev = self.prev.is_some(),
            "fetched current batch"
        );
        Ok(page.tickets)
    }

    /// Fetch the neighbouring batch in `direction` without moving the cursor.
    pub async fn seek_batch(&self, direction: Direction) -> Result<TicketPage, PagerError> {
        let url = self.link(direction).ok_or(PagerError::NoLink(direction))?;
        let page: TicketPage = self.client.get_json(url).await?;
        if page.tickets.is_empty() {
            return Err(PagerError::EmptyBatch(direction));
        }
        Ok(page)
    }

    pub async fn goto_next_batch(&mut self) -> Result<Vec<Ticket>, PagerError> {
        self.goto(Direction::Next).await
    }

    pub async fn goto_prev_batch(&mut self) -> Result<Vec<Ticket>, PagerError> {
        self.goto(Direction::Prev).await
    }

    pub async fn goto(&mut self, direction: Direction) -> Result<Vec<Ticket>, PagerError> {
        let page = self.seek_batch(direction).await?;
        let Some(target) = self.link(direction).map(str::to_string) else {
            return Err(PagerError::NoLink(direction));
        };
        let previous_current = std::mem::replace(&mut self.current, target);
        match direction {
            Direction::Next => {
                self.prev = Some(previous_current);
                self.next = non_empty(page.links.next);
            }
            Direction::Prev => {
                self.next = Some(previous_current);
                self.prev = non_empty(page.links.prev);
            }
        }
        info!(%direction, tickets = page.tickets.len(), "moved batch cursor");
        Ok(page.tickets)
    }
}

fn non_empty(link: Option<String>) -> Option<String> {
    link.filter(|value| !value.trim().is_empty())
}

#[cfg(all(test, feature = "web"))]
mod tests {
    use super::*;
    use crate::testing::MockZendesk;

    #[tokio::test]
    async fn initial_url_uses_page_size() {
        let mock = MockZendesk::spawn(Vec::new()).await;
        let pager = TicketPager::new(mock.client(), 2);
        assert!(pager.current_url().ends_with("/tickets.json?page[size]=2"));
        assert!(pager.link(Direction::Next).is_none());
        assert!(pager.link(Direction::Prev).is_none());
    }

    #[tokio::test]
    async fn walks_forward_and_back() {
        let mock = MockZendesk::spawn(MockZendesk::numbered_tickets(5)).await;
        let mut pager = TicketPager::new(mock.client(), 2);

        let first = pager.current_batch().await.unwrap();
        assert_eq!(ids(&first), [1, 2]);
        assert!(pager.link(Direction::Prev).is_none());

        let second = pager.goto_next_batch().await.unwrap();
        assert_eq!(ids(&second), [3, 4]);
        let third = pager.goto_next_batch().await.unwrap();
        assert_eq!(ids(&third), [5]);

        assert!(matches!(
            pager.goto_next_batch().await,
            Err(PagerError::NoLink(Direction::Next))
        ));
        assert_eq!(ids(&pager.current_batch().await.unwrap()), [5]);

        let back = pager.goto_prev_batch().await.unwrap();
        assert_eq!(ids(&back), [3, 4]);
        let start = pager.goto_prev_batch().await.unwrap();
        assert_eq!(ids(&start), [1, 2]);
        assert!(matches!(
            pager.goto_prev_batch().await,
            Err(PagerError::NoLink(Direction::Prev))
        ));
    }

    #[tokio::test]
    async fn upstream_failure_keeps_cursor() {
        let mock = MockZendesk::spawn(MockZendesk::numbered_tickets(4)).await;
        let mut pager = TicketPager::new(mock.client(), 2);
        pager.current_batch().await.unwrap();
        let before = pager.current_url().to_string();

        mock.fail_listing(true);
        let err = pager.goto_next_batch().await.unwrap_err();
        assert!(matches!(err, PagerError::Upstream(_)));
        assert_eq!(pager.current_url(), before);
        assert!(pager.link(Direction::Next).is_some());

        mock.fail_listing(false);
        assert_eq!(ids(&pager.goto_next_batch().await.unwrap()), [3, 4]);
    }

    #[tokio::test]
    async fn seek_does_not_move() {
        let mock = MockZendesk::spawn(MockZendesk::numbered_tickets(3)).await;
        let mut pager = TicketPager::new(mock.client(), 2);
        pager.current_batch().await.unwrap();
        let before = pager.current_url().to_string();

        let peek = pager.seek_batch(Direction::Next).await.unwrap();
        assert_eq!(ids(&peek.tickets), [3]);
        assert_eq!(pager.current_url(), before);
    }

    fn ids(tickets: &[Ticket]) -> Vec<u64> {
        tickets.iter().map(|ticket| ticket.id).collect()
    }
}
