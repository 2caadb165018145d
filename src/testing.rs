//! In-process stand-in for the Zendesk API used by unit tests.

use crate::model::{PageLinks, PageMeta, Ticket, TicketPage, User};
use crate::zendesk::{ZendeskClient, ZendeskConfig};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpListener;

pub const ASSIGNEE_ID: u64 = 900;

pub struct MockZendesk {
    state: Arc<MockState>,
}

struct MockState {
    api_root: String,
    tickets: Vec<Ticket>,
    users: HashMap<u64, User>,
    fail_listing: AtomicBool,
    fail_users: AtomicBool,
}

impl MockZendesk {
    pub async fn spawn(tickets: Vec<Ticket>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let api_root = format!("http://{addr}/api/v2");
        let tickets = tickets
            .into_iter()
            .map(|mut ticket| {
                ticket.url = format!("{api_root}/tickets/{}.json", ticket.id);
                ticket
            })
            .collect::<Vec<_>>();
        let mut users = HashMap::new();
        for ticket in &tickets {
            for id in [ticket.requester_id, ticket.assignee_id].into_iter().flatten() {
                users.entry(id).or_insert_with(|| person(id));
            }
        }
        let state = Arc::new(MockState {
            api_root,
            tickets,
            users,
            fail_listing: AtomicBool::new(false),
            fail_users: AtomicBool::new(false),
        });
        let router = Router::new()
            .route("/api/v2/tickets.json", get(list_tickets))
            .route("/api/v2/tickets/:file", get(show_ticket))
            .route("/api/v2/users/:file", get(show_user))
            .with_state(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Self { state }
    }

    pub fn numbered_tickets(count: u64) -> Vec<Ticket> {
        (1..=count)
            .map(|id| Ticket {
                id,
                url: String::new(),
                subject: Some(format!("Ticket {id}")),
                description: Some(format!("Description of ticket {id}")),
                status: Some("open".into()),
                priority: Some("normal".into()),
                ticket_type: Some("question".into()),
                tags: vec!["sample".into()],
                created_at: Some("2021-09-01T12:00:00Z".into()),
                updated_at: Some("2021-09-02T08:30:00Z".into()),
                requester_id: Some(100 + id),
                assignee_id: Some(ASSIGNEE_ID),
            })
            .collect()
    }

    pub fn config(&self) -> ZendeskConfig {
        ZendeskConfig::with_api_root(&self.state.api_root, "agent@example.test", "token").unwrap()
    }

    pub fn client(&self) -> ZendeskClient {
        let http = reqwest::Client::builder().no_proxy().build().unwrap();
        ZendeskClient::with_http(http, self.config())
    }

    pub fn ticket_url(&self, id: u64) -> String {
        format!("{}/tickets/{id}.json", self.state.api_root)
    }

    pub fn fail_listing(&self, fail: bool) {
        self.state.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn fail_users(&self, fail: bool) {
        self.state.fail_users.store(fail, Ordering::SeqCst);
    }
}

fn person(id: u64) -> User {
    User {
        id,
        name: format!("Person {id}"),
        email: Some(format!("person{id}@example.test")),
        role: Some(if id == ASSIGNEE_ID { "agent" } else { "end-user" }.into()),
        time_zone: Some("UTC".into()),
        phone: None,
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("Basic "))
}

async fn list_tickets(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if state.fail_listing.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let size = params
        .get("page[size]")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(100);
    let start = params
        .get("page[after]")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(0);
    let end = (start + size).min(state.tickets.len());
    let tickets = state.tickets.get(start..end).unwrap_or_default().to_vec();
    let link = |offset: usize| {
        format!(
            "{}/tickets.json?page[size]={size}&page[after]={offset}",
            state.api_root
        )
    };
    let page = TicketPage {
        tickets,
        links: PageLinks {
            prev: (start > 0).then(|| link(start.saturating_sub(size))),
            next: (end < state.tickets.len()).then(|| link(end)),
        },
        meta: PageMeta {
            has_more: end < state.tickets.len(),
            after_cursor: Some(end.to_string()),
            before_cursor: Some(start.to_string()),
        },
    };
    Json(page).into_response()
}

async fn show_ticket(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(file): Path<String>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let ticket = json_id(&file).and_then(|id| state.tickets.iter().find(|t| t.id == id));
    match ticket {
        Some(ticket) => Json(json!({ "ticket": ticket })).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn show_user(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(file): Path<String>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if state.fail_users.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    match json_id(&file).and_then(|id| state.users.get(&id)) {
        Some(user) => Json(json!({ "user": user })).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn json_id(file: &str) -> Option<u64> {
    file.strip_suffix(".json")?.parse().ok()
}
