use crate::controller::{
    DETAILS_CONTAINER_ID, Direction, HEADER_ERROR_CLASS, TicketRef, escape_text,
};
use crate::details::TicketDetails;
use crate::model::{Ticket, TicketWithPeople, User};
use crate::pager::{DEFAULT_PAGE_SIZE, TicketPager};
use crate::session::{SessionSlot, SessionStore};
use crate::zendesk::{ZendeskClient, ZendeskConfig};
use askama::Template;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use cookie::{Cookie, SameSite};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn};

type SharedState = Arc<AppState>;

pub const SESSION_COOKIE: &str = "ticket_viewer_session";
/// Path of the wasm-bindgen JS shim inside the static directory.
const CONTROLLER_MODULE: &str = "/static/pkg/zendesk_viewer.js";

pub struct AppState {
    client: ZendeskClient,
    details: TicketDetails,
    sessions: SessionStore,
    page_size: usize,
}

impl AppState {
    pub fn new(client: ZendeskClient, page_size: usize) -> Self {
        Self::with_sessions(client, page_size, SessionStore::default())
    }

    pub fn with_sessions(client: ZendeskClient, page_size: usize, sessions: SessionStore) -> Self {
        Self {
            details: TicketDetails::new(client.clone()),
            client,
            sessions,
            page_size,
        }
    }

    fn new_pager(&self) -> TicketPager {
        TicketPager::new(self.client.clone(), self.page_size)
    }

    fn session(&self, headers: &HeaderMap) -> Option<(String, Arc<SessionSlot>)> {
        let session_id = session_cookie(headers)?;
        let slot = self.sessions.get(&session_id)?;
        Some((session_id, slot))
    }
}

#[derive(Clone, Debug)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub zendesk: ZendeskConfig,
    pub page_size: usize,
    pub static_dir: PathBuf,
}

impl WebConfig {
    pub fn new(zendesk: ZendeskConfig) -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            zendesk,
            page_size: DEFAULT_PAGE_SIZE,
            static_dir: PathBuf::from("static"),
        }
    }
}

#[derive(Debug, Error)]
pub enum WebError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub async fn serve(config: WebConfig) -> Result<(), WebError> {
    let state = Arc::new(AppState::new(
        ZendeskClient::new(config.zendesk.clone()),
        config.page_size,
    ));
    let router = build_router(state, config.static_dir.clone());
    info!(
        %config.addr,
        api_root = config.zendesk.api_root(),
        page_size = config.page_size,
        static_dir = %config.static_dir.display(),
        "Binding HTTP listener"
    );
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn forbidden() -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: "Do not access this endpoint directly!".to_string(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn bad_gateway(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

pub fn build_router(state: SharedState, static_dir: PathBuf) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/navigate", get(navigate))
        .route("/ticket_details", get(ticket_details))
        .route("/healthz", get(health))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| Cookie::split_parse(value))
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

fn session_set_cookie(session_id: &str) -> Option<HeaderValue> {
    let cookie = Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    HeaderValue::from_str(&cookie.to_string()).ok()
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "zendesk-viewer" }))
}

async fn index(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let (session_id, slot, fresh) = match state.session(&headers) {
        Some((session_id, slot)) => (session_id, slot, false),
        None => {
            let (session_id, slot) = state.sessions.create(state.new_pager());
            info!(sessions = state.sessions.len(), "started listing session");
            (session_id, slot, true)
        }
    };

    let mut pager = slot.pager().lock().await;
    let batch = pager.current_batch().await;
    let page_size = pager.page_size();
    drop(pager);

    let (status, rows, error) = match batch {
        Ok(tickets) => (
            StatusCode::OK,
            tickets.iter().map(TicketRow::from_ticket).collect(),
            None,
        ),
        Err(err) => {
            warn!(error = %err, "could not load current batch");
            (
                StatusCode::BAD_GATEWAY,
                Vec::new(),
                Some("Uh-oh! Failed to fetch tickets from Zendesk. Please try again later!".to_string()),
            )
        }
    };
    let template = IndexTemplate {
        rows,
        error,
        page_size,
        controller_module: CONTROLLER_MODULE,
        details_container_id: DETAILS_CONTAINER_ID,
        error_class: HEADER_ERROR_CLASS,
    };
    let body = template
        .render()
        .unwrap_or_else(|err| render_error_page(err.to_string()));
    let mut response = (status, Html(body)).into_response();
    if fresh {
        if let Some(value) = session_set_cookie(&session_id) {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
    }
    response
}

#[derive(Debug, Deserialize)]
struct NavigateParams {
    direction: Option<String>,
}

async fn navigate(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<NavigateParams>,
) -> Result<Json<Vec<Ticket>>, ApiError> {
    let (_, slot) = state.session(&headers).ok_or_else(ApiError::forbidden)?;
    let direction: Direction = params
        .direction
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(|_| ApiError::bad_request("'direction' must either be 'prev' or 'next'!"))?;

    let mut pager = slot.pager().lock().await;
    match pager.goto(direction).await {
        Ok(tickets) => Ok(Json(tickets)),
        Err(err) => {
            warn!(%direction, error = %err, "navigation refused");
            Err(ApiError::not_found(format!(
                "Failed to fetch the {} page.",
                direction.label()
            )))
        }
    }
}

#[derive(Debug, Deserialize)]
struct TicketDetailsParams {
    ticket_url: Option<String>,
}

async fn ticket_details(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<TicketDetailsParams>,
) -> Result<Html<String>, ApiError> {
    state.session(&headers).ok_or_else(ApiError::forbidden)?;
    let raw = params
        .ticket_url
        .ok_or_else(|| ApiError::bad_request("'ticket_url' is required"))?;
    let ticket = TicketRef::parse(&raw).map_err(|err| ApiError::bad_request(err.to_string()))?;
    if !state.client.config().owns(ticket.url()) {
        return Err(ApiError::bad_request(
            "'ticket_url' must point at the configured Zendesk account",
        ));
    }

    let found = state.details.get_ticket(&ticket).await.map_err(|err| {
        warn!(%ticket, error = %err, "ticket lookup failed");
        ApiError::bad_gateway("Failed to fetch the ticket's details.")
    })?;
    let template = TicketDetailsTemplate {
        view: DetailView::from_found(&found),
    };
    template.render().map(Html).map_err(|err| {
        warn!(error = %err, "ticket details template failed");
        ApiError::bad_gateway("Failed to render the ticket's details.")
    })
}

const PLACEHOLDER: &str = "-";

fn or_placeholder(value: Option<&str>) -> String {
    value
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(PLACEHOLDER)
        .to_string()
}

struct TicketRow {
    id: u64,
    url: String,
    subject: String,
    status: String,
    priority: String,
    updated_at: String,
}

impl TicketRow {
    fn from_ticket(ticket: &Ticket) -> Self {
        Self {
            id: ticket.id,
            url: ticket.url.clone(),
            subject: ticket.subject_or_placeholder().to_string(),
            status: or_placeholder(ticket.status.as_deref()),
            priority: or_placeholder(ticket.priority.as_deref()),
            updated_at: or_placeholder(ticket.updated_at.as_deref()),
        }
    }
}

struct PersonView {
    name: String,
    email: String,
    role: String,
}

impl PersonView {
    fn from_user(user: Option<&User>, missing: &str) -> Self {
        match user {
            Some(user) => Self {
                name: user.name.clone(),
                email: or_placeholder(user.email.as_deref()),
                role: or_placeholder(user.role.as_deref()),
            },
            None => Self {
                name: missing.to_string(),
                email: PLACEHOLDER.to_string(),
                role: PLACEHOLDER.to_string(),
            },
        }
    }
}

struct DetailView {
    id: u64,
    subject: String,
    status: String,
    priority: String,
    kind: String,
    tags: Vec<String>,
    description: String,
    created_at: String,
    updated_at: String,
    requester: PersonView,
    assignee: PersonView,
}

impl DetailView {
    fn from_found(found: &TicketWithPeople) -> Self {
        let ticket = &found.ticket;
        Self {
            id: ticket.id,
            subject: ticket.subject_or_placeholder().to_string(),
            status: or_placeholder(ticket.status.as_deref()),
            priority: or_placeholder(ticket.priority.as_deref()),
            kind: or_placeholder(ticket.ticket_type.as_deref()),
            tags: ticket.tags.clone(),
            description: ticket.description.clone().unwrap_or_default(),
            created_at: or_placeholder(ticket.created_at.as_deref()),
            updated_at: or_placeholder(ticket.updated_at.as_deref()),
            requester: PersonView::from_user(found.requester.as_ref(), "Unknown requester"),
            assignee: PersonView::from_user(found.assignee.as_ref(), "Unassigned"),
        }
    }
}

fn render_error_page(message: impl Into<String>) -> String {
    let escaped = escape_text(&message.into());
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head><meta charset="utf-8" /><title>Ticket Viewer • Error</title></head>
  <body>
    <header><h1>Ticket Viewer</h1><p class="{HEADER_ERROR_CLASS}">{escaped}</p></header>
  </body>
</html>"#
    )
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Ticket Viewer</title>
    <style>
      body { font-family: system-ui, sans-serif; margin: 0; background: #f8fafc; color: #0f172a; }
      header { padding: 1.5rem 2rem; background: #03363d; color: #fff; }
      header .{{ error_class }} { color: #fecaca; margin: 0.5rem 0 0; }
      main { max-width: 64rem; margin: 0 auto; padding: 1.5rem 2rem; }
      ul.tickets { list-style: none; padding: 0; margin: 0; }
      ul.tickets li { display: grid; grid-template-columns: 5rem 1fr 7rem 7rem; gap: 1rem; padding: 0.75rem 1rem; background: #fff; border-bottom: 1px solid #e2e8f0; cursor: pointer; }
      ul.tickets li:hover { background: #f1f5f9; }
      nav.batches { display: flex; justify-content: space-between; margin-top: 1.5rem; }
      #{{ details_container_id }} { display: none; position: fixed; inset: 0; background: rgba(15, 23, 42, 0.6); align-items: center; justify-content: center; }
    </style>
  </head>
  <body>
    <header>
      <h1>Ticket Viewer</h1>
      <p>Showing up to {{ page_size }} tickets per page. Click a ticket to see its details.</p>
      {% if error.is_some() %}
      <p class="{{ error_class }}">{{ error.as_ref().unwrap() }}</p>
      {% endif %}
    </header>
    <main>
      {% if rows.len() == 0 %}
        {% if error.is_none() %}
        <p>There are no tickets in this batch.</p>
        {% endif %}
      {% else %}
      <ul class="tickets">
        {% for row in rows %}
        <li data-ticket-url="{{ row.url }}">
          <span>#{{ row.id }}</span>
          <span>{{ row.subject }}</span>
          <span>{{ row.status }} / {{ row.priority }}</span>
          <span>{{ row.updated_at }}</span>
        </li>
        {% endfor %}
      </ul>
      {% endif %}
      <nav class="batches">
        <button type="button" data-direction="prev">Previous</button>
        <button type="button" data-direction="next">Next</button>
      </nav>
    </main>
    <section id="{{ details_container_id }}"></section>
    <script type="module">
      import init, { navigate, showTicketDetails, closeTicketDetails } from "{{ controller_module }}";
      await init();
      window.navigate = navigate;
      window.showTicketDetails = showTicketDetails;
      window.closeTicketDetails = closeTicketDetails;
      document.querySelectorAll("[data-direction]").forEach((button) => {
        button.addEventListener("click", () => navigate(button.dataset.direction));
      });
      document.querySelectorAll("[data-ticket-url]").forEach((item) => {
        item.addEventListener("click", () => showTicketDetails(item.dataset.ticketUrl));
      });
    </script>
  </body>
</html>"#,
    ext = "html"
)]
struct IndexTemplate {
    rows: Vec<TicketRow>,
    error: Option<String>,
    page_size: usize,
    controller_module: &'static str,
    details_container_id: &'static str,
    error_class: &'static str,
}

#[derive(Template)]
#[template(
    source = r#"<article class="ticket-details" style="background: #fff; border-radius: 0.5rem; padding: 1.5rem; max-width: 48rem; width: 100%; max-height: 90vh; overflow-y: auto;">
  <div style="display: flex; justify-content: space-between; align-items: start;">
    <h2>#{{ view.id }} {{ view.subject }}</h2>
    <button type="button" class="close" aria-label="Close" onclick="closeTicketDetails()">X</button>
  </div>
  <dl>
    <dt>Status</dt><dd>{{ view.status }}</dd>
    <dt>Priority</dt><dd>{{ view.priority }}</dd>
    <dt>Type</dt><dd>{{ view.kind }}</dd>
    <dt>Created</dt><dd>{{ view.created_at }}</dd>
    <dt>Updated</dt><dd>{{ view.updated_at }}</dd>
    {% if view.tags.len() > 0 %}
    <dt>Tags</dt>
    <dd>{% for tag in view.tags %}{% if !loop.first %}, {% endif %}{{ tag }}{% endfor %}</dd>
    {% endif %}
  </dl>
  <section class="people">
    <div class="requester">
      <h3>Requester</h3>
      <p>{{ view.requester.name }}</p>
      <p>{{ view.requester.email }} ({{ view.requester.role }})</p>
    </div>
    <div class="assignee">
      <h3>Assignee</h3>
      <p>{{ view.assignee.name }}</p>
      <p>{{ view.assignee.email }} ({{ view.assignee.role }})</p>
    </div>
  </section>
  <section class="description">
    <h3>Description</h3>
    <p style="white-space: pre-wrap;">{{ view.description }}</p>
  </section>
</article>"#,
    ext = "html"
)]
struct TicketDetailsTemplate {
    view: DetailView,
}
