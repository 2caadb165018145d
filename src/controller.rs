//! Page controller for the ticket listing.
//!
//! The controller mediates between user actions on the listing page and the
//! two server endpoints it consumes: `/navigate` (move the session's batch
//! cursor, then reload) and `/ticket_details` (fetch a rendered modal
//! fragment). The page itself and the network are passed in explicitly as a
//! [`PageSurface`] and a [`Transport`], so the same logic drives the real DOM
//! in the browser build and the in-memory [`PageModel`] everywhere else.

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Element id of the modal container that receives ticket details.
pub const DETAILS_CONTAINER_ID: &str = "ticketDetailsContainer";
/// Class carried by every inline error paragraph appended to the header.
pub const HEADER_ERROR_CLASS: &str = "error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "prev", alias = "previous")]
    Prev,
    #[serde(rename = "next")]
    Next,
}

impl Direction {
    /// Value sent as the `direction` query parameter.
    pub fn query_value(&self) -> &'static str {
        match self {
            Direction::Prev => "prev",
            Direction::Next => "next",
        }
    }

    /// Human-readable name used in user-facing messages.
    pub fn label(&self) -> &'static str {
        match self {
            Direction::Prev => "previous",
            Direction::Next => "next",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.query_value())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("direction must be either 'prev' or 'next', got {0:?}")]
pub struct DirectionError(pub String);

impl FromStr for Direction {
    type Err = DirectionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "prev" | "previous" => Ok(Direction::Prev),
            "next" => Ok(Direction::Next),
            _ => Err(DirectionError(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TicketRefError {
    #[error("ticket reference is empty")]
    Empty,
    #[error("ticket reference is not a valid URL: {0}")]
    Invalid(#[from] url::ParseError),
    #[error("ticket reference must use http or https, got {0:?}")]
    UnsupportedScheme(String),
}

/// Reference to a single ticket resource: an absolute `http(s)` URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TicketRef(Url);

impl TicketRef {
    pub fn parse(raw: &str) -> Result<Self, TicketRefError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TicketRefError::Empty);
        }
        let url = Url::parse(trimmed)?;
        match url.scheme() {
            "http" | "https" => Ok(Self(url)),
            other => Err(TicketRefError::UnsupportedScheme(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.0
    }
}

impl FromStr for TicketRef {
    type Err = TicketRefError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl fmt::Display for TicketRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CSS `display` states the details container moves between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Hidden,
    Flex,
}

impl Visibility {
    pub fn css_value(&self) -> &'static str {
        match self {
            Visibility::Hidden => "none",
            Visibility::Flex => "flex",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Issues GET requests on behalf of the controller.
pub trait Transport {
    fn get(&self, url: &str) -> impl Future<Output = Result<TransportResponse, TransportError>>;
}

/// The parts of the page the controller is allowed to touch.
pub trait PageSurface {
    /// Full page reload; in-memory page state is abandoned.
    fn reload(&mut self);
    /// Append an inline `<p class="error">` with `message` to the page header.
    fn append_header_error(&mut self, message: &str);
    fn set_details_html(&mut self, html: &str);
    fn set_details_visibility(&mut self, visibility: Visibility);
    /// Developer-facing failure log (the browser console).
    fn log_failure(&mut self, _message: &str) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },
}

pub fn navigation_error_message(direction: Direction) -> String {
    format!(
        "Uh-oh! Failed to fetch the {} page. Please try again!",
        direction.label()
    )
}

pub struct PageController<T, P> {
    origin: String,
    transport: T,
    page: P,
}

impl<T, P> PageController<T, P>
where
    T: Transport,
    P: PageSurface,
{
    /// `origin` is the scheme + host of the current page, e.g. `http://127.0.0.1:5000`.
    pub fn new(origin: impl Into<String>, transport: T, page: P) -> Self {
        let origin = origin.into().trim_end_matches('/').to_string();
        Self {
            origin,
            transport,
            page,
        }
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn into_page(self) -> P {
        self.page
    }

    pub fn navigate_url(&self, direction: Direction) -> String {
        format!(
            "{}/navigate?direction={}",
            self.origin,
            direction.query_value()
        )
    }

    pub fn details_url(&self, ticket: &TicketRef) -> String {
        format!(
            "{}/ticket_details?ticket_url={}",
            self.origin,
            utf8_percent_encode(ticket.as_str(), NON_ALPHANUMERIC)
        )
    }

    /// Ask the server to move to the previous or next batch and reload on success.
    /// Failures are reported inline in the header and never propagate.
    pub async fn navigate(&mut self, direction: Direction) {
        let url = self.navigate_url(direction);
        match self.fetch_ok(&url).await {
            Ok(_) => {
                debug!(%direction, "navigation accepted; reloading");
                self.page.reload();
            }
            Err(err) => {
                warn!(%direction, error = %err, "navigation failed");
                self.page.log_failure(&err.to_string());
                self.page
                    .append_header_error(&navigation_error_message(direction));
            }
        }
    }

    /// Fetch the rendered details of `ticket` and open the modal.
    /// Failures are logged only; the container is left as it was.
    pub async fn show_ticket_details(&mut self, ticket: &TicketRef) {
        let url = self.details_url(ticket);
        match self.fetch_ok(&url).await {
            Ok(html) => {
                self.page.set_details_html(&html);
                self.page.set_details_visibility(Visibility::Flex);
            }
            Err(err) => {
                warn!(ticket = %ticket, error = %err, "ticket details unavailable");
                self.page.log_failure(&err.to_string());
            }
        }
    }

    /// Hide the modal. The container keeps its last content.
    pub fn close_ticket_details(&mut self) {
        self.page.set_details_visibility(Visibility::Hidden);
    }

    async fn fetch_ok(&self, url: &str) -> Result<String, ControllerError> {
        let response = self
            .transport
            .get(url)
            .await
            .map_err(|source| ControllerError::Transport {
                url: url.to_string(),
                source,
            })?;
        if response.status != 200 {
            return Err(ControllerError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }
        Ok(response.body)
    }
}

/// In-memory stand-in for the listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageModel {
    pub reloads: usize,
    pub header_html: String,
    pub details_html: String,
    pub details_visibility: Visibility,
    pub console: Vec<String>,
}

impl PageModel {
    pub fn error_paragraphs(&self) -> Vec<&str> {
        let open = format!("<p class=\"{HEADER_ERROR_CLASS}\">");
        self.header_html
            .split(open.as_str())
            .skip(1)
            .filter_map(|rest| rest.split("</p>").next())
            .collect()
    }
}

impl PageSurface for PageModel {
    fn reload(&mut self) {
        self.reloads += 1;
    }

    fn append_header_error(&mut self, message: &str) {
        self.header_html.push_str(&format!(
            "<p class=\"{HEADER_ERROR_CLASS}\">{}</p>",
            escape_text(message)
        ));
    }

    fn set_details_html(&mut self, html: &str) {
        self.details_html = html.to_string();
    }

    fn set_details_visibility(&mut self, visibility: Visibility) {
        self.details_visibility = visibility;
    }

    fn log_failure(&mut self, message: &str) {
        self.console.push(message.to_string());
    }
}

/// Escapes text for use inside HTML element content.
pub(crate) fn escape_text(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
