//! Browse the tickets of a Zendesk account.
//!
//! The crate has three layers, each behind its own feature:
//!
//! * [`controller`]: the page controller that drives the listing page
//!   (batch navigation, ticket details modal). Always available, and the only
//!   part compiled into the `browser` wasm build.
//! * `upstream`: an authenticated Zendesk client ([`zendesk`]), the batch
//!   cursor ([`pager`]) and ticket lookups ([`details`]).
//! * `web`: the axum server the controller talks to ([`web`]), with
//!   per-browser sessions ([`session`]).

pub mod controller;
pub mod model;

#[cfg(feature = "upstream")]
pub mod details;
#[cfg(feature = "upstream")]
pub mod http;
#[cfg(feature = "upstream")]
pub mod pager;
#[cfg(feature = "upstream")]
pub mod zendesk;

#[cfg(feature = "web")]
pub mod session;
#[cfg(feature = "web")]
pub mod web;

#[cfg(feature = "browser")]
pub mod browser;

#[cfg(all(test, feature = "web"))]
mod testing;

pub use controller::{
    ControllerError, Direction, PageController, PageModel, PageSurface, TicketRef, Transport,
    Visibility,
};
pub use model::{Ticket, TicketPage, TicketWithPeople, User};
