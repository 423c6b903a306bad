//! MailChats API - HTTP and WebSocket server
//!
//! This crate provides the REST API for MailChats: session and license
//! login, campaign sending, personalization, AI helpers, the theme and
//! the WebSocket progress feed.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;

pub use auth::{AppState, SessionStore};
pub use routes::create_router;
