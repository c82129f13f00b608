//! # API Module
//!
//! HTTP endpoints served by the local listener while lofisync waits for the
//! user to authorize it.
//!
//! ## Endpoints
//!
//! - [`callback`] - Receives the OAuth redirect (`code`, `state`, `error`),
//!   completes the authorization-code exchange through the token manager and
//!   reports the outcome to the waiting scheduler.
//! - [`health`] - Returns status and version information.
//!
//! Every other path answers 404.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use axum::{Router, routing::get};
//! use lofisync::api::{callback, health};
//!
//! let app = Router::new()
//!     .route("/callback", get(callback))
//!     .route("/health", get(health));
//! ```

mod callback;
mod health;

pub use callback::callback;
pub use health::health;
