//! # Spotify Integration Module
//!
//! This module is the only place that talks to Spotify. It is split by
//! concern:
//!
//! ```text
//! Sync Engine / CLI
//!          ↓
//!     ├── playlist  (paginated reads, chunked inserts, rename)
//!     ├── client    (bearer auth, classification, retry/backoff)
//!     └── auth      (authorization URL, code and refresh grants)
//!          ↓
//! HTTP Layer (reqwest, JSON)
//! ```
//!
//! ## Error Handling
//!
//! [`client::ApiClient::call`] resolves the recoverable cases itself:
//! - **401 Unauthorized**: the access token is invalidated and refreshed,
//!   then the request is replayed.
//! - **429 Too Many Requests**: waits `Retry-After` + 1 seconds, unless the
//!   provider asks for more than the configured ceiling.
//! - **408/5xx and connection failures**: fixed delay, bounded attempts.
//!
//! Anything else reaches the caller as an [`crate::error::ApiError`].
//!
//! ## API Coverage
//!
//! - `GET /playlists/{id}/tracks` - playlist contents, 100 per page
//! - `POST /playlists/{id}/tracks` - append up to 100 uris per request
//! - `PUT /playlists/{id}` - change the display name
//! - `POST /api/token` - code and refresh grants

pub mod auth;
pub mod client;
pub mod playlist;
