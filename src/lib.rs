//! Lofi Playlist Sync Library
//!
//! This library keeps a personal Spotify playlist in step with a curated source
//! playlist. Every cycle it copies tracks that newly appeared in the source into
//! the destination and renames the destination after its total runtime.
//!
//! # Modules
//!
//! - `api` - HTTP endpoints for the local OAuth callback listener
//! - `cli` - Command-line interface implementations
//! - `config` - Configuration management and environment variables
//! - `error` - Error taxonomy shared by every layer
//! - `management` - Credential storage and the token manager
//! - `scheduler` - The long-running sync loop
//! - `server` - Local HTTP listener for OAuth callbacks
//! - `spotify` - Spotify Web API client implementation
//! - `sync` - One comparison-and-merge cycle
//! - `types` - Data structures and type definitions
//! - `utils` - Utility functions and helpers
//!
//! # Example
//!
//! ```
//! use lofisync::{config, cli};
//!
//! #[tokio::main]
//! async fn main() -> lofisync::Res<()> {
//!     config::load_env().await?;
//!     let cfg = config::Config::from_env()?;
//!     cli::sync_once(cfg).await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod management;
pub mod scheduler;
pub mod server;
pub mod spotify;
pub mod sync;
pub mod types;
pub mod utils;

/// A convenient Result type alias for operations that may fail.
///
/// Used at the outer edges of the application (binary, CLI commands) where
/// the concrete error type no longer matters. Library layers return their
/// own typed errors from [`error`].
pub type Res<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Prints an informational message with a blue bullet point.
///
/// Every log macro prefixes the line with a local timestamp so the output of
/// the long-running loop can be followed over hours.
///
/// # Example
///
/// ```
/// info!("Checking playlist for new content...");
/// info!("Found {} tracks", count);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("{} [{}] {}", $crate::utils::log_timestamp().dimmed(), "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
///
/// # Example
///
/// ```
/// success!("Authentication completed successfully");
/// success!("Added {} tracks", count);
/// ```
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("{} [{}] {}", $crate::utils::log_timestamp().dimmed(), "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits the program.
///
/// Only used for unrecoverable startup errors. The sync loop reports its
/// failures with [`failure!`] and keeps running.
///
/// # Example
///
/// ```
/// error!("Failed to load configuration");
/// // Program exits here - code after this will not execute
/// ```
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("{} [{}] {}", $crate::utils::log_timestamp().dimmed(), "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints an error message with a red exclamation mark without exiting.
///
/// # Example
///
/// ```
/// failure!("Cycle aborted: {}", err);
/// ```
#[macro_export]
macro_rules! failure {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("{} [{}] {}", $crate::utils::log_timestamp().dimmed(), "!".red().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a warning message with a yellow exclamation mark.
///
/// # Example
///
/// ```
/// warning!("Rate limited, retrying in {} seconds", secs);
/// ```
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("{} [{}] {}", $crate::utils::log_timestamp().dimmed(), "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
