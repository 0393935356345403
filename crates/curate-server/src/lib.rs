//! # Curate Server
//!
//! HTTP API over the content dashboard: sign-in, the category grid, paginated
//! content lists, add/edit/delete forms and blob serving.
//!
//! ## Example
//!
//! ```rust,ignore
//! use curate_server::{AppState, ServerConfig, router};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::default();
//!     let listener = tokio::net::TcpListener::bind(&config.bind).await?;
//!     let state = AppState::open(config).await?;
//!     axum::serve(listener, router(state)).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod gc;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::{ConfigError, ServerConfig, StorageBackend, SuggestionBackend};
pub use error::{ApiError, ApiResponse};
pub use gc::{GcError, collect_garbage};
pub use routes::router;
pub use state::{AppState, Backends, StartupError};
