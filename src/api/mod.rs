//! HTTP surface for the scanner.
//!
//! A thin axum wrapper: `GET /health` and `POST /scan` (multipart field
//! `image`). The router is composable; `scan_router()` returns a `Router`
//! that tests drive with `oneshot` and `server` binds to a socket.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use router::scan_router;
pub use server::{start_scan_server, ScanServer};
pub use types::ApiContext;
