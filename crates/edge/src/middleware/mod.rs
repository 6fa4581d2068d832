//! HTTP middleware for the edge.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors)
//! 2. `TraceLayer` (request span with `request_id`)
//! 3. Request ID (generated here for every inbound request)

pub mod request_id;

pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
