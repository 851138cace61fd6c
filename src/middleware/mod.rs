//! Middleware
//! Mission: per-request observability shared by every route.

pub mod logging;

pub use logging::{request_logging, request_logging_simple};
