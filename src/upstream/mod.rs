//! Upstream (backend analysis service) subsystem.
//!
//! # Data Flow
//! ```text
//! Admitted request with target:
//!     → client.rs (compose URL, single GET under a total deadline)
//!     → UpstreamResponse { status, streaming body, deadline }
//!     → http/response.rs (relay to caller unchanged)
//! ```
//!
//! The backend is opaque: its payload is never interpreted.

pub mod client;

pub use client::{UpstreamClient, UpstreamResponse};
