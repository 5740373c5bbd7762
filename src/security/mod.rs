//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming GET request:
//!     → client_identity.rs (derive client identifier)
//!     → rate_limit.rs (admit or reject with 429)
//!     → Pass to handler
//! ```
//!
//! # Design Decisions
//! - Admission happens before any upstream work begins
//! - Forwarded-address headers are advisory, never authenticated
//! - Registry lock is never held across I/O

pub mod client_identity;
pub mod rate_limit;

pub use client_identity::ClientIdentity;
pub use rate_limit::{Admission, AdmissionController, ClientId};
