//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Bind listener → Serve
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C or trigger → Stop accepting → Drain in-flight requests → Exit
//! ```
//!
//! # Design Decisions
//! - Fail fast: invalid config or a failed bind ends the process
//! - Background tasks (idle sweep) subscribe to the same shutdown signal

pub mod shutdown;

pub use shutdown::Shutdown;
