//! Rate-limited gateway in front of a backend analysis service.
//!
//! One route, `GET /analyze?target=<string>`. Each client gets at most one
//! admitted request per cooldown; admitted requests are forwarded once, under
//! a total deadline, and the backend's status and body are relayed unchanged.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod upstream;

pub use config::schema::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
