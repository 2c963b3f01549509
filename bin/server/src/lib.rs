//! keygate gateway server.
//!
//! The HTTP face of the keygate passwordless authentication broker: it
//! owns the signed session cookie, the login/validate/session/logout
//! routes, and the authorization gate in front of the per-tenant
//! database proxy.

pub mod app;
pub mod auth;
pub mod config;
pub mod proxy;

pub use app::router;
pub use auth::AppState;
pub use config::ServerConfig;
