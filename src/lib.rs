// src/lib.rs
//! Client for the job board REST backend.
//!
//! Requests go through one of two clients built from the same
//! [`ClientConfig`]: the authenticated [`ScopedClient`], which attaches a
//! role-scoped bearer token and recovers once from a 401 by refreshing it,
//! and the [`PublicClient`], which sends requests untouched.

/// Log through `tracing` at the given level: `app_log!(info, "...", args)`.
#[macro_export]
macro_rules! app_log {
    ($level:ident, $($arg:tt)+) => {
        ::tracing::$level!($($arg)+)
    };
}

pub mod claims;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod navigation;
pub mod role;
pub mod session;
pub mod storage;
pub mod transport;

pub use claims::TokenClaims;
pub use client::{ApiClients, PublicClient, ScopedClient, TrackedRequest};
pub use config::ClientConfig;
pub use error::HttpError;
pub use navigation::{Location, Navigator};
pub use role::{Role, RoleContext};
pub use session::Session;
pub use storage::{FileStore, MemoryStore, TokenStore};
pub use transport::{ApiRequest, ApiResponse, ReqwestTransport, RequestConfig, Transport};
