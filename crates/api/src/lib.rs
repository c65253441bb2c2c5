//! Stride API - Public JSON API for the points ledger.
//!
//! Exposes the engine's operations over HTTP:
//!
//! - balance reads, step reports, daily validation
//! - basket checkout and order lifecycle
//! - two-phase transfers, donations, administrative grants
//! - an SSE feed of committed-change entity ids
//!
//! The binary in `main.rs` wires configuration, Sentry, tracing, the
//! PostgreSQL pool, and the router. This library crate exists so the CLI
//! can reuse the token codec and store, and so tests can build routers
//! without a process.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use state::AppState;
