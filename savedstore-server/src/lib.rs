//! The savedstore HTTP server.
//!
//! This builds on top of [`savedstore_service`], and exposes the
//! workspace and saved-object services as an HTTP API. Every request is
//! bound to an [`AuthContext`](savedstore_service::AuthContext) at the
//! transport boundary and served through the access-controlled client.

pub mod cli;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod extractors;
pub mod healthcheck;
pub mod observability;
pub mod state;
pub mod web;
