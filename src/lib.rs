//! OpenInsure Oracle Server Library
//!
//! This library exports the core modules for the OpenInsure oracle server:
//! the JSON-RPC contract gateway, the oracle registration/response services,
//! and the observability API surface.

pub mod app_state;
pub mod config;
pub mod contract;
pub mod eth;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
