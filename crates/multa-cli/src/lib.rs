//! Multa CLI Library
//!
//! Configuration loading, service wiring and the command handlers behind the
//! `multa` binary. Handlers take a `FinesService` so they run unchanged
//! against in-memory handlers.

/// Command handlers, one module per area
pub mod commands;

/// Configuration loading and service wiring
pub mod config;
