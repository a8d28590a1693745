//! Marksync: personal bookmark manager core.
//!
//! Reconciles authentication state, an owner-scoped bookmark collection and a
//! live change stream into one consistent view for a presentation layer.
//! This library crate exposes all modules for use by the binary and integration tests.

pub mod app;
pub mod database;
pub mod managers;
pub mod platform;
pub mod rpc_handler;
pub mod services;
pub mod types;
