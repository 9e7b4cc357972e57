//! # clerk-sync
//!
//! Receives Clerk webhooks, verifies their svix signatures and keeps a local
//! `users` table in sync with the identity provider.

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod repositories;
pub mod server;
pub mod sync;
pub mod telemetry;
pub mod webhook_verification;
pub use migration;
