//! HTTP server wiring for the Hitobito login client.
//!
//! The binary in `main.rs` assembles the pieces exposed here: strongly
//! typed configuration, the OAuth client, the database repositories, the
//! login and logout routes, and the expiry reaper.

pub mod auth;
pub mod config;
pub mod cron;
