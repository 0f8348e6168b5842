//! Client-level integration tests
//!
//! Connection handles, concurrent use of one search client, the one-time
//! collection load, and config-driven connections.
//!
//! ```bash
//! cargo test --test clients
//! ```

#[path = "../common/mod.rs"]
mod common;

mod concurrency;
mod config;
mod lifecycle;
