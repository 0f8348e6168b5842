//! Behavioral properties of the upsert/search pipeline
//!
//! Each module checks one guarantee end to end through the public clients,
//! using the memory backend or a scripted double of it.
//!
//! ```bash
//! cargo test --test properties
//! cargo test --test properties self_match::
//! ```

#[path = "../common/mod.rs"]
mod common;

mod batch_atomicity;
mod limit_order;
mod manifest;
mod replace;
mod resolver_defaults;
mod self_match;
