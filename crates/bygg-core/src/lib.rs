//! Core types and trait definitions for the bygg building-date engine.
//!
//! This crate is deliberately free of database and file I/O dependencies.
//! All other crates depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod building;
pub mod error;
pub mod estimate;
pub mod evidence;
pub mod store;
pub mod view;

pub use error::{Error, Result};
