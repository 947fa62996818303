//! # Request Spawner
//!
//! A request-admission scheduler. Callers ask a [`Spawner`](core::Spawner) to
//! spawn a unit of work; a pluggable timing policy decides when, and whether, that
//! call turns into a dispatched request. Execution itself is delegated to an
//! executor the caller registers.
//!
//! ## Core Problem Solved
//!
//! UI-driven and event-driven clients fire far more requests than they should
//! send: keystrokes, scroll events, retries, polling. Each call needs a handle the
//! caller can observe and cancel immediately, even though the real request may
//! start later or never.
//!
//! - **Placeholders**: every `spawn` returns a [`Placeholder`](core::Placeholder)
//!   at once. It proxies the events and outcome of the request once one is bound,
//!   and settles with `None` when cancelled.
//! - **Policies**: `default`, `delay`, `interval`, `throttle`, `debounce` and
//!   `queue`, or any custom [`Policy`](core::Policy).
//! - **Stop**: cancel every outstanding placeholder in one call.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use request_spawner::builders::SpawnerBuilder;
//! use request_spawner::core::{FnExecutor, SpawnMode, SpawnerOptions};
//!
//! let spawner = SpawnerBuilder::new(
//!     SpawnerOptions::new()
//!         .with_mode(SpawnMode::Queue)
//!         .with_delay(Duration::from_millis(50)),
//! )
//! .with_adapter("http", FnExecutor::new(|params| async move {
//!     Ok(serde_json::Value::Object(params))
//! }))
//! .build()?;
//!
//! let first = spawner.spawn(params_a)?;
//! let second = spawner.spawn(params_b)?; // starts 50ms after `first` finishes
//! assert_eq!(second.outcome().await?, Some(expected));
//!
//! let report = spawner.stop().await;
//! ```
//!
//! For complete examples, see `tests/spawner_modes_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: placeholders, policies, spawner.
pub mod core;
/// Configuration models for spawners.
pub mod config;
/// Builders to construct spawners from configuration.
pub mod builders;
/// Runtime adapters.
pub mod runtime;
/// Shared utilities.
pub mod util;
