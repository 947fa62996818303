//! Builders to construct spawners from options and configuration.

pub mod spawner_builder;

pub use spawner_builder::SpawnerBuilder;
