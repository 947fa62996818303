//! Configuration models for spawners.

pub mod spawner;

pub use spawner::SpawnerConfig;
