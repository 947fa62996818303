//! Runtime adapters for driving timers and request tasks.

pub mod tokio_spawner;

pub use tokio_spawner::TokioSpawner;
