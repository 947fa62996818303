//! Builder to construct spawners from options or configuration.

use std::sync::Arc;

use crate::config::SpawnerConfig;
use crate::core::{
    AdapterRegistry, AuditSink, Executor, Spawn, SpawnError, Spawner, SpawnerOptions,
};
use crate::runtime::TokioSpawner;

/// Assembles a [`Spawner`] from options, adapters, runtime and audit sink.
pub struct SpawnerBuilder {
    name: String,
    options: SpawnerOptions,
    adapters: AdapterRegistry,
    runtime: Option<Arc<dyn Spawn>>,
    audit: Option<Box<dyn AuditSink>>,
}

impl SpawnerBuilder {
    /// Start from runtime options.
    pub fn new(options: SpawnerOptions) -> Self {
        Self {
            name: "spawner".into(),
            options,
            adapters: AdapterRegistry::new(),
            runtime: None,
            audit: None,
        }
    }

    /// Start from serialized configuration.
    ///
    /// # Errors
    ///
    /// [`SpawnError::InvalidConfig`] when the configuration does not validate.
    pub fn from_config(cfg: &SpawnerConfig) -> Result<Self, SpawnError> {
        let options = cfg
            .to_options()
            .map_err(|e| SpawnError::InvalidConfig(format!("config invalid: {e}")))?;
        Ok(Self::new(options))
    }

    /// Name used in logs and audit events.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Register an executor selectable through the `adapter` field.
    #[must_use]
    pub fn with_adapter<E: Executor>(mut self, name: impl Into<String>, executor: E) -> Self {
        self.adapters.register(name, Arc::new(executor));
        self
    }

    /// Adapter used when parameters carry no `adapter` field.
    #[must_use]
    pub fn with_default_adapter(mut self, name: impl Into<String>) -> Self {
        self.adapters.set_default(name);
        self
    }

    /// Run timers and requests on `runtime` instead of the current tokio runtime.
    #[must_use]
    pub fn with_runtime(mut self, runtime: Arc<dyn Spawn>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Build the spawner.
    ///
    /// # Errors
    ///
    /// Invalid options, or no runtime given and none current.
    pub fn build(self) -> Result<Spawner, SpawnError> {
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Arc::new(TokioSpawner::current()?),
        };
        Spawner::from_parts(self.name, self.options, runtime, self.adapters, self.audit)
    }
}
