//! Plugin registry for managing plugin lifecycle and execution order
//!
//! The active ordering is published through an `ArcSwap`: request handlers
//! take a snapshot once and iterate it, administrative operations build a new
//! vector and swap it in. A reader therefore sees either the old or the new
//! ordering, never a half-updated one. Administrative operations are
//! serialised among themselves with an async mutex, since they await plugin
//! `initialize`/`cleanup`.

use crate::error::{HookFailure, PluginError, PluginResult};
use crate::plugins::core::{ObservabilityPlugin, Plugin};
use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use turbogate_types::{PluginConfig, PluginState, PluginStatus};

/// A registered plugin with its capability handles resolved
#[derive(Clone)]
pub struct PluginEntry {
    plugin: Arc<dyn Plugin>,
    observability: Option<Arc<dyn ObservabilityPlugin>>,
}

impl PluginEntry {
    /// Resolve capabilities once
    pub fn new(plugin: Arc<dyn Plugin>) -> Self {
        let observability = Arc::clone(&plugin).as_observability();
        Self {
            plugin,
            observability,
        }
    }

    /// Plugin name
    pub fn name(&self) -> &str {
        self.plugin.name()
    }

    /// Base plugin handle
    pub fn plugin(&self) -> &Arc<dyn Plugin> {
        &self.plugin
    }

    /// Observability handle, if the plugin has that capability
    pub fn observability(&self) -> Option<&Arc<dyn ObservabilityPlugin>> {
        self.observability.as_ref()
    }
}

impl fmt::Debug for PluginEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginEntry")
            .field("name", &self.name())
            .field("observability", &self.observability.is_some())
            .finish()
    }
}

/// Immutable view of the active ordering, shared by in-flight requests
pub type PluginSnapshot = Arc<Vec<PluginEntry>>;

/// Registry of plugins in execution order
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use turbogate_core::PluginRegistry;
/// use turbogate_types::PluginConfig;
///
/// # async fn example(plugin: Arc<dyn turbogate_core::Plugin>) -> Result<(), Box<dyn std::error::Error>> {
/// let registry = PluginRegistry::new();
/// registry.register(plugin, &PluginConfig::enabled("semantic-cache")).await?;
///
/// let snapshot = registry.snapshot();
/// assert_eq!(snapshot.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct PluginRegistry {
    active: ArcSwap<Vec<PluginEntry>>,
    disabled: Mutex<Vec<PluginEntry>>,
    statuses: RwLock<Vec<PluginStatus>>,
    admin: tokio::sync::Mutex<()>,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("active", &self.names())
            .field("disabled", &self.disabled.lock().len())
            .finish()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            active: ArcSwap::from_pointee(Vec::new()),
            disabled: Mutex::new(Vec::new()),
            statuses: RwLock::new(Vec::new()),
            admin: tokio::sync::Mutex::new(()),
        }
    }

    /// Register a plugin at the end of the ordering
    ///
    /// The plugin is initialized with `config.config` while in `loading`.
    /// Disabled plugins are kept (status `disabled`) but never executed.
    ///
    /// # Errors
    ///
    /// - A plugin with the same name is already registered
    /// - Plugin initialization failed (status becomes `error`)
    pub async fn register(
        &self,
        plugin: Arc<dyn Plugin>,
        config: &PluginConfig,
    ) -> PluginResult<()> {
        let _admin = self.admin.lock().await;
        let name = plugin.name().to_string();

        info!(plugin = %name, enabled = config.enabled, "Registering plugin");

        if self.contains(&name) {
            return Err(PluginError::configuration(format!(
                "Plugin '{}' is already registered",
                name
            )));
        }

        self.initialize(&plugin, config).await?;

        let entry = PluginEntry::new(plugin);
        if config.enabled {
            self.publish(|plugins| plugins.push(entry));
            self.record(&name, PluginState::Active, "registered");
            debug!(plugin = %name, "Plugin registered and active");
        } else {
            self.disabled.lock().push(entry);
            self.record(&name, PluginState::Disabled, "registered disabled");
            debug!(plugin = %name, "Plugin registered as disabled");
        }
        Ok(())
    }

    /// Swap in a new instance of a plugin
    ///
    /// An active plugin with the same name keeps its position; otherwise the new
    /// instance is appended. The previous instance (active or disabled) is
    /// cleaned up, with failures logged.
    ///
    /// # Errors
    ///
    /// Returns an error if the new instance fails to initialize; the old
    /// instance then stays in place.
    pub async fn replace(
        &self,
        plugin: Arc<dyn Plugin>,
        config: &PluginConfig,
    ) -> PluginResult<()> {
        let _admin = self.admin.lock().await;
        let name = plugin.name().to_string();

        info!(plugin = %name, "Replacing plugin");

        if !self.contains(&name) {
            self.initialize(&plugin, config).await?;
        } else if let Err(e) = plugin.initialize(config.config.as_ref()).await {
            // The serving instance keeps its status
            error!(plugin = %name, error = %e, "Replacement failed to initialize");
            self.append_log(&name, format!("replacement failed to initialize: {e}"));
            return Err(PluginError::initialization(format!("plugin '{name}': {e}")));
        }

        let entry = PluginEntry::new(plugin);
        let mut previous = None;
        self.publish(|plugins| {
            match plugins.iter().position(|p| p.name() == name) {
                Some(index) => previous = Some(std::mem::replace(&mut plugins[index], entry)),
                None => plugins.push(entry),
            }
        });
        if previous.is_none() {
            previous = self.take_disabled(&name);
        }

        if let Some(old) = previous {
            if let Err(e) = old.plugin().cleanup().await {
                warn!(plugin = %name, error = %e, "Cleanup of replaced plugin failed");
                self.append_log(&name, format!("cleanup of replaced instance failed: {e}"));
            }
        }

        self.record(&name, PluginState::Active, "replaced");
        Ok(())
    }

    /// Take an active plugin out of the execution ordering
    ///
    /// The plugin stays registered (and is still cleaned up at shutdown).
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotFound`] if no active plugin has that name.
    pub async fn disable(&self, name: &str) -> PluginResult<()> {
        let _admin = self.admin.lock().await;

        let mut removed = None;
        self.publish(|plugins| {
            if let Some(index) = plugins.iter().position(|p| p.name() == name) {
                removed = Some(plugins.remove(index));
            }
        });

        let entry = removed.ok_or_else(|| PluginError::not_found(name))?;
        self.disabled.lock().push(entry);
        self.record(name, PluginState::Disabled, "disabled");
        info!(plugin = %name, "Plugin disabled");
        Ok(())
    }

    /// Put a disabled plugin back at the end of the ordering
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotFound`] if no disabled plugin has that name.
    pub async fn enable(&self, name: &str) -> PluginResult<()> {
        let _admin = self.admin.lock().await;

        let entry = self
            .take_disabled(name)
            .ok_or_else(|| PluginError::not_found(name))?;
        self.publish(|plugins| plugins.push(entry));
        self.record(name, PluginState::Active, "enabled");
        info!(plugin = %name, "Plugin enabled");
        Ok(())
    }

    /// Remove a plugin entirely, calling its cleanup once
    ///
    /// Cleanup failures are logged and recorded in the status log, not returned.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotFound`] if no plugin has that name.
    pub async fn deregister(&self, name: &str) -> PluginResult<()> {
        let _admin = self.admin.lock().await;

        info!(plugin = %name, "Deregistering plugin");

        let mut removed = None;
        self.publish(|plugins| {
            if let Some(index) = plugins.iter().position(|p| p.name() == name) {
                removed = Some(plugins.remove(index));
            }
        });
        let entry = match removed {
            Some(entry) => entry,
            None => self
                .take_disabled(name)
                .ok_or_else(|| PluginError::not_found(name))?,
        };

        match entry.plugin().cleanup().await {
            Ok(()) => self.record(name, PluginState::Unloaded, "deregistered"),
            Err(e) => {
                warn!(plugin = %name, error = %e, "Plugin cleanup failed");
                self.record(name, PluginState::Unloaded, format!("cleanup failed: {e}"));
            }
        }
        Ok(())
    }

    /// Clean up every plugin exactly once and empty the registry
    ///
    /// Failures are logged and returned for inspection; they never stop the
    /// remaining cleanups.
    pub async fn shutdown(&self) -> Vec<HookFailure> {
        let _admin = self.admin.lock().await;

        let active = self.active.swap(Arc::new(Vec::new()));
        let disabled = std::mem::take(&mut *self.disabled.lock());
        let total = active.len() + disabled.len();

        info!(plugins = total, "Shutting down plugin registry");

        let mut failures = Vec::new();
        for entry in active.iter().chain(disabled.iter()) {
            let name = entry.name().to_string();
            match entry.plugin().cleanup().await {
                Ok(()) => self.record(&name, PluginState::Unloaded, "shutdown"),
                Err(e) => {
                    warn!(plugin = %name, error = %e, "Plugin cleanup failed during shutdown");
                    self.record(&name, PluginState::Unloaded, format!("cleanup failed: {e}"));
                    failures.push(HookFailure::new(&name, &e));
                }
            }
        }

        if !failures.is_empty() {
            warn!(
                failed = failures.len(),
                total, "Plugin registry shut down with cleanup failures"
            );
        }
        failures
    }

    /// Current active ordering
    pub fn snapshot(&self) -> PluginSnapshot {
        self.active.load_full()
    }

    /// Names of active plugins in execution order
    pub fn names(&self) -> Vec<String> {
        self.active
            .load()
            .iter()
            .map(|entry| entry.name().to_string())
            .collect()
    }

    /// Number of active plugins
    pub fn len(&self) -> usize {
        self.active.load().len()
    }

    /// Whether no plugin is active
    pub fn is_empty(&self) -> bool {
        self.active.load().is_empty()
    }

    /// Look up an active plugin by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.active
            .load()
            .iter()
            .find(|entry| entry.name() == name)
            .map(|entry| Arc::clone(entry.plugin()))
    }

    /// Active plugins with the observability capability, in execution order
    pub fn observability_plugins(&self) -> Vec<Arc<dyn ObservabilityPlugin>> {
        self.active
            .load()
            .iter()
            .filter_map(|entry| entry.observability().cloned())
            .collect()
    }

    /// Lifecycle status of every plugin the registry has seen, in first-seen order
    pub fn statuses(&self) -> Vec<PluginStatus> {
        self.statuses.read().clone()
    }

    /// Lifecycle status of one plugin
    pub fn status(&self, name: &str) -> Option<PluginStatus> {
        self.statuses
            .read()
            .iter()
            .find(|status| status.name == name)
            .cloned()
    }

    /// Record a lifecycle transition for a plugin
    ///
    /// Used by the registry itself and by loaders that fail before a plugin
    /// instance exists (e.g. unknown plugin name).
    pub fn record(&self, name: &str, state: PluginState, message: impl AsRef<str>) {
        let mut statuses = self.statuses.write();
        match statuses.iter_mut().find(|status| status.name == name) {
            Some(status) => status.transition(state, message),
            None => {
                let mut status = PluginStatus::new(name);
                status.transition(state, message);
                statuses.push(status);
            }
        }
    }

    fn append_log(&self, name: &str, line: String) {
        if let Some(status) = self
            .statuses
            .write()
            .iter_mut()
            .find(|status| status.name == name)
        {
            status.logs.push(line);
        }
    }

    async fn initialize(&self, plugin: &Arc<dyn Plugin>, config: &PluginConfig) -> PluginResult<()> {
        let name = plugin.name();
        self.record(name, PluginState::Loading, "initializing");

        plugin.initialize(config.config.as_ref()).await.map_err(|e| {
            error!(plugin = %name, error = %e, "Failed to initialize plugin");
            self.record(name, PluginState::Error, format!("initialization failed: {e}"));
            PluginError::initialization(format!("plugin '{name}': {e}"))
        })
    }

    fn contains(&self, name: &str) -> bool {
        self.active.load().iter().any(|entry| entry.name() == name)
            || self.disabled.lock().iter().any(|entry| entry.name() == name)
    }

    fn take_disabled(&self, name: &str) -> Option<PluginEntry> {
        let mut disabled = self.disabled.lock();
        let index = disabled.iter().position(|entry| entry.name() == name)?;
        Some(disabled.remove(index))
    }

    /// Copy-on-write update of the active ordering
    ///
    /// Callers hold the admin lock, so there is no concurrent writer to lose.
    fn publish(&self, update: impl FnOnce(&mut Vec<PluginEntry>)) {
        let mut next = Vec::clone(&self.active.load());
        update(&mut next);
        self.active.store(Arc::new(next));
    }
}
