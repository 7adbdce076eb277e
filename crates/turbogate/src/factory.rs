//! Plugin construction from configuration

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use turbogate_core::Plugin;
use turbogate_telemetry::TraceLogger;
use turbogate_types::PluginConfig;

type Constructor =
    Box<dyn Fn(&PluginConfig) -> anyhow::Result<Arc<dyn Plugin>> + Send + Sync + 'static>;

/// Builds plugin instances by name for [`Gateway::from_config`](crate::Gateway::from_config)
///
/// The constructor receives the whole descriptor; plugin-specific settings
/// also reach the instance later through `Plugin::initialize`.
///
/// ```rust
/// use std::sync::Arc;
/// use turbogate::PluginFactory;
/// use turbogate_core::Plugin;
/// use turbogate_telemetry::TraceLogger;
///
/// let factory = PluginFactory::new().with("trace-logger", |_config| {
///     let plugin: Arc<dyn Plugin> = Arc::new(TraceLogger::new());
///     Ok(plugin)
/// });
/// assert!(factory.contains("trace-logger"));
/// ```
#[derive(Default)]
pub struct PluginFactory {
    constructors: HashMap<String, Constructor>,
}

impl fmt::Debug for PluginFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.constructors.keys().collect();
        names.sort();
        f.debug_struct("PluginFactory")
            .field("plugins", &names)
            .finish()
    }
}

impl PluginFactory {
    /// Factory with no constructors
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory that knows the plugins shipped with the gateway
    pub fn with_builtins() -> Self {
        Self::new().with(TraceLogger::NAME, |_config| {
            let plugin: Arc<dyn Plugin> = Arc::new(TraceLogger::new());
            Ok(plugin)
        })
    }

    /// Add a constructor, replacing any previous one for `name`
    #[must_use]
    pub fn with<F>(mut self, name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&PluginConfig) -> anyhow::Result<Arc<dyn Plugin>> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Box::new(constructor));
        self
    }

    /// Whether a constructor exists for `name`
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Build the plugin a descriptor names
    ///
    /// Returns `None` when no constructor is registered for that name.
    pub fn build(&self, config: &PluginConfig) -> Option<anyhow::Result<Arc<dyn Plugin>>> {
        self.constructors
            .get(&config.name)
            .map(|constructor| constructor(config))
    }
}
