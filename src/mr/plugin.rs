//! Build-time plugin registry.
//!
//! Rather than loading `Map`/`Reduce` symbols from a dynamically linked
//! shared object at worker startup, each sample application implements
//! [`Plugin`] once and is registered here at compile time; [`resolve`]
//! looks it up by name, fatal if absent, with no hot-reload.

use crate::error::EngineError;
use crate::mr::rpc::Pair;
use once_cell::sync::OnceCell;
use std::collections::HashMap;

/// A user map/reduce application.
pub trait Plugin: Send + Sync {
    /// The name workers/CLIs select this plugin by.
    fn name(&self) -> &'static str;

    /// `Map(filename, contents) -> pairs`.
    fn map(&self, filename: &str, contents: &str) -> Vec<Pair>;

    /// `Reduce(key, values) -> result`.
    fn reduce(&self, key: &str, values: &[String]) -> String;
}

static REGISTRY: OnceCell<HashMap<&'static str, Box<dyn Plugin>>> = OnceCell::new();

fn build_registry() -> HashMap<&'static str, Box<dyn Plugin>> {
    let mut registry: HashMap<&'static str, Box<dyn Plugin>> = HashMap::new();
    for plugin in crate::mr::plugins::all() {
        registry.insert(plugin.name(), plugin);
    }
    registry
}

/// Resolve a plugin by name. Absence of the name is a fatal startup error
/// for the caller.
pub fn resolve(name: &str) -> Result<&'static dyn Plugin, EngineError> {
    let registry = REGISTRY.get_or_init(build_registry);
    registry
        .get(name)
        .map(|plugin| plugin.as_ref())
        .ok_or_else(|| EngineError::PluginNotFound(name.to_string()))
}

/// The names of all registered plugins, for `--help` and error messages.
pub fn available_names() -> Vec<&'static str> {
    let registry = REGISTRY.get_or_init(build_registry);
    let mut names: Vec<&'static str> = registry.keys().copied().collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_plugins() {
        for name in ["wordcount", "grep", "inverted-index"] {
            assert!(resolve(name).is_ok(), "expected {name} to be registered");
        }
    }

    #[test]
    fn unknown_plugin_name_is_an_error() {
        let err = resolve("no-such-plugin").unwrap_err();
        assert!(matches!(err, EngineError::PluginNotFound(_)));
    }
}
