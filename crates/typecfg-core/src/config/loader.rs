//! Collaborators the configuration service resolves and loads modules through
//!
//! The service treats module resolution and loading as opaque. In-memory
//! defaults are provided for embedding and tests; `typecfg-store` adds a
//! filesystem loader.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, TypeCfgError};

/// Turns a possibly relative module id into an absolute one
pub trait ModuleResolver: Send + Sync {
    fn resolve_module_id(&self, id: &str, context_id: Option<&str>) -> Result<String>;
}

/// A module known to the metadata service
#[async_trait::async_trait]
pub trait ModuleMeta: Send + Sync {
    fn id(&self) -> &str;

    async fn load(&self) -> Result<Value>;
}

/// Registered module metadata, addressable by id or alias
pub trait ModuleMetaService: Send + Sync {
    /// Canonical id for an alias or id; `None` when unknown
    fn get_id(&self, alias_or_id: &str) -> Option<String>;

    fn get(&self, id: &str) -> Option<Arc<dyn ModuleMeta>>;
}

/// Generic loader used for dependencies with no registered metadata
#[async_trait::async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn require(&self, id: &str) -> Result<Value>;
}

// ---------------------------------------------------------------------------
// Resolver

/// AMD-style resolution: `./x` and `../x` are relative to the directory of
/// the context id; anything else is already absolute.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelativeModuleResolver;

impl ModuleResolver for RelativeModuleResolver {
    fn resolve_module_id(&self, id: &str, context_id: Option<&str>) -> Result<String> {
        if !(id.starts_with("./") || id.starts_with("../")) {
            return Ok(id.to_string());
        }

        let mut segments: Vec<&str> = match context_id {
            Some(ctx) => {
                let mut parts: Vec<&str> = ctx.split('/').collect();
                parts.pop();
                parts
            }
            None => Vec::new(),
        };

        for segment in id.split('/') {
            match segment {
                "." | "" => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(TypeCfgError::argument_invalid(
                            "module id",
                            format!("'{}' escapes the root of '{}'", id, context_id.unwrap_or("")),
                        ));
                    }
                }
                other => segments.push(other),
            }
        }

        Ok(segments.join("/"))
    }
}

// ---------------------------------------------------------------------------
// Metadata registry

/// A module whose value is known up front; counts how often it is loaded
#[derive(Debug)]
pub struct ValueModule {
    id: String,
    value: Value,
    loads: AtomicUsize,
}

impl ValueModule {
    pub fn new(id: impl Into<String>, value: Value) -> Self {
        Self {
            id: id.into(),
            value,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ModuleMeta for ValueModule {
    fn id(&self) -> &str {
        &self.id
    }

    async fn load(&self) -> Result<Value> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.value.clone())
    }
}

/// In-memory `ModuleMetaService`
#[derive(Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn ModuleMeta>>,
    aliases: HashMap<String, String>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module: Arc<dyn ModuleMeta>) {
        self.modules.insert(module.id().to_string(), module);
    }

    pub fn alias(&mut self, alias: impl Into<String>, id: impl Into<String>) {
        self.aliases.insert(alias.into(), id.into());
    }
}

impl ModuleMetaService for ModuleRegistry {
    fn get_id(&self, alias_or_id: &str) -> Option<String> {
        if self.modules.contains_key(alias_or_id) {
            return Some(alias_or_id.to_string());
        }
        self.aliases.get(alias_or_id).cloned()
    }

    fn get(&self, id: &str) -> Option<Arc<dyn ModuleMeta>> {
        self.modules.get(id).cloned()
    }
}

// ---------------------------------------------------------------------------
// Loader

/// In-memory `ModuleLoader` keyed by module id
#[derive(Debug, Default)]
pub struct StaticModuleLoader {
    modules: HashMap<String, Value>,
    requests: Mutex<HashMap<String, usize>>,
}

impl StaticModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, id: impl Into<String>, value: Value) -> Self {
        self.modules.insert(id.into(), value);
        self
    }

    /// Number of `require` calls seen for `id`, found or not
    pub fn request_count(&self, id: &str) -> usize {
        self.requests
            .lock()
            .map(|r| r.get(id).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl ModuleLoader for StaticModuleLoader {
    async fn require(&self, id: &str) -> Result<Value> {
        if let Ok(mut requests) = self.requests.lock() {
            *requests.entry(id.to_string()).or_insert(0) += 1;
        }
        self.modules
            .get(id)
            .cloned()
            .ok_or_else(|| TypeCfgError::DependencyLoad {
                module_id: id.to_string(),
                message: "module not found".to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Global configuration

/// Static per-module configuration consulted before any rule applies
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalConfig {
    entries: HashMap<String, Value>,
}

impl GlobalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, module_id: impl Into<String>, config: Value) -> Self {
        self.insert(module_id, config);
        self
    }

    pub fn insert(&mut self, module_id: impl Into<String>, config: Value) {
        self.entries.insert(module_id.into(), config);
    }

    pub fn get(&self, module_id: &str) -> Option<&Value> {
        self.entries.get(module_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The set of collaborators a `ConfigurationService` is wired with
#[derive(Clone)]
pub struct Collaborators {
    pub resolver: Arc<dyn ModuleResolver>,
    pub meta: Arc<dyn ModuleMetaService>,
    pub loader: Arc<dyn ModuleLoader>,
    pub global: GlobalConfig,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            resolver: Arc::new(RelativeModuleResolver),
            meta: Arc::new(ModuleRegistry::new()),
            loader: Arc::new(StaticModuleLoader::new()),
            global: GlobalConfig::new(),
        }
    }
}

impl Collaborators {
    pub fn with_meta(mut self, meta: Arc<dyn ModuleMetaService>) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_global(mut self, global: GlobalConfig) -> Self {
        self.global = global;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ModuleResolver>) -> Self {
        self.resolver = resolver;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolver_passes_absolute_ids_through() {
        let r = RelativeModuleResolver;
        assert_eq!(
            r.resolve_module_id("pentaho/visual/Bar", Some("my/pkg/config")).unwrap(),
            "pentaho/visual/Bar"
        );
    }

    #[test]
    fn test_resolver_relative_to_context_directory() {
        let r = RelativeModuleResolver;
        assert_eq!(
            r.resolve_module_id("./Model", Some("my/pkg/config")).unwrap(),
            "my/pkg/Model"
        );
        assert_eq!(
            r.resolve_module_id("../other/View", Some("my/pkg/config")).unwrap(),
            "my/other/View"
        );
    }

    #[test]
    fn test_resolver_rejects_escaping_root() {
        let r = RelativeModuleResolver;
        let err = r.resolve_module_id("../../x", Some("a/b")).unwrap_err();
        assert!(matches!(err, TypeCfgError::ArgumentInvalid { .. }));
    }

    #[test]
    fn test_registry_resolves_alias() {
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::new(ValueModule::new("pkg/Dep", json!(1))));
        registry.alias("dep", "pkg/Dep");

        assert_eq!(registry.get_id("dep").as_deref(), Some("pkg/Dep"));
        assert_eq!(registry.get_id("pkg/Dep").as_deref(), Some("pkg/Dep"));
        assert_eq!(registry.get_id("nope"), None);
        assert!(registry.get("pkg/Dep").is_some());
    }

    #[tokio::test]
    async fn test_static_loader_counts_requests() {
        let loader = StaticModuleLoader::new().with_module("a", json!({"k": 1}));

        assert_eq!(loader.require("a").await.unwrap(), json!({"k": 1}));
        let err = loader.require("missing").await.unwrap_err();

        assert!(matches!(err, TypeCfgError::DependencyLoad { ref module_id, .. } if module_id == "missing"));
        assert_eq!(loader.request_count("a"), 1);
        assert_eq!(loader.request_count("missing"), 1);
    }
}
