//! Filesystem-backed module loader
//!
//! Module `a/b/C` is the JSON document `<root>/a/b/C.json`.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use typecfg_core::config::ModuleLoader;
use typecfg_core::errors::{Result, TypeCfgError};

/// Loads rule dependencies from JSON files under a root directory
#[derive(Debug, Clone)]
pub struct FsModuleLoader {
    root: PathBuf,
}

impl FsModuleLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path of a module id
    ///
    /// Ids must be relative paths made of normal segments, so a module can
    /// never resolve outside the root.
    pub fn module_path(&self, id: &str) -> Result<PathBuf> {
        let relative = Path::new(id);
        let well_formed = !id.is_empty()
            && !id.contains('\\')
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !well_formed {
            return Err(load_error(id, "module id is not a relative path"));
        }
        Ok(self.root.join(format!("{}.json", id)))
    }
}

fn load_error(id: &str, message: impl Into<String>) -> TypeCfgError {
    TypeCfgError::DependencyLoad {
        module_id: id.to_string(),
        message: message.into(),
    }
}

#[async_trait::async_trait]
impl ModuleLoader for FsModuleLoader {
    async fn require(&self, id: &str) -> Result<serde_json::Value> {
        let path = self.module_path(id)?;

        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                load_error(id, "module not found")
            } else {
                load_error(id, e.to_string())
            }
        })?;

        let value = serde_json::from_str(&content)
            .map_err(|e| load_error(id, format!("invalid JSON: {}", e)))?;

        tracing::debug!(module_id = id, path = %path.display(), "module loaded");
        Ok(value)
    }
}
