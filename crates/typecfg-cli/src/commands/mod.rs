pub mod rules;
pub mod select;

use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use typecfg_core::config::{Collaborators, ConfigurationService, Environment};
use typecfg_core::errors::ExError;
use typecfg_store::{load_global_config, load_rule_sets, FsModuleLoader};

/// Rule-set sources shared by every command
#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Rule-set file, or directory of `.yaml`/`.yml`/`.json` files (repeatable)
    #[arg(short, long, required = true)]
    pub rules: Vec<PathBuf>,

    /// Global configuration table
    #[arg(short, long)]
    pub global: Option<PathBuf>,

    /// Root directory of the JSON modules named by rule `deps`
    #[arg(short, long)]
    pub modules: Option<PathBuf>,
}

/// The environment rules are matched against
#[derive(Debug, Args)]
pub struct EnvArgs {
    #[arg(long)]
    pub user: Option<String>,

    #[arg(long)]
    pub theme: Option<String>,

    #[arg(long)]
    pub locale: Option<String>,

    #[arg(long)]
    pub application: Option<String>,
}

impl EnvArgs {
    pub fn environment(&self) -> Environment {
        Environment {
            user: self.user.clone(),
            theme: self.theme.clone(),
            locale: self.locale.clone(),
            application: self.application.clone(),
        }
    }
}

/// Expand directories into their rule files, sorted for determinism
fn collect_rule_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| is_rule_file(p))
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn is_rule_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext, "yaml" | "yml" | "json"))
        .unwrap_or(false)
}

/// Build a service holding every rule of `sources`
pub fn build_service(
    sources: &SourceArgs,
    environment: Environment,
) -> Result<ConfigurationService, Box<dyn std::error::Error>> {
    let mut collaborators = Collaborators::default();
    if let Some(global) = &sources.global {
        collaborators = collaborators.with_global(load_global_config(global)?);
    }
    if let Some(modules) = &sources.modules {
        collaborators = collaborators.with_loader(Arc::new(FsModuleLoader::new(modules)));
    }

    let mut service = ConfigurationService::with_collaborators(environment, collaborators);
    for rule_set in load_rule_sets(&collect_rule_files(&sources.rules)?)? {
        service.add(rule_set).map_err(ExError::from)?;
    }
    Ok(service)
}
