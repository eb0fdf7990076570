//! Resolving the working directory, configuration and store for a command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fixlog_config::paths::{find_project_root, global_config_path, project_config_path, state_dir};
use fixlog_config::{FixlogConfig, load_config};
use fixlog_core::AppError;
use fixlog_store::StoreLayout;

pub fn resolve_cwd(cd: Option<&str>) -> Result<PathBuf> {
    match cd {
        Some(dir) => {
            let path = PathBuf::from(dir);
            if !path.is_dir() {
                return Err(AppError::ProjectRootNotFound)
                    .with_context(|| format!("not a directory: {dir}"));
            }
            Ok(path)
        }
        None => std::env::current_dir().context("failed to read current directory"),
    }
}

/// Global config layered under the config of the project containing `cwd`.
pub fn load_config_for(cwd: &Path) -> FixlogConfig {
    let project_config = project_config_path(&find_project_root(cwd));
    load_config(global_config_path().as_deref(), Some(&project_config))
}

pub fn store_layout() -> StoreLayout {
    StoreLayout::new(state_dir())
}
