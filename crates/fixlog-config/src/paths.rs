use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// XDG app name used for config and state directories.
pub const APP_NAME: &str = "fixlog";
/// Overrides the state directory (used by tests and portable installs).
pub const HOME_ENV: &str = "FIXLOG_HOME";
/// Per-project config lives at `<project>/.fixlog/config.toml`.
pub const PROJECT_CONFIG_DIR: &str = ".fixlog";
const CONFIG_FILE_NAME: &str = "config.toml";
const PROJECT_HASH_LEN: usize = 16;

fn project_state_dir(app_name: &str) -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", app_name).map(|dirs| {
        dirs.state_dir()
            .unwrap_or_else(|| dirs.data_local_dir())
            .to_path_buf()
    })
}

pub fn state_dir_fallback() -> PathBuf {
    std::env::temp_dir().join(format!("{APP_NAME}-state"))
}

/// Resolve the state directory given the value of [`HOME_ENV`].
pub fn state_dir_from(home_override: Option<&str>) -> PathBuf {
    if let Some(home) = home_override.map(str::trim).filter(|value| !value.is_empty()) {
        return PathBuf::from(home);
    }
    project_state_dir(APP_NAME).unwrap_or_else(state_dir_fallback)
}

/// State directory holding every persisted fixlog file.
pub fn state_dir() -> PathBuf {
    state_dir_from(std::env::var(HOME_ENV).ok().as_deref())
}

pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

pub fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_CONFIG_DIR).join(CONFIG_FILE_NAME)
}

/// Stable hash of a project root: first 16 hex chars of SHA-256 over the
/// canonical path.
pub fn project_hash(project_root: &Path) -> String {
    let canonical = project_root
        .canonicalize()
        .unwrap_or_else(|_| project_root.to_path_buf());
    let digest = Sha256::digest(canonical.to_string_lossy().as_bytes());
    let hex = format!("{digest:x}");
    hex[..PROJECT_HASH_LEN].to_string()
}

/// Walk up from `start` to the nearest directory containing `.git`;
/// fall back to `start` itself.
pub fn find_project_root(start: &Path) -> PathBuf {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .unwrap_or(start)
        .to_path_buf()
}

/// The per-project slice of the store: display name plus stable hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectScope {
    pub root: PathBuf,
    pub name: String,
    pub hash: String,
}

impl ProjectScope {
    pub fn from_root(root: &Path) -> Self {
        let name = root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| root.to_string_lossy().into_owned());
        Self {
            root: root.to_path_buf(),
            name,
            hash: project_hash(root),
        }
    }

    /// Scope for the project containing `cwd`.
    pub fn discover(cwd: &Path) -> Self {
        Self::from_root(&find_project_root(cwd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_dir_override() {
        assert_eq!(
            state_dir_from(Some("/tmp/fixlog-test-home")),
            PathBuf::from("/tmp/fixlog-test-home")
        );
    }

    #[test]
    fn test_state_dir_blank_override_ignored() {
        let resolved = state_dir_from(Some("   "));
        assert_ne!(resolved, PathBuf::from("   "));
        assert!(resolved.to_string_lossy().contains(APP_NAME));
    }

    #[test]
    fn test_project_hash_is_stable_and_short() {
        let dir = tempfile::tempdir().unwrap();
        let first = project_hash(dir.path());
        let second = project_hash(dir.path());
        assert_eq!(first, second);
        assert_eq!(first.len(), PROJECT_HASH_LEN);
        assert!(first.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn test_project_hash_differs_per_path() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        assert_ne!(project_hash(a.path()), project_hash(b.path()));
    }

    #[test]
    fn test_find_project_root_walks_up_to_git() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        let nested = dir.path().join("src").join("components");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_project_root(&nested), dir.path());
    }

    #[test]
    fn test_scope_name_is_last_component() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("my-app");
        std::fs::create_dir_all(&root).unwrap();
        let scope = ProjectScope::from_root(&root);
        assert_eq!(scope.name, "my-app");
        assert_eq!(scope.hash, project_hash(&root));
    }

    #[test]
    fn test_project_config_path() {
        let path = project_config_path(Path::new("/work/app"));
        assert_eq!(path, PathBuf::from("/work/app/.fixlog/config.toml"));
    }
}
