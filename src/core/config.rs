//! Configuration management with layered hierarchy
//!
//! Only the CLI consults this; the library core reads no files or environment.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::core::session::SessionOptions;

/// Directory holding project-local settings
pub const PROJECT_DIR: &str = ".sform";

/// sform configuration, merged from defaults, user, project and environment
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Extra directories scanned for `*.schema.yaml` files
    pub schema_dirs: Vec<PathBuf>,

    /// Default store document for create/update/fill
    pub store: Option<PathBuf>,

    /// Re-check a field as soon as it is edited
    pub revalidate_on_edit: Option<bool>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::load_from(Self::global_config_path().as_deref(), &cwd)
    }

    /// Load with an explicit global config path and project root
    pub fn load_from(global: Option<&Path>, project_root: &Path) -> Self {
        let mut config = Config::default();

        // 1. Built-in defaults (Default impl)

        // 2. Global user config (~/.config/sform/config.yaml)
        if let Some(global) = global.and_then(Self::read_file) {
            config.merge(global);
        }

        // 3. Project config (.sform/config.yaml)
        let project_path = project_root.join(PROJECT_DIR).join("config.yaml");
        if let Some(mut project) = Self::read_file(&project_path) {
            // Relative paths in project config are relative to the project root
            project.schema_dirs = project
                .schema_dirs
                .into_iter()
                .map(|dir| project_root.join(dir))
                .collect();
            project.store = project.store.map(|store| project_root.join(store));
            config.merge(project);
        }

        // 4. Environment variables
        if let Ok(store) = std::env::var("SFORM_STORE") {
            if !store.is_empty() {
                config.store = Some(PathBuf::from(store));
            }
        }
        if let Ok(dir) = std::env::var("SFORM_SCHEMA_DIR") {
            if !dir.is_empty() {
                config.schema_dirs.push(PathBuf::from(dir));
            }
        }

        config
    }

    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "sform")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    fn read_file(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config");
                None
            }
        }
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        self.schema_dirs.extend(other.schema_dirs);
        if other.store.is_some() {
            self.store = other.store;
        }
        if other.revalidate_on_edit.is_some() {
            self.revalidate_on_edit = other.revalidate_on_edit;
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            revalidate_on_edit: self
                .revalidate_on_edit
                .unwrap_or(SessionOptions::default().revalidate_on_edit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_project_overrides_global() {
        let tmp = tempdir().unwrap();
        let global = tmp.path().join("global.yaml");
        std::fs::write(
            &global,
            "store: /tmp/global-store.yaml\nrevalidate_on_edit: false\nschema_dirs: [/opt/schemas]\n",
        )
        .unwrap();

        let project = tmp.path().join("project");
        std::fs::create_dir_all(project.join(PROJECT_DIR)).unwrap();
        std::fs::write(
            project.join(PROJECT_DIR).join("config.yaml"),
            "store: data/store.yaml\nschema_dirs: [schemas]\n",
        )
        .unwrap();

        let config = Config::load_from(Some(&global), &project);
        assert_eq!(config.store, Some(project.join("data/store.yaml")));
        assert_eq!(config.revalidate_on_edit, Some(false));
        assert!(!config.session_options().revalidate_on_edit);
        assert_eq!(config.schema_dirs.first(), Some(&PathBuf::from("/opt/schemas")));
        assert!(config.schema_dirs.contains(&project.join("schemas")));
    }

    #[test]
    fn test_missing_and_broken_files_are_ignored() {
        let tmp = tempdir().unwrap();
        let global = tmp.path().join("global.yaml");
        std::fs::write(&global, "store: [unterminated\n").unwrap();

        let config = Config::load_from(Some(&global), tmp.path());
        assert!(config.session_options().revalidate_on_edit);
        assert!(config.schema_dirs.iter().all(|d| !d.starts_with(tmp.path())));
    }
}
