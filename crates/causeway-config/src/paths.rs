//! Where a deployment's configuration files live.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

/// Deployment config, tracked alongside the deployment. Its presence marks
/// an initialized directory.
pub const PROJECT_CONFIG_FILE: &str = "causeway.toml";

/// Untracked overrides layered over [`PROJECT_CONFIG_FILE`].
pub const LOCAL_CONFIG_FILE: &str = "causeway.local.toml";

/// The configuration files that apply to one deployment directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFiles {
    /// `config.toml` in the platform config dir, when the platform has one.
    user: Option<PathBuf>,
    project: PathBuf,
    local: PathBuf,
}

impl ConfigFiles {
    pub fn for_dir(project_dir: impl AsRef<Path>) -> Self {
        let dir = project_dir.as_ref();
        Self {
            user: ProjectDirs::from("com", "Causeway", "causeway")
                .map(|dirs| dirs.config_dir().join("config.toml")),
            project: dir.join(PROJECT_CONFIG_FILE),
            local: dir.join(LOCAL_CONFIG_FILE),
        }
    }

    pub fn project(&self) -> &Path {
        &self.project
    }

    /// True once `causeway init` (or an operator) has written the project file.
    pub fn is_initialized(&self) -> bool {
        self.project.exists()
    }

    /// Files present on disk, lowest precedence first: user, project, local.
    pub fn existing(&self) -> Vec<PathBuf> {
        self.user
            .iter()
            .chain([&self.project, &self.local])
            .filter(|path| path.exists())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_initialized_once_project_file_exists() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let files = ConfigFiles::for_dir(temp_dir.path());

        assert_eq!(files.project(), temp_dir.path().join("causeway.toml"));
        assert!(!files.is_initialized());

        fs::write(files.project(), "[cluster]\nreplicas = 3\n").unwrap();
        assert!(files.is_initialized());
    }

    #[test]
    fn test_existing_files_in_precedence_order() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let dir = temp_dir.path();
        let files = ConfigFiles::for_dir(dir);
        let in_dir = |files: &ConfigFiles| -> Vec<PathBuf> {
            files
                .existing()
                .into_iter()
                .filter(|path| path.starts_with(dir))
                .collect()
        };

        fs::write(dir.join(LOCAL_CONFIG_FILE), "").unwrap();
        assert_eq!(in_dir(&files), vec![dir.join(LOCAL_CONFIG_FILE)]);

        fs::write(dir.join(PROJECT_CONFIG_FILE), "").unwrap();
        assert_eq!(
            in_dir(&files),
            vec![dir.join(PROJECT_CONFIG_FILE), dir.join(LOCAL_CONFIG_FILE)]
        );
    }
}
