use anyhow::Context;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

/// Files kept under the data directory.
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure_root(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))
    }

    pub fn store_file(&self) -> PathBuf {
        self.root.join("store.json")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Default location of additional workflow definitions.
    pub fn definitions_dir(&self) -> PathBuf {
        self.root.join("workflows")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn files_live_under_the_root() {
        let layout = DataLayout::new(PathBuf::from("/srv/hyopps"));
        assert_eq!(layout.store_file(), PathBuf::from("/srv/hyopps/store.json"));
        assert_eq!(layout.config_file(), PathBuf::from("/srv/hyopps/config.toml"));
        assert!(layout.definitions_dir().ends_with("workflows"));
    }

    #[test]
    fn ensure_root_creates_nested_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = DataLayout::new(dir.path().join("a").join("b"));
        layout.ensure_root().expect("create");
        assert!(layout.root().is_dir());
    }
}
