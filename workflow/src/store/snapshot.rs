use super::memory::Tables;
use anyhow::Context;
use fs4::fs_std::FileExt;
use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::path::Path;
use std::path::PathBuf;

pub(super) fn load(path: &Path) -> anyhow::Result<Tables> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read workflow store {}", path.display()))?;
    let tables: Tables = serde_json::from_str(&data).context("parse workflow store json")?;
    Ok(tables)
}

/// Writes the snapshot next to `path` first and renames it into place so a
/// crash never leaves a truncated store behind.
pub(super) fn save(tables: &Tables, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let tmp_path = sibling(path, ".tmp");
    let data = serde_json::to_vec_pretty(tables)?;
    fs::write(&tmp_path, data)
        .with_context(|| format!("failed to write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("failed to persist {}", path.display()))?;
    Ok(())
}

/// Blocks until this handle holds the exclusive lock on `<store>.lock`. The
/// lock lives on a sibling file because `save` replaces the store file itself.
pub(super) fn lock(path: &Path) -> anyhow::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let lock_path = sibling(path, ".lock");
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .with_context(|| format!("failed to open {}", lock_path.display()))?;
    FileExt::lock_exclusive(&file)
        .with_context(|| format!("failed to lock {}", lock_path.display()))?;
    Ok(file)
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut sibling = path.to_path_buf();
    let mut file_name = path
        .file_name()
        .map(|s| s.to_os_string())
        .unwrap_or_default();
    file_name.push(suffix);
    sibling.set_file_name(file_name);
    sibling
}
