//! Whole-file JSON snapshot persistence for the user store, written
//! atomically via a temp file + `fsync` + rename so a crash mid-write can
//! never leave a truncated store file behind, and a crash right after the
//! rename can never lose it to the page cache.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use super::model::StoreSnapshot;

pub fn load(path: &Path) -> anyhow::Result<StoreSnapshot> {
    if !path.exists() {
        return Ok(StoreSnapshot::default());
    }
    let data = std::fs::read(path)?;
    if data.is_empty() {
        return Ok(StoreSnapshot::default());
    }
    Ok(serde_json::from_slice(&data)?)
}

pub fn save(path: &Path, snapshot: &StoreSnapshot) -> anyhow::Result<()> {
    let tmp_path = path.with_extension("tmp");
    let data = serde_json::to_vec_pretty(snapshot)?;

    let mut file = File::create(&tmp_path)?;
    file.write_all(&data)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&tmp_path, path)?;

    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Ok(dir_handle) = File::open(dir) {
            let _ = dir_handle.sync_all();
        }
    }

    Ok(())
}
