//! Write-to-temp-then-rename helpers shared by every file-backed store in
//! this crate. A part file or `cursor.json`/`state.json` is never visible
//! half-written: the bytes land in a sibling `.tmp-*` file, get fsynced,
//! then an atomic rename replaces the destination, and the parent
//! directory is fsynced so the rename itself survives a crash.

use std::path::Path;

use runtime_core::StoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

pub async fn write_json_durable<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp_path = path.with_file_name(format!(
        ".tmp-{}-{}",
        Uuid::new_v4(),
        path.file_name().and_then(|n| n.to_str()).unwrap_or("file")
    ));

    let mut file = fs::File::create(&tmp_path).await?;
    file.write_all(&bytes).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(&tmp_path, path).await?;

    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent).await {
            let _ = dir.sync_all().await;
        }
    }
    Ok(())
}

pub async fn read_json_opt<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
