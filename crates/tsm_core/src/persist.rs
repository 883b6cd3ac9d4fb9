use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use crate::core_api::{CoreError, CoreErrorCode};

pub fn read_text(path: &Path) -> Result<String, CoreError> {
    fs::read_to_string(path)
        .map_err(|e| CoreError::io(format!("failed to read {}", path.display()), e))
}

/// Write `contents` to a sibling temp file, then rename it over `path`.
///
/// On failure the temp file is removed and `path` keeps its previous contents.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), CoreError> {
    let file_name = path.file_name().ok_or_else(|| {
        CoreError::new(
            CoreErrorCode::InvalidInput,
            format!("{} has no file name", path.display()),
        )
    })?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut temp_name = OsString::from(file_name);
    temp_name.push(".tmp");
    let mut temp_path = parent.join(temp_name);
    if temp_path.exists() {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let mut temp_name = OsString::from(file_name);
        temp_name.push(format!(".{stamp}.tmp"));
        temp_path = parent.join(temp_name);
    }

    if let Err(e) = write_synced(&temp_path, contents) {
        let _ = fs::remove_file(&temp_path);
        return Err(CoreError::io(
            format!("failed to write {}", temp_path.display()),
            e,
        ));
    }
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(CoreError::io(
            format!("failed to replace {}", path.display()),
            e,
        ));
    }
    debug!("wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

fn write_synced(path: &Path, contents: &str) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}

/// Copy `path` to `<stem>_<unix seconds>.<ext>` in `backup_dir` (default: next
/// to the file). A numeric suffix is added if that name is taken.
pub fn create_backup(path: &Path, backup_dir: Option<&Path>) -> Result<PathBuf, CoreError> {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let dir = match backup_dir {
        Some(dir) => dir.to_path_buf(),
        None => match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        },
    };
    fs::create_dir_all(&dir)
        .map_err(|e| CoreError::io(format!("failed to create {}", dir.display()), e))?;

    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "profile".to_string());
    let extension = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    let mut backup = dir.join(format!("{stem}_{stamp}{extension}"));
    let mut attempt = 1;
    while backup.exists() {
        backup = dir.join(format!("{stem}_{stamp}_{attempt}{extension}"));
        attempt += 1;
    }

    fs::copy(path, &backup).map_err(|e| {
        CoreError::io(
            format!("failed to back up {} to {}", path.display(), backup.display()),
            e,
        )
    })?;
    info!("backed up {} to {}", path.display(), backup.display());
    Ok(backup)
}
