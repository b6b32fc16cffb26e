//! Zip archive of a finished session folder.

use crate::error::{HubError, Result};
use std::fs::File;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Compresses `folder` into `<folder>.zip` beside it and returns the archive
/// path. Entry names are relative to the folder.
pub async fn create_zip_from_folder(folder: &Path) -> Result<PathBuf> {
    let name = folder
        .file_name()
        .ok_or_else(|| HubError::export(format!("Cannot archive {}", folder.display())))?
        .to_string_lossy()
        .into_owned();
    let zip_path = folder.with_file_name(format!("{name}.zip"));

    let source = folder.to_path_buf();
    let bytes = tokio::task::spawn_blocking(move || build_archive(&source))
        .await
        .map_err(|e| HubError::internal(format!("Archive task failed: {e}")))??;

    tokio::fs::write(&zip_path, &bytes).await.map_err(|e| {
        HubError::export(format!("Failed to write {}: {e}", zip_path.display()))
    })?;

    info!(
        archive = %zip_path.display(),
        size = bytes.len(),
        "archived session folder"
    );
    Ok(zip_path)
}

fn build_archive(folder: &Path) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .compression_level(Some(9));

    add_directory(&mut writer, folder, folder, options)?;

    let finished = writer
        .finish()
        .map_err(|e| HubError::export(format!("Failed to finalize archive: {e}")))?;
    Ok(finished.into_inner())
}

fn add_directory(
    writer: &mut ZipWriter<Cursor<Vec<u8>>>,
    root: &Path,
    dir: &Path,
    options: SimpleFileOptions,
) -> Result<()> {
    let mut entries = std::fs::read_dir(dir)
        .and_then(|entries| entries.collect::<std::io::Result<Vec<_>>>())
        .map_err(|e| HubError::export(format!("Failed to read {}: {e}", dir.display())))?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let entry_name = relative_name(root, &path)?;

        if path.is_dir() {
            writer
                .add_directory(format!("{entry_name}/"), options)
                .map_err(|e| HubError::export(format!("Failed to add {entry_name}/: {e}")))?;
            add_directory(writer, root, &path, options)?;
        } else {
            writer
                .start_file(entry_name.as_str(), options)
                .map_err(|e| HubError::export(format!("Failed to add {entry_name}: {e}")))?;
            let mut file = File::open(&path)
                .map_err(|e| HubError::export(format!("Failed to open {}: {e}", path.display())))?;
            std::io::copy(&mut file, writer)
                .and_then(|_| writer.flush())
                .map_err(|e| HubError::export(format!("Failed to compress {entry_name}: {e}")))?;
        }
    }

    Ok(())
}

/// Zip entry names always use `/`.
fn relative_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| HubError::internal(format!("{} is outside the archive root", path.display())))?;
    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}
