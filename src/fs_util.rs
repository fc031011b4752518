use std::fs;
use std::io;
use std::path::Path;

use zip::ZipArchive;

use crate::error::FetchError;

/// Unpacks every entry of `zip_path` below `target_dir`, returning the number
/// of files written. Entries that would escape `target_dir` abort the
/// extraction.
pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<usize, FetchError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| FetchError::Filesystem(format!("open zip {}: {err}", zip_path.display())))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|err| FetchError::Archive(format!("{}: {err}", zip_path.display())))?;

    fs::create_dir_all(target_dir).map_err(|err| {
        FetchError::Filesystem(format!("create {}: {err}", target_dir.display()))
    })?;

    let mut written = 0usize;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| FetchError::Archive(err.to_string()))?;
        let entry_path = match entry.enclosed_name() {
            Some(path) => target_dir.join(path),
            None => {
                return Err(FetchError::Archive(format!(
                    "zip entry path traversal detected: {}",
                    entry.name()
                )));
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)
                .map_err(|err| FetchError::Filesystem(err.to_string()))?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| FetchError::Filesystem(err.to_string()))?;
        }
        let mut outfile = fs::File::create(&entry_path)
            .map_err(|err| FetchError::Filesystem(format!("{}: {err}", entry_path.display())))?;
        io::copy(&mut entry, &mut outfile)
            .map_err(|err| FetchError::Archive(format!("{}: {err}", entry.name())))?;
        written += 1;
    }
    Ok(written)
}

pub fn remove_file(path: &Path) -> Result<(), FetchError> {
    fs::remove_file(path)
        .map_err(|err| FetchError::Filesystem(format!("remove {}: {err}", path.display())))
}
