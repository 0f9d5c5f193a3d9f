use std::fs;
use std::io;
use std::path::Path;

use flate2::read::GzDecoder;
use zip::ZipArchive;

use crate::domain::ArchiveFormat;
use crate::error::FetchError;

/// Creates `dir` and its parents. An existing directory is not an error, so
/// concurrent runs may race on it.
pub fn ensure_dir(dir: &Path) -> Result<(), FetchError> {
    match fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(err) => Err(FetchError::Filesystem(format!(
            "create {}: {err}",
            dir.display()
        ))),
    }
}

pub fn validate_zip(zip_path: &Path) -> Result<(), FetchError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| FetchError::Filesystem(format!("open zip {}: {err}", zip_path.display())))?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| FetchError::Filesystem(err.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        io::copy(&mut entry, &mut io::sink())
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;
    }
    Ok(())
}

pub fn validate_gzip(gz_path: &Path) -> Result<(), FetchError> {
    let file = fs::File::open(gz_path)
        .map_err(|err| FetchError::Filesystem(format!("open gzip {}: {err}", gz_path.display())))?;
    let mut decoder = GzDecoder::new(io::BufReader::new(file));
    io::copy(&mut decoder, &mut io::sink())
        .map_err(|err| FetchError::Filesystem(err.to_string()))?;
    Ok(())
}

pub fn validate_archive(path: &Path, format: ArchiveFormat) -> Result<(), FetchError> {
    match format {
        ArchiveFormat::Jar | ArchiveFormat::Zip => validate_zip(path),
        ArchiveFormat::Gzip => validate_gzip(path),
    }
}

/// Whether a cached file can be used as-is.
///
/// Missing, unreadable and truncated files all report `false`; the caller
/// decides whether to fetch again.
pub fn is_reusable(path: &Path, format: ArchiveFormat) -> bool {
    if !path.is_file() {
        return false;
    }
    match validate_archive(path, format) {
        Ok(()) => true,
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "cached artifact failed validation");
            false
        }
    }
}
