//! Zip extraction with a zip-slip guard.

use std::path::{Path, PathBuf};

use crate::error::PackageError;

/// Extracts `archive_path` into `dest`, rejecting any entry whose path would resolve outside
/// `dest`. Blocking; callers on an async runtime should run it via `spawn_blocking`.
///
/// On any failure - including a rejected entry - `dest` is removed entirely rather than left
/// half-populated, so a retry starts from a clean directory instead of a mix of old and new files.
pub fn extract_zip(archive_path: &Path, dest: &Path) -> Result<(), PackageError> {
    match extract_zip_into(archive_path, dest) {
        Ok(()) => Ok(()),
        Err(err) => {
            let _ = std::fs::remove_dir_all(dest);
            Err(err)
        }
    }
}

fn extract_zip_into(archive_path: &Path, dest: &Path) -> Result<(), PackageError> {
    let file = std::fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    std::fs::create_dir_all(dest)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;

        // `enclosed_name` already refuses absolute paths and `..` components; a `None` here means
        // the entry's stored name can't be made to honor that, which is itself the attack this
        // guard exists for.
        let relative_path = entry.enclosed_name().map(Path::to_path_buf).ok_or_else(|| PackageError::ZipSlip(PathBuf::from(entry.name())))?;

        let out_path = dest.join(&relative_path);
        if !out_path.starts_with(dest) {
            return Err(PackageError::ZipSlip(relative_path));
        }

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out_file = std::fs::File::create(&out_path)?;
        std::io::copy(&mut entry, &mut out_file)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_zip_with_entry(name: &str, contents: &[u8]) -> PathBuf {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("archive.zip");
        let file = std::fs::File::create(&archive_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        // zip's own path sanitization happens on read (`enclosed_name`), so writing an unsafe
        // name here is only possible via the raw, unchecked API.
        writer.start_file(name, zip::write::FileOptions::default()).unwrap();
        writer.write_all(contents).unwrap();
        writer.finish().unwrap();
        std::mem::forget(dir);
        archive_path
    }

    #[test]
    fn extracts_a_well_formed_archive() {
        let archive_path = write_zip_with_entry("statement/problem.txt", b"hello");
        let dest = tempfile::tempdir().unwrap();

        extract_zip(&archive_path, dest.path()).unwrap();

        let extracted = dest.path().join("statement/problem.txt");
        assert_eq!(std::fs::read(extracted).unwrap(), b"hello");
    }

    #[test]
    fn rejects_a_path_traversal_entry() {
        // `enclosed_name()` returns `None` for any entry containing `..` components, regardless
        // of what raw bytes were written - this exercises that rejection path end to end.
        let archive_path = write_zip_with_entry("../../etc/passwd", b"pwned");
        let dest = tempfile::tempdir().unwrap();

        let result = extract_zip(&archive_path, dest.path());

        assert!(matches!(result, Err(PackageError::ZipSlip(_))));
        assert!(!dest.path().parent().unwrap().join("etc").exists());
        assert!(!dest.path().exists());
    }

    #[test]
    fn rejects_an_absolute_path_entry() {
        let archive_path = write_zip_with_entry("/etc/passwd", b"pwned");
        let dest = tempfile::tempdir().unwrap();

        let result = extract_zip(&archive_path, dest.path());

        assert!(matches!(result, Err(PackageError::ZipSlip(_))));
    }
}
