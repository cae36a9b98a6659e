//! Jar (zip) container helpers.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// Timestamp written on every entry of a normalized archive: 1980-01-01
/// 00:00:00, the earliest time a zip entry can carry.
pub fn fixed_timestamp() -> DateTime {
    DateTime::default()
}

/// Entry options producing reproducible output.
pub fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(fixed_timestamp())
        .unix_permissions(0o644)
}

fn archive_error(path: &Path, e: impl ToString) -> Error {
    Error::Archive {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

pub fn open(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    ZipArchive::new(file).map_err(|e| archive_error(path, e))
}

/// Copies `archive` into `writer`, keeping entry order, content and names
/// but stamping every entry with [`fixed_timestamp`]. Entries for which
/// `keep` returns false are dropped.
fn copy_entries<R, W>(
    archive: &mut ZipArchive<R>,
    writer: &mut ZipWriter<W>,
    origin: &Path,
    keep: impl Fn(&str, bool) -> bool,
) -> Result<()>
where
    R: Read + Seek,
    W: Write + Seek,
{
    let options = entry_options();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| archive_error(origin, e))?;
        let name = entry.name().to_string();
        let is_dir = entry.is_dir();
        if !keep(&name, is_dir) {
            continue;
        }
        if is_dir {
            writer
                .add_directory(name, options)
                .map_err(|e| archive_error(origin, e))?;
            continue;
        }
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut data)
            .map_err(|e| archive_error(origin, e))?;
        writer
            .start_file(name, options)
            .map_err(|e| archive_error(origin, e))?;
        writer
            .write_all(&data)
            .map_err(|e| archive_error(origin, e))?;
    }
    Ok(())
}

/// Rewrites `input` into `output` with every entry timestamp set to the
/// fixed constant, so equal content yields byte-identical archives.
pub fn normalize_timestamps(input: &Path, output: &Path) -> Result<()> {
    let mut archive = open(input)?;
    let file = File::create(output).map_err(|e| Error::io(output, e))?;
    let mut writer = ZipWriter::new(file);
    copy_entries(&mut archive, &mut writer, input, |_, _| true)?;
    writer.finish().map_err(|e| archive_error(output, e))?;
    Ok(())
}

/// In-memory variant of a filtered copy: keeps entries accepted by `keep`.
pub fn filter_entries(data: &[u8], origin: &Path, keep: impl Fn(&str, bool) -> bool) -> Result<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(data)).map_err(|e| archive_error(origin, e))?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    copy_entries(&mut archive, &mut writer, origin, keep)?;
    let cursor = writer.finish().map_err(|e| archive_error(origin, e))?;
    Ok(cursor.into_inner())
}

/// Names of every entry, in archive order.
pub fn entry_names(path: &Path) -> Result<Vec<String>> {
    let archive = open(path)?;
    Ok(archive.file_names().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])], time: DateTime) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default().last_modified_time(time);
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_normalized_archives_are_identical() {
        let dir = tempfile::tempdir().unwrap();
        let entries: &[(&str, &[u8])] = &[("a.class", b"one"), ("assets/b.txt", b"two")];
        let early = dir.path().join("early.jar");
        let late = dir.path().join("late.jar");
        write_zip(
            &early,
            entries,
            DateTime::from_date_and_time(2017, 1, 2, 3, 4, 6).unwrap(),
        );
        write_zip(
            &late,
            entries,
            DateTime::from_date_and_time(2024, 6, 7, 8, 9, 10).unwrap(),
        );

        let out_early = dir.path().join("out_early.jar");
        let out_late = dir.path().join("out_late.jar");
        normalize_timestamps(&early, &out_early).unwrap();
        normalize_timestamps(&late, &out_late).unwrap();
        assert_eq!(std::fs::read(&out_early).unwrap(), std::fs::read(&out_late).unwrap());

        let mut archive = open(&out_late).unwrap();
        let entry = archive.by_index(0).unwrap();
        let modified: Option<DateTime> = entry.last_modified().into();
        assert_eq!(modified, Some(fixed_timestamp()));
    }

    #[test]
    fn test_filter_entries_drops_rejected_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.jar");
        write_zip(
            &path,
            &[("keep/a.class", b"a"), ("drop/b.class", b"b")],
            DateTime::default(),
        );
        let data = std::fs::read(&path).unwrap();
        let filtered = filter_entries(&data, &path, |name, _| !name.starts_with("drop/")).unwrap();

        let out = dir.path().join("out.jar");
        std::fs::write(&out, filtered).unwrap();
        assert_eq!(entry_names(&out).unwrap(), vec!["keep/a.class".to_string()]);
    }
}
