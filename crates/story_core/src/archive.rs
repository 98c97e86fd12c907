//! Whole-archive operations on project files.
//!
//! A project archive is a zip file of the workspace tree. Only whole-archive
//! operations exist: extract everything, or build a new archive from a
//! directory and swap it in place of the old one.

use crate::error::{StoryError, Result};
use crate::paths::WorkspacePaths;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Prefix of temporary archives written during save.
pub const TEMP_PREFIX: &str = ".story-save-";

/// Suffix of temporary archives written during save.
pub const TEMP_SUFFIX: &str = ".tmp";

/// One file or directory to be packed, with its archive entry name.
struct Entry {
    name: String,
    path: PathBuf,
    is_dir: bool,
}

/// Extracts every entry of `archive` into `dest`.
///
/// Entries whose names would escape `dest` are rejected by the zip reader.
pub fn extract(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(BufReader::new(file))?;
    debug!(archive = %archive.display(), entries = zip.len(), "Extracting archive");
    zip.extract(dest)?;
    Ok(())
}

/// Writes the contents of `src` as a zip archive into `writer`.
///
/// Control artifacts at the top level of `src` are skipped. Entries are
/// written in sorted order. Symlinks are followed; a dangling one fails the
/// whole build.
pub fn pack_directory<W: Write + Seek>(
    src: &Path,
    writer: W,
    paths: &WorkspacePaths,
    compression_level: i64,
) -> Result<W> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(compression_level));

    let mut zip = ZipWriter::new(writer);
    for entry in collect_entries(src, paths)? {
        if entry.is_dir {
            zip.add_directory(entry.name, options)?;
        } else {
            zip.start_file(entry.name, options)?;
            let mut file = File::open(&entry.path)?;
            io::copy(&mut file, &mut zip)?;
        }
    }

    Ok(zip.finish()?)
}

/// Builds an archive of `src` into a new temporary file next to `target`.
///
/// The temporary file is deleted when the returned handle is dropped unless
/// it is handed to [`replace`]. Falls back to the system temp directory when
/// the target's directory refuses new files.
pub fn pack_to_temp(
    src: &Path,
    target: &Path,
    paths: &WorkspacePaths,
    compression_level: i64,
) -> Result<NamedTempFile> {
    let mut temp = create_temp_near(target)?;
    debug!(temp = %temp.path().display(), "Building archive");

    let writer = pack_directory(
        src,
        BufWriter::new(temp.as_file_mut()),
        paths,
        compression_level,
    )?;
    writer.into_inner().map_err(|e| e.into_error())?;
    temp.as_file().sync_all()?;

    Ok(temp)
}

/// Replaces `target` with the finished temporary archive.
///
/// Uses an atomic rename when the temp file sits in the target's directory.
/// A temp file on another filesystem is copied over the target instead.
pub fn replace(temp: NamedTempFile, target: &Path) -> Result<()> {
    let same_dir = temp.path().parent() == Some(parent_dir(target));

    match temp.persist(target) {
        Ok(_) => Ok(()),
        Err(e) if !same_dir => {
            warn!(
                target = %target.display(),
                error = %e.error,
                "Rename across filesystems failed, copying archive over target"
            );
            fs::copy(e.file.path(), target)?;
            Ok(())
        }
        Err(e) => Err(StoryError::Io(e.error)),
    }
}

/// Computes a content digest of a workspace, ignoring control artifacts.
///
/// Two directories with the same relative names and file bytes have the
/// same digest regardless of timestamps.
pub fn digest_directory(dir: &Path, paths: &WorkspacePaths) -> Result<blake3::Hash> {
    let mut hasher = blake3::Hasher::new();
    for entry in collect_entries(dir, paths)? {
        hasher.update(entry.name.as_bytes());
        if entry.is_dir {
            hasher.update(b"\0d");
        } else {
            hasher.update(b"\0f");
            let mut file = File::open(&entry.path)?;
            let len = io::copy(&mut file, &mut hasher)?;
            hasher.update(&len.to_le_bytes());
        }
    }
    Ok(hasher.finalize())
}

fn collect_entries(root: &Path, paths: &WorkspacePaths) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();
    walk(root, "", paths, &mut entries)?;
    Ok(entries)
}

fn walk(dir: &Path, prefix: &str, paths: &WorkspacePaths, out: &mut Vec<Entry>) -> Result<()> {
    let mut children: Vec<_> = fs::read_dir(dir)?.collect::<io::Result<_>>()?;
    children.sort_by_key(|e| e.file_name());

    for child in children {
        let file_name = child.file_name();
        let name = file_name.to_str().ok_or_else(|| {
            StoryError::Archive(format!("non UTF-8 file name: {}", child.path().display()))
        })?;

        if prefix.is_empty() && paths.is_control_artifact(name) {
            continue;
        }

        let path = child.path();
        let metadata = fs::metadata(&path)?;
        let entry_name = format!("{}{}", prefix, name);

        if metadata.is_dir() {
            let dir_name = format!("{}/", entry_name);
            out.push(Entry {
                name: dir_name.clone(),
                path: path.clone(),
                is_dir: true,
            });
            walk(&path, &dir_name, paths, out)?;
        } else {
            out.push(Entry {
                name: entry_name,
                path,
                is_dir: false,
            });
        }
    }

    Ok(())
}

fn create_temp_near(target: &Path) -> Result<NamedTempFile> {
    let builder = {
        let mut b = tempfile::Builder::new();
        b.prefix(TEMP_PREFIX).suffix(TEMP_SUFFIX);
        b
    };

    match builder.tempfile_in(parent_dir(target)) {
        Ok(temp) => Ok(temp),
        Err(e) => {
            warn!(
                dir = %parent_dir(target).display(),
                error = %e,
                "Cannot create temp archive next to target, using system temp dir"
            );
            Ok(builder.tempfile()?)
        }
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
