//! Filesystem gateway: a fixed set of primitives over already-authorized
//! absolute paths, each returning a typed outcome instead of raising.
//!
//! Every mutation treats "destination already exists" as a hard conflict;
//! nothing here overwrites. Directory deletion is refused unconditionally.
//! Callers (the dispatcher) run the allowlist check before any of these
//! functions touch the disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("not found")]
    NotFound,
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsDirectory,
    #[error("already exists")]
    AlreadyExists,
    #[error("name contains a path separator")]
    SeparatorInName,
    #[error("io error: {0}")]
    Io(io::Error),
}

pub type FsResult<T> = Result<T, FsError>;

fn map_io(e: io::Error) -> FsError {
    match e.kind() {
        io::ErrorKind::NotFound => FsError::NotFound,
        io::ErrorKind::AlreadyExists => FsError::AlreadyExists,
        _ => FsError::Io(e),
    }
}

#[derive(Debug, Clone)]
pub struct StatInfo {
    pub size: u64,
    pub modified: SystemTime,
    pub created: SystemTime,
    pub is_dir: bool,
}

/// One raw directory entry as the OS reported it. `metadata` is `None` for
/// entries whose target cannot be stat'ed (broken symlinks); callers skip
/// those.
#[derive(Debug)]
pub struct RawEntry {
    pub name: String,
    pub path: PathBuf,
    pub metadata: Option<fs::Metadata>,
}

/// Read a file as text, replacing invalid UTF-8 rather than failing.
pub fn read_text(path: &Path) -> FsResult<String> {
    let bytes = fs::read(path).map_err(map_io)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn read_bytes(path: &Path) -> FsResult<Vec<u8>> {
    fs::read(path).map_err(map_io)
}

pub fn stat(path: &Path) -> FsResult<StatInfo> {
    let md = fs::metadata(path).map_err(map_io)?;
    let modified = md.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    // Creation time is unsupported on some filesystems; fall back to mtime.
    let created = md.created().unwrap_or(modified);
    Ok(StatInfo { size: md.len(), modified, created, is_dir: md.is_dir() })
}

/// List a directory in OS order. Ordering is not guaranteed; callers sort.
pub fn list(path: &Path) -> FsResult<Vec<RawEntry>> {
    let md = fs::metadata(path).map_err(map_io)?;
    if !md.is_dir() {
        return Err(FsError::NotADirectory);
    }
    let rd = fs::read_dir(path).map_err(map_io)?;
    let mut out = Vec::new();
    for entry in rd {
        let entry = entry.map_err(map_io)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();
        // fs::metadata follows symlinks, so a dangling link yields None here.
        let metadata = fs::metadata(&path).ok();
        out.push(RawEntry { name, path, metadata });
    }
    Ok(out)
}

/// Copy a file or directory tree. The destination must not exist and its
/// parent is not created on demand.
pub fn copy(src: &Path, dst: &Path) -> FsResult<()> {
    let md = fs::metadata(src).map_err(map_io)?;
    if dst.exists() {
        return Err(FsError::AlreadyExists);
    }
    if md.is_dir() {
        copy_tree(src, dst)
    } else {
        fs::copy(src, dst).map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => FsError::AlreadyExists,
            _ => FsError::Io(e),
        })?;
        Ok(())
    }
}

fn copy_tree(src: &Path, dst: &Path) -> FsResult<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| match e.into_io_error() {
            Some(ioe) => FsError::Io(ioe),
            None => FsError::Io(io::Error::other("walkdir loop")),
        })?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| FsError::Io(io::Error::other("path outside copy root")))?;
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(FsError::Io)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(FsError::Io)?;
            }
            fs::copy(entry.path(), &target).map_err(FsError::Io)?;
        }
    }
    Ok(())
}

/// Move a file or directory. The destination's parent is created on demand;
/// cross-device moves fall back to copy-then-remove.
pub fn move_path(src: &Path, dst: &Path) -> FsResult<()> {
    let md = fs::metadata(src).map_err(map_io)?;
    if dst.exists() {
        return Err(FsError::AlreadyExists);
    }
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(FsError::Io)?;
    }
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(_) => {
            if md.is_dir() {
                copy_tree(src, dst)?;
                fs::remove_dir_all(src).map_err(FsError::Io)
            } else {
                fs::copy(src, dst).map_err(FsError::Io)?;
                fs::remove_file(src).map_err(FsError::Io)
            }
        }
    }
}

/// Join `new_name` onto the parent of `path`, rejecting any name that carries
/// a separator. Pure; used by the dispatcher to authorize the rename target
/// before anything touches the disk.
pub fn sibling_path(path: &Path, new_name: &str) -> FsResult<PathBuf> {
    if new_name.contains('/') || new_name.contains('\\') {
        return Err(FsError::SeparatorInName);
    }
    let parent = path.parent().unwrap_or_else(|| Path::new("/"));
    Ok(parent.join(new_name))
}

/// Rename within the parent directory. `new_name` must be a bare name; the
/// sibling destination must not exist.
pub fn rename(path: &Path, new_name: &str) -> FsResult<PathBuf> {
    let dst = sibling_path(path, new_name)?;
    if fs::symlink_metadata(path).is_err() {
        return Err(FsError::NotFound);
    }
    if dst.exists() {
        return Err(FsError::AlreadyExists);
    }
    fs::rename(path, &dst).map_err(map_io)?;
    Ok(dst)
}

/// Delete a single file. Directories are refused unconditionally.
pub fn remove(path: &Path) -> FsResult<()> {
    let md = fs::metadata(path).map_err(map_io)?;
    if md.is_dir() {
        return Err(FsError::IsDirectory);
    }
    fs::remove_file(path).map_err(map_io)
}

pub fn mkdir(path: &Path) -> FsResult<()> {
    if path.exists() {
        return Err(FsError::AlreadyExists);
    }
    fs::create_dir(path).map_err(|e| match e.kind() {
        io::ErrorKind::AlreadyExists => FsError::AlreadyExists,
        _ => FsError::Io(e),
    })
}

pub fn create_empty_file(path: &Path) -> FsResult<()> {
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => FsError::AlreadyExists,
            _ => FsError::Io(e),
        })?;
    Ok(())
}
