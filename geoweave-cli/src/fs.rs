//! Filesystem helpers built on `cap-std` and `camino`.
//!
//! Every access goes through a directory handle opened with ambient
//! authority for the target's parent.

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8};
use std::io;

fn parent_or_current(path: &Utf8Path) -> &Utf8Path {
    match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    }
}

/// Open the parent directory of `path` and return it with the file name.
fn open_dir_and_file(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, &str)> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::other(format!("{path} should name a file")))?;
    let dir = fs_utf8::Dir::open_ambient_dir(parent_or_current(path), ambient_authority())?;
    Ok((dir, file_name))
}

/// Return whether `path` exists and is a regular file.
pub(crate) fn file_is_file(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = open_dir_and_file(path)?;
    dir.metadata(name).map(|meta| meta.is_file())
}

/// Read a UTF-8 text file in full.
pub(crate) fn read_utf8_file(path: &Utf8Path) -> io::Result<String> {
    let (dir, name) = open_dir_and_file(path)?;
    dir.read_to_string(name)
}

/// Create the parent directory of `path` when it is missing.
pub(crate) fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    fs_utf8::Dir::create_ambient_dir_all(parent_or_current(path), ambient_authority())
}

/// Write `contents` to `path`, creating missing parent directories.
pub(crate) fn write_utf8_file(path: &Utf8Path, contents: &str) -> io::Result<()> {
    ensure_parent_dir(path)?;
    let (dir, name) = open_dir_and_file(path)?;
    dir.write(name, contents)
}
