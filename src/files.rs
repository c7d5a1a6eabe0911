//! Capability-scoped file helpers.

use std::io;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};

fn split(path: &Utf8Path) -> io::Result<(&Utf8Path, &str)> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{path} does not name a file"),
        )
    })?;
    Ok((parent, name))
}

/// Reads a whole file.
///
/// # Errors
///
/// Returns the underlying I/O error when the file cannot be opened or read.
pub fn read(path: &Utf8Path) -> io::Result<Vec<u8>> {
    let (parent, name) = split(path)?;
    Dir::open_ambient_dir(parent, ambient_authority())?.read(name)
}

/// Writes `contents` to `path`, creating parent directories, and restricts
/// the file to its owner.
///
/// # Errors
///
/// Returns the underlying I/O error when a directory or the file cannot be
/// written.
pub fn write_private(path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
    let (parent, name) = split(path)?;
    Dir::create_ambient_dir_all(parent, ambient_authority())?;
    Dir::open_ambient_dir(parent, ambient_authority())?.write(name, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
