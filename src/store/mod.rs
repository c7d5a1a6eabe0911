//! On-disk host store and active-host marker.
//!
//! Each host lives in `<root>/<name>/config.json`. The active host's name is
//! kept in `<root>/.active`, replaced through a temporary file and a rename
//! so readers never observe a partial write.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;

use crate::host::{Host, is_valid_host_name};

const CONFIG_FILE: &str = "config.json";
const ACTIVE_FILE: &str = ".active";
const ACTIVE_TEMP_FILE: &str = ".active.tmp";

/// Errors raised by [`Store`] operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Raised when a host name contains characters outside `[A-Za-z0-9.-]`.
    #[error("Invalid hostname specified: {name}")]
    InvalidName {
        /// Rejected name.
        name: String,
    },
    /// Raised when creating a host whose directory already exists.
    #[error("Host already exists: \"{name}\"")]
    AlreadyExists {
        /// Name of the existing host.
        name: String,
    },
    /// Raised when a named host has no configuration on disk.
    #[error("Host does not exist: \"{name}\"")]
    NotFound {
        /// Name that was looked up.
        name: String,
    },
    /// Raised when the filesystem rejects an operation.
    #[error("failed to access {path}: {source}")]
    Io {
        /// Path being accessed.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Raised when `config.json` cannot be decoded or encoded.
    #[error("invalid host configuration in {path}: {source}")]
    Codec {
        /// Path of the configuration file.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// Filesystem-backed collection of hosts.
#[derive(Clone, Debug)]
pub struct Store {
    root: Utf8PathBuf,
}

impl Store {
    /// Creates a store rooted at `root`. Nothing is touched until the first
    /// operation.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Storage root directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Directory holding `name`'s configuration and key material.
    #[must_use]
    pub fn host_dir(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    fn io_error(&self, relative: &str, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.root.join(relative),
            source,
        }
    }

    fn open_root(&self) -> Result<Dir, StoreError> {
        Dir::create_ambient_dir_all(&self.root, ambient_authority())
            .and_then(|()| Dir::open_ambient_dir(&self.root, ambient_authority()))
            .map_err(|source| StoreError::Io {
                path: self.root.clone(),
                source,
            })
    }

    fn checked_name(name: &str) -> Result<&str, StoreError> {
        if is_valid_host_name(name) {
            Ok(name)
        } else {
            Err(StoreError::InvalidName {
                name: name.to_owned(),
            })
        }
    }

    /// Persists a new host.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] for a malformed name,
    /// [`StoreError::AlreadyExists`] when the host directory exists, or an
    /// I/O error.
    pub fn create(&self, host: &Host) -> Result<(), StoreError> {
        let name = Self::checked_name(&host.name)?;
        let root = self.open_root()?;
        if root
            .try_exists(name)
            .map_err(|err| self.io_error(name, err))?
        {
            return Err(StoreError::AlreadyExists {
                name: name.to_owned(),
            });
        }
        root.create_dir(name)
            .map_err(|err| self.io_error(name, err))?;
        self.write_config(&root, host)
    }

    /// Overwrites a host's configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] for a malformed name or an I/O
    /// error.
    pub fn save(&self, host: &Host) -> Result<(), StoreError> {
        let name = Self::checked_name(&host.name)?;
        let root = self.open_root()?;
        root.create_dir_all(name)
            .map_err(|err| self.io_error(name, err))?;
        self.write_config(&root, host)
    }

    fn write_config(&self, root: &Dir, host: &Host) -> Result<(), StoreError> {
        let relative = format!("{}/{CONFIG_FILE}", host.name);
        let encoded = serde_json::to_vec_pretty(host).map_err(|source| StoreError::Codec {
            path: self.root.join(&relative),
            source,
        })?;
        root.write(&relative, encoded)
            .map_err(|err| self.io_error(&relative, err))
    }

    /// Loads a host by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the host has no configuration,
    /// [`StoreError::Codec`] when it does not decode, or an I/O error.
    pub fn load(&self, name: &str) -> Result<Host, StoreError> {
        let checked = Self::checked_name(name)?;
        let relative = format!("{checked}/{CONFIG_FILE}");
        let bytes = match self.open_root()?.read(&relative) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    name: checked.to_owned(),
                });
            }
            Err(err) => return Err(self.io_error(&relative, err)),
        };
        let mut host: Host =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Codec {
                path: self.root.join(&relative),
                source,
            })?;
        checked.clone_into(&mut host.name);
        Ok(host)
    }

    /// Returns `true` when `name` has a store directory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] for a malformed name or an I/O
    /// error.
    pub fn exists(&self, name: &str) -> Result<bool, StoreError> {
        let checked = Self::checked_name(name)?;
        self.open_root()?
            .try_exists(checked)
            .map_err(|err| self.io_error(checked, err))
    }

    /// Loads every host, sorted by name.
    ///
    /// Hidden entries and plain files are skipped; hosts whose configuration
    /// cannot be read are logged and left out.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the root directory cannot be listed.
    pub fn list(&self) -> Result<Vec<Host>, StoreError> {
        let root = self.open_root()?;
        let entries = root.entries().map_err(|err| self.io_error(".", err))?;
        let mut hosts = Vec::new();
        for item in entries {
            let entry = item.map_err(|err| self.io_error(".", err))?;
            let name = entry.file_name().map_err(|err| self.io_error(".", err))?;
            if name.starts_with('.') {
                continue;
            }
            let is_dir = entry
                .file_type()
                .map_err(|err| self.io_error(&name, err))?
                .is_dir();
            if !is_dir {
                continue;
            }
            match self.load(&name) {
                Ok(host) => hosts.push(host),
                Err(err) => tracing::warn!(host = %name, error = %err, "skipping unreadable host"),
            }
        }
        hosts.sort_by(|lhs, rhs| lhs.name.cmp(&rhs.name));
        Ok(hosts)
    }

    /// Deletes a host's directory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the host does not exist, or an
    /// I/O error.
    pub fn remove(&self, name: &str) -> Result<(), StoreError> {
        let checked = Self::checked_name(name)?;
        match self.open_root()?.remove_dir_all(checked) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound {
                name: checked.to_owned(),
            }),
            Err(err) => Err(self.io_error(checked, err)),
        }
    }

    /// Marks `name` as the active host.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the host does not exist, or an
    /// I/O error.
    pub fn set_active(&self, name: &str) -> Result<(), StoreError> {
        if !self.exists(name)? {
            return Err(StoreError::NotFound {
                name: name.to_owned(),
            });
        }
        let root = self.open_root()?;
        root.write(ACTIVE_TEMP_FILE, name)
            .map_err(|err| self.io_error(ACTIVE_TEMP_FILE, err))?;
        root.rename(ACTIVE_TEMP_FILE, &root, ACTIVE_FILE)
            .map_err(|err| self.io_error(ACTIVE_FILE, err))
    }

    fn active_name(&self) -> Result<Option<String>, StoreError> {
        match self.open_root()?.read_to_string(ACTIVE_FILE) {
            Ok(contents) => {
                let name = contents.trim();
                Ok((!name.is_empty()).then(|| name.to_owned()))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(self.io_error(ACTIVE_FILE, err)),
        }
    }

    /// Returns the active host, if the marker names a host that still exists.
    ///
    /// # Errors
    ///
    /// Returns an I/O or decode error when the marker or the host cannot be
    /// read.
    pub fn get_active(&self) -> Result<Option<Host>, StoreError> {
        let Some(name) = self.active_name()? else {
            return Ok(None);
        };
        if !is_valid_host_name(&name) || !self.exists(&name)? {
            tracing::debug!(host = %name, "active marker names a missing host");
            return Ok(None);
        }
        self.load(&name).map(Some)
    }

    /// Returns `true` when `name` is the active host.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the marker cannot be read.
    pub fn is_active(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.active_name()?.as_deref() == Some(name))
    }

    /// Clears the active marker. A missing marker is not an error.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the marker exists but cannot be removed.
    pub fn remove_active(&self) -> Result<(), StoreError> {
        match self.open_root()?.remove_file(ACTIVE_FILE) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error(ACTIVE_FILE, err)),
        }
    }
}

#[cfg(test)]
mod tests;
