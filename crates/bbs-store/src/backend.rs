//! Persistence backends a [`crate::Store`] commits through (§4.C).

use crate::root::StoreRoot;
use bbs_error::{BbsError, ErrorCode};
use std::fs;
use std::path::{Path, PathBuf};

/// Where a [`crate::Store`] loads its initial root from, and where it
/// commits every successful transaction to.
pub trait StoreBackend: Send + Sync {
    /// Load the last-committed root, or `None` if this backend has never
    /// been written to (a fresh store).
    fn load(&self) -> Result<Option<StoreRoot>, BbsError>;

    /// Durably commit `root` as the new last-committed state.
    fn persist(&self, root: &StoreRoot) -> Result<(), BbsError>;
}

/// Embedded single-file backend: the whole graph is serialised to JSON and
/// committed with a temp-file-then-rename, the same atomic-replace idiom
/// `bbs_transport::DirectoryTransport` uses for its `.msg` files, so a crash
/// mid-write never leaves a half-written root behind.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Use `path` as the store's single backing file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StoreBackend for FileBackend {
    fn load(&self) -> Result<Option<StoreRoot>, BbsError> {
        match fs::read(&self.path) {
            Ok(bytes) => {
                let root = serde_json::from_slice(&bytes).map_err(|e| {
                    BbsError::new(ErrorCode::Fatal, "store file is corrupt")
                        .with_source(e)
                        .with_context("path", self.path.display().to_string())
                })?;
                Ok(Some(root))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BbsError::new(ErrorCode::Fatal, "failed to read store file")
                .with_source(e)
                .with_context("path", self.path.display().to_string())),
        }
    }

    fn persist(&self, root: &StoreRoot) -> Result<(), BbsError> {
        let bytes = serde_json::to_vec_pretty(root)
            .map_err(|e| BbsError::new(ErrorCode::Fatal, "failed to serialise store root").with_source(e))?;
        let tmp = self.tmp_path();
        fs::write(&tmp, bytes)
            .map_err(|e| BbsError::new(ErrorCode::Fatal, "failed to write store tmp file").with_source(e))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| BbsError::new(ErrorCode::Fatal, "failed to commit store file").with_source(e))?;
        Ok(())
    }
}

/// Client-server backend address, persisted to `zeo-address.txt` on startup
/// per §4.C/§6. Networking is not implemented — this models the deployment
/// option without a real remote store process to talk to; every call fails
/// with [`ErrorCode::Fatal`].
pub struct ZeoBackend {
    address: String,
}

impl ZeoBackend {
    /// `address` is a `host:port` string, the same one written to
    /// `zeo-address.txt`.
    pub fn new(address: impl Into<String>) -> Self {
        Self { address: address.into() }
    }

    /// Write `address` to `<dir>/zeo-address.txt`, per §6's startup contract.
    pub fn write_address_file(dir: &Path, address: &str) -> Result<(), BbsError> {
        fs::write(dir.join("zeo-address.txt"), address)
            .map_err(|e| BbsError::new(ErrorCode::Fatal, "failed to write zeo-address.txt").with_source(e))
    }

    /// The configured `host:port` address.
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl StoreBackend for ZeoBackend {
    fn load(&self) -> Result<Option<StoreRoot>, BbsError> {
        Err(BbsError::new(ErrorCode::Fatal, "zeo backend networking is not implemented")
            .with_context("address", self.address.clone()))
    }

    fn persist(&self, _root: &StoreRoot) -> Result<(), BbsError> {
        Err(BbsError::new(ErrorCode::Fatal, "zeo backend networking is not implemented")
            .with_context("address", self.address.clone()))
    }
}
