//! Filesystem rendezvous transport used by test harnesses in place of a
//! real TNC link (§4.B).
//!
//! A connection is a directory `<SRC>--<DST>` containing at most one pending
//! message per direction: `<SRC>.msg` and `<DST>.msg`, each written via a
//! `.tmp` file and an atomic rename, and consumed by deleting it after read.
//! Deleting the directory itself ends the connection.

use crate::{Transport, TransportError, TransportState};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Which side of a directory-rendezvous connection this transport plays.
/// Only affects the directory's `SRC--DST` naming; both sides write their
/// own callsign's file and read the peer's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryRole {
    /// This side initiated the connection; its callsign is `SRC`.
    Client,
    /// This side accepted the connection; its callsign is `DST`.
    Server,
}

/// How long [`DirectoryTransport::write_chunk`] waits for the peer to
/// consume a still-pending outbound message before giving up.
const WRITE_RETRY_TIMEOUT: Duration = Duration::from_secs(5);
const WRITE_RETRY_INTERVAL: Duration = Duration::from_millis(20);

/// A transport backed by a rendezvous directory on disk.
pub struct DirectoryTransport {
    state: TransportState,
    dir: PathBuf,
    own_callsign: String,
    peer_callsign: String,
}

impl DirectoryTransport {
    /// Open (creating if absent) the rendezvous directory `root/SRC--DST`
    /// for `role`.
    pub fn open(
        root: &Path,
        src_callsign: &str,
        dst_callsign: &str,
        role: DirectoryRole,
    ) -> Result<Self, TransportError> {
        let dir = root.join(format!("{src_callsign}--{dst_callsign}"));
        fs::create_dir_all(&dir)?;
        let (own_callsign, peer_callsign) = match role {
            DirectoryRole::Client => (src_callsign.to_string(), dst_callsign.to_string()),
            DirectoryRole::Server => (dst_callsign.to_string(), src_callsign.to_string()),
        };
        Ok(Self {
            state: TransportState::Connected,
            dir,
            own_callsign,
            peer_callsign,
        })
    }

    fn own_msg_path(&self) -> PathBuf {
        self.dir.join(format!("{}.msg", self.own_callsign))
    }

    fn peer_msg_path(&self) -> PathBuf {
        self.dir.join(format!("{}.msg", self.peer_callsign))
    }

    fn check_directory_still_present(&mut self) -> bool {
        if !self.dir.is_dir() {
            self.state = TransportState::Disconnected;
            false
        } else {
            true
        }
    }
}

impl Transport for DirectoryTransport {
    fn state(&self) -> TransportState {
        self.state
    }

    fn remote_callsign(&self) -> Option<&str> {
        Some(&self.peer_callsign)
    }

    fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), TransportError> {
        if self.state != TransportState::Connected {
            return Err(TransportError::NotConnected(self.state));
        }
        let own_path = self.own_msg_path();
        let deadline = Instant::now() + WRITE_RETRY_TIMEOUT;
        while own_path.exists() {
            if !self.check_directory_still_present() {
                return Err(TransportError::NotConnected(TransportState::Disconnected));
            }
            if Instant::now() >= deadline {
                return Err(TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "peer did not consume the previous message in time",
                )));
            }
            std::thread::sleep(WRITE_RETRY_INTERVAL);
        }
        let tmp_path = self.dir.join(format!("{}.tmp", self.own_callsign));
        fs::write(&tmp_path, chunk)?;
        fs::rename(&tmp_path, &own_path)?;
        Ok(())
    }

    fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        if self.state == TransportState::Disconnected {
            return Ok(None);
        }
        if !self.check_directory_still_present() {
            return Ok(None);
        }
        let peer_path = self.peer_msg_path();
        match fs::read(&peer_path) {
            Ok(bytes) => {
                // Consume by delete; ignore a race where another reader won.
                let _ = fs::remove_file(&peer_path);
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TransportError::Io(e)),
        }
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.state = TransportState::Disconnecting;
        let _ = fs::remove_dir_all(&self.dir);
        self.state = TransportState::Disconnected;
        Ok(())
    }
}

/// Scans a parent directory for new `SRC--DST` rendezvous subdirectories and
/// reports each exactly once, mimicking the reference server's "bouncer"
/// that spins up a [`DirectoryTransport`] for every newly appeared
/// connection directory.
pub struct DirectoryBouncer {
    root: PathBuf,
    seen: HashSet<String>,
}

impl DirectoryBouncer {
    /// Watch `root` for new connection directories.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            seen: HashSet::new(),
        }
    }

    /// Return the `(src, dst)` callsign pairs of connection directories that
    /// have appeared since the last scan.
    pub fn scan_once(&mut self) -> std::io::Result<Vec<(String, String)>> {
        let mut found = Vec::new();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(found),
            Err(e) => return Err(e),
        };
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.seen.contains(&name) {
                continue;
            }
            let Some((src, dst)) = name.split_once("--") else {
                continue;
            };
            self.seen.insert(name.clone());
            found.push((src.to_string(), dst.to_string()));
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_message_between_client_and_server() {
        let tmp = tempfile::tempdir().unwrap();
        let mut client =
            DirectoryTransport::open(tmp.path(), "KQ4PEC", "W1AW", DirectoryRole::Client).unwrap();
        let mut server =
            DirectoryTransport::open(tmp.path(), "KQ4PEC", "W1AW", DirectoryRole::Server).unwrap();

        client.write_chunk(b"hello").unwrap();
        assert_eq!(server.recv().unwrap(), Some(b"hello".to_vec()));
        assert_eq!(server.recv().unwrap(), None);

        server.write_chunk(b"world").unwrap();
        assert_eq!(client.recv().unwrap(), Some(b"world".to_vec()));
    }

    #[test]
    fn remote_callsign_matches_role() {
        let tmp = tempfile::tempdir().unwrap();
        let client =
            DirectoryTransport::open(tmp.path(), "KQ4PEC", "W1AW", DirectoryRole::Client).unwrap();
        let server =
            DirectoryTransport::open(tmp.path(), "KQ4PEC", "W1AW", DirectoryRole::Server).unwrap();
        assert_eq!(client.remote_callsign(), Some("W1AW"));
        assert_eq!(server.remote_callsign(), Some("KQ4PEC"));
    }

    #[test]
    fn deleting_the_directory_disconnects_the_transport() {
        let tmp = tempfile::tempdir().unwrap();
        let mut client =
            DirectoryTransport::open(tmp.path(), "A", "B", DirectoryRole::Client).unwrap();
        fs::remove_dir_all(tmp.path().join("A--B")).unwrap();
        assert_eq!(client.recv().unwrap(), None);
        assert_eq!(client.state(), TransportState::Disconnected);
    }

    #[test]
    fn disconnect_removes_the_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let mut client =
            DirectoryTransport::open(tmp.path(), "A", "B", DirectoryRole::Client).unwrap();
        client.disconnect().unwrap();
        assert!(!tmp.path().join("A--B").exists());
        assert_eq!(client.state(), TransportState::Disconnected);
    }

    #[test]
    fn bouncer_reports_each_new_directory_exactly_once() {
        let tmp = tempfile::tempdir().unwrap();
        let mut bouncer = DirectoryBouncer::new(tmp.path());
        assert!(bouncer.scan_once().unwrap().is_empty());

        fs::create_dir_all(tmp.path().join("KQ4PEC--W1AW")).unwrap();
        let found = bouncer.scan_once().unwrap();
        assert_eq!(found, vec![("KQ4PEC".to_string(), "W1AW".to_string())]);

        // Second scan sees nothing new.
        assert!(bouncer.scan_once().unwrap().is_empty());

        fs::create_dir_all(tmp.path().join("N0CALL--W1AW")).unwrap();
        let found = bouncer.scan_once().unwrap();
        assert_eq!(found, vec![("N0CALL".to_string(), "W1AW".to_string())]);
    }
}
