//! Persisted cache tier.
//!
//! Each key is stored as `<encoded key>.json` in a directory the store owns.
//! Keys are percent-encoded so any symbol maps to a distinct, portable file
//! name. Dots survive encoding; the extension is split off at the last one. Writes go to a unique temp file first and are renamed into place,
//! so readers never observe a half-written entry.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use urlencoding::{decode, encode};

use crate::errors::CacheError;

const ENTRY_EXTENSION: &str = "json";

pub struct DiskStore {
    dir: PathBuf,
    tmp_counter: AtomicU64,
}

impl DiskStore {
    /// Open (and create if needed) the store directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!("Opened cache directory {}", dir.display());
        Ok(Self {
            dir,
            tmp_counter: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", encode_key(key), ENTRY_EXTENSION))
    }

    /// Read the blob stored under `key`.
    ///
    /// Unreadable or undecodable files are removed and reported as a miss.
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read cache file {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(
                    "Discarding corrupt cache file {}: {}",
                    path.display(),
                    e
                );
                let _ = fs::remove_file(&path);
                None
            }
        }
    }

    pub fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let path = self.path_for(key);
        let bytes = serde_json::to_vec(value)?;

        let tmp = self.dir.join(format!(
            ".{}.{}.{}.tmp",
            encode_key(key),
            std::process::id(),
            self.tmp_counter.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp, bytes)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<(), CacheError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Keys of every persisted entry.
    pub fn keys(&self) -> Result<Vec<String>, CacheError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match decode_key(stem) {
                Some(key) => keys.push(key),
                None => debug!("Ignoring foreign file in cache dir: {}", path.display()),
            }
        }
        Ok(keys)
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        for key in self.keys()? {
            self.remove(&key)?;
        }
        Ok(())
    }
}

fn encode_key(key: &str) -> String {
    encode(key).into_owned()
}

fn decode_key(name: &str) -> Option<String> {
    decode(name).ok().map(|key| key.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_encoding_round_trips() {
        for key in ["AAPL", "BRK.B", "^GSPC", "BTC-USD", "7203.T", "a/b", "EUR=X"] {
            let encoded = encode_key(key);
            assert!(!encoded.contains('/'));
            assert!(!encoded.contains('^'));
            assert_eq!(decode_key(&encoded).as_deref(), Some(key));
        }
    }

    #[test]
    fn test_write_read_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::open(dir.path().join("quotes")).unwrap();

        store.write("BRK.B", &42u32).unwrap();
        assert_eq!(store.read::<u32>("BRK.B"), Some(42));
        assert_eq!(store.keys().unwrap(), vec!["BRK.B".to_string()]);

        store.remove("BRK.B").unwrap();
        assert_eq!(store.read::<u32>("BRK.B"), None);
        // Removing twice is fine.
        store.remove("BRK.B").unwrap();
    }

    #[test]
    fn test_corrupt_file_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();

        fs::write(store.path_for("AAPL"), b"{not json").unwrap();
        assert_eq!(store.read::<u32>("AAPL"), None);
        assert!(!store.path_for("AAPL").exists());
    }

    #[test]
    fn test_keys_ignore_temp_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();

        store.write("AAPL", &1u32).unwrap();
        store.write("7203.T", &2u32).unwrap();
        fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        fs::write(dir.path().join(".AAPL.1.0.tmp"), b"partial").unwrap();

        let mut keys = store.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["7203.T".to_string(), "AAPL".to_string()]);
    }
}
