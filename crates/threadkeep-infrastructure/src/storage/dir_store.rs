//! Directory-backed key/value store.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use threadkeep_core::error::{Result, ThreadkeepError};
use threadkeep_core::storage::KeyValueStore;
use tracing::warn;

use super::atomic_file::{FileLock, stage, write_atomic};

const ENTRY_EXTENSION: &str = "json";
const KEY_EXTENSION: &str = "key";
const LOCK_FILE: &str = ".store.lock";

/// Longest encoded key used verbatim as a file stem. Longer keys are stored
/// under a digest name so every stem stays well below the 255-byte limit.
const MAX_PLAIN_STEM: usize = 200;
/// Encoded bytes kept in front of the digest, for readability on disk.
const HASHED_PREFIX: usize = 64;
/// Separates the prefix from the digest. `encode_key` never emits it.
const DIGEST_MARKER: char = '~';

/// One file per key under a root directory.
///
/// Directory structure:
/// ```text
/// root/
/// ├── .store.lock
/// ├── threads%2FmainThreadId.json
/// ├── threads%2Fmetadata.json
/// ├── history%2F<thread id>.json
/// ├── history%2F<prefix>~<sha256>.json   # key too long for a file name
/// └── history%2F<prefix>~<sha256>.key    # original key of the entry above
/// ```
///
/// Writers take an exclusive lock on `.store.lock` and `get_many` takes a
/// shared one, so several processes can share one root. Blocking file I/O
/// runs on tokio's blocking pool.
#[derive(Clone)]
pub struct DirKeyValueStore {
    root: Arc<PathBuf>,
}

/// Where one key lives on disk.
struct EntryFiles {
    entry: PathBuf,
    /// Sidecar holding the original key, for digest-named entries only.
    key_file: Option<PathBuf>,
}

impl DirKeyValueStore {
    /// Opens (and creates if needed) a store rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root: Arc::new(root),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn files(root: &Path, key: &str) -> EntryFiles {
        let stem = file_stem(key);
        let key_file = stem
            .contains(DIGEST_MARKER)
            .then(|| root.join(format!("{}.{}", stem, KEY_EXTENSION)));
        EntryFiles {
            entry: root.join(format!("{}.{}", stem, ENTRY_EXTENSION)),
            key_file,
        }
    }

    fn lock(root: &Path) -> Result<FileLock> {
        FileLock::acquire(&root.join(LOCK_FILE))
    }

    fn read(root: &Path, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(Self::files(root, key).entry) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Recovers the key an entry file was written for.
    fn key_of(root: &Path, stem: &str) -> Option<String> {
        if !stem.contains(DIGEST_MARKER) {
            return decode_key(stem);
        }
        let key_file = root.join(format!("{}.{}", stem, KEY_EXTENSION));
        match fs::read_to_string(&key_file) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!("Skipping entry '{}' without a readable key file: {}", stem, e);
                None
            }
        }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T> + Send + 'static,
    {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || f(&root))
            .await
            .map_err(|e| ThreadkeepError::internal(format!("Failed to join task: {}", e)))?
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl KeyValueStore for DirKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.blocking(move |root| Self::read(root, &key)).await
    }

    /// Reads every key under one shared lock, so the result never mixes
    /// entries from before and after a concurrent `set_many`.
    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>> {
        let keys: Vec<String> = keys.iter().map(|key| key.to_string()).collect();
        self.blocking(move |root| {
            let _lock = FileLock::acquire_shared(&root.join(LOCK_FILE))?;
            keys.iter().map(|key| Self::read(root, key)).collect()
        })
        .await
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let key = key.to_string();
        self.blocking(move |root| {
            let _lock = Self::lock(root)?;
            let files = Self::files(root, &key);
            if let Some(key_file) = &files.key_file {
                write_atomic(key_file, key.as_bytes(), &key)?;
            }
            write_atomic(&files.entry, value.as_bytes(), &key)
        })
        .await
    }

    /// Stages every entry before renaming any of them. A staging failure,
    /// a full disk included, leaves all entries at their previous values. A
    /// failure during the rename pass can leave the entries renamed before
    /// it committed; no temporary file is left behind either way.
    async fn set_many(&self, entries: Vec<(String, String)>) -> Result<()> {
        self.blocking(move |root| {
            let _lock = Self::lock(root)?;

            let mut staged: Vec<(PathBuf, PathBuf, String)> = Vec::with_capacity(entries.len());
            let mut stage_one = |target: PathBuf, contents: &[u8], key: &str| -> Result<()> {
                let tmp = stage(&target, contents, key)?;
                staged.push((tmp, target, key.to_string()));
                Ok(())
            };

            let mut staging = Ok(());
            for (key, value) in &entries {
                let files = Self::files(root, key);
                if let Some(key_file) = files.key_file {
                    staging = stage_one(key_file, key.as_bytes(), key);
                    if staging.is_err() {
                        break;
                    }
                }
                staging = stage_one(files.entry, value.as_bytes(), key);
                if staging.is_err() {
                    break;
                }
            }
            if let Err(e) = staging {
                for (tmp, _, _) in &staged {
                    let _ = fs::remove_file(tmp);
                }
                return Err(e);
            }

            let mut pending = staged.into_iter();
            while let Some((tmp, target, key)) = pending.next() {
                if let Err(e) = fs::rename(&tmp, &target) {
                    let _ = fs::remove_file(&tmp);
                    for (rest, _, _) in pending {
                        let _ = fs::remove_file(rest);
                    }
                    return Err(ThreadkeepError::from_write_error(&key, e));
                }
            }
            Ok(())
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.blocking(move |root| {
            let _lock = Self::lock(root)?;
            let files = Self::files(root, &key);
            remove_if_present(&files.entry)?;
            if let Some(key_file) = &files.key_file {
                remove_if_present(key_file)?;
            }
            Ok(())
        })
        .await
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = prefix.to_string();
        self.blocking(move |root| {
            let mut keys = Vec::new();
            for entry in fs::read_dir(root)? {
                let path = entry?.path();
                if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                    continue;
                };
                if stem.starts_with('.') {
                    continue;
                }
                if let Some(key) = Self::key_of(root, stem)
                    && key.starts_with(&prefix)
                {
                    keys.push(key);
                }
            }
            keys.sort();
            Ok(keys)
        })
        .await
    }
}

/// Maps a key onto a portable file name: ASCII letters, digits, `-` and `_`
/// are kept, every other byte becomes `%XX`.
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

fn decode_key(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}

/// The file stem for `key`: its encoding, or a bounded digest name when the
/// encoding is too long for the file system.
fn file_stem(key: &str) -> String {
    let encoded = encode_key(key);
    if encoded.len() <= MAX_PLAIN_STEM {
        return encoded;
    }
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    // The encoding is ASCII, so any byte offset is a char boundary.
    format!(
        "{}{}{:x}",
        &encoded[..HASHED_PREFIX],
        DIGEST_MARKER,
        hasher.finalize()
    )
}
