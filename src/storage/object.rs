//! Object-store storage backend.
//!
//! Object stores have no real directories; the segment directory is a key
//! prefix. A native listing by prefix may return unrelated keys (textual
//! prefix match, e.g. `seg1` also matching `seg10/...`), so [`ObjectStorage`]
//! filters the listing client-side to keys actually under its own prefix
//! before use.

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::storage::traits::{Storage, StorageError, StorageInput, StorageOutput};

/// Contract a remote object store must implement.
///
/// This is the full surface the segment layer needs; any SDK can be adapted
/// behind it. Keys are flat strings, there are no directories.
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// Fetch the full contents of an object.
    fn get_object(&self, key: &str) -> Result<Vec<u8>>;

    /// Store an object, replacing any existing one under the same key.
    fn put_object(&self, key: &str, data: Vec<u8>) -> Result<()>;

    /// List keys matching the textual prefix. MAY over-return: callers must
    /// filter the result before use.
    fn list_objects(&self, prefix: &str) -> Result<Vec<String>>;

    /// Delete an object. Deleting an absent key is not an error.
    fn delete_object(&self, key: &str) -> Result<()>;

    /// Size of an object in bytes.
    fn object_size(&self, key: &str) -> Result<u64>;
}

/// In-memory object store for tests and embedded use.
///
/// Mirrors the textual-prefix listing of real stores: `list_objects("seg1")`
/// also returns keys under `seg10/`, so clients exercise their own filter.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects currently stored across all prefixes.
    pub fn object_count(&self) -> usize {
        self.objects.lock().len()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let objects = self.objects.lock();
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::FileNotFound(key.to_string()).into())
    }

    fn put_object(&self, key: &str, data: Vec<u8>) -> Result<()> {
        let mut objects = self.objects.lock();
        objects.insert(key.to_string(), data);
        Ok(())
    }

    fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        let objects = self.objects.lock();
        let mut keys: Vec<String> = objects
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn delete_object(&self, key: &str) -> Result<()> {
        let mut objects = self.objects.lock();
        objects.remove(key);
        Ok(())
    }

    fn object_size(&self, key: &str) -> Result<u64> {
        let objects = self.objects.lock();
        objects
            .get(key)
            .map(|data| data.len() as u64)
            .ok_or_else(|| StorageError::FileNotFound(key.to_string()).into())
    }
}

/// Storage backend that maps one segment directory onto an object-store key
/// prefix.
#[derive(Debug)]
pub struct ObjectStorage {
    /// The key prefix standing in for the segment directory.
    prefix: String,
    store: Arc<dyn ObjectStore>,
    closed: bool,
}

impl ObjectStorage {
    /// Create a storage view over `store` rooted at `prefix`.
    pub fn new(prefix: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        let prefix = prefix.into();
        let prefix = prefix.trim_matches('/').to_string();
        ObjectStorage {
            prefix,
            store,
            closed: false,
        }
    }

    /// The key prefix this storage is rooted at.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn key(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.prefix, name)
        }
    }

    fn check_closed(&self) -> Result<()> {
        if self.closed {
            Err(StorageError::StorageClosed.into())
        } else {
            Ok(())
        }
    }
}

impl Storage for ObjectStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        self.check_closed()?;

        let data = self.store.get_object(&self.key(name))?;
        Ok(Box::new(ObjectInput::new(data)))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        self.check_closed()?;

        Ok(Box::new(ObjectOutput::new(
            self.key(name),
            Arc::clone(&self.store),
        )))
    }

    fn file_exists(&self, name: &str) -> bool {
        if self.closed {
            return false;
        }

        self.store.object_size(&self.key(name)).is_ok()
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.check_closed()?;

        self.store.delete_object(&self.key(name))
    }

    fn list_files(&self) -> Result<Vec<String>> {
        self.check_closed()?;

        // The native listing matches textual prefixes, so `seg1` also yields
        // keys under `seg10/`. Filter to keys directly under our prefix.
        let keys = self.store.list_objects(&self.prefix)?;
        let dir_prefix = if self.prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", self.prefix)
        };

        let mut names: Vec<String> = keys
            .into_iter()
            .filter_map(|key| {
                let rest = key.strip_prefix(&dir_prefix)?;
                if rest.is_empty() || rest.contains('/') {
                    None
                } else {
                    Some(rest.to_string())
                }
            })
            .collect();
        names.sort();
        Ok(names)
    }

    fn file_size(&self, name: &str) -> Result<u64> {
        self.check_closed()?;

        self.store.object_size(&self.key(name))
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        self.check_closed()?;

        // No native rename on an object store: copy, then delete the old key.
        let data = self.store.get_object(&self.key(old_name))?;
        self.store.put_object(&self.key(new_name), data)?;
        self.store.delete_object(&self.key(old_name))
    }

    fn create_temp_output(&self, prefix: &str) -> Result<(String, Box<dyn StorageOutput>)> {
        self.check_closed()?;

        let mut counter = 0;
        let mut temp_name;

        loop {
            temp_name = format!("{prefix}_{counter}.tmp");
            if !self.file_exists(&temp_name) {
                break;
            }
            counter += 1;

            if counter > 10000 {
                return Err(
                    StorageError::IoError("Could not create temporary object".to_string()).into(),
                );
            }
        }

        let output = self.create_output(&temp_name)?;
        Ok((temp_name, output))
    }

    fn create_directory(&self) -> Result<()> {
        self.check_closed()?;
        // The prefix convention replaces real directories.
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.check_closed()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// An object-store input over a fetched object body.
#[derive(Debug)]
pub struct ObjectInput {
    cursor: Cursor<Vec<u8>>,
    size: u64,
}

impl ObjectInput {
    fn new(data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        ObjectInput {
            cursor: Cursor::new(data),
            size,
        }
    }
}

impl Read for ObjectInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for ObjectInput {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl StorageInput for ObjectInput {
    fn size(&self) -> Result<u64> {
        Ok(self.size)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// An object-store output buffering the body until close, then uploading it
/// as a single put.
#[derive(Debug)]
pub struct ObjectOutput {
    key: String,
    buffer: Vec<u8>,
    store: Arc<dyn ObjectStore>,
    closed: bool,
}

impl ObjectOutput {
    fn new(key: String, store: Arc<dyn ObjectStore>) -> Self {
        ObjectOutput {
            key,
            buffer: Vec::new(),
            store,
            closed: false,
        }
    }
}

impl Write for ObjectOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.closed {
            return Err(std::io::Error::other("Output is closed"));
        }

        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl StorageOutput for ObjectOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        // The object becomes visible atomically at close.
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.store
                .put_object(&self.key, std::mem::take(&mut self.buffer))?;
            self.closed = true;
        }
        Ok(())
    }
}
