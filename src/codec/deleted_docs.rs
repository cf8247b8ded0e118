//! Deletion log codec.
//!
//! The log is a single file `deleted_docs` laid out as
//! `[8-byte LE byte-count][packed u64 offsets]`. Writes accumulate: an
//! existing log is read back and the combined list is written out, so each
//! write call is additive and no persisted deletion is ever dropped by a
//! later write.
//!
//! The combined log is written to a temporary file and renamed over the old
//! one, so a crash mid-update leaves either the old log or the new one, never
//! neither. Two writers racing on the same log from independent codec
//! instances can still lose one contribution; the format has no
//! compare-and-swap to close that window.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::codec::DELETED_DOCS_FILE;
use crate::error::Result;
use crate::segment::types::DeletedDocs;
use crate::storage::{Storage, StorageInput, StorageOutput};

/// Codec for the per-segment deletion log.
#[derive(Debug, Default)]
pub struct DeletedDocsCodec {
    mutex: Mutex<()>,
}

impl DeletedDocsCodec {
    /// Create a new codec instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the full deletion log.
    ///
    /// An absent log is an error: callers are expected to write an empty log
    /// before the first read.
    pub fn read(&self, storage: &dyn Storage) -> Result<DeletedDocs> {
        let _guard = self.mutex.lock();

        let mut input = storage.open_input(DELETED_DOCS_FILE).inspect_err(|e| {
            error!(file = DELETED_DOCS_FILE, error = %e, "failed to open deletion log");
        })?;

        let offsets = read_offsets(&mut input)?;
        input.close()?;

        Ok(DeletedDocs::from_offsets(offsets))
    }

    /// Append deletions to the log.
    ///
    /// If a log already exists its offsets are read back and the new file
    /// holds `old ++ new`; otherwise a fresh log holds only `deleted`.
    pub fn write(&self, storage: &dyn Storage, deleted: &DeletedDocs) -> Result<()> {
        let _guard = self.mutex.lock();

        let old_offsets = if storage.file_exists(DELETED_DOCS_FILE) {
            let mut input = storage.open_input(DELETED_DOCS_FILE).inspect_err(|e| {
                error!(file = DELETED_DOCS_FILE, error = %e, "failed to open deletion log");
            })?;
            let offsets = read_offsets(&mut input)?;
            input.close()?;
            offsets
        } else {
            Vec::new()
        };

        let total_bytes = (old_offsets.len() + deleted.len()) as u64 * 8;

        // Stage the combined log in a temporary file, then swap it in, so a
        // crash mid-write cannot lose the old log along with the new entries.
        let (temp_name, mut output) = storage.create_temp_output(DELETED_DOCS_FILE)?;
        let write_result = (|| -> Result<()> {
            output.write_u64::<LittleEndian>(total_bytes)?;
            for &offset in &old_offsets {
                output.write_u64::<LittleEndian>(offset)?;
            }
            for &offset in deleted.offsets() {
                output.write_u64::<LittleEndian>(offset)?;
            }
            output.close()
        })();
        if let Err(e) = write_result {
            error!(file = %temp_name, error = %e, "failed to write deletion log");
            let _ = storage.delete_file(&temp_name);
            return Err(e);
        }

        storage.rename_file(&temp_name, DELETED_DOCS_FILE)?;

        debug!(
            old = old_offsets.len(),
            appended = deleted.len(),
            "deletion log updated"
        );
        Ok(())
    }

    /// Read only the number of logged deletions, without the body.
    pub fn read_size(&self, storage: &dyn Storage) -> Result<usize> {
        let _guard = self.mutex.lock();

        let mut input = storage.open_input(DELETED_DOCS_FILE).inspect_err(|e| {
            error!(file = DELETED_DOCS_FILE, error = %e, "failed to open deletion log");
        })?;

        let num_bytes = input.read_u64::<LittleEndian>()?;
        input.close()?;

        Ok((num_bytes / 8) as usize)
    }
}

fn read_offsets(input: &mut Box<dyn StorageInput>) -> Result<Vec<u64>> {
    let num_bytes = input.read_u64::<LittleEndian>()?;
    let count = (num_bytes / 8) as usize;

    let mut offsets = Vec::with_capacity(count);
    for _ in 0..count {
        offsets.push(input.read_u64::<LittleEndian>()?);
    }
    Ok(offsets)
}
