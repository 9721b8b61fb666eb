// Chunk sequencing and file naming
//
// A session's audio is captured as numbered chunk files
// `{base}_{index}.{ext}`, indices contiguous from zero. The tracker owns
// the numbering and the open/closed bookkeeping; actual file I/O stays
// with the capture device.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::session::model::{AudioChunk, now_ms};

/// File name of chunk `index` for a session base name.
pub fn chunk_file_name(base_file_name: &str, index: i64, extension: &str) -> String {
    format!("{}_{}.{}", base_file_name, index, extension)
}

/// Full path of chunk `index` inside the session output directory.
pub fn chunk_path(output_dir: &Path, base_file_name: &str, index: i64, extension: &str) -> PathBuf {
    output_dir.join(chunk_file_name(base_file_name, index, extension))
}

/// A finalized chunk, ready to be sealed in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedChunk {
    pub chunk_id: String,
    pub chunk_index: i64,
    pub end_time_ms: i64,
    pub duration_ms: i64,
    pub file_size_bytes: i64,
}

#[derive(Debug, Clone)]
struct OpenChunk {
    chunk_id: String,
    index: i64,
    path: PathBuf,
    started_ms: i64,
}

/// Per-session chunk bookkeeping.
///
/// At most one chunk is open at a time; closing returns the figures the
/// store needs to seal the row.
pub struct ChunkTracker {
    session_id: String,
    output_dir: PathBuf,
    base_file_name: String,
    extension: String,
    open: Option<OpenChunk>,
    next_index: i64,
}

impl ChunkTracker {
    pub fn new(
        session_id: String,
        output_dir: PathBuf,
        base_file_name: String,
        extension: String,
    ) -> Self {
        Self {
            session_id,
            output_dir,
            base_file_name,
            extension,
            open: None,
            next_index: 0,
        }
    }

    /// Begin the next chunk, returning the row to insert. The previous
    /// chunk must have been closed first.
    pub fn open_next(&mut self) -> AudioChunk {
        debug_assert!(self.open.is_none(), "previous chunk still open");
        let index = self.next_index;
        self.next_index += 1;
        let path = chunk_path(&self.output_dir, &self.base_file_name, index, &self.extension);
        let started_ms = now_ms();
        let chunk_id = Uuid::new_v4().to_string();
        self.open = Some(OpenChunk {
            chunk_id: chunk_id.clone(),
            index,
            path: path.clone(),
            started_ms,
        });
        AudioChunk {
            chunk_id,
            session_id: self.session_id.clone(),
            chunk_index: index,
            file_path: path.to_string_lossy().into_owned(),
            start_time_ms: started_ms,
            end_time_ms: None,
            duration_ms: 0,
            file_size_bytes: 0,
            is_complete: false,
            needs_merging: true,
        }
    }

    /// Close the open chunk with the final file size reported by the
    /// capture device.
    pub fn close_current(&mut self, file_size_bytes: i64) -> Option<ClosedChunk> {
        let open = self.open.take()?;
        let end_time_ms = now_ms();
        Some(ClosedChunk {
            chunk_id: open.chunk_id,
            chunk_index: open.index,
            end_time_ms,
            duration_ms: (end_time_ms - open.started_ms).max(0),
            file_size_bytes,
        })
    }

    /// Path of the chunk currently being written, if any.
    pub fn open_path(&self) -> Option<&Path> {
        self.open.as_ref().map(|c| c.path.as_path())
    }

    /// Index of the chunk currently being written, if any.
    pub fn open_index(&self) -> Option<i64> {
        self.open.as_ref().map(|c| c.index)
    }

    /// Index the most recently opened chunk got (-1 before the first).
    pub fn last_index(&self) -> i64 {
        self.next_index - 1
    }

    /// Paths of all chunk files created so far, in index order.
    pub fn all_paths(&self) -> Vec<PathBuf> {
        (0..self.next_index)
            .map(|i| chunk_path(&self.output_dir, &self.base_file_name, i, &self.extension))
            .collect()
    }
}

#[cfg(test)]
#[path = "chunk_test.rs"]
mod tests;
