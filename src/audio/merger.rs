// Ordered audio-file concatenation
//
// Chunk files are complete container blobs; the merge is a sequential
// byte-stream concatenation, which is an accepted approximation rather
// than a container-level remux. Output is staged through a temp file in
// the destination directory so the final path never holds a partial merge.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

const COPY_BUFFER_SIZE: usize = 8192;

/// Assumed encoded bitrate for duration estimates (~128 kbps AAC).
pub const ENCODED_BYTES_PER_SEC: u64 = 16 * 1024;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("no input files to merge")]
    NoInput,
    #[error("failed to create output {path}: {message}")]
    Create { path: PathBuf, message: String },
    #[error("merge I/O error: {0}")]
    Io(String),
}

/// Concatenate `inputs` in order into `output`.
///
/// A single usable input is copied byte-identically. Missing or
/// zero-length inputs are skipped with a warning; when that leaves
/// nothing to merge the call fails with `NoInput` and no output file is
/// created. All writes go through a staging file renamed onto the final
/// path, so a failure never leaves a partial destination behind.
pub fn merge_files(inputs: &[PathBuf], output: &Path) -> Result<(), MergeError> {
    if inputs.is_empty() {
        crate::warn!("[merger] no input files provided");
        return Err(MergeError::NoInput);
    }

    let usable: Vec<&PathBuf> = inputs
        .iter()
        .filter(|input| match std::fs::metadata(input) {
            Ok(m) if m.len() > 0 => true,
            Ok(_) => {
                crate::warn!("[merger] input empty, skipped: {}", input.display());
                false
            }
            Err(_) => {
                crate::warn!("[merger] input missing, skipped: {}", input.display());
                false
            }
        })
        .collect();
    if usable.is_empty() {
        crate::warn!("[merger] all {} input file(s) missing or empty", inputs.len());
        return Err(MergeError::NoInput);
    }

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).map_err(|e| MergeError::Create {
            path: output.to_path_buf(),
            message: e.to_string(),
        })?;
    }

    crate::debug!("[merger] merging {} file(s) into {}", usable.len(), output.display());

    let staging = staging_path(output);
    let result = if let [single] = usable.as_slice() {
        std::fs::copy(single, &staging)
            .map(|_| ())
            .map_err(|e| MergeError::Io(e.to_string()))
    } else {
        concat_into(&usable, &staging, output)
    };
    match result {
        Ok(()) => {
            std::fs::rename(&staging, output).map_err(|e| {
                let _ = std::fs::remove_file(&staging);
                MergeError::Io(e.to_string())
            })?;
            Ok(())
        }
        Err(e) => {
            let _ = std::fs::remove_file(&staging);
            Err(e)
        }
    }
}

fn concat_into(inputs: &[&PathBuf], staging: &Path, output: &Path) -> Result<(), MergeError> {
    let file = File::create(staging).map_err(|e| MergeError::Create {
        path: output.to_path_buf(),
        message: e.to_string(),
    })?;
    let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, file);

    for (index, input) in inputs.iter().enumerate() {
        crate::debug!(
            "[merger] appending {}/{}: {}",
            index + 1,
            inputs.len(),
            input.display()
        );
        let mut reader =
            BufReader::new(File::open(input).map_err(|e| MergeError::Io(e.to_string()))?);
        io::copy(&mut reader, &mut writer).map_err(|e| MergeError::Io(e.to_string()))?;
    }

    writer.flush().map_err(|e| MergeError::Io(e.to_string()))?;
    Ok(())
}

fn staging_path(output: &Path) -> PathBuf {
    let mut name = output.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    output.with_file_name(name)
}

/// Approximate playable duration of an encoded file from its size,
/// assuming a fixed bitrate.
pub fn estimate_duration_ms(file_size_bytes: u64) -> u64 {
    (file_size_bytes / ENCODED_BYTES_PER_SEC) * 1000
}

#[cfg(test)]
#[path = "merger_test.rs"]
mod tests;
