//! Temp-file-then-rename writes.
//!
//! Data is streamed into a hidden `.part` file next to the destination and
//! only renamed into place after it has been flushed. A write that fails or
//! is dropped half way removes its temp file and never touches the final path.

use std::path::{Path, PathBuf};

use futures::{Stream, StreamExt};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Bytes a temp name adds to the destination file name: `.` + `.<32 hex>.part`.
pub const TEMP_NAME_OVERHEAD: usize = 39;

/// Temp path for `dest`: `.<file name>.<uuid>.part` in the same directory.
pub fn temp_path_for(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{}.{}.part", name, Uuid::new_v4().simple()))
}

/// Removes the temp file on drop unless the write was committed.
struct TempFile {
    path: PathBuf,
    committed: bool,
}

impl TempFile {
    fn new(dest: &Path) -> Self {
        Self {
            path: temp_path_for(dest),
            committed: false,
        }
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Stream `chunks` into `dest` atomically. Returns the number of bytes written.
pub async fn write_stream_atomic<S, B, E>(dest: &Path, mut chunks: S) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<Error>,
{
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::filesystem(parent, e))?;
    }

    let mut temp = TempFile::new(dest);
    let mut file = File::create(&temp.path)
        .await
        .map_err(|e| Error::filesystem(&temp.path, e))?;

    let mut written: u64 = 0;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(Into::into)?;
        let bytes = chunk.as_ref();
        file.write_all(bytes)
            .await
            .map_err(|e| Error::filesystem(&temp.path, e))?;
        written += bytes.len() as u64;
    }

    file.flush()
        .await
        .map_err(|e| Error::filesystem(&temp.path, e))?;
    file.sync_all()
        .await
        .map_err(|e| Error::filesystem(&temp.path, e))?;
    drop(file);

    tokio::fs::rename(&temp.path, dest)
        .await
        .map_err(|e| Error::filesystem(dest, e))?;
    temp.committed = true;

    Ok(written)
}

/// Write an in-memory buffer to `dest` atomically.
pub async fn write_bytes_atomic(dest: &Path, bytes: &[u8]) -> Result<()> {
    let chunks = futures::stream::iter([Ok::<_, Error>(bytes)]);
    write_stream_atomic(dest, chunks).await?;
    Ok(())
}
