//! Local-filesystem shim, used only by the fused copy paths and their
//! `.part` handling. Maps I/O failures onto the host-visible error codes.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use log::debug;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::errors::WorkerError;

const ENOSPC: i32 = 28;

/// Translate a local write-side failure for the host.
pub fn map_write_error(e: &std::io::Error, path: &Path) -> WorkerError {
    let text = path.display().to_string();
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => WorkerError::WriteAccessDenied(text),
        std::io::ErrorKind::BrokenPipe => WorkerError::ConnectionBroken(text),
        _ if e.raw_os_error() == Some(ENOSPC) => WorkerError::DiskFull(text),
        _ => WorkerError::CouldNotWrite(text),
    }
}

pub struct LocalReader {
    file: File,
}

impl LocalReader {
    pub async fn open(path: &Path) -> std::io::Result<Self> {
        Ok(Self {
            file: File::open(path).await?,
        })
    }

    pub async fn seek(&mut self, offset: u64) -> std::io::Result<()> {
        self.file.seek(SeekFrom::Start(offset)).await?;
        Ok(())
    }

    /// Read up to `block_size` bytes; an empty vector is EOF.
    pub async fn read_block(&mut self, block_size: usize) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0u8; block_size];
        let n = self.file.read(&mut buf).await?;
        buf.truncate(n);
        Ok(buf)
    }
}

pub struct LocalWriter {
    file: File,
    path: PathBuf,
}

impl LocalWriter {
    /// Create (or truncate) the file. On Unix the mode keeps owner-write
    /// set, otherwise a resumed NFS transfer can lock us out of our own
    /// partial.
    pub async fn create(path: &Path, permissions: Option<u32>) -> std::io::Result<Self> {
        let mut opts = OpenOptions::new();
        opts.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mode = permissions.map(|p| p | 0o200).unwrap_or(0o666);
            opts.mode(mode);
        }
        #[cfg(not(unix))]
        let _ = permissions;
        Ok(Self {
            file: opts.open(path).await?,
            path: path.to_path_buf(),
        })
    }

    /// Open an existing partial for appending; returns the resume offset.
    pub async fn open_append(path: &Path) -> std::io::Result<(Self, u64)> {
        let mut file = OpenOptions::new().read(true).write(true).open(path).await?;
        let offset = file.seek(SeekFrom::End(0)).await?;
        debug!("resuming local file {} at {}", path.display(), offset);
        Ok((
            Self {
                file,
                path: path.to_path_buf(),
            },
            offset,
        ))
    }

    pub async fn write_all(&mut self, buf: &[u8]) -> Result<(), WorkerError> {
        self.file
            .write_all(buf)
            .await
            .map_err(|e| map_write_error(&e, &self.path))
    }

    pub async fn close(mut self) -> Result<(), WorkerError> {
        self.file
            .flush()
            .await
            .map_err(|e| map_write_error(&e, &self.path))
    }
}
