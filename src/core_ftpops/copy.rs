//! Fused copy: when exactly one endpoint is a local file, stream through
//! the transfer engine directly instead of pumping data through the host.

use log::debug;
use std::path::PathBuf;
use url::Url;

use crate::errors::{WorkerError, WorkerResult};
use crate::host::{HostChannel, JobFlags};
use crate::local_io::{map_write_error, LocalReader, LocalWriter};
use crate::session::Session;

impl<H: HostChannel> Session<H> {
    pub async fn copy(
        &mut self,
        src: &Url,
        dst: &Url,
        permissions: Option<u32>,
        flags: JobFlags,
    ) -> WorkerResult<()> {
        let src_local = src.scheme() == "file";
        let dst_local = dst.scheme() == "file";

        let result = if src_local && !dst_local {
            debug!("copy local '{}' -> ftp '{}'", src.path(), dst.path());
            self.ftp_copy_put(src, dst, permissions, flags).await
        } else if !src_local && dst_local {
            debug!("copy ftp '{}' -> local '{}'", src.path(), dst.path());
            self.ftp_copy_get(src, dst, permissions, flags).await
        } else {
            return Err(WorkerError::UnsupportedAction(String::new()));
        };

        let _ = self.close_command().await; // must close command!
        result
    }

    async fn ftp_copy_put(
        &mut self,
        src: &Url,
        dest_url: &Url,
        permissions: Option<u32>,
        mut flags: JobFlags,
    ) -> WorkerResult<()> {
        let local: PathBuf = src
            .to_file_path()
            .map_err(|_| WorkerError::DoesNotExist(src.to_string()))?;
        let display = local.display().to_string();

        let meta = tokio::fs::metadata(&local)
            .await
            .map_err(|_| WorkerError::DoesNotExist(display.clone()))?;
        if meta.is_dir() {
            return Err(WorkerError::IsDirectory(display));
        }

        let mut reader = LocalReader::open(&local)
            .await
            .map_err(|_| WorkerError::CannotOpenForReading(display))?;

        self.host_channel.total_size(meta.len()).await;

        // Resume decisions are negotiated against the remote .part file,
        // not carried in by the caller.
        flags.resume = false;
        self.ftp_put(dest_url, Some(&mut reader), permissions, flags)
            .await
    }

    async fn ftp_copy_get(
        &mut self,
        src_url: &Url,
        dest: &Url,
        permissions: Option<u32>,
        flags: JobFlags,
    ) -> WorkerResult<()> {
        let local: PathBuf = dest
            .to_file_path()
            .map_err(|_| WorkerError::CannotOpenForWriting(dest.to_string()))?;
        let display = local.display().to_string();

        let dest_meta = tokio::fs::metadata(&local).await.ok();
        if let Some(meta) = &dest_meta {
            if meta.is_dir() {
                return Err(WorkerError::IsDirectory(display));
            }
            if !flags.overwrite {
                return Err(WorkerError::FileAlreadyExist(display));
            }
        }

        let mark_partial = self.cfg.mark_partial;
        let part: PathBuf = PathBuf::from(format!("{}.part", local.display()));

        // Is there a partial to pick up?
        let mut resume = false;
        let part_meta = tokio::fs::metadata(&part).await.ok();
        if let Some(meta) = &part_meta {
            if mark_partial && meta.len() > 0 {
                if meta.is_dir() {
                    return Err(WorkerError::DirAlreadyExist(part.display().to_string()));
                }
                resume = self.host_channel.can_resume_at(meta.len()).await;
            }
        }

        if part_meta.is_some() && !resume {
            // get rid of an unwanted .part file
            let _ = tokio::fs::remove_file(&part).await;
        }
        if dest_meta.is_some() {
            // must delete for overwrite
            let _ = tokio::fs::remove_file(&local).await;
        }

        let target = if mark_partial { &part } else { &local };
        let mut offset = 0u64;
        let mut writer = if resume {
            match LocalWriter::open_append(target).await {
                Ok((w, at)) => {
                    debug!("copy: resuming at {}", at);
                    offset = at;
                    w
                }
                Err(_) => return Err(WorkerError::CannotResume(display)),
            }
        } else {
            LocalWriter::create(target, permissions)
                .await
                .map_err(|e| map_write_error(&e, target))?
        };

        let result = self.ftp_get(src_url, Some(&mut writer), offset).await;

        let close_result = writer.close().await;
        let result = match (result, close_result) {
            (Ok(()), Err(e)) => Err(e),
            (r, _) => r,
        };

        if mark_partial {
            match &result {
                Ok(()) => {
                    // rename the .part into place
                    if tokio::fs::rename(&part, &local).await.is_err() {
                        debug!("copy: cannot rename {} to {}", part.display(), display);
                        return Err(WorkerError::CannotRenamePartial(display));
                    }
                }
                Err(_) => {
                    // keep big partials for a later resume, drop small ones
                    if let Ok(meta) = tokio::fs::metadata(&part).await {
                        if meta.len() < self.cfg.minimum_keep_size {
                            let _ = tokio::fs::remove_file(&part).await;
                        }
                    }
                }
            }
        }

        result
    }
}
