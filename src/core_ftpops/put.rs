//! Upload engine (STOR), with `.part` marking and resume negotiation.

use log::debug;
use url::Url;

use crate::constants::{BLOCK_GROW_THRESHOLD, FTP_LOGIN, INITIAL_BLOCK_SIZE, MAXIMUM_BLOCK_SIZE};
use crate::errors::{WorkerError, WorkerResult};
use crate::host::{HostChannel, JobFlags};
use crate::local_io::LocalReader;
use crate::session::{LoginMode, Session};

impl<H: HostChannel> Session<H> {
    pub async fn put(
        &mut self,
        url: &Url,
        permissions: Option<u32>,
        flags: JobFlags,
    ) -> WorkerResult<()> {
        debug!("put {}", url);
        let result = self.ftp_put(url, None, permissions, flags).await;
        let _ = self.close_command().await; // must close command!
        result
    }

    /// Upload to `dest_url`, reading chunks from the host data pump, or
    /// from a local file for the fused copy path.
    pub(crate) async fn ftp_put(
        &mut self,
        dest_url: &Url,
        mut copy_file: Option<&mut LocalReader>,
        permissions: Option<u32>,
        mut flags: JobFlags,
    ) -> WorkerResult<()> {
        self.ftp_open_connection(LoginMode::Implicit).await?;

        // Don't use mark partial over anonymous FTP: incoming dirs often
        // allow STOR but not RNTO.
        let mark_partial = if self.user.is_empty() || self.user == FTP_LOGIN {
            false
        } else {
            self.cfg.mark_partial
        };

        let dest_orig = dest_url.path().to_string();
        let dest_part = format!("{}.part", dest_orig);
        let mut permissions = permissions;

        if self.ftp_size(&dest_orig, 'I').await? {
            match self.size {
                None => {
                    // delete files with zero size
                    if !self.send_cmd(&format!("DELE {}", dest_orig), 1).await?
                        || self.last_reply.rtype != 2
                    {
                        return Err(WorkerError::CannotDeletePartial(dest_orig));
                    }
                }
                Some(_) if !flags.overwrite && !flags.resume => {
                    return Err(WorkerError::FileAlreadyExist(dest_orig));
                }
                Some(_) if mark_partial => {
                    // park the existing file under the .part name
                    if !self.ftp_rename(&dest_orig, &dest_part).await? {
                        return Err(WorkerError::CannotRenamePartial(dest_orig));
                    }
                }
                Some(_) => {}
            }
            // Don't chmod an existing file.
            permissions = None;
        } else if mark_partial && self.ftp_size(&dest_part, 'I').await? {
            // a file with the .part extension already exists
            match self.size {
                None => {
                    if !self.send_cmd(&format!("DELE {}", dest_part), 1).await?
                        || self.last_reply.rtype != 2
                    {
                        return Err(WorkerError::CannotDeletePartial(dest_part));
                    }
                }
                Some(size) if !flags.overwrite && !flags.resume => {
                    if self.host_channel.can_resume_at(size).await {
                        flags.resume = true;
                    } else {
                        return Err(WorkerError::FileAlreadyExist(dest_orig));
                    }
                }
                Some(_) => {}
            }
        } else {
            self.size = None;
        }

        let dest = if mark_partial {
            debug!("Adding .part extension to {}", dest_orig);
            dest_part.clone()
        } else {
            dest_orig.clone()
        };

        let mut offset: u64 = 0;
        if flags.resume {
            if let Some(size) = self.size {
                offset = size;
                if let Some(reader) = copy_file.as_deref_mut() {
                    if reader.seek(offset).await.is_err() {
                        return Err(WorkerError::CannotResume(dest_orig));
                    }
                }
            }
        }

        self.open_command("STOR", Some(&dest), '?', WorkerError::CouldNotWrite, offset)
            .await?;

        debug!("ftp_put: starting with offset={}", offset);
        let mut processed = offset;
        let mut block_size = INITIAL_BLOCK_SIZE;
        let mut failure: Option<WorkerError> = None;

        loop {
            let buffer = match copy_file.as_deref_mut() {
                None => {
                    self.host_channel.data_req().await;
                    self.host_channel.read_data().await
                }
                Some(reader) => {
                    if processed - offset > BLOCK_GROW_THRESHOLD {
                        block_size = MAXIMUM_BLOCK_SIZE;
                    }
                    match reader.read_block(block_size).await {
                        Ok(buf) => buf,
                        Err(_) => {
                            failure = Some(WorkerError::CouldNotWrite(dest_orig.clone()));
                            break;
                        }
                    }
                }
            };

            if buffer.is_empty() {
                break; // end of input
            }

            let written = match self.data.as_mut() {
                Some(data) => match data.write_all(&buffer).await {
                    Ok(()) => data.flush().await,
                    Err(e) => Err(e),
                },
                None => Err(std::io::Error::new(
                    std::io::ErrorKind::NotConnected,
                    "no data connection",
                )),
            };
            if written.is_err() {
                failure = Some(WorkerError::CouldNotWrite(dest_orig.clone()));
                break;
            }

            processed += buffer.len() as u64;
            self.host_channel.processed_size(processed).await;
        }

        if let Some(err) = failure {
            let _ = self.close_command().await; // don't care about errors
            debug!("Error during 'put'. Aborting.");
            if mark_partial {
                // remove the partial if it is smaller than the keep limit
                if self.ftp_size(&dest, 'I').await? && processed < self.cfg.minimum_keep_size {
                    let _ = self.send_cmd(&format!("DELE {}", dest), 1).await;
                }
            }
            return Err(err);
        }

        if !self.close_command().await? {
            return Err(WorkerError::CouldNotWrite(dest_orig));
        }

        // after a full upload, rename the file back to its original name
        if mark_partial {
            debug!("renaming dest ({}) back to dest_orig ({})", dest, dest_orig);
            if !self.ftp_rename(&dest_part, &dest_orig).await? {
                return Err(WorkerError::CannotRenamePartial(dest_orig));
            }
        }

        // set final permissions
        if let Some(perms) = permissions {
            if self.user == FTP_LOGIN {
                debug!("Trying to chmod over anonymous FTP ???");
            }
            // best effort; a server without SITE CHMOD doesn't fail the put
            let _ = self.ftp_chmod(&dest_orig, perms).await;
        }

        Ok(())
    }
}
