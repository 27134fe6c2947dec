use log::debug;
use url::Url;

use crate::core_ftpops::parent_dir;
use crate::errors::{WorkerError, WorkerResult};
use crate::host::HostChannel;
use crate::session::{LoginMode, Session};

impl<H: HostChannel> Session<H> {
    pub async fn del(&mut self, url: &Url, is_file: bool) -> WorkerResult<()> {
        debug!("del {} is_file={}", url, is_file);
        self.ftp_open_connection(LoginMode::Implicit).await?;

        // When deleting a directory we must leave it first; the previous
        // command probably went into it to stat it.
        if !is_file {
            let _ = self.ftp_folder(&parent_dir(url.path()), false).await;
        }

        let cmd = if is_file {
            format!("DELE {}", url.path())
        } else {
            format!("RMD {}", url.path())
        };

        if !self.send_cmd(&cmd, 1).await? || self.last_reply.rtype != 2 {
            return Err(WorkerError::CannotDelete(url.path().to_string()));
        }
        Ok(())
    }
}
