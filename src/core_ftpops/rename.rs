use log::debug;
use url::Url;

use crate::errors::{WorkerError, WorkerResult};
use crate::host::{HostChannel, JobFlags};
use crate::session::{LoginMode, Session};

impl<H: HostChannel> Session<H> {
    pub async fn rename(&mut self, src: &Url, dst: &Url, _flags: JobFlags) -> WorkerResult<()> {
        debug!("rename {} -> {}", src, dst);
        self.ftp_open_connection(LoginMode::Implicit).await?;

        if self.ftp_rename(src.path(), dst.path()).await? {
            Ok(())
        } else {
            Err(WorkerError::CannotRename(src.path().to_string()))
        }
    }

    /// RNFR/RNTO from the source's parent directory. Shared with the upload
    /// path, which renames `.part` files into place.
    pub(crate) async fn ftp_rename(&mut self, src: &str, dst: &str) -> WorkerResult<bool> {
        debug_assert!(self.logged_on);

        let split = src.rfind('/').map(|p| p + 1).unwrap_or(0);
        if !self.ftp_folder(&src[..split], false).await? {
            return Ok(false);
        }

        if !self
            .send_cmd(&format!("RNFR {}", &src[split..]), 1)
            .await?
            || self.last_reply.rtype != 3
        {
            return Ok(false);
        }

        if !self.send_cmd(&format!("RNTO {}", dst), 1).await? || self.last_reply.rtype != 2 {
            return Ok(false);
        }

        Ok(true)
    }
}
