use log::debug;
use url::Url;

use crate::errors::{WorkerError, WorkerResult};
use crate::host::HostChannel;
use crate::session::{LoginMode, Session};

impl<H: HostChannel> Session<H> {
    pub async fn chmod(&mut self, url: &Url, permissions: u32) -> WorkerResult<()> {
        self.ftp_open_connection(LoginMode::Implicit).await?;

        if self.ftp_chmod(url.path(), permissions).await? {
            Ok(())
        } else {
            Err(WorkerError::CannotChmod(url.path().to_string()))
        }
    }

    /// `SITE CHMOD` with the low nine bits, in case we were handed a full
    /// st_mode. A 500 latches `chmod_unknown` and stops further attempts
    /// for this session.
    pub(crate) async fn ftp_chmod(&mut self, path: &str, permissions: u32) -> WorkerResult<bool> {
        debug_assert!(self.logged_on);

        if self.ext_caps.chmod_unknown {
            return Ok(false);
        }

        let cmd = format!("SITE CHMOD {:o} {}", permissions & 0o777, path);
        self.send_cmd(&cmd, 1).await?;
        if self.last_reply.rtype == 2 {
            return Ok(true);
        }

        if self.last_reply.code == 500 {
            self.ext_caps.chmod_unknown = true;
            debug!("ftp_chmod: CHMOD not supported - disabling");
        }
        Ok(false)
    }
}
