use log::debug;
use url::Url;

use crate::errors::{WorkerError, WorkerResult};
use crate::host::HostChannel;
use crate::session::{LoginMode, Session};

impl<H: HostChannel> Session<H> {
    pub async fn mkdir(&mut self, url: &Url, permissions: Option<u32>) -> WorkerResult<()> {
        debug!("mkdir {}", url);
        self.ftp_open_connection(LoginMode::Implicit).await?;

        let path = url.path().to_string();

        if !self.send_cmd(&format!("MKD {}", path), 1).await? || self.last_reply.rtype != 2 {
            let current_path = self.current_path.clone();

            // Did mkdir fail because the directory already exists?
            if self.ftp_folder(&path, false).await? {
                // Change the directory back to what it was.
                let _ = self.ftp_folder(&current_path, false).await;
                return Err(WorkerError::DirAlreadyExist(path));
            }

            return Err(WorkerError::CouldNotMkdir(path));
        }

        if let Some(perms) = permissions {
            // chmod the dir we just created, ignoring errors
            let _ = self.ftp_chmod(&path, perms).await;
        }

        Ok(())
    }
}
