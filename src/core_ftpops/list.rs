//! Directory listings: CWD into the target, `LIST -la` with a plain `LIST`
//! fallback, parse line by line.

use chrono::Utc;
use log::{debug, warn};
use url::Url;

use crate::constants::{DEFAULT_FTP_PORT, FTP_LOGIN, FTP_PASSWD};
use crate::core_list::parse_list_line;
use crate::errors::{WorkerError, WorkerResult};
use crate::host::HostChannel;
use crate::session::{LoginMode, Session};

impl<H: HostChannel> Session<H> {
    pub async fn list_dir(&mut self, url: &Url) -> WorkerResult<()> {
        debug!("list_dir {}", url);
        self.ftp_open_connection(LoginMode::Implicit).await?;

        // No path given: redirect the host to the login directory.
        let path = url.path().to_string();
        if path.is_empty() {
            let mut real = Url::parse(&format!("ftps://{}/", self.host))
                .map_err(|e| WorkerError::Internal(e.to_string()))?;
            if self.user != FTP_LOGIN && !self.user.is_empty() {
                let _ = real.set_username(&self.user);
            }
            // Pass the password on, so the redirected job won't prompt for
            // one that was already given.
            if self.pass != FTP_PASSWD && !self.pass.is_empty() {
                let _ = real.set_password(Some(&self.pass));
            }
            if self.port > 0 && self.port != DEFAULT_FTP_PORT {
                let _ = real.set_port(Some(self.port));
            }
            if self.initial_path.is_empty() {
                self.initial_path = "/".to_string();
            }
            real.set_path(&self.initial_path);
            debug!("REDIRECTION to {}", real);
            self.host_channel.redirection(&real).await;
            return Ok(());
        }

        debug!("hunting for path '{}'", path);

        if !self.ftp_open_dir(&path).await? {
            if self.ftp_size(&path, 'I').await? {
                return Err(WorkerError::IsFile(path));
            }
            return Err(WorkerError::CannotEnterDirectory(path));
        }

        let lines = self.read_data_list().await;
        let now = Utc::now();
        for line in &lines {
            if let Some(entry) = parse_list_line(line, now) {
                if !entry.name.is_empty() {
                    self.host_channel.list_entry(&entry).await;
                }
            }
        }

        self.close_command().await?;
        Ok(())
    }

    /// CWD into `path` (so symlinks resolve and we learn whether it really
    /// is a directory), then open the listing. `-la` because `-a` alone
    /// drops the long format on some servers, with a plain `LIST` fallback
    /// for Windows servers that reject options altogether.
    async fn ftp_open_dir(&mut self, path: &str) -> WorkerResult<bool> {
        let tmp = if path.is_empty() { "/" } else { path };

        // We get a 550 here whether it's a file or doesn't exist.
        if !self.ftp_folder(tmp, false).await? {
            return Ok(false);
        }

        // We changed into the directory, so list without a path argument.
        if self
            .open_command("LIST -la", None, 'I', WorkerError::CannotEnterDirectory, 0)
            .await
            .is_err()
        {
            if self
                .open_command("LIST", None, 'I', WorkerError::CannotEnterDirectory, 0)
                .await
                .is_err()
            {
                warn!("Can't open for listing");
                return Ok(false);
            }
        }
        debug!("Starting of list was ok");
        Ok(true)
    }
}
