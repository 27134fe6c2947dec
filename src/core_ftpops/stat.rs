//! The stat operation: directory probe by CWD, file probe by SIZE, full
//! details by listing the parent directory.

use chrono::Utc;
use log::debug;
use url::Url;

use crate::core_ftpops::{clean_path, file_name, parent_dir};
use crate::core_list::{parse_list_line, FtpEntry};
use crate::errors::{WorkerError, WorkerResult};
use crate::host::HostChannel;
use crate::session::{LoginMode, Session};

impl<H: HostChannel> Session<H> {
    pub async fn stat(&mut self, url: &Url) -> WorkerResult<()> {
        debug!("stat: path='{}'", url.path());
        self.ftp_open_connection(LoginMode::Implicit).await?;

        let path = clean_path(url.path());

        // We can't stat root, but we know it's a dir.
        if path.is_empty() || path == "/" {
            let entry = FtpEntry::root();
            self.host_channel.stat_entry(&entry).await;
            return Ok(());
        }

        let filename = file_name(&path).to_string();

        // Try to cwd into it: works for a directory (and follows symlinks),
        // gives a 550 for files and missing paths alike.
        let is_dir = self.ftp_folder(&path, false).await?;

        let details: u32 = self
            .meta("details")
            .and_then(|d| d.parse().ok())
            .unwrap_or(2);
        debug!("stat details={}", details);

        if details == 0 {
            if !is_dir && !self.ftp_size(&path, 'I').await? {
                // neither dir nor file: it doesn't exist at all
                return self.stat_answer_not_found(&path, &filename).await;
            }
            let entry = FtpEntry::short(&filename, is_dir);
            self.host_channel.stat_entry(&entry).await;
            return Ok(());
        }

        if is_dir {
            // Don't list the parent for a directory: too slow, and some
            // servers won't show it anyway. Knowing it's a dir is enough.
            let entry = FtpEntry::short(&filename, true);
            self.host_channel.stat_entry(&entry).await;
            return Ok(());
        }

        // A file (or nothing): list just this name from the parent.
        let parent = parent_dir(&path);
        self.ftp_folder(&parent, true).await?;

        self.open_command(
            "LIST",
            Some(&filename),
            'I',
            WorkerError::DoesNotExist,
            0,
        )
        .await?;

        let lines = self.read_data_list().await;
        let now = Utc::now();
        let mut found: Option<FtpEntry> = None;
        for line in &lines {
            if let Some(entry) = parse_list_line(line, now) {
                // Some servers return only the name, some echo the path we
                // asked for; match the trailing component too.
                let hit = entry.name == filename
                    || entry.name.ends_with(&format!("/{}", filename));
                if found.is_none() && hit {
                    found = Some(entry);
                }
            }
        }

        self.close_command().await?;

        let mut entry = match found {
            Some(e) => e,
            None => return self.stat_answer_not_found(&path, &filename).await,
        };

        // A symlink pointing back at the stat'ed path would loop forever
        // upstream; report the cycle instead.
        if let Some(target) = entry.link_target.as_deref() {
            let resolved = if target.starts_with('/') {
                clean_path(target)
            } else {
                clean_path(&format!("{}{}", parent, target))
            };
            if resolved == path {
                return Err(WorkerError::CyclicLink(url.to_string()));
            }
        }

        entry.name = filename;
        self.host_channel.stat_entry(&entry).await;
        debug!("stat: finished successfully");
        Ok(())
    }

    /// The path neither CWDs nor LISTs. When the host only wants to read
    /// the file ("statSide=source"), claim it exists anyway: some servers
    /// forbid listing but happily serve RETR.
    async fn stat_answer_not_found(
        &mut self,
        path: &str,
        filename: &str,
    ) -> WorkerResult<()> {
        let stat_side = self.meta("statSide").unwrap_or("").to_string();
        debug!("stat statSide={}", stat_side);
        if stat_side == "source" {
            debug!("Not found, but assuming found, because some servers don't allow listing");
            let entry = FtpEntry::short(filename, false);
            self.host_channel.stat_entry(&entry).await;
            return Ok(());
        }
        Err(WorkerError::DoesNotExist(path.to_string()))
    }
}
