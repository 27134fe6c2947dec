//! Download engine (RETR).

use log::debug;
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

use crate::constants::{
    BLOCK_GROW_THRESHOLD, INITIAL_BLOCK_SIZE, MAXIMUM_BLOCK_SIZE, MINIMUM_MIME_SIZE,
};
use crate::core_ftpops::file_name;
use crate::errors::{WorkerError, WorkerResult};
use crate::host::HostChannel;
use crate::local_io::LocalWriter;
use crate::mime;
use crate::session::{LoginMode, Session};

impl<H: HostChannel> Session<H> {
    pub async fn get(&mut self, url: &Url) -> WorkerResult<()> {
        debug!("get {}", url);
        let result = self.ftp_get(url, None, 0).await;
        let _ = self.close_command().await; // must close command!
        result
    }

    /// Download `url`, either pumping chunks to the host (`copy_file` is
    /// `None`) or writing into a local file for the fused copy path.
    pub(crate) async fn ftp_get(
        &mut self,
        url: &Url,
        mut copy_file: Option<&mut LocalWriter>,
        mut offset: u64,
    ) -> WorkerResult<()> {
        self.ftp_open_connection(LoginMode::Implicit).await?;

        let path = url.path().to_string();

        // Find the size of the file, which doubles as an existence check.
        // A 550 can mean "no such file" or "not a plain file"; if the path
        // CWDs, the caller asked us to download a directory.
        if !self.ftp_size(&path, 'I').await?
            && self.last_reply.code == 550
            && self.ftp_folder(&path, false).await?
        {
            debug!("ftp_get: it is a directory in fact");
            return Err(WorkerError::IsDirectory(path));
        }

        if let Some(resume) = self.meta("resume").and_then(|s| s.parse::<u64>().ok()) {
            debug!("ftp_get: got offset from metadata: {}", resume);
            offset = resume;
        }

        self.open_command(
            "RETR",
            Some(&path),
            '?',
            WorkerError::CannotOpenForReading,
            offset,
        )
        .await?;

        // SIZE didn't work? Some servers put "(NNNN bytes)" into the RETR
        // reply instead.
        if self.size.is_none() {
            if let Some(pos) = self.last_reply.text.rfind('(') {
                let digits: String = self.last_reply.text[pos + 1..]
                    .chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                self.size = digits.parse::<u64>().ok().filter(|s| *s > 0);
            }
        }

        let total_size = self.size;
        let mut bytes_left = total_size.map(|s| s.saturating_sub(offset));

        debug!("ftp_get: starting with offset={}", offset);
        let mut processed: u64 = offset;

        let read_timeout = Duration::from_secs(self.cfg.read_timeout_secs);
        let mut buffer = vec![0u8; MAXIMUM_BLOCK_SIZE];
        // Start with small blocks in case of a slow data source; that hurts
        // throughput on large files, so grow the block size after a while.
        let mut block_size = INITIAL_BLOCK_SIZE;
        let mut buffer_cur = 0usize;
        let mut mimetype_emitted = false;

        while total_size.is_none() || bytes_left.unwrap_or(0) > 0 {
            if processed - offset > BLOCK_GROW_THRESHOLD {
                block_size = MAXIMUM_BLOCK_SIZE;
            }
            if block_size + buffer_cur > buffer.len() {
                block_size = buffer.len() - buffer_cur;
            }

            let n = {
                let data = match self.data.as_mut() {
                    Some(d) => d,
                    None => return Err(WorkerError::Internal(self.host.clone())),
                };
                match timeout(
                    read_timeout,
                    data.read(&mut buffer[buffer_cur..buffer_cur + block_size]),
                )
                .await
                {
                    Ok(Ok(n)) => n,
                    _ => 0,
                }
            };

            if n == 0 {
                // This is how EOF looks when the size is unknown; with a
                // known size a zero read means the server died on us.
                if total_size.is_none() {
                    break;
                }
                return Err(WorkerError::CouldNotRead(path));
            }
            processed += n as u64;

            // Collect very small chunks before processing, so the MIME
            // sniffer sees enough content.
            let chunk_len;
            if let Some(left) = bytes_left.as_mut() {
                *left = left.saturating_sub(n as u64);
                buffer_cur += n;
                if buffer_cur < MINIMUM_MIME_SIZE && *left > 0 {
                    self.host_channel.processed_size(processed).await;
                    continue;
                }
                chunk_len = buffer_cur;
                buffer_cur = 0;
            } else {
                chunk_len = n;
            }

            if !mimetype_emitted {
                mimetype_emitted = true;
                let mime = mime::mime_for(file_name(&path), &buffer[..chunk_len]);
                debug!("ftp_get: emitting mimetype {}", mime);
                self.host_channel.mime_type(mime).await;
                // Emit the total size after the mimetype.
                if let Some(total) = total_size {
                    self.host_channel.total_size(total).await;
                }
            }

            match copy_file.as_deref_mut() {
                None => self.host_channel.data(&buffer[..chunk_len]).await,
                Some(writer) => writer.write_all(&buffer[..chunk_len]).await?,
            }
            self.host_channel.processed_size(processed).await;
        }

        debug!("ftp_get: done");
        if copy_file.is_none() {
            // Signal EOF to the data pump with an empty chunk.
            self.host_channel.data(&[]).await;
        }
        self.host_channel
            .processed_size(total_size.unwrap_or(processed))
            .await;
        Ok(())
    }
}
