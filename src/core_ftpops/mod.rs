//! The operation dispatcher: one host request per turn, mapped onto the
//! session controller, data-channel negotiator and transfer engine.

pub mod chmod;
pub mod copy;
pub mod del;
pub mod get;
pub mod list;
pub mod mkdir;
pub mod put;
pub mod rename;
pub mod stat;

use log::debug;
use std::time::Duration;
use tokio::time::timeout;

use crate::host::{HostChannel, HostRequest, Operation};
use crate::session::Session;

/// Handle one request. Data-moving operations answer with `finished()` or
/// `error(...)`; `setHost`, `closeConnection` and `slaveStatus` have no
/// completion upcall, and `openConnection` acknowledges via `connected()`.
pub async fn dispatch<H: HostChannel>(session: &mut Session<H>, request: HostRequest) {
    session.set_metadata(request.metadata);

    match request.op {
        Operation::SetHost {
            host,
            port,
            user,
            pass,
        } => {
            session.set_host(host, port, user, pass).await;
        }
        Operation::OpenConnection => {
            if let Err(e) = session.open_connection().await {
                session.host_channel.error(&e).await;
            }
        }
        Operation::CloseConnection => {
            session.close_connection().await;
        }
        Operation::SlaveStatus => {
            session.slave_status().await;
        }
        op => {
            let result = match op {
                Operation::Stat { url } => session.stat(&url).await,
                Operation::ListDir { url } => session.list_dir(&url).await,
                Operation::Mkdir { url, permissions } => session.mkdir(&url, permissions).await,
                Operation::Rename { src, dst, flags } => session.rename(&src, &dst, flags).await,
                Operation::Del { url, is_file } => session.del(&url, is_file).await,
                Operation::Chmod { url, permissions } => session.chmod(&url, permissions).await,
                Operation::Get { url } => session.get(&url).await,
                Operation::Put {
                    url,
                    permissions,
                    flags,
                } => session.put(&url, permissions, flags).await,
                Operation::Copy {
                    src,
                    dst,
                    permissions,
                    flags,
                } => session.copy(&src, &dst, permissions, flags).await,
                _ => unreachable!(),
            };
            match result {
                Ok(()) => session.host_channel.finished().await,
                Err(e) => {
                    debug!("operation failed: {}", e);
                    session.host_channel.error(&e).await;
                }
            }
        }
    }
}

/// Normalize an absolute remote path: collapse duplicate slashes and
/// resolve `.` / `..` components.
pub(crate) fn clean_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    if absolute {
        format!("/{}", parts.join("/"))
    } else {
        parts.join("/")
    }
}

/// Everything up to and including the last `/`.
pub(crate) fn parent_dir(path: &str) -> String {
    match path.rfind('/') {
        Some(pos) => path[..pos + 1].to_string(),
        None => String::new(),
    }
}

/// The last path component.
pub(crate) fn file_name(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}

impl<H: HostChannel> Session<H> {
    /// Drain the data connection into lines; used for LIST payloads. Read
    /// failures just end the listing, like an early EOF would.
    pub(crate) async fn read_data_list(&mut self) -> Vec<String> {
        let read_timeout = Duration::from_secs(self.cfg.read_timeout_secs);
        let mut raw = Vec::new();
        let mut chunk = [0u8; 4096];

        if let Some(data) = self.data.as_mut() {
            loop {
                match timeout(read_timeout, data.read(&mut chunk)).await {
                    Ok(Ok(0)) => break,
                    Ok(Ok(n)) => raw.extend_from_slice(&chunk[..n]),
                    _ => break,
                }
            }
        }

        String::from_utf8_lossy(&raw)
            .lines()
            .map(|l| {
                debug!("dir > {}", l);
                l.to_string()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path("/a/b/../c"), "/a/c");
        assert_eq!(clean_path("/a//b/./c/"), "/a/b/c");
        assert_eq!(clean_path("/"), "/");
        assert_eq!(clean_path("/.."), "/");
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("/a/b"), "/a/");
        assert_eq!(parent_dir("/a"), "/");
        assert_eq!(parent_dir("plain"), "");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("/a/b"), "b");
        assert_eq!(file_name("/a/b/"), "b");
        assert_eq!(file_name("c"), "c");
    }
}
