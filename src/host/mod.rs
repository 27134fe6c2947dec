//! The seam towards the host process.
//!
//! The protocol engine never talks to the host transport directly; it calls
//! the upcalls on [`HostChannel`] and receives one [`HostRequest`] per turn.
//! `ipc.rs` provides the concrete socket-backed implementation.

mod ipc;

pub use ipc::IpcChannel;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

use crate::core_list::FtpEntry;
use crate::errors::WorkerError;

/// Per-request string metadata (`statSide`, `details`, `resume`,
/// `autoLoginMacro`).
pub type Metadata = HashMap<String, String>;

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct JobFlags {
    pub overwrite: bool,
    pub resume: bool,
}

/// Credentials negotiated with the host's password dialog / cache.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthInfo {
    pub url: String,
    pub username: String,
    pub password: String,
    pub prompt: String,
    pub comment: String,
    pub keep_password: bool,
    pub read_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum MessageBoxKind {
    WarningContinueCancel,
    Information,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum DialogChoice {
    Primary,
    Secondary,
}

/// One operation received from the host process.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Operation {
    SetHost {
        host: String,
        port: u16,
        user: String,
        pass: String,
    },
    OpenConnection,
    CloseConnection,
    Stat {
        url: Url,
    },
    ListDir {
        url: Url,
    },
    Mkdir {
        url: Url,
        permissions: Option<u32>,
    },
    Rename {
        src: Url,
        dst: Url,
        #[serde(default)]
        flags: JobFlags,
    },
    Del {
        url: Url,
        is_file: bool,
    },
    Chmod {
        url: Url,
        permissions: u32,
    },
    Get {
        url: Url,
    },
    Put {
        url: Url,
        permissions: Option<u32>,
        #[serde(default)]
        flags: JobFlags,
    },
    Copy {
        src: Url,
        dst: Url,
        permissions: Option<u32>,
        #[serde(default)]
        flags: JobFlags,
    },
    SlaveStatus,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostRequest {
    #[serde(flatten)]
    pub op: Operation,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Upcalls into the host process.
///
/// Fire-and-forget upcalls swallow transport failures (the request loop
/// notices the dead socket on the next read); the querying upcalls return
/// a conservative default when the host is unreachable.
#[async_trait]
pub trait HostChannel: Send {
    async fn connected(&mut self);
    async fn finished(&mut self);
    async fn error(&mut self, err: &WorkerError);

    /// One chunk of downloaded data; an empty chunk signals end-of-stream.
    async fn data(&mut self, chunk: &[u8]);
    /// Ask the host to produce the next upload chunk.
    async fn data_req(&mut self);
    /// Receive the next upload chunk; empty means end of input.
    async fn read_data(&mut self) -> Vec<u8>;

    async fn mime_type(&mut self, mime: &str);
    async fn total_size(&mut self, size: u64);
    async fn processed_size(&mut self, size: u64);

    /// Acknowledge that a resumed download actually resumes.
    async fn can_resume(&mut self);
    /// Ask whether resuming an upload at `size` bytes is acceptable.
    async fn can_resume_at(&mut self, size: u64) -> bool;

    async fn list_entry(&mut self, entry: &FtpEntry);
    async fn stat_entry(&mut self, entry: &FtpEntry);

    async fn info_message(&mut self, msg: &str);
    async fn message_box(
        &mut self,
        kind: MessageBoxKind,
        text: &str,
        title: &str,
        primary: &str,
        secondary: &str,
    ) -> DialogChoice;

    /// Prompt the user for credentials. Returns false on cancel.
    async fn open_password_dialog(&mut self, info: &mut AuthInfo, err_msg: &str) -> bool;
    /// Store credentials in the host's credential cache.
    async fn cache_authentication(&mut self, info: &AuthInfo);

    async fn redirection(&mut self, url: &Url);
    async fn slave_status(&mut self, host: &str, connected: bool);
}
