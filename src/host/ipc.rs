//! Socket transport behind the [`HostChannel`] trait.
//!
//! Frames are newline-delimited JSON. The two binary-bearing calls (`data`
//! and `readData`) put the byte count in the JSON header and follow it with
//! exactly that many raw bytes, so payloads never pass through the JSON
//! encoder.

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use url::Url;

use crate::core_list::FtpEntry;
use crate::errors::WorkerError;
use crate::host::{
    AuthInfo, DialogChoice, HostChannel, HostRequest, MessageBoxKind,
};

pub struct IpcChannel {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl IpcChannel {
    pub async fn connect(app_socket: &str) -> anyhow::Result<Self> {
        let stream = UnixStream::connect(app_socket).await?;
        let (rd, wr) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(rd),
            writer: wr,
        })
    }

    /// Read the next host request. `None` means the host closed the socket
    /// and the worker should shut down.
    pub async fn read_request(&mut self) -> anyhow::Result<Option<HostRequest>> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            return Ok(None);
        }
        let req: HostRequest = serde_json::from_str(line.trim_end())?;
        debug!("request: {:?}", req.op);
        Ok(Some(req))
    }

    async fn send_frame(&mut self, frame: Value) {
        let mut buf = frame.to_string();
        buf.push('\n');
        if let Err(e) = self.writer.write_all(buf.as_bytes()).await {
            warn!("host channel write failed: {}", e);
        }
    }

    async fn read_frame(&mut self) -> Option<Value> {
        let mut line = String::new();
        match self.reader.read_line(&mut line).await {
            Ok(0) => None,
            Ok(_) => serde_json::from_str(line.trim_end()).ok(),
            Err(e) => {
                warn!("host channel read failed: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl HostChannel for IpcChannel {
    async fn connected(&mut self) {
        self.send_frame(json!({ "event": "connected" })).await;
    }

    async fn finished(&mut self) {
        self.send_frame(json!({ "event": "finished" })).await;
    }

    async fn error(&mut self, err: &WorkerError) {
        self.send_frame(json!({
            "event": "error",
            "code": err.name(),
            "msg": err.payload(),
        }))
        .await;
    }

    async fn data(&mut self, chunk: &[u8]) {
        self.send_frame(json!({ "event": "data", "len": chunk.len() }))
            .await;
        if !chunk.is_empty() {
            if let Err(e) = self.writer.write_all(chunk).await {
                warn!("host channel write failed: {}", e);
            }
        }
    }

    async fn data_req(&mut self) {
        self.send_frame(json!({ "event": "dataReq" })).await;
    }

    async fn read_data(&mut self) -> Vec<u8> {
        let len = match self.read_frame().await {
            Some(v) => v.get("len").and_then(Value::as_u64).unwrap_or(0) as usize,
            None => 0,
        };
        if len == 0 {
            return Vec::new();
        }
        let mut buf = vec![0u8; len];
        match self.reader.read_exact(&mut buf).await {
            Ok(_) => buf,
            Err(e) => {
                warn!("host channel read failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn mime_type(&mut self, mime: &str) {
        self.send_frame(json!({ "event": "mimeType", "mime": mime }))
            .await;
    }

    async fn total_size(&mut self, size: u64) {
        self.send_frame(json!({ "event": "totalSize", "size": size }))
            .await;
    }

    async fn processed_size(&mut self, size: u64) {
        self.send_frame(json!({ "event": "processedSize", "size": size }))
            .await;
    }

    async fn can_resume(&mut self) {
        self.send_frame(json!({ "event": "canResume" })).await;
    }

    async fn can_resume_at(&mut self, size: u64) -> bool {
        self.send_frame(json!({ "event": "canResume", "size": size }))
            .await;
        self.read_frame()
            .await
            .and_then(|v| v.get("resume").and_then(Value::as_bool))
            .unwrap_or(false)
    }

    async fn list_entry(&mut self, entry: &FtpEntry) {
        self.send_frame(json!({ "event": "listEntry", "entry": entry }))
            .await;
    }

    async fn stat_entry(&mut self, entry: &FtpEntry) {
        self.send_frame(json!({ "event": "statEntry", "entry": entry }))
            .await;
    }

    async fn info_message(&mut self, msg: &str) {
        self.send_frame(json!({ "event": "infoMessage", "msg": msg }))
            .await;
    }

    async fn message_box(
        &mut self,
        kind: MessageBoxKind,
        text: &str,
        title: &str,
        primary: &str,
        secondary: &str,
    ) -> DialogChoice {
        self.send_frame(json!({
            "event": "messageBox",
            "kind": kind,
            "text": text,
            "title": title,
            "primary": primary,
            "secondary": secondary,
        }))
        .await;
        // A dead host cannot acknowledge danger; treat it as a refusal.
        match self.read_frame().await {
            Some(v) if v.get("choice").and_then(Value::as_str) == Some("primary") => {
                DialogChoice::Primary
            }
            _ => DialogChoice::Secondary,
        }
    }

    async fn open_password_dialog(&mut self, info: &mut AuthInfo, err_msg: &str) -> bool {
        self.send_frame(json!({
            "event": "openPasswordDialog",
            "info": &*info,
            "errMsg": err_msg,
        }))
        .await;
        match self.read_frame().await {
            Some(v) if v.get("ok").and_then(Value::as_bool) == Some(true) => {
                if let Some(user) = v.get("username").and_then(Value::as_str) {
                    info.username = user.to_string();
                }
                if let Some(pass) = v.get("password").and_then(Value::as_str) {
                    info.password = pass.to_string();
                }
                if let Some(keep) = v.get("keepPassword").and_then(Value::as_bool) {
                    info.keep_password = keep;
                }
                true
            }
            _ => false,
        }
    }

    async fn cache_authentication(&mut self, info: &AuthInfo) {
        self.send_frame(json!({ "event": "cacheAuthentication", "info": info }))
            .await;
    }

    async fn redirection(&mut self, url: &Url) {
        self.send_frame(json!({ "event": "redirection", "url": url.as_str() }))
            .await;
    }

    async fn slave_status(&mut self, host: &str, connected: bool) {
        self.send_frame(json!({
            "event": "slaveStatus",
            "host": host,
            "connected": connected,
        }))
        .await;
    }
}
