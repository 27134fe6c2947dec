//! The control-connection byte stream: plain TCP or TLS-wrapped, split into
//! buffered read and write halves, with command/reply framing on top.

use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;

use crate::core_control::reply::{Reply, ReplyAssembler};

enum ReadHalf {
    Plain(BufReader<OwnedReadHalf>),
    Tls(BufReader<tokio::io::ReadHalf<TlsStream<TcpStream>>>),
}

enum WriteHalf {
    Plain(OwnedWriteHalf),
    Tls(tokio::io::WriteHalf<TlsStream<TcpStream>>),
}

pub struct ControlCodec {
    reader: ReadHalf,
    writer: WriteHalf,
    peer: SocketAddr,
    local: SocketAddr,
    read_timeout: Duration,
}

impl ControlCodec {
    /// TCP-connect to the server's control port.
    pub async fn connect(
        addr: SocketAddr,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> std::io::Result<Self> {
        let stream = timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::TimedOut, "control connect timed out")
            })??;
        stream.set_nodelay(true).ok();

        let peer = stream.peer_addr()?;
        let local = stream.local_addr()?;
        let (rd, wr) = stream.into_split();
        Ok(Self {
            reader: ReadHalf::Plain(BufReader::new(rd)),
            writer: WriteHalf::Plain(wr),
            peer,
            local,
            read_timeout,
        })
    }

    /// Upgrade the plain connection to TLS after `AUTH TLS` was accepted.
    /// Consumes the codec; on handshake failure the socket is gone and the
    /// caller starts over from `connect`.
    pub async fn upgrade_to_tls(
        self,
        connector: &TlsConnector,
        name: ServerName<'static>,
        handshake_timeout: Duration,
    ) -> std::io::Result<Self> {
        let rd = match self.reader {
            ReadHalf::Plain(br) => br.into_inner(),
            ReadHalf::Tls(_) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "control connection is already TLS",
                ))
            }
        };
        let wr = match self.writer {
            WriteHalf::Plain(w) => w,
            WriteHalf::Tls(_) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "control connection is already TLS",
                ))
            }
        };
        let tcp = rd
            .reunite(wr)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;

        let tls = timeout(handshake_timeout, connector.connect(name, tcp))
            .await
            .map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::TimedOut, "TLS handshake timed out")
            })??;

        let (rd, wr) = tokio::io::split(tls);
        Ok(Self {
            reader: ReadHalf::Tls(BufReader::new(rd)),
            writer: WriteHalf::Tls(wr),
            peer: self.peer,
            local: self.local,
            read_timeout: self.read_timeout,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Write one command line, CRLF-terminated. `PASS` arguments are masked
    /// in the log.
    pub async fn send_command(&mut self, cmd: &str) -> std::io::Result<()> {
        if cmd.len() >= 4 && cmd[..4].eq_ignore_ascii_case("pass") {
            debug!("send> PASS [protected]");
        } else {
            debug!("send> {}", cmd);
        }

        let mut line = cmd.to_string();
        line.push_str("\r\n");
        match &mut self.writer {
            WriteHalf::Plain(w) => {
                w.write_all(line.as_bytes()).await?;
                w.flush().await
            }
            WriteHalf::Tls(w) => {
                w.write_all(line.as_bytes()).await?;
                w.flush().await
            }
        }
    }

    /// Read the next complete reply. `None` means EOF, timeout, or a
    /// transport error; the command channel treats all three as "no reply".
    pub async fn read_reply(&mut self) -> Option<Reply> {
        let mut asm = ReplyAssembler::new();
        loop {
            let mut line = String::new();
            let read = match &mut self.reader {
                ReadHalf::Plain(r) => timeout(self.read_timeout, r.read_line(&mut line)).await,
                ReadHalf::Tls(r) => timeout(self.read_timeout, r.read_line(&mut line)).await,
            };
            match read {
                Ok(Ok(0)) => {
                    debug!("control connection closed by peer");
                    return None;
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    warn!("control read failed: {}", e);
                    return None;
                }
                Err(_) => {
                    warn!("control read timed out");
                    return None;
                }
            }

            match asm.feed(&line) {
                Some(reply) => {
                    debug!("resp> {}", reply.text);
                    return Some(reply);
                }
                None => debug!("    > {}", line.trim_end()),
            }
        }
    }

    /// Send a command and read its reply.
    pub async fn execute(&mut self, cmd: &str) -> Option<Reply> {
        if self.send_command(cmd).await.is_err() {
            return None;
        }
        self.read_reply().await
    }
}
