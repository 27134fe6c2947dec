//! The data connection: a short-lived socket, plain or TLS-wrapped.
//!
//! The TLS role depends on who initiated the TCP connection: in passive
//! mode we dialed out and handshake as the client, in active mode the
//! server dialed us and we handshake as the server.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub enum DataStream {
    Plain(TcpStream),
    TlsClient(Box<tokio_rustls::client::TlsStream<TcpStream>>),
    TlsServer(Box<tokio_rustls::server::TlsStream<TcpStream>>),
}

impl DataStream {
    pub async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            DataStream::Plain(s) => s.read(buf).await,
            DataStream::TlsClient(s) => s.read(buf).await,
            DataStream::TlsServer(s) => s.read(buf).await,
        }
    }

    pub async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            DataStream::Plain(s) => s.write_all(buf).await,
            DataStream::TlsClient(s) => s.write_all(buf).await,
            DataStream::TlsServer(s) => s.write_all(buf).await,
        }
    }

    pub async fn flush(&mut self) -> std::io::Result<()> {
        match self {
            DataStream::Plain(s) => s.flush().await,
            DataStream::TlsClient(s) => s.flush().await,
            DataStream::TlsServer(s) => s.flush().await,
        }
    }

    pub async fn shutdown(&mut self) -> std::io::Result<()> {
        match self {
            DataStream::Plain(s) => s.shutdown().await,
            DataStream::TlsClient(s) => s.shutdown().await,
            DataStream::TlsServer(s) => s.shutdown().await,
        }
    }
}
