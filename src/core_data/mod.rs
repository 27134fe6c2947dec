//! Data-channel negotiation: PASV, then EPSV, then PORT/EPRT, with
//! PBSZ/PROT protection setup and the deferred TLS handshake.

pub mod pasv;
pub mod port;
pub mod stream;

pub use stream::DataStream;

use log::{debug, warn};
use std::net::{IpAddr, SocketAddr};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use crate::core_control::tls::{make_acceptor, make_connector, server_name};
use crate::errors::{WorkerError, WorkerResult};
use crate::host::HostChannel;
use crate::session::Session;

/// Sticky capability negatives, learned from 5xx replies to extension
/// commands. One value object per session, cleared on reconnect.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtCaps {
    pub pasv_unknown: bool,
    pub epsv_unknown: bool,
    pub epsv_all_sent: bool,
    pub eprt_unknown: bool,
    pub chmod_unknown: bool,
}

impl<H: HostChannel> Session<H> {
    pub(crate) fn close_data_connection(&mut self) {
        self.data = None;
        self.prot_p = false;
    }

    /// Set up the data connection, trying the modes in preference order.
    /// A mode that cannot connect is not an error as long as another can be
    /// tried; the PASV error is preferred when everything fails, since
    /// passive is what should have worked in the first place.
    pub(crate) async fn open_data_connection(&mut self) -> WorkerResult<()> {
        debug_assert!(self.logged_on);
        self.close_data_connection();

        let mut pasv_failed = false;

        if !self.cfg.disable_passive_mode {
            if self.open_pasv_data_connection().await? {
                self.request_data_encryption().await?;
                return Ok(());
            }
            pasv_failed = true;
            self.close_data_connection();

            if !self.cfg.disable_epsv {
                if self.open_epsv_data_connection().await? {
                    self.request_data_encryption().await?;
                    return Ok(());
                }
                self.close_data_connection();
            }

            // After an accepted EPSV ALL, active connections are off-limits.
            if self.ext_caps.epsv_all_sent {
                return Err(WorkerError::Internal(self.host.clone()));
            }
        }

        match self.open_port_data_connection().await {
            Ok(()) => {
                self.request_data_encryption().await?;
                Ok(())
            }
            Err(e) => {
                self.close_data_connection();
                if pasv_failed {
                    Err(WorkerError::Internal(self.host.clone()))
                } else {
                    Err(e)
                }
            }
        }
    }

    /// PASV (IPv4 only). `Ok(false)` means "try the next mode".
    async fn open_pasv_data_connection(&mut self) -> WorkerResult<bool> {
        let peer = match self.control.as_ref() {
            Some(c) => c.peer_addr(),
            None => return Ok(false),
        };
        if !peer.is_ipv4() {
            return Ok(false); // no PASV on non-IPv4 connections
        }
        if self.ext_caps.pasv_unknown {
            return Ok(false); // already tried and got "unknown command"
        }

        self.passive = true;

        if !self.send_cmd("PASV", 1).await? || self.last_reply.rtype != 2 {
            debug!("PASV attempt failed");
            if self.last_reply.rtype == 5 {
                debug!("disabling use of PASV");
                self.ext_caps.pasv_unknown = true;
            }
            return Ok(false);
        }

        let port = match pasv::parse_pasv_reply(self.last_reply.text_after(3)) {
            Some(p) => p,
            None => {
                warn!(
                    "parsing PASV port numbers failed: {}",
                    self.last_reply.text
                );
                return Ok(false);
            }
        };

        // Connect to the control peer, not the advertised host.
        let addr = SocketAddr::new(peer.ip(), port);
        debug!("Connecting to {}", addr);
        match timeout(
            std::time::Duration::from_secs(self.cfg.connect_timeout_secs),
            TcpStream::connect(addr),
        )
        .await
        {
            Ok(Ok(stream)) => {
                self.data = Some(DataStream::Plain(stream));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// EPSV; same contract as PASV.
    async fn open_epsv_data_connection(&mut self) -> WorkerResult<bool> {
        let peer = match self.control.as_ref() {
            Some(c) => c.peer_addr(),
            None => return Ok(false),
        };
        if self.ext_caps.epsv_unknown {
            return Ok(false);
        }

        self.passive = true;

        if !self.send_cmd("EPSV", 1).await? || self.last_reply.rtype != 2 {
            if self.last_reply.rtype == 5 {
                debug!("disabling use of EPSV");
                self.ext_caps.epsv_unknown = true;
            }
            return Ok(false);
        }

        let port = match pasv::parse_epsv_reply(self.last_reply.text_after(3)) {
            Some(p) => p,
            None => return Ok(false),
        };

        let addr = SocketAddr::new(peer.ip(), port);
        match timeout(
            std::time::Duration::from_secs(self.cfg.connect_timeout_secs),
            TcpStream::connect(addr),
        )
        .await
        {
            Ok(Ok(stream)) => {
                self.data = Some(DataStream::Plain(stream));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Active mode: bind a listener, announce it with PORT (IPv4) or EPRT
    /// (IPv6), then accept the server's connection within the connect
    /// timeout. Success is only reported once the accept completed.
    async fn open_port_data_connection(&mut self) -> WorkerResult<()> {
        let local = match self.control.as_ref() {
            Some(c) => c.local_addr(),
            None => return Err(WorkerError::Internal(self.host.clone())),
        };

        self.passive = false;
        if self.ext_caps.eprt_unknown {
            return Err(WorkerError::Internal(self.host.clone()));
        }

        let bind_addr: SocketAddr = match local.ip() {
            IpAddr::V4(_) => "0.0.0.0:0".parse().unwrap(),
            IpAddr::V6(_) => "[::]:0".parse().unwrap(),
        };
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| WorkerError::CouldNotConnect(format!("{}: {}", self.host, e)))?;
        let listen_port = listener
            .local_addr()
            .map_err(|e| WorkerError::CouldNotConnect(format!("{}: {}", self.host, e)))?
            .port();

        let is_eprt = local.is_ipv6();
        let command = match local.ip() {
            IpAddr::V4(v4) => port::format_port_command(v4, listen_port),
            IpAddr::V6(v6) => port::format_eprt_command(IpAddr::V6(v6), listen_port),
        };

        if !self.send_cmd(&command, 1).await? || self.last_reply.rtype != 2 {
            if is_eprt && self.last_reply.rtype == 5 {
                debug!("disabling use of EPRT");
                self.ext_caps.eprt_unknown = true;
            }
            return Err(WorkerError::CouldNotConnect(self.host.clone()));
        }

        match timeout(
            std::time::Duration::from_secs(self.cfg.connect_timeout_secs),
            listener.accept(),
        )
        .await
        {
            Ok(Ok((stream, addr))) => {
                debug!("Accepted data connection from {}", addr);
                self.data = Some(DataStream::Plain(stream));
                Ok(())
            }
            _ => Err(WorkerError::CouldNotConnect(self.host.clone())),
        }
    }

    /// Negotiate protection for the data channel on the control connection:
    /// `PBSZ 0` then `PROT P`. If the server refuses private mode, fall
    /// back to `PROT C` (best effort) and run the data channel in the
    /// clear. The actual handshake is deferred to `encrypt_data_channel`.
    async fn request_data_encryption(&mut self) -> WorkerResult<()> {
        self.prot_p = false;

        if !self.send_cmd("PBSZ 0", 1).await? || self.last_reply.rtype != 2 {
            return Ok(());
        }

        if self.send_cmd("PROT P", 1).await? && self.last_reply.rtype == 2 {
            self.prot_p = true;
        } else {
            let _ = self.send_cmd("PROT C", 1).await;
        }
        Ok(())
    }

    /// Run the TLS handshake on the data socket. Called after the transfer
    /// command got its 1xx preliminary reply, because FTPS servers start
    /// TLS on the data socket in response to that command, not earlier.
    pub(crate) async fn encrypt_data_channel(&mut self) -> WorkerResult<()> {
        if !self.prot_p {
            return Ok(());
        }

        let tls_failed =
            || WorkerError::SlaveDefined("TLS Negotiation failed on the data channel.".to_string());

        let stream = match self.data.take() {
            Some(DataStream::Plain(tcp)) => tcp,
            Some(other) => {
                self.data = Some(other); // already encrypted
                return Ok(());
            }
            None => return Err(WorkerError::Internal(self.host.clone())),
        };

        let handshake_timeout = std::time::Duration::from_secs(self.cfg.connect_timeout_secs);

        if self.passive {
            // We connected out, so we are the TLS client.
            let connector = make_connector(self.ignore_tls_errors);
            let name = server_name(&self.host).map_err(|_| tls_failed())?;
            match timeout(handshake_timeout, connector.connect(name, stream)).await {
                Ok(Ok(tls)) => {
                    self.data = Some(DataStream::TlsClient(Box::new(tls)));
                    Ok(())
                }
                _ => Err(tls_failed()),
            }
        } else {
            // The server connected in, so we take the TLS server role.
            let (cert, key) = match (&self.cfg.cert_file, &self.cfg.key_file) {
                (Some(c), Some(k)) => (c.clone(), k.clone()),
                _ => return Err(tls_failed()),
            };
            let acceptor = make_acceptor(&cert, &key).map_err(|_| tls_failed())?;
            match timeout(handshake_timeout, acceptor.accept(stream)).await {
                Ok(Ok(tls)) => {
                    self.data = Some(DataStream::TlsServer(Box::new(tls)));
                    Ok(())
                }
                _ => Err(tls_failed()),
            }
        }
    }

    /// Issue a transfer command (RETR/STOR/LIST): set TYPE, open the data
    /// channel, send REST for a non-zero offset, send the command itself
    /// expecting a 1xx preliminary reply, then run the deferred data-TLS
    /// handshake. `errorcode` is the caller's error for a rejected command.
    pub(crate) async fn open_command(
        &mut self,
        command: &str,
        path: Option<&str>,
        mode: char,
        errorcode: fn(String) -> WorkerError,
        offset: u64,
    ) -> WorkerResult<()> {
        if !self.ftp_data_mode(mode).await? {
            return Err(WorkerError::CouldNotConnect(self.host.clone()));
        }
        self.open_data_connection().await?;

        if offset > 0 {
            // applies to RETR and STOR
            if !self.send_cmd(&format!("REST {}", offset), 1).await?
                || self.last_reply.rtype != 3
            {
                self.close_data_connection();
                return Err(WorkerError::CannotResume(
                    path.unwrap_or_default().to_string(),
                ));
            }
        }

        let full = match path {
            Some(p) => format!("{} {}", command, p),
            None => command.to_string(),
        };

        if !self.send_cmd(&full, 1).await? || self.last_reply.rtype != 1 {
            let failed_resume = offset > 0 && command == "RETR" && self.last_reply.rtype == 4;
            self.close_data_connection();
            if failed_resume {
                return Err(WorkerError::CannotResume(
                    path.unwrap_or_default().to_string(),
                ));
            }
            return Err(errorcode(path.unwrap_or_default().to_string()));
        }

        // Only now we know for sure that we can resume.
        if offset > 0 && command == "RETR" {
            self.host_channel.can_resume().await;
        }

        self.busy = true; // cleared in close_command

        if let Err(e) = self.encrypt_data_channel().await {
            self.close_command().await?;
            return Err(e);
        }
        Ok(())
    }

    /// Close the data socket, then consume the transfer command's final
    /// reply (should be a 226). Returns whether that reply was a 2xx.
    pub(crate) async fn close_command(&mut self) -> WorkerResult<bool> {
        if let Some(mut data) = self.data.take() {
            let _ = data.shutdown().await;
        }
        self.prot_p = false;

        if !self.busy {
            return Ok(true);
        }

        debug!("close_command: reading command result");
        self.busy = false;

        let reply = match self.control.as_mut() {
            Some(c) => c.read_reply().await,
            None => None,
        };
        match reply {
            Some(r) => {
                self.last_reply = r;
                if self.last_reply.rtype != 2 {
                    debug!("close_command: no transfer complete message");
                    return Ok(false);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
