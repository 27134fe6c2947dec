//! Session state and the control-connection state machine:
//! connect → AUTH TLS → login → SYST/PWD → ready, plus the command channel
//! with its reconnect-on-timeout policy.

use log::{debug, info, warn};
use std::time::Duration;
use tokio::net::lookup_host;
use url::Url;

use crate::config::WorkerConfig;
use crate::constants::{DEFAULT_FTP_PORT, FTP_LOGIN, FTP_PASSWD};
use crate::core_control::tls::{make_connector, server_name};
use crate::core_control::{ControlCodec, Reply};
use crate::core_data::{DataStream, ExtCaps};
use crate::errors::{WorkerError, WorkerResult};
use crate::host::{AuthInfo, DialogChoice, HostChannel, MessageBoxKind, Metadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMode {
    /// Open the control connection and TLS only; skip USER/PASS. Used by the
    /// command channel's reconnect path to avoid re-entering itself.
    Deferred,
    /// Full connect + login.
    Explicit,
    /// Reuse the session if it is already logged on, connect otherwise.
    Implicit,
}

pub struct Session<H: HostChannel> {
    pub host_channel: H,
    pub cfg: WorkerConfig,

    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) user: String,
    pub(crate) pass: String,
    pub(crate) proxy: Option<Url>,

    pub(crate) control: Option<ControlCodec>,
    pub(crate) logged_on: bool,
    pub(crate) busy: bool,
    pub(crate) text_mode: bool,
    /// Last TYPE acknowledged by the server.
    pub(crate) data_mode: Option<char>,
    pub(crate) ext_caps: ExtCaps,
    pub(crate) last_reply: Reply,
    pub(crate) initial_path: String,
    pub(crate) current_path: String,
    /// Scratch for SIZE / RETR size extraction; `None` is "unknown".
    pub(crate) size: Option<u64>,
    pub(crate) ignore_tls_errors: bool,
    /// Whether the last data channel was passive; decides the TLS role.
    pub(crate) passive: bool,
    pub(crate) data: Option<DataStream>,
    /// PROT P acknowledged for the current data connection.
    pub(crate) prot_p: bool,

    pub(crate) metadata: Metadata,
}

impl<H: HostChannel> Session<H> {
    pub fn new(host_channel: H, cfg: WorkerConfig) -> Self {
        let proxy = cfg
            .use_proxy
            .as_deref()
            .and_then(|p| Url::parse(p).ok())
            .filter(|u| u.scheme() == "ftp");

        Self {
            host_channel,
            cfg,
            host: String::new(),
            port: 0,
            user: String::new(),
            pass: String::new(),
            proxy,
            control: None,
            logged_on: false,
            busy: false,
            text_mode: false,
            data_mode: None,
            ext_caps: ExtCaps::default(),
            last_reply: Reply::default(),
            initial_path: String::new(),
            current_path: String::new(),
            size: None,
            ignore_tls_errors: false,
            passive: true,
            data: None,
            prot_p: false,
            metadata: Metadata::new(),
        }
    }

    pub fn set_metadata(&mut self, metadata: Metadata) {
        self.metadata = metadata;
    }

    pub(crate) fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.cfg.connect_timeout_secs)
    }

    fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.cfg.read_timeout_secs)
    }

    // ── host identity ───────────────────────────────────────────────────

    /// A change of connection identity invalidates the whole session.
    pub async fn set_host(&mut self, host: String, port: u16, user: String, pass: String) {
        debug!("set_host {} port={}", host, port);
        if self.host != host || self.port != port || self.user != user || self.pass != pass {
            self.close_connection().await;
        }
        self.host = host;
        self.port = port;
        self.user = user;
        self.pass = pass;
    }

    // ── teardown ────────────────────────────────────────────────────────

    pub async fn close_connection(&mut self) {
        if self.control.is_some() || self.data.is_some() {
            debug!(
                "close_connection logged_on={} busy={}",
                self.logged_on, self.busy
            );
        }

        if self.busy {
            warn!("close_connection: abandoned data stream");
            self.data = None;
        }

        if self.logged_on {
            if !matches!(self.send_cmd_raw("QUIT").await, Ok(true)) || self.last_reply.rtype != 2 {
                warn!("QUIT returned error: {}", self.last_reply.code);
            }
        }

        self.data = None;
        self.prot_p = false;
        self.control = None;
        self.ext_caps = ExtCaps::default();
        self.data_mode = None;
        self.logged_on = false;
        self.text_mode = false;
        self.busy = false;
    }

    // ── connection setup ────────────────────────────────────────────────

    pub async fn open_connection(&mut self) -> WorkerResult<()> {
        self.ftp_open_connection(LoginMode::Explicit).await
    }

    pub async fn ftp_open_connection(&mut self, mode: LoginMode) -> WorkerResult<()> {
        if mode == LoginMode::Implicit && self.logged_on {
            return Ok(());
        }

        debug!(
            "ftp_open_connection {}:{} {} [password hidden]",
            self.host, self.port, self.user
        );
        self.host_channel
            .info_message(&format!("Opening connection to host {}", self.host))
            .await;

        if self.host.is_empty() {
            return Err(WorkerError::UnknownHost(String::new()));
        }
        if self.logged_on {
            self.close_connection().await;
        }

        self.initial_path.clear();
        self.current_path.clear();

        let (host, port) = match &self.proxy {
            Some(proxy) => (
                proxy.host_str().unwrap_or_default().to_string(),
                proxy.port().unwrap_or(DEFAULT_FTP_PORT),
            ),
            None => (self.host.clone(), self.port),
        };

        self.open_control_connection(&host, port).await?;
        self.host_channel
            .info_message(&format!("Connected to host {}", self.host))
            .await;

        if mode != LoginMode::Deferred {
            self.login().await?;
            self.logged_on = true;
        }

        self.text_mode = self.cfg.textmode;
        self.host_channel.connected().await;
        Ok(())
    }

    /// Open the TCP control connection, read the greeting, and negotiate
    /// explicit TLS (`AUTH TLS`, code 234, handshake).
    ///
    /// A failed handshake asks the user whether to go on regardless; on
    /// "Continue" the whole open is redone with certificate errors ignored,
    /// and the override sticks for the rest of the session (both channels).
    async fn open_control_connection(&mut self, host: &str, port: u16) -> WorkerResult<()> {
        let mut ignore_tls = self.ignore_tls_errors;

        loop {
            // implicitly close, then try to open a new connection
            self.close_connection().await;
            let port = if port == 0 { DEFAULT_FTP_PORT } else { port };

            let addr = lookup_host((host, port))
                .await
                .map_err(|_| WorkerError::UnknownHost(host.to_string()))?
                .next()
                .ok_or_else(|| WorkerError::UnknownHost(host.to_string()))?;

            let mut codec =
                ControlCodec::connect(addr, self.connect_timeout(), self.read_timeout())
                    .await
                    .map_err(|e| {
                        WorkerError::CouldNotConnect(format!("{}: {}", host, e))
                    })?;

            // greeting
            match codec.read_reply().await {
                Some(reply) if reply.rtype == 2 => {
                    self.last_reply = reply;
                }
                Some(reply) => {
                    return Err(WorkerError::CouldNotConnect(format!(
                        "{}.\n\nReason: {}",
                        host, reply.text
                    )));
                }
                None => {
                    return Err(WorkerError::CouldNotConnect(host.to_string()));
                }
            }

            // Send unencrypted "AUTH TLS" request.
            match codec.execute("AUTH TLS").await {
                Some(reply) if reply.code == 234 => {
                    self.last_reply = reply;
                }
                _ => {
                    return Err(WorkerError::SlaveDefined(
                        "The FTP server does not seem to support ftps-encryption.".to_string(),
                    ));
                }
            }

            let name = server_name(host)
                .map_err(|e| WorkerError::SlaveDefined(e.to_string()))?;
            let connector = make_connector(ignore_tls);
            match codec
                .upgrade_to_tls(&connector, name, self.connect_timeout())
                .await
            {
                Ok(codec) => {
                    self.control = Some(codec);
                    self.ignore_tls_errors = ignore_tls;
                    return Ok(());
                }
                Err(e) => {
                    // Mostly self-signed certificates. Let the user decide
                    // whether the transfer continues anyway.
                    if !ignore_tls {
                        let choice = self
                            .host_channel
                            .message_box(
                                MessageBoxKind::WarningContinueCancel,
                                &e.to_string(),
                                "TLS Handshake Error",
                                "Continue",
                                "Cancel",
                            )
                            .await;
                        if choice == DialogChoice::Primary {
                            ignore_tls = true;
                            continue;
                        }
                    }
                    return Err(WorkerError::SlaveDefined("TLS Handshake Error.".to_string()));
                }
            }
        }
    }

    // ── login ───────────────────────────────────────────────────────────

    async fn login(&mut self) -> WorkerResult<()> {
        self.host_channel
            .info_message("Sending login information")
            .await;

        let mut user = self.user.clone();
        let mut pass = self.pass.clone();

        // Explicit credentials beat the configured auto-login, which beats
        // the anonymous default.
        if user.is_empty() && self.cfg.enable_auto_login {
            if let Some(au) = self.cfg.auto_login_user.clone().filter(|u| !u.is_empty()) {
                user = au;
                pass = self.cfg.auto_login_pass.clone().unwrap_or_default();
            }
        }
        if user.is_empty() && pass.is_empty() {
            user = FTP_LOGIN.to_string();
            pass = FTP_PASSWD.to_string();
        }

        let mut info = AuthInfo {
            url: if self.port > 0 && self.port != DEFAULT_FTP_PORT {
                format!("ftp://{}:{}", self.host, self.port)
            } else {
                format!("ftp://{}", self.host)
            },
            username: if user != FTP_LOGIN {
                user.clone()
            } else {
                String::new()
            },
            password: String::new(),
            prompt: String::new(),
            comment: String::new(),
            keep_password: true,
            read_only: !self.user.is_empty() && self.user != FTP_LOGIN,
        };

        let mut failed_auth = 0u32;
        loop {
            // Prompt when a previous attempt failed, or when a username was
            // supplied without a password.
            if failed_auth > 0 || (!user.is_empty() && pass.is_empty()) {
                let err_msg = if failed_auth > 0 {
                    format!(
                        "Message sent:\nLogin using username={} and password=[hidden]\n\n\
                         Server replied:\n{}\n\n",
                        user, self.last_reply.text
                    )
                } else {
                    String::new()
                };

                if user != FTP_LOGIN {
                    info.username = user.clone();
                }
                info.prompt =
                    "You need to supply a username and a password to access this site.".to_string();
                info.comment = self.host.clone();

                if self.cfg.disable_pass_dlg
                    || !self
                        .host_channel
                        .open_password_dialog(&mut info, &err_msg)
                        .await
                {
                    return Err(WorkerError::UserCanceled(self.host.clone()));
                }
                user = info.username.clone();
                pass = info.password.clone();
            }

            let mut user_cmd = format!("USER {}", user);
            if self.proxy.is_some() {
                user_cmd.push('@');
                user_cmd.push_str(&self.host);
                if self.port > 0 && self.port != DEFAULT_FTP_PORT {
                    user_cmd.push(':');
                    user_cmd.push_str(&self.port.to_string());
                }
            }

            let mut logged_in =
                self.send_cmd_raw(&user_cmd).await? && self.last_reply.code == 230;
            let need_pass = self.last_reply.code == 331;

            if !logged_in && !need_pass {
                debug!("Login failed: {}", self.last_reply.text);
                failed_auth += 1;
                continue;
            }

            if need_pass {
                let pass_cmd = format!("PASS {}", pass);
                logged_in = self.send_cmd_raw(&pass_cmd).await? && self.last_reply.code == 230;
            }

            if logged_in {
                // Do not cache the default login.
                if user != FTP_LOGIN && pass != FTP_PASSWD {
                    info.username = user.clone();
                    info.password = pass.clone();
                    self.host_channel.cache_authentication(&info).await;
                }
                break;
            }

            failed_auth += 1;
        }

        info!("Login OK");
        self.host_channel.info_message("Login OK").await;

        // If this is a Windows server, switch the dir listing style to Unix.
        if self.send_cmd_raw("SYST").await? && self.last_reply.rtype == 2 {
            if self.last_reply.text.starts_with("215 Windows_NT") {
                self.send_cmd_raw("SITE DIRSTYLE").await?;
                if self
                    .last_reply
                    .text
                    .starts_with("200 MSDOS-like directory output is on")
                {
                    // It was in Unix style already; toggle back.
                    self.send_cmd_raw("SITE DIRSTYLE").await?;
                }
                // Windows servers don't support SITE CHMOD.
                self.ext_caps.chmod_unknown = true;
            }
        } else {
            warn!("SYST failed");
        }

        if self.cfg.enable_auto_login_macro {
            self.auto_login_macro().await?;
        }

        debug!("Searching for pwd");
        if !self.send_cmd_raw("PWD").await? || self.last_reply.rtype != 2 {
            debug!("Couldn't issue pwd command");
            return Err(WorkerError::CouldNotLogin(format!(
                "Could not login to {}.",
                self.host
            )));
        }

        let text = self.last_reply.text_after(3).to_string();
        if let (Some(beg), Some(end)) = (text.find('"'), text.rfind('"')) {
            if beg < end {
                let mut path = text[beg + 1..end].to_string();
                if !path.starts_with('/') {
                    path.insert(0, '/');
                }
                debug!("Initial path set to: {}", path);
                self.initial_path = path.clone();
                self.current_path = path;
            }
        }
        Ok(())
    }

    /// Run the "init" block of the auto-login macro. Only `cwd <path>`
    /// directives are honored; everything else is silently ignored.
    ///
    /// The CWD here bypasses the retrying command channel: this runs while
    /// the login sequence is still in flight.
    async fn auto_login_macro(&mut self) -> WorkerResult<()> {
        let macro_text = match self.meta("autoLoginMacro") {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => return Ok(()),
        };

        for line in macro_text.split('\n').filter(|l| !l.is_empty()) {
            if line.starts_with("init") {
                for directive in macro_text.split('\\').filter(|d| !d.is_empty()).skip(1) {
                    if directive.starts_with("cwd") {
                        let mut path = directive.get(4..).unwrap_or("").trim().to_string();
                        if path.len() > 1 && path.ends_with('/') {
                            path.pop();
                        }
                        if self.send_cmd_raw(&format!("CWD {}", path)).await?
                            && self.last_reply.rtype == 2
                        {
                            self.current_path = path;
                        }
                    }
                }
                break;
            }
        }
        Ok(())
    }

    // ── command channel ─────────────────────────────────────────────────

    /// Write one command and read its reply, no retry. `Ok(true)` means a
    /// reply was received (of any code) and is in `last_reply`.
    pub(crate) async fn send_cmd_raw(&mut self, cmd: &str) -> WorkerResult<bool> {
        if cmd.contains('\r') || cmd.contains('\n') {
            warn!("Invalid command (contains CR or LF): {}", cmd);
            return Err(WorkerError::UnsupportedAction(self.host.clone()));
        }

        let control = match self.control.as_mut() {
            Some(c) => c,
            None => return Ok(false),
        };

        match control.execute(cmd).await {
            Some(reply) => {
                self.last_reply = reply;
                Ok(true)
            }
            None => {
                self.last_reply = Reply::default();
                Ok(false)
            }
        }
    }

    /// Send a command with the reconnect policy: a missing reply or a 421
    /// triggers one reconnect per remaining retry. Deferred login is used
    /// while not logged on so the retry path cannot re-enter the login
    /// machinery.
    pub async fn send_cmd(&mut self, cmd: &str, max_retries: u32) -> WorkerResult<bool> {
        let is_pass_cmd = cmd.len() >= 4 && cmd[..4].eq_ignore_ascii_case("pass");
        let mut retries = max_retries;

        loop {
            let got_reply = self.send_cmd_raw(cmd).await?;
            if got_reply && self.last_reply.code != 421 {
                return Ok(true);
            }

            if !self.logged_on {
                // If we already sent the password, the caller decides
                // whether to start over from the beginning.
                if retries > 0 && !is_pass_cmd {
                    self.close_connection().await;
                    if self.ftp_open_connection(LoginMode::Deferred).await.is_ok() {
                        retries -= 1;
                        continue;
                    }
                }
                return Ok(false);
            }

            if retries < 1 {
                return Ok(false);
            }

            debug!(
                "Was not able to communicate with {}. Attempting to re-establish connection.",
                self.host
            );
            self.close_connection().await;
            match self.ftp_open_connection(LoginMode::Explicit).await {
                Ok(()) => {
                    debug!("Logged back in, re-issuing command");
                    retries -= 1;
                }
                Err(_) => {
                    if self.control.is_some() {
                        debug!("Login failure, aborting");
                        self.close_connection().await;
                        return Err(WorkerError::CouldNotLogin(self.host.clone()));
                    }
                    return Ok(false);
                }
            }
        }
    }

    // ── small protocol helpers ──────────────────────────────────────────

    /// Change the remote working directory, with a cache short-circuit.
    /// `Ok(false)` is "not a folder / connection failure" when
    /// `report_error` is off; with `report_error` the failure is returned
    /// as `ERR_CANNOT_ENTER_DIRECTORY`.
    pub async fn ftp_folder(&mut self, path: &str, report_error: bool) -> WorkerResult<bool> {
        let mut new_path = path.to_string();
        if new_path.len() > 1 && new_path.ends_with('/') {
            new_path.pop();
        }

        if self.current_path == new_path {
            return Ok(true);
        }

        if !self.send_cmd(&format!("CWD {}", new_path), 1).await? {
            return Ok(false); // connection failure
        }
        if self.last_reply.rtype != 2 {
            if report_error {
                return Err(WorkerError::CannotEnterDirectory(path.to_string()));
            }
            return Ok(false); // not a folder
        }

        self.current_path = new_path;
        Ok(true)
    }

    /// Probe a path with SIZE. On success `self.size` holds the result;
    /// a server answer of 0 means "unknown" in practice and comes back as
    /// `None`. The size depends on the transfer mode, hence `mode`.
    pub async fn ftp_size(&mut self, path: &str, mode: char) -> WorkerResult<bool> {
        self.size = None;
        if !self.ftp_data_mode(mode).await? {
            return Ok(false);
        }

        if !self.send_cmd(&format!("SIZE {}", path), 1).await? || self.last_reply.rtype != 2 {
            return Ok(false);
        }

        // skip the leading "213 "
        let text = self.last_reply.text_after(4);
        let digits: String = text
            .trim_start()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        self.size = digits.parse::<u64>().ok().filter(|s| *s > 0);
        Ok(true)
    }

    /// Ensure the server's TYPE matches the wanted mode. `?` resolves to
    /// the session's text-mode default, `a` to ASCII, anything else to
    /// binary.
    pub async fn ftp_data_mode(&mut self, mode: char) -> WorkerResult<bool> {
        let mode = match mode {
            '?' => {
                if self.text_mode {
                    'A'
                } else {
                    'I'
                }
            }
            'a' | 'A' => 'A',
            _ => 'I',
        };

        debug!(
            "ftp_data_mode: want '{}' has '{:?}'",
            mode, self.data_mode
        );
        if self.data_mode == Some(mode) {
            return Ok(true);
        }

        if !self.send_cmd(&format!("TYPE {}", mode), 1).await? || self.last_reply.rtype != 2 {
            return Ok(false);
        }
        self.data_mode = Some(mode);
        Ok(true)
    }

    pub async fn slave_status(&mut self) {
        debug!(
            "slave_status host={} [{}]",
            if self.host.is_empty() {
                "[None]"
            } else {
                self.host.as_str()
            },
            if self.logged_on {
                "Connected"
            } else {
                "Not connected"
            }
        );
        let host = self.host.clone();
        let logged_on = self.logged_on;
        self.host_channel.slave_status(&host, logged_on).await;
    }
}
