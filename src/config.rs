use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_MINIMUM_KEEP_SIZE, DEFAULT_READ_TIMEOUT_SECS,
};

/// Worker-wide configuration, loaded once at startup from a TOML file.
///
/// Per-request knobs (`autoLoginMacro`, `statSide`, `details`, `resume`)
/// are not here: they travel as metadata on each host request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// FTP proxy URL; only `ftp://` proxies are honored.
    pub use_proxy: Option<String>,

    /// Default to ASCII transfers when the request mode is unspecified.
    pub textmode: bool,

    pub enable_auto_login: bool,
    pub auto_login_user: Option<String>,
    pub auto_login_pass: Option<String>,

    /// Never prompt for credentials; failed logins cancel instead.
    pub disable_pass_dlg: bool,

    pub disable_passive_mode: bool,
    pub disable_epsv: bool,

    pub enable_auto_login_macro: bool,

    /// Upload to `<name>.part`, rename into place on success.
    pub mark_partial: bool,

    /// Partials smaller than this are deleted after a failed transfer.
    pub minimum_keep_size: u64,

    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,

    /// PEM certificate/key presented when we take the server role in the
    /// data-channel TLS handshake (active mode).
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            use_proxy: None,
            textmode: false,
            enable_auto_login: false,
            auto_login_user: None,
            auto_login_pass: None,
            disable_pass_dlg: false,
            disable_passive_mode: false,
            disable_epsv: false,
            enable_auto_login_macro: false,
            mark_partial: true,
            minimum_keep_size: DEFAULT_MINIMUM_KEEP_SIZE,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            cert_file: None,
            key_file: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub worker: WorkerConfig,
}

pub fn load_config(path: &str) -> Result<Config> {
    let config_str = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", path))?;
    let config = toml::from_str(&config_str)
        .with_context(|| format!("Failed to parse configuration file: {}", path))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = WorkerConfig::default();
        assert!(cfg.mark_partial);
        assert!(!cfg.textmode);
        assert!(!cfg.disable_passive_mode);
        assert_eq!(cfg.minimum_keep_size, DEFAULT_MINIMUM_KEEP_SIZE);
    }

    #[test]
    fn test_parse_partial_toml() {
        let cfg: Config = toml::from_str(
            r#"
            [worker]
            textmode = true
            minimum_keep_size = 1234
            "#,
        )
        .unwrap();
        assert!(cfg.worker.textmode);
        assert_eq!(cfg.worker.minimum_keep_size, 1234);
        assert!(cfg.worker.mark_partial); // untouched default
    }
}
